//! Host-application embedding ABI (§5 "External interfaces", §6 "Runtime C
//! ABI"): the surface a host binary written in any language links against to
//! drive the dialect's runtime without going through the nREPL protocol —
//! initialize a runtime, load a compiled object, resolve or register a
//! symbol, point the embedded runtime at a remote compile host, and
//! evaluate a string of dialect source for its value.
//!
//! Every function here takes or returns an opaque `*mut EmbeddedRuntime`
//! handle obtained from [`corvid_embed_init`] and is `extern "C"` with a
//! stable, unmangled symbol name. All strings crossing the boundary are
//! UTF-8, passed as a
//! `(pointer, length)` pair on the way in and as an owned,
//! [`corvid_embed_free_string`]-reclaimed `char*` on the way out — the same
//! convention `corvid-runtime`'s internal ABI uses for the generated code's
//! own calls into the runtime.

use corvid_compiler::{CodegenTarget, NativeDeclRegistry};
use corvid_remote::RemoteCompileClient;
use corvid_runtime::RuntimeContext;
use std::ffi::{CString, c_char};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub struct EmbeddedRuntime {
    ctx: Arc<RuntimeContext>,
    native: Arc<NativeDeclRegistry>,
    remote_addr: Mutex<Option<String>>,
    remote: Mutex<Option<RemoteCompileClient>>,
    unit_counter: AtomicU64,
}

impl EmbeddedRuntime {
    fn next_unit_name(&self) -> String {
        format!("embed_unit_{}", self.unit_counter.fetch_add(1, Ordering::Relaxed))
    }
}

unsafe fn str_in<'a>(ptr: *const c_char, len: usize) -> &'a str {
    let bytes = unsafe { std::slice::from_raw_parts(ptr as *const u8, len) };
    std::str::from_utf8(bytes).expect("embedding host must pass well-formed UTF-8")
}

fn str_out(s: impl Into<String>) -> *mut c_char {
    CString::new(s.into()).unwrap_or_default().into_raw()
}

/// Initializes a fresh runtime (namespaces, JIT cache under a temp
/// directory, the bootstrap `clojure.core` subset) and returns a handle for
/// every other function in this module. The caller owns the handle and must
/// eventually pass it to [`corvid_embed_shutdown`].
#[unsafe(no_mangle)]
pub extern "C" fn corvid_embed_init() -> *mut EmbeddedRuntime {
    let ctx = Arc::new(RuntimeContext::new(vec![], std::env::temp_dir().join("corvid-embed-cache")));
    corvid_compiler::prelude::install(&ctx);
    let runtime = EmbeddedRuntime {
        ctx,
        native: Arc::new(NativeDeclRegistry::new()),
        remote_addr: Mutex::new(None),
        remote: Mutex::new(None),
        unit_counter: AtomicU64::new(0),
    };
    Box::into_raw(Box::new(runtime))
}

/// Reclaims a handle returned by [`corvid_embed_init`]. The handle must not
/// be used again afterward.
///
/// # Safety
/// `handle` must have come from [`corvid_embed_init`] and not already have
/// been passed to this function.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn corvid_embed_shutdown(handle: *mut EmbeddedRuntime) {
    if !handle.is_null() {
        drop(unsafe { Box::from_raw(handle) });
    }
}

/// Loads `bytes` (a compiled object, typically received over the remote
/// compile protocol or read from an AOT cache directory) and resolves
/// `factory_symbol` in it, writing its address to `*out_address`.
///
/// # Safety
/// `handle` must be a live handle from [`corvid_embed_init`]; `bytes_ptr`
/// must point to `bytes_len` readable bytes; `factory_symbol_ptr` must point
/// to `factory_symbol_len` bytes of valid UTF-8; `out_address` must be
/// writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn corvid_embed_load_object(
    handle: *mut EmbeddedRuntime,
    bytes_ptr: *const u8,
    bytes_len: usize,
    factory_symbol_ptr: *const c_char,
    factory_symbol_len: usize,
    out_address: *mut usize,
) -> bool {
    let runtime = unsafe { &*handle };
    let bytes = unsafe { std::slice::from_raw_parts(bytes_ptr, bytes_len) };
    let factory_symbol = unsafe { str_in(factory_symbol_ptr, factory_symbol_len) };
    match runtime.ctx.jit().load_object(bytes, factory_symbol) {
        Ok((_unit, address)) => {
            unsafe { *out_address = address };
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, factory_symbol, "corvid_embed_load_object failed");
            false
        }
    }
}

/// Resolves `name` against the registry and every unit loaded or compiled
/// so far, writing its address to `*out_address`. Returns `false` if
/// nothing exports that name.
///
/// # Safety
/// `handle` must be live; `name_ptr` must point to `name_len` bytes of
/// valid UTF-8; `out_address` must be writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn corvid_embed_find_symbol(
    handle: *mut EmbeddedRuntime,
    name_ptr: *const c_char,
    name_len: usize,
    out_address: *mut usize,
) -> bool {
    let runtime = unsafe { &*handle };
    let name = unsafe { str_in(name_ptr, name_len) };
    match runtime.ctx.jit().find_symbol(name) {
        Some(address) => {
            unsafe { *out_address = address };
            true
        }
        None => false,
    }
}

/// Registers `pointer` under `name` (§4.5 "symbol registration"), so any
/// unit compiled after this call can declare `name` and link against it —
/// the host-embedding counterpart of `corvid_runtime::abi::install`, for
/// symbols the host application itself provides.
///
/// # Safety
/// `handle` must be live; `name_ptr` must point to `name_len` bytes of
/// valid UTF-8; `pointer` must be a valid address for as long as any
/// compiled unit might call through it.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn corvid_embed_register_symbol(
    handle: *mut EmbeddedRuntime,
    name_ptr: *const c_char,
    name_len: usize,
    pointer: usize,
    callable: bool,
) {
    let runtime = unsafe { &*handle };
    let name = unsafe { str_in(name_ptr, name_len) };
    runtime.ctx.jit().register_symbol(name, pointer, callable);
}

/// Records the host/port a later [`corvid_embed_connect_remote`] call
/// should dial. Does not itself open a connection.
///
/// # Safety
/// `handle` must be live; `host_ptr` must point to `host_len` bytes of
/// valid UTF-8.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn corvid_embed_configure_remote(handle: *mut EmbeddedRuntime, host_ptr: *const c_char, host_len: usize, port: u16) {
    let runtime = unsafe { &*handle };
    let host = unsafe { str_in(host_ptr, host_len) };
    *runtime.remote_addr.lock().unwrap_or_else(|p| p.into_inner()) = Some(format!("{host}:{port}"));
}

/// Opens the connection configured by [`corvid_embed_configure_remote`].
/// Returns `false` if no host/port was configured or the connection
/// attempt failed; `*compile_files*`-style transport failures do not
/// auto-retry (§8) — the caller decides whether to call this again.
///
/// # Safety
/// `handle` must be a live handle from [`corvid_embed_init`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn corvid_embed_connect_remote(handle: *mut EmbeddedRuntime) -> bool {
    let runtime = unsafe { &*handle };
    let Some(addr) = runtime.remote_addr.lock().unwrap_or_else(|p| p.into_inner()).clone() else {
        tracing::warn!("corvid_embed_connect_remote called before configure_remote");
        return false;
    };
    match RemoteCompileClient::connect(addr.as_str()) {
        Ok(client) => {
            *runtime.remote.lock().unwrap_or_else(|p| p.into_inner()) = Some(client);
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, addr, "corvid_embed_connect_remote failed");
            false
        }
    }
}

/// Drops the remote connection, if any; `eval` falls back to local
/// compilation afterward.
///
/// # Safety
/// `handle` must be a live handle from [`corvid_embed_init`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn corvid_embed_disconnect_remote(handle: *mut EmbeddedRuntime) {
    let runtime = unsafe { &*handle };
    *runtime.remote.lock().unwrap_or_else(|p| p.into_inner()) = None;
}

/// Reports whether an open remote-compile connection exists.
///
/// # Safety
/// `handle` must be a live handle from [`corvid_embed_init`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn corvid_embed_is_remote_active(handle: *mut EmbeddedRuntime) -> bool {
    let runtime = unsafe { &*handle };
    runtime.remote.lock().unwrap_or_else(|p| p.into_inner()).is_some()
}

/// Evaluates `code` (read, analyzed, code-generated, compiled, loaded, and
/// called for a value, §4.4) under `ns`, routing through the active remote
/// connection when one is open (§4.7 "local eval/native-source route to the
/// server"), or compiling locally otherwise.
///
/// On success, `*out_value` receives an owned, NUL-terminated string (the
/// value's readable `Display` form) the caller must pass to
/// [`corvid_embed_free_string`]; on failure it is left untouched and the
/// function returns `false`.
///
/// # Safety
/// `handle` must be live; `code_ptr`/`ns_ptr` must point to
/// `code_len`/`ns_len` bytes of valid UTF-8; `out_value` must be writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn corvid_embed_eval(
    handle: *mut EmbeddedRuntime,
    code_ptr: *const c_char,
    code_len: usize,
    ns_ptr: *const c_char,
    ns_len: usize,
    out_value: *mut *mut c_char,
) -> bool {
    let runtime = unsafe { &*handle };
    let code = unsafe { str_in(code_ptr, code_len) };
    let ns = unsafe { str_in(ns_ptr, ns_len) };

    let mut remote = runtime.remote.lock().unwrap_or_else(|p| p.into_inner());
    if let Some(client) = remote.as_mut() {
        return match client.eval_value(runtime.ctx.jit(), &runtime.ctx, code, ns, None) {
            Ok(value) => {
                unsafe { *out_value = str_out(value.to_string()) };
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "corvid_embed_eval (remote) failed");
                false
            }
        };
    }
    drop(remote);

    runtime.ctx.intern_namespace(ns);
    runtime.ctx.set_current_namespace(ns);
    let unit_name = runtime.next_unit_name();
    let generated = match corvid_compiler::generate_source(&runtime.ctx, &runtime.native, code, format!("{ns}.corvid"), &[], CodegenTarget::Eval, &unit_name) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "corvid_embed_eval (local compile) failed");
            return false;
        }
    };
    let unit = match runtime.ctx.jit().compile_and_load(&unit_name, &generated) {
        Ok(unit) => unit,
        Err(e) => {
            tracing::warn!(error = %e, "corvid_embed_eval (local load) failed");
            return false;
        }
    };
    match unsafe { corvid_runtime::abi::call_entry0(&runtime.ctx, &unit, &unit_name) } {
        Ok(value) => {
            unsafe { *out_value = str_out(value.to_string()) };
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "corvid_embed_eval (local call) failed");
            false
        }
    }
}

/// Reclaims a string returned by [`corvid_embed_eval`].
///
/// # Safety
/// `ptr` must have come from [`corvid_embed_eval`]'s `out_value` and not
/// already have been passed to this function.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn corvid_embed_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(unsafe { CString::from_raw(ptr) });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_and_shutdown_round_trip() {
        let handle = corvid_embed_init();
        assert!(!handle.is_null());
        unsafe { corvid_embed_shutdown(handle) };
    }

    #[test]
    fn eval_of_a_simple_sum_returns_its_readable_value() {
        let handle = corvid_embed_init();
        let code = "(+ 1 2)";
        let ns = "user";
        let mut out_value: *mut c_char = std::ptr::null_mut();
        let ok = unsafe {
            corvid_embed_eval(
                handle,
                code.as_ptr() as *const c_char,
                code.len(),
                ns.as_ptr() as *const c_char,
                ns.len(),
                &mut out_value,
            )
        };
        assert!(ok, "eval should succeed for a well-formed sum");
        let text = unsafe { std::ffi::CStr::from_ptr(out_value) }.to_str().unwrap().to_string();
        assert_eq!(text, "3");
        unsafe {
            corvid_embed_free_string(out_value);
            corvid_embed_shutdown(handle);
        }
    }

    #[test]
    fn find_symbol_sees_a_symbol_registered_by_the_host() {
        let handle = corvid_embed_init();
        let name = "host_provided_fn";
        unsafe { corvid_embed_register_symbol(handle, name.as_ptr() as *const c_char, name.len(), 0x1234, true) };
        let mut out_address: usize = 0;
        let found = unsafe { corvid_embed_find_symbol(handle, name.as_ptr() as *const c_char, name.len(), &mut out_address) };
        assert!(found);
        assert_eq!(out_address, 0x1234);
        unsafe { corvid_embed_shutdown(handle) };
    }

    #[test]
    fn remote_is_inactive_until_connected() {
        let handle = corvid_embed_init();
        assert!(!unsafe { corvid_embed_is_remote_active(handle) });
        unsafe { corvid_embed_shutdown(handle) };
    }
}
