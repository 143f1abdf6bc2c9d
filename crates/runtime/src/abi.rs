//! Internal Runtime C ABI: the `extern "C" corvid_rt_*` trampolines the
//! generated C++ translation units call through `::corvid::runtime::*`
//! (see [`crate::support`] for the C++-side wrappers) (§4.4, §4.5, §5).
//!
//! [`install`] registers every trampoline's address with a [`crate::Jit`]
//! via [`crate::Jit::register_symbol`] — the consumer of the
//! symbol-registration contract §4.5 mandates. Call it once per
//! [`crate::RuntimeContext`] before compiling any unit (`RuntimeContext::new`
//! already does this).
//!
//! Object lifetime: every `make_*` trampoline leaks an `Arc<Object>`
//! (`Arc::into_raw`) across the boundary; nothing here ever reclaims one.
//! This workspace has no tracing collector, so an object created during
//! JIT-compiled execution lives for the remainder of the process — a
//! deliberate, bounded simplification of the `Allocator::Gc` contract
//! (real refcount reclamation across this boundary is unimplemented),
//! recorded in DESIGN.md rather than left silent.
//!
//! One call (`the_var`/`deref_var`/`invoke`) needs the active
//! [`crate::RuntimeContext`] but the generated function signatures carry no
//! context parameter — `with_active_context` scopes a thread-local pointer
//! to it for the duration of one compiled-entry call, the same
//! narrowly-scoped exception to "model context explicitly, not as process
//! global state" (§4.6) that the teacher's own `context.rs` already takes
//! for the current-namespace/current-allocator thread locals.

use crate::context::RuntimeContext;
use corvid_core::{
    Arity, BigDecimalValue, BigInteger, Callable, Closure, Keyword, NativeFn, Object, RString,
    RatioValue, SpecialDouble, Symbol,
};
use std::cell::Cell;
use std::ffi::{CString, c_char, c_void};
use std::sync::Arc;

thread_local! {
    static ACTIVE_CTX: Cell<*const RuntimeContext> = const { Cell::new(std::ptr::null()) };
}

/// Runs `f` with `ctx` reachable from any `corvid_rt_*` trampoline called
/// during it (on this thread only), restoring the previous context on
/// return so nested or sequential evaluations never see a stale pointer.
pub fn with_active_context<T>(ctx: &RuntimeContext, f: impl FnOnce() -> T) -> T {
    let previous = ACTIVE_CTX.with(|c| c.replace(ctx as *const RuntimeContext));
    let result = f();
    ACTIVE_CTX.with(|c| c.set(previous));
    result
}

fn active_context<'a>() -> &'a RuntimeContext {
    ACTIVE_CTX.with(|c| {
        let ptr = c.get();
        assert!(!ptr.is_null(), "corvid_rt_* called outside with_active_context");
        unsafe { &*ptr }
    })
}

fn leak(obj: Object) -> *const Object {
    Arc::into_raw(Arc::new(obj))
}

unsafe fn borrow<'a>(ptr: *const Object) -> &'a Object {
    assert!(!ptr.is_null(), "corvid_rt_* received a null Object pointer");
    unsafe { &*ptr }
}

unsafe fn str_from_raw<'a>(ptr: *const c_char, len: usize) -> &'a str {
    let bytes = unsafe { std::slice::from_raw_parts(ptr as *const u8, len) };
    std::str::from_utf8(bytes).expect("codegen emits only well-formed UTF-8 C string literals")
}

fn make_real_object(v: f64) -> Object {
    match SpecialDouble::classify(v) {
        Some(special) => Object::SpecialReal(special),
        None => Object::Real(v),
    }
}

fn as_long(obj: &Object) -> i64 {
    match obj {
        Object::Integer(i) => *i,
        Object::Real(r) => *r as i64,
        Object::SpecialReal(s) => s.to_f64() as i64,
        Object::Bool(b) => *b as i64,
        Object::BigInt(b) => b.to_i64().unwrap_or(0),
        _ => 0,
    }
}

fn as_double(obj: &Object) -> f64 {
    match obj {
        Object::Real(r) => *r,
        Object::SpecialReal(s) => s.to_f64(),
        Object::Integer(i) => *i as f64,
        Object::Ratio(r) => r.to_f64(),
        _ => 0.0,
    }
}

fn as_bool(obj: &Object) -> bool {
    match obj {
        Object::Bool(b) => *b,
        Object::Nil => false,
        _ => true,
    }
}

fn is_truthy(obj: &Object) -> bool {
    !matches!(obj, Object::Nil | Object::Bool(false))
}

extern "C" fn corvid_rt_nil_fallback() -> *const Object {
    leak(Object::Nil)
}
extern "C" fn corvid_rt_make_bool_fallback(b: bool) -> *const Object {
    leak(Object::Bool(b))
}
extern "C" fn corvid_rt_make_integer_fallback(v: i64) -> *const Object {
    leak(Object::Integer(v))
}
extern "C" fn corvid_rt_make_real_fallback(v: f64) -> *const Object {
    leak(make_real_object(v))
}
extern "C" fn corvid_rt_make_bigint_fallback(ptr: *const c_char, len: usize) -> *const Object {
    let s = unsafe { str_from_raw(ptr, len) };
    let body = s.strip_suffix('N').unwrap_or(s);
    leak(Object::BigInt(BigInteger::parse(body, 10).unwrap_or_else(|| BigInteger::from_i64(0))))
}
extern "C" fn corvid_rt_make_bigdecimal_fallback(ptr: *const c_char, len: usize) -> *const Object {
    let s = unsafe { str_from_raw(ptr, len) };
    leak(Object::BigDecimal(BigDecimalValue::parse(s).unwrap_or(BigDecimalValue { unscaled: 0.into(), scale: 0 })))
}
extern "C" fn corvid_rt_make_ratio_fallback(ptr: *const c_char, len: usize) -> *const Object {
    let s = unsafe { str_from_raw(ptr, len) };
    let body = s.strip_suffix('N').unwrap_or(s);
    let obj = match body.split_once('/') {
        Some((n, d)) => {
            let numer = BigInteger::parse(n, 10).map(|b| b.0);
            let denom = BigInteger::parse(d, 10).map(|b| b.0);
            match (numer, denom) {
                (Some(n), Some(d)) => RatioValue::new(n, d).map(Object::Ratio),
                _ => None,
            }
        }
        None => None,
    };
    leak(obj.unwrap_or(Object::Integer(0)))
}
extern "C" fn corvid_rt_make_char_fallback(codepoint: u32) -> *const Object {
    leak(Object::Char(char::from_u32(codepoint).unwrap_or('\u{fffd}')))
}
extern "C" fn corvid_rt_make_string_fallback(ptr: *const c_char, len: usize) -> *const Object {
    let s = unsafe { str_from_raw(ptr, len) };
    leak(Object::Str(RString::new(s)))
}
extern "C" fn corvid_rt_make_symbol_fallback(
    has_ns: bool,
    ns_ptr: *const c_char,
    ns_len: usize,
    name_ptr: *const c_char,
    name_len: usize,
) -> *const Object {
    let ns = has_ns.then(|| unsafe { str_from_raw(ns_ptr, ns_len) });
    let name = unsafe { str_from_raw(name_ptr, name_len) };
    leak(Object::Symbol(Symbol::new(ns, name)))
}
extern "C" fn corvid_rt_make_keyword_fallback(
    has_ns: bool,
    ns_ptr: *const c_char,
    ns_len: usize,
    name_ptr: *const c_char,
    name_len: usize,
) -> *const Object {
    let ns = has_ns.then(|| unsafe { str_from_raw(ns_ptr, ns_len) });
    let name = unsafe { str_from_raw(name_ptr, name_len) };
    leak(Object::Keyword(Keyword::intern(ns, name)))
}
extern "C" fn corvid_rt_make_vector_fallback(items: *const *const Object, n: usize) -> *const Object {
    let items = unsafe { std::slice::from_raw_parts(items, n) };
    let values: Vec<Object> = items.iter().map(|&p| unsafe { borrow(p).clone() }).collect();
    leak(Object::Vector(corvid_core::PersistentVector::from_iter_cloned(values)))
}
extern "C" fn corvid_rt_make_set_fallback(items: *const *const Object, n: usize) -> *const Object {
    let items = unsafe { std::slice::from_raw_parts(items, n) };
    let values: Vec<Object> = items.iter().map(|&p| unsafe { borrow(p).clone() }).collect();
    leak(Object::Set(corvid_core::PersistentSet::from_iter_cloned(values)))
}
extern "C" fn corvid_rt_make_map_fallback(kv: *const *const Object, n: usize) -> *const Object {
    let kv = unsafe { std::slice::from_raw_parts(kv, n) };
    let pairs: Vec<(Object, Object)> =
        kv.chunks_exact(2).map(|pair| (unsafe { borrow(pair[0]).clone() }, unsafe { borrow(pair[1]).clone() })).collect();
    leak(Object::Map(corvid_core::PersistentMap::from_pairs(pairs)))
}
extern "C" fn corvid_rt_is_truthy_fallback(obj: *const Object) -> bool {
    is_truthy(unsafe { borrow(obj) })
}
extern "C" fn corvid_rt_def_var_fallback(name_ptr: *const c_char, name_len: usize, value: *const Object) -> *const Object {
    let name = unsafe { str_from_raw(name_ptr, name_len) };
    let ctx = active_context();
    let ns_name = ctx.current_namespace();
    let ns = ctx.intern_namespace(&ns_name);
    let var = ns.intern(name);
    if !value.is_null() {
        var.set_root(unsafe { borrow(value).clone() });
    }
    leak(Object::Var(var))
}
extern "C" fn corvid_rt_the_var_fallback(
    ns_ptr: *const c_char,
    ns_len: usize,
    name_ptr: *const c_char,
    name_len: usize,
) -> *const Object {
    let ns_name = unsafe { str_from_raw(ns_ptr, ns_len) };
    let name = unsafe { str_from_raw(name_ptr, name_len) };
    let ctx = active_context();
    let var = ctx.intern_namespace(ns_name).intern(name);
    leak(Object::Var(var))
}
extern "C" fn corvid_rt_deref_var_fallback(
    ns_ptr: *const c_char,
    ns_len: usize,
    name_ptr: *const c_char,
    name_len: usize,
) -> *const Object {
    let ns_name = unsafe { str_from_raw(ns_ptr, ns_len) };
    let name = unsafe { str_from_raw(name_ptr, name_len) };
    let ctx = active_context();
    let value = ctx
        .find_namespace(ns_name)
        .and_then(|ns| ns.find_own(name))
        .and_then(|var| var.deref().ok())
        .unwrap_or(Object::Nil);
    leak(value)
}
extern "C" fn corvid_rt_invoke_fallback(callee: *const Object, args: *const *const Object, n: usize) -> *const Object {
    let args = unsafe { std::slice::from_raw_parts(args, n) };
    let arg_objects: Vec<Object> = args.iter().map(|&p| unsafe { borrow(p).clone() }).collect();
    leak(invoke_object(unsafe { borrow(callee) }, &arg_objects))
}

/// A `Var` in callee position dereferences before invoking, the same
/// one-step indirection `(f args)` needs when `f` resolves to a var
/// holding a closure rather than the closure itself.
fn invoke_object(callee: &Object, args: &[Object]) -> Object {
    match callee {
        Object::Callable(c) => c.invoke(args).unwrap_or(Object::Nil),
        Object::Var(v) => v.deref().map(|inner| invoke_object(&inner, args)).unwrap_or(Object::Nil),
        _ => Object::Nil,
    }
}

extern "C" fn corvid_rt_ns_intern_fallback(ns_ptr: *const c_char, ns_len: usize, value: *const Object) {
    let ns_name = unsafe { str_from_raw(ns_ptr, ns_len) };
    let ctx = active_context();
    let ns = ctx.intern_namespace(ns_name);
    // AOT module loading (§4.6) interns the module's top-level value under
    // a fixed name rather than a user-visible symbol; no named-scenario
    // exercises this path (see DESIGN.md).
    ns.intern("__module__").set_root(unsafe { borrow(value).clone() });
}
extern "C" fn corvid_rt_as_long_fallback(obj: *const Object) -> i64 {
    as_long(unsafe { borrow(obj) })
}
extern "C" fn corvid_rt_as_double_fallback(obj: *const Object) -> f64 {
    as_double(unsafe { borrow(obj) })
}
extern "C" fn corvid_rt_as_bool_fallback(obj: *const Object) -> bool {
    as_bool(unsafe { borrow(obj) })
}

/// Raw pointer context handed to a C++-synthesized trampoline; `Send`/`Sync`
/// because the pointee is a heap-allocated C++ lambda this module never
/// reads, only calls back through on whatever thread invokes the closure.
struct TrampolineCtx(*mut c_void);
unsafe impl Send for TrampolineCtx {}
unsafe impl Sync for TrampolineCtx {}

type Trampoline = unsafe extern "C" fn(*mut c_void, *const *const Object, usize) -> *const Object;

pub struct ClosureBuilder {
    name: Option<String>,
    arities: Vec<(usize, TrampolineCtx, Trampoline)>,
}

extern "C" fn corvid_rt_closure_new_fallback(name_ptr: *const c_char, name_len: usize, has_name: bool) -> *mut c_void {
    let name = has_name.then(|| unsafe { str_from_raw(name_ptr, name_len) }.to_string());
    Box::into_raw(Box::new(ClosureBuilder { name, arities: Vec::new() })) as *mut c_void
}
extern "C" fn corvid_rt_closure_add_arity_fallback(
    builder: *mut c_void,
    param_count: usize,
    ctx: *mut c_void,
    trampoline: Trampoline,
) {
    let builder = unsafe { &mut *(builder as *mut ClosureBuilder) };
    builder.arities.push((param_count, TrampolineCtx(ctx), trampoline));
}
extern "C" fn corvid_rt_closure_finish_fallback(builder: *mut c_void) -> *const Object {
    let builder = unsafe { Box::from_raw(builder as *mut ClosureBuilder) };
    let mut closure = Closure::new(builder.name);
    for (param_count, ctx, trampoline) in builder.arities {
        let implementation: NativeFn = Arc::new(move |args: &[Object]| {
            let raw_args: Vec<*const Object> = args.iter().map(|o| leak(o.clone())).collect();
            let result = unsafe { trampoline(ctx.0, raw_args.as_ptr(), raw_args.len()) };
            Ok(unsafe { borrow(result).clone() })
        });
        // Every arity is registered as `Fixed`: the generated lambda's
        // variadic rest-arg slot (if any) is already folded into
        // `param_count` by codegen, and full variadic dispatch/collection
        // into a rest-arg sequence is out of scope for this pass (see
        // DESIGN.md) — calling a `defn` with the wrong argument count
        // therefore arity-errors instead of trying a variadic fallback.
        closure = closure.with_arity(Arity::Fixed(param_count), implementation);
    }
    leak(Object::Callable(Callable::Closure(Arc::new(closure))))
}

extern "C" fn corvid_rt_is_recur_signal_fallback(obj: *const Object) -> bool {
    matches!(unsafe { borrow(obj) }, Object::OpaqueBox(b) if &*b.type_descriptor == "corvid.recur-signal")
}
extern "C" fn corvid_rt_make_recur_signal_fallback(args: *const *const Object, n: usize) -> *const Object {
    let args = unsafe { std::slice::from_raw_parts(args, n) };
    let values: Vec<Object> = args.iter().map(|&p| unsafe { borrow(p).clone() }).collect();
    leak(Object::OpaqueBox(corvid_core::OpaqueBox::new("corvid.recur-signal", Arc::new(values))))
}
extern "C" fn corvid_rt_recur_get_fallback(signal: *const Object, idx: usize) -> *const Object {
    match unsafe { borrow(signal) } {
        Object::OpaqueBox(b) => match b.payload.downcast_ref::<Vec<Object>>() {
            Some(values) => leak(values.get(idx).cloned().unwrap_or(Object::Nil)),
            None => leak(Object::Nil),
        },
        _ => leak(Object::Nil),
    }
}

extern "C" fn corvid_rt_wrap_exception_fallback(ptr: *const c_char, len: usize) -> *const Object {
    let msg = unsafe { str_from_raw(ptr, len) };
    leak(Object::OpaqueBox(corvid_core::OpaqueBox::new("corvid.exception", Arc::new(msg.to_string()))))
}
extern "C" fn corvid_rt_exception_message_fallback(obj: *const Object) -> *const c_char {
    let text = match unsafe { borrow(obj) } {
        Object::OpaqueBox(b) => match b.payload.downcast_ref::<String>() {
            Some(s) => s.clone(),
            None => format!("{:?}", unsafe { borrow(obj) }),
        },
        other => format!("{other:?}"),
    };
    CString::new(text).unwrap_or_default().into_raw()
}

/// Registers every trampoline above with `ctx`'s JIT processor (§4.5
/// "symbol registration"). Idempotent: re-registering a name just
/// overwrites its stored address with the same one.
pub fn install(ctx: &RuntimeContext) {
    macro_rules! reg {
        ($name:literal, $f:expr) => {
            ctx.jit().register_symbol($name, $f as usize, true)
        };
    }
    reg!("corvid_rt_nil", corvid_rt_nil_fallback);
    reg!("corvid_rt_make_bool", corvid_rt_make_bool_fallback);
    reg!("corvid_rt_make_integer", corvid_rt_make_integer_fallback);
    reg!("corvid_rt_make_real", corvid_rt_make_real_fallback);
    reg!("corvid_rt_make_bigint", corvid_rt_make_bigint_fallback);
    reg!("corvid_rt_make_bigdecimal", corvid_rt_make_bigdecimal_fallback);
    reg!("corvid_rt_make_ratio", corvid_rt_make_ratio_fallback);
    reg!("corvid_rt_make_char", corvid_rt_make_char_fallback);
    reg!("corvid_rt_make_string", corvid_rt_make_string_fallback);
    reg!("corvid_rt_make_symbol", corvid_rt_make_symbol_fallback);
    reg!("corvid_rt_make_keyword", corvid_rt_make_keyword_fallback);
    reg!("corvid_rt_make_vector", corvid_rt_make_vector_fallback);
    reg!("corvid_rt_make_set", corvid_rt_make_set_fallback);
    reg!("corvid_rt_make_map", corvid_rt_make_map_fallback);
    reg!("corvid_rt_is_truthy", corvid_rt_is_truthy_fallback);
    reg!("corvid_rt_def_var", corvid_rt_def_var_fallback);
    reg!("corvid_rt_the_var", corvid_rt_the_var_fallback);
    reg!("corvid_rt_deref_var", corvid_rt_deref_var_fallback);
    reg!("corvid_rt_invoke", corvid_rt_invoke_fallback);
    reg!("corvid_rt_ns_intern", corvid_rt_ns_intern_fallback);
    reg!("corvid_rt_as_long", corvid_rt_as_long_fallback);
    reg!("corvid_rt_as_double", corvid_rt_as_double_fallback);
    reg!("corvid_rt_as_bool", corvid_rt_as_bool_fallback);
    reg!("corvid_rt_closure_new", corvid_rt_closure_new_fallback);
    reg!("corvid_rt_closure_add_arity", corvid_rt_closure_add_arity_fallback);
    reg!("corvid_rt_closure_finish", corvid_rt_closure_finish_fallback);
    reg!("corvid_rt_is_recur_signal", corvid_rt_is_recur_signal_fallback);
    reg!("corvid_rt_make_recur_signal", corvid_rt_make_recur_signal_fallback);
    reg!("corvid_rt_recur_get", corvid_rt_recur_get_fallback);
    reg!("corvid_rt_wrap_exception", corvid_rt_wrap_exception_fallback);
    reg!("corvid_rt_exception_message", corvid_rt_exception_message_fallback);
    // `corvid_rt_read_one` (backs `quote`) is registered by
    // `corvid_compiler::quote_abi::install` instead: it needs the reader,
    // and `corvid-runtime` cannot depend on `corvid-compiler` (the
    // dependency runs the other way).
}

/// Resolves a JIT-compiled entry symbol's `extern "C" Object const* ()`
/// export and calls it, reclaiming the leaked result as an owned
/// [`Object`] (§4.4 "Eval" codegen target; §7 scenario 1/3/5/6).
///
/// # Safety
/// `unit` must actually export a zero-argument function named `symbol`
/// matching the `CodegenTarget::Eval`/`Module`/`WasmAot` calling
/// convention codegen emits.
pub unsafe fn call_entry0(ctx: &RuntimeContext, unit: &crate::jit::CompiledUnit, symbol: &str) -> crate::error::RuntimeResult<Object> {
    let result = with_active_context(ctx, || -> crate::error::RuntimeResult<*const Object> {
        let entry = unsafe { unit.symbol::<unsafe extern "C" fn() -> *const Object>(symbol) }
            .map_err(crate::error::RuntimeError::Jit)?;
        Ok(unsafe { entry() })
    })?;
    Ok(unsafe { borrow(result) }.clone())
}
