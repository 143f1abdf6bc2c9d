//! The JIT processor: turns generated C++ source into a loaded, callable
//! shared object.
//!
//! The dialect's codegen crate emits C++ translation units (one per eval
//! form, module, or `defn`). This processor shells out to a real C++
//! toolchain via the `cc` crate's compiler-detection API (the same API
//! `cc` exposes to build scripts, used here outside of one) to produce a
//! shared object, then `libloading`s it in-process. Symbols stay loaded for
//! the lifetime of the `Jit`, so a function defined in one compilation unit
//! can be called by a later one without re-resolving anything.
//!
//! Two caches sit in front of the toolchain invocation:
//!
//! - an in-memory incremental cache, keyed by a structural hash of the
//!   generated source, so re-evaluating an unchanged form within a session
//!   never touches disk;
//! - a persistent on-disk cache under a configurable root, so unchanged
//!   units survive across process restarts (AOT-style reuse, §4.5).

use crate::error::JitError;
use libloading::Library;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, RwLock};

fn structural_hash(source: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    hasher.finish()
}

/// A single compiled-and-loaded translation unit.
pub struct CompiledUnit {
    pub name: String,
    pub object_path: PathBuf,
    library: Library,
}

impl CompiledUnit {
    /// Resolve an exported C symbol from this unit's loaded object.
    ///
    /// # Safety
    /// The caller must ensure `T` matches the actual signature of the
    /// symbol named `name`, per `libloading::Library::get`'s own contract.
    pub unsafe fn symbol<T>(&self, name: &str) -> Result<libloading::Symbol<'_, T>, JitError> {
        unsafe {
            self.library
                .get(name.as_bytes())
                .map_err(|e| JitError::LoadFailed(format!("{name}: {e}")))
        }
    }
}

/// A symbol registered with the processor before any unit that declares it
/// is compiled (§4.5 "symbol registration precedes declaration parsing").
#[derive(Clone, Copy)]
struct RegisteredSymbol {
    pointer: usize,
    callable: bool,
}

pub struct Jit {
    cache_root: PathBuf,
    incremental: RwLock<HashMap<u64, Arc<CompiledUnit>>>,
    registry: RwLock<HashMap<String, RegisteredSymbol>>,
    /// Object files compiled or loaded so far, oldest first — passed as
    /// extra link inputs to every later compile so a unit can resolve a
    /// symbol exported by an earlier one (§4.5 "a linker search order that
    /// prefers already-loaded symbols").
    load_order: RwLock<Vec<PathBuf>>,
    /// Every unit this processor has compiled or loaded, kept alive so
    /// `find_symbol` can scan their exports.
    loaded: RwLock<Vec<Arc<CompiledUnit>>>,
}

impl Jit {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Jit {
            cache_root: cache_root.into(),
            incremental: RwLock::new(HashMap::new()),
            registry: RwLock::new(HashMap::new()),
            load_order: RwLock::new(Vec::new()),
            loaded: RwLock::new(Vec::new()),
        }
    }

    /// Registers `mangled_name` as resolving to `pointer` in every
    /// translation unit compiled after this call (§4.5). `callable` marks
    /// whether the generated `-D` define should cast to the symbol's
    /// function-pointer type (a host-side function) or substitute the raw
    /// address (a host-side value).
    pub fn register_symbol(&self, mangled_name: impl Into<String>, pointer: usize, callable: bool) {
        self.registry.write().unwrap().insert(mangled_name.into(), RegisteredSymbol { pointer, callable });
    }

    /// Looks up `mangled_name` first in the registry, then across every
    /// loaded unit's exports (§4.5/§4.7 "find a symbol by mangled name").
    pub fn find_symbol(&self, mangled_name: &str) -> Option<usize> {
        if let Some(reg) = self.registry.read().unwrap().get(mangled_name) {
            return Some(reg.pointer);
        }
        for unit in self.loaded.read().unwrap().iter() {
            if let Ok(sym) = unsafe { unit.symbol::<unsafe extern "C" fn()>(mangled_name) } {
                return Some(*sym as usize);
            }
        }
        None
    }

    /// Loads a compiled object received from a remote host (§4.7 "target
    /// side": decode the response, load the object, resolve exactly one
    /// entry symbol) and resolves `factory_symbol` in it, returning both the
    /// loaded unit (kept alive for later `find_symbol` lookups) and the
    /// symbol's raw address.
    pub fn load_object(
        &self,
        bytes: &[u8],
        factory_symbol: &str,
    ) -> Result<(Arc<CompiledUnit>, usize), JitError> {
        let mut hasher = DefaultHasher::new();
        bytes.hash(&mut hasher);
        let hash = hasher.finish();

        std::fs::create_dir_all(&self.cache_root)?;
        let object_path = self.cache_root.join(format!("remote-{hash:016x}.so"));
        if !object_path.exists() {
            std::fs::write(&object_path, bytes)?;
        }

        let library =
            unsafe { Library::new(&object_path).map_err(|e| JitError::LoadFailed(e.to_string()))? };
        let address = unsafe {
            let sym: libloading::Symbol<unsafe extern "C" fn()> = library
                .get(factory_symbol.as_bytes())
                .map_err(|e| JitError::LoadFailed(format!("{factory_symbol}: {e}")))?;
            *sym as usize
        };

        let unit = Arc::new(CompiledUnit {
            name: factory_symbol.to_string(),
            object_path: object_path.clone(),
            library,
        });
        self.loaded.write().unwrap().push(unit.clone());
        self.load_order.write().unwrap().push(object_path);
        Ok((unit, address))
    }

    /// Compile `source` (a generated C++ translation unit) to a shared
    /// object named `unit_name`, loading it if not already cached.
    ///
    /// Registration order matters: codegen is expected to have already
    /// emitted extern "C" declarations for any symbol this unit calls that
    /// was defined by a prior unit (§4.5 "Symbol registration precedes
    /// declaration parsing") — the JIT processor does not reorder or defer
    /// anything, it only compiles and loads what it is given.
    pub fn compile_and_load(
        &self,
        unit_name: &str,
        source: &str,
    ) -> Result<Arc<CompiledUnit>, JitError> {
        let hash = structural_hash(source);

        if let Some(cached) = self.incremental.read().unwrap().get(&hash) {
            tracing::debug!(unit = unit_name, "jit incremental cache hit");
            return Ok(cached.clone());
        }

        std::fs::create_dir_all(&self.cache_root)?;
        let object_path = self.cache_root.join(format!("{unit_name}-{hash:016x}.so"));

        if object_path.exists() {
            tracing::debug!(unit = unit_name, path = %object_path.display(), "jit on-disk cache hit");
        } else {
            tracing::info!(unit = unit_name, "compiling translation unit");
            self.invoke_toolchain(unit_name, source, &object_path)?;
        }

        let library = unsafe {
            Library::new(&object_path).map_err(|e| JitError::LoadFailed(e.to_string()))?
        };
        let unit = Arc::new(CompiledUnit { name: unit_name.to_string(), object_path, library });

        self.incremental.write().unwrap().insert(hash, unit.clone());
        self.loaded.write().unwrap().push(unit.clone());
        Ok(unit)
    }

    fn invoke_toolchain(
        &self,
        unit_name: &str,
        source: &str,
        object_path: &Path,
    ) -> Result<(), JitError> {
        let build = cc::Build::new();
        let compiler = build.get_compiler();

        let mut full_source = crate::support::header_text();
        full_source.push_str(source);

        let source_path = self.cache_root.join(format!("{unit_name}.cpp"));
        std::fs::write(&source_path, &full_source)?;

        let mut cmd = Command::new(compiler.path());
        cmd.args(compiler.args());
        cmd.arg("-shared").arg("-fPIC").arg("-std=c++17");

        for (name, reg) in self.registry.read().unwrap().iter() {
            let define = if reg.callable {
                format!("-D{name}=((::corvid::runtime::{name}_t){:#x})", reg.pointer)
            } else {
                format!("-D{name}={:#x}", reg.pointer)
            };
            cmd.arg(define);
        }

        cmd.arg(&source_path);
        for prior in self.load_order.read().unwrap().iter() {
            cmd.arg(prior);
        }
        cmd.arg("-o").arg(object_path);

        let output = cmd
            .output()
            .map_err(|e| JitError::ToolchainUnavailable(e.to_string()))?;

        if !output.status.success() {
            return Err(JitError::CompileFailed {
                stage: "compile-and-link",
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        self.load_order.write().unwrap().push(object_path.to_path_buf());
        Ok(())
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_hash_is_stable_and_content_sensitive() {
        assert_eq!(structural_hash("int main(){}"), structural_hash("int main(){}"));
        assert_ne!(structural_hash("int main(){}"), structural_hash("int main(){return 1;}"));
    }

    #[test]
    fn find_symbol_prefers_the_registry_over_loaded_units() {
        let dir = tempfile::tempdir().unwrap();
        let jit = Jit::new(dir.path());
        jit.register_symbol("corvid_rt_nil", 0x2a, true);
        assert_eq!(jit.find_symbol("corvid_rt_nil"), Some(0x2a));
        assert_eq!(jit.find_symbol("never_registered"), None);
    }

    #[test]
    fn compile_and_load_exports_a_symbol_find_symbol_can_then_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let jit = Jit::new(dir.path());
        let unit = jit
            .compile_and_load(
                "answer_unit",
                "extern \"C\" long long answer_unit() { return 42; }\n",
            )
            .expect("toolchain must be available to run this suite");
        let f = unsafe { unit.symbol::<unsafe extern "C" fn() -> i64>("answer_unit") }.unwrap();
        assert_eq!(unsafe { f() }, 42);
        assert_eq!(jit.find_symbol("answer_unit"), Some(*f as usize));
    }

    #[test]
    fn a_second_unit_can_call_into_a_symbol_the_first_unit_exported() {
        let dir = tempfile::tempdir().unwrap();
        let jit = Jit::new(dir.path());
        jit.compile_and_load("base_unit", "extern \"C\" long long base_value() { return 7; }\n").unwrap();
        let unit = jit
            .compile_and_load(
                "caller_unit",
                "extern \"C\" long long base_value();\nextern \"C\" long long caller_unit() { return base_value() + 1; }\n",
            )
            .unwrap();
        let f = unsafe { unit.symbol::<unsafe extern "C" fn() -> i64>("caller_unit") }.unwrap();
        assert_eq!(unsafe { f() }, 8);
    }
}
