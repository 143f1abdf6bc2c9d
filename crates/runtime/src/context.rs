//! The runtime context: the single process-wide container for namespaces,
//! the module loader, the JIT processor, and the incremental/persistent
//! def caches (§4.6).
//!
//! Modeled as an explicit struct held and passed by the executor rather than
//! free-standing process globals, per the spec's own design note — the one
//! exception is keyword interning, which `corvid_core::Keyword` already
//! implements as a process-wide table (see that module's doc comment); this
//! context does not duplicate it.

use crate::error::{RuntimeError, RuntimeResult};
use crate::jit::{CompiledUnit, Jit};
use crate::module_loader::{LoadOrigin, ModuleLoader};
use corvid_core::{Namespace, Var};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Allocator {
    /// The default: ordinary `Arc`-refcounted allocation, collected when the
    /// last reference drops.
    Gc,
    /// A scoped arena honoring the immer-style persistent-container
    /// allocator protocol; nodes allocated here must not outlive the arena
    /// unless re-rooted through a copy (§4.6 "Allocator swap").
    Arena,
}

thread_local! {
    static CURRENT_NAMESPACE: RefCell<String> = RefCell::new("user".to_string());
    static CURRENT_ALLOCATOR: Cell<Allocator> = const { Cell::new(Allocator::Gc) };
}

/// One entry in the incremental def cache: a def's qualified name maps to
/// the structural hash it was last compiled from plus the var it produced.
/// Source positions and counter-based gensym names are excluded from the
/// hash so formatting-only edits still hit the cache.
struct DefCacheEntry {
    structural_hash: u64,
    var: Arc<Var>,
}

pub struct RuntimeContext {
    namespaces: RwLock<HashMap<String, Arc<Namespace>>>,
    compile_files: AtomicBool,
    module_loader: ModuleLoader,
    jit: Jit,
    def_cache: RwLock<HashMap<String, DefCacheEntry>>,
    loaded_modules: RwLock<HashMap<String, Arc<CompiledUnit>>>,
}

impl RuntimeContext {
    pub fn new(module_search_paths: Vec<PathBuf>, jit_cache_root: impl Into<PathBuf>) -> Self {
        let ctx = RuntimeContext {
            namespaces: RwLock::new(HashMap::new()),
            compile_files: AtomicBool::new(false),
            module_loader: ModuleLoader::new(module_search_paths),
            jit: Jit::new(jit_cache_root),
            def_cache: RwLock::new(HashMap::new()),
            loaded_modules: RwLock::new(HashMap::new()),
        };
        crate::abi::install(&ctx);
        ctx
    }

    /// Look up or create the namespace named `name`, idempotently.
    pub fn intern_namespace(&self, name: &str) -> Arc<Namespace> {
        if let Some(ns) = self.namespaces.read().unwrap().get(name) {
            return ns.clone();
        }
        let mut table = self.namespaces.write().unwrap();
        table
            .entry(name.to_string())
            .or_insert_with(|| Namespace::new(name))
            .clone()
    }

    pub fn find_namespace(&self, name: &str) -> Option<Arc<Namespace>> {
        self.namespaces.read().unwrap().get(name).cloned()
    }

    pub fn all_namespaces(&self) -> Vec<Arc<Namespace>> {
        self.namespaces.read().unwrap().values().cloned().collect()
    }

    pub fn compile_files(&self) -> bool {
        self.compile_files.load(Ordering::SeqCst)
    }

    pub fn set_compile_files(&self, value: bool) {
        self.compile_files.store(value, Ordering::SeqCst);
    }

    pub fn current_namespace(&self) -> String {
        CURRENT_NAMESPACE.with(|ns| ns.borrow().clone())
    }

    pub fn set_current_namespace(&self, name: impl Into<String>) {
        CURRENT_NAMESPACE.with(|ns| *ns.borrow_mut() = name.into());
    }

    pub fn current_allocator(&self) -> Allocator {
        CURRENT_ALLOCATOR.with(|a| a.get())
    }

    /// Run `f` with the thread-local allocator swapped to `allocator`,
    /// restoring the previous allocator on return (§4.6 "Allocator swap").
    pub fn with_allocator<T>(&self, allocator: Allocator, f: impl FnOnce() -> T) -> T {
        let previous = CURRENT_ALLOCATOR.with(|a| a.replace(allocator));
        let result = f();
        CURRENT_ALLOCATOR.with(|a| a.set(previous));
        result
    }

    pub fn jit(&self) -> &Jit {
        &self.jit
    }

    pub fn module_loader(&self) -> &ModuleLoader {
        &self.module_loader
    }

    /// `require(ns, init?)`: resolve and load a module by dotted name
    /// exactly once per process, per the requested origin.
    pub fn require(
        &self,
        dotted_name: &str,
        origin: LoadOrigin,
        compiled_source: impl FnOnce() -> RuntimeResult<String>,
    ) -> RuntimeResult<Arc<CompiledUnit>> {
        if let Some(unit) = self.loaded_modules.read().unwrap().get(dotted_name) {
            return Ok(unit.clone());
        }

        let resolved = self.module_loader.resolve(dotted_name)?;
        // `effective_origin` folds in the constrained-target downgrade and
        // the artifact-freshness check; either way this falls through to a
        // fresh compile from source rather than erroring (§4.6).
        let _effective = self.module_loader.effective_origin(&resolved, origin);

        let source = compiled_source()?;
        let unit = self.jit.compile_and_load(dotted_name, &source)?;

        let mut loaded = self.loaded_modules.write().unwrap();
        let unit = loaded.entry(dotted_name.to_string()).or_insert(unit).clone();
        Ok(unit)
    }

    /// Consult the incremental def cache for `qualified_name`, returning the
    /// cached var without recompiling when `structural_hash` matches.
    pub fn def_cache_lookup(&self, qualified_name: &str, structural_hash: u64) -> Option<Arc<Var>> {
        let cache = self.def_cache.read().unwrap();
        cache.get(qualified_name).and_then(|entry| {
            (entry.structural_hash == structural_hash).then(|| entry.var.clone())
        })
    }

    pub fn def_cache_insert(&self, qualified_name: &str, structural_hash: u64, var: Arc<Var>) {
        self.def_cache
            .write()
            .unwrap()
            .insert(qualified_name.to_string(), DefCacheEntry { structural_hash, var });
    }
}

/// Error used when a constrained target reports a `Latest` request that had
/// to be served from source; callers that care about observing the
/// downgrade (vs. silently accepting it, which `require` does) can check
/// `ModuleLoader::effective_origin` themselves before calling `require`.
pub fn downgrade_error(dotted_name: &str) -> RuntimeError {
    RuntimeError::CompileFilesDowngrade(dotted_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_intern_is_idempotent() {
        let ctx = RuntimeContext::new(vec![], std::env::temp_dir());
        let a = ctx.intern_namespace("user");
        let b = ctx.intern_namespace("user");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn current_namespace_defaults_to_user_and_is_settable() {
        let ctx = RuntimeContext::new(vec![], std::env::temp_dir());
        assert_eq!(ctx.current_namespace(), "user");
        ctx.set_current_namespace("my.app");
        assert_eq!(ctx.current_namespace(), "my.app");
    }

    #[test]
    fn allocator_swap_restores_previous_on_scope_exit() {
        let ctx = RuntimeContext::new(vec![], std::env::temp_dir());
        assert_eq!(ctx.current_allocator(), Allocator::Gc);
        ctx.with_allocator(Allocator::Arena, || {
            assert_eq!(ctx.current_allocator(), Allocator::Arena);
        });
        assert_eq!(ctx.current_allocator(), Allocator::Gc);
    }

    #[test]
    fn def_cache_hits_only_on_matching_structural_hash() {
        let ctx = RuntimeContext::new(vec![], std::env::temp_dir());
        let ns = ctx.intern_namespace("user");
        let var = ns.intern("x");
        ctx.def_cache_insert("user/x", 42, var.clone());
        assert!(ctx.def_cache_lookup("user/x", 42).is_some());
        assert!(ctx.def_cache_lookup("user/x", 7).is_none());
    }
}
