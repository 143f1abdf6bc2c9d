//! Vars: named, mutable, namespace-owned cells (§3 "var").
//!
//! A var's root is protected by an `RwLock`; per-thread dynamic bindings
//! (`binding`) are modeled the way most Lisp runtimes implement thread-local
//! dynamic scope: a thread-local stack keyed by the var's stable heap
//! address (vars always live behind `Arc`, so the address does not move for
//! the lifetime of the binding), rather than one `thread_local!` per `Var`
//! instance, which Rust cannot express for a dynamically created type.

use crate::error::{ObjectError, ObjectResult};
use crate::metadata::Metadata;
use crate::object::Object;
use crate::symbol::Symbol;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

thread_local! {
    static BINDING_STACKS: RefCell<HashMap<usize, Vec<Object>>> = RefCell::new(HashMap::new());
}

fn var_key(var: &Var) -> usize {
    var as *const Var as usize
}

pub struct Var {
    /// The namespace that interned this var, reported even when the var is
    /// reached through a different namespace's `refer` alias (§4.1 "a var's
    /// reported namespace is always the namespace that interned it").
    ns_name: String,
    name: Symbol,
    meta: RwLock<Metadata>,
    root: RwLock<Option<Object>>,
    is_macro: RwLock<bool>,
}

impl Var {
    pub fn new(ns_name: &str, name: Symbol) -> Arc<Var> {
        Arc::new(Var {
            ns_name: ns_name.to_string(),
            name,
            meta: RwLock::new(Metadata::new()),
            root: RwLock::new(None),
            is_macro: RwLock::new(false),
        })
    }

    pub fn ns_name(&self) -> &str {
        &self.ns_name
    }

    pub fn name(&self) -> &Symbol {
        &self.name
    }

    pub fn is_bound(&self) -> bool {
        self.has_thread_binding() || self.root.read().expect("var root lock poisoned").is_some()
    }

    fn has_thread_binding(&self) -> bool {
        let key = var_key(self);
        BINDING_STACKS.with(|stacks| {
            stacks.borrow().get(&key).map(|stack| !stack.is_empty()).unwrap_or(false)
        })
    }

    /// Top of the thread-binding stack if present, else root, else
    /// `unbound-var` (§4.1 "Var semantics").
    pub fn deref(&self) -> ObjectResult<Object> {
        let key = var_key(self);
        let bound = BINDING_STACKS.with(|stacks| stacks.borrow().get(&key).and_then(|s| s.last().cloned()));
        if let Some(v) = bound {
            return Ok(v);
        }
        self.root
            .read()
            .expect("var root lock poisoned")
            .clone()
            .ok_or_else(|| ObjectError::UnboundVar { ns: self.ns_name.clone(), name: self.name.name().to_string() })
    }

    pub fn set_root(&self, value: Object) {
        *self.root.write().expect("var root lock poisoned") = Some(value);
    }

    /// Atomically replace the root via `f`, returning the new value
    /// (§4.1 "`alter-root` ... atomic per-var").
    pub fn alter_root(&self, f: impl FnOnce(Option<Object>) -> Object) -> Object {
        let mut root = self.root.write().expect("var root lock poisoned");
        let new_value = f(root.take());
        *root = Some(new_value.clone());
        new_value
    }

    /// Push a dynamic binding for the current thread (`binding` form).
    /// Must be paired with `unbind` in lexical order.
    pub fn push_binding(&self, value: Object) {
        let key = var_key(self);
        BINDING_STACKS.with(|stacks| stacks.borrow_mut().entry(key).or_default().push(value));
    }

    pub fn pop_binding(&self) {
        let key = var_key(self);
        BINDING_STACKS.with(|stacks| {
            if let Some(stack) = stacks.borrow_mut().get_mut(&key) {
                stack.pop();
            }
        });
    }

    pub fn meta(&self) -> Metadata {
        self.meta.read().expect("var metadata lock poisoned").clone()
    }

    pub fn set_meta(&self, meta: Metadata) {
        *self.meta.write().expect("var metadata lock poisoned") = meta;
    }

    pub fn alter_meta(&self, f: impl FnOnce(Metadata) -> Metadata) {
        let mut meta = self.meta.write().expect("var metadata lock poisoned");
        *meta = f(meta.clone());
    }

    /// Whether this var's metadata marks it as a macro (analyzer-visible
    /// without requiring a full metadata-map scan on every resolution).
    pub fn is_macro(&self) -> bool {
        *self.is_macro.read().expect("var macro-flag lock poisoned")
    }

    pub fn set_macro(&self, value: bool) {
        *self.is_macro.write().expect("var macro-flag lock poisoned") = value;
    }
}

impl PartialEq for Var {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl std::fmt::Debug for Var {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#'{}/{}", self.ns_name, self.name.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbound_var_errors_on_deref() {
        let v = Var::new("user", Symbol::unqualified("x"));
        assert_eq!(
            v.deref(),
            Err(ObjectError::UnboundVar { ns: "user".to_string(), name: "x".to_string() })
        );
    }

    #[test]
    fn root_set_then_deref() {
        let v = Var::new("user", Symbol::unqualified("x"));
        v.set_root(Object::Integer(42));
        assert_eq!(v.deref(), Ok(Object::Integer(42)));
    }

    #[test]
    fn thread_binding_shadows_root() {
        let v = Var::new("user", Symbol::unqualified("x"));
        v.set_root(Object::Integer(1));
        v.push_binding(Object::Integer(2));
        assert_eq!(v.deref(), Ok(Object::Integer(2)));
        v.pop_binding();
        assert_eq!(v.deref(), Ok(Object::Integer(1)));
    }
}
