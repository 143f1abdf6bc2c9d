//! Namespaces: a symbol-to-var table plus alias bookkeeping (§3 "namespace",
//! §4.1 "Namespace semantics").
//!
//! The process-wide table of interned namespaces itself lives on
//! `RuntimeContext` (the runtime crate), not here — a `Namespace` value is
//! just the per-namespace state; `intern`/`refer`/alias bookkeeping that is
//! local to one namespace is implemented directly on this type, while
//! `require` (which needs the module loader and the global namespace table)
//! is implemented there.

use crate::symbol::Symbol;
use crate::var::Var;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

pub struct Namespace {
    name: String,
    vars: RwLock<HashMap<String, Arc<Var>>>,
    /// Vars referred in from other namespaces via `refer`, first-wins.
    refers: RwLock<HashMap<String, Arc<Var>>>,
    /// `ns`-local aliases, e.g. `(:require [other.ns :as o])`.
    aliases: RwLock<HashMap<String, String>>,
    /// Native-header scope prefixes bound by interop (§4.2 "native-header alias").
    native_header_aliases: RwLock<HashMap<String, String>>,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Arc<Namespace> {
        Arc::new(Namespace {
            name: name.into(),
            vars: RwLock::new(HashMap::new()),
            refers: RwLock::new(HashMap::new()),
            aliases: RwLock::new(HashMap::new()),
            native_header_aliases: RwLock::new(HashMap::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `intern(ns, sym) -> var`, idempotent on identity: re-interning an
    /// already-present name returns the existing var rather than replacing it
    /// (§4.1 "`intern(ns, sym) == intern(ns, sym)` (same reference)").
    pub fn intern(&self, name: &str) -> Arc<Var> {
        if let Some(existing) = self.vars.read().expect("namespace vars lock poisoned").get(name) {
            return existing.clone();
        }
        let mut vars = self.vars.write().expect("namespace vars lock poisoned");
        if let Some(existing) = vars.get(name) {
            return existing.clone();
        }
        let var = Var::new(&self.name, Symbol::new(Some(&self.name), name));
        vars.insert(name.to_string(), var.clone());
        var
    }

    pub fn find_own(&self, name: &str) -> Option<Arc<Var>> {
        self.vars.read().expect("namespace vars lock poisoned").get(name).cloned()
    }

    /// Resolution order for an unqualified symbol once lexical locals have
    /// already been checked: own interns, then referred vars (§4.3 "Symbol
    /// resolution").
    pub fn resolve(&self, name: &str) -> Option<Arc<Var>> {
        self.find_own(name).or_else(|| self.refers.read().expect("namespace refers lock poisoned").get(name).cloned())
    }

    pub fn all_vars(&self) -> Vec<(String, Arc<Var>)> {
        self.vars.read().expect("namespace vars lock poisoned").iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// `refer(ns, target-ns, :exclude S, :only S, :rename M)`. First-wins:
    /// an existing refer entry for a name is never displaced unless the
    /// caller routes it through `:rename` to a distinct local alias
    /// (§4.1, §9 open question "exact ordering of referred-var resolution").
    pub fn refer(&self, target: &Namespace, exclude: &HashSet<String>, only: Option<&HashSet<String>>, rename: &HashMap<String, String>) {
        let mut refers = self.refers.write().expect("namespace refers lock poisoned");
        for (name, var) in target.all_vars() {
            if exclude.contains(&name) {
                continue;
            }
            if let Some(only) = only {
                if !only.contains(&name) {
                    continue;
                }
            }
            let local_name = rename.get(&name).cloned().unwrap_or_else(|| name.clone());
            refers.entry(local_name).or_insert(var);
        }
    }

    pub fn add_alias(&self, alias: &str, target_ns: &str) {
        self.aliases.write().expect("namespace aliases lock poisoned").insert(alias.to_string(), target_ns.to_string());
    }

    pub fn resolve_alias(&self, alias: &str) -> Option<String> {
        self.aliases.read().expect("namespace aliases lock poisoned").get(alias).cloned()
    }

    pub fn register_native_header_alias(&self, scope: &str, header_identifier: &str) {
        self.native_header_aliases
            .write()
            .expect("namespace native-header alias lock poisoned")
            .insert(scope.to_string(), header_identifier.to_string());
    }

    pub fn resolve_native_header_alias(&self, scope: &str) -> Option<String> {
        self.native_header_aliases.read().expect("namespace native-header alias lock poisoned").get(scope).cloned()
    }
}

impl PartialEq for Namespace {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#<namespace {}>", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent_on_identity() {
        let ns = Namespace::new("user");
        let a = ns.intern("x");
        let b = ns.intern("x");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn refer_is_first_wins() {
        let producer = Namespace::new("producer");
        producer.intern("shared").set_root(crate::object::Object::Integer(1));
        let other_producer = Namespace::new("other-producer");
        other_producer.intern("shared").set_root(crate::object::Object::Integer(2));

        let consumer = Namespace::new("consumer");
        consumer.refer(&producer, &HashSet::new(), None, &HashMap::new());
        consumer.refer(&other_producer, &HashSet::new(), None, &HashMap::new());

        let resolved = consumer.resolve("shared").unwrap();
        assert_eq!(resolved.deref(), Ok(crate::object::Object::Integer(1)));
    }

    #[test]
    fn refer_exclude_and_only_filter_names() {
        let producer = Namespace::new("producer");
        producer.intern("a");
        producer.intern("b");
        producer.intern("c");

        let mut only = HashSet::new();
        only.insert("a".to_string());
        only.insert("b".to_string());
        let mut exclude = HashSet::new();
        exclude.insert("b".to_string());

        let consumer = Namespace::new("consumer");
        consumer.refer(&producer, &exclude, Some(&only), &HashMap::new());
        assert!(consumer.resolve("a").is_some());
        assert!(consumer.resolve("b").is_none());
        assert!(consumer.resolve("c").is_none());
    }
}
