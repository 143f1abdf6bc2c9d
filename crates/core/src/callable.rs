//! Callables: the runtime representation invocation dispatches against
//! (§4.1 "callable"), covering `fn*` closures compiled from analyzed code
//! (arities 0 through 10 plus a variadic tail) and multimethods.
//!
//! JIT-compiled function bodies end up here as a boxed `Fn(&[Object]) ->
//! ObjectResult<Object>` trampoline; the codegen/JIT crates are responsible
//! for producing that trampoline, this module only for dispatching to it
//! once an `Object::Callable` reaches `invoke`.

use crate::error::{ObjectError, ObjectResult};
use crate::object::Object;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

pub type NativeFn = Arc<dyn Fn(&[Object]) -> ObjectResult<Object> + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    /// At least `min` fixed arguments, plus any number collected into a rest arg.
    Variadic(usize),
}

impl Arity {
    fn accepts(self, given: usize) -> bool {
        match self {
            Arity::Fixed(n) => n == given,
            Arity::Variadic(min) => given >= min,
        }
    }
}

#[derive(Clone)]
struct FnArity {
    arity: Arity,
    implementation: NativeFn,
}

/// A closure compiled from `fn*`: one or more arities, each dispatched by
/// exact match first, falling back to the variadic arity if present.
#[derive(Clone)]
pub struct Closure {
    name: Option<String>,
    arities: Vec<FnArity>,
}

impl Closure {
    pub fn new(name: Option<String>) -> Self {
        Closure { name, arities: Vec::new() }
    }

    pub fn with_arity(mut self, arity: Arity, implementation: NativeFn) -> Self {
        self.arities.push(FnArity { arity, implementation });
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn invoke(&self, args: &[Object]) -> ObjectResult<Object> {
        if let Some(fixed) = self.arities.iter().find(|a| matches!(a.arity, Arity::Fixed(n) if n == args.len())) {
            return (fixed.implementation)(args);
        }
        if let Some(variadic) = self.arities.iter().find(|a| matches!(a.arity, Arity::Variadic(min) if args.len() >= min)) {
            return (variadic.implementation)(args);
        }
        Err(ObjectError::ArityError { name: self.name.clone(), given: args.len() })
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(n) => write!(f, "#<closure {n}>"),
            None => write!(f, "#<closure anonymous>"),
        }
    }
}

/// A multimethod: dispatch computed by `dispatch_fn`, routed to a method
/// keyed by the dispatch value's textual form (§4.1's "multimethods" case
/// of "callable"; real dispatch values are usually keywords or type tags,
/// both of which round-trip losslessly through `Display`).
pub struct Multimethod {
    name: String,
    dispatch_fn: NativeFn,
    methods: RwLock<HashMap<String, NativeFn>>,
    default: RwLock<Option<NativeFn>>,
}

impl Multimethod {
    pub fn new(name: impl Into<String>, dispatch_fn: NativeFn) -> Self {
        Multimethod { name: name.into(), dispatch_fn, methods: RwLock::new(HashMap::new()), default: RwLock::new(None) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_method(&self, dispatch_value: impl Into<String>, implementation: NativeFn) {
        self.methods.write().expect("multimethod table poisoned").insert(dispatch_value.into(), implementation);
    }

    pub fn set_default(&self, implementation: NativeFn) {
        *self.default.write().expect("multimethod default poisoned") = Some(implementation);
    }

    pub fn invoke(&self, args: &[Object]) -> ObjectResult<Object> {
        let dispatch = (self.dispatch_fn)(args)?;
        let key = format!("{}", DisplayObject(&dispatch));
        let methods = self.methods.read().expect("multimethod table poisoned");
        if let Some(implementation) = methods.get(&key) {
            return implementation(args);
        }
        drop(methods);
        if let Some(default) = self.default.read().expect("multimethod default poisoned").as_ref() {
            return default(args);
        }
        Err(ObjectError::NoMethodForDispatch { name: self.name.clone(), dispatch: key })
    }
}

struct DisplayObject<'a>(&'a Object);
impl fmt::Display for DisplayObject<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Multimethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<multimethod {}>", self.name)
    }
}

#[derive(Clone, Debug)]
pub enum Callable {
    Closure(Arc<Closure>),
    Multimethod(Arc<Multimethod>),
}

impl Callable {
    pub fn invoke(&self, args: &[Object]) -> ObjectResult<Object> {
        match self {
            Callable::Closure(c) => c.invoke(args),
            Callable::Multimethod(m) => m.invoke(args),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Callable::Closure(c) => c.name(),
            Callable::Multimethod(m) => Some(m.name()),
        }
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Callable::Closure(a), Callable::Closure(b)) => Arc::ptr_eq(a, b),
            (Callable::Multimethod(a), Callable::Multimethod(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_dispatches_by_arity() {
        let closure = Closure::new(Some("add".to_string()))
            .with_arity(Arity::Fixed(0), Arc::new(|_| Ok(Object::Integer(0))))
            .with_arity(Arity::Variadic(1), Arc::new(|args| {
                Ok(Object::Integer(args.len() as i64))
            }));
        let callable = Callable::Closure(Arc::new(closure));
        assert_eq!(callable.invoke(&[]), Ok(Object::Integer(0)));
        assert_eq!(callable.invoke(&[Object::Nil, Object::Nil]), Ok(Object::Integer(2)));
    }

    #[test]
    fn unmatched_arity_errors() {
        let closure = Closure::new(None).with_arity(Arity::Fixed(1), Arc::new(|_| Ok(Object::Nil)));
        let callable = Callable::Closure(Arc::new(closure));
        assert_eq!(callable.invoke(&[]), Err(ObjectError::ArityError { name: None, given: 0 }));
    }

    #[test]
    fn multimethod_dispatches_on_computed_value() {
        let mm = Multimethod::new("area", Arc::new(|args| Ok(args[0].clone())));
        mm.add_method(":circle", Arc::new(|_| Ok(Object::Integer(1))));
        mm.add_method(":square", Arc::new(|_| Ok(Object::Integer(2))));
        let callable = Callable::Multimethod(Arc::new(mm));
        let circle = Object::Keyword(crate::keyword::Keyword::intern(None, "circle"));
        assert_eq!(callable.invoke(&[circle]), Ok(Object::Integer(1)));
    }
}
