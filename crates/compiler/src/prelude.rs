//! Bootstrap subset of `clojure.core` (§10.5 "a minimal clojure.core-
//! equivalent prelude"): interns the analyzer-level macro names so they
//! show up as ordinary vars too, plus native [`Closure`] implementations
//! for the small set of functions every other form in a dialect program is
//! built from — arithmetic, the `seq`/`first`/`rest`/`conj`/`assoc`
//! collection operations, and `println`.
//!
//! `analyzer.rs` already recognizes `ns`/`defn`/`when`/`cond`/`->`/`->>`/
//! `deftest`/`is`/`are` by name directly in `analyze_list`, independent of
//! whether a var exists for them — interning them here is only so they
//! resolve, complete, and describe themselves the same way an ordinary var
//! does (`corvid-repl`'s `complete`/`info` ops walk `Namespace::all_vars`).
//!
//! The function vars' roots are real, directly-invokable [`Callable`]
//! trampolines written in Rust, not bodies compiled from dialect source —
//! exactly the shape `callable.rs`'s own module doc anticipates arriving
//! "from the codegen/JIT crates", supplied here by hand for the fixed set
//! of primitives that has to exist before any dialect-level library does.
//! This is independent of the native-header/C++ interop path (`ffi.rs`,
//! `cpp/`-prefixed names): these vars are plain dialect functions, invoked
//! through the same `deref_var`/`invoke` pair as anything else, just
//! implemented in Rust instead of generated C++.

use corvid_core::{Arity, Callable, Closure, MetadataExt, NativeFn, Namespace, Object, ObjectError, ObjectResult};
use corvid_core::{PersistentList, PersistentMap};
use corvid_runtime::RuntimeContext;
use std::sync::Arc;

const CORE_NS: &str = "clojure.core";

/// Names the analyzer expands inline rather than resolving through a var's
/// root (§4.3's closed set of "analyzer-level macros").
const MACROS: &[(&str, &str)] = &[
    ("ns", "Declares/switches the current namespace, processing :require/:refer/:import."),
    ("defn", "(defn name [params*] body*) - def a named fn."),
    ("when", "(when test body*) - body in an implicit do if test is truthy, else nil."),
    ("cond", "(cond test expr ... :else default) - first matching clause's expr."),
    ("->", "(-> x f1 f2 ...) - threads x as the first argument through each form."),
    ("->>", "(->> x f1 f2 ...) - threads x as the last argument through each form."),
    ("deftest", "(deftest name body*) - defines a test fn run by the nREPL `test` op."),
    ("is", "(is assertion) - records a pass/fail for assertion within a deftest."),
    ("are", "(are [bindings*] template assertions*) - is, templated over rows of args."),
];

/// Interns `clojure.core` and populates it with the bootstrap macros and
/// functions described above. Idempotent: re-running against a context
/// that already carries the namespace just re-interns the same identities
/// (`Namespace::intern` is itself idempotent).
pub fn install(ctx: &RuntimeContext) {
    crate::quote_abi::install(ctx);

    let core = ctx.intern_namespace(CORE_NS);

    for (name, doc) in MACROS {
        let var = core.intern(name);
        var.set_macro(true);
        var.alter_meta(|m| m.assoc_str("doc", *doc));
    }

    def_fn(&core, "+", "(+ & nums) - sum of nums, 0 with none.", Arc::new(|a| fold_numeric(a, 0, |x, y| x + y, |x, y| x + y)));
    def_fn(&core, "*", "(* & nums) - product of nums, 1 with none.", Arc::new(|a| fold_numeric(a, 1, |x, y| x * y, |x, y| x * y)));
    def_fn(&core, "-", "(- x) - negation. (- x & ys) - x minus each y in turn.", Arc::new(core_sub));
    def_fn(&core, "/", "(/ x) - 1/x. (/ x & ys) - x divided by each y in turn.", Arc::new(core_div));
    def_fn(&core, "=", "(= & vs) - true if every consecutive pair is equal.", Arc::new(|a| Ok(Object::Bool(a.windows(2).all(|w| w[0] == w[1])))));
    def_fn(&core, "<", "(< & nums) - true if nums are monotonically increasing.", Arc::new(|a| core_cmp(a, |x, y| x < y)));
    def_fn(&core, ">", "(> & nums) - true if nums are monotonically decreasing.", Arc::new(|a| core_cmp(a, |x, y| x > y)));
    def_fn(&core, "<=", "(<= & nums) - true if nums are non-decreasing.", Arc::new(|a| core_cmp(a, |x, y| x <= y)));
    def_fn(&core, ">=", "(>= & nums) - true if nums are non-increasing.", Arc::new(|a| core_cmp(a, |x, y| x >= y)));

    def_fn(&core, "seq", "(seq coll) - a seq over coll's elements, or nil if empty.", Arc::new(core_seq));
    def_fn(&core, "first", "(first coll) - the first element of coll's seq, or nil.", Arc::new(core_first));
    def_fn(&core, "rest", "(rest coll) - every element but the first, () if none remain.", Arc::new(core_rest));
    def_fn(&core, "conj", "(conj coll & xs) - xs added to coll the way coll's kind adds.", Arc::new(core_conj));
    def_fn(&core, "assoc", "(assoc coll k v & kvs) - coll with each k associated to v.", Arc::new(core_assoc));
    def_fn(&core, "println", "(println & xs) - prints xs space-separated plus a newline.", Arc::new(core_println));
}

fn def_fn(ns: &Arc<Namespace>, name: &str, doc: &str, f: NativeFn) {
    let var = ns.intern(name);
    var.set_root(Object::Callable(Callable::Closure(Arc::new(Closure::new(Some(name.to_string())).with_arity(Arity::Variadic(0), f)))));
    var.alter_meta(|m| m.assoc_str("doc", doc));
}

fn require_one<'a>(name: &'static str, args: &'a [Object]) -> ObjectResult<&'a Object> {
    match args {
        [only] => Ok(only),
        other => Err(ObjectError::ArityError { name: Some(name.to_string()), given: other.len() }),
    }
}

#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Real(f64),
}

impl Num {
    fn to_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Real(r) => r,
        }
    }
}

fn as_num(o: &Object) -> ObjectResult<Num> {
    match o {
        Object::Integer(i) => Ok(Num::Int(*i)),
        Object::Real(r) => Ok(Num::Real(*r)),
        other => Err(ObjectError::TypeError { expected: "number", found: other.type_name() }),
    }
}

fn fold_numeric(args: &[Object], identity: i64, op_i: fn(i64, i64) -> i64, op_f: fn(f64, f64) -> f64) -> ObjectResult<Object> {
    if args.is_empty() {
        return Ok(Object::Integer(identity));
    }
    let mut acc = as_num(&args[0])?;
    for a in &args[1..] {
        let n = as_num(a)?;
        acc = match (acc, n) {
            (Num::Int(x), Num::Int(y)) => Num::Int(op_i(x, y)),
            (x, y) => Num::Real(op_f(x.to_f64(), y.to_f64())),
        };
    }
    Ok(match acc {
        Num::Int(i) => Object::Integer(i),
        Num::Real(r) => Object::Real(r),
    })
}

fn core_sub(args: &[Object]) -> ObjectResult<Object> {
    match args {
        [] => Err(ObjectError::ArityError { name: Some("-".to_string()), given: 0 }),
        [x] => fold_numeric(&[Object::Integer(0), x.clone()], 0, |x, y| x - y, |x, y| x - y),
        _ => fold_numeric(args, 0, |x, y| x - y, |x, y| x - y),
    }
}

fn core_div(args: &[Object]) -> ObjectResult<Object> {
    match args {
        [] => Err(ObjectError::ArityError { name: Some("/".to_string()), given: 0 }),
        [x] => divide(&Object::Integer(1), x),
        [first, rest @ ..] => {
            let mut acc = first.clone();
            for y in rest {
                acc = divide(&acc, y)?;
            }
            Ok(acc)
        }
    }
}

/// Exact when both operands are integers and the division has no
/// remainder; otherwise a real. Ratios are outside this bootstrap's scope.
fn divide(a: &Object, b: &Object) -> ObjectResult<Object> {
    let (na, nb) = (as_num(a)?, as_num(b)?);
    if nb.to_f64() == 0.0 {
        return Err(ObjectError::DivisionByZero);
    }
    if let (Num::Int(x), Num::Int(y)) = (na, nb) {
        if x % y == 0 {
            return Ok(Object::Integer(x / y));
        }
    }
    Ok(Object::Real(na.to_f64() / nb.to_f64()))
}

fn core_cmp(args: &[Object], op: fn(f64, f64) -> bool) -> ObjectResult<Object> {
    let nums = args.iter().map(as_num).collect::<ObjectResult<Vec<_>>>()?;
    Ok(Object::Bool(nums.windows(2).all(|w| op(w[0].to_f64(), w[1].to_f64()))))
}

fn core_seq(args: &[Object]) -> ObjectResult<Object> {
    let coll = require_one("seq", args)?;
    Ok(match coll.seq() {
        Some(s) => Object::List(PersistentList::from_iter_rev(s.iter().cloned())),
        None => Object::Nil,
    })
}

fn core_first(args: &[Object]) -> ObjectResult<Object> {
    let coll = require_one("first", args)?;
    Ok(coll.seq().map(|s| s.first().clone()).unwrap_or(Object::Nil))
}

fn core_rest(args: &[Object]) -> ObjectResult<Object> {
    let coll = require_one("rest", args)?;
    let items: Vec<Object> = match coll.seq().and_then(|s| s.rest()) {
        Some(rest) => rest.iter().cloned().collect(),
        None => Vec::new(),
    };
    Ok(Object::List(PersistentList::from_iter_rev(items)))
}

fn core_conj(args: &[Object]) -> ObjectResult<Object> {
    let [coll, items @ ..] = args else {
        return Err(ObjectError::ArityError { name: Some("conj".to_string()), given: args.len() });
    };
    let mut acc = coll.clone();
    for item in items {
        acc = conj_one(&acc, item)?;
    }
    Ok(acc)
}

fn conj_one(coll: &Object, item: &Object) -> ObjectResult<Object> {
    match coll {
        Object::Vector(v) => Ok(Object::Vector(v.push(item.clone()))),
        Object::List(l) => Ok(Object::List(l.conj(item.clone()))),
        Object::Set(s) => Ok(Object::Set(s.conj(item.clone()))),
        Object::Nil => Ok(Object::List(PersistentList::new().conj(item.clone()))),
        other => Err(ObjectError::TypeError { expected: "vector, list, set, or nil", found: other.type_name() }),
    }
}

fn core_assoc(args: &[Object]) -> ObjectResult<Object> {
    let [coll, pairs @ ..] = args else {
        return Err(ObjectError::ArityError { name: Some("assoc".to_string()), given: args.len() });
    };
    if pairs.is_empty() || pairs.len() % 2 != 0 {
        return Err(ObjectError::ArityError { name: Some("assoc".to_string()), given: args.len() });
    }
    let mut acc = coll.clone();
    for pair in pairs.chunks_exact(2) {
        acc = assoc_one(&acc, &pair[0], &pair[1])?;
    }
    Ok(acc)
}

fn assoc_one(coll: &Object, key: &Object, value: &Object) -> ObjectResult<Object> {
    match coll {
        Object::Map(m) => Ok(Object::Map(m.assoc(key.clone(), value.clone()))),
        Object::Vector(v) => {
            let Object::Integer(i) = key else {
                return Err(ObjectError::TypeError { expected: "integer index", found: key.type_name() });
            };
            let len = v.len();
            let idx = usize::try_from(*i).map_err(|_| ObjectError::BoundsError { index: *i, len })?;
            v.assoc(idx, value.clone()).map(Object::Vector).ok_or(ObjectError::BoundsError { index: *i, len })
        }
        Object::Nil => Ok(Object::Map(PersistentMap::new().assoc(key.clone(), value.clone()))),
        other => Err(ObjectError::TypeError { expected: "map, vector, or nil", found: other.type_name() }),
    }
}

fn core_println(args: &[Object]) -> ObjectResult<Object> {
    let parts: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    println!("{}", parts.join(" "));
    Ok(Object::Nil)
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_core::PersistentVector;

    fn fresh_ctx() -> RuntimeContext {
        RuntimeContext::new(vec![], std::env::temp_dir())
    }

    fn call(ctx: &RuntimeContext, name: &str, args: &[Object]) -> ObjectResult<Object> {
        let core = ctx.find_namespace(CORE_NS).unwrap();
        let var = core.resolve(name).unwrap();
        match var.deref().unwrap() {
            Object::Callable(Callable::Closure(c)) => c.invoke(args),
            other => panic!("{name} is not a closure: {other:?}"),
        }
    }

    #[test]
    fn install_is_idempotent() {
        let ctx = fresh_ctx();
        install(&ctx);
        install(&ctx);
        let core = ctx.find_namespace(CORE_NS).unwrap();
        assert_eq!(core.all_vars().iter().filter(|(n, _)| n == "+").count(), 1);
    }

    #[test]
    fn macros_are_interned_but_unbound() {
        let ctx = fresh_ctx();
        install(&ctx);
        let core = ctx.find_namespace(CORE_NS).unwrap();
        let when = core.resolve("when").unwrap();
        assert!(when.is_macro());
        assert!(!when.is_bound());
    }

    #[test]
    fn arithmetic_promotes_to_real_on_mixed_operands() {
        let ctx = fresh_ctx();
        install(&ctx);
        assert_eq!(call(&ctx, "+", &[Object::Integer(1), Object::Integer(2)]), Ok(Object::Integer(3)));
        assert_eq!(call(&ctx, "+", &[Object::Integer(1), Object::Real(0.5)]), Ok(Object::Real(1.5)));
        assert_eq!(call(&ctx, "-", &[Object::Integer(5)]), Ok(Object::Integer(-5)));
        assert_eq!(call(&ctx, "/", &[Object::Integer(1), Object::Integer(2)]), Ok(Object::Real(0.5)));
        assert_eq!(call(&ctx, "/", &[Object::Integer(6), Object::Integer(2)]), Ok(Object::Integer(3)));
    }

    #[test]
    fn comparison_chains_across_every_pair() {
        let ctx = fresh_ctx();
        install(&ctx);
        let nums = [Object::Integer(1), Object::Integer(2), Object::Integer(3)];
        assert_eq!(call(&ctx, "<", &nums), Ok(Object::Bool(true)));
        assert_eq!(call(&ctx, ">", &nums), Ok(Object::Bool(false)));
    }

    #[test]
    fn seq_first_rest_walk_a_vector() {
        let ctx = fresh_ctx();
        install(&ctx);
        let v = Object::Vector(PersistentVector::from_iter_cloned([Object::Integer(1), Object::Integer(2), Object::Integer(3)]));
        assert_eq!(call(&ctx, "first", &[v.clone()]), Ok(Object::Integer(1)));
        let rest = call(&ctx, "rest", &[v]).unwrap();
        assert_eq!(call(&ctx, "first", &[rest]), Ok(Object::Integer(2)));
    }

    #[test]
    fn conj_appends_to_a_vector_and_prepends_to_a_list() {
        let ctx = fresh_ctx();
        install(&ctx);
        let v = Object::Vector(PersistentVector::from_iter_cloned([Object::Integer(1)]));
        let Object::Vector(result) = call(&ctx, "conj", &[v, Object::Integer(2)]).unwrap() else { panic!("expected vector") };
        assert_eq!(result.to_vec(), vec![Object::Integer(1), Object::Integer(2)]);

        let l = Object::List(PersistentList::new().conj(Object::Integer(1)));
        let Object::List(result) = call(&ctx, "conj", &[l, Object::Integer(2)]).unwrap() else { panic!("expected list") };
        assert_eq!(result.first(), Some(&Object::Integer(2)));
    }

    #[test]
    fn assoc_on_nil_builds_a_map() {
        let ctx = fresh_ctx();
        install(&ctx);
        let Object::Map(m) = call(&ctx, "assoc", &[Object::Nil, Object::Integer(1), Object::Integer(2)]).unwrap() else {
            panic!("expected map")
        };
        assert_eq!(m.get(&Object::Integer(1)), Some(&Object::Integer(2)));
    }

    #[test]
    fn division_by_zero_is_reported() {
        let ctx = fresh_ctx();
        install(&ctx);
        assert_eq!(call(&ctx, "/", &[Object::Integer(1), Object::Integer(0)]), Err(ObjectError::DivisionByZero));
    }
}
