//! The universal tagged value (§3 "Object", §4.1 "Object model").
//!
//! Per the design note on deep/virtual hierarchies (§9), this is a closed
//! tagged variant rather than a class hierarchy: polymorphic behavior
//! (callable, seqable, counted, reducible) is exposed as bit flags on the
//! value read off a jump table keyed by the variant's kind byte, not through
//! trait objects or downcasting.

use crate::callable::Callable;
use crate::keyword::Keyword;
use crate::namespace::Namespace;
use crate::numeric::{BigDecimalValue, BigInteger, RatioValue, SpecialDouble};
use crate::persistent::{PersistentList, PersistentMap, PersistentSet, PersistentSortedMap, PersistentSortedSet, PersistentVector};
use crate::string::RString;
use crate::symbol::Symbol;
use crate::var::Var;
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

/// A native pointer plus a type descriptor string, opaque to the dialect
/// itself (§3 "opaque box") — the representation interop code uses to hand
/// a C++-owned pointer back through dialect-level values without the
/// object model needing to know anything about its shape.
#[derive(Clone)]
pub struct OpaqueBox {
    pub type_descriptor: Arc<str>,
    pub payload: Arc<dyn Any + Send + Sync>,
}

impl OpaqueBox {
    pub fn new(type_descriptor: impl Into<Arc<str>>, payload: Arc<dyn Any + Send + Sync>) -> Self {
        OpaqueBox { type_descriptor: type_descriptor.into(), payload }
    }
}

impl fmt::Debug for OpaqueBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<opaque-box {}>", self.type_descriptor)
    }
}

impl PartialEq for OpaqueBox {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Object {
    Nil,
    Bool(bool),
    Integer(i64),
    Real(f64),
    SpecialReal(SpecialDouble),
    BigInt(BigInteger),
    BigDecimal(BigDecimalValue),
    Ratio(RatioValue),
    Char(char),
    Str(RString),
    Symbol(Symbol),
    Keyword(Keyword),
    Vector(PersistentVector<Object>),
    Map(PersistentMap<Object, Object>),
    Set(PersistentSet<Object>),
    List(PersistentList<Object>),
    SortedMap(PersistentSortedMap<Object, Object>),
    SortedSet(PersistentSortedSet<Object>),
    Var(Arc<Var>),
    Namespace(Arc<Namespace>),
    Callable(Callable),
    OpaqueBox(OpaqueBox),
}

/// Bit flags describing polymorphic behavior of an `Object` kind (§9
/// "polymorphic behavior flags ... queried via table dispatch").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BehaviorFlags(u8);

impl BehaviorFlags {
    pub const NONE: BehaviorFlags = BehaviorFlags(0);
    pub const CALLABLE: BehaviorFlags = BehaviorFlags(1 << 0);
    pub const SEQABLE: BehaviorFlags = BehaviorFlags(1 << 1);
    pub const COUNTED: BehaviorFlags = BehaviorFlags(1 << 2);
    pub const REDUCIBLE: BehaviorFlags = BehaviorFlags(1 << 3);

    const fn combine(self, other: BehaviorFlags) -> BehaviorFlags {
        BehaviorFlags(self.0 | other.0)
    }

    pub fn has(self, flag: BehaviorFlags) -> bool {
        self.0 & flag.0 == flag.0
    }
}

impl Object {
    pub fn nil() -> &'static Object {
        static NIL: OnceLock<Object> = OnceLock::new();
        NIL.get_or_init(|| Object::Nil)
    }

    /// A byte identifying the variant, for jump-table-style dispatch in hot
    /// paths (§9 "a generated jump table keyed by the kind byte").
    pub fn kind_byte(&self) -> u8 {
        match self {
            Object::Nil => 0,
            Object::Bool(_) => 1,
            Object::Integer(_) => 2,
            Object::Real(_) => 3,
            Object::SpecialReal(_) => 4,
            Object::BigInt(_) => 5,
            Object::BigDecimal(_) => 6,
            Object::Ratio(_) => 7,
            Object::Char(_) => 8,
            Object::Str(_) => 9,
            Object::Symbol(_) => 10,
            Object::Keyword(_) => 11,
            Object::Vector(_) => 12,
            Object::Map(_) => 13,
            Object::Set(_) => 14,
            Object::List(_) => 15,
            Object::SortedMap(_) => 16,
            Object::SortedSet(_) => 17,
            Object::Var(_) => 18,
            Object::Namespace(_) => 19,
            Object::Callable(_) => 20,
            Object::OpaqueBox(_) => 21,
        }
    }

    pub fn behavior_flags(&self) -> BehaviorFlags {
        match self {
            Object::Callable(_) => BehaviorFlags::CALLABLE,
            Object::Vector(_) | Object::List(_) => {
                BehaviorFlags::SEQABLE.combine(BehaviorFlags::COUNTED).combine(BehaviorFlags::REDUCIBLE)
            }
            Object::Map(_) | Object::SortedMap(_) | Object::Set(_) | Object::SortedSet(_) => {
                BehaviorFlags::SEQABLE.combine(BehaviorFlags::COUNTED).combine(BehaviorFlags::REDUCIBLE)
            }
            Object::Str(_) => BehaviorFlags::SEQABLE.combine(BehaviorFlags::COUNTED),
            Object::Nil => BehaviorFlags::SEQABLE,
            _ => BehaviorFlags::NONE,
        }
    }

    pub fn is_truthy(&self) -> bool {
        !matches!(self, Object::Nil | Object::Bool(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Nil => "nil",
            Object::Bool(_) => "boolean",
            Object::Integer(_) => "integer",
            Object::Real(_) => "real",
            Object::SpecialReal(_) => "real",
            Object::BigInt(_) => "bigint",
            Object::BigDecimal(_) => "bigdecimal",
            Object::Ratio(_) => "ratio",
            Object::Char(_) => "char",
            Object::Str(_) => "string",
            Object::Symbol(_) => "symbol",
            Object::Keyword(_) => "keyword",
            Object::Vector(_) => "vector",
            Object::Map(_) => "map",
            Object::Set(_) => "set",
            Object::List(_) => "list",
            Object::SortedMap(_) => "sorted-map",
            Object::SortedSet(_) => "sorted-set",
            Object::Var(_) => "var",
            Object::Namespace(_) => "namespace",
            Object::Callable(_) => "callable",
            Object::OpaqueBox(_) => "opaque-box",
        }
    }
}

impl Hash for Object {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u8(self.kind_byte());
        match self {
            Object::Nil => {}
            Object::Bool(b) => b.hash(state),
            Object::Integer(i) => i.hash(state),
            Object::Real(r) => r.to_bits().hash(state),
            Object::SpecialReal(s) => s.to_f64().to_bits().hash(state),
            Object::BigInt(b) => b.hash(state),
            Object::BigDecimal(d) => d.hash(state),
            Object::Ratio(r) => r.hash(state),
            Object::Char(c) => c.hash(state),
            Object::Str(s) => s.hash(state),
            Object::Symbol(s) => s.hash(state),
            Object::Keyword(k) => k.hash(state),
            // Collections: order-sensitive fold for sequential kinds, order-independent
            // for associative/unordered ones, so that structurally-equal (but
            // differently-built) collections hash identically.
            Object::Vector(v) => v.iter().for_each(|e| e.hash(state)),
            Object::List(l) => l.iter().for_each(|e| e.hash(state)),
            Object::Map(m) => {
                let mut acc: u64 = 0;
                for (k, v) in m.iter() {
                    acc ^= hash_one(k) ^ hash_one(v).rotate_left(1);
                }
                acc.hash(state);
            }
            Object::Set(s) => {
                let mut acc: u64 = 0;
                for e in s.iter() {
                    acc ^= hash_one(e);
                }
                acc.hash(state);
            }
            Object::SortedMap(m) => m.iter().for_each(|(k, v)| {
                k.hash(state);
                v.hash(state);
            }),
            Object::SortedSet(s) => s.iter().for_each(|e| e.hash(state)),
            Object::Var(v) => (Arc::as_ptr(v) as usize).hash(state),
            Object::Namespace(n) => (Arc::as_ptr(n) as usize).hash(state),
            Object::Callable(_) => 0u8.hash(state),
            Object::OpaqueBox(b) => (Arc::as_ptr(&b.payload) as *const () as usize).hash(state),
        }
    }
}

fn hash_one(obj: &Object) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    let mut h = DefaultHasher::new();
    obj.hash(&mut h);
    h.finish()
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Nil => write!(f, "nil"),
            Object::Bool(b) => write!(f, "{b}"),
            Object::Integer(i) => write!(f, "{i}"),
            Object::Real(r) => write!(f, "{r}"),
            Object::SpecialReal(s) => write!(f, "{}", s.reader_token()),
            Object::BigInt(b) => write!(f, "{b}"),
            Object::BigDecimal(d) => write!(f, "{d}"),
            Object::Ratio(r) => write!(f, "{r}"),
            Object::Char(c) => write!(f, "\\{c}"),
            Object::Str(s) => write!(f, "{s}"),
            Object::Symbol(s) => write!(f, "{s}"),
            Object::Keyword(k) => write!(f, "{k}"),
            Object::Vector(v) => {
                write!(f, "[")?;
                for (i, e) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, "]")
            }
            Object::List(l) => {
                write!(f, "(")?;
                for (i, e) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, ")")
            }
            Object::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k} {v}")?;
                }
                write!(f, "}}")
            }
            Object::Set(s) => {
                write!(f, "#{{")?;
                for (i, e) in s.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, "}}")
            }
            Object::SortedMap(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k} {v}")?;
                }
                write!(f, "}}")
            }
            Object::SortedSet(s) => {
                write!(f, "#{{")?;
                for (i, e) in s.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, "}}")
            }
            Object::Var(v) => write!(f, "{v:?}"),
            Object::Namespace(n) => write!(f, "#<namespace {}>", n.name()),
            Object::Callable(c) => match c.name() {
                Some(n) => write!(f, "#<callable {n}>"),
                None => write!(f, "#<callable anonymous>"),
            },
            Object::OpaqueBox(b) => write!(f, "#<opaque-box {}>", b.type_descriptor),
        }
    }
}

impl From<i64> for Object {
    fn from(v: i64) -> Self {
        Object::Integer(v)
    }
}
impl From<f64> for Object {
    fn from(v: f64) -> Self {
        Object::Real(v)
    }
}
impl From<bool> for Object {
    fn from(v: bool) -> Self {
        Object::Bool(v)
    }
}
impl From<&str> for Object {
    fn from(v: &str) -> Self {
        Object::Str(RString::new(v))
    }
}
impl From<String> for Object {
    fn from(v: String) -> Self {
        Object::Str(RString::new(&v))
    }
}
impl From<Keyword> for Object {
    fn from(v: Keyword) -> Self {
        Object::Keyword(v)
    }
}
impl From<Symbol> for Object {
    fn from(v: Symbol) -> Self {
        Object::Symbol(v)
    }
}

/// A total order over `Object`, needed so `Object` can key a
/// `PersistentSortedMap`/`PersistentSortedSet` (§4.1 "sorted variants").
/// Orderable scalar kinds compare by value; everything else falls back to
/// comparing `Display` output, which is consistent (if not meaningful) for
/// kinds the dialect never actually sorts by.
impl Eq for Object {}

impl PartialOrd for Object {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Object {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self, other) {
            (Object::Nil, Object::Nil) => Ordering::Equal,
            (Object::Bool(a), Object::Bool(b)) => a.cmp(b),
            (Object::Integer(a), Object::Integer(b)) => a.cmp(b),
            (Object::Real(a), Object::Real(b)) => a.total_cmp(b),
            (Object::Char(a), Object::Char(b)) => a.cmp(b),
            (Object::Str(a), Object::Str(b)) => a.as_str().cmp(b.as_str()),
            (Object::Keyword(a), Object::Keyword(b)) => (a.ns(), a.name()).cmp(&(b.ns(), b.name())),
            (Object::Symbol(a), Object::Symbol(b)) => (a.ns(), a.name()).cmp(&(b.ns(), b.name())),
            _ if self.kind_byte() != other.kind_byte() => self.kind_byte().cmp(&other.kind_byte()),
            _ => self.to_string().cmp(&other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_and_false_are_falsy_everything_else_truthy() {
        assert!(!Object::Nil.is_truthy());
        assert!(!Object::Bool(false).is_truthy());
        assert!(Object::Bool(true).is_truthy());
        assert!(Object::Integer(0).is_truthy());
    }

    #[test]
    fn structurally_equal_maps_hash_equal() {
        let a = PersistentMap::new().assoc(Object::Integer(1), Object::Integer(2)).assoc(Object::Integer(3), Object::Integer(4));
        let b = PersistentMap::new().assoc(Object::Integer(3), Object::Integer(4)).assoc(Object::Integer(1), Object::Integer(2));
        let oa = Object::Map(a);
        let ob = Object::Map(b);
        assert_eq!(oa, ob);
        assert_eq!(hash_one(&oa), hash_one(&ob));
    }

    #[test]
    fn display_renders_collections_reader_style() {
        let v = Object::Vector(PersistentVector::from_iter_cloned([Object::Integer(1), Object::Integer(2)]));
        assert_eq!(v.to_string(), "[1 2]");
    }

    #[test]
    fn behavior_flags_mark_collections_seqable_and_counted() {
        let v = Object::Vector(PersistentVector::<Object>::new());
        assert!(v.behavior_flags().has(BehaviorFlags::SEQABLE));
        assert!(v.behavior_flags().has(BehaviorFlags::COUNTED));
        assert!(!Object::Integer(1).behavior_flags().has(BehaviorFlags::SEQABLE));
    }
}
