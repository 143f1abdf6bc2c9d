//! Object model for the dialect's core compilation/execution pipeline: the
//! universal tagged value, persistent collections, vars, namespaces, and
//! metadata (§4.1).
//!
//! # Modules
//!
//! - `error`: the object model's error taxonomy (`type-error`, `bounds-error`,
//!   `unbound-var`, ...)
//! - `string`: immutable, hash-memoized strings
//! - `numeric`: bigint/bigdecimal/ratio and the IEEE-754 special doubles
//! - `keyword`: process-interned `:foo`/`:ns/foo`
//! - `symbol`: `foo`/`ns/foo`, value-equal, metadata-bearing
//! - `metadata`: the keyword-keyed map attached to symbols, vars, and collections
//! - `persistent`: vector/map/set/list/sorted-map/sorted-set + transients
//! - `seq`: the universal lazy, restartable sequence protocol
//! - `var`: namespace-owned mutable cells with thread-local dynamic binding
//! - `namespace`: symbol-to-var tables, refers, and aliases
//! - `callable`: closures and multimethods
//! - `object`: the closed tagged `Object` enum unifying all of the above

pub mod callable;
pub mod error;
pub mod keyword;
pub mod metadata;
pub mod namespace;
pub mod numeric;
pub mod object;
pub mod persistent;
pub mod seq;
pub mod string;
pub mod symbol;
pub mod var;

pub use callable::{Arity, Callable, Closure, Multimethod, NativeFn};
pub use error::{ObjectError, ObjectResult};
pub use keyword::Keyword;
pub use metadata::{Metadata, MetadataExt};
pub use namespace::Namespace;
pub use numeric::{BigDecimalValue, BigInteger, RatioValue, SpecialDouble};
pub use object::{BehaviorFlags, Object, OpaqueBox};
pub use persistent::{
    PersistentList, PersistentMap, PersistentSet, PersistentSortedMap, PersistentSortedSet,
    PersistentVector, TransientMap, TransientSet, TransientVector,
};
pub use seq::Seq;
pub use string::RString;
pub use symbol::Symbol;
pub use var::Var;
