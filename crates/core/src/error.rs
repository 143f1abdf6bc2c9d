//! Object-model error taxonomy.
//!
//! These map onto the "Runtime errors" row of the error taxonomy: `type-error`,
//! `bounds-error`, `unbound-var`. Analyzer, JIT and remote-compile errors live in
//! their own crates since they are local to a single request rather than the
//! object model itself.

use std::fmt;

/// Errors raised by the object model (conversions, indexing, var access).
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectError {
    /// Conversion of a non-matching object to a specific kind.
    TypeError { expected: &'static str, found: &'static str },
    /// Out-of-range index into a sequential collection.
    BoundsError { index: i64, len: usize },
    /// `deref` on a var with no binding and no root value.
    UnboundVar { ns: String, name: String },
    /// Operation attempted on a transient after `persistent!` was called.
    TransientUsedAfterPersistent,
    /// Division by zero.
    DivisionByZero,
    /// Invocation of a non-callable object.
    NotCallable { found: &'static str },
    /// Invocation with an argument count no arity of the callable accepts.
    ArityError { name: Option<String>, given: usize },
    /// Multimethod dispatch value has neither a registered method nor a default.
    NoMethodForDispatch { name: String, dispatch: String },
}

impl fmt::Display for ObjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectError::TypeError { expected, found } => {
                write!(f, "type-error: expected {expected}, found {found}")
            }
            ObjectError::BoundsError { index, len } => {
                write!(f, "bounds-error: index {index} out of range for length {len}")
            }
            ObjectError::UnboundVar { ns, name } => {
                write!(f, "unbound-var: #'{ns}/{name} has no root binding")
            }
            ObjectError::TransientUsedAfterPersistent => {
                write!(f, "type-error: transient used after persistent!")
            }
            ObjectError::DivisionByZero => write!(f, "division-by-zero"),
            ObjectError::NotCallable { found } => {
                write!(f, "not-callable: {found} is not callable")
            }
            ObjectError::ArityError { name, given } => match name {
                Some(name) => write!(f, "arity-error: {name} does not accept {given} argument(s)"),
                None => write!(f, "arity-error: fn does not accept {given} argument(s)"),
            },
            ObjectError::NoMethodForDispatch { name, dispatch } => {
                write!(f, "no-method-for-dispatch: multimethod {name} has no method for dispatch value {dispatch}")
            }
        }
    }
}

impl std::error::Error for ObjectError {}

pub type ObjectResult<T> = Result<T, ObjectError>;
