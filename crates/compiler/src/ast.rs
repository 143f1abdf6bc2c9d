//! Source locations and the analyzer's typed expression tree (§4.3
//! "Expression kinds (closed variant)").

use corvid_core::{Object, Symbol};
use std::path::PathBuf;
use std::rc::Rc;

/// A span in a source buffer, attached by the reader to every form and
/// preserved verbatim through macro expansion (absolute file/line/col, never
/// recomputed relative to an enclosing macro's expansion site).
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl SourceLocation {
    pub fn new(file: PathBuf, start_line: usize, start_col: usize, end_line: usize, end_col: usize) -> Self {
        SourceLocation { file, start_line, start_col, end_line, end_col }
    }

    pub fn placeholder() -> Self {
        SourceLocation { file: PathBuf::new(), start_line: 0, start_col: 0, end_line: 0, end_col: 0 }
    }

    pub fn is_placeholder(&self) -> bool {
        self.file.as_os_str().is_empty()
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.start_line + 1, self.start_col + 1)
    }
}

/// Conversion policy for a `cpp-cast` node (§4.3 "C++ cast (with conversion
/// policy...)").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastPolicy {
    /// Unbox a dialect object into a native C++ value (`expect-object<T>(…)->data`).
    FromObject,
    /// Box a native C++ value back into a dialect object.
    IntoObject,
    /// A native-to-native conversion with no object boxing on either side.
    CppToCpp,
}

/// A C++ type tag used to drive auto-unboxing and codegen type decisions.
/// Distinct from the dialect's own `Object` kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CppType {
    Void,
    Bool,
    Long,
    Double,
    Pointer(Box<CppType>),
    Reference(Box<CppType>),
    Class(String),
    /// Unresolved/opaque — treated as "untyped object" per §4.3 void-valued-call handling.
    Object,
}

impl std::fmt::Display for CppType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CppType::Void => write!(f, "void"),
            CppType::Bool => write!(f, "bool"),
            CppType::Long => write!(f, "long"),
            CppType::Double => write!(f, "double"),
            CppType::Pointer(inner) => write!(f, "{inner}*"),
            CppType::Reference(inner) => write!(f, "{inner}&"),
            CppType::Class(name) => write!(f, "{name}"),
            CppType::Object => write!(f, "object*"),
        }
    }
}

/// A function arity: a parameter name list plus whether the final parameter
/// collects trailing arguments (`& rest`), and the body expressions.
#[derive(Debug, Clone)]
pub struct FnArity {
    pub params: Vec<Symbol>,
    pub variadic: bool,
    pub body: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub struct CatchClause {
    pub exception_type: Option<String>,
    pub binding: Symbol,
    pub body: Vec<Expr>,
}

/// The analyzer's closed expression variant (§4.3). Codegen is mechanical
/// over this tree; all language semantics are resolved by the time a tree
/// reaches codegen.
#[derive(Debug, Clone)]
pub enum Expr {
    Literal { value: Object, loc: SourceLocation },
    VectorCtor { items: Vec<Expr>, loc: SourceLocation },
    MapCtor { entries: Vec<(Expr, Expr)>, loc: SourceLocation },
    SetCtor { items: Vec<Expr>, loc: SourceLocation },

    If { test: Box<Expr>, then: Box<Expr>, else_: Option<Box<Expr>>, loc: SourceLocation },
    Do { body: Vec<Expr>, loc: SourceLocation },
    Let { bindings: Vec<(Symbol, Expr)>, body: Vec<Expr>, loc: SourceLocation },
    LetFn { bindings: Vec<(Symbol, Rc<FnArity>)>, body: Vec<Expr>, loc: SourceLocation },
    Loop { bindings: Vec<(Symbol, Expr)>, body: Vec<Expr>, loc: SourceLocation },
    Recur { args: Vec<Expr>, loc: SourceLocation },
    Fn { name: Option<Symbol>, arities: Vec<FnArity>, loc: SourceLocation },

    Def { name: Symbol, value: Option<Box<Expr>>, loc: SourceLocation },
    Var { ns: String, name: String, loc: SourceLocation },
    VarDeref { ns: String, name: String, loc: SourceLocation },
    LocalRef { name: Symbol, loc: SourceLocation },

    Invoke { callee: Box<Expr>, args: Vec<Expr>, loc: SourceLocation },

    Try {
        body: Vec<Expr>,
        catches: Vec<CatchClause>,
        finally: Option<Vec<Expr>>,
        loc: SourceLocation,
    },
    Throw { value: Box<Expr>, loc: SourceLocation },

    Quote { form: Object, loc: SourceLocation },

    CppRaw { source: String, loc: SourceLocation },
    CppValue { expression: String, ty: CppType, loc: SourceLocation },
    CppNew { class: String, args: Vec<Expr>, loc: SourceLocation },
    CppMemberAccess { target: Box<Expr>, member: String, loc: SourceLocation },
    CppMemberCall { target: Box<Expr>, member: String, args: Vec<Expr>, loc: SourceLocation },
    CppGlobalCall { path: String, args: Vec<Expr>, loc: SourceLocation },
    CppBuiltinOp { op: String, args: Vec<Expr>, loc: SourceLocation },
    CppCast { value: Box<Expr>, target: CppType, policy: CastPolicy, loc: SourceLocation },
    CppUnbox { value: Box<Expr>, ty: CppType, loc: SourceLocation },
}

impl Expr {
    pub fn loc(&self) -> &SourceLocation {
        match self {
            Expr::Literal { loc, .. }
            | Expr::VectorCtor { loc, .. }
            | Expr::MapCtor { loc, .. }
            | Expr::SetCtor { loc, .. }
            | Expr::If { loc, .. }
            | Expr::Do { loc, .. }
            | Expr::Let { loc, .. }
            | Expr::LetFn { loc, .. }
            | Expr::Loop { loc, .. }
            | Expr::Recur { loc, .. }
            | Expr::Fn { loc, .. }
            | Expr::Def { loc, .. }
            | Expr::Var { loc, .. }
            | Expr::VarDeref { loc, .. }
            | Expr::LocalRef { loc, .. }
            | Expr::Invoke { loc, .. }
            | Expr::Try { loc, .. }
            | Expr::Throw { loc, .. }
            | Expr::Quote { loc, .. }
            | Expr::CppRaw { loc, .. }
            | Expr::CppValue { loc, .. }
            | Expr::CppNew { loc, .. }
            | Expr::CppMemberAccess { loc, .. }
            | Expr::CppMemberCall { loc, .. }
            | Expr::CppGlobalCall { loc, .. }
            | Expr::CppBuiltinOp { loc, .. }
            | Expr::CppCast { loc, .. }
            | Expr::CppUnbox { loc, .. } => loc,
        }
    }
}

/// The analyzer's error taxonomy (§4.3 "Analyzer error taxonomy").
#[derive(Debug)]
pub enum AnalyzeError {
    UnresolvedSymbol { name: String, loc: SourceLocation },
    InvalidDef { reason: String, loc: SourceLocation },
    InvalidFnParam { reason: String, loc: SourceLocation },
    InvalidRecur { reason: String, loc: SourceLocation },
    InvalidCppUnbox { reason: String, loc: SourceLocation },
    InvalidInteropCall { reason: String, loc: SourceLocation },
    TypeMismatch { expected: CppType, found: CppType, loc: SourceLocation },
    WrongArity { name: String, given: usize, loc: SourceLocation },
}

impl std::fmt::Display for AnalyzeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalyzeError::UnresolvedSymbol { name, loc } => {
                write!(f, "{loc}: unresolved symbol `{name}`")
            }
            AnalyzeError::InvalidDef { reason, loc } => write!(f, "{loc}: invalid def: {reason}"),
            AnalyzeError::InvalidFnParam { reason, loc } => {
                write!(f, "{loc}: invalid fn parameter: {reason}")
            }
            AnalyzeError::InvalidRecur { reason, loc } => write!(f, "{loc}: invalid recur: {reason}"),
            AnalyzeError::InvalidCppUnbox { reason, loc } => {
                write!(f, "{loc}: invalid C++ unbox: {reason}")
            }
            AnalyzeError::InvalidInteropCall { reason, loc } => {
                write!(f, "{loc}: invalid interop call: {reason}")
            }
            AnalyzeError::TypeMismatch { expected, found, loc } => {
                write!(f, "{loc}: type mismatch: expected {expected}, found {found}")
            }
            AnalyzeError::WrongArity { name, given, loc } => {
                write!(f, "{loc}: wrong number of arguments ({given}) to `{name}`")
            }
        }
    }
}

impl std::error::Error for AnalyzeError {}

pub type AnalyzeResult<T> = Result<T, AnalyzeError>;
