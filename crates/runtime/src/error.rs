//! Error taxonomy for the JIT processor, module loader, and runtime context.

use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum JitError {
    /// The C++ toolchain invocation itself failed to start (not found, bad PATH, ...).
    ToolchainUnavailable(String),
    /// The toolchain ran but rejected the generated source.
    CompileFailed { stage: &'static str, stderr: String },
    /// `libloading` could not open or resolve a symbol in the compiled object.
    LoadFailed(String),
    /// A symbol was declared but never registered before the declaration was parsed (§4.5/§4.6).
    SymbolNotRegistered(String),
    Io(std::io::Error),
}

impl fmt::Display for JitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JitError::ToolchainUnavailable(msg) => write!(f, "C++ toolchain unavailable: {msg}"),
            JitError::CompileFailed { stage, stderr } => {
                write!(f, "compilation failed during {stage}: {stderr}")
            }
            JitError::LoadFailed(msg) => write!(f, "failed to load compiled object: {msg}"),
            JitError::SymbolNotRegistered(name) => {
                write!(f, "symbol `{name}` was declared before it was registered")
            }
            JitError::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for JitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            JitError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for JitError {
    fn from(e: std::io::Error) -> Self {
        JitError::Io(e)
    }
}

#[derive(Debug)]
pub enum RuntimeError {
    Jit(JitError),
    /// `require`/`load` could not locate a module for the given dotted name.
    ModuleNotFound { name: String, searched: Vec<PathBuf> },
    /// A module's source changed on disk in a way incompatible with an already
    /// loaded JIT image (module loader `latest` target, §4.6).
    StaleModule(String),
    /// Attempted a non-`source` load target while `*compile-files*` is bound
    /// true; the module loader downgrades this to `source` rather than erroring,
    /// but surfaces it here when the caller asked to observe the decision.
    CompileFilesDowngrade(String),
    Object(corvid_core::ObjectError),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::Jit(e) => write!(f, "{e}"),
            RuntimeError::ModuleNotFound { name, searched } => {
                write!(f, "module not found: {name} (searched {} location(s))", searched.len())
            }
            RuntimeError::StaleModule(name) => {
                write!(f, "module `{name}` changed on disk since it was loaded")
            }
            RuntimeError::CompileFilesDowngrade(name) => {
                write!(f, "load of `{name}` downgraded to source because *compile-files* is bound")
            }
            RuntimeError::Object(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::Jit(e) => Some(e),
            RuntimeError::Object(e) => Some(e),
            _ => None,
        }
    }
}

impl From<JitError> for RuntimeError {
    fn from(e: JitError) -> Self {
        RuntimeError::Jit(e)
    }
}

impl From<corvid_core::ObjectError> for RuntimeError {
    fn from(e: corvid_core::ObjectError) -> Self {
        RuntimeError::Object(e)
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
