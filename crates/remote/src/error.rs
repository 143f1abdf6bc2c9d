//! Error taxonomy for the remote compile server (§6 "Remote-compile errors").

use std::fmt;

#[derive(Debug)]
pub enum RemoteError {
    /// The TCP connection failed outright (bind, accept, read, write).
    Transport(String),
    /// A request frame could not be decoded as a known request shape.
    Protocol(String),
    /// The host refused to perform the request (e.g. no such namespace
    /// policy, disabled operation) — distinct from a compile failure.
    RemoteRefused(String),
    /// Analysis or codegen succeeded but the cross-compiler rejected the
    /// generated unit; carries the toolchain's diagnostic text verbatim.
    RemoteCompileFailed(String),
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::Transport(msg) => write!(f, "transport failed: {msg}"),
            RemoteError::Protocol(msg) => write!(f, "protocol error: {msg}"),
            RemoteError::RemoteRefused(msg) => write!(f, "remote refused: {msg}"),
            RemoteError::RemoteCompileFailed(msg) => write!(f, "remote compile failed: {msg}"),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Maps a compiler-side failure to one of the error `kind` tags §6 assigns
/// to each stage, so clients can branch on `type` without parsing prose.
pub fn classify(err: &corvid_compiler::CompileError) -> &'static str {
    use corvid_compiler::ast::AnalyzeError;
    use corvid_compiler::{CompileError, ReaderError};

    match err {
        CompileError::Read(ReaderError::UnterminatedCollection { .. })
        | CompileError::Read(ReaderError::UnterminatedString { .. }) => "unterminated-…",
        CompileError::Read(ReaderError::InvalidNumericLiteral { .. }) => "invalid-number",
        CompileError::Read(ReaderError::InvalidEscape { .. }) => "invalid-escape",
        CompileError::Read(ReaderError::UnbalancedDelimiter { .. }) => "unbalanced-delimiter",
        CompileError::Read(ReaderError::UnexpectedEof { .. }) => "unterminated-…",
        CompileError::Analyze(AnalyzeError::UnresolvedSymbol { .. }) => "unresolved-symbol",
        CompileError::Analyze(AnalyzeError::InvalidDef { .. }) => "invalid-def",
        CompileError::Analyze(AnalyzeError::InvalidRecur { .. }) => "invalid-recur",
        CompileError::Analyze(AnalyzeError::WrongArity { .. }) => "wrong-arity",
        CompileError::Analyze(AnalyzeError::TypeMismatch { .. }) => "type-mismatch",
        CompileError::Analyze(AnalyzeError::InvalidCppUnbox { .. }) => "invalid-cpp-unbox",
        CompileError::Analyze(AnalyzeError::InvalidInteropCall { .. }) => "unsupported-interop",
        CompileError::Analyze(AnalyzeError::InvalidFnParam { .. }) => "invalid-def",
        CompileError::Codegen(_) => "parse-failed",
        CompileError::Jit(corvid_runtime::error::JitError::CompileFailed { .. }) => "parse-failed",
        CompileError::Jit(corvid_runtime::error::JitError::LoadFailed(_)) => "symbol-not-found",
        CompileError::Jit(_) => "link-failed",
    }
}
