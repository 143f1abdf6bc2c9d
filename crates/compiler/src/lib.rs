//! Reader, analyzer, and code generator for the Corvid dialect.
//!
//! This crate turns dialect source text into C++ translation units and
//! drives them through [`corvid_runtime::Jit`]. It does not implement the
//! JIT processor itself (that lives in `corvid-runtime`, alongside the
//! object model it operates on) — this crate is the front half of the
//! pipeline described in the module docs of [`reader`], [`analyzer`], and
//! [`codegen`].
//!
//! [`prelude::install`] populates a context's `clojure.core` namespace
//! with the bootstrap macros/functions the analyzer and a program's own
//! `def`s are resolved against; call it once on a freshly constructed
//! [`corvid_runtime::RuntimeContext`] before analyzing any source.
//!
//! # Extending the compiler
//!
//! Embedding projects can register additional native builtins and FFI
//! manifests without modifying the compiler itself:
//!
//! ```rust,ignore
//! use corvid_compiler::{CompilerConfig, ExternalBuiltin};
//! use corvid_compiler::ast::CppType;
//! use corvid_compiler::types::FnSignature;
//!
//! let config = CompilerConfig::new()
//!     .with_builtin(ExternalBuiltin::with_signature(
//!         "journal-append",
//!         "my_runtime_journal_append",
//!         FnSignature::new(vec![CppType::Object], CppType::Bool),
//!     ));
//! ```

pub mod analyzer;
pub mod ast;
pub mod codegen;
pub mod config;
pub mod ffi;
pub mod prelude;
pub mod quote_abi;
pub mod reader;
pub mod types;

pub use analyzer::Analyzer;
pub use ast::{AnalyzeError, Expr};
pub use codegen::{Codegen, CodeGenError, CodegenTarget};
pub use config::{CompilerConfig, ExternalBuiltin};
pub use ffi::{FfiManifest, NativeDeclRegistry};
pub use reader::{ReadForm, Reader, ReaderError};
pub use types::FnSignature;

use corvid_runtime::jit::CompiledUnit;
use corvid_runtime::RuntimeContext;
use std::path::Path;
use std::sync::Arc;

/// The crate's unified error type: any stage from reading source text
/// through loading the compiled unit can fail, and callers generally want
/// one `?`-able type rather than threading four separate ones through
/// every entry point.
#[derive(Debug)]
pub enum CompileError {
    Read(ReaderError),
    Analyze(AnalyzeError),
    Codegen(CodeGenError),
    Jit(corvid_runtime::error::JitError),
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Read(e) => write!(f, "{e}"),
            CompileError::Analyze(e) => write!(f, "{e}"),
            CompileError::Codegen(e) => write!(f, "{e}"),
            CompileError::Jit(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<ReaderError> for CompileError {
    fn from(e: ReaderError) -> Self {
        CompileError::Read(e)
    }
}
impl From<AnalyzeError> for CompileError {
    fn from(e: AnalyzeError) -> Self {
        CompileError::Analyze(e)
    }
}
impl From<CodeGenError> for CompileError {
    fn from(e: CodeGenError) -> Self {
        CompileError::Codegen(e)
    }
}
impl From<corvid_runtime::error::JitError> for CompileError {
    fn from(e: corvid_runtime::error::JitError) -> Self {
        CompileError::Jit(e)
    }
}

/// Reads and analyzes every top-level form in `source`, returning their
/// expression trees in order. An `ns` form along the way mutates `ctx`'s
/// current namespace exactly as it would during a real load, so later
/// forms in the same source resolve against it.
pub fn analyze_source(
    ctx: &RuntimeContext,
    native: &NativeDeclRegistry,
    source: &str,
    file: impl AsRef<Path>,
    features: &[String],
) -> Result<Vec<Expr>, CompileError> {
    let mut reader = Reader::new(source, file, features);
    let forms = reader.read_all()?;
    let mut analyzer = Analyzer::new(ctx, native);
    let mut exprs = Vec::with_capacity(forms.len());
    for ReadForm { form, loc } in forms {
        exprs.push(analyzer.analyze(&form, loc)?);
    }
    Ok(exprs)
}

/// Generates C++ source text for `source`, without compiling it — the
/// shape `native-source` requests (§4.7) and what `compile`/`eval` use
/// before handing the text to the JIT processor.
pub fn generate_source(
    ctx: &RuntimeContext,
    native: &NativeDeclRegistry,
    source: &str,
    file: impl AsRef<Path>,
    features: &[String],
    target: CodegenTarget,
    mangled: &str,
) -> Result<String, CompileError> {
    let exprs = analyze_source(ctx, native, source, file, features)?;
    let mut codegen = Codegen::new(target, ctx.compile_files());
    Ok(codegen.generate(&ctx.current_namespace(), mangled, &exprs)?)
}

/// The full pipeline: read, analyze, codegen, compile, and load `source`
/// as one eval-target translation unit, returning the loaded unit so its
/// entry symbol can be called.
pub fn eval_source(
    ctx: &RuntimeContext,
    native: &NativeDeclRegistry,
    source: &str,
    file: impl AsRef<Path>,
    features: &[String],
    unit_name: &str,
) -> Result<Arc<CompiledUnit>, CompileError> {
    let cpp_source = generate_source(ctx, native, source, file, features, CodegenTarget::Eval, unit_name)?;
    Ok(ctx.jit().compile_and_load(unit_name, &cpp_source)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_ctx() -> RuntimeContext {
        RuntimeContext::new(vec![], std::env::temp_dir())
    }

    #[test]
    fn generate_source_emits_an_eval_wrapper_for_a_literal() {
        let ctx = fresh_ctx();
        let native = NativeDeclRegistry::new();
        let src =
            generate_source(&ctx, &native, "42", "user.corvid", &[], CodegenTarget::Eval, "eval_0").unwrap();
        assert!(src.contains("make_integer(42LL)"));
    }

    #[test]
    fn analyze_source_tracks_namespace_changes_across_forms() {
        let ctx = fresh_ctx();
        let native = NativeDeclRegistry::new();
        analyze_source(&ctx, &native, "(ns demo.core)", "user.corvid", &[]).unwrap();
        assert_eq!(ctx.current_namespace(), "demo.core");
    }

    #[test]
    fn unresolved_symbol_surfaces_as_compile_error() {
        let ctx = fresh_ctx();
        let native = NativeDeclRegistry::new();
        let err = analyze_source(&ctx, &native, "totally-unbound", "user.corvid", &[]).unwrap_err();
        assert!(matches!(err, CompileError::Analyze(AnalyzeError::UnresolvedSymbol { .. })));
    }

    #[test]
    fn core_arithmetic_resolves_against_the_installed_prelude_and_inlines() {
        let ctx = fresh_ctx();
        prelude::install(&ctx);
        let native = NativeDeclRegistry::new();
        let src = generate_source(&ctx, &native, "(+ 1 2)", "user.corvid", &[], CodegenTarget::Eval, "eval_0").unwrap();
        // Resolves through clojure.core and inlines rather than going through
        // a dynamic deref_var/invoke pair (§4.3 auto-unboxing of builtin ops).
        assert!(src.contains("expect_object<long>"));
        assert!(!src.contains("::invoke("));
    }
}
