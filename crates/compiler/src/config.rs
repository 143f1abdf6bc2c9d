//! Compiler configuration for extensibility.
//!
//! Lets an embedding project extend the compiler with additional native
//! builtins and FFI manifests without modifying the compiler itself.
//!
//! # Example
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

use crate::types::FnSignature;
use std::path::PathBuf;

/// Definition of an external builtin function provided by an embedding
/// runtime, callable from dialect code under `dialect_name`.
///
/// # Type safety
///
/// - **With a signature**: the analyzer validates argument count and
///   performs the same auto-unboxing/cast-policy treatment it applies to
///   any other interop call.
/// - **Without a signature (`None`)**: the analyzer accepts any arity and
///   treats every argument and the result as an opaque `Object`. Calls to
///   this builtin are not checked until runtime.
#[derive(Debug, Clone)]
pub struct ExternalBuiltin {
    /// The name used in dialect code (e.g. `"journal-append"`).
    pub dialect_name: String,
    /// The symbol name codegen emits a call to. Validated at construction
    /// time so it can never carry raw C++ through into generated source.
    pub symbol: String,
    pub signature: Option<FnSignature>,
}

impl ExternalBuiltin {
    /// Only alphanumerics, `_`, and `.` are accepted — enough for any real
    /// mangled or `extern "C"` symbol, and nothing a generated `#include`
    /// or call expression could use to break out of its context.
    fn validate_symbol(symbol: &str) -> Result<(), String> {
        if symbol.is_empty() {
            return Err("symbol name cannot be empty".to_string());
        }
        for c in symbol.chars() {
            if !c.is_alphanumeric() && c != '_' && c != '.' {
                return Err(format!(
                    "invalid character '{c}' in symbol '{symbol}': only alphanumerics, '_', and '.' are allowed"
                ));
            }
        }
        Ok(())
    }

    /// # Panics
    ///
    /// Panics if `symbol` contains a character outside `[A-Za-z0-9_.]`.
    pub fn new(dialect_name: impl Into<String>, symbol: impl Into<String>) -> Self {
        let symbol = symbol.into();
        Self::validate_symbol(&symbol).expect("invalid symbol name");
        ExternalBuiltin { dialect_name: dialect_name.into(), symbol, signature: None }
    }

    /// # Panics
    ///
    /// Panics if `symbol` contains a character outside `[A-Za-z0-9_.]`.
    pub fn with_signature(
        dialect_name: impl Into<String>,
        symbol: impl Into<String>,
        signature: FnSignature,
    ) -> Self {
        let symbol = symbol.into();
        Self::validate_symbol(&symbol).expect("invalid symbol name");
        ExternalBuiltin { dialect_name: dialect_name.into(), symbol, signature: Some(signature) }
    }
}

/// Embedding-facing compiler configuration: additional native builtins,
/// link inputs, and FFI manifests layered on top of the ambient stdlib.
#[derive(Debug, Clone, Default)]
pub struct CompilerConfig {
    pub external_builtins: Vec<ExternalBuiltin>,
    pub library_paths: Vec<String>,
    pub libraries: Vec<String>,
    /// FFI manifests loaded in addition to any the source itself requires
    /// (see `ffi.rs`).
    pub ffi_manifest_paths: Vec<PathBuf>,
}

impl CompilerConfig {
    pub fn new() -> Self {
        CompilerConfig::default()
    }

    pub fn with_builtin(mut self, builtin: ExternalBuiltin) -> Self {
        self.external_builtins.push(builtin);
        self
    }

    pub fn with_builtins(mut self, builtins: impl IntoIterator<Item = ExternalBuiltin>) -> Self {
        self.external_builtins.extend(builtins);
        self
    }

    pub fn with_library_path(mut self, path: impl Into<String>) -> Self {
        self.library_paths.push(path.into());
        self
    }

    pub fn with_library(mut self, lib: impl Into<String>) -> Self {
        self.libraries.push(lib.into());
        self
    }

    pub fn with_ffi_manifest(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffi_manifest_paths.push(path.into());
        self
    }

    pub fn with_ffi_manifests(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.ffi_manifest_paths.extend(paths);
        self
    }

    pub fn external_names(&self) -> Vec<&str> {
        self.external_builtins.iter().map(|b| b.dialect_name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CppType;

    #[test]
    fn new_builtin_has_no_signature() {
        let builtin = ExternalBuiltin::new("my-func", "runtime_my_func");
        assert_eq!(builtin.dialect_name, "my-func");
        assert_eq!(builtin.symbol, "runtime_my_func");
        assert!(builtin.signature.is_none());
    }

    #[test]
    fn config_builder_accumulates() {
        let config = CompilerConfig::new()
            .with_builtin(ExternalBuiltin::new("func-a", "sym_a"))
            .with_builtin(ExternalBuiltin::with_signature(
                "func-b",
                "sym_b",
                FnSignature::new(vec![CppType::Long], CppType::Bool),
            ))
            .with_library_path("/custom/lib")
            .with_library("myruntime");

        assert_eq!(config.external_builtins.len(), 2);
        assert_eq!(config.library_paths, vec!["/custom/lib"]);
        assert_eq!(config.libraries, vec!["myruntime"]);
        assert_eq!(config.external_names(), vec!["func-a", "func-b"]);
    }

    #[test]
    fn symbol_validation_accepts_alphanumeric_underscore_and_dot() {
        let _ = ExternalBuiltin::new("test", "valid_symbol");
        let _ = ExternalBuiltin::new("test", "valid.symbol.123");
        let _ = ExternalBuiltin::new("test", "ValidCamelCase");
    }

    #[test]
    #[should_panic(expected = "invalid symbol name")]
    fn symbol_validation_rejects_hyphen() {
        let _ = ExternalBuiltin::new("test", "invalid-symbol");
    }

    #[test]
    #[should_panic(expected = "invalid symbol name")]
    fn symbol_validation_rejects_at() {
        let _ = ExternalBuiltin::new("test", "@malicious");
    }

    #[test]
    #[should_panic(expected = "invalid symbol name")]
    fn symbol_validation_rejects_empty() {
        let _ = ExternalBuiltin::new("test", "");
    }
}
