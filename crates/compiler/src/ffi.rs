//! Native declaration registry: the FFI manifest format and the
//! `NativeDeclRegistry` it populates (§4.3 "native-header alias").
//!
//! The embedded C++ interpreter described by the specification would parse
//! `#include <header>` itself; this crate has no such interpreter, so a
//! header alias is instead backed by a declarative manifest naming the
//! symbols a header provides, plus an optional textual pre-scan of simple
//! `extern "C"` prototypes appearing directly in source (see DESIGN.md for
//! why a full Clang AST binding is out of scope here).

use crate::ast::CppType;
use crate::types::FnSignature;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug)]
pub enum FfiError {
    Parse(String),
    Validation(String),
    UnknownType(String),
}

impl std::fmt::Display for FfiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FfiError::Parse(msg) => write!(f, "failed to parse FFI manifest: {msg}"),
            FfiError::Validation(msg) => write!(f, "invalid FFI manifest: {msg}"),
            FfiError::UnknownType(spec) => write!(f, "unrecognized native type spec '{spec}'"),
        }
    }
}

impl std::error::Error for FfiError {}

/// One native function binding as it appears in a manifest's TOML table.
/// Type specs are plain strings (`"long"`, `"double*"`, `"MyClass&"`,
/// `"object"`) parsed by [`parse_type_spec`].
#[derive(Debug, Clone, Deserialize)]
pub struct NativeFunctionSpec {
    /// The linker/mangled symbol this binding resolves to.
    pub symbol: String,
    /// The name dialect code calls it by.
    pub dialect_name: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(rename = "return", default = "default_return_type")]
    pub return_type: String,
    #[serde(default)]
    pub variadic: bool,
}

fn default_return_type() -> String {
    "void".to_string()
}

/// One native library section: a linker flag plus the functions it exposes.
#[derive(Debug, Clone, Deserialize)]
pub struct NativeLibrarySpec {
    pub name: String,
    pub link: String,
    #[serde(rename = "function", default)]
    pub functions: Vec<NativeFunctionSpec>,
}

/// Top-level manifest shape (one or more `[[library]]` tables).
#[derive(Debug, Clone, Deserialize)]
pub struct FfiManifest {
    #[serde(rename = "library")]
    pub libraries: Vec<NativeLibrarySpec>,
}

impl FfiManifest {
    pub fn parse(content: &str) -> Result<Self, FfiError> {
        let manifest: Self = toml::from_str(content).map_err(|e| FfiError::Parse(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), FfiError> {
        if self.libraries.is_empty() {
            return Err(FfiError::Validation("manifest must define at least one library".to_string()));
        }
        for lib in &self.libraries {
            if lib.name.trim().is_empty() {
                return Err(FfiError::Validation("library has empty name".to_string()));
            }
            if lib.link.trim().is_empty() || !lib.link.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.') {
                return Err(FfiError::Validation(format!("library '{}' has an invalid linker flag '{}'", lib.name, lib.link)));
            }
            for func in &lib.functions {
                if func.symbol.trim().is_empty() || func.dialect_name.trim().is_empty() {
                    return Err(FfiError::Validation(format!(
                        "library '{}' has a function with an empty symbol or dialect_name",
                        lib.name
                    )));
                }
                parse_type_spec(&func.return_type)?;
                for p in &func.params {
                    parse_type_spec(p)?;
                }
            }
        }
        Ok(())
    }
}

/// Parses a type spec string into a [`CppType`]. Trailing `*`/`&` stack
/// (rightmost binds outermost: `"char**"` is `Pointer(Pointer(Class("char")))`).
pub fn parse_type_spec(spec: &str) -> Result<CppType, FfiError> {
    let spec = spec.trim();
    if let Some(inner) = spec.strip_suffix('*') {
        return Ok(CppType::Pointer(Box::new(parse_type_spec(inner)?)));
    }
    if let Some(inner) = spec.strip_suffix('&') {
        return Ok(CppType::Reference(Box::new(parse_type_spec(inner)?)));
    }
    match spec {
        "void" => Ok(CppType::Void),
        "bool" => Ok(CppType::Bool),
        "long" | "int" | "int64_t" => Ok(CppType::Long),
        "double" | "float" => Ok(CppType::Double),
        "object" => Ok(CppType::Object),
        "" => Err(FfiError::UnknownType(spec.to_string())),
        class_name => Ok(CppType::Class(class_name.to_string())),
    }
}

/// Resolved native declarations available to the analyzer, merged from one
/// or more manifests plus any textual `extern "C"` pre-scan.
#[derive(Debug, Default)]
pub struct NativeDeclRegistry {
    functions: HashMap<String, (String, FnSignature)>,
    libraries: Vec<(String, String)>,
}

impl NativeDeclRegistry {
    pub fn new() -> Self {
        NativeDeclRegistry::default()
    }

    pub fn load_manifest(&mut self, manifest: &FfiManifest) -> Result<(), FfiError> {
        for lib in &manifest.libraries {
            self.libraries.push((lib.name.clone(), lib.link.clone()));
            for func in &lib.functions {
                let params = func.params.iter().map(|p| parse_type_spec(p)).collect::<Result<Vec<_>, _>>()?;
                let return_type = parse_type_spec(&func.return_type)?;
                let mut signature = FnSignature::new(params, return_type);
                if func.variadic {
                    signature = signature.variadic();
                }
                self.functions.insert(func.dialect_name.clone(), (func.symbol.clone(), signature));
            }
        }
        Ok(())
    }

    /// Registers bindings discovered by [`scan_extern_c_prototypes`],
    /// binding each under its own symbol name (no separate dialect alias —
    /// callers invoke it by the symbol itself, via `cpp/<symbol>`).
    pub fn load_scanned_prototypes(&mut self, source: &str) {
        for proto in scan_extern_c_prototypes(source) {
            self.functions.insert(proto.symbol.clone(), (proto.symbol.clone(), proto.signature));
        }
    }

    pub fn resolve(&self, dialect_name: &str) -> Option<(&str, &FnSignature)> {
        self.functions.get(dialect_name).map(|(sym, sig)| (sym.as_str(), sig))
    }

    pub fn libraries(&self) -> &[(String, String)] {
        &self.libraries
    }

    /// Every dialect-visible name currently registered, manifest-bound or
    /// scanned (used by completion candidate gathering).
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(|s| s.as_str())
    }
}

struct ScannedPrototype {
    symbol: String,
    signature: FnSignature,
}

/// A minimal, line-oriented scan for `extern "C" <ret> <name>(<args>);`
/// prototypes — not a C parser. Prototypes spanning multiple lines or using
/// macros are not recognized; the manifest format is the supported path for
/// anything beyond the simplest declarations.
fn scan_extern_c_prototypes(source: &str) -> Vec<ScannedPrototype> {
    let mut out = Vec::new();
    for raw_line in source.lines() {
        let line = raw_line.trim();
        let Some(rest) = line.strip_prefix("extern \"C\"") else { continue };
        let rest = rest.trim();
        let Some(paren_open) = rest.find('(') else { continue };
        let Some(paren_close) = rest.rfind(')') else { continue };
        if paren_close < paren_open {
            continue;
        }
        let head = rest[..paren_open].trim();
        let Some((ret_and_ptr, name)) = head.rsplit_once(char::is_whitespace) else { continue };
        let (ret_spec, name) = split_trailing_pointer_stars(ret_and_ptr, name);
        let Ok(return_type) = parse_type_spec(&ret_spec) else { continue };

        let args_text = rest[paren_open + 1..paren_close].trim();
        let mut variadic = false;
        let mut params = Vec::new();
        if !args_text.is_empty() && args_text != "void" {
            for arg in args_text.split(',') {
                let arg = arg.trim();
                if arg == "..." {
                    variadic = true;
                    continue;
                }
                let Some(ty) = arg.rsplit_once(char::is_whitespace).map(|(t, _)| t.trim()).or(Some(arg)) else {
                    continue;
                };
                if let Ok(parsed) = parse_type_spec(ty) {
                    params.push(parsed);
                }
            }
        }

        let mut signature = FnSignature::new(params, return_type);
        if variadic {
            signature = signature.variadic();
        }
        out.push(ScannedPrototype { symbol: name.trim_matches(';').to_string(), signature });
    }
    out
}

/// Splits `"char * name"` style declarator text into a type spec with its
/// pointer stars reattached (`"char*"`) and the bare identifier name.
fn split_trailing_pointer_stars(ret_and_ptr: &str, name: &str) -> (String, String) {
    let stars_on_name: String = name.chars().take_while(|&c| c == '*').collect();
    let bare_name = name.trim_start_matches('*').to_string();
    let stars_on_ret: String = ret_and_ptr.chars().rev().take_while(|&c| c == '*').collect();
    let base = ret_and_ptr.trim_end_matches('*').trim().to_string();
    (format!("{base}{stars_on_ret}{stars_on_name}"), bare_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_manifest() {
        let toml = r#"
            [[library]]
            name = "posix"
            link = "c"

            [[library.function]]
            symbol = "getpid"
            dialect_name = "process-id"
            return = "long"
        "#;
        let manifest = FfiManifest::parse(toml).unwrap();
        assert_eq!(manifest.libraries.len(), 1);
        assert_eq!(manifest.libraries[0].functions[0].dialect_name, "process-id");
    }

    #[test]
    fn rejects_unsafe_linker_flag() {
        let toml = r#"
            [[library]]
            name = "bad"
            link = "c; rm -rf /"
        "#;
        assert!(FfiManifest::parse(toml).is_err());
    }

    #[test]
    fn type_spec_parses_pointer_and_reference_chains() {
        assert_eq!(parse_type_spec("long").unwrap(), CppType::Long);
        assert_eq!(parse_type_spec("char*").unwrap(), CppType::Pointer(Box::new(CppType::Class("char".into()))));
        assert_eq!(
            parse_type_spec("char**").unwrap(),
            CppType::Pointer(Box::new(CppType::Pointer(Box::new(CppType::Class("char".into())))))
        );
        assert_eq!(parse_type_spec("Widget&").unwrap(), CppType::Reference(Box::new(CppType::Class("Widget".into()))));
    }

    #[test]
    fn registry_resolves_manifest_functions_by_dialect_name() {
        let toml = r#"
            [[library]]
            name = "posix"
            link = "c"

            [[library.function]]
            symbol = "getpid"
            dialect_name = "process-id"
            return = "long"
        "#;
        let manifest = FfiManifest::parse(toml).unwrap();
        let mut registry = NativeDeclRegistry::new();
        registry.load_manifest(&manifest).unwrap();
        let (symbol, sig) = registry.resolve("process-id").unwrap();
        assert_eq!(symbol, "getpid");
        assert_eq!(sig.return_type, CppType::Long);
    }

    #[test]
    fn scans_simple_extern_c_prototype() {
        let src = "extern \"C\" int puts(const char* s);\n";
        let mut registry = NativeDeclRegistry::new();
        registry.load_scanned_prototypes(src);
        let (symbol, sig) = registry.resolve("puts").unwrap();
        assert_eq!(symbol, "puts");
        assert_eq!(sig.params.len(), 1);
    }
}
