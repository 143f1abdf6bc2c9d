//! Wire types for the remote compile protocol (§4.7): newline-delimited
//! JSON frames, one request or response per line.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Request {
    /// Analyze and codegen `code` in `ns` (created on demand), cross-compile
    /// it, and return the compiled object.
    Compile {
        id: String,
        code: String,
        ns: String,
        #[serde(default)]
        module: Option<String>,
    },
    /// Compile every module needed to satisfy `ns`, forcing a fresh compile
    /// graph (`origin = source`). `source` is the module's own text when the
    /// target has no independent way to read it from disk.
    Require {
        id: String,
        ns: String,
        #[serde(default)]
        source: Option<String>,
    },
    /// Same inputs as `compile`; the caller intends to execute the result
    /// for its value once loaded, rather than merely load it.
    Eval {
        id: String,
        code: String,
        ns: String,
        #[serde(default)]
        module: Option<String>,
    },
    /// Return the codegen output as text, without compiling it.
    NativeSource { id: String, code: String, ns: String },
}

impl Request {
    pub fn id(&self) -> &str {
        match self {
            Request::Compile { id, .. }
            | Request::Require { id, .. }
            | Request::Eval { id, .. }
            | Request::NativeSource { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Response {
    Compiled {
        id: String,
        #[serde(rename = "entry-symbol")]
        entry_symbol: String,
        #[serde(rename = "object-bytes-base64")]
        object_bytes_base64: String,
    },
    /// One entry per module in `Request::Require`'s dependency order.
    Modules {
        id: String,
        modules: Vec<CompiledModule>,
    },
    Source {
        id: String,
        text: String,
    },
    Error {
        id: String,
        message: String,
        #[serde(rename = "type")]
        kind: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledModule {
    pub name: String,
    #[serde(rename = "entry-symbol")]
    pub entry_symbol: String,
    #[serde(rename = "object-bytes-base64")]
    pub object_bytes_base64: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_request_parses_from_json() {
        let req: Request =
            serde_json::from_str(r#"{"op":"compile","id":"1","code":"(+ 1 2)","ns":"user"}"#).unwrap();
        assert!(matches!(req, Request::Compile { .. }));
        assert_eq!(req.id(), "1");
    }

    #[test]
    fn native_source_request_parses_from_json() {
        let req: Request =
            serde_json::from_str(r#"{"op":"native-source","id":"2","code":"42","ns":"user"}"#).unwrap();
        assert!(matches!(req, Request::NativeSource { .. }));
    }

    #[test]
    fn error_response_serializes_with_kebab_case_status() {
        let resp = Response::Error { id: "1".into(), message: "boom".into(), kind: "parse-failed".into() };
        let text = serde_json::to_string(&resp).unwrap();
        assert!(text.contains("\"status\":\"error\""));
        assert!(text.contains("\"type\":\"parse-failed\""));
    }
}
