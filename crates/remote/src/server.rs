//! The remote compile server (§4.7): a host process that performs analysis,
//! codegen, and cross-compilation on behalf of a constrained target, over a
//! newline-delimited JSON TCP protocol.

use crate::error::{RemoteError, classify};
use crate::protocol::{Request, Response};
use corvid_compiler::{CodegenTarget, NativeDeclRegistry};
use corvid_runtime::RuntimeContext;
use corvid_runtime::module_loader::LoadOrigin;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

/// A host process serving the remote compile protocol for one or more
/// constrained-target connections.
pub struct RemoteServer {
    ctx: Arc<RuntimeContext>,
    native: Arc<NativeDeclRegistry>,
    /// Serializes analyze/codegen/compile across connections, matching the
    /// "single writer lock around parse/link" rule (§8); object loading
    /// itself stays under the JIT processor's own finer lock.
    compile_lock: Arc<Mutex<()>>,
    /// ODR-duplication defense: defined in every generated unit before it is
    /// handed to the cross-compiler (§4.7 "host-side rules").
    marker_macro: Option<String>,
}

impl RemoteServer {
    pub fn new(ctx: RuntimeContext, native: NativeDeclRegistry) -> Self {
        RemoteServer {
            ctx: Arc::new(ctx),
            native: Arc::new(native),
            compile_lock: Arc::new(Mutex::new(())),
            marker_macro: None,
        }
    }

    pub fn with_marker_macro(mut self, name: impl Into<String>) -> Self {
        self.marker_macro = Some(name.into());
        self
    }

    /// Binds `addr` and serves connections until an accept error occurs.
    /// Each connection is handled on its own task; a session ending with an
    /// error does not bring down the listener.
    pub async fn serve(&self, addr: impl ToSocketAddrs) -> Result<(), RemoteError> {
        let listener = TcpListener::bind(addr).await.map_err(|e| RemoteError::Transport(e.to_string()))?;
        loop {
            let (stream, peer) = listener.accept().await.map_err(|e| RemoteError::Transport(e.to_string()))?;
            tracing::info!(%peer, "remote compile client connected");

            let ctx = Arc::clone(&self.ctx);
            let native = Arc::clone(&self.native);
            let compile_lock = Arc::clone(&self.compile_lock);
            let marker_macro = self.marker_macro.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, ctx, native, compile_lock, marker_macro).await {
                    tracing::warn!(error = %e, "remote compile session ended");
                }
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    ctx: Arc<RuntimeContext>,
    native: Arc<NativeDeclRegistry>,
    compile_lock: Arc<Mutex<()>>,
    marker_macro: Option<String>,
) -> Result<(), RemoteError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await.map_err(|e| RemoteError::Transport(e.to_string()))? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                let ctx = Arc::clone(&ctx);
                let native = Arc::clone(&native);
                let compile_lock = Arc::clone(&compile_lock);
                let marker_macro = marker_macro.clone();
                tokio::task::spawn_blocking(move || {
                    let _guard = compile_lock.lock().unwrap_or_else(|p| p.into_inner());
                    handle_request(&ctx, &native, request, marker_macro.as_deref())
                })
                .await
                .unwrap_or_else(|e| Response::Error {
                    id: "unknown".to_string(),
                    message: e.to_string(),
                    kind: "transport-failed".to_string(),
                })
            }
            Err(e) => Response::Error { id: "unknown".to_string(), message: e.to_string(), kind: "transport-failed".to_string() },
        };

        let mut text = serde_json::to_string(&response).map_err(|e| RemoteError::Protocol(e.to_string()))?;
        text.push('\n');
        write_half.write_all(text.as_bytes()).await.map_err(|e| RemoteError::Transport(e.to_string()))?;
    }

    Ok(())
}

fn handle_request(
    ctx: &RuntimeContext,
    native: &NativeDeclRegistry,
    request: Request,
    marker_macro: Option<&str>,
) -> Response {
    match request {
        Request::Compile { id, code, ns, module } => compile_one(ctx, native, &id, &code, &ns, module.as_deref(), marker_macro),
        // §4.7's target-side rule: the host only ever compiles and ships
        // object bytes, never executes them itself — the constrained target
        // loads the object and calls its entry symbol locally
        // (`RemoteCompileClient::eval_value`). `eval` and `compile` share
        // this same compile-and-load work; they differ only in which local
        // analyzer path a non-remote target would otherwise have used.
        Request::Eval { id, code, ns, module } => compile_one(ctx, native, &id, &code, &ns, module.as_deref(), marker_macro),
        Request::NativeSource { id, code, ns } => native_source(ctx, native, &id, &code, &ns),
        Request::Require { id, ns, source } => require_one(ctx, native, &id, &ns, source.as_deref(), marker_macro),
    }
}

/// A leading `ns` form in `code` registers its aliases as a side effect of
/// analysis itself (§4.7's "evaluate it, not only analyze" rule is already
/// satisfied here — this pipeline has no separate analyze-then-eval split
/// for `ns` the way a tree-walking evaluator would), so later forms in the
/// same request see it without any extra step.
fn compile_one(
    ctx: &RuntimeContext,
    native: &NativeDeclRegistry,
    id: &str,
    code: &str,
    ns: &str,
    module: Option<&str>,
    marker_macro: Option<&str>,
) -> Response {
    ctx.intern_namespace(ns);
    ctx.set_current_namespace(ns);
    let unit_name = module.map(str::to_string).unwrap_or_else(|| sanitize_unit_name(ns));

    let generated = match corvid_compiler::generate_source(ctx, native, code, format!("{ns}.corvid"), &[], CodegenTarget::Eval, &unit_name) {
        Ok(text) => text,
        Err(e) => return error_response(id, &e),
    };
    let generated = with_marker_macro(&generated, marker_macro);

    match ctx.jit().compile_and_load(&unit_name, &generated) {
        Ok(unit) => match std::fs::read(&unit.object_path) {
            Ok(bytes) => Response::Compiled {
                id: id.to_string(),
                entry_symbol: unit_name,
                object_bytes_base64: base64_encode(&bytes),
            },
            Err(e) => Response::Error { id: id.to_string(), message: e.to_string(), kind: "io-failure".to_string() },
        },
        Err(e) => {
            let message = e.to_string();
            let kind = classify(&corvid_compiler::CompileError::from(e)).to_string();
            Response::Error { id: id.to_string(), message, kind }
        }
    }
}

fn native_source(ctx: &RuntimeContext, native: &NativeDeclRegistry, id: &str, code: &str, ns: &str) -> Response {
    ctx.intern_namespace(ns);
    ctx.set_current_namespace(ns);
    let unit_name = sanitize_unit_name(ns);
    match corvid_compiler::generate_source(ctx, native, code, format!("{ns}.corvid"), &[], CodegenTarget::Eval, &unit_name) {
        Ok(text) => Response::Source { id: id.to_string(), text },
        Err(e) => error_response(id, &e),
    }
}

/// Compiles the single module `ns` from `source` (or the host's own module
/// loader if the target didn't send one), under a forced `source` origin.
///
/// Does not walk `:require` dependencies transitively — the analyzer
/// registers namespace aliases but builds no load graph (see DESIGN.md) —
/// so the response always carries exactly one module, not the full
/// dependency-ordered set §4.7 describes for a multi-module project.
fn require_one(ctx: &RuntimeContext, native: &NativeDeclRegistry, id: &str, ns: &str, source: Option<&str>, marker_macro: Option<&str>) -> Response {
    let owned_source;
    let code = match source {
        Some(s) => s,
        None => {
            let resolved = match ctx.module_loader().resolve(ns) {
                Ok(r) => r,
                Err(e) => return Response::Error { id: id.to_string(), message: e.to_string(), kind: "io-failure".to_string() },
            };
            match std::fs::read_to_string(&resolved.source_path) {
                Ok(s) => {
                    owned_source = s;
                    &owned_source
                }
                Err(e) => return Response::Error { id: id.to_string(), message: e.to_string(), kind: "io-failure".to_string() },
            }
        }
    };

    ctx.intern_namespace(ns);
    ctx.set_current_namespace(ns);
    let unit_name = sanitize_unit_name(ns);
    let generated = match corvid_compiler::generate_source(ctx, native, code, format!("{ns}.corvid"), &[], CodegenTarget::Module, &unit_name) {
        Ok(text) => text,
        Err(e) => return error_response(id, &e),
    };
    let generated = with_marker_macro(&generated, marker_macro);

    let result = ctx.require(ns, LoadOrigin::Source, || Ok(generated));
    match result {
        Ok(unit) => match std::fs::read(&unit.object_path) {
            Ok(bytes) => Response::Modules {
                id: id.to_string(),
                modules: vec![crate::protocol::CompiledModule {
                    name: ns.to_string(),
                    entry_symbol: unit_name,
                    object_bytes_base64: base64_encode(&bytes),
                }],
            },
            Err(e) => Response::Error { id: id.to_string(), message: e.to_string(), kind: "io-failure".to_string() },
        },
        Err(e) => Response::Error { id: id.to_string(), message: e.to_string(), kind: "link-failed".to_string() },
    }
}

fn error_response(id: &str, err: &corvid_compiler::CompileError) -> Response {
    Response::Error { id: id.to_string(), message: err.to_string(), kind: classify(err).to_string() }
}

fn with_marker_macro(source: &str, marker_macro: Option<&str>) -> String {
    match marker_macro {
        Some(name) => format!("#define {name} 1\n{source}"),
        None => source.to_string(),
    }
}

fn sanitize_unit_name(ns: &str) -> String {
    ns.chars().map(|c| if c.is_alphanumeric() { c } else { '_' }).collect()
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Request;

    fn fresh_server() -> (RemoteServer, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RuntimeContext::new(vec![], dir.path().to_path_buf());
        (RemoteServer::new(ctx, NativeDeclRegistry::new()), dir)
    }

    #[test]
    fn native_source_returns_generated_text_without_compiling() {
        let (server, _dir) = fresh_server();
        let response = handle_request(
            &server.ctx,
            &server.native,
            Request::NativeSource { id: "1".to_string(), code: "42".to_string(), ns: "user".to_string() },
            None,
        );
        match response {
            Response::Source { id, text } => {
                assert_eq!(id, "1");
                assert!(text.contains("make_integer(42LL)"));
            }
            other => panic!("expected Source, got {other:?}"),
        }
    }

    #[test]
    fn unresolved_symbol_surfaces_as_classified_error_response() {
        let (server, _dir) = fresh_server();
        let response = handle_request(
            &server.ctx,
            &server.native,
            Request::NativeSource { id: "2".to_string(), code: "totally-unbound".to_string(), ns: "user".to_string() },
            None,
        );
        match response {
            Response::Error { id, kind, .. } => {
                assert_eq!(id, "2");
                assert_eq!(kind, "unresolved-symbol");
            }
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[test]
    fn marker_macro_is_prepended_before_the_generated_unit() {
        let source = with_marker_macro("int x;", Some("JANK_IOS_JIT"));
        assert_eq!(source, "#define JANK_IOS_JIT 1\nint x;");
    }

    #[test]
    fn sanitize_unit_name_replaces_non_alphanumerics() {
        assert_eq!(sanitize_unit_name("my.app-core"), "my_app_core");
    }
}
