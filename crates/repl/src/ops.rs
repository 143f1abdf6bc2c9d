//! nREPL operation handlers (§4.8): `eval`, `complete`, `info`/eldoc, and
//! `test`, each taking a decoded request dict and a mutable [`Session`] and
//! producing a response dict.
//!
//! `eval` and `test` both drive the same analyze/codegen/JIT pipeline
//! `corvid-remote` uses, then call the loaded unit's entry symbol through
//! `corvid_runtime::abi::call_entry0` for the value the client actually
//! wants (§4.4 "Eval" codegen target, §7 scenarios 1/3/5).

use crate::bencode::{DictBuilder, Value};
use crate::session::Session;
use corvid_compiler::CodegenTarget;
use corvid_core::{Callable, MetadataExt, Object};
use std::sync::Mutex;

fn status(tags: &[&str]) -> Value {
    Value::List(tags.iter().map(|t| Value::str(*t)).collect())
}

fn classified_error(id: &str, err: &corvid_compiler::CompileError) -> Value {
    DictBuilder::new()
        .set_str("id", id)
        .set("status", status(&["done", "error"]))
        .set_str("message", err.to_string())
        .set_str("kind", corvid_remote_kind(err))
        .build()
}

/// Reuses the remote compile server's error classification table (§6):
/// same [`corvid_compiler::CompileError`] taxonomy, same client-facing
/// kind tags, whether the client is a socket on the same host or a
/// constrained target across the network.
fn corvid_remote_kind(err: &corvid_compiler::CompileError) -> String {
    corvid_remote::error::classify(err).to_string()
}

pub fn eval(request: &Value, session: &mut Session, compile_lock: &Mutex<()>) -> Value {
    let id = request.get_str("id").unwrap_or("").to_string();
    let code = request.get_str("code").unwrap_or("").to_string();
    if let Some(ns) = request.get_str("ns") {
        session.set_current_ns(ns.to_string());
    }
    let ns = session.current_ns().to_string();
    session.ctx.intern_namespace(&ns);
    session.ctx.set_current_namespace(&ns);

    let unit_name = session.next_unit_name();
    let _guard = compile_lock.lock().unwrap_or_else(|p| p.into_inner());

    let generated =
        match corvid_compiler::generate_source(&session.ctx, &session.native, &code, format!("{ns}.corvid"), &[], CodegenTarget::Eval, &unit_name) {
            Ok(text) => text,
            Err(e) => return classified_error(&id, &e),
        };

    let unit = match session.ctx.jit().compile_and_load(&unit_name, &generated) {
        Ok(unit) => unit,
        Err(e) => {
            let message = e.to_string();
            let kind = corvid_remote_kind(&corvid_compiler::CompileError::from(e));
            return DictBuilder::new().set_str("id", id.as_str()).set("status", status(&["done", "error"])).set_str("message", message).set_str("kind", kind).build();
        }
    };

    match unsafe { corvid_runtime::abi::call_entry0(&session.ctx, &unit, &unit_name) } {
        Ok(value) => DictBuilder::new()
            .set_str("id", id.as_str())
            .set("status", status(&["done"]))
            .set_str("ns", session.current_ns())
            .set_str("entry-symbol", unit_name.as_str())
            .set_str("object-path", unit.object_path.display().to_string())
            .set_str("value", value.to_string())
            .build(),
        Err(e) => {
            let message = e.to_string();
            DictBuilder::new().set_str("id", id.as_str()).set("status", status(&["done", "error"])).set_str("message", message).set_str("kind", "eval-failed").build()
        }
    }
}

/// Compiles `code` the same way `eval` does, but frames the response
/// around `deftest`/`is`/`are` forms (§4.8 "test" op): the analyzer already
/// expands these into ordinary `def`s calling `clojure.test/try-expr` (see
/// `analyzer.rs`). `deftest` itself compiles to a zero-arg fn var, so once
/// `eval` has run it, invoking that fn runs the assertions; whatever it
/// returns (`try-expr`'s job, not this op's) is reported as one result.
pub fn test(request: &Value, session: &mut Session, compile_lock: &Mutex<()>) -> Value {
    let response = eval(request, session, compile_lock);
    if response.get("value").is_none() {
        return response;
    }
    let id = response.get_str("id").unwrap_or("").to_string();
    let entry_symbol = response.get_str("entry-symbol").unwrap_or("").to_string();
    let object_path = response.get_str("object-path").unwrap_or("").to_string();

    let name = request.get_str("code").and_then(|c| c.split_whitespace().nth(1)).unwrap_or("").to_string();
    let ns_name = session.current_ns().to_string();
    let results = session
        .ctx
        .find_namespace(&ns_name)
        .and_then(|ns| ns.find_own(&name))
        .and_then(|var| var.deref().ok())
        .map(|value| match value {
            Object::Callable(Callable::Closure(c)) => match c.invoke(&[]) {
                Ok(result) => vec![result_entry(&name, !matches!(result, Object::Nil | Object::Bool(false)), None)],
                Err(e) => vec![result_entry(&name, false, Some(e.to_string()))],
            },
            other => vec![result_entry(&name, false, Some(format!("{name} is not a test fn: {other:?}")))],
        })
        .unwrap_or_default();

    DictBuilder::new()
        .set_str("id", id)
        .set("status", status(&["done"]))
        .set_str("entry-symbol", entry_symbol)
        .set_str("object-path", object_path)
        .set("results", Value::List(results))
        .build()
}

fn result_entry(name: &str, pass: bool, error: Option<String>) -> Value {
    let mut builder = DictBuilder::new().set_str("name", name).set_str("status", if pass { "pass" } else { "fail" });
    if let Some(message) = error {
        builder = builder.set_str("message", message);
    }
    builder.build()
}

const CORE_NS: &str = "clojure.core";

/// Appends one candidate dict per var in `ns` matching `prefix`, skipping
/// names already present in `seen` (own-namespace candidates are gathered
/// before `clojure.core`'s, so a shadowing local def wins).
fn var_candidates(ns_name: &str, ns: &corvid_core::Namespace, prefix: &str, seen: &mut std::collections::HashSet<String>, out: &mut Vec<Value>) {
    for (name, var) in ns.all_vars() {
        if !name.starts_with(prefix) || !seen.insert(name.clone()) {
            continue;
        }
        let meta = var.meta();
        let mut builder = DictBuilder::new()
            .set_str("candidate", name)
            .set_str("ns", ns_name)
            .set_str("type", if var.is_macro() { "macro" } else { "var" });
        if let Some(doc) = meta.get_str("doc") {
            builder = builder.set_str("doc", doc.to_string());
        }
        if let Some(file) = meta.get_str("file") {
            builder = builder.set_str("file", file.to_string());
        }
        out.push(builder.build());
    }
}

pub fn complete(request: &Value, session: &Session) -> Value {
    let id = request.get_str("id").unwrap_or("").to_string();
    let prefix = request.get_str("prefix").unwrap_or("");
    let ns_name = request.get_str("ns").unwrap_or_else(|| session.current_ns());

    let mut candidates = Vec::new();
    let mut seen = std::collections::HashSet::new();

    if let Some(ns) = session.ctx.find_namespace(ns_name) {
        var_candidates(ns_name, &ns, prefix, &mut seen, &mut candidates);
    }
    if ns_name != CORE_NS {
        if let Some(core) = session.ctx.find_namespace(CORE_NS) {
            var_candidates(CORE_NS, &core, prefix, &mut seen, &mut candidates);
        }
    }

    let native_prefix = prefix.strip_prefix("cpp/");
    for name in session.native.names() {
        let matches = match native_prefix {
            Some(rest) => name.starts_with(rest),
            None => false,
        };
        if !matches {
            continue;
        }
        let Some((_, sig)) = session.native.resolve(name) else { continue };
        candidates.push(
            DictBuilder::new()
                .set_str("candidate", format!("cpp/{name}"))
                .set_str("ns", "cpp")
                .set_str("type", "native")
                .set_str("arglists", render_arglist(sig))
                .set_str("doc", sig.to_string())
                .build(),
        );
    }

    DictBuilder::new().set_str("id", id).set("status", status(&["done"])).set("completions", Value::List(candidates)).build()
}

pub fn info(request: &Value, session: &Session) -> Value {
    let id = request.get_str("id").unwrap_or("").to_string();
    let symbol = request.get_str("symbol").unwrap_or("");

    if let Some(native_name) = symbol.strip_prefix("cpp/") {
        return match session.native.resolve(native_name) {
            Some((linker_symbol, sig)) => DictBuilder::new()
                .set_str("id", id)
                .set("status", status(&["done"]))
                .set_str("ns-name", "cpp")
                .set_str("name", native_name)
                .set_str("type", "native")
                .set_str("arglists", render_arglist(sig))
                .set_str("doc", format!("{sig} (linked symbol: {linker_symbol})"))
                .build(),
            None => DictBuilder::new().set_str("id", id).set("status", status(&["done", "no-info"])).build(),
        };
    }

    // Unqualified symbols resolve the same way the analyzer does: current
    // namespace first, `clojure.core` as the fallback (§4.3 "Symbol
    // resolution"). An explicit `ns/name` is looked up in that one namespace.
    let (name, var) = match symbol.split_once('/') {
        Some((ns_name, name)) => {
            let Some(ns) = session.ctx.find_namespace(ns_name) else {
                return DictBuilder::new().set_str("id", id).set("status", status(&["done", "no-info"])).build();
            };
            let Some(var) = ns.resolve(name) else {
                return DictBuilder::new().set_str("id", id).set("status", status(&["done", "no-info"])).build();
            };
            (name.to_string(), var)
        }
        None => {
            let current = session.ctx.find_namespace(session.current_ns()).and_then(|ns| ns.resolve(symbol));
            let core = current.or_else(|| session.ctx.find_namespace(CORE_NS).and_then(|ns| ns.resolve(symbol)));
            let Some(var) = core else {
                return DictBuilder::new().set_str("id", id).set("status", status(&["done", "no-info"])).build();
            };
            (symbol.to_string(), var)
        }
    };

    let meta = var.meta();
    let mut builder = DictBuilder::new()
        .set_str("id", id)
        .set("status", status(&["done"]))
        .set_str("ns-name", var.ns_name())
        .set_str("name", name)
        .set_str("type", if var.is_macro() { "macro" } else { "var" });
    if let Some(doc) = meta.get_str("doc") {
        builder = builder.set_str("doc", doc.to_string());
    }
    if let Some(file) = meta.get_str("file") {
        builder = builder.set_str("file", file.to_string());
    }
    if let Some(Object::Integer(line)) = meta.get_str("line") {
        builder = builder.set_int("line", *line);
    }
    builder.build()
}

fn render_arglist(sig: &corvid_compiler::FnSignature) -> String {
    let params: Vec<String> = sig.params.iter().map(|t| t.to_string()).collect();
    if sig.variadic {
        format!("[{} & …]", params.join(" "))
    } else {
        format!("[{}]", params.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bencode::DictBuilder as DB;
    use corvid_compiler::NativeDeclRegistry;
    use corvid_runtime::RuntimeContext;
    use std::sync::Arc;

    fn fresh_session() -> Session {
        let ctx = Arc::new(RuntimeContext::new(vec![], std::env::temp_dir()));
        Session::new(ctx, Arc::new(NativeDeclRegistry::new()))
    }

    #[test]
    fn eval_of_unresolved_symbol_reports_classified_error() {
        let mut session = fresh_session();
        let lock = Mutex::new(());
        let request = DB::new().set_str("id", "1").set_str("code", "totally-unbound").build();
        let response = eval(&request, &mut session, &lock);
        assert_eq!(response.get_str("kind"), Some("unresolved-symbol"));
    }

    #[test]
    fn complete_finds_vars_defined_in_the_session_namespace() {
        let mut session = fresh_session();
        let lock = Mutex::new(());
        let def = DB::new().set_str("id", "1").set_str("code", "(def pi 3)").build();
        eval(&def, &mut session, &lock);

        let request = DB::new().set_str("id", "2").set_str("prefix", "p").build();
        let response = complete(&request, &session);
        let Some(Value::List(items)) = response.get("completions") else { panic!("expected completions list") };
        assert!(items.iter().any(|c| c.get_str("candidate") == Some("pi")));
    }

    #[test]
    fn info_on_unknown_symbol_reports_no_info() {
        let session = fresh_session();
        let request = DB::new().set_str("id", "1").set_str("symbol", "does-not-exist").build();
        let response = info(&request, &session);
        assert_eq!(response.get("status"), Some(&status(&["done", "no-info"])));
    }

    #[test]
    fn complete_falls_back_to_core_vars_when_not_shadowed() {
        let session = fresh_session();
        corvid_compiler::prelude::install(&session.ctx);

        let request = DB::new().set_str("id", "1").set_str("prefix", "fir").build();
        let response = complete(&request, &session);
        let Some(Value::List(items)) = response.get("completions") else { panic!("expected completions list") };
        let first = items.iter().find(|c| c.get_str("candidate") == Some("first")).expect("first not offered");
        assert_eq!(first.get_str("ns"), Some(CORE_NS));
    }

    #[test]
    fn info_on_a_core_var_reports_its_defining_namespace() {
        let session = fresh_session();
        corvid_compiler::prelude::install(&session.ctx);

        let request = DB::new().set_str("id", "1").set_str("symbol", "println").build();
        let response = info(&request, &session);
        assert_eq!(response.get_str("ns-name"), Some(CORE_NS));
    }
}
