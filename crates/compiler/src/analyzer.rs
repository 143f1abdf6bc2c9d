//! Resolves symbols, expands macros, classifies C++ interop call sites, and
//! produces the typed expression tree codegen consumes (§4.3).
//!
//! Only a closed set of "analyzer-level macros" — `ns`, `defn`, `when`,
//! `cond`, `->`, `->>`, `deftest`, `is`, `are` — are recognized natively by
//! this module, matching the bootstrap prelude this crate ships (see
//! DESIGN.md). A var whose `is_macro()` flag is set but that isn't one of
//! these is resolved as an ordinary invoke rather than expanded: running a
//! user-defined macro function would mean calling JIT-compiled native code
//! during analysis, which this crate does not wire up (see DESIGN.md).

use crate::ast::{AnalyzeError, AnalyzeResult, CastPolicy, CatchClause, CppType, Expr, FnArity, SourceLocation};
use crate::ffi::NativeDeclRegistry;
use corvid_core::{Object, PersistentList, Symbol};
use corvid_runtime::RuntimeContext;

pub struct Analyzer<'a> {
    ctx: &'a RuntimeContext,
    native: &'a NativeDeclRegistry,
    locals: Vec<Vec<Symbol>>,
    expansion_stack: Vec<SourceLocation>,
}

const CORE_NS: &str = "clojure.core";

impl<'a> Analyzer<'a> {
    pub fn new(ctx: &'a RuntimeContext, native: &'a NativeDeclRegistry) -> Self {
        Analyzer { ctx, native, locals: Vec::new(), expansion_stack: Vec::new() }
    }

    /// The location preferred for a new var's metadata: the outermost
    /// expansion frame with a real file path, falling back to `loc` itself
    /// (§4.3 "Macro expansion").
    fn def_location(&self, loc: &SourceLocation) -> SourceLocation {
        self.expansion_stack
            .iter()
            .find(|l| !l.is_placeholder())
            .cloned()
            .unwrap_or_else(|| loc.clone())
    }

    fn push_locals(&mut self, names: Vec<Symbol>) {
        self.locals.push(names);
    }

    fn pop_locals(&mut self) {
        self.locals.pop();
    }

    fn resolve_local(&self, name: &str) -> Option<Symbol> {
        for frame in self.locals.iter().rev() {
            if let Some(sym) = frame.iter().find(|s| s.name() == name) {
                return Some(sym.clone());
            }
        }
        None
    }

    pub fn analyze(&mut self, form: &Object, loc: SourceLocation) -> AnalyzeResult<Expr> {
        match form {
            Object::Symbol(sym) => self.analyze_symbol(sym, loc),
            Object::Vector(v) => {
                let items = v
                    .iter()
                    .map(|item| self.analyze(item, loc.clone()))
                    .collect::<AnalyzeResult<Vec<_>>>()?;
                Ok(Expr::VectorCtor { items, loc })
            }
            Object::Set(s) => {
                let items =
                    s.iter().map(|item| self.analyze(item, loc.clone())).collect::<AnalyzeResult<Vec<_>>>()?;
                Ok(Expr::SetCtor { items, loc })
            }
            Object::Map(m) => {
                let entries = m
                    .iter()
                    .map(|(k, v)| Ok((self.analyze(k, loc.clone())?, self.analyze(v, loc.clone())?)))
                    .collect::<AnalyzeResult<Vec<_>>>()?;
                Ok(Expr::MapCtor { entries, loc })
            }
            Object::List(l) => self.analyze_list(l, loc),
            literal => Ok(Expr::Literal { value: literal.clone(), loc }),
        }
    }

    fn analyze_symbol(&mut self, sym: &Symbol, loc: SourceLocation) -> AnalyzeResult<Expr> {
        if sym.ns().is_none() {
            if let Some(local) = self.resolve_local(sym.name()) {
                return Ok(Expr::LocalRef { name: local, loc });
            }
            let current = self.ctx.current_namespace();
            if let Some(ns) = self.ctx.find_namespace(&current) {
                if ns.resolve(sym.name()).is_some() {
                    return Ok(Expr::VarDeref { ns: current, name: sym.name().to_string(), loc });
                }
            }
            if let Some(core) = self.ctx.find_namespace(CORE_NS) {
                if core.resolve(sym.name()).is_some() {
                    return Ok(Expr::VarDeref { ns: CORE_NS.to_string(), name: sym.name().to_string(), loc });
                }
            }
            return Err(AnalyzeError::UnresolvedSymbol { name: sym.name().to_string(), loc });
        }

        let alias = sym.ns().unwrap();
        let name = sym.name();
        if alias == "cpp" {
            return Ok(Expr::CppValue { expression: name.to_string(), ty: CppType::Object, loc });
        }

        let current = self.ctx.current_namespace();
        if let Some(ns) = self.ctx.find_namespace(&current) {
            if let Some(target) = ns.resolve_alias(alias) {
                return Ok(Expr::VarDeref { ns: target, name: name.to_string(), loc });
            }
            if self.ctx.find_namespace(alias).is_some() {
                return Ok(Expr::VarDeref { ns: alias.to_string(), name: name.to_string(), loc });
            }
            if let Some(header) = ns.resolve_native_header_alias(alias) {
                return Ok(classify_native_header_reference(&header, name, &[], loc));
            }
        }
        Err(AnalyzeError::UnresolvedSymbol { name: format!("{alias}/{name}"), loc })
    }

    fn analyze_list(&mut self, list: &PersistentList<Object>, loc: SourceLocation) -> AnalyzeResult<Expr> {
        if list.is_empty() {
            return Ok(Expr::Literal { value: Object::List(list.clone()), loc });
        }
        let items: Vec<Object> = list.iter().cloned().collect();
        let head = &items[0];
        let tail = &items[1..];

        if let Object::Symbol(sym) = head {
            if sym.ns().is_none() {
                match sym.name() {
                    "ns" => return self.analyze_ns(tail, loc),
                    "defn" => return self.expand_and_analyze(expand_defn(tail, loc.clone())?, loc),
                    "when" => return self.expand_and_analyze(expand_when(tail, loc.clone())?, loc),
                    "cond" => return self.expand_and_analyze(expand_cond(tail, loc.clone())?, loc),
                    "->" => return self.expand_and_analyze(expand_thread_first(tail, loc.clone())?, loc),
                    "->>" => return self.expand_and_analyze(expand_thread_last(tail, loc.clone())?, loc),
                    "deftest" => return self.expand_and_analyze(expand_deftest(tail, loc.clone())?, loc),
                    "is" => return self.expand_and_analyze(expand_is(tail, loc.clone())?, loc),
                    "are" => return self.expand_and_analyze(expand_are(tail, loc.clone())?, loc),
                    "if" => return self.analyze_if(tail, loc),
                    "do" => return self.analyze_do(tail, loc),
                    "let*" => return self.analyze_let(tail, loc),
                    "letfn*" => return self.analyze_letfn(tail, loc),
                    "loop*" => return self.analyze_loop(tail, loc),
                    "recur" => return self.analyze_recur(tail, loc),
                    "fn*" => return self.analyze_fn(None, tail, loc),
                    "def" => return self.analyze_def(tail, loc),
                    "var" => return self.analyze_var_ref(tail, loc),
                    "quote" => return self.analyze_quote(tail, loc),
                    "try" => return self.analyze_try(tail, loc),
                    "throw" => return self.analyze_throw(tail, loc),
                    "cpp-raw" => return self.analyze_cpp_raw(tail, loc),
                    "cpp-new" => return self.analyze_cpp_new(tail, loc),
                    "cpp-cast" => return self.analyze_cpp_cast(tail, loc),
                    "cpp-unbox" => return self.analyze_cpp_unbox(tail, loc),
                    _ => {}
                }
                let text = sym.name();
                if let Some(member) = text.strip_prefix(".-") {
                    return self.analyze_member_access(member, tail, loc);
                }
                if let Some(member) = text.strip_prefix('.') {
                    return self.analyze_member_call(member, tail, loc);
                }
            } else if sym.ns() == Some("cpp") {
                let args = tail.iter().map(|a| self.analyze(a, loc.clone())).collect::<AnalyzeResult<Vec<_>>>()?;
                return self.analyze_native_call(sym.name(), args, loc);
            } else {
                let current = self.ctx.current_namespace();
                let header = self
                    .ctx
                    .find_namespace(&current)
                    .and_then(|ns| ns.resolve_native_header_alias(sym.ns().unwrap()));
                if let Some(header) = header {
                    let args = tail.iter().map(|a| self.analyze(a, loc.clone())).collect::<AnalyzeResult<Vec<_>>>()?;
                    return Ok(classify_native_header_reference(&header, sym.name(), &args, loc));
                }
            }
        }

        let callee = self.analyze(head, loc.clone())?;
        let args = tail.iter().map(|a| self.analyze(a, loc.clone())).collect::<AnalyzeResult<Vec<_>>>()?;
        Ok(self.maybe_unbox_invoke(callee, args, loc))
    }

    fn expand_and_analyze(&mut self, expanded: Object, loc: SourceLocation) -> AnalyzeResult<Expr> {
        self.expansion_stack.push(loc.clone());
        let result = self.analyze(&expanded, loc);
        self.expansion_stack.pop();
        result
    }

    fn analyze_ns(&mut self, tail: &[Object], loc: SourceLocation) -> AnalyzeResult<Expr> {
        let Some(Object::Symbol(name)) = tail.first() else {
            return Err(AnalyzeError::InvalidDef { reason: "ns requires a namespace name symbol".to_string(), loc });
        };
        self.ctx.intern_namespace(name.name());
        self.ctx.set_current_namespace(name.name());
        Ok(Expr::Do { body: Vec::new(), loc })
    }

    fn analyze_if(&mut self, tail: &[Object], loc: SourceLocation) -> AnalyzeResult<Expr> {
        if tail.len() < 2 || tail.len() > 3 {
            return Err(AnalyzeError::InvalidDef { reason: "if takes a test, then, and optional else".to_string(), loc });
        }
        let test = Box::new(self.analyze(&tail[0], loc.clone())?);
        let then = Box::new(self.analyze(&tail[1], loc.clone())?);
        let else_ = tail.get(2).map(|e| self.analyze(e, loc.clone())).transpose()?.map(Box::new);
        Ok(Expr::If { test, then, else_, loc })
    }

    fn analyze_do(&mut self, tail: &[Object], loc: SourceLocation) -> AnalyzeResult<Expr> {
        let body = tail.iter().map(|f| self.analyze(f, loc.clone())).collect::<AnalyzeResult<Vec<_>>>()?;
        Ok(Expr::Do { body, loc })
    }

    fn analyze_let(&mut self, tail: &[Object], loc: SourceLocation) -> AnalyzeResult<Expr> {
        let Some(Object::Vector(binding_forms)) = tail.first() else {
            return Err(AnalyzeError::InvalidDef { reason: "let* requires a binding vector".to_string(), loc });
        };
        let pairs = binding_forms.to_vec();
        if pairs.len() % 2 != 0 {
            return Err(AnalyzeError::InvalidDef { reason: "let* binding vector must have an even number of forms".to_string(), loc });
        }
        self.push_locals(Vec::new());
        let mut bindings = Vec::new();
        for pair in pairs.chunks(2) {
            let Object::Symbol(name) = &pair[0] else {
                self.pop_locals();
                return Err(AnalyzeError::InvalidDef { reason: "let* binding target must be a symbol".to_string(), loc });
            };
            let value = match self.analyze(&pair[1], loc.clone()) {
                Ok(v) => v,
                Err(e) => {
                    self.pop_locals();
                    return Err(e);
                }
            };
            self.locals.last_mut().unwrap().push(name.clone());
            bindings.push((name.clone(), value));
        }
        let body = tail[1..].iter().map(|f| self.analyze(f, loc.clone())).collect::<AnalyzeResult<Vec<_>>>();
        self.pop_locals();
        Ok(Expr::Let { bindings, body: body?, loc })
    }

    fn analyze_letfn(&mut self, tail: &[Object], loc: SourceLocation) -> AnalyzeResult<Expr> {
        let Some(Object::Vector(binding_forms)) = tail.first() else {
            return Err(AnalyzeError::InvalidDef { reason: "letfn* requires a binding vector".to_string(), loc });
        };
        let pairs = binding_forms.to_vec();
        self.push_locals(pairs.chunks(2).filter_map(|p| match &p[0] {
            Object::Symbol(s) => Some(s.clone()),
            _ => None,
        }).collect());
        let mut bindings = Vec::new();
        for pair in pairs.chunks(2) {
            let Object::Symbol(name) = &pair[0] else {
                self.pop_locals();
                return Err(AnalyzeError::InvalidDef { reason: "letfn* binding target must be a symbol".to_string(), loc });
            };
            let Expr::Fn { arities, .. } = (match self.analyze(&pair[1], loc.clone()) {
                Ok(v) => v,
                Err(e) => {
                    self.pop_locals();
                    return Err(e);
                }
            }) else {
                self.pop_locals();
                return Err(AnalyzeError::InvalidDef { reason: "letfn* binding value must be fn*".to_string(), loc });
            };
            let arity = arities.into_iter().next().ok_or_else(|| AnalyzeError::InvalidDef {
                reason: "letfn* binding fn* must have at least one arity".to_string(),
                loc: loc.clone(),
            })?;
            bindings.push((name.clone(), std::rc::Rc::new(arity)));
        }
        let body = tail[1..].iter().map(|f| self.analyze(f, loc.clone())).collect::<AnalyzeResult<Vec<_>>>();
        self.pop_locals();
        Ok(Expr::LetFn { bindings, body: body?, loc })
    }

    fn analyze_loop(&mut self, tail: &[Object], loc: SourceLocation) -> AnalyzeResult<Expr> {
        let Some(Object::Vector(binding_forms)) = tail.first() else {
            return Err(AnalyzeError::InvalidDef { reason: "loop* requires a binding vector".to_string(), loc });
        };
        let pairs = binding_forms.to_vec();
        self.push_locals(Vec::new());
        let mut bindings = Vec::new();
        for pair in pairs.chunks(2) {
            let Object::Symbol(name) = &pair[0] else {
                self.pop_locals();
                return Err(AnalyzeError::InvalidDef { reason: "loop* binding target must be a symbol".to_string(), loc });
            };
            let value = match self.analyze(&pair[1], loc.clone()) {
                Ok(v) => v,
                Err(e) => {
                    self.pop_locals();
                    return Err(e);
                }
            };
            self.locals.last_mut().unwrap().push(name.clone());
            bindings.push((name.clone(), value));
        }
        let body = tail[1..].iter().map(|f| self.analyze(f, loc.clone())).collect::<AnalyzeResult<Vec<_>>>();
        self.pop_locals();
        Ok(Expr::Loop { bindings, body: body?, loc })
    }

    fn analyze_recur(&mut self, tail: &[Object], loc: SourceLocation) -> AnalyzeResult<Expr> {
        let args = tail.iter().map(|a| self.analyze(a, loc.clone())).collect::<AnalyzeResult<Vec<_>>>()?;
        Ok(Expr::Recur { args, loc })
    }

    fn analyze_fn(&mut self, name: Option<Symbol>, tail: &[Object], loc: SourceLocation) -> AnalyzeResult<Expr> {
        let mut rest = tail;
        let fn_name = match (name, rest.first()) {
            (Some(n), _) => Some(n),
            (None, Some(Object::Symbol(n))) => {
                rest = &rest[1..];
                Some(n.clone())
            }
            (None, _) => None,
        };

        let arity_forms: Vec<Vec<Object>> = match rest.first() {
            Some(Object::Vector(_)) => vec![rest.to_vec()],
            _ => rest
                .iter()
                .map(|f| match f {
                    Object::List(l) => l.iter().cloned().collect(),
                    _ => Vec::new(),
                })
                .collect(),
        };

        let mut arities = Vec::new();
        for arity_form in &arity_forms {
            let Some(Object::Vector(params_vec)) = arity_form.first() else {
                return Err(AnalyzeError::InvalidFnParam { reason: "fn* arity requires a parameter vector".to_string(), loc });
            };
            let raw_params = params_vec.to_vec();
            let mut params = Vec::new();
            let mut variadic = false;
            let mut i = 0;
            while i < raw_params.len() {
                let Object::Symbol(p) = &raw_params[i] else {
                    return Err(AnalyzeError::InvalidFnParam { reason: "fn* parameters must be symbols".to_string(), loc });
                };
                if p.name() == "&" {
                    variadic = true;
                    i += 1;
                    continue;
                }
                params.push(p.clone());
                i += 1;
            }
            self.push_locals(params.clone());
            if let Some(n) = &fn_name {
                self.locals.last_mut().unwrap().push(n.clone());
            }
            let body = arity_form[1..].iter().map(|f| self.analyze(f, loc.clone())).collect::<AnalyzeResult<Vec<_>>>();
            self.pop_locals();
            arities.push(FnArity { params, variadic, body: body? });
        }
        Ok(Expr::Fn { name: fn_name, arities, loc })
    }

    fn analyze_def(&mut self, tail: &[Object], loc: SourceLocation) -> AnalyzeResult<Expr> {
        let Some(Object::Symbol(name)) = tail.first() else {
            return Err(AnalyzeError::InvalidDef { reason: "def requires a symbol".to_string(), loc });
        };
        let value = tail.get(1).map(|v| self.analyze(v, loc.clone())).transpose()?.map(Box::new);
        let def_loc = self.def_location(&loc);
        let current = self.ctx.current_namespace();
        let var = self.ctx.intern_namespace(&current).intern(name.name());
        var.alter_meta(|m| {
            corvid_core::MetadataExt::assoc_str(m, "file", Object::Str(corvid_core::RString::new(def_loc.file.display().to_string())))
        });
        Ok(Expr::Def { name: name.clone(), value, loc })
    }

    fn analyze_var_ref(&mut self, tail: &[Object], loc: SourceLocation) -> AnalyzeResult<Expr> {
        let Some(Object::Symbol(sym)) = tail.first() else {
            return Err(AnalyzeError::InvalidDef { reason: "var requires a symbol".to_string(), loc });
        };
        let ns = sym.ns().map(|s| s.to_string()).unwrap_or_else(|| self.ctx.current_namespace());
        Ok(Expr::Var { ns, name: sym.name().to_string(), loc })
    }

    fn analyze_quote(&mut self, tail: &[Object], loc: SourceLocation) -> AnalyzeResult<Expr> {
        let form = tail.first().cloned().unwrap_or_else(|| Object::nil().clone());
        Ok(Expr::Quote { form, loc })
    }

    fn analyze_try(&mut self, tail: &[Object], loc: SourceLocation) -> AnalyzeResult<Expr> {
        let mut body = Vec::new();
        let mut catches = Vec::new();
        let mut finally = None;
        for form in tail {
            if let Object::List(l) = form {
                let items: Vec<Object> = l.iter().cloned().collect();
                if let Some(Object::Symbol(head)) = items.first() {
                    if head.name() == "catch" {
                        let exception_type = match items.get(1) {
                            Some(Object::Symbol(t)) => Some(t.name().to_string()),
                            _ => None,
                        };
                        let Some(Object::Symbol(binding)) = items.get(2) else {
                            return Err(AnalyzeError::InvalidDef { reason: "catch requires a binding symbol".to_string(), loc });
                        };
                        self.push_locals(vec![binding.clone()]);
                        let catch_body = items[3..].iter().map(|f| self.analyze(f, loc.clone())).collect::<AnalyzeResult<Vec<_>>>();
                        self.pop_locals();
                        catches.push(CatchClause { exception_type, binding: binding.clone(), body: catch_body? });
                        continue;
                    }
                    if head.name() == "finally" {
                        finally = Some(items[1..].iter().map(|f| self.analyze(f, loc.clone())).collect::<AnalyzeResult<Vec<_>>>()?);
                        continue;
                    }
                }
            }
            body.push(self.analyze(form, loc.clone())?);
        }
        Ok(Expr::Try { body, catches, finally, loc })
    }

    fn analyze_throw(&mut self, tail: &[Object], loc: SourceLocation) -> AnalyzeResult<Expr> {
        let Some(value_form) = tail.first() else {
            return Err(AnalyzeError::InvalidDef { reason: "throw requires a value".to_string(), loc });
        };
        let value = Box::new(self.analyze(value_form, loc.clone())?);
        Ok(Expr::Throw { value, loc })
    }

    fn analyze_cpp_raw(&mut self, tail: &[Object], loc: SourceLocation) -> AnalyzeResult<Expr> {
        let Some(Object::Str(s)) = tail.first() else {
            return Err(AnalyzeError::InvalidInteropCall { reason: "cpp-raw requires a string literal".to_string(), loc });
        };
        Ok(Expr::CppRaw { source: s.as_str().to_string(), loc })
    }

    fn analyze_cpp_new(&mut self, tail: &[Object], loc: SourceLocation) -> AnalyzeResult<Expr> {
        let Some(Object::Str(class)) = tail.first() else {
            return Err(AnalyzeError::InvalidInteropCall { reason: "cpp-new requires a class name string".to_string(), loc });
        };
        let args = tail[1..].iter().map(|a| self.analyze(a, loc.clone())).collect::<AnalyzeResult<Vec<_>>>()?;
        Ok(Expr::CppNew { class: class.as_str().to_string(), args, loc })
    }

    fn analyze_cpp_cast(&mut self, tail: &[Object], loc: SourceLocation) -> AnalyzeResult<Expr> {
        let Some(value_form) = tail.first() else {
            return Err(AnalyzeError::InvalidInteropCall { reason: "cpp-cast requires a value".to_string(), loc });
        };
        let target = tail.get(1).and_then(keyword_name).and_then(cpp_type_from_tag).ok_or_else(|| {
            AnalyzeError::InvalidInteropCall { reason: "cpp-cast requires a :target-type keyword".to_string(), loc: loc.clone() }
        })?;
        let policy = match tail.get(2).and_then(keyword_name) {
            Some("from-object") | None => CastPolicy::FromObject,
            Some("into-object") => CastPolicy::IntoObject,
            Some("cpp-to-cpp") => CastPolicy::CppToCpp,
            Some(other) => {
                return Err(AnalyzeError::InvalidInteropCall { reason: format!("unknown cast policy :{other}"), loc });
            }
        };
        let value = Box::new(self.analyze(value_form, loc.clone())?);
        Ok(Expr::CppCast { value, target, policy, loc })
    }

    fn analyze_cpp_unbox(&mut self, tail: &[Object], loc: SourceLocation) -> AnalyzeResult<Expr> {
        let Some(value_form) = tail.first() else {
            return Err(AnalyzeError::InvalidCppUnbox { reason: "cpp-unbox requires a value".to_string(), loc });
        };
        let ty = tail.get(1).and_then(keyword_name).and_then(cpp_type_from_tag).ok_or_else(|| {
            AnalyzeError::InvalidCppUnbox { reason: "cpp-unbox requires a :target-type keyword".to_string(), loc: loc.clone() }
        })?;
        let value = Box::new(self.analyze(value_form, loc.clone())?);
        Ok(Expr::CppUnbox { value, ty, loc })
    }

    fn analyze_member_access(&mut self, member: &str, tail: &[Object], loc: SourceLocation) -> AnalyzeResult<Expr> {
        let Some(target_form) = tail.first() else {
            return Err(AnalyzeError::InvalidInteropCall { reason: format!(".-{member} requires a target"), loc });
        };
        let target = Box::new(self.analyze(target_form, loc.clone())?);
        Ok(Expr::CppMemberAccess { target, member: member.to_string(), loc })
    }

    fn analyze_member_call(&mut self, member: &str, tail: &[Object], loc: SourceLocation) -> AnalyzeResult<Expr> {
        let Some(target_form) = tail.first() else {
            return Err(AnalyzeError::InvalidInteropCall { reason: format!(".{member} requires a target"), loc });
        };
        let target = Box::new(self.analyze(target_form, loc.clone())?);
        let args = tail[1..].iter().map(|a| self.analyze(a, loc.clone())).collect::<AnalyzeResult<Vec<_>>>()?;
        Ok(Expr::CppMemberCall { target, member: member.to_string(), args, loc })
    }

    /// A `(cpp/name args...)` call is resolved against the FFI manifest
    /// registry first — the dialect name maps to the real linker symbol and
    /// its declared arity is enforced — falling back to an untyped global
    /// call under the literal name for anything the registry doesn't know
    /// about (§4.3 "C++ call classification").
    fn analyze_native_call(&self, dialect_name: &str, args: Vec<Expr>, loc: SourceLocation) -> AnalyzeResult<Expr> {
        if let Some((symbol, sig)) = self.native.resolve(dialect_name) {
            if !sig.accepts_arity(args.len()) {
                return Err(AnalyzeError::WrongArity { name: dialect_name.to_string(), given: args.len(), loc });
            }
            return Ok(Expr::CppGlobalCall { path: symbol.to_string(), args, loc });
        }
        Ok(Expr::CppGlobalCall { path: dialect_name.to_string(), args, loc })
    }

    /// Auto-unboxing of primitive literals at a builtin-operator use site
    /// (§4.3 "Auto-unboxing of primitive literals"). Only fires when the
    /// callee directly names a known builtin arithmetic/comparison op;
    /// everything else is an ordinary dynamic `Invoke`.
    fn maybe_unbox_invoke(&self, callee: Expr, args: Vec<Expr>, loc: SourceLocation) -> Expr {
        if let Expr::VarDeref { ns, name, .. } = &callee {
            if ns == CORE_NS && is_builtin_operator(name) {
                let args = args.into_iter().map(unbox_if_primitive_literal).collect();
                return Expr::CppBuiltinOp { op: name.clone(), args, loc };
            }
        }
        Expr::Invoke { callee: Box::new(callee), args, loc }
    }
}

fn is_builtin_operator(name: &str) -> bool {
    matches!(name, "+" | "-" | "*" | "/" | "=" | "<" | ">" | "<=" | ">=")
}

fn unbox_if_primitive_literal(expr: Expr) -> Expr {
    match &expr {
        Expr::Literal { value: Object::Integer(_), loc } => {
            Expr::CppCast { value: Box::new(expr.clone()), target: CppType::Long, policy: CastPolicy::FromObject, loc: loc.clone() }
        }
        Expr::Literal { value: Object::Real(_), loc } => {
            Expr::CppCast { value: Box::new(expr.clone()), target: CppType::Double, policy: CastPolicy::FromObject, loc: loc.clone() }
        }
        _ => expr,
    }
}

fn keyword_name(form: &Object) -> Option<&str> {
    match form {
        Object::Keyword(kw) => Some(kw.name()),
        _ => None,
    }
}

fn cpp_type_from_tag(tag: &str) -> Option<CppType> {
    match tag {
        "void" => Some(CppType::Void),
        "bool" => Some(CppType::Bool),
        "long" | "int" => Some(CppType::Long),
        "double" | "float" => Some(CppType::Double),
        "object" => Some(CppType::Object),
        other => Some(CppType::Class(other.to_string())),
    }
}

/// Call classification for a symbol resolved through a native-header alias
/// (§4.3 "C++ call classification"): zero args standalone is a value
/// reference; exactly one arg against a capitalized (class-looking) name is
/// a constructor; otherwise a global/member call.
fn classify_native_header_reference(scope: &str, member: &str, args: &[Expr], loc: SourceLocation) -> Expr {
    let looks_like_class = member.chars().next().is_some_and(|c| c.is_uppercase());
    if args.is_empty() {
        Expr::CppValue { expression: format!("{scope}::{member}"), ty: CppType::Object, loc }
    } else if args.len() == 1 && looks_like_class {
        Expr::CppNew { class: format!("{scope}::{member}"), args: args.to_vec(), loc }
    } else {
        Expr::CppGlobalCall { path: format!("{scope}::{member}"), args: args.to_vec(), loc }
    }
}

fn list_of(items: Vec<Object>) -> Object {
    Object::List(PersistentList::from_iter_rev(items))
}

fn sym(name: &str) -> Object {
    Object::Symbol(Symbol::unqualified(name))
}

fn expand_when(tail: &[Object], loc: SourceLocation) -> AnalyzeResult<Object> {
    let Some(test) = tail.first() else {
        return Err(AnalyzeError::InvalidDef { reason: "when requires a test".to_string(), loc });
    };
    let mut form = vec![sym("if"), test.clone()];
    form.push(list_of(std::iter::once(sym("do")).chain(tail[1..].iter().cloned()).collect()));
    Ok(list_of(form))
}

fn expand_cond(tail: &[Object], loc: SourceLocation) -> AnalyzeResult<Object> {
    if tail.is_empty() {
        return Ok(Object::nil().clone());
    }
    if tail.len() < 2 {
        return Err(AnalyzeError::InvalidDef { reason: "cond requires test/result pairs".to_string(), loc });
    }
    let rest = expand_cond(&tail[2..], loc)?;
    Ok(list_of(vec![sym("if"), tail[0].clone(), tail[1].clone(), rest]))
}

fn expand_thread_first(tail: &[Object], loc: SourceLocation) -> AnalyzeResult<Object> {
    let Some(seed) = tail.first() else {
        return Err(AnalyzeError::InvalidDef { reason: "-> requires a seed expression".to_string(), loc });
    };
    let mut current = seed.clone();
    for step in &tail[1..] {
        current = match step {
            Object::List(l) => {
                let mut items: Vec<Object> = l.iter().cloned().collect();
                items.insert(1, current);
                list_of(items)
            }
            other => list_of(vec![other.clone(), current]),
        };
    }
    Ok(current)
}

fn expand_thread_last(tail: &[Object], loc: SourceLocation) -> AnalyzeResult<Object> {
    let Some(seed) = tail.first() else {
        return Err(AnalyzeError::InvalidDef { reason: "->> requires a seed expression".to_string(), loc });
    };
    let mut current = seed.clone();
    for step in &tail[1..] {
        current = match step {
            Object::List(l) => {
                let mut items: Vec<Object> = l.iter().cloned().collect();
                items.push(current);
                list_of(items)
            }
            other => list_of(vec![other.clone(), current]),
        };
    }
    Ok(current)
}

fn expand_defn(tail: &[Object], loc: SourceLocation) -> AnalyzeResult<Object> {
    let Some(name @ Object::Symbol(_)) = tail.first() else {
        return Err(AnalyzeError::InvalidDef { reason: "defn requires a name symbol".to_string(), loc });
    };
    let rest = &tail[1..];
    let fn_tail: Vec<Object> = std::iter::once(name.clone()).chain(rest.iter().cloned()).collect();
    Ok(list_of(vec![sym("def"), name.clone(), list_of(std::iter::once(sym("fn*")).chain(fn_tail).collect())]))
}

fn expand_deftest(tail: &[Object], loc: SourceLocation) -> AnalyzeResult<Object> {
    let Some(name @ Object::Symbol(_)) = tail.first() else {
        return Err(AnalyzeError::InvalidDef { reason: "deftest requires a name symbol".to_string(), loc });
    };
    let body = &tail[1..];
    let arity = list_of(std::iter::once(list_of(vec![])).chain(body.iter().cloned()).collect());
    Ok(list_of(vec![sym("def"), name.clone(), list_of(vec![sym("fn*"), arity])]))
}

fn expand_is(tail: &[Object], loc: SourceLocation) -> AnalyzeResult<Object> {
    let Some(assertion) = tail.first() else {
        return Err(AnalyzeError::InvalidDef { reason: "is requires an assertion form".to_string(), loc });
    };
    let file = Object::Str(corvid_core::RString::new(loc.file.display().to_string()));
    let line = Object::Integer(loc.start_line as i64);
    Ok(list_of(vec![
        Object::Symbol(Symbol::new(Some("clojure.test"), "try-expr")),
        file,
        line,
        list_of(vec![sym("quote"), assertion.clone()]),
        assertion.clone(),
    ]))
}

fn expand_are(tail: &[Object], loc: SourceLocation) -> AnalyzeResult<Object> {
    let [Object::Vector(argv), template, rest @ ..] = tail else {
        return Err(AnalyzeError::InvalidDef { reason: "are requires a binding vector and a template".to_string(), loc });
    };
    let names: Vec<Symbol> = argv
        .to_vec()
        .into_iter()
        .filter_map(|f| match f {
            Object::Symbol(s) => Some(s),
            _ => None,
        })
        .collect();
    if names.is_empty() {
        return Err(AnalyzeError::InvalidDef { reason: "are binding vector must name at least one argument".to_string(), loc });
    }
    if rest.len() % names.len() != 0 {
        return Err(AnalyzeError::InvalidDef {
            reason: "are argument count must be a multiple of the binding vector's length".to_string(),
            loc,
        });
    }
    let mut body = vec![sym("do")];
    for chunk in rest.chunks(names.len()) {
        let bindings: Vec<(Symbol, Object)> = names.iter().cloned().zip(chunk.iter().cloned()).collect();
        let substituted = substitute(template, &bindings);
        body.push(list_of(vec![sym("is"), substituted]));
    }
    Ok(list_of(body))
}

fn substitute(form: &Object, bindings: &[(Symbol, Object)]) -> Object {
    match form {
        Object::Symbol(s) => {
            bindings.iter().find(|(name, _)| name == s).map(|(_, v)| v.clone()).unwrap_or_else(|| form.clone())
        }
        Object::List(l) => list_of(l.iter().map(|f| substitute(f, bindings)).collect()),
        Object::Vector(v) => Object::Vector(corvid_core::PersistentVector::from_iter_cloned(
            v.iter().map(|f| substitute(f, bindings)),
        )),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_runtime::RuntimeContext;

    fn fresh_ctx() -> RuntimeContext {
        RuntimeContext::new(vec![], std::env::temp_dir())
    }

    #[test]
    fn literal_analyzes_to_itself() {
        let ctx = fresh_ctx();
        let native = NativeDeclRegistry::new();
        let mut a = Analyzer::new(&ctx, &native);
        let expr = a.analyze(&Object::Integer(42), SourceLocation::placeholder()).unwrap();
        assert!(matches!(expr, Expr::Literal { value: Object::Integer(42), .. }));
    }

    #[test]
    fn unresolved_symbol_reports_name_and_location() {
        let ctx = fresh_ctx();
        let native = NativeDeclRegistry::new();
        let mut a = Analyzer::new(&ctx, &native);
        let err = a.analyze(&sym("totally-unbound"), SourceLocation::placeholder()).unwrap_err();
        match err {
            AnalyzeError::UnresolvedSymbol { name, .. } => assert_eq!(name, "totally-unbound"),
            other => panic!("expected UnresolvedSymbol, got {other:?}"),
        }
    }

    #[test]
    fn let_binds_locals_visible_in_body() {
        let ctx = fresh_ctx();
        let native = NativeDeclRegistry::new();
        let mut a = Analyzer::new(&ctx, &native);
        let form = list_of(vec![
            sym("let*"),
            Object::Vector(corvid_core::PersistentVector::from_iter_cloned([sym("x"), Object::Integer(1)])),
            sym("x"),
        ]);
        let expr = a.analyze(&form, SourceLocation::placeholder()).unwrap();
        let Expr::Let { body, .. } = expr else { panic!("expected Let") };
        assert!(matches!(body[0], Expr::LocalRef { .. }));
    }

    #[test]
    fn when_expands_to_if_do() {
        let loc = SourceLocation::placeholder();
        let expanded = expand_when(&[sym("cond-form"), Object::Integer(1), Object::Integer(2)], loc).unwrap();
        let Object::List(l) = expanded else { panic!("expected list") };
        let items: Vec<Object> = l.iter().cloned().collect();
        assert_eq!(items[0], sym("if"));
    }

    #[test]
    fn thread_first_inserts_seed_as_first_arg() {
        let loc = SourceLocation::placeholder();
        let step = list_of(vec![sym("f"), Object::Integer(2)]);
        let expanded = expand_thread_first(&[Object::Integer(1), step], loc).unwrap();
        let Object::List(l) = expanded else { panic!("expected list") };
        let items: Vec<Object> = l.iter().cloned().collect();
        assert_eq!(items, vec![sym("f"), Object::Integer(1), Object::Integer(2)]);
    }

    #[test]
    fn defn_desugars_to_def_of_fn_star() {
        let loc = SourceLocation::placeholder();
        let params = Object::Vector(corvid_core::PersistentVector::from_iter_cloned([sym("x")]));
        let expanded = expand_defn(&[sym("double"), params, sym("x")], loc).unwrap();
        let Object::List(l) = expanded else { panic!("expected list") };
        let items: Vec<Object> = l.iter().cloned().collect();
        assert_eq!(items[0], sym("def"));
        assert_eq!(items[1], sym("double"));
    }

    #[test]
    fn are_expands_to_one_is_per_argument_group() {
        let loc = SourceLocation::placeholder();
        let argv = Object::Vector(corvid_core::PersistentVector::from_iter_cloned([sym("x")]));
        let template = list_of(vec![sym("pos?"), sym("x")]);
        let expanded = expand_are(&[argv, template, Object::Integer(1), Object::Integer(2)], loc).unwrap();
        let Object::List(l) = expanded else { panic!("expected list") };
        let items: Vec<Object> = l.iter().cloned().collect();
        assert_eq!(items.len(), 3); // `do` + two `is` forms
    }

    #[test]
    fn native_call_resolves_through_ffi_manifest_registry() {
        let ctx = fresh_ctx();
        let mut native = NativeDeclRegistry::new();
        let manifest = crate::ffi::FfiManifest::parse(
            r#"
            [[library]]
            name = "posix"
            link = "c"

            [[library.function]]
            symbol = "getpid"
            dialect_name = "process-id"
            return = "long"
            "#,
        )
        .unwrap();
        native.load_manifest(&manifest).unwrap();

        let mut a = Analyzer::new(&ctx, &native);
        let form = list_of(vec![Object::Symbol(Symbol::new(Some("cpp"), "process-id"))]);
        let expr = a.analyze(&form, SourceLocation::placeholder()).unwrap();
        let Expr::CppGlobalCall { path, args, .. } = expr else { panic!("expected CppGlobalCall") };
        assert_eq!(path, "getpid");
        assert!(args.is_empty());
    }

    #[test]
    fn native_call_wrong_arity_is_rejected() {
        let ctx = fresh_ctx();
        let mut native = NativeDeclRegistry::new();
        let manifest = crate::ffi::FfiManifest::parse(
            r#"
            [[library]]
            name = "posix"
            link = "c"

            [[library.function]]
            symbol = "getpid"
            dialect_name = "process-id"
            return = "long"
            "#,
        )
        .unwrap();
        native.load_manifest(&manifest).unwrap();

        let mut a = Analyzer::new(&ctx, &native);
        let form = list_of(vec![Object::Symbol(Symbol::new(Some("cpp"), "process-id")), Object::Integer(1)]);
        let err = a.analyze(&form, SourceLocation::placeholder()).unwrap_err();
        assert!(matches!(err, AnalyzeError::WrongArity { .. }));
    }
}
