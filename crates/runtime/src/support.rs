//! The C++ runtime support header: the concrete implementation of
//! `::corvid::runtime::*`, the namespace every generated translation unit
//! calls into (§4.4, §5 "External interfaces").
//!
//! Every function the generated code can call falls into one of two camps:
//!
//! - a thin inline wrapper around an `extern "C" corvid_rt_*` trampoline
//!   ([`crate::abi`] implements those) that marshals C++ argument shapes
//!   (`const char*`+length, `std::initializer_list`, `std::optional`) into
//!   the flat pointer/length shapes the ABI favors;
//! - pure C++ template machinery (`expect_object<T>`, `make_arity`,
//!   `unpack_recur`, `finally_guard`) that never needs to cross into Rust at
//!   all, because the thing it operates on — a captured lambda's arbitrary
//!   signature, a set of C++ local references — has no stable shape an
//!   `extern "C"` boundary could describe.
//!
//! Each `corvid_rt_*` name is declared behind a `#ifndef`/`#define` guard:
//! the JIT processor's symbol registration (§4.5) defines the name to a
//! cast raw function pointer via a compiler `-D` flag before this header is
//! parsed for a unit that needs it; only when a name reaches parsing
//! *unregistered* does the guard fall through to an unresolved `_fallback`
//! extern declaration, which fails to link rather than silently compiling
//! against the wrong address — "registration must precede parsing" becomes
//! "the macro must already be defined", exactly as DESIGN.md's "-D defines"
//! note commits to.

/// Included by the JIT processor at the top of every generated translation
/// unit. Never written to disk on its own — see `Jit::invoke_toolchain`.
pub fn header_text() -> String {
    let mut out = String::new();
    out.push_str(PRELUDE);
    for decl in SIGNATURES {
        out.push_str(&guarded_decl(decl));
    }
    out.push_str(WRAPPERS);
    out
}

/// `(mangled_name, return_type, params, typedef_params)`. `typedef_params`
/// is the bare parameter-type list used to build the `_t` function-pointer
/// alias `Jit::invoke_toolchain` casts a registered address through.
struct Sig {
    name: &'static str,
    ret: &'static str,
    params: &'static str,
}

const SIGNATURES: &[Sig] = &[
    Sig { name: "corvid_rt_nil", ret: "Object const*", params: "" },
    Sig { name: "corvid_rt_make_bool", ret: "Object const*", params: "bool" },
    Sig { name: "corvid_rt_make_integer", ret: "Object const*", params: "long long" },
    Sig { name: "corvid_rt_make_real", ret: "Object const*", params: "double" },
    Sig { name: "corvid_rt_make_bigint", ret: "Object const*", params: "const char*, size_t" },
    Sig { name: "corvid_rt_make_bigdecimal", ret: "Object const*", params: "const char*, size_t" },
    Sig { name: "corvid_rt_make_ratio", ret: "Object const*", params: "const char*, size_t" },
    Sig { name: "corvid_rt_make_char", ret: "Object const*", params: "unsigned int" },
    Sig { name: "corvid_rt_make_string", ret: "Object const*", params: "const char*, size_t" },
    Sig {
        name: "corvid_rt_make_symbol",
        ret: "Object const*",
        params: "bool, const char*, size_t, const char*, size_t",
    },
    Sig {
        name: "corvid_rt_make_keyword",
        ret: "Object const*",
        params: "bool, const char*, size_t, const char*, size_t",
    },
    Sig { name: "corvid_rt_make_vector", ret: "Object const*", params: "Object const* const*, size_t" },
    Sig { name: "corvid_rt_make_set", ret: "Object const*", params: "Object const* const*, size_t" },
    Sig { name: "corvid_rt_make_map", ret: "Object const*", params: "Object const* const*, size_t" },
    Sig { name: "corvid_rt_is_truthy", ret: "bool", params: "Object const*" },
    Sig { name: "corvid_rt_def_var", ret: "Object const*", params: "const char*, size_t, Object const*" },
    Sig { name: "corvid_rt_the_var", ret: "Object const*", params: "const char*, size_t, const char*, size_t" },
    Sig { name: "corvid_rt_deref_var", ret: "Object const*", params: "const char*, size_t, const char*, size_t" },
    Sig { name: "corvid_rt_invoke", ret: "Object const*", params: "Object const*, Object const* const*, size_t" },
    Sig { name: "corvid_rt_ns_intern", ret: "void", params: "const char*, size_t, Object const*" },
    Sig { name: "corvid_rt_as_long", ret: "long long", params: "Object const*" },
    Sig { name: "corvid_rt_as_double", ret: "double", params: "Object const*" },
    Sig { name: "corvid_rt_as_bool", ret: "bool", params: "Object const*" },
    Sig { name: "corvid_rt_closure_new", ret: "void*", params: "const char*, size_t, bool" },
    Sig { name: "corvid_rt_closure_add_arity", ret: "void", params: "void*, size_t, void*, Trampoline" },
    Sig { name: "corvid_rt_closure_finish", ret: "Object const*", params: "void*" },
    Sig { name: "corvid_rt_is_recur_signal", ret: "bool", params: "Object const*" },
    Sig { name: "corvid_rt_make_recur_signal", ret: "Object const*", params: "Object const* const*, size_t" },
    Sig { name: "corvid_rt_recur_get", ret: "Object const*", params: "Object const*, size_t" },
    Sig { name: "corvid_rt_wrap_exception", ret: "Object const*", params: "const char*, size_t" },
    Sig { name: "corvid_rt_exception_message", ret: "const char*", params: "Object const*" },
    Sig { name: "corvid_rt_read_one", ret: "Object const*", params: "const char*, size_t" },
];

fn guarded_decl(sig: &Sig) -> String {
    format!(
        "#ifndef {name}\n#define {name} {name}_fallback\n#endif\nextern \"C\" {ret} {name}_fallback({params});\nusing {name}_t = {ret} (*)({params});\n",
        name = sig.name,
        ret = sig.ret,
        params = sig.params,
    )
}

const PRELUDE: &str = r#"// Generated runtime support header. Do not edit by hand.
#pragma once
#include <cstddef>
#include <cstring>
#include <cstdint>
#include <limits>
#include <optional>
#include <string>
#include <exception>
#include <functional>
#include <initializer_list>
#include <utility>

namespace corvid { namespace runtime {
struct Object;
using Trampoline = Object const* (*)(void*, Object const* const*, size_t);
} }

"#;

/// Inline wrappers, namespace-scoped so `::corvid::runtime::nil()` etc.
/// resolve exactly as codegen emits them, plus the arity/closure, recur,
/// and exception template machinery that never touches the ABI directly.
const WRAPPERS: &str = r#"
namespace corvid { namespace runtime {

inline Object const* nil() { return corvid_rt_nil(); }
inline Object const* make_bool(bool b) { return corvid_rt_make_bool(b); }
inline Object const* make_integer(long long v) { return corvid_rt_make_integer(v); }
inline Object const* make_real(double v) { return corvid_rt_make_real(v); }
inline Object const* make_bigint(const std::string& s) { return corvid_rt_make_bigint(s.data(), s.size()); }
inline Object const* make_bigdecimal(const std::string& s) { return corvid_rt_make_bigdecimal(s.data(), s.size()); }
inline Object const* make_ratio(const std::string& s) { return corvid_rt_make_ratio(s.data(), s.size()); }
inline Object const* make_char(unsigned int codepoint) { return corvid_rt_make_char(codepoint); }
inline Object const* make_string(const char* s) { return corvid_rt_make_string(s, strlen(s)); }
inline Object const* unbound() { return nullptr; }

inline Object const* make_symbol(std::optional<const char*> ns, const char* name) {
  if (ns) return corvid_rt_make_symbol(true, *ns, strlen(*ns), name, strlen(name));
  return corvid_rt_make_symbol(false, "", 0, name, strlen(name));
}
inline Object const* make_keyword(std::optional<const char*> ns, const char* name) {
  if (ns) return corvid_rt_make_keyword(true, *ns, strlen(*ns), name, strlen(name));
  return corvid_rt_make_keyword(false, "", 0, name, strlen(name));
}

inline Object const* make_vector(std::initializer_list<Object const*> items) {
  return corvid_rt_make_vector(items.begin(), items.size());
}
inline Object const* make_set(std::initializer_list<Object const*> items) {
  return corvid_rt_make_set(items.begin(), items.size());
}
inline Object const* make_map(std::initializer_list<Object const*> kv) {
  return corvid_rt_make_map(kv.begin(), kv.size());
}

inline bool is_truthy(Object const* v) { return corvid_rt_is_truthy(v); }

inline Object const* def_var(const char* name, Object const* value) {
  return corvid_rt_def_var(name, strlen(name), value);
}
inline Object const* the_var(const char* ns, const char* name) {
  return corvid_rt_the_var(ns, strlen(ns), name, strlen(name));
}
inline Object const* deref_var(const char* ns, const char* name) {
  return corvid_rt_deref_var(ns, strlen(ns), name, strlen(name));
}
inline void ns_intern(const char* ns, Object const* value) {
  corvid_rt_ns_intern(ns, strlen(ns), value);
}
inline Object const* invoke(Object const* callee, std::initializer_list<Object const*> args) {
  return corvid_rt_invoke(callee, args.begin(), args.size());
}
inline Object const* read_one(const std::string& s) { return corvid_rt_read_one(s.data(), s.size()); }

// Arity/closure construction: each arity closes over its own C++ lambda
// (itself possibly capturing enclosing `let`/`fn` locals), heap-allocated
// once and invoked through a type-erased, non-capturing trampoline whose
// own argument count is recovered from the lambda's call operator rather
// than from the `total_params` value codegen also passes (kept only for
// the closure's own arity bookkeeping on the Rust side).
template <typename T> struct FunctionTraits;
template <typename C, typename R, typename... Args>
struct FunctionTraits<R (C::*)(Args...) const> {
  static constexpr size_t arity = sizeof...(Args);
};

template <typename F, size_t... Is>
inline Object const* invoke_with_indices(F& f, Object const* const* args, std::index_sequence<Is...>) {
  return f(args[Is]...);
}

struct Arity {
  size_t param_count;
  void* ctx;
  Trampoline trampoline;
};

template <typename F>
inline Arity make_arity(size_t total_params, F fn) {
  using Traits = FunctionTraits<decltype(&F::operator())>;
  F* ctx = new F(std::move(fn));
  Trampoline trampoline = +[](void* raw_ctx, Object const* const* args, size_t) -> Object const* {
    F& f = *static_cast<F*>(raw_ctx);
    return invoke_with_indices(f, args, std::make_index_sequence<Traits::arity>{});
  };
  return Arity{total_params, static_cast<void*>(ctx), trampoline};
}

inline Object const* make_multi_arity_fn(const char* name, std::initializer_list<Arity> arities) {
  void* builder = corvid_rt_closure_new(name, strlen(name), true);
  for (const auto& a : arities) {
    corvid_rt_closure_add_arity(builder, a.param_count, a.ctx, a.trampoline);
  }
  return corvid_rt_closure_finish(builder);
}

inline bool is_recur_signal(Object const* v) { return corvid_rt_is_recur_signal(v); }
inline Object const* make_recur_signal(std::initializer_list<Object const*> args) {
  return corvid_rt_make_recur_signal(args.begin(), args.size());
}
template <typename... Ts>
inline void unpack_recur(Object const* signal, Ts&... vars) {
  size_t idx = 0;
  ((vars = corvid_rt_recur_get(signal, idx++)), ...);
}

struct ObjectException : std::exception {
  Object const* obj;
  std::string msg;
  explicit ObjectException(Object const* o) : obj(o), msg(corvid_rt_exception_message(o)) {}
  const char* what() const noexcept override { return msg.c_str(); }
};
inline ObjectException as_exception(Object const* value) { return ObjectException(value); }

template <typename E>
inline Object const* wrap_exception(const E& e) {
  std::string msg = e.what();
  return corvid_rt_wrap_exception(msg.data(), msg.size());
}

struct finally_guard {
  std::function<void()> fn;
  template <typename F>
  finally_guard(F f) : fn(std::move(f)) {}
  ~finally_guard() { fn(); }
};

// expect_object<T>/box<T> (§4.4 "interop auto-unboxing"): only the three
// primitive types codegen's builtin-op and cast lowering ever instantiate.
// Each expect_object<T> call heap-allocates a fresh view rather than
// reusing a shared buffer, so multi-operand expressions (`a + b`, both
// operands unboxed before either `->data` read happens) never alias.
template <typename T> struct ObjectView { T data; };
template <typename T> ObjectView<T>* expect_object(Object const* obj);
template <> inline ObjectView<long>* expect_object<long>(Object const* obj) {
  return new ObjectView<long>{static_cast<long>(corvid_rt_as_long(obj))};
}
template <> inline ObjectView<double>* expect_object<double>(Object const* obj) {
  return new ObjectView<double>{corvid_rt_as_double(obj)};
}
template <> inline ObjectView<bool>* expect_object<bool>(Object const* obj) {
  return new ObjectView<bool>{corvid_rt_as_bool(obj)};
}

template <typename T> Object const* box(T v);
template <> inline Object const* box<long>(long v) { return make_integer(v); }
template <> inline Object const* box<double>(double v) { return make_real(v); }
template <> inline Object const* box<bool>(bool v) { return make_bool(v); }

} }
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_text_guards_every_declared_symbol() {
        let text = header_text();
        for sig in SIGNATURES {
            assert!(text.contains(&format!("#ifndef {}", sig.name)), "missing guard for {}", sig.name);
            assert!(text.contains(&format!("{}_fallback", sig.name)), "missing fallback for {}", sig.name);
        }
    }

    #[test]
    fn header_text_defines_the_runtime_namespace_wrappers() {
        let text = header_text();
        assert!(text.contains("namespace corvid { namespace runtime {"));
        assert!(text.contains("make_multi_arity_fn"));
        assert!(text.contains("expect_object<long>"));
    }
}
