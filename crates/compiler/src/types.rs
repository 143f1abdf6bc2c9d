//! Native function signatures used by the FFI manifest and by interop-call
//! analysis (§4.3 "Interop call classification").

use crate::ast::CppType;

/// The declared shape of one native function or method reachable from
/// dialect code: parameter types in order plus a return type. Variadic
/// native functions (`printf`-style) set `variadic` so the analyzer skips
/// arity checking past the fixed parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnSignature {
    pub params: Vec<CppType>,
    pub return_type: CppType,
    pub variadic: bool,
}

impl FnSignature {
    pub fn new(params: Vec<CppType>, return_type: CppType) -> Self {
        FnSignature { params, return_type, variadic: false }
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    /// Whether `argc` arguments can be passed to this signature.
    pub fn accepts_arity(&self, argc: usize) -> bool {
        if self.variadic {
            argc >= self.params.len()
        } else {
            argc == self.params.len()
        }
    }
}

impl std::fmt::Display for FnSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let params: Vec<_> = self.params.iter().map(|t| t.to_string()).collect();
        let tail = if self.variadic { ", ..." } else { "" };
        write!(f, "({}{}) -> {}", params.join(", "), tail, self.return_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_arity_rejects_wrong_argument_count() {
        let sig = FnSignature::new(vec![CppType::Long, CppType::Long], CppType::Long);
        assert!(sig.accepts_arity(2));
        assert!(!sig.accepts_arity(1));
        assert!(!sig.accepts_arity(3));
    }

    #[test]
    fn variadic_accepts_any_arity_at_or_above_the_fixed_params() {
        let sig = FnSignature::new(vec![CppType::Pointer(Box::new(CppType::Class("char".into())))], CppType::Long)
            .variadic();
        assert!(sig.accepts_arity(1));
        assert!(sig.accepts_arity(4));
        assert!(!sig.accepts_arity(0));
    }
}
