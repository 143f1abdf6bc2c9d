//! Registers `corvid_rt_read_one`, the one generated-code entry point
//! (backing `quote`, see [`crate::codegen::Codegen::emit_quoted_form`]) that
//! needs the reader. It lives here rather than in `corvid-runtime`'s own
//! `abi` module because `corvid-runtime` cannot depend back on
//! `corvid-compiler`; a host binary that wants quoted forms to work must
//! call [`install`] in addition to `corvid_runtime::abi::install`.

use crate::reader::Reader;
use corvid_core::Object;
use corvid_runtime::RuntimeContext;
use std::ffi::c_char;
use std::sync::Arc;

extern "C" fn corvid_rt_read_one_fallback(ptr: *const c_char, len: usize) -> *const Object {
    let text = unsafe { str_from_raw(ptr, len) };
    let form = match Reader::new(text, "<quote>", &[]).read_all() {
        Ok(mut forms) if !forms.is_empty() => forms.remove(0).form,
        _ => Object::Nil,
    };
    Arc::into_raw(Arc::new(form))
}

unsafe fn str_from_raw<'a>(ptr: *const c_char, len: usize) -> &'a str {
    let bytes = unsafe { std::slice::from_raw_parts(ptr as *const u8, len) };
    std::str::from_utf8(bytes).expect("codegen emits only well-formed UTF-8 C string literals")
}

pub fn install(ctx: &RuntimeContext) {
    ctx.jit().register_symbol("corvid_rt_read_one", corvid_rt_read_one_fallback as usize, true);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_one_parses_the_printed_form_codegen_quotes() {
        let ptr = corvid_rt_read_one_fallback("(1 2 3)".as_ptr() as *const c_char, 7);
        let form = unsafe { &*ptr };
        assert!(matches!(form, Object::List(_)));
        unsafe { Arc::from_raw(ptr) };
    }

    #[test]
    fn read_one_returns_nil_for_unparsable_text() {
        let text = "";
        let ptr = corvid_rt_read_one_fallback(text.as_ptr() as *const c_char, 0);
        assert!(matches!(unsafe { &*ptr }, Object::Nil));
        unsafe { Arc::from_raw(ptr) };
    }
}
