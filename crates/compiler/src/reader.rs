//! Tokenizer and recursive-descent parser turning source text into forms
//! with source-location metadata (§4.2).
//!
//! Forms are represented directly as `corvid_core::Object` values (the same
//! tagged value the runtime operates on — there is no separate "form" type,
//! matching the dialect's homoiconicity). Reader macros that don't have a
//! literal `Object` counterpart (`quote`, syntax-quote, `unquote`,
//! `unquote-splicing`, `deref`) desugar to an invocation list headed by the
//! corresponding symbol, exactly as the analyzer would see a hand-written
//! `(quote x)` form.

use crate::ast::SourceLocation;
use corvid_core::{Keyword, Metadata, MetadataExt, Object, PersistentList, PersistentMap, PersistentSet, PersistentVector, RString, Symbol};
use num_bigint::BigInt;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ReaderError {
    UnterminatedCollection { opened_at: SourceLocation },
    UnterminatedString { opened_at: SourceLocation },
    InvalidEscape { found: char, loc: SourceLocation },
    InvalidNumericLiteral { text: String, loc: SourceLocation },
    UnbalancedDelimiter { found: char, loc: SourceLocation },
    UnexpectedEof { loc: SourceLocation },
}

impl std::fmt::Display for ReaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReaderError::UnterminatedCollection { opened_at } => {
                write!(f, "{opened_at}: unterminated collection")
            }
            ReaderError::UnterminatedString { opened_at } => {
                write!(f, "{opened_at}: unterminated string")
            }
            ReaderError::InvalidEscape { found, loc } => write!(f, "{loc}: invalid escape `\\{found}`"),
            ReaderError::InvalidNumericLiteral { text, loc } => {
                write!(f, "{loc}: invalid numeric literal `{text}`")
            }
            ReaderError::UnbalancedDelimiter { found, loc } => {
                write!(f, "{loc}: unbalanced delimiter `{found}`")
            }
            ReaderError::UnexpectedEof { loc } => write!(f, "{loc}: unexpected end of input"),
        }
    }
}

impl std::error::Error for ReaderError {}

pub type ReaderResult<T> = Result<T, ReaderError>;

/// Keeps only keyword-keyed entries, discarding the rest — a `^{...}` form
/// can in principle carry any object as a key, but the symbol metadata slot
/// is keyword-keyed (see [`corvid_core::Metadata`]).
fn object_map_to_metadata(m: &PersistentMap<Object, Object>) -> Metadata {
    let mut out = Metadata::new();
    for (k, v) in m.iter() {
        if let Object::Keyword(kw) = k {
            out = out.assoc(kw.clone(), v.clone());
        }
    }
    out
}

/// One top-level form plus the span it was read from.
pub struct ReadForm {
    pub form: Object,
    pub loc: SourceLocation,
}

pub struct Reader<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    file: PathBuf,
    features: &'a [String],
}

impl<'a> Reader<'a> {
    pub fn new(source: &str, file: impl AsRef<Path>, features: &'a [String]) -> Self {
        Reader {
            chars: source.chars().collect(),
            pos: 0,
            line: 0,
            col: 0,
            file: file.as_ref().to_path_buf(),
            features,
        }
    }

    /// Read every top-level form in the buffer.
    pub fn read_all(&mut self) -> ReaderResult<Vec<ReadForm>> {
        let mut forms = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            if self.at_eof() {
                break;
            }
            let start = self.mark();
            if let Some(form) = self.read_form()? {
                let end = self.mark();
                forms.push(ReadForm { form, loc: self.span(start, end) });
            }
        }
        Ok(forms)
    }

    fn mark(&self) -> (usize, usize) {
        (self.line, self.col)
    }

    fn span(&self, start: (usize, usize), end: (usize, usize)) -> SourceLocation {
        SourceLocation::new(self.file.clone(), start.0, start.1, end.0, end.1)
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() || c == ',' => {
                    self.advance();
                }
                Some(';') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    /// Read one form, returning `None` if it was consumed but produced
    /// nothing observable (a reader conditional whose branch didn't match
    /// the configured feature set).
    fn read_form(&mut self) -> ReaderResult<Option<Object>> {
        self.skip_whitespace_and_comments();
        let loc_start = self.mark();
        let Some(c) = self.peek() else {
            return Err(ReaderError::UnexpectedEof { loc: self.span(loc_start, loc_start) });
        };

        match c {
            '(' => self.read_list().map(Some),
            '[' => self.read_vector().map(Some),
            '{' => self.read_map().map(Some),
            '#' => self.read_dispatch(),
            '"' => self.read_string().map(Some),
            '\\' => self.read_char().map(Some),
            ':' => self.read_keyword().map(Some),
            '\'' => {
                self.advance();
                self.read_wrapped("quote")
            }
            '`' => {
                self.advance();
                self.read_wrapped("quote")
            }
            '~' if self.peek_at(1) == Some('@') => {
                self.advance();
                self.advance();
                self.read_wrapped("unquote-splicing")
            }
            '~' => {
                self.advance();
                self.read_wrapped("unquote")
            }
            '@' => {
                self.advance();
                self.read_wrapped("deref")
            }
            '^' => {
                self.advance();
                self.read_metadata_prefixed()
            }
            ')' | ']' | '}' => Err(ReaderError::UnbalancedDelimiter { found: c, loc: self.span(loc_start, loc_start) }),
            _ => self.read_atom().map(Some),
        }
    }

    fn read_wrapped(&mut self, head: &str) -> ReaderResult<Option<Object>> {
        self.skip_whitespace_and_comments();
        let inner_start = self.mark();
        let inner = self
            .read_form()?
            .ok_or_else(|| ReaderError::UnexpectedEof { loc: self.span(inner_start, inner_start) })?;
        let list = PersistentList::from_iter_rev([Object::Symbol(Symbol::unqualified(head)), inner]);
        Ok(Some(Object::List(list)))
    }

    fn read_metadata_prefixed(&mut self) -> ReaderResult<Option<Object>> {
        // `^{...}`, `^:kw`, `^sym`, `^"string"` — accumulate into one map,
        // left-to-right, then attach it to the following form. Only the
        // symbol carries a mutable metadata slot in this object model, so
        // non-symbol targets simply have their reader metadata discarded
        // after accumulation (documented simplification, see DESIGN.md).
        self.skip_whitespace_and_comments();
        let meta_start = self.mark();
        let meta_form = self
            .read_form()?
            .ok_or_else(|| ReaderError::UnexpectedEof { loc: self.span(meta_start, meta_start) })?;

        self.skip_whitespace_and_comments();
        let target_start = self.mark();
        let target = self
            .read_form()?
            .ok_or_else(|| ReaderError::UnexpectedEof { loc: self.span(target_start, target_start) })?;

        if let Object::Symbol(sym) = &target {
            let meta: Metadata = match meta_form {
                Object::Map(m) => object_map_to_metadata(&m),
                Object::Keyword(kw) => Metadata::new().assoc(kw, Object::Bool(true)),
                other => Metadata::new().assoc_str("tag", other),
            };
            sym.merge_meta(meta);
        }
        Ok(Some(target))
    }

    fn read_dispatch(&mut self) -> ReaderResult<Option<Object>> {
        // `##Inf`/`##-Inf`/`##NaN` are two-`#` literals handled whole by
        // `read_atom`; check before consuming the first `#` so it still
        // sees both of them.
        if self.matches_literal("##Inf") || self.matches_literal("##-Inf") || self.matches_literal("##NaN") {
            return self.read_atom().map(Some);
        }
        self.advance(); // '#'
        match self.peek() {
            Some('{') => self.read_set().map(Some),
            Some('?') => self.read_reader_conditional(),
            Some('c') if self.matches_literal("cpp") => {
                for _ in 0..3 {
                    self.advance();
                }
                self.skip_whitespace_and_comments();
                let loc_start = self.mark();
                let Object::Str(s) = self.read_string()? else {
                    return Err(ReaderError::InvalidNumericLiteral {
                        text: "#cpp requires a string literal".to_string(),
                        loc: self.span(loc_start, loc_start),
                    });
                };
                let list = PersistentList::from_iter_rev([
                    Object::Symbol(Symbol::unqualified("cpp/raw")),
                    Object::Str(s),
                ]);
                Ok(Some(Object::List(list)))
            }
            _ => self.read_atom().map(Some),
        }
    }

    fn matches_literal(&self, text: &str) -> bool {
        text.chars().enumerate().all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn read_reader_conditional(&mut self) -> ReaderResult<Option<Object>> {
        self.advance(); // '?'
        self.skip_whitespace_and_comments();
        if self.peek() != Some('(') {
            return Err(ReaderError::UnbalancedDelimiter { found: '?', loc: self.span(self.mark(), self.mark()) });
        }
        self.advance(); // '('
        let mut chosen = None;
        loop {
            self.skip_whitespace_and_comments();
            match self.peek() {
                None => return Err(ReaderError::UnexpectedEof { loc: self.span(self.mark(), self.mark()) }),
                Some(')') => {
                    self.advance();
                    break;
                }
                _ => {
                    let tag_start = self.mark();
                    let tag = self
                        .read_form()?
                        .ok_or_else(|| ReaderError::UnexpectedEof { loc: self.span(tag_start, tag_start) })?;
                    self.skip_whitespace_and_comments();
                    let branch_start = self.mark();
                    let branch = self
                        .read_form()?
                        .ok_or_else(|| ReaderError::UnexpectedEof { loc: self.span(branch_start, branch_start) })?;
                    if chosen.is_none() {
                        if let Object::Keyword(kw) = &tag {
                            if self.features.iter().any(|f| f == kw.name()) {
                                chosen = Some(branch);
                            }
                        }
                    }
                }
            }
        }
        Ok(chosen)
    }

    fn read_list(&mut self) -> ReaderResult<Object> {
        let opened_at = self.span(self.mark(), self.mark());
        self.advance(); // '('
        let items = self.read_delimited(')', opened_at)?;
        Ok(Object::List(PersistentList::from_iter_rev(items)))
    }

    fn read_vector(&mut self) -> ReaderResult<Object> {
        let opened_at = self.span(self.mark(), self.mark());
        self.advance(); // '['
        let items = self.read_delimited(']', opened_at)?;
        Ok(Object::Vector(PersistentVector::from_iter_cloned(items)))
    }

    fn read_set(&mut self) -> ReaderResult<Object> {
        let opened_at = self.span(self.mark(), self.mark());
        self.advance(); // '{'
        let items = self.read_delimited('}', opened_at)?;
        Ok(Object::Set(PersistentSet::from_iter_cloned(items)))
    }

    fn read_map(&mut self) -> ReaderResult<Object> {
        let opened_at = self.span(self.mark(), self.mark());
        self.advance(); // '{'
        let items = self.read_delimited('}', opened_at)?;
        let mut map = PersistentMap::new();
        let mut iter = items.into_iter();
        while let Some(k) = iter.next() {
            let v = iter.next().unwrap_or(Object::Nil);
            map = map.assoc(k, v);
        }
        Ok(Object::Map(map))
    }

    fn read_delimited(&mut self, close: char, opened_at: SourceLocation) -> ReaderResult<Vec<Object>> {
        let mut items = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            match self.peek() {
                None => return Err(ReaderError::UnterminatedCollection { opened_at }),
                Some(c) if c == close => {
                    self.advance();
                    break;
                }
                _ => {
                    if let Some(form) = self.read_form()? {
                        items.push(form);
                    }
                }
            }
        }
        Ok(items)
    }

    fn read_string(&mut self) -> ReaderResult<Object> {
        let opened_at = self.span(self.mark(), self.mark());
        self.advance(); // opening quote
        let mut out = String::new();
        loop {
            match self.advance() {
                None => return Err(ReaderError::UnterminatedString { opened_at }),
                Some('"') => break,
                Some('\\') => {
                    let esc_loc = self.span(self.mark(), self.mark());
                    match self.advance() {
                        Some('n') => out.push('\n'),
                        Some('t') => out.push('\t'),
                        Some('r') => out.push('\r'),
                        Some('\\') => out.push('\\'),
                        Some('"') => out.push('"'),
                        Some('0') => out.push('\0'),
                        Some(other) => return Err(ReaderError::InvalidEscape { found: other, loc: esc_loc }),
                        None => return Err(ReaderError::UnterminatedString { opened_at }),
                    }
                }
                Some(c) => out.push(c),
            }
        }
        Ok(Object::Str(RString::new(out)))
    }

    fn read_char(&mut self) -> ReaderResult<Object> {
        self.advance(); // backslash
        let name_start = self.pos;
        // Always consume at least one char, then greedily extend while
        // reading an identifier-like named literal (e.g. `newline`).
        self.advance();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() {
                self.advance();
            } else {
                break;
            }
        }
        let text: String = self.chars[name_start..self.pos].iter().collect();
        let ch = match text.as_str() {
            "newline" => '\n',
            "space" => ' ',
            "tab" => '\t',
            "return" => '\r',
            "backspace" => '\u{8}',
            single if single.chars().count() == 1 => single.chars().next().unwrap(),
            _ => text.chars().next().unwrap_or(' '),
        };
        Ok(Object::Char(ch))
    }

    fn read_keyword(&mut self) -> ReaderResult<Object> {
        self.advance(); // ':'
        let text = self.read_symbolic_text();
        let (ns, name) = split_ns(&text);
        Ok(Object::Keyword(Keyword::intern(ns, name)))
    }

    fn read_symbolic_text(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_symbol_char(c) {
                self.advance();
            } else {
                break;
            }
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn read_atom(&mut self) -> ReaderResult<Object> {
        let loc_start = self.mark();
        if self.matches_literal("##-Inf") {
            for _ in 0..6 {
                self.advance();
            }
            return Ok(Object::SpecialReal(corvid_core::SpecialDouble::NegInfinity));
        }
        if self.matches_literal("##Inf") {
            for _ in 0..5 {
                self.advance();
            }
            return Ok(Object::SpecialReal(corvid_core::SpecialDouble::PosInfinity));
        }
        if self.matches_literal("##NaN") {
            for _ in 0..5 {
                self.advance();
            }
            return Ok(Object::SpecialReal(corvid_core::SpecialDouble::NaN));
        }

        let text = self.read_symbolic_text();
        if text.is_empty() {
            let found = self.advance().unwrap_or('\0');
            return Err(ReaderError::UnbalancedDelimiter { found, loc: self.span(loc_start, loc_start) });
        }

        match text.as_str() {
            "nil" => return Ok(Object::Nil),
            "true" => return Ok(Object::Bool(true)),
            "false" => return Ok(Object::Bool(false)),
            _ => {}
        }

        if let Some(n) = parse_number(&text) {
            return Ok(n);
        }

        let (ns, name) = split_ns(&text);
        Ok(Object::Symbol(Symbol::new(ns, name)))
    }
}

fn split_ns(text: &str) -> (Option<&str>, &str) {
    match text.rfind('/') {
        Some(idx) if idx > 0 && idx < text.len() - 1 => (Some(&text[..idx]), &text[idx + 1..]),
        _ => (None, text),
    }
}

fn is_symbol_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '[' | ']' | '{' | '}' | '"' | ';' | ',' | '\'' | '`' | '~' | '@' | '^')
}

/// Parses decimal/hex/radix integers, reals, and ratios. Returns `None` if
/// `text` isn't numeric at all (i.e. it should be read as a symbol).
fn parse_number(text: &str) -> Option<Object> {
    let negative = text.starts_with('-');
    let unsigned = text.trim_start_matches(['+', '-']);
    if unsigned.is_empty() || !unsigned.chars().next().unwrap().is_ascii_digit() {
        return None;
    }

    if let Some(hex) = unsigned.strip_prefix("0x").or_else(|| unsigned.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok().map(|v| Object::Integer(if negative { -v } else { v }));
    }

    if let Some(r_idx) = unsigned.find(['r', 'R']) {
        let (radix_str, digits) = unsigned.split_at(r_idx);
        if let Ok(radix) = radix_str.parse::<u32>() {
            let digits = &digits[1..];
            if let Ok(v) = i64::from_str_radix(digits, radix) {
                return Some(Object::Integer(if negative { -v } else { v }));
            }
        }
        return None;
    }

    if let Some(slash) = unsigned.find('/') {
        let (num, den) = unsigned.split_at(slash);
        let den = &den[1..];
        if let (Ok(n), Ok(d)) = (num.parse::<BigInt>(), den.parse::<BigInt>()) {
            let n = if negative { -n } else { n };
            return corvid_core::RatioValue::new(n, d).map(Object::Ratio);
        }
        return None;
    }

    if unsigned.contains(['.', 'e', 'E']) {
        return text.parse::<f64>().ok().map(Object::Real);
    }

    text.parse::<i64>().ok().map(Object::Integer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_one(src: &str) -> Object {
        let features = vec!["dialect".to_string()];
        let mut reader = Reader::new(src, "test.dlg", &features);
        reader.read_all().unwrap().into_iter().next().unwrap().form
    }

    #[test]
    fn reads_basic_atoms() {
        assert_eq!(read_one("42"), Object::Integer(42));
        assert_eq!(read_one("-7"), Object::Integer(-7));
        assert_eq!(read_one("3.14"), Object::Real(3.14));
        assert_eq!(read_one("nil"), Object::Nil);
        assert_eq!(read_one("true"), Object::Bool(true));
        assert_eq!(read_one("##NaN"), Object::SpecialReal(corvid_core::SpecialDouble::NaN));
    }

    #[test]
    fn reads_special_doubles() {
        assert_eq!(read_one("##Inf"), Object::SpecialReal(corvid_core::SpecialDouble::PosInfinity));
        assert_eq!(read_one("##-Inf"), Object::SpecialReal(corvid_core::SpecialDouble::NegInfinity));
        assert_eq!(read_one("##NaN"), Object::SpecialReal(corvid_core::SpecialDouble::NaN));
    }

    #[test]
    fn reads_collections() {
        match read_one("[1 2 3]") {
            Object::Vector(v) => assert_eq!(v.len(), 3),
            other => panic!("expected vector, got {other:?}"),
        }
        match read_one("#{1 2 3}") {
            Object::Set(s) => assert_eq!(s.len(), 3),
            other => panic!("expected set, got {other:?}"),
        }
    }

    #[test]
    fn reads_qualified_keyword_and_symbol() {
        assert_eq!(read_one(":ns/kw"), Object::Keyword(Keyword::new(Some("ns"), "kw")));
        match read_one("ns/sym") {
            Object::Symbol(s) => {
                assert_eq!(s.ns(), Some("ns"));
                assert_eq!(s.name(), "sym");
            }
            other => panic!("expected symbol, got {other:?}"),
        }
    }

    #[test]
    fn quote_desugars_to_quote_list() {
        match read_one("'x") {
            Object::List(l) => {
                let items: Vec<_> = l.iter().cloned().collect();
                assert_eq!(items.len(), 2);
                assert_eq!(items[0], Object::Symbol(Symbol::unqualified("quote")));
            }
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn metadata_prefix_attaches_to_following_symbol() {
        match read_one("^:private foo") {
            Object::Symbol(s) => {
                let meta = s.meta().expect("metadata should be attached");
                use corvid_core::MetadataExt;
                assert_eq!(meta.get_str("private"), Some(&Object::Bool(true)));
            }
            other => panic!("expected symbol, got {other:?}"),
        }
    }

    #[test]
    fn reader_conditional_selects_matching_feature() {
        let features = vec!["dialect".to_string()];
        let mut reader = Reader::new("#?(:clj 1 :dialect 2)", "test.dlg", &features);
        let forms = reader.read_all().unwrap();
        assert_eq!(forms[0].form, Object::Integer(2));
    }

    #[test]
    fn unterminated_list_is_an_error() {
        let features = vec![];
        let mut reader = Reader::new("(1 2 3", "test.dlg", &features);
        assert!(reader.read_all().is_err());
    }
}
