//! Bencode framing for the nREPL transport (§4.8): the wire format is
//! dictionaries of byte strings, integers, lists, and nested dictionaries,
//! one self-delimiting value per message.
//!
//! Decoding is iterative rather than recursive: a client can send a deeply
//! nested value, and this decoder must not grow the Rust call stack with
//! it. [`Decoder`] keeps its own explicit stack of in-progress containers
//! instead.

use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Dict(BTreeMap<Vec<u8>, Value>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Bytes(s.into().into_bytes())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<Vec<u8>, Value>> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_dict()?.get(key.as_bytes())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }
}

/// A builder for response dictionaries; keeps call sites in `ops.rs` from
/// repeating `Vec<u8>` key conversions.
#[derive(Default)]
pub struct DictBuilder(BTreeMap<Vec<u8>, Value>);

impl DictBuilder {
    pub fn new() -> Self {
        DictBuilder(BTreeMap::new())
    }

    pub fn set(mut self, key: &str, value: Value) -> Self {
        self.0.insert(key.as_bytes().to_vec(), value);
        self
    }

    pub fn set_str(self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, Value::str(value.into()))
    }

    pub fn set_int(self, key: &str, value: i64) -> Self {
        self.set(key, Value::Int(value))
    }

    pub fn build(self) -> Value {
        Value::Dict(self.0)
    }
}

#[derive(Debug)]
pub enum BencodeError {
    InvalidToken(u8),
    InvalidInteger(String),
    InvalidLength(String),
    NonStringDictKey,
    UnexpectedClose,
}

impl fmt::Display for BencodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BencodeError::InvalidToken(b) => write!(f, "invalid bencode token {b:#x}"),
            BencodeError::InvalidInteger(s) => write!(f, "invalid bencode integer '{s}'"),
            BencodeError::InvalidLength(s) => write!(f, "invalid bencode string length '{s}'"),
            BencodeError::NonStringDictKey => write!(f, "bencode dict key must be a byte string"),
            BencodeError::UnexpectedClose => write!(f, "unexpected 'e' with no open container"),
        }
    }
}

impl std::error::Error for BencodeError {}

enum Frame {
    List(Vec<Value>),
    Dict(BTreeMap<Vec<u8>, Value>, Option<Vec<u8>>),
}

/// An incremental bencode decoder: feed it bytes as they arrive off the
/// socket and call [`Decoder::try_decode`] after each read. A partial value
/// returns `Ok(None)` and leaves the buffered bytes untouched for the next
/// attempt (§4.8 "client sends a bencode-framed request... server may
/// receive it across several reads").
#[derive(Default)]
pub struct Decoder {
    buf: Vec<u8>,
}

impl Decoder {
    pub fn new() -> Self {
        Decoder { buf: Vec::new() }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Attempts to decode one complete value from the front of the buffer.
    /// Consumes exactly the bytes of that value on success; leaves the
    /// buffer untouched on `Ok(None)` (incomplete) or `Err` (malformed).
    pub fn try_decode(&mut self) -> Result<Option<Value>, BencodeError> {
        let mut stack: Vec<Frame> = Vec::new();
        let mut pos = 0usize;

        loop {
            if pos >= self.buf.len() {
                return Ok(None);
            }

            match self.buf[pos] {
                b'i' => {
                    let Some(end) = find_byte(&self.buf, pos + 1, b'e') else { return Ok(None) };
                    let text = std::str::from_utf8(&self.buf[pos + 1..end]).map_err(|_| BencodeError::InvalidInteger("non-utf8".into()))?;
                    let n: i64 = text.parse().map_err(|_| BencodeError::InvalidInteger(text.to_string()))?;
                    pos = end + 1;
                    if let Some(done) = push_value(&mut stack, Value::Int(n))? {
                        self.buf.drain(0..pos);
                        return Ok(Some(done));
                    }
                }
                b'l' => {
                    stack.push(Frame::List(Vec::new()));
                    pos += 1;
                }
                b'd' => {
                    stack.push(Frame::Dict(BTreeMap::new(), None));
                    pos += 1;
                }
                b'e' => {
                    let frame = stack.pop().ok_or(BencodeError::UnexpectedClose)?;
                    let value = match frame {
                        Frame::List(items) => Value::List(items),
                        Frame::Dict(map, pending) => {
                            if pending.is_some() {
                                return Err(BencodeError::NonStringDictKey);
                            }
                            Value::Dict(map)
                        }
                    };
                    pos += 1;
                    if let Some(done) = push_value(&mut stack, value)? {
                        self.buf.drain(0..pos);
                        return Ok(Some(done));
                    }
                }
                b'0'..=b'9' => {
                    let Some(colon) = find_byte(&self.buf, pos, b':') else { return Ok(None) };
                    let len_text = std::str::from_utf8(&self.buf[pos..colon]).map_err(|_| BencodeError::InvalidLength("non-utf8".into()))?;
                    let len: usize = len_text.parse().map_err(|_| BencodeError::InvalidLength(len_text.to_string()))?;
                    let data_start = colon + 1;
                    let data_end = data_start + len;
                    if data_end > self.buf.len() {
                        return Ok(None);
                    }
                    let bytes = self.buf[data_start..data_end].to_vec();
                    pos = data_end;
                    if let Some(done) = push_value(&mut stack, Value::Bytes(bytes))? {
                        self.buf.drain(0..pos);
                        return Ok(Some(done));
                    }
                }
                other => return Err(BencodeError::InvalidToken(other)),
            }
        }
    }
}

fn find_byte(buf: &[u8], from: usize, needle: u8) -> Option<usize> {
    buf[from..].iter().position(|&b| b == needle).map(|i| from + i)
}

/// Folds a just-decoded scalar or closed container into the frame on top of
/// `stack`. Returns `Some(value)` once the fold leaves `stack` empty, i.e.
/// the top-level value is now complete.
fn push_value(stack: &mut [Frame], value: Value) -> Result<Option<Value>, BencodeError> {
    match stack.last_mut() {
        None => Ok(Some(value)),
        Some(Frame::List(items)) => {
            items.push(value);
            Ok(None)
        }
        Some(Frame::Dict(map, pending)) => {
            match pending.take() {
                None => {
                    let Value::Bytes(key) = value else { return Err(BencodeError::NonStringDictKey) };
                    *pending = Some(key);
                }
                Some(key) => {
                    map.insert(key, value);
                }
            }
            Ok(None)
        }
    }
}

pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

fn encode_into(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Int(n) => {
            out.push(b'i');
            out.extend_from_slice(n.to_string().as_bytes());
            out.push(b'e');
        }
        Value::Bytes(b) => {
            out.extend_from_slice(b.len().to_string().as_bytes());
            out.push(b':');
            out.extend_from_slice(b);
        }
        Value::List(items) => {
            out.push(b'l');
            for item in items {
                encode_into(item, out);
            }
            out.push(b'e');
        }
        Value::Dict(map) => {
            out.push(b'd');
            for (k, v) in map {
                encode_into(&Value::Bytes(k.clone()), out);
                encode_into(v, out);
            }
            out.push(b'e');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_nested_value() {
        let mut dict = BTreeMap::new();
        dict.insert(b"op".to_vec(), Value::str("eval"));
        dict.insert(b"id".to_vec(), Value::Int(7));
        dict.insert(b"candidates".to_vec(), Value::List(vec![Value::str("a"), Value::str("b")]));
        let value = Value::Dict(dict);

        let encoded = encode(&value);
        let mut decoder = Decoder::new();
        decoder.feed(&encoded);
        let decoded = decoder.try_decode().unwrap().unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn incomplete_frame_returns_none_without_consuming() {
        let mut decoder = Decoder::new();
        decoder.feed(b"d2:op4:eval");
        assert!(decoder.try_decode().unwrap().is_none());
        decoder.feed(b"e");
        let value = decoder.try_decode().unwrap().unwrap();
        assert_eq!(value.get_str("op"), Some("eval"));
    }

    #[test]
    fn two_frames_arriving_back_to_back_decode_independently() {
        let mut decoder = Decoder::new();
        decoder.feed(b"i1ei2e");
        assert_eq!(decoder.try_decode().unwrap(), Some(Value::Int(1)));
        assert_eq!(decoder.try_decode().unwrap(), Some(Value::Int(2)));
        assert_eq!(decoder.try_decode().unwrap(), None);
    }

    #[test]
    fn unexpected_close_is_an_error_not_a_panic() {
        let mut decoder = Decoder::new();
        decoder.feed(b"e");
        assert!(decoder.try_decode().is_err());
    }

    #[test]
    fn deeply_nested_list_decodes_without_stack_overflow() {
        let depth = 50_000;
        let mut encoded = vec![b'l'; depth];
        encoded.push(b'i');
        encoded.extend_from_slice(b"1e");
        encoded.extend(std::iter::repeat(b'e').take(depth));
        let mut decoder = Decoder::new();
        decoder.feed(&encoded);
        assert!(decoder.try_decode().unwrap().is_some());
    }

    #[test]
    fn dict_builder_produces_expected_value() {
        let value = DictBuilder::new().set_str("status", "done").set_int("id", 3).build();
        assert_eq!(value.get_str("status"), Some("done"));
        assert_eq!(value.get("id").and_then(Value::as_int), Some(3));
    }
}
