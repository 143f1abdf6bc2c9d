//! Target-side client for the remote compile protocol (§4.7 "target-side
//! rules"). Blocking by design: a constrained target calling this is
//! typically not running its own async executor, and a single compile
//! round-trip is the unit of work anyway.

use crate::error::RemoteError;
use crate::protocol::{Request, Response};
use corvid_core::Object;
use corvid_runtime::{Jit, RuntimeContext};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> String {
    NEXT_ID.fetch_add(1, Ordering::Relaxed).to_string()
}

/// A connection to a remote compile host. Holding one open and reusing it
/// for every `eval`/`native-source` call is what "remote-compile is
/// enabled" means on the target side.
pub struct RemoteCompileClient {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl RemoteCompileClient {
    pub fn connect(addr: impl std::net::ToSocketAddrs) -> Result<Self, RemoteError> {
        let stream = TcpStream::connect(addr).map_err(|e| RemoteError::Transport(e.to_string()))?;
        let writer = stream.try_clone().map_err(|e| RemoteError::Transport(e.to_string()))?;
        Ok(RemoteCompileClient { reader: BufReader::new(stream), writer })
    }

    fn roundtrip(&mut self, request: &Request) -> Result<Response, RemoteError> {
        let mut line = serde_json::to_string(request).map_err(|e| RemoteError::Protocol(e.to_string()))?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).map_err(|e| RemoteError::Transport(e.to_string()))?;

        let mut response_line = String::new();
        let n = self.reader.read_line(&mut response_line).map_err(|e| RemoteError::Transport(e.to_string()))?;
        if n == 0 {
            return Err(RemoteError::Transport("remote compile host closed the connection".to_string()));
        }
        serde_json::from_str(&response_line).map_err(|e| RemoteError::Protocol(e.to_string()))
    }

    /// Compiles `code` in `ns` and returns the entry symbol plus the
    /// compiled object's raw bytes (decoded from the wire's base64).
    pub fn compile(&mut self, code: &str, ns: &str, module: Option<&str>) -> Result<(String, Vec<u8>), RemoteError> {
        let request = Request::Compile { id: next_id(), code: code.to_string(), ns: ns.to_string(), module: module.map(str::to_string) };
        decode_compiled(self.roundtrip(&request)?)
    }

    /// §4.7 "target-side rules": routes through the server so a value can
    /// be evaluated against headers present only on the host.
    pub fn eval(&mut self, code: &str, ns: &str, module: Option<&str>) -> Result<(String, Vec<u8>), RemoteError> {
        let request = Request::Eval { id: next_id(), code: code.to_string(), ns: ns.to_string(), module: module.map(str::to_string) };
        decode_compiled(self.roundtrip(&request)?)
    }

    /// §4.7's target-side rule in full: send the form to the host, load the
    /// returned object bytes with the target's own JIT processor (the only
    /// step a constrained target performs locally), and call its one entry
    /// symbol for the value (§7 scenario 6).
    pub fn eval_value(&mut self, jit: &Jit, ctx: &RuntimeContext, code: &str, ns: &str, module: Option<&str>) -> Result<Object, RemoteError> {
        let (entry_symbol, bytes) = self.eval(code, ns, module)?;
        if bytes.is_empty() {
            return Err(RemoteError::Protocol("remote host returned an empty object".to_string()));
        }
        let (unit, _address) =
            jit.load_object(&bytes, &entry_symbol).map_err(|e| RemoteError::Transport(e.to_string()))?;
        unsafe { corvid_runtime::abi::call_entry0(ctx, &unit, &entry_symbol) }
            .map_err(|e| RemoteError::Transport(e.to_string()))
    }

    pub fn native_source(&mut self, code: &str, ns: &str) -> Result<String, RemoteError> {
        let request = Request::NativeSource { id: next_id(), code: code.to_string(), ns: ns.to_string() };
        match self.roundtrip(&request)? {
            Response::Source { text, .. } => Ok(text),
            Response::Error { message, kind, .. } => Err(RemoteError::RemoteCompileFailed(format!("{kind}: {message}"))),
            other => Err(RemoteError::Protocol(format!("unexpected response to native-source: {other:?}"))),
        }
    }

    pub fn require(&mut self, ns: &str, source: Option<&str>) -> Result<Vec<(String, String, Vec<u8>)>, RemoteError> {
        let request = Request::Require { id: next_id(), ns: ns.to_string(), source: source.map(str::to_string) };
        match self.roundtrip(&request)? {
            Response::Modules { modules, .. } => modules
                .into_iter()
                .map(|m| {
                    let bytes = decode_base64(&m.object_bytes_base64)?;
                    Ok((m.name, m.entry_symbol, bytes))
                })
                .collect(),
            Response::Error { message, kind, .. } => Err(RemoteError::RemoteCompileFailed(format!("{kind}: {message}"))),
            other => Err(RemoteError::Protocol(format!("unexpected response to require: {other:?}"))),
        }
    }
}

fn decode_compiled(response: Response) -> Result<(String, Vec<u8>), RemoteError> {
    match response {
        Response::Compiled { entry_symbol, object_bytes_base64, .. } => Ok((entry_symbol, decode_base64(&object_bytes_base64)?)),
        Response::Error { message, kind, .. } => Err(RemoteError::RemoteCompileFailed(format!("{kind}: {message}"))),
        other => Err(RemoteError::Protocol(format!("unexpected response: {other:?}"))),
    }
}

fn decode_base64(text: &str) -> Result<Vec<u8>, RemoteError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(text).map_err(|e| RemoteError::Protocol(e.to_string()))
}
