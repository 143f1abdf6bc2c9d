//! The nREPL server (§4.8): one thread per connection, one [`Session`] per
//! thread. Evaluation within a session is strictly sequential (a session is
//! just a loop reading one bencode frame, dispatching it, and writing one
//! response frame); separate sessions run fully concurrently against the
//! shared [`RuntimeContext`], serialized only where the JIT processor
//! itself requires it (§8 "single writer lock around parse/link").

use crate::bencode::{self, BencodeError, DictBuilder, Value};
use crate::ops;
use crate::session::Session;
use corvid_compiler::NativeDeclRegistry;
use corvid_runtime::RuntimeContext;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex};

pub struct NreplServer {
    ctx: Arc<RuntimeContext>,
    native: Arc<NativeDeclRegistry>,
    compile_lock: Arc<Mutex<()>>,
}

impl NreplServer {
    pub fn new(ctx: RuntimeContext, native: NativeDeclRegistry) -> Self {
        NreplServer { ctx: Arc::new(ctx), native: Arc::new(native), compile_lock: Arc::new(Mutex::new(())) }
    }

    pub fn serve(&self, addr: impl ToSocketAddrs) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr)?;
        for stream in listener.incoming() {
            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(error = %e, "nrepl accept failed");
                    continue;
                }
            };
            let ctx = Arc::clone(&self.ctx);
            let native = Arc::clone(&self.native);
            let compile_lock = Arc::clone(&self.compile_lock);
            std::thread::spawn(move || {
                if let Err(e) = handle_connection(stream, ctx, native, compile_lock) {
                    tracing::warn!(error = %e, "nrepl session ended");
                }
            });
        }
        Ok(())
    }
}

fn handle_connection(
    mut stream: TcpStream,
    ctx: Arc<RuntimeContext>,
    native: Arc<NativeDeclRegistry>,
    compile_lock: Arc<Mutex<()>>,
) -> std::io::Result<()> {
    let mut session = Session::new(ctx, native);
    let mut decoder = bencode::Decoder::new();
    let mut read_buf = [0u8; 4096];

    loop {
        let value = loop {
            match decoder.try_decode() {
                Ok(Some(value)) => break Some(value),
                Ok(None) => {}
                Err(e) => {
                    write_frame(&mut stream, &transport_error(&e))?;
                    return Ok(());
                }
            }
            let n = stream.read(&mut read_buf)?;
            if n == 0 {
                return Ok(());
            }
            decoder.feed(&read_buf[..n]);
        };

        let Some(request) = value else { return Ok(()) };
        let response = dispatch(&request, &mut session, &compile_lock);
        write_frame(&mut stream, &response)?;
    }
}

fn dispatch(request: &Value, session: &mut Session, compile_lock: &Mutex<()>) -> Value {
    match request.get_str("op") {
        Some("eval") => ops::eval(request, session, compile_lock),
        Some("test") => ops::test(request, session, compile_lock),
        Some("complete") => ops::complete(request, session),
        Some("info") | Some("eldoc") => ops::info(request, session),
        Some(other) => DictBuilder::new()
            .set_str("id", request.get_str("id").unwrap_or(""))
            .set("status", Value::List(vec![Value::str("done"), Value::str("error")]))
            .set_str("message", format!("unknown op '{other}'"))
            .set_str("kind", "unknown-op")
            .build(),
        None => DictBuilder::new()
            .set("status", Value::List(vec![Value::str("done"), Value::str("error")]))
            .set_str("message", "request is missing an 'op' field")
            .set_str("kind", "protocol-failure")
            .build(),
    }
}

fn transport_error(err: &BencodeError) -> Value {
    DictBuilder::new()
        .set("status", Value::List(vec![Value::str("done"), Value::str("error")]))
        .set_str("message", err.to_string())
        .set_str("kind", "transport-failed")
        .build()
}

fn write_frame(stream: &mut TcpStream, value: &Value) -> std::io::Result<()> {
    stream.write_all(&bencode::encode(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_reports_unknown_op() {
        let ctx = Arc::new(RuntimeContext::new(vec![], std::env::temp_dir()));
        let mut session = Session::new(ctx, Arc::new(NativeDeclRegistry::new()));
        let lock = Mutex::new(());
        let request = DictBuilder::new().set_str("id", "1").set_str("op", "frobnicate").build();
        let response = dispatch(&request, &mut session, &lock);
        assert_eq!(response.get_str("kind"), Some("unknown-op"));
    }
}
