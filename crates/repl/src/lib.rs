//! An nREPL-compatible evaluation server for the dialect (§4.8): bencode
//! framing over TCP, one session per connection, with `eval`, `complete`,
//! `info`/`eldoc`, and `test` operations backed by the same analyzer/
//! codegen/JIT pipeline `corvid-compiler` and `corvid-remote` use directly.

pub mod bencode;
pub mod ops;
pub mod server;
pub mod session;

pub use server::NreplServer;
pub use session::Session;
