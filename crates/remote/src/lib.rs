//! Remote compile server and client for constrained targets (§4.7).
//!
//! A constrained target (mobile device, WASM) cannot run the full
//! analyzer/codegen/toolchain locally. [`server::RemoteServer`] performs
//! that work on a host process and ships compiled object bytes back over a
//! newline-delimited JSON protocol; [`client::RemoteCompileClient`] is the
//! target-side counterpart.

pub mod client;
pub mod error;
pub mod protocol;
pub mod server;

pub use client::RemoteCompileClient;
pub use error::RemoteError;
pub use protocol::{CompiledModule, Request, Response};
pub use server::RemoteServer;
