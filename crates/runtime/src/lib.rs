//! Runtime context, module loader, and JIT processor for the core
//! compilation/execution pipeline (§4.5 "JIT processor", §4.6 "Runtime
//! context").
//!
//! # Modules
//!
//! - `error`: `JitError`/`RuntimeError` taxonomy
//! - `jit`: shells out to a C++ toolchain, loads the result with `libloading`,
//!   and caches compiled units in memory and on disk
//! - `module_loader`: dotted-name → path resolution and `source`/`latest`
//!   origin selection
//! - `context`: the process-wide `RuntimeContext` tying namespaces, the
//!   module loader, the JIT processor, and the incremental def cache together
//! - `abi`: the `extern "C" corvid_rt_*` trampolines generated code calls into
//! - `support`: the C++ header exposing those trampolines as `::corvid::runtime::*`

pub mod abi;
pub mod context;
pub mod error;
pub mod jit;
pub mod module_loader;
pub mod support;

pub use context::{Allocator, RuntimeContext};
pub use error::{JitError, RuntimeError, RuntimeResult};
pub use jit::{CompiledUnit, Jit};
pub use module_loader::{LoadOrigin, ModuleLoader, ResolvedModule, dotted_to_path};
