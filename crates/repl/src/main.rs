//! `corvid-nrepl` — binds an nREPL-compatible evaluation server for
//! interactive tooling (editors, test runners) to talk to a running
//! dialect process.

use clap::Parser;
use corvid_compiler::{FfiManifest, NativeDeclRegistry};
use corvid_repl::NreplServer;
use corvid_runtime::RuntimeContext;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "corvid-nrepl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "nREPL-compatible evaluation server for the Corvid dialect", long_about = None)]
struct Cli {
    /// Address to bind, e.g. 127.0.0.1:7888
    #[arg(long, default_value = "127.0.0.1:7888")]
    bind: String,

    /// Directory the JIT uses for its on-disk object-file cache
    #[arg(long, default_value = "target/corvid-nrepl-cache")]
    cache_dir: PathBuf,

    /// Module search paths for `require`d namespaces
    #[arg(long = "module-path", value_name = "DIR")]
    module_paths: Vec<PathBuf>,

    /// External FFI manifest file(s) to load
    #[arg(long = "ffi-manifest", value_name = "PATH")]
    ffi_manifests: Vec<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let mut native = NativeDeclRegistry::new();
    for path in &cli.ffi_manifests {
        let content = std::fs::read_to_string(path).unwrap_or_else(|e| {
            eprintln!("Error reading FFI manifest {}: {e}", path.display());
            process::exit(1);
        });
        let manifest = FfiManifest::parse(&content).unwrap_or_else(|e| {
            eprintln!("Error parsing FFI manifest {}: {e}", path.display());
            process::exit(1);
        });
        native.load_manifest(&manifest).unwrap_or_else(|e| {
            eprintln!("Error loading FFI manifest {}: {e}", path.display());
            process::exit(1);
        });
    }

    let ctx = RuntimeContext::new(cli.module_paths, cli.cache_dir);
    corvid_compiler::prelude::install(&ctx);
    let server = NreplServer::new(ctx, native);

    tracing::info!(addr = %cli.bind, "nrepl server listening");
    if let Err(e) = server.serve(&cli.bind) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
