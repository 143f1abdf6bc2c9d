//! Remote compile server CLI: binds a host process to serve `compile`,
//! `require`, `eval`, and `native-source` requests for constrained targets.

use clap::Parser;
use corvid_compiler::{FfiManifest, NativeDeclRegistry};
use corvid_remote::RemoteServer;
use corvid_runtime::RuntimeContext;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "corvid-remoted")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Remote compile server for constrained Corvid targets", long_about = None)]
struct Cli {
    /// Address to bind, e.g. 0.0.0.0:7676
    #[arg(long, default_value = "127.0.0.1:7676")]
    bind: String,

    /// Directory the JIT uses for its on-disk object-file cache
    #[arg(long, default_value = "target/corvid-remote-cache")]
    cache_dir: PathBuf,

    /// Module search paths for `require` requests that omit `source`
    #[arg(long = "module-path", value_name = "DIR")]
    module_paths: Vec<PathBuf>,

    /// External FFI manifest file(s) to load
    #[arg(long = "ffi-manifest", value_name = "PATH")]
    ffi_manifests: Vec<PathBuf>,

    /// ODR-duplication defense macro defined in every cross-compiled unit
    #[arg(long)]
    marker_macro: Option<String>,
}

#[tokio::main]
async fn main() {
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
    let mut server = RemoteServer::new(ctx, native);
    if let Some(marker) = cli.marker_macro {
        server = server.with_marker_macro(marker);
    }

    tracing::info!(addr = %cli.bind, "remote compile server listening");
    if let Err(e) = server.serve(cli.bind).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
