//! Corvid compiler CLI.
//!
//! Command-line front end for reading, analyzing, and JIT-compiling
//! dialect source files.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{Shell, generate};
use corvid_compiler::{CodegenTarget, FfiManifest, NativeDeclRegistry};
use corvid_runtime::RuntimeContext;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process;

#[derive(ClapParser)]
#[command(name = "corvidc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Corvid compiler - JIT-compile dialect source to native code", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and immediately load a source file, without invoking its entry symbol
    Build {
        /// Input source file
        input: PathBuf,

        /// Directory the JIT uses for its on-disk object-file cache
        #[arg(long, default_value = "target/corvid-cache")]
        cache_dir: PathBuf,

        /// External FFI manifest file(s) to load
        #[arg(long = "ffi-manifest", value_name = "PATH")]
        ffi_manifests: Vec<PathBuf>,
    },

    /// Print the generated C++ source for a file without compiling it
    Source {
        /// Input source file
        input: PathBuf,

        /// Codegen target
        #[arg(long, value_enum, default_value = "eval")]
        target: TargetArg,

        /// External FFI manifest file(s) to load
        #[arg(long = "ffi-manifest", value_name = "PATH")]
        ffi_manifests: Vec<PathBuf>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Clone, clap::ValueEnum)]
enum TargetArg {
    Eval,
    Module,
    WasmAot,
    Patch,
}

impl From<TargetArg> for CodegenTarget {
    fn from(arg: TargetArg) -> Self {
        match arg {
            TargetArg::Eval => CodegenTarget::Eval,
            TargetArg::Module => CodegenTarget::Module,
            TargetArg::WasmAot => CodegenTarget::WasmAot,
            TargetArg::Patch => CodegenTarget::Patch,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, cache_dir, ffi_manifests } => run_build(&input, &cache_dir, &ffi_manifests),
        Commands::Source { input, target, ffi_manifests } => run_source(&input, target.into(), &ffi_manifests),
        Commands::Completions { shell } => run_completions(shell),
    }
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "corvidc", &mut io::stdout());
}

fn load_native_registry(manifests: &[PathBuf]) -> NativeDeclRegistry {
    let mut registry = NativeDeclRegistry::new();
    for path in manifests {
        let content = fs::read_to_string(path).unwrap_or_else(|e| {
            eprintln!("Error reading FFI manifest {}: {e}", path.display());
            process::exit(1);
        });
        let manifest = FfiManifest::parse(&content).unwrap_or_else(|e| {
            eprintln!("Error parsing FFI manifest {}: {e}", path.display());
            process::exit(1);
        });
        registry.load_manifest(&manifest).unwrap_or_else(|e| {
            eprintln!("Error loading FFI manifest {}: {e}", path.display());
            process::exit(1);
        });
    }
    registry
}

fn unit_name_for(input: &std::path::Path) -> String {
    input.file_stem().and_then(|s| s.to_str()).unwrap_or("unit").replace(['-', '.'], "_")
}

fn run_build(input: &std::path::Path, cache_dir: &std::path::Path, ffi_manifests: &[PathBuf]) {
    let source = fs::read_to_string(input).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {e}", input.display());
        process::exit(1);
    });

    let ctx = RuntimeContext::new(vec![], cache_dir.to_path_buf());
    corvid_compiler::prelude::install(&ctx);
    let native = load_native_registry(ffi_manifests);
    let unit_name = unit_name_for(input);

    match corvid_compiler::eval_source(&ctx, &native, &source, input, &[], &unit_name) {
        Ok(unit) => {
            println!("Compiled {} -> {}", input.display(), unit.object_path.display());
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn run_source(input: &std::path::Path, target: CodegenTarget, ffi_manifests: &[PathBuf]) {
    let source = fs::read_to_string(input).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {e}", input.display());
        process::exit(1);
    });

    let ctx = RuntimeContext::new(vec![], std::env::temp_dir());
    corvid_compiler::prelude::install(&ctx);
    let native = load_native_registry(ffi_manifests);
    let unit_name = unit_name_for(input);

    match corvid_compiler::generate_source(&ctx, &native, &source, input, &[], target, &unit_name) {
        Ok(cpp) => print!("{cpp}"),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
