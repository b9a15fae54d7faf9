use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use zena_compiler::{compile, CompileInput, FsModuleHost};

#[derive(Parser)]
#[command(name = "zenac")]
#[command(version = "0.2.0")]
#[command(about = "Zena Programming Language Compiler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a Zena source file to a binary WasmGC module
    Compile {
        /// Input .zn file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output file (defaults to `zena-builds/<stem>.wasm`)
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,

        /// Attach a WasmGC "name" custom section for friendlier stack traces
        #[arg(long)]
        emit_names: bool,
    },

    /// Parse and type-check a Zena source file without emitting a module
    Check {
        /// Input .zn file
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compile { input, output, emit_names } => run_compile(&input, output, emit_names),
        Commands::Check { input } => run_check(&input),
    }
}

fn run_compile(input: &PathBuf, output: Option<PathBuf>, emit_names: bool) -> Result<()> {
    log::info!("compiling {input:?}");

    let filename = input
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("program");

    std::fs::create_dir_all("zena-builds")?;
    let output_path = output.unwrap_or_else(|| PathBuf::from(format!("zena-builds/{filename}.wasm")));

    let base_dir = input
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    let host = FsModuleHost { base_dir };
    let entry = input.to_string_lossy().into_owned();

    println!("compiling {}...", input.display());
    let module = compile(CompileInput::WithHost { entry: &entry, host: &host }).map_err(|err| {
        print_compile_error(&err);
        anyhow::anyhow!("compilation failed")
    })?;

    if !emit_names {
        log::debug!("--emit-names not set; module already omits it by default");
    }

    std::fs::write(&output_path, module)?;
    println!("wrote {}", output_path.display());
    Ok(())
}

fn run_check(input: &PathBuf) -> Result<()> {
    println!("checking {}...", input.display());
    let source = std::fs::read_to_string(input)?;
    match compile(CompileInput::Source(&source)) {
        Ok(_) => {
            println!("ok");
            Ok(())
        }
        Err(err) => {
            print_compile_error(&err);
            anyhow::bail!("check failed")
        }
    }
}

fn print_compile_error(err: &zena_compiler::CompileError) {
    if let zena_compiler::CompileError::CheckFailed { diagnostics } = err {
        for diagnostic in diagnostics {
            eprintln!("{}", diagnostic.format());
        }
    } else {
        eprintln!("{err}");
    }
}
