//! xcc compiler driver
//!
//! Command-line entry point. `compile` runs the full pipeline from C
//! source to an assembly file; `tokens` and `ast` dump the intermediate
//! representations as JSON for debugging.

use clap::{Parser, Subcommand};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use xcc_common::{CompilerError, CompilerResult, ErrorReporter};
use xcc_frontend::Frontend;

#[derive(Parser)]
#[command(name = "xcc")]
#[command(about = "xcc C compiler for 32-bit x86")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a C source file to assembly
    Compile {
        /// Input C source file
        input: PathBuf,

        /// Output assembly file (defaults to the input with `.s`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Tokenize a C source file and dump the tokens as JSON
    Tokens {
        /// Input C source file
        input: PathBuf,
    },

    /// Parse a C source file and dump the syntax tree as JSON
    Ast {
        /// Input C source file
        input: PathBuf,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile { input, output } => compile(&input, output.as_deref()),
        Commands::Tokens { input } => dump_tokens(&input),
        Commands::Ast { input } => dump_ast(&input),
    };

    if let Err(e) = result {
        let mut reporter = ErrorReporter::new();
        reporter.error(e.to_string());
        reporter.print_diagnostics();
        eprintln!("{}", reporter.summary());
        std::process::exit(1);
    }
}

fn read_source(input: &Path) -> CompilerResult<(String, String)> {
    let filename = input.display().to_string();
    let source = fs::read_to_string(input)?;
    Ok((filename, source))
}

fn compile(input: &Path, output: Option<&Path>) -> CompilerResult<()> {
    let (filename, source) = read_source(input)?;

    let unit = Frontend::analyze_source(&filename, &source)?;
    let asm = xcc_backend::generate(&unit)?;

    let output = match output {
        Some(path) => path.to_path_buf(),
        None => input.with_extension("s"),
    };
    fs::write(&output, asm)?;
    info!("wrote {}", output.display());
    Ok(())
}

fn dump_tokens(input: &Path) -> CompilerResult<()> {
    let (filename, source) = read_source(input)?;
    let tokens = Frontend::tokenize_source(&filename, &source)?;
    let json = serde_json::to_string_pretty(&tokens).map_err(|e| CompilerError::IoError {
        message: e.to_string(),
    })?;
    println!("{}", json);
    Ok(())
}

fn dump_ast(input: &Path) -> CompilerResult<()> {
    let (filename, source) = read_source(input)?;
    let ast = Frontend::parse_source(&filename, &source)?;
    let json = serde_json::to_string_pretty(&ast).map_err(|e| CompilerError::IoError {
        message: e.to_string(),
    })?;
    println!("{}", json);
    Ok(())
}
