//! `vm <image_path> [--jit]` — runs a bytecode image through the interpreter
//! or the template JIT (SPEC_FULL.md §4.5).
//!
//! Owns the process boundary: typed `Trap`/`JitError` values become the exact
//! stderr substrings the harness greps for, and the process exit code; only
//! genuinely unexpected failures (e.g. the image file not existing) go
//! through `anyhow`.

use std::io::{stdin, stdout, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use stackvm::interpreter::Interpreter;
use stackvm::jit::Jit;

#[derive(Parser, Debug)]
#[command(name = "vm", about = "Run a stackvm bytecode image")]
struct Cli {
    /// Path to an assembled bytecode image.
    image_path: PathBuf,

    /// Compile and run the image with the template JIT instead of interpreting it.
    #[arg(long)]
    jit: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

fn main() -> anyhow::Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    let image = std::fs::read(&cli.image_path)
        .with_context(|| format!("reading bytecode image {}", cli.image_path.display()))?;

    if cli.jit {
        return Ok(run_jit(&image));
    }
    Ok(run_interpreter(&image))
}

fn run_jit(image: &[u8]) -> ExitCode {
    let jit = match Jit::compile(image) {
        Ok(jit) => jit,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    match jit.run() {
        Ok(result) => {
            println!("JIT Result: {result}");
            ExitCode::SUCCESS
        }
        Err(trap) => {
            eprintln!("{trap}");
            ExitCode::FAILURE
        }
    }
}

fn run_interpreter(image: &[u8]) -> ExitCode {
    let mut interp = Interpreter::new();
    let mut stdin = BufReader::new(stdin());
    let mut stdout = stdout();

    match interp.execute(image, &mut stdin, &mut stdout) {
        Ok(_) => {
            eprintln!("{}", interp.gc_stats());
            ExitCode::SUCCESS
        }
        Err(trap) => {
            eprintln!("{trap}");
            ExitCode::FAILURE
        }
    }
}
