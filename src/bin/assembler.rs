//! `assembler <input.asm> <output.bin>` — assembles mnemonic source into a
//! raw bytecode image (SPEC_FULL.md §4.5).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "assembler", about = "Assemble stackvm mnemonic source into a bytecode image")]
struct Cli {
    /// Path to the assembly source file.
    input: PathBuf,

    /// Path the assembled bytecode image is written to.
    output: PathBuf,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

fn main() -> anyhow::Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    let source = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("reading assembly source {}", cli.input.display()))?;

    let image = match stackvm::assembler::assemble(&source) {
        Ok(image) => image,
        Err(err) => {
            eprintln!("{err}");
            return Ok(ExitCode::FAILURE);
        }
    };

    std::fs::write(&cli.output, &image)
        .with_context(|| format!("writing bytecode image {}", cli.output.display()))?;

    Ok(ExitCode::SUCCESS)
}
