//! Command-line entry point: generate the table and report coverage.
//!
//! With no arguments the reference table (all sixteen registers, `mov`,
//! x86-64) is written to `x64_mov_combinations.txt` in the working
//! directory.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use log::{warn, LevelFilter};

use encoding_table::{Generator, GeneratorConfig};

/// Generate the x86-64 instruction encoding table.
#[derive(Parser, Debug)]
#[command(name = "encoding-table", version, about)]
struct Cli {
    /// TOML configuration file; every key is optional.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the table here instead of the configured output.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Exit with status 2 if any shape had to be skipped.
    #[arg(long)]
    strict: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    pretty_env_logger::formatted_builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => GeneratorConfig::from_path(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => GeneratorConfig::default(),
    };
    if let Some(output) = cli.output {
        config.output = output;
    }

    let report = Generator::from_config(config)
        .context("invalid configuration")?
        .run()
        .context("failed to generate encoding table")?;

    if !report.is_complete() {
        warn!(
            "{} of {} shapes skipped",
            report.skipped.len(),
            report.attempted()
        );
    }
    println!(
        "Encodings for {} shapes have been saved to '{}'.",
        report.entries,
        report.output.display()
    );

    if cli.strict && !report.is_complete() {
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}
