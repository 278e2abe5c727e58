//! Watermark removal CLI tool
//!
//! Removes `/Artifact` marked-content blocks (watermarks, headers, footers)
//! from a PDF and strips identifying metadata from the result.

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pdf_unwatermark::{detect_processable, remove_watermarks};

/// Remove watermarks from a PDF by stripping artifact content blocks
#[derive(Parser)]
#[command(name = "pdf-unwatermark")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Clean a PDF
    pdf-unwatermark input.pdf cleaned.pdf

    # Overwrite an existing output file
    pdf-unwatermark -f input.pdf cleaned.pdf

    # Check whether a PDF can be processed, without writing anything
    pdf-unwatermark --dry-run input.pdf cleaned.pdf

EXIT CODES:
    0  success
    1  output exists without --force, or processing failed
    2  --dry-run and the document is not processable")]
struct Cli {
    /// Input PDF path
    input: PathBuf,

    /// Output PDF path
    output: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Overwrite the output file if it exists
    #[arg(short, long)]
    force: bool,

    /// Only check whether the input can be processed
    #[arg(long)]
    dry_run: bool,
}

fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    if cli.output.exists() && !cli.force {
        eprintln!(
            "Error: output file already exists: {} (use -f/--force to overwrite)",
            cli.output.display()
        );
        process::exit(1);
    }

    if cli.dry_run {
        let result = detect_processable(&cli.input);
        if !result.processable {
            eprintln!(
                "Not processable: {}",
                result.reason.unwrap_or_else(|| "unknown".to_string())
            );
            process::exit(2);
        }
        println!("Processable: yes");
        return;
    }

    if let Err(e) = run(&cli) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let stats = remove_watermarks(&cli.input, &cli.output)
        .with_context(|| format!("failed to process {}", cli.input.display()))?;

    println!("Done: processed {} pages", stats.pages_processed);
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
