// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging (stderr only, stdout carries results)
// 3. Dispatch to the appropriate subcommand handler
// 4. Exit with proper code (0 = success, 2 = fatal error)
//
// A failed link is never a fatal error: it is written out as a result like
// any other. Only bad configuration, malformed input in strict mode, and I/O
// problems end the run early.
// =============================================================================

mod checker; // src/checker/ - extraction, probing, retries, redirects
mod cli; // src/cli.rs - command-line parsing
mod config; // src/config.rs - the immutable run configuration
mod error; // src/error.rs - errors that stop a run
mod logging; // src/logging.rs - tracing subscriber setup
mod pipeline; // src/pipeline/ - batcher, worker pool, writer
mod report; // src/report.rs - Markdown summary of failed links

#[cfg(test)]
mod testing;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncReadExt, AsyncWrite, BufReader, BufWriter};

use cli::{CheckArgs, Cli, Commands, ReportArgs};
use config::CheckerConfig;

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check(args) => {
            logging::init(args.verbose);
            handle_check(args).await
        }
        Commands::Report(args) => {
            logging::init(false);
            handle_report(args).await
        }
    }
}

// Handles the 'check' subcommand
async fn handle_check(args: CheckArgs) -> Result<i32> {
    let config = CheckerConfig::from_args(&args).context("invalid configuration")?;
    let verbose = config.verbose;

    let input = open_input(args.input.as_deref()).await?;
    let output = open_output(args.output.as_deref()).await?;

    let (summary, _sink) = match pipeline::run(Arc::new(config), input, output).await {
        Ok(done) => done,
        Err(err) if err.is_malformed_input() => {
            return Err(anyhow::Error::new(err)
                .context("stopped on invalid input (use --best-effort to skip such lines)"));
        }
        Err(err) => return Err(err.into()),
    };
    if verbose {
        eprintln!(
            "checked {} link(s) from {} line(s), skipped {} malformed line(s)",
            summary.results, summary.lines, summary.skipped
        );
    }
    Ok(0)
}

// Handles the 'report' subcommand
async fn handle_report(args: ReportArgs) -> Result<i32> {
    let mut input = open_input(args.input.as_deref()).await?;
    let mut text = String::new();
    input
        .read_to_string(&mut text)
        .await
        .context("failed to read results")?;

    let report = report::render_report(&text, args.contains.as_deref());
    println!("{}", report.table);
    println!("📊 {} of {} result(s) listed", report.listed, report.total);
    Ok(0)
}

// "-" or no path means stdin.
async fn open_input(path: Option<&Path>) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    match path.filter(|p| *p != Path::new("-")) {
        Some(path) => {
            let file = File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
    }
}

async fn open_output(path: Option<&Path>) -> Result<Box<dyn AsyncWrite + Unpin + Send>> {
    match path.filter(|p| *p != Path::new("-")) {
        Some(path) => {
            let file = File::create(path)
                .await
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(tokio::io::stdout()))),
    }
}
