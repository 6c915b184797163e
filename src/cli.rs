// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Two subcommands:
// - check:  read JSON lines (or plain URLs), probe every link, write one JSON
//           result per link
// - report: read the output of `check` and print failed links as a Markdown
//           table
//
// Everything here is plain data. Validation (header syntax, HTTP method,
// zero-sized batches) happens when the arguments are turned into a
// CheckerConfig in config.rs.
// =============================================================================

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{default_user_agent, default_workers};

// This struct represents our entire CLI application
#[derive(Parser, Debug)]
#[command(
    name = "linkprobe",
    version,
    about = "Batch link checker for JSON lines and plain URL lists",
    long_about = "linkprobe reads newline-delimited JSON records (or bare URLs), checks every \
                  link it finds with retries and redirect tracking, and writes one JSON result \
                  per link. Failed links are reported as data, not errors."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check every link found in the input
    ///
    /// Example: linkprobe check -w 16 -b links.jsonl > results.jsonl
    Check(CheckArgs),

    /// Summarise failed links from a results file as a Markdown table
    ///
    /// Example: linkprobe report --contains "no such host" results.jsonl
    Report(ReportArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Input file with one JSON object or URL per line ("-" or omitted = stdin)
    pub input: Option<PathBuf>,

    /// Write results here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Key under which to find the URLs to check
    #[arg(short = 'j', long = "url-key", default_value = "url")]
    pub url_key: String,

    /// Number of workers
    #[arg(short, long, default_value_t = default_workers())]
    pub workers: usize,

    /// Number of input lines per batch
    #[arg(long, default_value_t = 100)]
    pub size: usize,

    /// Skip invalid input instead of stopping
    #[arg(short, long)]
    pub best_effort: bool,

    /// HTTP header to send, "Key: Value" (repeatable)
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// User agent to send
    #[arg(long = "ua", default_value_t = default_user_agent())]
    pub user_agent: String,

    /// Additional header profile (available: basic)
    #[arg(long = "hp")]
    pub header_profile: Option<String>,

    /// Total timeout per request attempt, in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Maximum attempts per link (first try included)
    #[arg(long, default_value_t = 5)]
    pub retries: u32,

    /// Base delay for exponential backoff between attempts, in milliseconds
    #[arg(long = "backoff-ms", default_value_t = 1000)]
    pub backoff_ms: u64,

    /// Log every request, retry and redirect to stderr
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    /// Results file produced by `check` ("-" or omitted = stdin)
    pub input: Option<PathBuf>,

    /// Only list failures whose comment contains this text
    #[arg(long)]
    pub contains: Option<String>,
}
