// src/logging.rs
// =============================================================================
// Diagnostics go to stderr through `tracing`; stdout is reserved for results.
//
// Default level is `warn` (failed requests, skipped records). `--verbose`
// turns on `debug` for this crate, which logs every request, retry and
// redirect. RUST_LOG, when set, wins over both.
// =============================================================================

use tracing_subscriber::EnvFilter;

pub fn init(verbose: bool) {
    let default_directive = if verbose { "linkprobe=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    // A second init (e.g. in tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
