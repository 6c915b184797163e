// src/error.rs
// =============================================================================
// Errors that can stop a run.
//
// Only a handful of things are allowed to end the pipeline: bad configuration,
// malformed JSON input (unless best-effort mode is on), I/O on the input or
// output stream, and a worker task dying. Everything that goes wrong with a
// single URL is NOT an error here - it becomes a degraded result record
// instead (see checker/http.rs).
// =============================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckerError {
    /// A line that is neither a bare URL nor a JSON object (bytes that are
    /// not UTF-8 included).
    /// Fatal unless best-effort mode is enabled.
    #[error("malformed JSON input {line:?}: {source}")]
    MalformedInput {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("header must be in key:value format, not {0:?}")]
    InvalidHeader(String),

    #[error("unknown header profile {0:?}")]
    UnknownHeaderProfile(String),

    #[error("invalid HTTP method {0:?}")]
    InvalidMethod(String),

    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker task failed: {0}")]
    WorkerFailed(#[from] tokio::task::JoinError),

    /// A channel was closed while a sender still had data for it.
    #[error("{0} channel closed unexpectedly")]
    ChannelClosed(&'static str),
}

impl CheckerError {
    /// True for the one error class that aborts a run in strict mode.
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, CheckerError::MalformedInput { .. })
    }
}
