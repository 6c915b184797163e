// src/config.rs
// =============================================================================
// The one immutable configuration value for a run.
//
// It is built once from the command line (see cli.rs), wrapped in an Arc and
// handed to the batcher, every worker and every prober. Nothing in the crate
// reads flags from global state.
//
// Rust concepts:
// - Default trait: sensible starting values for the HTTP and retry settings
// - Result<T, E>: every piece of user input is validated up front, so a typo
//   in a header or method fails the run before any request is made
// =============================================================================

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::Method;

use crate::checker::RetryPolicy;
use crate::cli::CheckArgs;
use crate::error::CheckerError;

/// Named sets of extra request headers, selectable with `--hp`.
/// Names are lowercase so they can go through `HeaderName::from_static`.
const HEADER_PROFILES: &[(&str, &[(&str, &str)])] = &[(
    "basic",
    &[
        (
            "accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
        ("accept-language", "en-US,en;q=0.5"),
        ("accept-encoding", "gzip, deflate, br"),
        ("dnt", "1"),
    ],
)];

/// Default User-Agent sent with every request.
pub fn default_user_agent() -> String {
    format!("linkprobe/{}", env!("CARGO_PKG_VERSION"))
}

/// Default worker count: one per available CPU.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Knobs for the per-worker HTTP client.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Total time allowed for one request attempt (connect to last byte)
    pub request_timeout: Duration,
    /// Time allowed to establish a connection, TLS handshake included
    pub connect_timeout: Duration,
    pub tcp_keepalive: Duration,
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    /// Redirect hops followed before the client gives up
    pub max_redirects: usize,
    /// Probe self-signed and misconfigured endpoints instead of failing them
    pub accept_invalid_certs: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(30),
            tcp_keepalive: Duration::from_secs(30),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 100,
            max_redirects: 10,
            accept_invalid_certs: true,
        }
    }
}

/// Everything the pipeline needs to know about a run.
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    pub method: Method,
    /// Key in each JSON record holding the URL (or URLs) to check
    pub url_key: String,
    pub workers: usize,
    pub batch_size: usize,
    /// Skip malformed JSON lines instead of aborting the run
    pub best_effort: bool,
    pub verbose: bool,
    /// Attached to every request, read-only once built
    pub headers: HeaderMap,
    pub http: HttpSettings,
    pub retry: RetryPolicy,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&default_user_agent()) {
            headers.insert(USER_AGENT, value);
        }
        Self {
            method: Method::GET,
            url_key: "url".to_string(),
            workers: default_workers(),
            batch_size: 100,
            best_effort: false,
            verbose: false,
            headers,
            http: HttpSettings::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl CheckerConfig {
    /// Builds and validates the configuration from `check` arguments.
    pub fn from_args(args: &CheckArgs) -> Result<Self, CheckerError> {
        let method = Method::from_bytes(args.method.to_uppercase().as_bytes())
            .map_err(|_| CheckerError::InvalidMethod(args.method.clone()))?;

        if args.workers == 0 {
            return Err(CheckerError::InvalidSetting(
                "worker count must be at least 1".to_string(),
            ));
        }
        if args.size == 0 {
            return Err(CheckerError::InvalidSetting(
                "batch size must be at least 1".to_string(),
            ));
        }
        if args.retries == 0 {
            return Err(CheckerError::InvalidSetting(
                "retry ceiling must be at least 1 attempt".to_string(),
            ));
        }

        let headers = build_headers(
            &args.headers,
            args.header_profile.as_deref(),
            &args.user_agent,
        )?;

        let http = HttpSettings {
            request_timeout: Duration::from_secs(args.timeout),
            ..HttpSettings::default()
        };
        let retry = RetryPolicy {
            max_attempts: args.retries,
            base_delay: Duration::from_millis(args.backoff_ms),
            ..RetryPolicy::default()
        };

        Ok(Self {
            method,
            url_key: args.url_key.clone(),
            workers: args.workers,
            batch_size: args.size,
            best_effort: args.best_effort,
            verbose: args.verbose,
            headers,
            http,
            retry,
        })
    }
}

/// Assembles the shared header set: `-H` flags, then the profile, then the
/// User-Agent. Repeating the exact same key and value is collapsed into one.
pub fn build_headers(
    flags: &[String],
    profile: Option<&str>,
    user_agent: &str,
) -> Result<HeaderMap, CheckerError> {
    let mut headers = HeaderMap::new();

    for flag in flags {
        let (key, value) = parse_header_flag(flag)?;
        append_unique(&mut headers, key, value);
    }

    if let Some(name) = profile.filter(|name| !name.is_empty()) {
        let entries = HEADER_PROFILES
            .iter()
            .find(|(profile_name, _)| *profile_name == name)
            .map(|(_, entries)| *entries)
            .ok_or_else(|| CheckerError::UnknownHeaderProfile(name.to_string()))?;
        for &(key, value) in entries {
            append_unique(
                &mut headers,
                HeaderName::from_static(key),
                HeaderValue::from_static(value),
            );
        }
    }

    let ua = HeaderValue::from_str(user_agent)
        .map_err(|_| CheckerError::InvalidHeader(format!("User-Agent: {user_agent}")))?;
    append_unique(&mut headers, USER_AGENT, ua);

    Ok(headers)
}

// Splits "Key: Value" on the first colon and trims both halves.
fn parse_header_flag(flag: &str) -> Result<(HeaderName, HeaderValue), CheckerError> {
    let (key, value) = flag
        .split_once(':')
        .ok_or_else(|| CheckerError::InvalidHeader(flag.to_string()))?;
    let name = HeaderName::from_bytes(key.trim().as_bytes())
        .map_err(|_| CheckerError::InvalidHeader(flag.to_string()))?;
    let value = HeaderValue::from_str(value.trim())
        .map_err(|_| CheckerError::InvalidHeader(flag.to_string()))?;
    Ok((name, value))
}

fn append_unique(headers: &mut HeaderMap, name: HeaderName, value: HeaderValue) {
    if headers.get_all(&name).iter().any(|existing| *existing == value) {
        return;
    }
    headers.append(name, value);
}
