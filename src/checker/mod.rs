// src/checker/mod.rs
// =============================================================================
// This module contains all link checking logic.
//
// Submodules:
// - extract:  turns an input line into a record and the record into links
// - http:     the per-worker Prober that sends requests and builds results
// - redirect: records redirect chains as the client follows them
// - retry:    exponential backoff and the retryable/terminal split
// - result:   the LinkResult output record
// =============================================================================

mod extract;
mod http;
mod redirect;
mod result;
mod retry;

pub use extract::parse_line;
pub use http::Prober;
pub use result::LinkResult;
pub use retry::RetryPolicy;
