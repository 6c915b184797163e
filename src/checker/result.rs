// src/checker/result.rs
// =============================================================================
// The output record: one LinkResult per link that was attempted.
//
// Successful and failed checks share one shape. A failed check has no
// `status` and carries the error text in `comment`, so consumers can filter
// on the absence of `status`. Empty fields are left out of the JSON.
//
// Example (success):
//   {"link":"http://example.com","status":200,"t":"2026-01-01T00:00:00Z",
//    "elapsed":81234567,"comment":"GET","payload":{"url":"http://example.com"}}
// =============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::redirect::RedirectEntry;

/// Header name (canonical case) to all of its values.
pub type HeaderTable = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkResult {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub link: String,

    /// Request headers that were sent (successful checks only)
    #[serde(rename = "h", default, skip_serializing_if = "Option::is_none")]
    pub request_headers: Option<HeaderTable>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,

    /// Serialized as integer nanoseconds
    #[serde(default, with = "nanos", skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<Duration>,

    /// Method name on success, error text on failure
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,

    /// The full input record this link came from
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,

    /// Response headers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HeaderTable>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub redirects: Vec<RedirectEntry>,
}

impl LinkResult {
    /// A result for a link that never produced a response.
    pub fn failed(
        link: &str,
        payload: &Value,
        comment: impl Into<String>,
        elapsed: Option<Duration>,
    ) -> Self {
        Self {
            link: link.to_string(),
            request_headers: None,
            status: None,
            timestamp: Utc::now(),
            elapsed,
            comment: comment.into(),
            payload: payload.clone(),
            headers: None,
            redirects: Vec::new(),
        }
    }

    /// Checks that produced a response, whatever its status code.
    pub fn is_ok(&self) -> bool {
        self.status.is_some()
    }
}

/// Converts a header map into a table keyed by canonical header names.
pub fn header_table(headers: &HeaderMap) -> HeaderTable {
    let mut table = HeaderTable::new();
    for (name, value) in headers {
        table
            .entry(canonical_header_key(name.as_str()))
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    table
}

/// "content-type" -> "Content-Type", "x-request-id" -> "X-Request-Id".
pub fn canonical_header_key(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

mod nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(duration) => {
                let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
                serializer.serialize_u64(nanos)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_nanos))
    }
}
