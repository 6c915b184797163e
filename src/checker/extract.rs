// src/checker/extract.rs
// =============================================================================
// Turns one input line into a record and the record into links to check.
//
// Input lines come in two flavours:
// - JSON objects:  {"url": "https://example.com", "id": 42}
// - bare URLs:     example.com
//
// A bare URL is wrapped into a record under the configured key, with
// "http://" added when it has no scheme. A line that is neither an object
// nor a single whitespace-free token is malformed input.
//
// The URL field itself can be a string, an array of strings, or an array of
// anything (each element is turned into text). Any other shape is logged and
// skipped.
//
// Only lines that fail to parse are reported as errors; the worker decides whether
// that ends the run (strict mode) or just skips the line (best-effort mode).
// =============================================================================

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::CheckerError;

/// One parsed input line: an open-ended JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct InputRecord {
    pub payload: Map<String, Value>,
}

/// The URL field of a record, sorted by the shapes we know how to read.
#[derive(Debug, Clone, PartialEq)]
pub enum UrlField<'a> {
    Single(&'a str),
    Strings(Vec<&'a str>),
    Mixed(&'a [Value]),
    Unrecognized(&'static str),
}

impl<'a> UrlField<'a> {
    pub fn classify(value: &'a Value) -> Self {
        match value {
            Value::String(s) => UrlField::Single(s),
            Value::Array(items) => {
                let strings: Option<Vec<&str>> = items.iter().map(Value::as_str).collect();
                match strings {
                    Some(strings) => UrlField::Strings(strings),
                    None => UrlField::Mixed(items),
                }
            }
            Value::Null => UrlField::Unrecognized("null"),
            Value::Bool(_) => UrlField::Unrecognized("boolean"),
            Value::Number(_) => UrlField::Unrecognized("number"),
            Value::Object(_) => UrlField::Unrecognized("object"),
        }
    }

    /// Links in field order, or None for shapes we cannot read.
    pub fn links(&self) -> Option<Vec<String>> {
        match self {
            UrlField::Single(s) => Some(vec![s.to_string()]),
            UrlField::Strings(items) => Some(items.iter().map(|s| s.to_string()).collect()),
            UrlField::Mixed(items) => Some(items.iter().map(stringify).collect()),
            UrlField::Unrecognized(_) => None,
        }
    }
}

impl InputRecord {
    /// Extracts the links to check, in field order.
    ///
    /// A missing key yields no links without any noise; an unreadable shape
    /// yields no links and a warning.
    pub fn link_targets(&self, url_key: &str) -> Vec<String> {
        let Some(value) = self.payload.get(url_key) else {
            return Vec::new();
        };
        let field = UrlField::classify(value);
        match field.links() {
            Some(links) => links,
            None => {
                if let UrlField::Unrecognized(kind) = field {
                    warn!(key = url_key, kind, "ignoring record with unexpected URL field shape");
                }
                Vec::new()
            }
        }
    }

    pub fn payload_value(&self) -> Value {
        Value::Object(self.payload.clone())
    }
}

/// Parses one raw input line.
///
/// Returns Ok(None) for blank lines and Err only for lines that are not
/// valid JSON, bytes that are not UTF-8 included.
pub fn parse_line(raw: &[u8], url_key: &str) -> Result<Option<InputRecord>, CheckerError> {
    if let Ok(text) = std::str::from_utf8(raw) {
        let line = text.trim();
        if line.is_empty() {
            return Ok(None);
        }
        if is_bare_url(line) {
            let mut payload = Map::new();
            payload.insert(url_key.to_string(), Value::String(prepend_scheme(line)));
            return Ok(Some(InputRecord { payload }));
        }
    }

    match serde_json::from_slice::<Map<String, Value>>(raw) {
        Ok(payload) => Ok(Some(InputRecord { payload })),
        Err(source) => Err(CheckerError::MalformedInput {
            line: String::from_utf8_lossy(raw).trim().to_string(),
            source,
        }),
    }
}

// Anything that is not an object and has no whitespace is taken as a URL.
// Free text falls through to the JSON parser and is reported as malformed.
fn is_bare_url(line: &str) -> bool {
    !line.starts_with('{') && !line.chars().any(char::is_whitespace)
}

/// Adds "http://" to URLs that carry no scheme.
pub fn prepend_scheme(url: &str) -> String {
    if url.contains("://") {
        url.to_string()
    } else {
        format!("http://{url}")
    }
}

// Strings stay as they are, everything else becomes its JSON text.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(line: &str, url_key: &str) -> Result<Option<InputRecord>, CheckerError> {
        parse_line(line.as_bytes(), url_key)
    }

    fn record(line: &str) -> InputRecord {
        parse(line, "url").unwrap().unwrap()
    }

    #[test]
    fn test_scalar_url_gives_one_link() {
        let rec = record(r#"{"url": "http://example.com", "id": 1}"#);
        assert_eq!(rec.link_targets("url"), vec!["http://example.com"]);
        assert_eq!(rec.payload_value(), json!({"url": "http://example.com", "id": 1}));
    }

    #[test]
    fn test_string_array_gives_one_link_per_element() {
        let rec = record(r#"{"url": ["http://a.test", "http://b.test"]}"#);
        assert_eq!(rec.link_targets("url"), vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn test_mixed_array_is_stringified() {
        let rec = record(r#"{"url": ["http://a.test", 42, true, null]}"#);
        assert_eq!(
            rec.link_targets("url"),
            vec!["http://a.test", "42", "true", "null"]
        );
    }

    #[test]
    fn test_unexpected_shapes_are_skipped() {
        for line in [
            r#"{"url": 12}"#,
            r#"{"url": {"href": "http://a.test"}}"#,
            r#"{"url": false}"#,
            r#"{"url": null}"#,
        ] {
            assert!(record(line).link_targets("url").is_empty(), "{line}");
        }
    }

    #[test]
    fn test_missing_key_gives_no_links() {
        let rec = record(r#"{"href": "http://a.test"}"#);
        assert!(rec.link_targets("url").is_empty());
        assert_eq!(rec.link_targets("href"), vec!["http://a.test"]);
    }

    #[test]
    fn test_bare_url_is_wrapped_and_gets_a_scheme() {
        let rec = parse("  example.com \n", "link").unwrap().unwrap();
        assert_eq!(rec.link_targets("link"), vec!["http://example.com"]);

        let rec = parse("https://example.com/x", "url").unwrap().unwrap();
        assert_eq!(rec.link_targets("url"), vec!["https://example.com/x"]);
    }

    #[test]
    fn test_blank_line_is_not_a_record() {
        assert!(parse("   ", "url").unwrap().is_none());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let err = parse(r#"{"url": "#, "url").unwrap_err();
        assert!(err.is_malformed_input());
    }

    #[test]
    fn test_free_text_is_malformed_not_a_url() {
        let err = parse("not json at all", "url").unwrap_err();
        assert!(err.is_malformed_input());
    }

    #[test]
    fn test_invalid_utf8_is_malformed_input() {
        let err = parse_line(b"\xff\xfe bad line", "url").unwrap_err();
        assert!(err.is_malformed_input());

        let err = parse_line(b"{\"url\": \"http://a.test/\xff\"}", "url").unwrap_err();
        assert!(err.is_malformed_input());
    }

    #[test]
    fn test_crlf_line_endings_are_tolerated() {
        let rec = record("{\"url\": \"http://a.test\"}\r");
        assert_eq!(rec.link_targets("url"), vec!["http://a.test"]);
        assert!(parse("example.com\r", "url").unwrap().is_some());
    }

    #[test]
    fn test_extraction_is_repeatable() {
        let rec = record(r#"{"url": ["http://a.test", 1, "http://b.test"]}"#);
        assert_eq!(rec.link_targets("url"), rec.link_targets("url"));
    }

    #[test]
    fn test_classify_reports_shape() {
        let value = json!(["a", "b"]);
        assert_eq!(UrlField::classify(&value), UrlField::Strings(vec!["a", "b"]));
        let value = json!(3.5);
        assert_eq!(UrlField::classify(&value), UrlField::Unrecognized("number"));
    }
}
