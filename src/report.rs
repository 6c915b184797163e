// src/report.rs
// =============================================================================
// Turns a results file back into something a human can read.
//
// Only failed checks (results without a status code) make it into the table,
// optionally narrowed down to those whose comment mentions some text, for
// example "dns error" to list hosts that no longer exist.
// =============================================================================

use chrono::SecondsFormat;
use tracing::warn;

use crate::checker::LinkResult;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Report {
    pub table: String,
    pub total: usize,
    pub listed: usize,
}

/// Builds a Markdown table from newline-delimited result records.
pub fn render_report(results: &str, contains: Option<&str>) -> Report {
    let mut report = Report {
        table: String::from("| Link | Comment | Elapsed (s) | Timestamp |\n| --- | --- | --- | --- |\n"),
        ..Report::default()
    };

    for (number, line) in results.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let result: LinkResult = match serde_json::from_str(line) {
            Ok(result) => result,
            Err(err) => {
                warn!(line = number + 1, error = %err, "failed to parse result line");
                continue;
            }
        };
        report.total += 1;

        if result.is_ok() {
            continue;
        }
        if let Some(needle) = contains {
            if !result.comment.contains(needle) {
                continue;
            }
        }

        let elapsed = result
            .elapsed
            .map(|d| format!("{:.2}", d.as_secs_f64()))
            .unwrap_or_else(|| "-".to_string());
        report.table.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            escape_cell(&result.link),
            escape_cell(&result.comment),
            elapsed,
            result.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        ));
        report.listed += 1;
    }

    report
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
