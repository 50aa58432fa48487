//! Extracts the failing position from a Python traceback.
//!
//! Snippets are executed from a string, so their frames show up as
//! `File "<string>", line N` rather than a real path. This module pulls the
//! 1-based line number out of the trace, grabs the offending line plus a
//! small context window from the original source, and classifies the error
//! from the final `SomethingError: ...` line.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static STRING_FRAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"File "(?:<string>|<module>|__string__)", line (\d+)"#).unwrap()
});

static ANY_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"line (\d+)").unwrap());

static ERROR_TYPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)(\w+Error:.*?)$").unwrap());

/// Where a snippet failed, with enough source context to quote back to the
/// caller. All fields degrade to placeholders rather than being absent.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorLocation {
    pub line_number: Option<usize>,
    pub error_line: String,
    pub context: String,
    pub error_type: String,
}

/// Locate the failing line of `source` from `trace`. Never fails: a trace
/// with no usable line reference yields placeholder fields.
pub fn locate(source: &str, trace: &str) -> ErrorLocation {
    let lines: Vec<&str> = source.split('\n').collect();

    let line_number = match STRING_FRAME_RE.captures(trace) {
        Some(caps) => caps[1].parse::<usize>().ok(),
        // The snippet frame may be absent (e.g. a syntax error reported
        // against the compile step); fall back to any line reference.
        None => ANY_LINE_RE
            .captures(trace)
            .and_then(|caps| caps[1].parse::<usize>().ok()),
    };

    let error_type = ERROR_TYPE_RE
        .captures_iter(trace)
        .last()
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| "Unknown error".to_string());

    let Some(n) = line_number else {
        return ErrorLocation {
            line_number: None,
            error_line: "No line found".to_string(),
            context: "No context found".to_string(),
            error_type: "Unknown error".to_string(),
        };
    };

    if n == 0 || n > lines.len() {
        // Keep the number for diagnostics even though it does not map onto
        // the source we were given.
        return ErrorLocation {
            line_number: Some(n),
            error_line: "No line found".to_string(),
            context: "No context found".to_string(),
            error_type: "Unknown error".to_string(),
        };
    }

    let start = n.saturating_sub(1).max(1);
    let end = (n + 1).min(lines.len());

    let context = (start..=end)
        .map(|i| {
            let prefix = if i == n { ">>> " } else { "    " };
            format!("{}: {}{}", i, prefix, lines[i - 1])
        })
        .collect::<Vec<_>>()
        .join("\n");

    ErrorLocation {
        line_number: Some(n),
        error_line: lines[n - 1].to_string(),
        context,
        error_type,
    }
}
