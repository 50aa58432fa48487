//! Runs pyright against one file and turns its human-readable report into a
//! verdict plus discrete error messages. Temp file paths are replaced with a
//! fixed placeholder so callers never see filesystem specifics.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::io;
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

/// Shown instead of the real temp file path in all checker output.
pub const FILE_PLACEHOLDER: &str = "[checked_code.py]";

// Pyright summary line variants, in priority order.
static SUMMARY_FULL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*errors?,\s*(\d+)\s*warnings?,\s*(\d+)\s*informations?").unwrap()
});
static SUMMARY_FOUND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)found\s*(\d+)\s*errors?").unwrap());
static SUMMARY_CLEAN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)no\s*errors?\s*found").unwrap());

/// Trailing rule annotation like `(reportGeneralTypeIssues)`.
static RULE_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\([a-zA-Z0-9_-]+\)$").unwrap());

/// Verdict of one pyright run. `output` is the normalized combined
/// stdout+stderr; `errors` lists one path-free message per reported error,
/// in order of appearance.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub success: bool,
    pub output: String,
    pub errors: Vec<String>,
}

/// Run the checker executable against `file` and parse its report.
/// Never fails: a missing executable or spawn fault becomes a failed result
/// with a single explanatory error entry.
pub fn run_pyright(file: &Path, executable: &Path) -> CheckResult {
    debug!("Running {} on {}", executable.display(), file.display());
    match Command::new(executable).arg(file).output() {
        Ok(output) => {
            let raw = format!(
                "{}{}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
            parse_pyright_output(&raw, output.status.success(), &file.to_string_lossy())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("Checker executable not found: {}", executable.display());
            let message = format!(
                "Pyright executable '{}' not found.",
                executable.display()
            );
            CheckResult {
                success: false,
                output: format!("Error: {}", message),
                errors: vec![message],
            }
        }
        Err(e) => {
            warn!("Checker invocation failed: {}", e);
            CheckResult {
                success: false,
                output: format!("An unexpected error occurred during pyright check: {}", e),
                errors: vec![format!("An unexpected error: {}", e)],
            }
        }
    }
}

/// Derive the verdict from the raw combined output.
///
/// Priority: the full `N errors, M warnings, K informations` summary, then
/// `found N errors`, then `no errors found`. Without a recognized summary the
/// verdict falls back to exit status plus an `error` substring scan; an
/// ambiguous signal counts as failure.
pub fn parse_pyright_output(raw: &str, exit_ok: bool, file_path: &str) -> CheckResult {
    let num_errors: Option<usize> = if let Some(caps) = SUMMARY_FULL_RE.captures(raw) {
        caps[1].parse().ok()
    } else if let Some(caps) = SUMMARY_FOUND_RE.captures(raw) {
        caps[1].parse().ok()
    } else if SUMMARY_CLEAN_RE.is_match(raw) {
        Some(0)
    } else {
        None
    };

    let success = match num_errors {
        Some(n) => n == 0,
        None => exit_ok && !raw.to_lowercase().contains("error"),
    };

    let output = raw
        .lines()
        .map(|line| line.replace(file_path, FILE_PLACEHOLDER))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();

    let errors = extract_errors(raw, file_path);

    CheckResult {
        success,
        output,
        errors,
    }
}

/// Pull the discrete error messages out of the report, stripped of rule
/// annotations. The ` - error: ` layout is pyright's standard; lines using a
/// `<prefix>: error: <message>` layout are accepted only when they name the
/// checked file.
fn extract_errors(raw: &str, file_path: &str) -> Vec<String> {
    let marker = " - error: ";
    let mut errors = Vec::new();

    for line in raw.lines() {
        let lowered = line.to_lowercase();
        // Byte offsets into the lowered copy can drift on non-ASCII input.
        let body = lowered
            .find(marker)
            .and_then(|idx| line.get(idx + marker.len()..));
        if let Some(body) = body {
            errors.push(RULE_SUFFIX_RE.replace(body.trim(), "").trim().to_string());
        } else if lowered.contains(": error: ") && line.contains(file_path) {
            if let Some((_prefix, body)) = line.split_once(" error: ") {
                errors.push(RULE_SUFFIX_RE.replace(body.trim(), "").trim().to_string());
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const FILE: &str = "/tmp/jmcheck-venv-abc/checked_code.py";

    #[test]
    fn test_full_summary_zero_errors() {
        let raw = "0 errors, 2 warnings, 1 information";
        let result = parse_pyright_output(raw, true, FILE);
        assert!(result.success);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_full_summary_with_errors() {
        let raw = format!(
            "{}:1:5 - error: Operator \"+\" not supported (reportOperatorIssue)\n1 error, 0 warnings, 0 informations",
            FILE
        );
        let result = parse_pyright_output(&raw, false, FILE);
        assert!(!result.success);
        assert_eq!(
            result.errors,
            vec!["Operator \"+\" not supported".to_string()]
        );
    }

    #[test]
    fn test_found_summary() {
        let result = parse_pyright_output("Found 3 errors", false, FILE);
        assert!(!result.success);
        let result = parse_pyright_output("found 0 errors", true, FILE);
        assert!(result.success);
    }

    #[test]
    fn test_no_errors_found_summary() {
        // Exit status is irrelevant once the clean summary matched.
        let result = parse_pyright_output("No errors found", false, FILE);
        assert!(result.success);
    }

    #[test]
    fn test_full_summary_takes_priority() {
        // Both patterns present; the full summary decides.
        let raw = "2 errors, 0 warnings, 0 informations\nno errors found";
        let result = parse_pyright_output(raw, true, FILE);
        assert!(!result.success);
    }

    #[test]
    fn test_no_summary_clean_exit() {
        let result = parse_pyright_output("all good", true, FILE);
        assert!(result.success);
    }

    #[test]
    fn test_no_summary_error_substring_fails() {
        let result = parse_pyright_output("internal Error: crashed", true, FILE);
        assert!(!result.success);
    }

    #[test]
    fn test_no_summary_nonzero_exit_fails() {
        let result = parse_pyright_output("all good", false, FILE);
        assert!(!result.success);
    }

    #[test]
    fn test_path_normalized_in_output() {
        let raw = format!("{}:3:1 - error: bad type\nFound 1 error", FILE);
        let result = parse_pyright_output(&raw, false, FILE);
        assert!(!result.output.contains(FILE));
        assert!(result.output.contains(FILE_PLACEHOLDER));
    }

    #[test]
    fn test_error_extraction_order_preserved() {
        let raw = format!(
            "{f}:1:1 - error: first problem (ruleA)\n{f}:2:1 - error: second problem (ruleB)\n2 errors, 0 warnings, 0 informations",
            f = FILE
        );
        let result = parse_pyright_output(&raw, false, FILE);
        assert_eq!(result.errors, vec!["first problem", "second problem"]);
    }

    #[test]
    fn test_rule_suffix_stripped() {
        let raw = format!(
            "{}:1:1 - error: bad operand (reportOperatorIssue)\n1 error, 0 warnings, 0 informations",
            FILE
        );
        let result = parse_pyright_output(&raw, false, FILE);
        assert_eq!(result.errors, vec!["bad operand"]);
    }

    #[test]
    fn test_alternate_layout_requires_file_path() {
        let raw = format!("{}: error: cannot resolve import", FILE);
        let result = parse_pyright_output(&raw, false, FILE);
        assert_eq!(result.errors, vec!["cannot resolve import"]);

        // Same layout but some other file: not one of ours.
        let other = "/somewhere/else.py: error: unrelated";
        let result = parse_pyright_output(other, false, FILE);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_missing_executable_reported_not_raised() {
        let result = run_pyright(
            &PathBuf::from("/tmp/nothing.py"),
            &PathBuf::from("/nonexistent/bin/pyright"),
        );
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("not found"));
    }

    #[test]
    fn test_empty_output_ambiguous_with_nonzero_exit() {
        let result = parse_pyright_output("", false, FILE);
        assert!(!result.success);
    }

    #[test]
    fn test_empty_output_clean_exit() {
        let result = parse_pyright_output("", true, FILE);
        assert!(result.success);
    }
}
