//! Fast pre-check for JijModeling snippets.
//!
//! Two cheap screens run before any sandboxed validation is worth paying for:
//! a for-loop detector (Python loops are the most common misuse of the
//! modeling API) and a quick run under the host interpreter. The quick run
//! offers no isolation (the snippet sees the host's site-packages, and any
//! side effects it performs before failing are not rolled back), so it is
//! only suitable as a structural smell-test.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, warn};

use crate::locator::{self, ErrorLocation};
use crate::util::{run_cmd_with_timeout, CmdOutcome};

/// Upper bound for the quick run; the host interpreter shares our process
/// budget, so a wedged snippet must not hang the whole request.
const QUICK_RUN_TIMEOUT_SECS: u64 = 60;

/// Guidance returned whenever a Python loop is detected: the correct
/// Element/`jm.sum` idiom instead of explicit iteration.
pub const LOOP_GUIDANCE: &str = r#"In JijModeling, you cannot use Python loops directly. Instead, you should use the Element objects.

# How to write summation in JijModeling without Python loops.

The wrong code:
```python
objective = 0
for l in range(n_l):
    for t in range(n_t):
        for p in range(n_p):
            for q in range(n_p):
                if p != q:
                    objective += ChangeCost[p, q] * Switch[p, q, l, t]
```

The correct code:
```
l = jm.Element("l", belongs_to=range(0, n_l))
t = jm.Element("t", belongs_to=range(0, n_t))
p = jm.Element("p", belongs_to=range(0, n_p))
q = jm.Element("q", belongs_to=range(0, n_p))
objective = jm.sum([l, t, p, (q, p != q)], ChangeCost[p, q] * Switch[p, q, l, t])
```

# How to write forall in JijModeling without Python loops.

The wrong code:
```python
for l in range(n_l):
    for t in range(n_t):
        problem += jm.Constraint(
            "SingleProductPerLine",
            jm.sum([X[p, l, t] for p in range(n_p)]) <= 1,
            forall=[]
        )
```

The correct code:
```python
l = jm.Element("l", belongs_to=range(0, n_l))
t = jm.Element("t", belongs_to=range(0, n_t))
p = jm.Element("p", belongs_to=range(0, n_p))
problem += jm.Constraint(
    "SingleProductPerLine",
    jm.sum(p, X[p, l, t]) <= 1,
    forall=[l, t]
)
```
"#;

static FOR_LOOP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bfor\s+[a-zA-Z_][a-zA-Z0-9_]*\s+in\b").unwrap());

/// AST probe run under the host interpreter: prints yes/no, exits 2 when the
/// snippet does not parse.
const AST_PROBE: &str = r#"import ast, sys
try:
    tree = ast.parse(sys.stdin.read())
except SyntaxError:
    sys.exit(2)
found = any(isinstance(n, (ast.For, ast.AsyncFor)) for n in ast.walk(tree))
print("yes" if found else "no")
"#;

/// Result of the quick-check path. When a loop is detected, `error` is
/// always absent and `message` carries the guidance document.
#[derive(Debug, Clone, Serialize)]
pub struct QuickCheckReport {
    pub for_loop_detected: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorLocation>,
}

/// Detect an explicit iteration construct in `code`.
///
/// The AST probe is authoritative for syntactically complete snippets; when
/// the snippet does not parse (or no interpreter is available) we fall back
/// to a textual `for <name> in` match.
pub fn detect_for_loop(python: &str, code: &str) -> bool {
    match ast_probe(python, code) {
        Some(found) => found,
        None => FOR_LOOP_RE.is_match(code),
    }
}

/// Returns `Some(found)` when the probe produced a verdict, `None` when the
/// snippet is not parseable or the probe itself could not run.
fn ast_probe(python: &str, code: &str) -> Option<bool> {
    let mut child = Command::new(python)
        .args(["-c", AST_PROBE])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;

    // Dropping stdin closes the pipe so the probe's read() returns.
    if let Some(mut stdin) = child.stdin.take() {
        if stdin.write_all(code.as_bytes()).is_err() {
            let _ = child.kill();
            return None;
        }
    }

    let output = child.wait_with_output().ok()?;
    if !output.status.success() {
        debug!("AST probe declined (exit {:?}), using textual fallback", output.status.code());
        return None;
    }
    match String::from_utf8_lossy(&output.stdout).trim() {
        "yes" => Some(true),
        "no" => Some(false),
        _ => None,
    }
}

/// Run the snippet under the host interpreter and report success or a
/// structured failure. Never raises: spawn failures and timeouts degrade to
/// an [`ErrorLocation`] with placeholder fields.
pub fn run_snippet(python: &str, code: &str) -> Option<ErrorLocation> {
    let mut cmd = Command::new(python);
    cmd.args(["-c", code]);

    match run_cmd_with_timeout(cmd, Duration::from_secs(QUICK_RUN_TIMEOUT_SECS)) {
        Ok(CmdOutcome::Completed(output)) => {
            if output.status.success() {
                None
            } else {
                let trace = String::from_utf8_lossy(&output.stderr);
                Some(locator::locate(code, &trace))
            }
        }
        Ok(CmdOutcome::TimedOut) => {
            warn!("Quick run timed out after {}s", QUICK_RUN_TIMEOUT_SECS);
            Some(ErrorLocation {
                line_number: None,
                error_line: "No line found".to_string(),
                context: "No context found".to_string(),
                error_type: format!(
                    "Execution timed out after {} seconds",
                    QUICK_RUN_TIMEOUT_SECS
                ),
            })
        }
        Err(e) => {
            warn!("Quick run could not spawn interpreter: {}", e);
            Some(ErrorLocation {
                line_number: None,
                error_line: "No line found".to_string(),
                context: "No context found".to_string(),
                error_type: format!("Interpreter unavailable: {}", e),
            })
        }
    }
}

/// The full quick-check path: loop screen first (short-circuits without
/// executing anything), then the host-interpreter run.
pub fn quick_check(python: &str, code: &str) -> QuickCheckReport {
    if detect_for_loop(python, code) {
        debug!("For loop detected, skipping quick run");
        return QuickCheckReport {
            for_loop_detected: true,
            message: LOOP_GUIDANCE.to_string(),
            error: None,
        };
    }

    match run_snippet(python, code) {
        Some(error) => QuickCheckReport {
            for_loop_detected: false,
            message: LOOP_GUIDANCE.to_string(),
            error: Some(error),
        },
        None => QuickCheckReport {
            for_loop_detected: false,
            message: "No for loop detected and no errors found.".to_string(),
            error: None,
        },
    }
}

/// Concatenate the bodies of all ```python fenced blocks. Agents often hand
/// back whole chat messages; this recovers the code before checking it.
pub fn extract_python_code(content: &str) -> String {
    content
        .split("```python")
        .skip(1)
        .filter_map(|block| block.split("```").next())
        .collect::<Vec<_>>()
        .join("\n")
}
