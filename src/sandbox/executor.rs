//! Timed execution of the checked snippet inside the venv's interpreter.

use serde::Serialize;
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use tracing::{debug, warn};

use crate::util::{run_cmd_with_timeout, CmdOutcome};

/// What happened to the execution stage. `executed = true` with
/// `success = Some(false)` and the fixed skip message means execution was
/// requested but withheld because the static check failed.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ExecOutcome {
    pub executed: bool,
    pub success: Option<bool>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub return_code: Option<i32>,
}

impl ExecOutcome {
    /// Execution was never requested.
    pub fn not_requested() -> Self {
        Self::default()
    }

    /// Execution was requested but the static check failed: attempted but
    /// skipped, no subprocess spawned.
    pub fn skipped_after_failed_check() -> Self {
        Self {
            executed: true,
            success: Some(false),
            stdout: None,
            stderr: Some("Skipped due to pyright errors.".to_string()),
            return_code: None,
        }
    }
}

/// Run `file` under `interpreter` with a hard wall-clock bound. Timeouts and
/// spawn faults are captured into the outcome, never propagated.
pub fn execute(file: &Path, interpreter: &Path, timeout_secs: u64) -> ExecOutcome {
    debug!(
        "Executing {} with {} (timeout {}s)",
        file.display(),
        interpreter.display(),
        timeout_secs
    );

    let mut cmd = Command::new(interpreter);
    cmd.arg(file);

    match run_cmd_with_timeout(cmd, Duration::from_secs(timeout_secs)) {
        Ok(CmdOutcome::Completed(output)) => ExecOutcome {
            executed: true,
            success: Some(output.status.success()),
            stdout: Some(String::from_utf8_lossy(&output.stdout).to_string()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
            return_code: output.status.code(),
        },
        Ok(CmdOutcome::TimedOut) => {
            warn!("Execution timed out after {}s", timeout_secs);
            ExecOutcome {
                executed: true,
                success: Some(false),
                stdout: None,
                stderr: Some(format!(
                    "Execution timed out after {} seconds.",
                    timeout_secs
                )),
                return_code: None,
            }
        }
        Err(e) => {
            warn!("Execution could not start: {}", e);
            ExecOutcome {
                executed: true,
                success: Some(false),
                stdout: None,
                stderr: Some(e.to_string()),
                return_code: None,
            }
        }
    }
}
