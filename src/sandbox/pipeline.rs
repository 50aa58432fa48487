//! One validation request end to end: venv creation, dependency install,
//! pyright check, optional execution, unconditional teardown.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use super::executor::{execute, ExecOutcome};
use super::pyright::{run_pyright, CheckResult};
use super::venv::{SandboxError, Venv};
use crate::config::SandboxConfig;

/// What the caller submits. Immutable once constructed.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationRequest {
    pub code: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default = "default_execute")]
    pub execute_after_check: bool,
}

fn default_execute() -> bool {
    true
}

/// Everything that happened, stage by stage. `log` carries one line per
/// transition and per captured failure so a caller can reconstruct the
/// failure point without inspecting internals.
#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub venv_path: Option<String>,
    pub venv_created: bool,
    pub dependencies_installed: bool,
    pub pyright_check_result: Option<CheckResult>,
    pub code_execution_result: ExecOutcome,
    pub log: Vec<String>,
}

impl ValidationReport {
    fn empty() -> Self {
        Self {
            venv_path: None,
            venv_created: false,
            dependencies_installed: false,
            pyright_check_result: None,
            code_execution_result: ExecOutcome::not_requested(),
            log: Vec::new(),
        }
    }
}

/// Run the full pipeline for one request. Owns exactly one venv; the venv is
/// destroyed before this returns no matter which stage failed. The report is
/// always well formed; nothing escapes as an error.
pub fn validate(request: &ValidationRequest, config: &SandboxConfig) -> ValidationReport {
    let mut report = ValidationReport::empty();

    let mut venv = match Venv::new(&config.venv_prefix) {
        Ok(venv) => venv,
        Err(e) => {
            report
                .log
                .push(format!("Failed to allocate venv directory: {}", e));
            return report;
        }
    };
    report.venv_path = Some(venv.path().display().to_string());
    report.log.push(format!(
        "Temporary venv directory created: {}",
        venv.path().display()
    ));

    // Single exit point below so teardown runs on every path; the TempDir
    // inside Venv would also remove the directory if this unwound early.
    run_stages(&mut venv, request, config, &mut report);

    match venv.destroy() {
        Ok(()) => report
            .log
            .push("Temporary venv directory and its contents removed.".to_string()),
        Err(e) => report.log.push(format!("Venv removal failed: {}", e)),
    }

    report
}

fn run_stages(
    venv: &mut Venv,
    request: &ValidationRequest,
    config: &SandboxConfig,
    report: &mut ValidationReport,
) {
    // 1. Provision the interpreter. Terminal on failure.
    if let Err(e) = venv.create(&config.python) {
        warn!("Venv creation failed");
        report.log.push(match e {
            SandboxError::Creation { stderr } => format!("Venv creation failed: {}", stderr),
            other => format!("Venv creation failed: {}", other),
        });
        return;
    }
    report.venv_created = true;
    report
        .log
        .push("Virtual environment created successfully.".to_string());

    // 2. Install caller deps plus the checker. Terminal on failure.
    let install_timeout = Duration::from_secs(config.install_timeout_secs);
    match venv.install(
        &request.dependencies,
        &config.checker_package,
        config.pip_quiet,
        install_timeout,
    ) {
        Ok(()) => {
            report.dependencies_installed = true;
            report
                .log
                .push("Packages installed successfully.".to_string());
        }
        Err(SandboxError::Install { stdout, stderr }) => {
            warn!("Package installation failed");
            report.log.push(format!(
                "Package installation failed:\n{}\nStdout was:\n{}",
                stderr, stdout
            ));
            return;
        }
        Err(e) => {
            warn!("Package installation failed: {}", e);
            report.log.push(format!("Package installation failed: {}", e));
            return;
        }
    }

    // 3. Write the snippet where both the checker and the executor find it.
    let snippet = match venv.write_snippet(&request.code) {
        Ok(path) => path,
        Err(e) => {
            report.log.push(format!("Failed to write code file: {}", e));
            return;
        }
    };
    report
        .log
        .push(format!("Code written to: {}", snippet.display()));

    // 4. Static check.
    let checker = venv.tool_path(checker_executable_name(&config.checker_package));
    let check = run_pyright(&snippet, &checker);
    info!("Pyright check completed. Success: {}", check.success);
    report.log.push(format!(
        "Pyright check completed. Success: {}",
        check.success
    ));
    if !check.success {
        report
            .log
            .push(format!("Pyright found errors:\n{}", check.output));
    }
    let check_passed = check.success;
    report.pyright_check_result = Some(check);

    // 5. Conditional execution: only after a passing check.
    if !request.execute_after_check {
        return;
    }
    if !check_passed {
        report
            .log
            .push("Skipping code execution due to pyright errors.".to_string());
        report.code_execution_result = ExecOutcome::skipped_after_failed_check();
        return;
    }

    let interpreter = venv.python_path();
    report.log.push(format!(
        "Executing code with: {} {}",
        interpreter.display(),
        snippet.display()
    ));
    let outcome = execute(&snippet, &interpreter, config.execution_timeout_secs);
    match (&outcome.return_code, &outcome.stderr) {
        (Some(code), _) => report
            .log
            .push(format!("Code execution finished. Return code: {}", code)),
        (None, Some(stderr)) => report.log.push(format!("Code execution failed: {}", stderr)),
        (None, None) => report.log.push("Code execution finished.".to_string()),
    }
    report.code_execution_result = outcome;
}

/// Executable name for the checker package: the specifier with any version
/// constraint stripped ("pyright==1.1.401" installs the `pyright` binary).
fn checker_executable_name(package: &str) -> &str {
    let end = package
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(package.len());
    &package[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SandboxConfig {
        SandboxConfig::default()
    }

    #[test]
    fn test_checker_executable_name() {
        assert_eq!(checker_executable_name("pyright"), "pyright");
        assert_eq!(checker_executable_name("pyright==1.1.401"), "pyright");
        assert_eq!(checker_executable_name("pyright>=1.1"), "pyright");
    }

    #[test]
    fn test_request_deserialization_defaults() {
        let request: ValidationRequest = serde_json::from_str(r#"{"code": "x = 1"}"#).unwrap();
        assert_eq!(request.code, "x = 1");
        assert!(request.dependencies.is_empty());
        assert!(request.execute_after_check);
    }

    #[test]
    fn test_creation_failure_is_terminal_and_torn_down() {
        let mut cfg = config();
        cfg.python = "definitely-not-python-xyz".to_string();
        let request = ValidationRequest {
            code: "x = 1".to_string(),
            dependencies: vec![],
            execute_after_check: true,
        };

        let report = validate(&request, &cfg);
        assert!(!report.venv_created);
        assert!(!report.dependencies_installed);
        assert!(report.pyright_check_result.is_none());
        assert!(!report.code_execution_result.executed);
        assert!(report.log.iter().any(|l| l.contains("Venv creation failed")));

        let path = report.venv_path.expect("directory was allocated");
        assert!(!std::path::Path::new(&path).exists());
    }

    #[test]
    fn test_bad_dependency_fails_before_pip() {
        let request = ValidationRequest {
            code: "x = 1".to_string(),
            dependencies: vec!["pkg; rm -rf /".to_string()],
            execute_after_check: false,
        };

        let report = validate(&request, &config());
        assert!(report.venv_created);
        assert!(!report.dependencies_installed);
        assert!(report.pyright_check_result.is_none());
        assert!(report
            .log
            .iter()
            .any(|l| l.contains("Package installation failed")));

        let path = report.venv_path.unwrap();
        assert!(!std::path::Path::new(&path).exists());
    }

    #[test]
    fn test_report_serializes_wire_shape() {
        let report = ValidationReport::empty();
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("venv_path").is_some());
        assert_eq!(json["venv_created"], false);
        assert_eq!(json["dependencies_installed"], false);
        assert!(json["pyright_check_result"].is_null());
        assert_eq!(json["code_execution_result"]["executed"], false);
        assert!(json["log"].as_array().unwrap().is_empty());
    }
}
