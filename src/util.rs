//! Shared helpers: dependency-name validation and bounded subprocess runs.

use anyhow::{Context, Result};
use std::process::{Command, Output, Stdio};
use std::sync::mpsc;
use std::time::Duration;

/// Outcome of a bounded subprocess run. A timeout is a normal outcome here,
/// not an error; callers decide whether it is fatal.
#[derive(Debug)]
pub enum CmdOutcome {
    Completed(Output),
    TimedOut,
}

/// Validate a package specifier before it is handed to `pip install`.
/// Rejects shell metacharacters and anything that could be parsed as a flag.
/// Allowed: alphanumerics, `-`, `_`, `.`, `[`, `]`, `,`, `@`, and version
/// constraint operators (`>=`, `<`, `~=`, `^`, `!`, `=`).
pub fn sanitize_dep_name(dep: &str) -> Result<&str, String> {
    if dep.is_empty() {
        return Err("Empty dependency specifier".to_string());
    }
    if dep.starts_with('-') {
        return Err(format!(
            "Dependency specifier starts with '-' (possible flag injection): {}",
            dep
        ));
    }
    for ch in dep.chars() {
        match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' => {}
            '-' | '_' | '.' | '[' | ']' | ',' | '@' => {}
            '>' | '<' | '=' | '!' | '~' | '^' => {}
            _ => {
                return Err(format!(
                    "Invalid character '{}' in dependency specifier: {}",
                    ch, dep
                ));
            }
        }
    }
    Ok(dep)
}

#[cfg(unix)]
fn kill_process(pid: u32) {
    // The child may be wedged; nothing softer than SIGKILL is reliable.
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process(pid: u32) {
    let _ = Command::new("taskkill")
        .args(["/F", "/PID", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

/// Spawn `cmd` with piped stdout/stderr and wait up to `timeout` for it to
/// finish. On expiry the child is force-killed so it cannot outlive the
/// temp directory it was launched from.
pub fn run_cmd_with_timeout(mut cmd: Command, timeout: Duration) -> Result<CmdOutcome> {
    let child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("Failed to spawn command")?;

    let pid = child.id();
    let (sender, receiver) = mpsc::channel();

    std::thread::spawn(move || {
        let result = child.wait_with_output();
        let _ = sender.send(result);
    });

    match receiver.recv_timeout(timeout) {
        Ok(result) => Ok(CmdOutcome::Completed(
            result.context("Failed to collect command output")?,
        )),
        Err(_) => {
            kill_process(pid);
            Ok(CmdOutcome::TimedOut)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_dep_name_valid() {
        assert!(sanitize_dep_name("jijmodeling").is_ok());
        assert!(sanitize_dep_name("numpy>=1.20").is_ok());
        assert!(sanitize_dep_name("pandas>=2.0,<3").is_ok());
        assert!(sanitize_dep_name("flask~=2.0").is_ok());
        assert!(sanitize_dep_name("requests[socks]").is_ok());
    }

    #[test]
    fn test_sanitize_dep_name_rejects_shell_injection() {
        assert!(sanitize_dep_name("pkg; rm -rf /").is_err());
        assert!(sanitize_dep_name("pkg$(whoami)").is_err());
        assert!(sanitize_dep_name("pkg`id`").is_err());
        assert!(sanitize_dep_name("pkg|cat /etc/passwd").is_err());
        assert!(sanitize_dep_name("").is_err());
    }

    #[test]
    fn test_sanitize_dep_name_rejects_flag_injection() {
        assert!(sanitize_dep_name("-e").is_err());
        assert!(sanitize_dep_name("--pre").is_err());
        assert!(sanitize_dep_name("pkg --target /etc").is_err());
    }

    #[test]
    #[cfg(unix)]
    fn test_run_cmd_completes() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo hello"]);
        match run_cmd_with_timeout(cmd, Duration::from_secs(5)).unwrap() {
            CmdOutcome::Completed(output) => {
                assert!(output.status.success());
                assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
            }
            CmdOutcome::TimedOut => panic!("echo should not time out"),
        }
    }

    #[test]
    #[cfg(unix)]
    fn test_run_cmd_times_out() {
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        match run_cmd_with_timeout(cmd, Duration::from_millis(100)).unwrap() {
            CmdOutcome::TimedOut => {}
            CmdOutcome::Completed(_) => panic!("sleep 30 should have timed out"),
        }
    }

    #[test]
    fn test_run_cmd_spawn_failure() {
        let cmd = Command::new("definitely-not-a-real-binary-xyz");
        assert!(run_cmd_with_timeout(cmd, Duration::from_secs(1)).is_err());
    }
}
