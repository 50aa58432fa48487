//! Throwaway virtualenv lifecycle: creation, package installation, teardown.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tempfile::{Builder, TempDir};
use thiserror::Error;
use tracing::{debug, info};

use crate::util::{run_cmd_with_timeout, sanitize_dep_name, CmdOutcome};

/// Terminal failures of the environment stages. Everything downstream of
/// these (checker output, execution faults) is captured as data instead.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Virtual environment creation failed: {stderr}")]
    Creation { stderr: String },
    #[error("Package installation failed")]
    Install { stdout: String, stderr: String },
    #[error("Package installation timed out after {secs} seconds")]
    InstallTimeout { secs: u64 },
    #[error("Invalid dependency specifier: {0}")]
    BadDependency(String),
}

/// Host platform descriptor; decides where venv entry points live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Unix,
    Windows,
}

impl Platform {
    pub fn host() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    fn scripts_dir(&self) -> &'static str {
        match self {
            Platform::Unix => "bin",
            Platform::Windows => "Scripts",
        }
    }

    fn executable(&self, name: &str) -> String {
        match self {
            Platform::Unix => name.to_string(),
            Platform::Windows => format!("{}.exe", name),
        }
    }
}

/// One isolated virtualenv, exclusively owned for the lifetime of a single
/// validation request. The backing `TempDir` removes the directory on drop,
/// so teardown happens on every exit path; `destroy` exists for the explicit
/// end-of-request removal where errors should be observable.
#[derive(Debug)]
pub struct Venv {
    dir: TempDir,
    platform: Platform,
    created: bool,
    deps_installed: bool,
}

impl Venv {
    /// Allocate the uniquely named backing directory. The interpreter is not
    /// provisioned yet; that is `create`'s job so that a failed provisioning
    /// still has a directory to report (and remove).
    pub fn new(prefix: &str) -> io::Result<Self> {
        let dir = Builder::new().prefix(prefix).tempdir()?;
        debug!("Allocated venv directory: {}", dir.path().display());
        Ok(Self {
            dir,
            platform: Platform::host(),
            created: false,
            deps_installed: false,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn created(&self) -> bool {
        self.created
    }

    pub fn deps_installed(&self) -> bool {
        self.deps_installed
    }

    /// Path of an entry point inside the venv, resolved for the host
    /// platform (`bin/` on Unix, `Scripts/` with `.exe` on Windows).
    pub fn tool_path(&self, name: &str) -> PathBuf {
        self.dir
            .path()
            .join(self.platform.scripts_dir())
            .join(self.platform.executable(name))
    }

    pub fn python_path(&self) -> PathBuf {
        self.tool_path("python")
    }

    pub fn pip_path(&self) -> PathBuf {
        self.tool_path("pip")
    }

    /// Provision a self-contained interpreter rooted at the backing
    /// directory via `<python> -m venv`.
    pub fn create(&mut self, python: &str) -> Result<(), SandboxError> {
        info!("Creating virtual environment at {}", self.dir.path().display());
        let output = Command::new(python)
            .arg("-m")
            .arg("venv")
            .arg(self.dir.path())
            .output()
            .map_err(|e| SandboxError::Creation {
                stderr: format!("failed to spawn {}: {}", python, e),
            })?;

        if !output.status.success() {
            return Err(SandboxError::Creation {
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        self.created = true;
        Ok(())
    }

    /// Install the caller's dependencies plus the static checker in one
    /// batched `pip install`, bounded by `timeout`. Specifiers are validated
    /// before they reach the command line.
    pub fn install(
        &mut self,
        deps: &[String],
        checker_package: &str,
        quiet: bool,
        timeout: Duration,
    ) -> Result<(), SandboxError> {
        let packages = merge_packages(deps, checker_package);
        for pkg in &packages {
            sanitize_dep_name(pkg).map_err(SandboxError::BadDependency)?;
        }

        info!("Installing packages: {}", packages.join(" "));
        let mut cmd = Command::new(self.pip_path());
        cmd.arg("install");
        if quiet {
            cmd.arg("--quiet");
        }
        cmd.args(&packages);

        let outcome = run_cmd_with_timeout(cmd, timeout).map_err(|e| SandboxError::Install {
            stdout: String::new(),
            stderr: e.to_string(),
        })?;

        match outcome {
            CmdOutcome::Completed(output) if output.status.success() => {
                self.deps_installed = true;
                Ok(())
            }
            CmdOutcome::Completed(output) => Err(SandboxError::Install {
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            }),
            CmdOutcome::TimedOut => Err(SandboxError::InstallTimeout {
                secs: timeout.as_secs(),
            }),
        }
    }

    /// Write the snippet under a fixed name inside the venv directory so the
    /// checker and the executor see the same file.
    pub fn write_snippet(&self, code: &str) -> io::Result<PathBuf> {
        let path = self.dir.path().join("checked_code.py");
        fs::write(&path, code)?;
        Ok(path)
    }

    /// Remove the backing directory now, reporting any removal error.
    /// Dropping a `Venv` removes it silently instead.
    pub fn destroy(self) -> io::Result<()> {
        debug!("Removing venv directory: {}", self.dir.path().display());
        self.dir.close()
    }
}

/// Caller deps plus the checker package, deduplicated, insertion order kept.
fn merge_packages(deps: &[String], checker_package: &str) -> Vec<String> {
    let mut packages: Vec<String> = Vec::with_capacity(deps.len() + 1);
    for dep in deps {
        if !packages.iter().any(|p| p == dep) {
            packages.push(dep.clone());
        }
    }
    if !packages.iter().any(|p| p == checker_package) {
        packages.push(checker_package.to_string());
    }
    packages
}
