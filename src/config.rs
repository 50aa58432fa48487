use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Host interpreter used to seed virtualenvs and run the quick check
    /// (default: "python3")
    #[serde(default = "default_python")]
    pub python: String,

    /// Package installed into every venv to perform the static check
    /// (default: "pyright")
    #[serde(default = "default_checker_package")]
    pub checker_package: String,

    /// Prefix for the throwaway venv directories (default: "jmcheck-venv-")
    #[serde(default = "default_venv_prefix")]
    pub venv_prefix: String,

    /// Timeout for executing checked code inside the venv, in seconds
    /// (default: 30)
    #[serde(default = "default_execution_timeout")]
    pub execution_timeout_secs: u64,

    /// Timeout for the batched `pip install`, in seconds (default: 600).
    /// A hung installer would otherwise block the request forever.
    #[serde(default = "default_install_timeout")]
    pub install_timeout_secs: u64,

    /// Pass `--quiet` to pip to keep the operation log readable
    /// (default: true)
    #[serde(default = "default_true")]
    pub pip_quiet: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            python: default_python(),
            checker_package: default_checker_package(),
            venv_prefix: default_venv_prefix(),
            execution_timeout_secs: default_execution_timeout(),
            install_timeout_secs: default_install_timeout(),
            pip_quiet: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sandbox: SandboxConfig::default(),
        }
    }
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_checker_package() -> String {
    "pyright".to_string()
}

fn default_venv_prefix() -> String {
    "jmcheck-venv-".to_string()
}

fn default_execution_timeout() -> u64 {
    30
}

fn default_install_timeout() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load config from the working directory or the user config directory
    pub fn load() -> Result<Self> {
        Self::load_with_path(None)
    }

    /// Load configuration from a specific path, or use default search paths
    pub fn load_with_path(path: Option<String>) -> Result<Self> {
        if let Some(config_path) = path {
            debug!("Loading config from explicit path: {}", config_path);
            return Self::load_from_path(&config_path);
        }

        if let Ok(config_path) = std::env::var("JMCHECK_CONFIG") {
            debug!("Loading config from JMCHECK_CONFIG: {}", config_path);
            return Self::load_from_path(&config_path);
        }

        if let Ok(config) = Self::load_from_path("jmcheck.toml") {
            debug!("Loaded config from ./jmcheck.toml");
            return Ok(config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("jmcheck").join("config.toml");
            if let Ok(config) = Self::load_from_path(&config_path) {
                debug!("Loaded config from {:?}", config_path);
                return Ok(config);
            }
        }

        debug!("Using default config");
        Ok(Self::default())
    }

    fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
