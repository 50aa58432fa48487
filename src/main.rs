use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use tracing_subscriber::EnvFilter;

mod config;
mod locator;
mod quickcheck;
mod sandbox;
mod tools;
mod util;

use config::Config;
use sandbox::ValidationRequest;
use tools::ToolRegistry;

#[derive(Parser)]
#[command(name = "jmcheck", version)]
#[command(about = "Validate AI-generated JijModeling code", long_about = None)]
struct Cli {
    /// Path to config file (defaults to ./jmcheck.toml or ~/.config/jmcheck/config.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Quick check: for-loop screen plus a run under the host interpreter
    Check {
        /// File with the snippet, or "-" for stdin
        #[arg(default_value = "-")]
        file: String,

        /// Extract ```python fenced blocks before checking
        #[arg(long)]
        from_markdown: bool,
    },
    /// Full validation: pyright in a throwaway venv, optional execution
    Validate {
        /// File with the snippet, or "-" for stdin
        #[arg(default_value = "-")]
        file: String,

        /// Package to install into the venv (repeatable, e.g. "numpy>=1.20")
        #[arg(long = "dep")]
        dependencies: Vec<String>,

        /// Stop after the pyright check; do not execute the snippet
        #[arg(long)]
        no_execute: bool,
    },
    /// List the tools exposed to agents
    ListTools,
    /// Call a tool by name with JSON arguments from stdin
    Call {
        /// Tool name (see list-tools)
        name: String,
    },
}

fn read_input(path: &str) -> Result<String> {
    if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read from stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))
    }
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries only the JSON result.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load_with_path(cli.config)?;

    match cli.command {
        Commands::Check {
            file,
            from_markdown,
        } => {
            let mut code = read_input(&file)?;
            if from_markdown {
                code = quickcheck::extract_python_code(&code);
            }
            let report = quickcheck::quick_check(&config.sandbox.python, &code);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Validate {
            file,
            dependencies,
            no_execute,
        } => {
            let request = ValidationRequest {
                code: read_input(&file)?,
                dependencies,
                execute_after_check: !no_execute,
            };
            let report = sandbox::validate(&request, &config.sandbox);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::ListTools => {
            let registry = ToolRegistry::new(config);
            println!("{}", serde_json::to_string_pretty(&tools::describe(&registry))?);
        }
        Commands::Call { name } => {
            let args: serde_json::Value =
                serde_json::from_str(&read_input("-")?).context("Arguments must be JSON")?;
            let registry = ToolRegistry::new(config);
            let result = registry.call(&name, args)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
