//! Agent-facing dispatch table.
//!
//! A fixed list of (name, handler) pairs built once at startup; handlers
//! exchange `serde_json::Value`s so any transport can sit in front of them.
//! The validation core knows nothing about this table.

use anyhow::{anyhow, bail, Result};
use serde_json::{json, Value};

use crate::config::Config;
use crate::quickcheck;
use crate::sandbox::{self, ValidationRequest};

type Handler = fn(&Config, Value) -> Result<Value>;

pub struct Tool {
    pub name: &'static str,
    pub description: &'static str,
    handler: Handler,
}

pub struct ToolRegistry {
    config: Config,
    tools: Vec<Tool>,
}

impl ToolRegistry {
    /// Build the fixed table. Two tools: the cheap quick check and the full
    /// sandboxed validation.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            tools: vec![
                Tool {
                    name: "check_code",
                    description: "Detect Python for-loops and trivially broken snippets \
                                  before sandboxed validation is warranted.",
                    handler: handle_check_code,
                },
                Tool {
                    name: "validate_code",
                    description: "Type-check a snippet with pyright in a throwaway venv, \
                                  installing declared dependencies, optionally executing it.",
                    handler: handle_validate_code,
                },
            ],
        }
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn call(&self, name: &str, args: Value) -> Result<Value> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| anyhow!("Unknown tool: {}", name))?;
        (tool.handler)(&self.config, args)
    }
}

fn handle_check_code(config: &Config, args: Value) -> Result<Value> {
    let Some(code) = args.get("code").and_then(Value::as_str) else {
        bail!("check_code requires a string field \"code\"");
    };
    let code = if args
        .get("from_markdown")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        quickcheck::extract_python_code(code)
    } else {
        code.to_string()
    };

    let report = quickcheck::quick_check(&config.sandbox.python, &code);
    Ok(serde_json::to_value(report)?)
}

fn handle_validate_code(config: &Config, args: Value) -> Result<Value> {
    if args.get("code").and_then(Value::as_str).is_none() {
        bail!("validate_code requires a string field \"code\"");
    }
    let request: ValidationRequest = serde_json::from_value(args)?;
    let report = sandbox::validate(&request, &config.sandbox);
    Ok(serde_json::to_value(report)?)
}

/// Names and descriptions as a JSON listing, for `list-tools`.
pub fn describe(registry: &ToolRegistry) -> Value {
    Value::Array(
        registry
            .tools()
            .iter()
            .map(|t| json!({ "name": t.name, "description": t.description }))
            .collect(),
    )
}
