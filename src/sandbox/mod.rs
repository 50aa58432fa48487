//! Sandboxed validation of untrusted snippets.
//!
//! Each request gets a throwaway virtualenv: its own interpreter, its own
//! package set, never shared and never reused. The snippet is type-checked
//! with pyright inside that venv and, when the caller asks for it and the
//! check passes, executed there under a wall-clock timeout. The directory is
//! removed before the report is returned, on every path.

pub mod executor;
pub mod pipeline;
pub mod pyright;
pub mod venv;

pub use executor::ExecOutcome;
pub use pipeline::{validate, ValidationReport, ValidationRequest};
pub use pyright::{CheckResult, FILE_PLACEHOLDER};
pub use venv::{SandboxError, Venv};
