//! jmcheck - Validate AI-generated JijModeling code
//!
//! Two cooperating strategies: a cheap quick check (for-loop screen plus a
//! run under the host interpreter, with structured traceback locations) and
//! a sandboxed validation that type-checks the snippet with pyright inside a
//! throwaway virtualenv, installing declared dependencies and optionally
//! executing the code under a timeout.

pub mod config;
pub mod locator;
pub mod quickcheck;
pub mod sandbox;
pub mod tools;
pub mod util;
