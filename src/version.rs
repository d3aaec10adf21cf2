//! Runner version information.
//!
//! Exposes the version as a single constant so the CLI banner and `--version` agree.
//!
//! ## Notes
//!
//! - The value is taken from Cargo metadata (`CARGO_PKG_VERSION`) at compile time.
//! - Prefer this constant over repeating `env!("CARGO_PKG_VERSION")` in multiple places.

/// The runner version string (for example, `0.1.0-alpha.1`).
pub const RUNNER_VERSION: &str = env!("CARGO_PKG_VERSION");
