#![forbid(unsafe_code)]
//! gtest-runner: a harness for native gtest binaries
//!
//! The harness scans a build output directory for test executables, normalizes each one to a
//! canonical `test_*` name, and exposes the allow-listed ones as independently runnable test
//! cases. Every launch goes through the same command-line construction and the same shaped
//! environment, so a binary behaves identically whether it is run locally or in CI.
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` and `harness` modules
//!   enforce `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.

pub mod cli;
pub mod config;
pub mod error;
pub mod harness;
pub mod platform;
pub mod version;

pub use config::HarnessConfig;
pub use error::HarnessError;
pub use harness::{Harness, TestOutcome};
pub use platform::Platform;
