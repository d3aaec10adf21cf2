//! CLI module for the gtest runner
//!
//! ## Commands
//!
//! - `list [--json]` - Show registered test binaries
//! - `run [NAMES...]` - Run registered tests (pytest-style output)
//! - `env` - Print the environment overrides applied to launched binaries
//! - `parity` - Run the replicated vs sharded training-step equivalence check
//!
//! ## Modules
//!
//! - `commands` - Command implementations
//! - `reporter` - Test session reporting
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;
pub mod reporter;

use std::fmt;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::harness::Harness;
use crate::harness::interfaces::RecordingRunner;
use crate::platform::Platform;
use crate::version::RUNNER_VERSION;

use commands::RunOptions;
use reporter::ConsoleReporter;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<HarnessError> for CliError {
    fn from(err: HarnessError) -> Self {
        CliError::failure(format!("Error: {}", err))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Run a build tree's native gtest binaries
#[derive(Parser, Debug)]
#[command(name = "gtest-runner")]
#[command(version = RUNNER_VERSION)]
#[command(about = "Discover and run native gtest binaries from a build tree", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Root of the source checkout
    #[arg(long, global = true, value_name = "DIR", default_value = ".")]
    pub repo_root: PathBuf,

    /// Directory holding the test binaries (default: derived from the repo root)
    #[arg(long, global = true, value_name = "DIR")]
    pub binary_dir: Option<PathBuf>,

    /// Write gtest XML reports under DIR (overrides TEST_SAVE_XML)
    #[arg(long, global = true, value_name = "DIR")]
    pub xml_dir: Option<PathBuf>,

    /// Additional canonical test name to expose (repeatable)
    #[arg(long = "allow", global = true, value_name = "NAME")]
    pub allow: Vec<String>,

    /// Kill a launched command after SECS seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Target platform of the binaries (linux, macos, windows)
    #[arg(long, global = true, value_name = "PLATFORM")]
    pub platform: Option<Platform>,

    /// Treat a GPU as available
    #[arg(long, global = true)]
    pub gpu: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show registered test binaries
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Run registered tests
    Run {
        /// Canonical test names (default: all registered tests)
        #[arg(value_name = "NAMES")]
        names: Vec<String>,
        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
        /// Stop on first failure
        #[arg(short = 'x', long = "exitfirst")]
        stop_on_fail: bool,
        /// Only run tests whose name contains EXPR
        #[arg(short = 'k', value_name = "EXPR")]
        filter: Option<String>,
        /// Print the commands that would be launched without running them
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the environment overrides applied to launched binaries
    Env,

    /// Check that replicated and sharded training produce the same parameters
    Parity {
        /// Number of simulated ranks
        #[arg(long, default_value_t = 2)]
        world_size: usize,
        /// Seed for model initialization and inputs
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

impl Cli {
    /// Resolve the harness configuration: environment first, then flags.
    pub fn harness_config(&self) -> HarnessConfig {
        self.apply_overrides(HarnessConfig::from_env(&self.repo_root))
    }

    fn apply_overrides(&self, mut config: HarnessConfig) -> HarnessConfig {
        if let Some(platform) = self.platform {
            config = config.with_platform(platform);
        }
        if let Some(dir) = &self.binary_dir {
            config = config.with_binary_dir(dir);
        }
        if let Some(dir) = &self.xml_dir {
            config = config.with_xml_dir(dir);
        }
        for name in &self.allow {
            config = config.with_allowed(name.clone());
        }
        if let Some(secs) = self.timeout {
            config = config.with_timeout((secs > 0).then(|| Duration::from_secs(secs)));
        }
        if self.gpu {
            config = config.with_gpu(true);
        }
        config
    }
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
pub fn execute(cli: Cli) -> CliResult<ExitCode> {
    match &cli.command {
        Command::List { json } => {
            let harness = Harness::new(cli.harness_config())?;
            commands::list_tests(&harness, *json)
        }
        Command::Run {
            names,
            verbose,
            stop_on_fail,
            filter,
            dry_run,
        } => {
            let options = RunOptions {
                stop_on_fail: *stop_on_fail,
                keyword: filter.clone(),
            };
            let mut reporter = ConsoleReporter::new(*verbose);
            if *dry_run {
                let harness = Harness::with_runner(cli.harness_config(), RecordingRunner::new())?;
                let code = commands::run_tests(&harness, names, &options, &mut reporter)?;
                for command in harness.runner().commands() {
                    println!("{}", command);
                }
                Ok(code)
            } else {
                let harness = Harness::new(cli.harness_config())?;
                commands::run_tests(&harness, names, &options, &mut reporter)
            }
        }
        Command::Env => {
            let harness = Harness::new(cli.harness_config())?;
            commands::show_env(&harness)
        }
        Command::Parity { world_size, seed } => commands::run_parity(*world_size, *seed),
    }
}

// ============================================================================
// Tests
// ============================================================================
