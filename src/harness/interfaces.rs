//! Harness I/O boundary interfaces
//!
//! This module defines trait-based abstractions for the two places the harness touches
//! the outside world:
//! - Binary discovery (filesystem scan)
//! - Command execution (subprocess launch + exit code)
//!
//! The default implementations are what the CLI uses. `RecordingRunner` backs
//! `run --dry-run` and the harness tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::process::{Child, Command, ExitStatus};
use std::time::Duration;

use wait_timeout::ChildExt;

use super::discovery::{DiscoveredTest, discover_binaries};
use super::environment::ExecutionEnv;
use super::exec::CommandLine;
use crate::error::HarnessError;
use crate::platform::Platform;

// ============================================================================
// Discovery Interface
// ============================================================================

/// Find test binaries in a build output directory.
pub trait BinaryDiscovery {
    fn discover(&self, dir: &Path, platform: Platform) -> Result<Vec<DiscoveredTest>, HarnessError>;
}

/// Filesystem scan of the immediate children of the binary directory.
pub struct FsDiscovery;

impl BinaryDiscovery for FsDiscovery {
    fn discover(&self, dir: &Path, platform: Platform) -> Result<Vec<DiscoveredTest>, HarnessError> {
        discover_binaries(dir, platform)
    }
}

// ============================================================================
// Execution Interface
// ============================================================================

/// Launch a command with the shaped environment and wait for it.
///
/// Returns the exit code. Turning a non-zero code into an error is the caller's job.
pub trait CommandRunner {
    fn run(&self, command: &CommandLine, env: &ExecutionEnv) -> Result<i32, HarnessError>;
}

/// Real subprocess execution.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, command: &CommandLine, env: &ExecutionEnv) -> Result<i32, HarnessError> {
        if let Some(dir) = &command.output_dir {
            fs::create_dir_all(dir)?;
        }

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .env_clear()
            .envs(env.iter())
            .spawn()
            .map_err(|source| HarnessError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let status = match self.timeout {
            None => child.wait()?,
            Some(limit) => wait_with_timeout(&mut child, limit, command)?,
        };

        // A signal-terminated child has no exit code
        Ok(status.code().unwrap_or(-1))
    }
}

fn wait_with_timeout(child: &mut Child, limit: Duration, command: &CommandLine) -> Result<ExitStatus, HarnessError> {
    let Some(status) = child.wait_timeout(limit)? else {
        tracing::warn!("killing '{}' after {:.1}s", command, limit.as_secs_f64());
        let _ = child.kill();
        // Reap so the killed child does not linger
        let _ = child.wait();
        return Err(HarnessError::Timeout {
            command: command.to_string(),
            timeout: limit,
        });
    };
    Ok(status)
}

/// Runner that records command lines instead of launching them.
///
/// Every command "exits" 0 unless an exit code was registered for its full command line
/// or, failing that, for its program.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    exit_codes: HashMap<String, i32>,
    command_exit_codes: HashMap<String, i32>,
    recorded: RefCell<Vec<String>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make commands whose program is `program` exit with `code`.
    pub fn with_exit_code(mut self, program: impl AsRef<Path>, code: i32) -> Self {
        self.exit_codes.insert(program.as_ref().display().to_string(), code);
        self
    }

    /// Make the exact command line `command` exit with `code`.
    ///
    /// Takes precedence over a code registered for the program.
    pub fn with_command_exit_code(mut self, command: impl Into<String>, code: i32) -> Self {
        self.command_exit_codes.insert(command.into(), code);
        self
    }

    /// Command lines seen so far, in launch order.
    pub fn commands(&self) -> Vec<String> {
        self.recorded.borrow().clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &CommandLine, _env: &ExecutionEnv) -> Result<i32, HarnessError> {
        let line = command.to_string();
        let program = command.program.display().to_string();
        let code = self
            .command_exit_codes
            .get(&line)
            .or_else(|| self.exit_codes.get(&program))
            .copied()
            .unwrap_or(0);
        self.recorded.borrow_mut().push(line);
        Ok(code)
    }
}

#[cfg(all(test, unix))]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::HarnessConfig;
    use std::ffi::OsString;

    fn shell(script: &str) -> CommandLine {
        CommandLine::new("/bin/sh").arg("-c").arg(script)
    }

    fn inherited_env() -> ExecutionEnv {
        ExecutionEnv::inherit(&HarnessConfig::new(".").with_platform(Platform::Linux))
    }

    #[test]
    fn test_process_runner_reports_exit_code() {
        let runner = ProcessRunner::new(None);
        assert_eq!(runner.run(&shell("exit 0"), &inherited_env()).unwrap(), 0);
        assert_eq!(runner.run(&shell("exit 7"), &inherited_env()).unwrap(), 7);
    }

    #[test]
    fn test_process_runner_passes_shaped_env() {
        let env = ExecutionEnv::build(
            vec![(OsString::from("GTEST_RUNNER_MARKER"), OsString::from("shaped"))],
            &HarnessConfig::new(".").with_platform(Platform::Linux),
        );
        let runner = ProcessRunner::new(None);
        let code = runner.run(&shell(r#"test "$GTEST_RUNNER_MARKER" = shaped"#), &env).unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn test_process_runner_times_out() {
        let runner = ProcessRunner::new(Some(Duration::from_millis(200)));
        let started = std::time::Instant::now();
        let err = runner.run(&shell("sleep 5"), &inherited_env()).unwrap_err();
        assert!(matches!(err, HarnessError::Timeout { timeout, .. } if timeout == Duration::from_millis(200)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_process_runner_timeout_returns_early_exit() {
        let runner = ProcessRunner::new(Some(Duration::from_secs(30)));
        let started = std::time::Instant::now();
        assert_eq!(runner.run(&shell("exit 4"), &inherited_env()).unwrap(), 4);
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[test]
    fn test_process_runner_creates_output_dir() {
        let root = tempfile::tempdir().unwrap();
        let reports = root.path().join("xml").join("test.test_gtest");
        let cmd = shell("exit 0").with_output_dir(&reports);
        assert_eq!(ProcessRunner::new(None).run(&cmd, &inherited_env()).unwrap(), 0);
        assert!(reports.is_dir());
    }

    #[test]
    fn test_recording_runner_skips_output_dir() {
        let root = tempfile::tempdir().unwrap();
        let reports = root.path().join("xml");
        let cmd = CommandLine::new("/b/test_ok").with_output_dir(&reports);
        assert_eq!(RecordingRunner::new().run(&cmd, &ExecutionEnv::default()).unwrap(), 0);
        assert!(!reports.exists());
    }

    #[test]
    fn test_process_runner_spawn_failure() {
        let runner = ProcessRunner::new(None);
        let err = runner
            .run(&CommandLine::new("/nonexistent/test_missing"), &inherited_env())
            .unwrap_err();
        assert!(matches!(err, HarnessError::Spawn { .. }));
    }

    #[test]
    fn test_recording_runner_uses_registered_codes() {
        let runner = RecordingRunner::new().with_exit_code("/b/test_bad", 2);
        let env = ExecutionEnv::default();
        assert_eq!(runner.run(&CommandLine::new("/b/test_ok"), &env).unwrap(), 0);
        assert_eq!(runner.run(&CommandLine::new("/b/test_bad"), &env).unwrap(), 2);
        assert_eq!(runner.commands(), vec!["/b/test_ok", "/b/test_bad"]);
    }

    #[test]
    fn test_recording_runner_command_line_code_wins() {
        let runner = RecordingRunner::new()
            .with_exit_code("python3", 5)
            .with_command_exit_code("python3 setup.py shutdown", 1);
        let env = ExecutionEnv::default();
        let setup = CommandLine::new("python3").arg("setup.py").arg("setup");
        let shutdown = CommandLine::new("python3").arg("setup.py").arg("shutdown");
        assert_eq!(runner.run(&setup, &env).unwrap(), 5);
        assert_eq!(runner.run(&shutdown, &env).unwrap(), 1);
    }
}
