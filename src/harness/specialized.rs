//! Specialized test handlers
//!
//! A handler replaces the generic run-and-check behavior for one canonical name. To add
//! one, extend [`HandlerId`] and dispatch it in [`run_handler`]; registration picks it up
//! automatically.

use std::path::Path;

use super::TestOutcome;
use super::environment::ExecutionEnv;
use super::exec::{CommandLine, run_binary, run_cmd};
use super::filter::GtestFilter;
use super::interfaces::CommandRunner;
use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::platform::Platform;

pub const JIT_TEST_NAME: &str = "test_jit";

pub const SKIP_REASON_CUDA_WINDOWS: &str = "CUDA environment doesn't work out of the box yet";

/// Identifies a specialized handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HandlerId {
    /// JIT suite: external setup, filtered run, external teardown
    Jit,
}

impl HandlerId {
    pub const ALL: &'static [HandlerId] = &[HandlerId::Jit];

    /// Handler bound to a canonical name, if any.
    pub fn for_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|h| h.test_name() == name)
    }

    pub fn test_name(self) -> &'static str {
        match self {
            HandlerId::Jit => JIT_TEST_NAME,
        }
    }
}

/// Everything a handler may touch.
pub struct HandlerContext<'a, R: CommandRunner + ?Sized> {
    pub config: &'a HarnessConfig,
    pub env: &'a ExecutionEnv,
    pub runner: &'a R,
    pub binary: &'a Path,
}

pub fn run_handler<R>(id: HandlerId, ctx: &HandlerContext<'_, R>) -> Result<TestOutcome, HarnessError>
where
    R: CommandRunner + ?Sized,
{
    match id {
        HandlerId::Jit => run_jit(ctx),
    }
}

/// Why the JIT suite cannot run under `config`, if it cannot.
pub fn jit_skip_reason(config: &HarnessConfig) -> Option<&'static str> {
    if config.platform == Platform::Windows && config.gpu_available {
        return Some(SKIP_REASON_CUDA_WINDOWS);
    }
    None
}

/// Run the JIT suite between its setup and shutdown scripts.
///
/// Once setup has succeeded, shutdown is attempted on every path. When both the run and
/// shutdown fail, the run error is returned and the shutdown error is logged.
fn run_jit<R>(ctx: &HandlerContext<'_, R>) -> Result<TestOutcome, HarnessError>
where
    R: CommandRunner + ?Sized,
{
    if let Some(reason) = jit_skip_reason(ctx.config) {
        tracing::info!("skipping {}: {}", JIT_TEST_NAME, reason);
        return Ok(TestOutcome::Skipped(reason.to_string()));
    }

    let script = ctx.config.jit_setup_script();
    let setup = script_command(&ctx.config.interpreter, &script, "setup");
    let shutdown = script_command(&ctx.config.interpreter, &script, "shutdown");

    let flags: Vec<String> = GtestFilter::for_jit(&ctx.config.build_environment, ctx.config.platform)
        .to_flag()
        .into_iter()
        .collect();

    run_cmd(ctx.runner, &setup, ctx.env)?;

    let run = run_binary(
        ctx.runner,
        ctx.env,
        ctx.binary,
        JIT_TEST_NAME,
        ctx.config.xml_report_dir().as_deref(),
        &flags,
    );
    let teardown = run_cmd(ctx.runner, &shutdown, ctx.env);

    match (run, teardown) {
        (Ok(_), Ok(_)) => Ok(TestOutcome::Passed),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(_)) => Err(e),
        (Err(e), Err(teardown_err)) => {
            tracing::error!("{} shutdown also failed: {}", JIT_TEST_NAME, teardown_err);
            Err(e)
        }
    }
}

fn script_command(interpreter: &str, script: &Path, directive: &str) -> CommandLine {
    CommandLine::new(interpreter)
        .arg(script.display().to_string())
        .arg(directive)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::harness::interfaces::RecordingRunner;

    const BINARY: &str = "/repo/build/bin/test_jit";
    const SHUTDOWN: &str = "python3 /repo/test/cpp/jit/tests_setup.py shutdown";

    fn config() -> HarnessConfig {
        HarnessConfig::new("/repo")
            .with_platform(Platform::Linux)
            .with_interpreter("python3")
    }

    fn run_with(config: &HarnessConfig, runner: &RecordingRunner) -> Result<TestOutcome, HarnessError> {
        let env = ExecutionEnv::default();
        let ctx = HandlerContext {
            config,
            env: &env,
            runner,
            binary: Path::new(BINARY),
        };
        run_handler(HandlerId::Jit, &ctx)
    }

    #[test]
    fn test_for_name() {
        assert_eq!(HandlerId::for_name("test_jit"), Some(HandlerId::Jit));
        assert_eq!(HandlerId::for_name("test_api"), None);
    }

    #[test]
    fn test_setup_run_shutdown_sequence() {
        let runner = RecordingRunner::new();
        let outcome = run_with(&config(), &runner).unwrap();
        assert_eq!(outcome, TestOutcome::Passed);
        assert_eq!(
            runner.commands(),
            vec![
                "python3 /repo/test/cpp/jit/tests_setup.py setup".to_string(),
                BINARY.to_string(),
                "python3 /repo/test/cpp/jit/tests_setup.py shutdown".to_string(),
            ]
        );
    }

    #[test]
    fn test_cuda_build_passes_filter() {
        let runner = RecordingRunner::new();
        run_with(&config().with_build_environment("linux-cuda11.3"), &runner).unwrap();
        assert_eq!(runner.commands()[1], format!("{} --gtest_filter=*-*CUDA", BINARY));
    }

    #[test]
    fn test_windows_gpu_skips_everything() {
        let runner = RecordingRunner::new();
        let config = config().with_platform(Platform::Windows).with_gpu(true);
        let outcome = run_with(&config, &runner).unwrap();
        assert_eq!(outcome, TestOutcome::Skipped(SKIP_REASON_CUDA_WINDOWS.to_string()));
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn test_gpu_off_windows_still_runs() {
        let runner = RecordingRunner::new();
        let outcome = run_with(&config().with_gpu(true), &runner).unwrap();
        assert_eq!(outcome, TestOutcome::Passed);
        assert_eq!(runner.commands().len(), 3);
    }

    #[test]
    fn test_setup_failure_is_fatal() {
        let runner = RecordingRunner::new().with_exit_code("python3", 1);
        let err = run_with(&config(), &runner).unwrap_err();
        assert_eq!(err.exit_code(), Some(1));
        assert_eq!(runner.commands().len(), 1);
    }

    #[test]
    fn test_shutdown_runs_after_binary_failure() {
        let runner = RecordingRunner::new().with_exit_code(BINARY, 1);
        let err = run_with(&config(), &runner).unwrap_err();
        match err {
            HarnessError::Execution { command, code } => {
                assert_eq!(command, BINARY);
                assert_eq!(code, 1);
            }
            other => panic!("expected execution error, got {other:?}"),
        }
        let commands = runner.commands();
        assert_eq!(commands.len(), 3);
        assert!(commands[2].ends_with("shutdown"));
    }

    #[test]
    fn test_shutdown_failure_after_pass_is_reported() {
        let runner = RecordingRunner::new().with_command_exit_code(SHUTDOWN, 3);
        let err = run_with(&config(), &runner).unwrap_err();
        match err {
            HarnessError::Execution { command, code } => {
                assert_eq!(command, SHUTDOWN);
                assert_eq!(code, 3);
            }
            other => panic!("expected execution error, got {other:?}"),
        }
        assert_eq!(runner.commands().len(), 3);
    }

    #[test]
    fn test_run_error_wins_when_shutdown_also_fails() {
        let runner = RecordingRunner::new()
            .with_exit_code(BINARY, 1)
            .with_command_exit_code(SHUTDOWN, 3);
        let err = run_with(&config(), &runner).unwrap_err();
        match err {
            HarnessError::Execution { command, code } => {
                assert_eq!(command, BINARY);
                assert_eq!(code, 1);
            }
            other => panic!("expected execution error, got {other:?}"),
        }
        assert_eq!(runner.commands().len(), 3);
    }
}
