//! Command-line construction and checked execution

use std::fmt;
use std::path::{Path, PathBuf};

use super::environment::ExecutionEnv;
use super::interfaces::CommandRunner;
use crate::error::HarnessError;

/// Timestamp format for report file names (sortable, second granularity).
pub const REPORT_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// A program plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Directory the program writes into; the runner creates it before launch
    pub output_dir: Option<PathBuf>,
}

impl CommandLine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            output_dir: None,
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Outcome of a completed subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub exit_code: i32,
    /// Report the binary was asked to write, if XML output was enabled
    pub xml_report: Option<PathBuf>,
}

/// Current local time as a report timestamp.
pub fn report_timestamp() -> String {
    chrono::Local::now().format(REPORT_TIMESTAMP_FORMAT).to_string()
}

/// Path of the XML report for one invocation.
pub fn xml_report_path(report_dir: &Path, test_name: &str, timestamp: &str) -> PathBuf {
    report_dir.join(format!("TEST-{}-{}.xml", test_name, timestamp))
}

/// Build the command line for a test binary.
///
/// Order is fixed: the executable, the XML output flag (when a report path is given),
/// then any extra flags.
pub fn binary_command(binary: &Path, xml_report: Option<&Path>, extra_flags: &[String]) -> CommandLine {
    let mut cmd = CommandLine::new(binary);
    if let Some(report) = xml_report {
        cmd = cmd.arg(format!("--gtest_output=xml:{}", report.display()));
        if let Some(dir) = report.parent() {
            cmd = cmd.with_output_dir(dir);
        }
    }
    cmd.args(extra_flags.iter().cloned())
}

/// Launch `cmd` and fail unless it exits 0.
pub fn run_cmd<R>(runner: &R, cmd: &CommandLine, env: &ExecutionEnv) -> Result<RunResult, HarnessError>
where
    R: CommandRunner + ?Sized,
{
    tracing::info!("[gtest runner] {}", cmd);
    let exit_code = runner.run(cmd, env)?;
    if exit_code != 0 {
        return Err(HarnessError::Execution {
            command: cmd.to_string(),
            code: exit_code,
        });
    }
    Ok(RunResult {
        exit_code,
        xml_report: None,
    })
}

/// Run a test binary, directing it to write an XML report when `report_dir` is set.
///
/// The report timestamp is taken here, at invocation time. Creating the report
/// directory is left to the runner, so recording runners touch nothing on disk.
pub fn run_binary<R>(
    runner: &R,
    env: &ExecutionEnv,
    binary: &Path,
    test_name: &str,
    report_dir: Option<&Path>,
    extra_flags: &[String],
) -> Result<RunResult, HarnessError>
where
    R: CommandRunner + ?Sized,
{
    let xml_report = report_dir.map(|dir| xml_report_path(dir, test_name, &report_timestamp()));

    let cmd = binary_command(binary, xml_report.as_deref(), extra_flags);
    let result = run_cmd(runner, &cmd, env)?;
    Ok(RunResult { xml_report, ..result })
}
