//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::time::Instant;

use serde_json::json;

use crate::harness::interfaces::CommandRunner;
use crate::harness::{Harness, TestOutcome};

use super::reporter::{TestReporter, TestResult, TestSummary};
use super::{CliError, CliResult, ExitCode};

// ============================================================================
// list
// ============================================================================

/// Registered tests as a JSON array of `{name, path, kind}`.
pub fn list_json<R: CommandRunner>(harness: &Harness<R>) -> serde_json::Value {
    let tests: Vec<serde_json::Value> = harness
        .tests()
        .map(|t| {
            json!({
                "name": t.name,
                "path": t.binary.display().to_string(),
                "kind": t.invocation.kind(),
            })
        })
        .collect();
    serde_json::Value::Array(tests)
}

/// One aligned `name  kind  path` line per registered test.
pub fn list_lines<R: CommandRunner>(harness: &Harness<R>) -> Vec<String> {
    let width = harness.tests().map(|t| t.name.len()).max().unwrap_or(0);
    harness
        .tests()
        .map(|t| {
            format!(
                "{:<width$}  {:<11}  {}",
                t.name,
                t.invocation.kind(),
                t.binary.display(),
                width = width
            )
        })
        .collect()
}

pub fn list_tests<R: CommandRunner>(harness: &Harness<R>, json: bool) -> CliResult<ExitCode> {
    if json {
        let rendered = serde_json::to_string_pretty(&list_json(harness))
            .map_err(|e| CliError::failure(format!("Error serializing test list: {}", e)))?;
        println!("{}", rendered);
        return Ok(ExitCode::SUCCESS);
    }

    if harness.registry().is_empty() {
        println!("No tests registered");
        return Ok(ExitCode::SUCCESS);
    }
    for line in list_lines(harness) {
        println!("{}", line);
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// run
// ============================================================================

/// Options for a `run` session.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Stop after the first failing test
    pub stop_on_fail: bool,
    /// Only run tests whose name contains this keyword
    pub keyword: Option<String>,
}

/// Pick the tests to run: the requested names (all registered when empty), narrowed by
/// the keyword.
///
/// ## Errors
///
/// Fails without running anything if a requested name is not registered.
pub fn select_tests<R: CommandRunner>(
    harness: &Harness<R>,
    names: &[String],
    keyword: Option<&str>,
) -> CliResult<Vec<String>> {
    let unknown: Vec<&str> = names
        .iter()
        .map(String::as_str)
        .filter(|n| !harness.registry().contains(n))
        .collect();
    if !unknown.is_empty() {
        let registered = harness.registry().names();
        return Err(CliError::failure(format!(
            "Error: unknown test(s): {}\nRegistered: {}",
            unknown.join(", "),
            if registered.is_empty() {
                "(none)".to_string()
            } else {
                registered.join(", ")
            }
        )));
    }

    let selected: Vec<String> = if names.is_empty() {
        harness.registry().names().into_iter().map(str::to_string).collect()
    } else {
        names.to_vec()
    };

    Ok(selected
        .into_iter()
        .filter(|name| keyword.is_none_or(|k| name.contains(k)))
        .collect())
}

/// Run the selected tests one at a time, reporting each.
pub fn run_tests<R: CommandRunner>(
    harness: &Harness<R>,
    names: &[String],
    options: &RunOptions,
    reporter: &mut dyn TestReporter,
) -> CliResult<ExitCode> {
    let start_time = Instant::now();
    let selected = select_tests(harness, names, options.keyword.as_deref())?;

    reporter.on_collection_complete(selected.len());

    let mut summary = TestSummary::default();
    for name in &selected {
        reporter.on_test_start(name);
        let started = Instant::now();
        let result = match harness.run(name) {
            Ok(TestOutcome::Passed) => TestResult::Passed(started.elapsed()),
            Ok(TestOutcome::Skipped(reason)) => TestResult::Skipped(reason),
            Err(e) => {
                tracing::debug!(test = %name, "test failed: {}", e);
                TestResult::Failed(started.elapsed(), e.to_string())
            }
        };
        reporter.on_test_complete(name, &result);
        summary.record(&result);

        if options.stop_on_fail && matches!(result, TestResult::Failed(..)) {
            break;
        }
    }

    summary.duration = start_time.elapsed();
    reporter.on_run_complete(&summary);

    if summary.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

// ============================================================================
// env
// ============================================================================

/// `KEY=VALUE` for every variable the harness changed.
pub fn env_lines<R: CommandRunner>(harness: &Harness<R>) -> Vec<String> {
    harness
        .env()
        .overrides()
        .map(|(k, v)| format!("{}={}", k.to_string_lossy(), v.to_string_lossy()))
        .collect()
}

pub fn show_env<R: CommandRunner>(harness: &Harness<R>) -> CliResult<ExitCode> {
    println!("platform: {}", harness.config().platform);
    println!("binary dir: {}", harness.config().resolved_binary_dir().display());
    match harness.config().xml_report_dir() {
        Some(dir) => println!("xml reports: {}", dir.display()),
        None => println!("xml reports: disabled"),
    }

    let lines = env_lines(harness);
    if lines.is_empty() {
        println!("no environment overrides");
    } else {
        for line in lines {
            println!("{}", line);
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// parity
// ============================================================================

pub fn run_parity(world_size: usize, seed: u64) -> CliResult<ExitCode> {
    let config = shard_parity::ScenarioConfig {
        world_size,
        seed,
        ..shard_parity::ScenarioConfig::default()
    };

    match shard_parity::check_equivalence(&config, shard_parity::Tolerance::HALF) {
        Ok(report) => {
            println!(
                "\x1b[32m✓\x1b[0m replicated and sharded parameters match ({} parameters, {} elements, world size {}, max abs diff {:e})",
                report.parameters, report.elements, world_size, report.max_abs_diff
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Err(CliError::failure(format!("\x1b[31m✗\x1b[0m parity check failed: {}", e))),
    }
}

// ============================================================================
// Tests
// ============================================================================
