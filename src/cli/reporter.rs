//! Test session reporting (pytest-style)
//!
//! ## TestReporter Trait
//!
//! The `run` command uses a `TestReporter` trait to separate reporting from
//! execution. Custom output formats (JSON, TAP, etc.) only need to implement the trait.

use std::time::Duration;

/// Trait for reporting test execution results.
pub trait TestReporter {
    /// Called once the set of tests to run is known
    fn on_collection_complete(&mut self, test_count: usize);

    /// Called when a test run begins
    fn on_test_start(&mut self, name: &str);

    /// Called when a test completes
    fn on_test_complete(&mut self, name: &str, result: &TestResult);

    /// Called when all tests have completed
    fn on_run_complete(&mut self, summary: &TestSummary);
}

/// Result of running a single test
#[derive(Debug, Clone, PartialEq)]
pub enum TestResult {
    Passed(Duration),
    Failed(Duration, String),
    Skipped(String),
}

/// Summary of test run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration: Duration,
}

impl TestSummary {
    pub fn record(&mut self, result: &TestResult) {
        self.total += 1;
        match result {
            TestResult::Passed(_) => self.passed += 1,
            TestResult::Failed(_, _) => self.failed += 1,
            TestResult::Skipped(_) => self.skipped += 1,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// e.g. `2 passed, 1 skipped`
    pub fn counts_line(&self) -> String {
        let mut parts = Vec::new();
        if self.passed > 0 {
            parts.push(format!("{} passed", self.passed));
        }
        if self.failed > 0 {
            parts.push(format!("{} failed", self.failed));
        }
        if self.skipped > 0 {
            parts.push(format!("{} skipped", self.skipped));
        }
        if parts.is_empty() {
            "no tests ran".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Default console reporter
#[derive(Default)]
pub struct ConsoleReporter {
    pub verbose: bool,
    failures: Vec<(String, String)>,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            failures: Vec::new(),
        }
    }
}

impl TestReporter for ConsoleReporter {
    fn on_collection_complete(&mut self, test_count: usize) {
        if test_count == 0 {
            eprintln!("No tests collected");
            return;
        }
        println!("\x1b[1m=================== test session starts ===================\x1b[0m");
        println!("collected {} item(s)", test_count);
        println!();
    }

    fn on_test_start(&mut self, name: &str) {
        if self.verbose {
            print!("{} ... ", name);
        }
    }

    fn on_test_complete(&mut self, name: &str, result: &TestResult) {
        let status = match result {
            TestResult::Passed(d) => {
                if self.verbose {
                    format!("\x1b[32mPASSED\x1b[0m ({:.0}ms)", d.as_millis())
                } else {
                    "\x1b[32mPASSED\x1b[0m".to_string()
                }
            }
            TestResult::Failed(d, _) => {
                if self.verbose {
                    format!("\x1b[31mFAILED\x1b[0m ({:.0}ms)", d.as_millis())
                } else {
                    "\x1b[31mFAILED\x1b[0m".to_string()
                }
            }
            TestResult::Skipped(reason) => {
                if reason.is_empty() {
                    "\x1b[33mSKIPPED\x1b[0m".to_string()
                } else {
                    format!("\x1b[33mSKIPPED\x1b[0m ({})", reason)
                }
            }
        };

        if self.verbose {
            println!("{}", status);
        } else {
            println!("{} {}", name, status);
        }

        if let TestResult::Failed(_, error) = result {
            self.failures.push((name.to_string(), error.clone()));
        }
    }

    fn on_run_complete(&mut self, summary: &TestSummary) {
        if !self.failures.is_empty() {
            println!();
            println!("\x1b[1;31m=================== FAILURES ===================\x1b[0m");
            for (name, error) in &self.failures {
                println!();
                println!("\x1b[1m___________ {} ___________\x1b[0m", name);
                println!();
                println!("    {}", error);
            }
        }

        println!();
        let summary_color = if summary.is_success() { "\x1b[1;32m" } else { "\x1b[1;31m" };
        println!(
            "{}=================== {} in {:.2}s ===================\x1b[0m",
            summary_color,
            summary.counts_line(),
            summary.duration.as_secs_f64()
        );
    }
}
