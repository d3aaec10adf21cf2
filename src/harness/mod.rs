//! Binary test harness
//!
//! ## Modules
//!
//! - `discovery` - scan the binary directory and derive canonical names
//! - `registry` - canonical name → invocation mapping
//! - `environment` - shaped, read-only child environment
//! - `exec` - command-line construction and checked execution
//! - `filter` - gtest filter expressions
//! - `specialized` - handlers that replace the generic invocation
//! - `interfaces` - discovery/execution traits and default implementations
//!
//! ## Lifecycle
//!
//! [`Harness::new`] resolves the configuration, shapes the environment, scans the binary
//! directory and builds the registry. After that the harness is immutable; [`Harness::run`]
//! launches one test at a time and blocks until it finishes.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod discovery;
pub mod environment;
pub mod exec;
pub mod filter;
pub mod interfaces;
pub mod registry;
pub mod specialized;

use crate::config::HarnessConfig;
use crate::error::HarnessError;

use environment::ExecutionEnv;
use interfaces::{BinaryDiscovery, CommandRunner, FsDiscovery, ProcessRunner};
use registry::{Invocation, RegisteredTest, Registry};
use specialized::HandlerContext;

/// Non-failing result of running a test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    Passed,
    /// Not run; the configuration is known to be incompatible
    Skipped(String),
}

/// Discovered, allow-listed test binaries plus everything needed to launch them.
pub struct Harness<R: CommandRunner = ProcessRunner> {
    config: HarnessConfig,
    env: ExecutionEnv,
    registry: Registry,
    runner: R,
}

impl Harness<ProcessRunner> {
    /// Build a harness that launches real subprocesses.
    pub fn new(config: HarnessConfig) -> Result<Self, HarnessError> {
        let runner = ProcessRunner::new(config.timeout);
        Self::with_runner(config, runner)
    }
}

impl<R: CommandRunner> Harness<R> {
    /// Build a harness over the filesystem and inherited environment with a custom runner.
    pub fn with_runner(config: HarnessConfig, runner: R) -> Result<Self, HarnessError> {
        let env = ExecutionEnv::inherit(&config);
        Self::build(config, &FsDiscovery, runner, env)
    }

    /// Build a harness from explicit parts.
    ///
    /// ## Errors
    ///
    /// Returns [`HarnessError::Configuration`] if the binary directory does not exist,
    /// unless the configuration never produces native tests, in which case the harness
    /// is built with an empty registry.
    pub fn build(
        config: HarnessConfig,
        discovery: &dyn BinaryDiscovery,
        runner: R,
        env: ExecutionEnv,
    ) -> Result<Self, HarnessError> {
        if config.native_tests_disabled {
            tracing::info!("native tests disabled for this configuration; nothing to register");
            return Ok(Self {
                config,
                env,
                registry: Registry::default(),
                runner,
            });
        }

        let dir = config.resolved_binary_dir();
        if !dir.is_dir() {
            return Err(HarnessError::Configuration { path: dir });
        }

        let discovered = discovery.discover(&dir, config.platform)?;
        let discovered_count = discovered.len();
        let registry = Registry::build(discovered, &config.allow_list);
        tracing::info!(
            dir = %dir.display(),
            discovered = discovered_count,
            registered = registry.len(),
            "harness ready"
        );

        Ok(Self {
            config,
            env,
            registry,
            runner,
        })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn env(&self) -> &ExecutionEnv {
        &self.env
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Registered tests in name order.
    pub fn tests(&self) -> impl Iterator<Item = &RegisteredTest> {
        self.registry.iter()
    }

    /// Run one registered test by canonical name.
    ///
    /// ## Errors
    ///
    /// - [`HarnessError::UnknownTest`] if `name` is not registered
    /// - [`HarnessError::Execution`] if any launched command exits non-zero
    /// - [`HarnessError::Timeout`] / [`HarnessError::Spawn`] from the runner
    pub fn run(&self, name: &str) -> Result<TestOutcome, HarnessError> {
        let test = self
            .registry
            .get(name)
            .ok_or_else(|| HarnessError::UnknownTest(name.to_string()))?;

        match &test.invocation {
            Invocation::Generic(binary) => {
                let report_dir = self.config.xml_report_dir();
                exec::run_binary(&self.runner, &self.env, binary, &test.name, report_dir.as_deref(), &[])?;
                Ok(TestOutcome::Passed)
            }
            Invocation::Specialized(handler) => {
                let ctx = HandlerContext {
                    config: &self.config,
                    env: &self.env,
                    runner: &self.runner,
                    binary: &test.binary,
                };
                specialized::run_handler(*handler, &ctx)
            }
        }
    }
}
