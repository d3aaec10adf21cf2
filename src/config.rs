//! Harness configuration
//!
//! Every value the harness reads from the outside world is collected here once. The
//! process environment is only consulted by [`HarnessConfig::from_env`]; everything
//! downstream receives the resolved struct.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::platform::Platform;

/// Tests exposed as runnable cases unless the caller extends the list.
pub const DEFAULT_ALLOW_LIST: &[&str] = &["test_jit"];

/// Directory (under the XML root) gtest reports are written to.
pub const XML_REPORT_SUBDIR: &str = "test.test_gtest";

pub const ENV_SAVE_XML: &str = "TEST_SAVE_XML";
pub const ENV_BUILD_ENVIRONMENT: &str = "BUILD_ENVIRONMENT";
pub const ENV_IN_CI: &str = "CI";
pub const ENV_WITH_ROCM: &str = "TEST_WITH_ROCM";
pub const ENV_GPU: &str = "GTEST_RUNNER_GPU";
pub const ENV_TIMEOUT_SECS: &str = "GTEST_RUNNER_TIMEOUT_SECS";
pub const ENV_RUNTIME_DIR: &str = "GTEST_RUNNER_RUNTIME_DIR";
pub const ENV_INTERPRETER: &str = "PYTHON";

/// Resolved harness configuration
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Platform the binaries were built for
    pub platform: Platform,
    /// Root of the source checkout
    pub repo_root: PathBuf,
    /// Explicit binary directory; when unset it is derived from the repo root
    pub binary_dir: Option<PathBuf>,
    /// Canonical names exposed as runnable cases
    pub allow_list: BTreeSet<String>,
    /// Root directory for gtest XML reports (`TEST_SAVE_XML`)
    pub xml_dir: Option<PathBuf>,
    /// Build environment marker (`BUILD_ENVIRONMENT`)
    pub build_environment: String,
    /// Whether a GPU is usable by the binaries
    pub gpu_available: bool,
    /// Configuration that never produces native tests (ROCm); the harness is a no-op
    pub native_tests_disabled: bool,
    /// Running under CI
    pub in_ci: bool,
    /// Per-subprocess timeout; `None` waits indefinitely
    pub timeout: Option<Duration>,
    /// Interpreter used for setup/teardown scripts
    pub interpreter: String,
    /// Location of the installed runtime (holds `lib/` and, in CI on macOS, `bin/`)
    pub runtime_dir: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        let platform = Platform::current();
        Self {
            platform,
            repo_root: PathBuf::from("."),
            binary_dir: None,
            allow_list: DEFAULT_ALLOW_LIST.iter().map(|s| s.to_string()).collect(),
            xml_dir: None,
            build_environment: String::new(),
            gpu_available: false,
            native_tests_disabled: false,
            in_ci: false,
            timeout: None,
            interpreter: default_interpreter(platform).to_string(),
            runtime_dir: None,
        }
    }
}

impl HarnessConfig {
    /// Create a config with default settings rooted at `repo_root`
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            ..Self::default()
        }
    }

    /// Build a config from the process environment.
    pub fn from_env(repo_root: impl Into<PathBuf>) -> Self {
        Self::from_lookup(repo_root, |key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup(repo_root: impl Into<PathBuf>, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::new(repo_root);

        config.xml_dir = lookup(ENV_SAVE_XML).filter(|v| !v.is_empty()).map(PathBuf::from);
        config.build_environment = lookup(ENV_BUILD_ENVIRONMENT).unwrap_or_default();
        config.in_ci = lookup(ENV_IN_CI).is_some_and(|v| !v.is_empty());
        config.native_tests_disabled = lookup(ENV_WITH_ROCM).is_some_and(|v| is_truthy(&v));
        config.gpu_available = lookup(ENV_GPU).is_some_and(|v| is_truthy(&v));
        config.runtime_dir = lookup(ENV_RUNTIME_DIR).filter(|v| !v.is_empty()).map(PathBuf::from);

        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            match secs.trim().parse::<u64>() {
                Ok(0) => {}
                Ok(n) => config.timeout = Some(Duration::from_secs(n)),
                Err(_) => tracing::warn!("ignoring non-numeric {}={}", ENV_TIMEOUT_SECS, secs),
            }
        }
        if let Some(interpreter) = lookup(ENV_INTERPRETER).filter(|v| !v.is_empty()) {
            config.interpreter = interpreter;
        }

        config
    }

    /// Directory scanned for test binaries.
    ///
    /// An explicit `binary_dir` wins. Otherwise CI runs on macOS use the installed
    /// runtime's `bin/`, CI runs on Windows use the nested windows build tree, and
    /// everything else uses `<repo>/build/bin`.
    pub fn resolved_binary_dir(&self) -> PathBuf {
        if let Some(dir) = &self.binary_dir {
            return dir.clone();
        }
        if self.in_ci {
            match self.platform {
                Platform::MacOs => {
                    if let Some(runtime) = &self.runtime_dir {
                        return runtime.join("bin");
                    }
                }
                Platform::Windows => {
                    return self
                        .repo_root
                        .join("build")
                        .join("win_tmp")
                        .join("build")
                        .join("torch")
                        .join("bin");
                }
                Platform::Linux => {}
            }
        }
        self.repo_root.join("build").join("bin")
    }

    /// Directory gtest XML reports land in, if reporting is enabled.
    pub fn xml_report_dir(&self) -> Option<PathBuf> {
        self.xml_dir.as_ref().map(|dir| dir.join(XML_REPORT_SUBDIR))
    }

    /// Script driving setup/teardown for the JIT suite.
    pub fn jit_setup_script(&self) -> PathBuf {
        self.repo_root.join("test").join("cpp").join("jit").join("tests_setup.py")
    }

    /// Set the target platform
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Set an explicit binary directory
    pub fn with_binary_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.binary_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Replace the allow list
    pub fn with_allow_list<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow_list = names.into_iter().map(Into::into).collect();
        self
    }

    /// Add a name to the allow list
    pub fn with_allowed(mut self, name: impl Into<String>) -> Self {
        self.allow_list.insert(name.into());
        self
    }

    /// Enable XML reports under `dir`
    pub fn with_xml_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.xml_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set the build environment marker
    pub fn with_build_environment(mut self, build_environment: impl Into<String>) -> Self {
        self.build_environment = build_environment.into();
        self
    }

    /// Declare GPU availability
    pub fn with_gpu(mut self, available: bool) -> Self {
        self.gpu_available = available;
        self
    }

    /// Set the per-subprocess timeout
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the setup/teardown interpreter
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Set the installed runtime location
    pub fn with_runtime_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.runtime_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Mark the configuration as one that never produces native tests
    pub fn with_native_tests_disabled(mut self, disabled: bool) -> Self {
        self.native_tests_disabled = disabled;
        self
    }

    /// Mark the run as happening under CI
    pub fn with_ci(mut self, in_ci: bool) -> Self {
        self.in_ci = in_ci;
        self
    }
}

fn default_interpreter(platform: Platform) -> &'static str {
    match platform {
        Platform::Windows => "python",
        Platform::Linux | Platform::MacOs => "python3",
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
