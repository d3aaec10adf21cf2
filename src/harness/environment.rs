//! Execution environment shaping
//!
//! The environment handed to every child process is computed once, from the inherited
//! variables plus platform-specific search-path overrides, and never changes afterwards.
//! The runner's own process environment is left untouched.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use crate::config::HarnessConfig;
use crate::platform::Platform;

/// Library search variable consulted by the macOS dynamic loader.
pub const DYLD_LIBRARY_PATH: &str = "DYLD_LIBRARY_PATH";

pub const PATH: &str = "PATH";

/// Search-path entries prepended to `PATH` on Windows.
///
/// Test binaries need the runtime DLLs on `PATH` to start at all; which ones a binary
/// needs can be checked with `dumpbin.exe /dependents <binary>`. `libiomp5.dll` is
/// required by most of them.
pub const WINDOWS_SEARCH_PATHS: &[&str] = &[
    r"C:\Jenkins\Miniconda3\Library\bin",
    r"C:\actions-runner\_work\pytorch\pytorch\build\bin",
    r"C:\actions-runner\_work\pytorch\pytorch\build\win_tmp\build\bin",
    r"C:\actions-runner\_work\pytorch\pytorch\build\win_tmp\build\lib",
    r"C:\actions-runner\_work\pytorch\pytorch\build\lib",
    r"C:\Jenkins\Miniconda3",
    r"C:\actions-runner\bin",
    r"C:\Program Files\NVIDIA^ GPU^ Computing^ Toolkit\CUDA\v11.3\bin",
    r"C:\actions-runner\_work\pytorch\pytorch\build\lib.win-amd64-3.8\torch\bin",
    r"C:\actions-runner\_work\pytorch\pytorch\build\lib.win-amd64-3.8\torch\lib",
    r"C:\actions-runner\_work\pytorch\pytorch\torch\bin",
    r"C:\actions-runner\_work\pytorch\pytorch\torch\lib",
];

/// Immutable variable map passed to every launched process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionEnv {
    vars: BTreeMap<OsString, OsString>,
    /// Keys rewritten by shaping, in the order they were applied
    overridden: Vec<OsString>,
}

impl ExecutionEnv {
    /// Shape the current process environment.
    pub fn inherit(config: &HarnessConfig) -> Self {
        Self::build(std::env::vars_os(), config)
    }

    /// Shape an explicit set of inherited variables.
    pub fn build<I>(inherited: I, config: &HarnessConfig) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let mut env = Self {
            vars: inherited.into_iter().collect(),
            overridden: Vec::new(),
        };

        match config.platform {
            Platform::MacOs => match &config.runtime_dir {
                Some(runtime) => {
                    let lib = runtime_lib_dir(runtime);
                    env.prepend(DYLD_LIBRARY_PATH, &[lib.into_os_string()], config.platform);
                }
                None => tracing::debug!("runtime dir unknown; {} left as inherited", DYLD_LIBRARY_PATH),
            },
            Platform::Windows => {
                let entries: Vec<OsString> = WINDOWS_SEARCH_PATHS.iter().map(OsString::from).collect();
                env.prepend(PATH, &entries, config.platform);
            }
            Platform::Linux => {}
        }

        env
    }

    pub fn get(&self, key: &str) -> Option<&OsStr> {
        self.vars.get(OsStr::new(key)).map(OsString::as_os_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.vars.iter().map(|(k, v)| (k.as_os_str(), v.as_os_str()))
    }

    /// Variables changed by shaping, with their final values.
    pub fn overrides(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.overridden
            .iter()
            .filter_map(|k| self.vars.get(k).map(|v| (k.as_os_str(), v.as_os_str())))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Prepend `entries` to a path-list variable.
    ///
    /// Windows variable names are case-insensitive, so an inherited `Path` is updated in
    /// place rather than shadowed by a second `PATH`.
    fn prepend(&mut self, name: &str, entries: &[OsString], platform: Platform) {
        let key = self.resolve_key(name, platform);
        let sep = platform.path_list_separator().to_string();

        let mut value = OsString::new();
        for (i, entry) in entries.iter().enumerate() {
            if i > 0 {
                value.push(&sep);
            }
            value.push(entry);
        }
        if let Some(existing) = self.vars.get(&key).filter(|v| !v.is_empty()) {
            value.push(&sep);
            value.push(existing);
        }

        self.vars.insert(key.clone(), value);
        if !self.overridden.contains(&key) {
            self.overridden.push(key);
        }
    }

    fn resolve_key(&self, name: &str, platform: Platform) -> OsString {
        if platform == Platform::Windows {
            let existing = self
                .vars
                .keys()
                .find(|k| k.to_str().is_some_and(|s| s.eq_ignore_ascii_case(name)));
            if let Some(key) = existing {
                return key.clone();
            }
        }
        OsString::from(name)
    }
}

/// Library directory of an installed runtime.
pub fn runtime_lib_dir(runtime_dir: &Path) -> PathBuf {
    runtime_dir.join("lib")
}
