//! Test binary discovery and canonical naming

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::HarnessError;
use crate::platform::Platform;

/// Substring a file name must contain to be considered a test binary.
pub const TEST_MARKER: &str = "test";

/// Prefix every canonical test name carries.
pub const CANONICAL_PREFIX: &str = "test_";

/// A test executable found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredTest {
    /// Canonical `test_*` name
    pub name: String,
    /// Path to the executable
    pub path: PathBuf,
}

/// Derive the canonical name for an executable file name.
///
/// A name that already starts with `test_` keeps it and loses the platform executable
/// suffix (`test_jit.exe` becomes `test_jit`). Any other name gets `test_` prepended to
/// the whole file name, suffix included (`bar_test` becomes `test_bar_test`, and
/// `api_test.exe` on Windows becomes `test_api_test.exe`).
pub fn canonical_name(file_name: &str, platform: Platform) -> String {
    if !file_name.starts_with(CANONICAL_PREFIX) {
        return format!("{}{}", CANONICAL_PREFIX, file_name);
    }
    let suffix = platform.exe_suffix();
    if suffix.is_empty() {
        return file_name.to_string();
    }
    file_name.strip_suffix(suffix).unwrap_or(file_name).to_string()
}

/// Whether a file name is a test candidate on `platform`.
///
/// On Windows anything without the `.exe` suffix is skipped outright.
pub fn is_candidate(file_name: &str, platform: Platform) -> bool {
    if !file_name.contains(TEST_MARKER) {
        return false;
    }
    match platform {
        Platform::Windows => file_name.ends_with(platform.exe_suffix()),
        Platform::Linux | Platform::MacOs => true,
    }
}

/// Scan the immediate children of `dir` for test binaries.
///
/// Entries are visited in file-name order, so when two files normalize to the same
/// canonical name the first one wins.
pub fn discover_binaries(dir: &Path, platform: Platform) -> Result<Vec<DiscoveredTest>, HarnessError> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for path in entries {
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            tracing::debug!("skipping non-UTF-8 file name {}", path.display());
            continue;
        };
        if !is_candidate(file_name, platform) {
            continue;
        }

        let name = canonical_name(file_name, platform);
        if !seen.insert(name.clone()) {
            tracing::warn!(
                "{} also maps to canonical name '{}'; keeping the first match",
                path.display(),
                name
            );
            continue;
        }

        found.push(DiscoveredTest { name, path });
    }

    tracing::debug!(dir = %dir.display(), count = found.len(), "discovered test binaries");
    Ok(found)
}
