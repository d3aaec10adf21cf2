//! End-to-end harness tests over a scratch build directory

use std::fs;
use std::path::{Path, PathBuf};

use gtest_runner::harness::exec::CommandLine;
use gtest_runner::harness::filter::GtestFilter;
use gtest_runner::harness::interfaces::RecordingRunner;
use gtest_runner::harness::registry::Invocation;
use gtest_runner::harness::specialized::SKIP_REASON_CUDA_WINDOWS;
use gtest_runner::{Harness, HarnessConfig, HarnessError, Platform, TestOutcome};

/// `<root>/build/bin` populated with empty files.
fn scratch_build(files: &[&str]) -> (tempfile::TempDir, PathBuf) {
    let root = tempfile::tempdir().unwrap();
    let bin = root.path().join("build").join("bin");
    fs::create_dir_all(&bin).unwrap();
    for name in files {
        fs::write(bin.join(name), b"").unwrap();
    }
    (root, bin)
}

fn linux_config(root: &Path) -> HarnessConfig {
    HarnessConfig::new(root).with_platform(Platform::Linux)
}

// =============================================================================
// Discovery and registration
// =============================================================================

#[test]
fn registers_prefixed_and_unprefixed_binaries() {
    let (root, bin) = scratch_build(&["test_foo", "bar_test", "libtorch.so"]);
    let config = linux_config(root.path()).with_allow_list(["test_foo", "test_bar_test"]);

    let harness = Harness::with_runner(config, RecordingRunner::new()).unwrap();

    assert_eq!(harness.registry().names(), vec!["test_bar_test", "test_foo"]);
    let foo = harness.registry().get("test_foo").unwrap();
    assert_eq!(foo.invocation, Invocation::Generic(bin.join("test_foo")));
}

#[test]
fn non_binary_files_are_never_registered() {
    let (root, _) = scratch_build(&["test_foo", "notatest.txt"]);
    let config = linux_config(root.path()).with_allow_list(["test_foo", "test_bar_test"]);

    let harness = Harness::with_runner(config, RecordingRunner::new()).unwrap();

    assert_eq!(harness.registry().names(), vec!["test_foo"]);
}

#[test]
fn discovered_tests_outside_allow_list_are_hidden() {
    let (root, _) = scratch_build(&["test_foo", "test_jit"]);
    let harness = Harness::with_runner(linux_config(root.path()), RecordingRunner::new()).unwrap();

    assert_eq!(harness.registry().names(), vec!["test_jit"]);
    assert!(matches!(harness.run("test_foo"), Err(HarnessError::UnknownTest(name)) if name == "test_foo"));
    assert!(harness.runner().commands().is_empty());
}

#[test]
fn missing_build_directory_is_a_configuration_error() {
    let root = tempfile::tempdir().unwrap();
    let err = Harness::with_runner(linux_config(root.path()), RecordingRunner::new())
        .err()
        .unwrap();
    assert!(matches!(err, HarnessError::Configuration { .. }));
    assert!(err.to_string().ends_with("does not exist, this test must run from a build checkout"));
}

#[test]
fn rocm_configuration_registers_nothing() {
    let root = tempfile::tempdir().unwrap();
    let config = linux_config(root.path()).with_native_tests_disabled(true);
    let harness = Harness::with_runner(config, RecordingRunner::new()).unwrap();
    assert!(harness.registry().is_empty());
}

// =============================================================================
// Generic execution
// =============================================================================

#[cfg(unix)]
mod process {
    use super::*;
    use gtest_runner::harness::interfaces::ProcessRunner;
    use std::os::unix::fs::PermissionsExt;

    fn write_script(dir: &Path, name: &str, exit_code: i32) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\nexit {}\n", exit_code)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn harness_with(bin_setup: impl FnOnce(&Path)) -> (tempfile::TempDir, Harness) {
        let (root, bin) = scratch_build(&[]);
        bin_setup(&bin);
        let config = linux_config(root.path()).with_allowed("test_ok").with_allowed("test_bad");
        let harness = Harness::build(
            config.clone(),
            &gtest_runner::harness::interfaces::FsDiscovery,
            ProcessRunner::new(None),
            gtest_runner::harness::environment::ExecutionEnv::inherit(&config),
        )
        .unwrap();
        (root, harness)
    }

    #[test]
    fn zero_exit_passes() {
        let (_root, harness) = harness_with(|bin| {
            write_script(bin, "test_ok", 0);
        });
        assert_eq!(harness.run("test_ok").unwrap(), TestOutcome::Passed);
    }

    #[test]
    fn nonzero_exit_reports_the_command_line() {
        let mut script = PathBuf::new();
        let (_root, harness) = harness_with(|bin| {
            script = write_script(bin, "test_bad", 1);
        });

        let err = harness.run("test_bad").unwrap_err();

        let expected = CommandLine::new(&script).to_string();
        assert_eq!(err.exit_code(), Some(1));
        assert_eq!(
            err.to_string(),
            format!("Command '{}' failed with exit code: 1", expected)
        );
    }
}

#[test]
fn xml_report_flag_precedes_extra_flags() {
    let (root, bin) = scratch_build(&["test_foo"]);
    let reports = root.path().join("reports");
    let config = linux_config(root.path())
        .with_allow_list(["test_foo"])
        .with_xml_dir(&reports);
    let harness = Harness::with_runner(config, RecordingRunner::new()).unwrap();

    harness.run("test_foo").unwrap();

    let commands = harness.runner().commands();
    assert_eq!(commands.len(), 1);
    let prefix = format!(
        "{} --gtest_output=xml:{}",
        bin.join("test_foo").display(),
        reports.join("test.test_gtest").join("TEST-test_foo-").display()
    );
    assert!(commands[0].starts_with(&prefix), "{}", commands[0]);
    assert!(commands[0].ends_with(".xml"));
    // Recording only: nothing is created on disk
    assert!(!reports.exists());
}

// =============================================================================
// Filter construction
// =============================================================================

#[test]
fn plain_build_has_no_filter_flag() {
    let filter = GtestFilter::for_jit("linux-focal-py3-clang", Platform::Linux);
    assert_eq!(filter.expression(), "*");
    assert_eq!(filter.to_flag(), None);
}

#[test]
fn accelerator_build_excludes_accelerator_group() {
    let filter = GtestFilter::for_jit("linux-focal-cuda12.1-py3", Platform::Linux);
    assert_eq!(filter.expression(), "*-*CUDA");
}

#[test]
fn jit_command_lines_in_order() {
    let (root, bin) = scratch_build(&["test_jit"]);
    let config = linux_config(root.path())
        .with_build_environment("linux-cuda")
        .with_interpreter("python3");
    let harness = Harness::with_runner(config, RecordingRunner::new()).unwrap();

    assert_eq!(harness.run("test_jit").unwrap(), TestOutcome::Passed);

    let script = root.path().join("test").join("cpp").join("jit").join("tests_setup.py");
    assert_eq!(
        harness.runner().commands(),
        vec![
            format!("python3 {} setup", script.display()),
            format!("{} --gtest_filter=*-*CUDA", bin.join("test_jit").display()),
            format!("python3 {} shutdown", script.display()),
        ]
    );
}

// =============================================================================
// Skip combination
// =============================================================================

#[test]
fn windows_gpu_skips_without_launching_anything() {
    let (root, _) = scratch_build(&["test_jit.exe"]);
    let config = HarnessConfig::new(root.path())
        .with_platform(Platform::Windows)
        .with_binary_dir(root.path().join("build").join("bin"))
        .with_gpu(true);
    let harness = Harness::with_runner(config, RecordingRunner::new()).unwrap();

    let outcome = harness.run("test_jit").unwrap();

    assert_eq!(outcome, TestOutcome::Skipped(SKIP_REASON_CUDA_WINDOWS.to_string()));
    assert!(harness.runner().commands().is_empty());
}
