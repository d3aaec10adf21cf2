//! Harness error types

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while building the harness or running a test case.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The environment is not a usable build checkout.
    #[error("{} does not exist, this test must run from a build checkout", .path.display())]
    Configuration { path: PathBuf },

    /// A launched command exited non-zero.
    #[error("Command '{command}' failed with exit code: {code}")]
    Execution { command: String, code: i32 },

    /// A launched command outlived the configured timeout and was killed.
    #[error("Command '{command}' timed out after {}s", .timeout.as_secs_f64())]
    Timeout { command: String, timeout: Duration },

    /// The command could not be started at all.
    #[error("failed to launch '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no registered test named '{0}'")]
    UnknownTest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// Exit code carried by an execution failure, if this is one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            HarnessError::Execution { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_message_contains_command_and_code() {
        let err = HarnessError::Execution {
            command: "/build/bin/test_jit --gtest_filter=*-*CUDA".to_string(),
            code: 3,
        };
        assert_eq!(
            err.to_string(),
            "Command '/build/bin/test_jit --gtest_filter=*-*CUDA' failed with exit code: 3"
        );
        assert_eq!(err.exit_code(), Some(3));
    }

    #[test]
    fn test_configuration_message_names_path() {
        let err = HarnessError::Configuration {
            path: PathBuf::from("/repo/build/bin"),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("/repo/build/bin does not exist"));
        assert_eq!(err.exit_code(), None);
    }

    #[test]
    fn test_timeout_message() {
        let err = HarnessError::Timeout {
            command: "slow".to_string(),
            timeout: Duration::from_secs(2),
        };
        assert_eq!(err.to_string(), "Command 'slow' timed out after 2s");
    }
}
