//! Test execution boundary.
//!
//! Executes a language profile's test command inside a module's working
//! directory and captures the result. This is the authoritative check the
//! loop trusts; the agent's own claims about test success are never
//! consulted.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::process::Command;

use crate::domain::record::TestResult;

/// Infrastructure failures of a test execution, distinct from a failing
/// test run (which is a normal `TestResult` with a non-zero exit code).
#[derive(Debug, Error)]
pub enum TestRunError {
    #[error("failed to spawn test command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("test run timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

/// Run a test command in `working_dir`, capturing output, bounded by
/// `timeout`.
pub async fn run_tests(
    working_dir: &Path,
    command: &[String],
    timeout: Duration,
) -> Result<TestResult, TestRunError> {
    assert!(!command.is_empty(), "test command must not be empty");
    let start = Instant::now();

    let child = Command::new(&command[0])
        .args(&command[1..])
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| TestRunError::Spawn {
            command: command.join(" "),
            source,
        })?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| TestRunError::Timeout {
            seconds: timeout.as_secs(),
        })?
        .map_err(|source| TestRunError::Spawn {
            command: command.join(" "),
            source,
        })?;

    Ok(TestResult {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_passing_command_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_tests(
            dir.path(),
            &cmd(&["echo", "all tests passed"]),
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        assert!(result.passed());
        assert_eq!(result.exit_code, 0);
        assert!(result.stdout.contains("all tests passed"));
    }

    #[tokio::test]
    async fn test_failing_command_is_a_result_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_tests(dir.path(), &cmd(&["false"]), Duration::from_secs(10))
            .await
            .unwrap();

        assert!(!result.passed());
        assert_ne!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("run_tests.sh"), "exit 0\n").unwrap();
        let result = run_tests(
            dir.path(),
            &cmd(&["sh", "run_tests.sh"]),
            Duration::from_secs(10),
        )
        .await
        .unwrap();
        assert!(result.passed());
    }

    #[tokio::test]
    async fn test_missing_command_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_tests(
            dir.path(),
            &cmd(&["specforge-no-such-tool"]),
            Duration::from_secs(10),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TestRunError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_timeout_is_infrastructure_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_tests(
            dir.path(),
            &cmd(&["sleep", "5"]),
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TestRunError::Timeout { .. }));
    }
}
