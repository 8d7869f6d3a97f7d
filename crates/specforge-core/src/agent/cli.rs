//! Subprocess-backed agent: pipe the prompt to a CLI tool's stdin and take
//! its stdout as the response.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::domain::error::AgentError;

use super::Agent;

/// Agent backed by a command-line tool (e.g. `claude`, or a containerized
/// wrapper). The command is a `Vec<String>` whose first element is the
/// executable; remaining elements are passed as arguments.
pub struct CliAgent {
    command: Vec<String>,
    timeout: Duration,
}

impl CliAgent {
    /// Create a CLI agent. `command` must be non-empty.
    pub fn new(command: Vec<String>, timeout: Duration) -> Self {
        assert!(!command.is_empty(), "agent command must not be empty");
        Self { command, timeout }
    }

    /// The configured command line, for diagnostics.
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

#[async_trait]
impl Agent for CliAgent {
    async fn query(&self, prompt: &str, working_dir: Option<&Path>) -> Result<String, AgentError> {
        let exe = &self.command[0];
        let args = &self.command[1..];

        let mut cmd = Command::new(exe);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| AgentError::Spawn {
            command: self.command_line(),
            source,
        })?;

        // Feed the prompt on stdin, then close it so the tool sees EOF.
        // A broken pipe means the tool exited without reading the prompt;
        // its exit status decides what that was, so don't fail here.
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(source) = stdin.write_all(prompt.as_bytes()).await {
                if source.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(AgentError::Spawn {
                        command: self.command_line(),
                        source,
                    });
                }
            }
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| AgentError::Timeout {
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|source| AgentError::Spawn {
                command: self.command_line(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let code = output.status.code().unwrap_or(-1);
        debug!(command = %self.command_line(), exit_code = code, "agent call finished");

        // A non-zero exit with usable output is a semantic response (the
        // tool may exit non-zero after reporting failing tests in prose);
        // only an empty one is a transport failure.
        if !output.status.success() && stdout.is_empty() {
            return Err(AgentError::Exit {
                code,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(command: &[&str]) -> CliAgent {
        CliAgent::new(
            command.iter().map(|s| s.to_string()).collect(),
            Duration::from_secs(10),
        )
    }

    #[tokio::test]
    async fn test_query_returns_stdout() {
        // `cat` echoes the prompt back, standing in for a real backend.
        let response = agent(&["cat"]).query("hello agent", None).await.unwrap();
        assert_eq!(response, "hello agent");
    }

    #[tokio::test]
    async fn test_query_runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let response = agent(&["pwd"])
            .query("", Some(dir.path()))
            .await
            .unwrap();
        let reported = std::fs::canonicalize(response.trim()).unwrap();
        let expected = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(reported, expected);
    }

    #[tokio::test]
    async fn test_missing_executable_is_spawn_error() {
        let err = agent(&["specforge-no-such-binary"])
            .query("hi", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_nonzero_exit_without_output_is_transport_error() {
        let err = agent(&["false"]).query("hi", None).await.unwrap_err();
        assert!(matches!(err, AgentError::Exit { .. }));
    }

    #[tokio::test]
    async fn test_nonzero_exit_with_output_is_a_response() {
        let response = agent(&["sh", "-c", "echo tests failed; exit 1"])
            .query("hi", None)
            .await
            .unwrap();
        assert_eq!(response, "tests failed");
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        let slow = CliAgent::new(
            vec!["sleep".to_string(), "5".to_string()],
            Duration::from_millis(100),
        );
        let err = slow.query("hi", None).await.unwrap_err();
        assert!(matches!(err, AgentError::Timeout { .. }));
    }
}
