//! Scripted agent fake for deterministic testing.
//!
//! Shipped in the library (not behind `cfg(test)`) so unit tests,
//! integration tests, and downstream crates can drive the pipeline without
//! a real backend.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::error::AgentError;

use super::Agent;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum StubReply {
    /// Return this response text, optionally writing files (relative path,
    /// content) into the working directory first, mimicking a backend
    /// that edits the workspace and then reports.
    Text {
        response: String,
        files: Vec<(String, String)>,
    },

    /// Fail at the transport level.
    Transport(String),
}

impl StubReply {
    /// A plain text reply with no file side effects.
    pub fn text(response: impl Into<String>) -> Self {
        StubReply::Text {
            response: response.into(),
            files: Vec::new(),
        }
    }

    /// A reply that writes files into the working directory.
    pub fn with_files(response: impl Into<String>, files: Vec<(&str, &str)>) -> Self {
        StubReply::Text {
            response: response.into(),
            files: files
                .into_iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
        }
    }
}

/// Deterministic scripted agent.
///
/// Replies are consumed in order; once the script is exhausted, further
/// queries either repeat the final reply (`repeat_last`) or fail as
/// unreachable. Every prompt seen is retained for assertions.
pub struct StubAgent {
    replies: Mutex<VecDeque<StubReply>>,
    prompts: Mutex<Vec<String>>,
    repeat_last: bool,
}

impl StubAgent {
    /// A stub that plays the given replies in order.
    pub fn scripted(replies: Vec<StubReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
            repeat_last: false,
        }
    }

    /// A stub that replays its final reply forever once the script runs out.
    pub fn scripted_repeating(replies: Vec<StubReply>) -> Self {
        Self {
            repeat_last: true,
            ..Self::scripted(replies)
        }
    }

    /// All prompts received so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Number of queries served.
    pub fn query_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Agent for StubAgent {
    async fn query(&self, prompt: &str, working_dir: Option<&Path>) -> Result<String, AgentError> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let reply = {
            let mut replies = self.replies.lock().unwrap();
            if replies.len() == 1 && self.repeat_last {
                replies.front().cloned()
            } else {
                replies.pop_front()
            }
        };

        match reply {
            None => Err(AgentError::Unreachable("stub script exhausted".into())),
            Some(StubReply::Transport(message)) => Err(AgentError::Unreachable(message)),
            Some(StubReply::Text { response, files }) => {
                if let Some(dir) = working_dir {
                    for (rel, content) in &files {
                        let path = dir.join(rel);
                        if let Some(parent) = path.parent() {
                            std::fs::create_dir_all(parent)
                                .map_err(|e| AgentError::Unreachable(e.to_string()))?;
                        }
                        std::fs::write(&path, content)
                            .map_err(|e| AgentError::Unreachable(e.to_string()))?;
                    }
                }
                Ok(response)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replies_play_in_order_then_exhaust() {
        let stub = StubAgent::scripted(vec![StubReply::text("one"), StubReply::text("two")]);
        assert_eq!(stub.query("p1", None).await.unwrap(), "one");
        assert_eq!(stub.query("p2", None).await.unwrap(), "two");
        assert!(matches!(
            stub.query("p3", None).await,
            Err(AgentError::Unreachable(_))
        ));
        assert_eq!(stub.prompts(), vec!["p1", "p2", "p3"]);
    }

    #[tokio::test]
    async fn test_repeating_stub_replays_last_reply() {
        let stub = StubAgent::scripted_repeating(vec![StubReply::text("always")]);
        for _ in 0..3 {
            assert_eq!(stub.query("p", None).await.unwrap(), "always");
        }
        assert_eq!(stub.query_count(), 3);
    }

    #[tokio::test]
    async fn test_files_written_into_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let stub = StubAgent::scripted(vec![StubReply::with_files(
            "done",
            vec![("calc.py", "def add(a, b):\n    return a + b\n")],
        )]);

        stub.query("p", Some(dir.path())).await.unwrap();
        let written = std::fs::read_to_string(dir.path().join("calc.py")).unwrap();
        assert!(written.contains("def add"));
    }

    #[tokio::test]
    async fn test_transport_reply_is_error() {
        let stub = StubAgent::scripted(vec![StubReply::Transport("backend down".into())]);
        let err = stub.query("p", None).await.unwrap_err();
        assert!(matches!(err, AgentError::Unreachable(_)));
    }
}
