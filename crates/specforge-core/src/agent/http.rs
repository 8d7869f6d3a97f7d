//! HTTP-backed agent: POST the prompt to a remote generation endpoint.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::domain::error::AgentError;

use super::Agent;

/// Agent backed by an HTTP endpoint.
///
/// The request body is `{"prompt": ..., "working_directory": ...}` and the
/// response body text is returned verbatim. The endpoint is expected to
/// share a filesystem with this process when working directories are used
/// (e.g. a local sidecar service).
pub struct HttpAgent {
    endpoint: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpAgent {
    /// Create an HTTP agent with a per-call timeout.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::Unreachable(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
            timeout_secs: timeout.as_secs(),
        })
    }
}

#[async_trait]
impl Agent for HttpAgent {
    async fn query(&self, prompt: &str, working_dir: Option<&Path>) -> Result<String, AgentError> {
        let body = json!({
            "prompt": prompt,
            "working_directory": working_dir.map(|p| p.display().to_string()),
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgentError::Timeout {
                        seconds: self.timeout_secs,
                    }
                } else {
                    AgentError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status();
        debug!(endpoint = %self.endpoint, status = %status, "agent call finished");

        if !status.is_success() {
            return Err(AgentError::Unreachable(format!(
                "endpoint {} returned {}",
                self.endpoint, status
            )));
        }

        response
            .text()
            .await
            .map_err(|e| AgentError::Unreachable(e.to_string()))
            .map(|t| t.trim().to_string())
    }
}
