//! Agent gateway: the single capability the pipeline needs from a
//! code-producing backend.
//!
//! Concrete backends are variants behind the [`Agent`] trait:
//! - [`CliAgent`]: subprocess, prompt on stdin, stdout as response
//! - [`HttpAgent`]: JSON POST to a remote endpoint
//! - [`StubAgent`]: scripted responses for deterministic tests
//!
//! The pipeline never inspects which backend is in use. Transport failures
//! surface as [`AgentError`]; a well-formed but semantically negative
//! response (ambiguity findings, failing tests described in prose) is
//! normal pipeline data, returned as `Ok`.

mod cli;
mod http;
mod stub;

use std::path::Path;

use async_trait::async_trait;

use crate::domain::error::AgentError;

pub use cli::CliAgent;
pub use http::HttpAgent;
pub use stub::{StubAgent, StubReply};

/// A code-producing/reasoning backend.
///
/// One synchronous-from-the-caller's-view operation: submit a prompt plus
/// an optional working directory, block until the text response returns.
/// No streaming contract is required.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Send a prompt and return the agent's final response text.
    ///
    /// When `working_dir` is given, the agent executes there and may write
    /// files into it directly.
    async fn query(&self, prompt: &str, working_dir: Option<&Path>) -> Result<String, AgentError>;
}
