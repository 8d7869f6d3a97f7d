//! Ambiguity gate: the hard pass that precedes any code generation.
//!
//! One agent query per module; the reply is parsed into a verdict. Any
//! non-empty findings list halts compilation for the module; this is a
//! gate, not a warning. Transport failures propagate as [`AgentError`]
//! and are never folded into a verdict.

use std::sync::Arc;

use tracing::debug;

use crate::agent::Agent;
use crate::domain::error::AgentError;
use crate::domain::module::Module;
use crate::domain::record::GateExchange;
use crate::domain::verdict::{AmbiguityVerdict, Finding};
use crate::prompt;
use crate::store::DependencyContext;

/// Sentinel the agent replies with when the spec is implementable as written.
const NO_AMBIGUITIES: &str = "NO_AMBIGUITIES";

/// Stateless ambiguity checker over a shared agent handle.
pub struct AmbiguityGate {
    agent: Arc<dyn Agent>,
}

impl AmbiguityGate {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self { agent }
    }

    /// Check one module against the interfaces its direct dependencies
    /// actually expose. Returns the verdict plus the raw exchange for the
    /// compilation record's audit trail.
    pub async fn check(
        &self,
        module: &Module,
        dependency_context: &[DependencyContext],
    ) -> Result<(AmbiguityVerdict, GateExchange), AgentError> {
        let prompt = prompt::ambiguity_prompt(module, dependency_context);
        let response = self.agent.query(&prompt, None).await?;
        let verdict = parse_verdict(&response);
        debug!(
            module = %module.name,
            clear = verdict.is_clear(),
            "ambiguity check finished"
        );

        let exchange = GateExchange {
            prompt,
            findings: verdict.rendered_findings(),
            response,
        };
        Ok((verdict, exchange))
    }
}

/// Parse an agent reply into a verdict.
///
/// Recognizes the `NO_AMBIGUITIES` sentinel anywhere in the reply;
/// otherwise collects `AMBIGUITY:` blocks with `Location:` / `Issue:` /
/// `Suggestions:` lines (`-` bullets). A reply with neither sentinel nor
/// any parseable block is treated as clear: the gate only blocks on
/// explicit findings.
pub fn parse_verdict(response: &str) -> AmbiguityVerdict {
    if response.contains(NO_AMBIGUITIES) {
        return AmbiguityVerdict::Clear;
    }

    let mut findings: Vec<Finding> = Vec::new();
    let mut current: Option<Finding> = None;
    let mut in_suggestions = false;

    for line in response.lines() {
        let line = line.trim();

        if line.starts_with("AMBIGUITY:") {
            if let Some(finding) = current.take() {
                findings.push(finding);
            }
            current = Some(Finding::new("", ""));
            in_suggestions = false;
        } else if let Some(finding) = current.as_mut() {
            if let Some(rest) = line.strip_prefix("Location:") {
                finding.location = rest.trim().to_string();
                in_suggestions = false;
            } else if let Some(rest) = line.strip_prefix("Issue:") {
                finding.issue = rest.trim().to_string();
                in_suggestions = false;
            } else if line.starts_with("Suggestions:") {
                in_suggestions = true;
            } else if let Some(rest) = line.strip_prefix('-') {
                if in_suggestions || !rest.trim().is_empty() {
                    finding.suggestions.push(rest.trim().to_string());
                }
            }
        }
    }
    if let Some(finding) = current.take() {
        findings.push(finding);
    }

    // Drop malformed blocks that never stated an issue.
    findings.retain(|f| !f.issue.is_empty());

    if findings.is_empty() {
        AmbiguityVerdict::Clear
    } else {
        AmbiguityVerdict::Ambiguous { findings }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{StubAgent, StubReply};

    #[test]
    fn test_sentinel_parses_as_clear() {
        assert!(parse_verdict("NO_AMBIGUITIES").is_clear());
        assert!(parse_verdict("Everything checks out.\nNO_AMBIGUITIES\n").is_clear());
    }

    #[test]
    fn test_single_block_parses_location_issue_suggestions() {
        let response = "AMBIGUITY:\n\
                        Location: purpose\n\
                        Issue: rounding behavior unspecified\n\
                        Severity: error\n\
                        Suggestions:\n\
                        - state the rounding mode\n\
                        - add a test for 0.5\n";
        match parse_verdict(response) {
            AmbiguityVerdict::Ambiguous { findings } => {
                assert_eq!(findings.len(), 1);
                assert_eq!(findings[0].location, "purpose");
                assert_eq!(findings[0].issue, "rounding behavior unspecified");
                assert_eq!(findings[0].suggestions.len(), 2);
            }
            AmbiguityVerdict::Clear => panic!("expected findings"),
        }
    }

    #[test]
    fn test_multiple_blocks_collected_in_order() {
        let response = "AMBIGUITY:\nIssue: first\nAMBIGUITY:\nIssue: second\n";
        match parse_verdict(response) {
            AmbiguityVerdict::Ambiguous { findings } => {
                assert_eq!(findings[0].issue, "first");
                assert_eq!(findings[1].issue, "second");
            }
            AmbiguityVerdict::Clear => panic!("expected findings"),
        }
    }

    #[test]
    fn test_block_without_issue_is_dropped() {
        let response = "AMBIGUITY:\nLocation: somewhere\n";
        assert!(parse_verdict(response).is_clear());
    }

    #[test]
    fn test_prose_without_blocks_is_clear() {
        assert!(parse_verdict("The spec looks fine to me.").is_clear());
    }

    #[tokio::test]
    async fn test_gate_records_exchange() {
        let agent = Arc::new(StubAgent::scripted(vec![StubReply::text(
            "AMBIGUITY:\nIssue: operation set unspecified\n",
        )]));
        let gate = AmbiguityGate::new(agent.clone());
        let module = Module::new("calc", "does math");

        let (verdict, exchange) = gate.check(&module, &[]).await.unwrap();
        assert!(!verdict.is_clear());
        assert_eq!(exchange.findings, vec!["operation set unspecified"]);
        assert!(exchange.prompt.contains("Ambiguity check"));
        assert!(exchange.response.contains("operation set unspecified"));
        // One agent query, no working directory involved.
        assert_eq!(agent.query_count(), 1);
    }

    #[tokio::test]
    async fn test_gate_transport_failure_is_not_a_verdict() {
        let agent = Arc::new(StubAgent::scripted(vec![StubReply::Transport(
            "backend down".into(),
        )]));
        let gate = AmbiguityGate::new(agent);
        let module = Module::new("calc", "does math");

        let err = gate.check(&module, &[]).await.unwrap_err();
        assert!(matches!(err, AgentError::Unreachable(_)));
    }
}
