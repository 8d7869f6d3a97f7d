//! Ambiguity verdicts produced by the gate.

use serde::{Deserialize, Serialize};

/// One ambiguity found in a module specification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Finding {
    /// Where in the spec the ambiguity lives (may be empty).
    #[serde(default)]
    pub location: String,

    /// What is ambiguous.
    pub issue: String,

    /// Concrete suggestions for resolving it.
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl Finding {
    pub fn new(location: impl Into<String>, issue: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            issue: issue.into(),
            suggestions: Vec::new(),
        }
    }
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.location.is_empty() {
            write!(f, "{}", self.issue)?;
        } else {
            write!(f, "{}: {}", self.location, self.issue)?;
        }
        for suggestion in &self.suggestions {
            write!(f, "\n  - {suggestion}")?;
        }
        Ok(())
    }
}

/// Verdict of the ambiguity gate for one module.
///
/// Produced once per module per compilation attempt and consumed
/// immediately; it survives only inside the compilation record's log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum AmbiguityVerdict {
    /// The module specification is implementable as written.
    Clear,
    /// Correctness-relevant ambiguities block compilation.
    Ambiguous { findings: Vec<Finding> },
}

impl AmbiguityVerdict {
    pub fn is_clear(&self) -> bool {
        matches!(self, AmbiguityVerdict::Clear)
    }

    /// Findings rendered to the verbatim strings surfaced to the caller.
    pub fn rendered_findings(&self) -> Vec<String> {
        match self {
            AmbiguityVerdict::Clear => Vec::new(),
            AmbiguityVerdict::Ambiguous { findings } => {
                findings.iter().map(|f| f.to_string()).collect()
            }
        }
    }
}
