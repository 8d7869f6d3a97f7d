//! Caller-facing result shapes for a compilation run.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of a spec- or infrastructure-level error in a module's result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The submitted set contains a dependency cycle.
    Cycle,
    /// A dependency is not present in the submitted set.
    MissingDependency,
    /// The agent backend failed at the transport level outside the loop.
    Transport,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::Cycle => "cycle",
            FailureKind::MissingDependency => "missing_dependency",
            FailureKind::Transport => "transport",
        };
        write!(f, "{s}")
    }
}

/// Terminal status of one module, as reported to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModuleStatus {
    /// The ambiguity gate found correctness-relevant ambiguities.
    Ambiguous { findings: Vec<String> },

    /// Compilation succeeded; the module's own tests pass.
    Compiled { files: Vec<String>, iterations: u32 },

    /// The retry budget was exhausted, or a dependency blocked this module.
    Failed { iterations: u32, last_failure: String },

    /// A spec- or infrastructure-level error outside the loop.
    Error { kind: FailureKind, detail: String },
}

impl ModuleStatus {
    pub fn is_compiled(&self) -> bool {
        matches!(self, ModuleStatus::Compiled { .. })
    }

    /// One-line human description used by the CLI summary.
    pub fn describe(&self) -> String {
        match self {
            ModuleStatus::Ambiguous { findings } => {
                format!("ambiguous ({} finding(s))", findings.len())
            }
            ModuleStatus::Compiled { files, iterations } => {
                format!("compiled in {iterations} iteration(s), {} file(s)", files.len())
            }
            ModuleStatus::Failed {
                iterations,
                last_failure,
            } => {
                let first_line = last_failure.lines().next().unwrap_or("");
                format!("failed after {iterations} iteration(s): {first_line}")
            }
            ModuleStatus::Error { kind, detail } => format!("error ({kind}): {detail}"),
        }
    }
}

/// Per-module entry in a pipeline report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleReport {
    /// Module name.
    pub module: String,

    /// Terminal status.
    #[serde(flatten)]
    pub status: ModuleStatus,
}

/// Result of one whole compilation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineReport {
    /// Run ID shared by every record persisted during this run.
    pub run_id: Uuid,

    /// Per-module results: attempted modules in compilation order,
    /// followed by modules excluded for spec-level errors.
    pub modules: Vec<ModuleReport>,

    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,

    /// Whether the run was cancelled before completing.
    pub cancelled: bool,
}

impl PipelineReport {
    /// Whether every module reached `compiled`.
    pub fn all_compiled(&self) -> bool {
        !self.cancelled && self.modules.iter().all(|m| m.status.is_compiled())
    }

    /// Number of modules that compiled.
    pub fn compiled_count(&self) -> usize {
        self.modules
            .iter()
            .filter(|m| m.status.is_compiled())
            .count()
    }

    /// Look up one module's status by name.
    pub fn status_of(&self, module: &str) -> Option<&ModuleStatus> {
        self.modules
            .iter()
            .find(|m| m.module == module)
            .map(|m| &m.status)
    }
}
