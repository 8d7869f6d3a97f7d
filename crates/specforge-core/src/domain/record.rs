//! Compilation records: the durable trail of one module's compilation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Terminal outcome of one module's compilation attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The ambiguity gate returned findings; the loop never ran.
    Ambiguous,
    /// The module's own test suite passed under the core's execution.
    Passed,
    /// The retry budget was exhausted without a passing test run.
    Failed,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Outcome::Ambiguous => "ambiguous",
            Outcome::Passed => "passed",
            Outcome::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Result of one independent test execution.
///
/// Produced by the core's own run of the module's test command, never by
/// the agent's self-report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestResult {
    /// Exit code (0 = success).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl TestResult {
    /// Whether the test run passed.
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }

    /// Combined output, stdout first, for failure summaries.
    pub fn combined_output(&self) -> String {
        let mut out = String::new();
        if !self.stdout.trim().is_empty() {
            out.push_str(self.stdout.trim_end());
        }
        if !self.stderr.trim().is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(self.stderr.trim_end());
        }
        out
    }
}

/// The ambiguity-gate exchange for a module, kept for the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GateExchange {
    /// Exact prompt sent to the agent.
    pub prompt: String,

    /// Full response text received.
    pub response: String,

    /// Rendered findings (empty when the verdict was clear).
    pub findings: Vec<String>,
}

/// One generate/test cycle within a compilation.
///
/// Created at loop entry, sealed when its test run completes, never mutated
/// after sealing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Iteration {
    /// 1-based sequence number within the record.
    pub seq: u32,

    /// Exact prompt sent to the agent.
    pub prompt: String,

    /// Full response text received (empty on transport failure).
    pub response: String,

    /// Files present in the working directory after this cycle,
    /// relative to the module's working directory.
    pub files_written: Vec<String>,

    /// Outcome of the core's own test execution. `None` when no test run
    /// happened (transport failure, or no implementation was produced).
    pub test_result: Option<TestResult>,

    /// Failure summary fed into the next prompt, when one follows.
    pub failure_summary: Option<String>,
}

/// Durable record of one module's compilation attempt.
///
/// Owned exclusively by the compilation loop while it runs; transferred to
/// the artifact store on completion and immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompilationRecord {
    /// Compilation run this record belongs to.
    pub run_id: Uuid,

    /// Name of the compiled module.
    pub module_name: String,

    /// Language tag the module was compiled for.
    pub language: String,

    /// Ambiguity-gate exchange, when the gate ran.
    pub gate: Option<GateExchange>,

    /// Generate/test cycles, in order.
    pub iterations: Vec<Iteration>,

    /// Terminal outcome.
    pub outcome: Outcome,

    /// All files written under the module's working directory, relative.
    pub artifacts: Vec<String>,

    /// Subset of `artifacts` that downstream modules consume as the
    /// dependency-context payload (the implementation sources).
    pub interface_files: Vec<String>,

    /// When compilation of this module started.
    pub started_at: DateTime<Utc>,

    /// When the record was sealed.
    pub finished_at: Option<DateTime<Utc>>,
}

impl CompilationRecord {
    /// Open a record for a module about to be compiled.
    pub fn open(run_id: Uuid, module_name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            run_id,
            module_name: module_name.into(),
            language: language.into(),
            gate: None,
            iterations: Vec::new(),
            outcome: Outcome::Failed,
            artifacts: Vec::new(),
            interface_files: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Seal the record with its terminal outcome.
    pub fn seal(&mut self, outcome: Outcome) {
        self.outcome = outcome;
        self.finished_at = Some(Utc::now());
    }

    /// Number of generate/test cycles performed.
    pub fn iteration_count(&self) -> u32 {
        self.iterations.len() as u32
    }

    /// The last iteration's failure summary, if any.
    pub fn last_failure(&self) -> Option<&str> {
        self.iterations
            .iter()
            .rev()
            .find_map(|it| it.failure_summary.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed_iteration(seq: u32, summary: &str) -> Iteration {
        Iteration {
            seq,
            prompt: format!("prompt {seq}"),
            response: format!("response {seq}"),
            files_written: vec![],
            test_result: Some(TestResult {
                exit_code: 1,
                stdout: String::new(),
                stderr: "assertion failed".to_string(),
                duration_ms: 10,
            }),
            failure_summary: Some(summary.to_string()),
        }
    }

    #[test]
    fn test_test_result_passed() {
        let pass = TestResult {
            exit_code: 0,
            stdout: "2 passed".into(),
            stderr: String::new(),
            duration_ms: 42,
        };
        assert!(pass.passed());

        let fail = TestResult {
            exit_code: 1,
            ..pass.clone()
        };
        assert!(!fail.passed());
    }

    #[test]
    fn test_combined_output_joins_streams() {
        let result = TestResult {
            exit_code: 1,
            stdout: "1 failed\n".into(),
            stderr: "AssertionError\n".into(),
            duration_ms: 5,
        };
        assert_eq!(result.combined_output(), "1 failed\nAssertionError");
    }

    #[test]
    fn test_record_seal_sets_outcome_and_timestamp() {
        let mut record = CompilationRecord::open(Uuid::new_v4(), "calc", "python");
        assert!(record.finished_at.is_none());

        record.seal(Outcome::Passed);
        assert_eq!(record.outcome, Outcome::Passed);
        assert!(record.finished_at.is_some());
    }

    #[test]
    fn test_last_failure_returns_most_recent() {
        let mut record = CompilationRecord::open(Uuid::new_v4(), "calc", "python");
        record.iterations.push(failed_iteration(1, "first failure"));
        record.iterations.push(failed_iteration(2, "second failure"));
        assert_eq!(record.last_failure(), Some("second failure"));
    }

    #[test]
    fn test_record_serde_roundtrip() {
        let mut record = CompilationRecord::open(Uuid::new_v4(), "calc", "python");
        record.iterations.push(failed_iteration(1, "boom"));
        record.seal(Outcome::Failed);

        let json = serde_json::to_string(&record).expect("serialize");
        let back: CompilationRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(record, back);
    }

    #[test]
    fn test_outcome_serde_is_snake_case() {
        assert_eq!(
            serde_json::to_string(&Outcome::Ambiguous).unwrap(),
            "\"ambiguous\""
        );
        assert_eq!(serde_json::to_string(&Outcome::Passed).unwrap(), "\"passed\"");
    }
}
