//! The compilation loop: generate, verify, repair, bounded by a retry
//! budget.
//!
//! The loop is an explicit state machine so each transition (test pass,
//! retries exhausted, transport error) is independently testable:
//!
//! ```text
//! Generating(n) --agent ok, impl present--> Testing(n)
//! Generating(n) --transport error / no impl--> Generating(n+1) | Failed
//! Testing(n)    --tests pass--> Passed
//! Testing(n)    --tests fail--> Generating(n+1) | Failed
//! ```
//!
//! The core's own test execution is authoritative; an agent transcript
//! claiming success is never believed on its own.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agent::Agent;
use crate::cancel::CancelFlag;
use crate::domain::error::ForgeError;
use crate::domain::module::Module;
use crate::domain::record::{CompilationRecord, GateExchange, Iteration, Outcome, TestResult};
use crate::language::LanguageProfile;
use crate::prompt;
use crate::store::DependencyContext;
use crate::testrun::{self, TestRunError};

/// Longest failure excerpt fed back into the next prompt.
const FAILURE_EXCERPT_CHARS: usize = 4_000;

/// Tuning knobs for a compilation run.
#[derive(Debug, Clone)]
pub struct CompileConfig {
    /// Maximum generate/test cycles per module.
    pub max_iterations: u32,

    /// Timeout for each agent call (consumed by agent backends).
    pub agent_timeout: Duration,

    /// Timeout for each independent test execution.
    pub test_timeout: Duration,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            agent_timeout: Duration::from_secs(300),
            test_timeout: Duration::from_secs(120),
        }
    }
}

/// Loop states. `Generating` and `Testing` carry the 1-based iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Generating { iteration: u32 },
    Testing { iteration: u32 },
    Passed,
    Failed,
}

/// Data produced by a generation step, consumed by the matching test step.
struct PendingIteration {
    prompt: String,
    response: String,
    files_written: Vec<String>,
}

/// Drives one module through generate/test cycles against a shared agent.
pub struct CompilationLoop {
    agent: Arc<dyn Agent>,
    config: CompileConfig,
}

impl CompilationLoop {
    pub fn new(agent: Arc<dyn Agent>, config: CompileConfig) -> Self {
        Self { agent, config }
    }

    /// Compile one module in `working_dir`, consuming the dependency
    /// artifacts as prompt context. `gate` is the ambiguity exchange that
    /// admitted the module, kept for the record's audit trail.
    ///
    /// Returns the sealed record; `Err(ForgeError::Cancelled)` when the
    /// run was cancelled between iterations (the partial record is
    /// discarded by the caller, per the cancellation contract).
    pub async fn compile(
        &self,
        run_id: Uuid,
        module: &Module,
        deps: &[DependencyContext],
        gate: Option<GateExchange>,
        working_dir: &Path,
        cancel: &CancelFlag,
    ) -> Result<CompilationRecord, ForgeError> {
        let profile = LanguageProfile::for_tag(&module.language);
        fs::create_dir_all(working_dir).map_err(crate::domain::error::StoreError::Io)?;

        let mut record = CompilationRecord::open(run_id, &module.name, &module.language);
        record.gate = gate;

        let mut state = LoopState::Generating { iteration: 1 };
        let mut previous_failure: Option<String> = None;
        let mut pending: Option<PendingIteration> = None;

        loop {
            match state {
                LoopState::Generating { iteration } => {
                    if cancel.is_cancelled() {
                        return Err(ForgeError::Cancelled);
                    }

                    let prompt = prompt::generation_prompt(
                        module,
                        &profile,
                        deps,
                        previous_failure.as_deref(),
                    );
                    info!(
                        module = %module.name,
                        iteration,
                        max = self.config.max_iterations,
                        "generating"
                    );

                    match self.agent.query(&prompt, Some(working_dir)).await {
                        Err(err) => {
                            // Transport failure consumes one retry.
                            warn!(module = %module.name, iteration, error = %err, "agent transport failure");
                            let summary = format!("agent transport failure: {err}");
                            record.iterations.push(Iteration {
                                seq: iteration,
                                prompt,
                                response: String::new(),
                                files_written: list_files(working_dir)?,
                                test_result: None,
                                failure_summary: Some(summary.clone()),
                            });
                            previous_failure = Some(summary);
                            state = self.next_or_failed(iteration);
                        }
                        Ok(response) => {
                            let files_written = list_files(working_dir)?;
                            let impl_file = profile.impl_file(&module.name);
                            if !working_dir.join(&impl_file).is_file() {
                                let summary =
                                    format!("no implementation produced (expected {impl_file})");
                                record.iterations.push(Iteration {
                                    seq: iteration,
                                    prompt,
                                    response,
                                    files_written,
                                    test_result: None,
                                    failure_summary: Some(summary.clone()),
                                });
                                previous_failure = Some(summary);
                                state = self.next_or_failed(iteration);
                            } else {
                                pending = Some(PendingIteration {
                                    prompt,
                                    response,
                                    files_written,
                                });
                                state = LoopState::Testing { iteration };
                            }
                        }
                    }
                }

                LoopState::Testing { iteration } => {
                    let step = pending.take().expect("testing state always has pending data");
                    let command = profile.test_command(&module.name);
                    debug!(module = %module.name, iteration, command = %command.join(" "), "verifying");

                    let result = match testrun::run_tests(
                        working_dir,
                        &command,
                        self.config.test_timeout,
                    )
                    .await
                    {
                        Ok(result) => result,
                        // Infrastructure failure of the test run: record it
                        // as a failed result so the gate logic stays uniform.
                        Err(err @ TestRunError::Spawn { .. })
                        | Err(err @ TestRunError::Timeout { .. }) => TestResult {
                            exit_code: -1,
                            stdout: String::new(),
                            stderr: err.to_string(),
                            duration_ms: 0,
                        },
                    };

                    if result.passed() {
                        record.iterations.push(Iteration {
                            seq: iteration,
                            prompt: step.prompt,
                            response: step.response,
                            files_written: step.files_written,
                            test_result: Some(result),
                            failure_summary: None,
                        });
                        state = LoopState::Passed;
                    } else {
                        let summary = failure_excerpt(&result);
                        record.iterations.push(Iteration {
                            seq: iteration,
                            prompt: step.prompt,
                            response: step.response,
                            files_written: step.files_written,
                            test_result: Some(result),
                            failure_summary: Some(summary.clone()),
                        });
                        previous_failure = Some(summary);
                        state = self.next_or_failed(iteration);
                    }
                }

                LoopState::Passed => {
                    record.artifacts = list_files(working_dir)?;
                    record.interface_files = vec![profile.impl_file(&module.name)];
                    record.seal(Outcome::Passed);
                    info!(
                        module = %module.name,
                        iterations = record.iteration_count(),
                        "module compiled"
                    );
                    return Ok(record);
                }

                LoopState::Failed => {
                    record.artifacts = list_files(working_dir)?;
                    record.seal(Outcome::Failed);
                    warn!(
                        module = %module.name,
                        iterations = record.iteration_count(),
                        "retry budget exhausted"
                    );
                    return Ok(record);
                }
            }
        }
    }

    fn next_or_failed(&self, iteration: u32) -> LoopState {
        if iteration >= self.config.max_iterations {
            LoopState::Failed
        } else {
            LoopState::Generating {
                iteration: iteration + 1,
            }
        }
    }
}

/// Failure text fed into the next prompt: combined output, tail-truncated.
fn failure_excerpt(result: &TestResult) -> String {
    let combined = result.combined_output();
    if combined.is_empty() {
        return format!("test command exited with code {}", result.exit_code);
    }
    if combined.len() > FAILURE_EXCERPT_CHARS {
        let tail_start = combined.len() - FAILURE_EXCERPT_CHARS;
        // Snap to a char boundary.
        let tail_start = (tail_start..combined.len())
            .find(|&i| combined.is_char_boundary(i))
            .unwrap_or(tail_start);
        format!("[output truncated]\n{}", &combined[tail_start..])
    } else {
        combined
    }
}

/// Files under `dir`, relative, sorted, skipping hidden entries and
/// toolchain litter the agent's environment may leave behind.
fn list_files(dir: &Path) -> Result<Vec<String>, ForgeError> {
    const SKIP: &[&str] = &["__pycache__", "node_modules", "target", ".venv"];

    fn walk(base: &Path, dir: &Path, out: &mut Vec<String>) -> std::io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') || SKIP.contains(&name.as_str()) {
                continue;
            }
            let path = entry.path();
            if path.is_dir() {
                walk(base, &path, out)?;
            } else if let Ok(rel) = path.strip_prefix(base) {
                out.push(rel.to_string_lossy().to_string());
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    if dir.is_dir() {
        walk(dir, dir, &mut files).map_err(crate::domain::error::StoreError::Io)?;
    }
    files.sort();
    Ok(files)
}
