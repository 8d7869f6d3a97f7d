//! Pipeline orchestration: resolve order, gate, compile, persist, report.
//!
//! Modules are compiled one at a time, in dependency order, on a single
//! logical thread of control: a dependent's prompt needs the completed
//! artifacts of its dependencies. Errors in a dependency propagate as a
//! blocking condition to every transitive dependent: a dependent is never
//! attempted, not even its ambiguity gate, unless all its dependencies
//! reached `Passed`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agent::Agent;
use crate::ambiguity::AmbiguityGate;
use crate::cache::AmbiguityCache;
use crate::cancel::CancelFlag;
use crate::compile::{CompilationLoop, CompileConfig};
use crate::domain::error::{ForgeError, SpecError};
use crate::domain::module::ModuleSet;
use crate::domain::record::{CompilationRecord, GateExchange, Outcome};
use crate::domain::status::{FailureKind, ModuleReport, ModuleStatus, PipelineReport};
use crate::domain::verdict::AmbiguityVerdict;
use crate::resolver;
use crate::store::ArtifactStore;

/// Per-run options.
#[derive(Default)]
pub struct RunOptions {
    /// Bypass the ambiguity gate. An escape hatch, not a normal path.
    pub force: bool,

    /// Optional verdict cache; hits skip the gate's agent query.
    pub cache: Option<AmbiguityCache>,
}

/// The compilation pipeline over a shared agent handle and artifact store.
pub struct Pipeline {
    agent: Arc<dyn Agent>,
    store: Arc<dyn ArtifactStore>,
    config: CompileConfig,
}

impl Pipeline {
    pub fn new(agent: Arc<dyn Agent>, store: Arc<dyn ArtifactStore>, config: CompileConfig) -> Self {
        Self {
            agent,
            store,
            config,
        }
    }

    /// Compile a module set, returning per-module terminal statuses.
    ///
    /// Attempted modules appear in compilation order, followed by modules
    /// excluded for spec-level errors. A dependency cycle compiles zero
    /// modules: every submitted module reports a `cycle` error.
    pub async fn run(
        &self,
        set: &ModuleSet,
        mut options: RunOptions,
        cancel: &CancelFlag,
    ) -> Result<PipelineReport, ForgeError> {
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        info!(run_id = %run_id, modules = set.len(), "starting compilation run");

        let order = match resolver::resolve(set) {
            Ok(order) => order,
            Err(err @ SpecError::DependencyCycle { .. }) => {
                let detail = err.to_string();
                warn!(%detail, "aborting run");
                let modules = set
                    .iter()
                    .map(|m| ModuleReport {
                        module: m.name.clone(),
                        status: ModuleStatus::Error {
                            kind: FailureKind::Cycle,
                            detail: detail.clone(),
                        },
                    })
                    .collect();
                return Ok(PipelineReport {
                    run_id,
                    modules,
                    duration_ms: started.elapsed().as_millis() as u64,
                    cancelled: false,
                });
            }
            Err(other) => return Err(other.into()),
        };

        let gate = AmbiguityGate::new(self.agent.clone());
        let looper = CompilationLoop::new(self.agent.clone(), self.config.clone());

        let mut reports: Vec<ModuleReport> = Vec::new();
        // Modules that did not reach Passed, with a short reason used in
        // their dependents' failure text.
        let mut not_passed: HashMap<String, String> = HashMap::new();
        let mut cancelled = false;

        for &idx in order.sequence() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let module = set.at(idx);

            // Blocking condition: a dependency that did not pass.
            if let Some((dep, reason)) = module
                .dependencies
                .iter()
                .find_map(|d| not_passed.get(d).map(|r| (d.clone(), r.clone())))
            {
                let last_failure = format!("dependency `{dep}` did not compile: {reason}");
                warn!(module = %module.name, %dep, "skipping blocked module");
                not_passed.insert(module.name.clone(), format!("blocked by `{dep}`"));
                reports.push(ModuleReport {
                    module: module.name.clone(),
                    status: ModuleStatus::Failed {
                        iterations: 0,
                        last_failure,
                    },
                });
                continue;
            }

            // Completed dependency artifacts become prompt context.
            let mut contexts = Vec::with_capacity(module.dependencies.len());
            for dep in &module.dependencies {
                contexts.push(self.store.load_interface(dep).await?);
            }

            // Hard gate, unless explicitly bypassed.
            let mut gate_exchange: Option<GateExchange> = None;
            if !options.force {
                let cached_verdict = options.cache.as_ref().and_then(|c| c.get(module));
                let verdict = match cached_verdict {
                    Some(cached) => {
                        debug!(module = %module.name, "ambiguity verdict from cache");
                        gate_exchange = Some(GateExchange {
                            prompt: "(cached verdict)".to_string(),
                            response: "(cached verdict)".to_string(),
                            findings: cached.rendered_findings(),
                        });
                        cached
                    }
                    None => match gate.check(module, &contexts).await {
                        Ok((verdict, exchange)) => {
                            if let Some(cache) = options.cache.as_mut() {
                                cache.put(module, &verdict)?;
                            }
                            gate_exchange = Some(exchange);
                            verdict
                        }
                        Err(err) => {
                            // Infrastructure error, not an ambiguous verdict.
                            warn!(module = %module.name, error = %err, "ambiguity check transport failure");
                            not_passed.insert(
                                module.name.clone(),
                                "agent unreachable during ambiguity check".to_string(),
                            );
                            reports.push(ModuleReport {
                                module: module.name.clone(),
                                status: ModuleStatus::Error {
                                    kind: FailureKind::Transport,
                                    detail: err.to_string(),
                                },
                            });
                            continue;
                        }
                    },
                };

                if let AmbiguityVerdict::Ambiguous { .. } = &verdict {
                    let findings = verdict.rendered_findings();
                    info!(module = %module.name, count = findings.len(), "specification ambiguous");

                    let mut record =
                        CompilationRecord::open(run_id, &module.name, &module.language);
                    record.gate = gate_exchange;
                    record.seal(Outcome::Ambiguous);
                    self.store.persist(&record).await?;

                    not_passed.insert(module.name.clone(), "ambiguous specification".to_string());
                    reports.push(ModuleReport {
                        module: module.name.clone(),
                        status: ModuleStatus::Ambiguous { findings },
                    });
                    continue;
                }
            }

            // Clear verdict (or bypass): run the loop.
            let working_dir = self.store.module_dir(&module.name);
            let record = match looper
                .compile(run_id, module, &contexts, gate_exchange, &working_dir, cancel)
                .await
            {
                Ok(record) => record,
                Err(ForgeError::Cancelled) => {
                    // In-progress record is discarded; sealed ones stay valid.
                    cancelled = true;
                    break;
                }
                Err(other) => return Err(other),
            };

            self.store.persist(&record).await?;

            let status = match record.outcome {
                Outcome::Passed => ModuleStatus::Compiled {
                    files: record.artifacts.clone(),
                    iterations: record.iteration_count(),
                },
                Outcome::Failed => {
                    not_passed.insert(module.name.clone(), "failed compilation".to_string());
                    ModuleStatus::Failed {
                        iterations: record.iteration_count(),
                        last_failure: record
                            .last_failure()
                            .unwrap_or("no failure detail recorded")
                            .to_string(),
                    }
                }
                Outcome::Ambiguous => {
                    // The loop never produces this outcome; keep the match
                    // total by reporting the recorded findings.
                    not_passed.insert(module.name.clone(), "ambiguous specification".to_string());
                    ModuleStatus::Ambiguous {
                        findings: record
                            .gate
                            .as_ref()
                            .map(|g| g.findings.clone())
                            .unwrap_or_default(),
                    }
                }
            };
            reports.push(ModuleReport {
                module: module.name.clone(),
                status,
            });
        }

        // Modules excluded by the resolver for missing dependencies.
        if !cancelled {
            for blocked in order.blocked() {
                reports.push(ModuleReport {
                    module: blocked.module.clone(),
                    status: ModuleStatus::Error {
                        kind: FailureKind::MissingDependency,
                        detail: blocked.detail(),
                    },
                });
            }
        }

        let report = PipelineReport {
            run_id,
            modules: reports,
            duration_ms: started.elapsed().as_millis() as u64,
            cancelled,
        };
        info!(
            run_id = %run_id,
            compiled = report.compiled_count(),
            total = report.modules.len(),
            cancelled,
            "compilation run finished"
        );
        Ok(report)
    }
}
