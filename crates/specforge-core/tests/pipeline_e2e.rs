//! End-to-end pipeline tests against the scripted stub agent.
//!
//! The "sh" language profile keeps these hermetic: the stub writes a
//! `run_tests.sh` into the working directory and the pipeline verifies it
//! with `sh run_tests.sh`.

use std::sync::Arc;

use specforge_core::{
    Agent, AmbiguityCache, CancelFlag, CompileConfig, FsArtifactStore, Module, ModuleSet,
    ModuleStatus, Outcome, Pipeline, RunOptions, StubAgent, StubReply,
};

const CLEAR: &str = "NO_AMBIGUITIES";

fn sh_module(name: &str, deps: &[&str]) -> Module {
    Module::new(name, format!("the {name} module"))
        .with_dependencies(deps.iter().map(|d| d.to_string()).collect())
        .with_tests(vec!["returns 2 for input 1".to_string()])
        .with_language("sh")
}

/// Reply that writes a working implementation plus a passing test script.
fn good_impl(name: &str) -> StubReply {
    StubReply::Text {
        response: "implemented and verified".to_string(),
        files: vec![
            (
                format!("{name}.sh"),
                "add() { echo $(( $1 + 1 )); }\n".to_string(),
            ),
            ("run_tests.sh".to_string(), "exit 0\n".to_string()),
        ],
    }
}

fn pipeline_at(
    root: &std::path::Path,
    replies: Vec<StubReply>,
) -> (Arc<StubAgent>, Pipeline) {
    let agent = Arc::new(StubAgent::scripted(replies));
    let store = Arc::new(FsArtifactStore::open(root).unwrap());
    let pipeline = Pipeline::new(agent.clone(), store, CompileConfig::default());
    (agent, pipeline)
}

#[tokio::test]
async fn test_single_module_compiles_on_first_iteration() {
    let dir = tempfile::tempdir().unwrap();
    let (agent, pipeline) = pipeline_at(
        dir.path(),
        vec![StubReply::text(CLEAR), good_impl("a")],
    );

    let set = ModuleSet::new(vec![sh_module("a", &[])]).unwrap();
    let report = pipeline
        .run(&set, RunOptions::default(), &CancelFlag::new())
        .await
        .unwrap();

    match report.status_of("a").unwrap() {
        ModuleStatus::Compiled { files, iterations } => {
            assert_eq!(*iterations, 1);
            assert!(files.contains(&"a.sh".to_string()));
        }
        other => panic!("expected compiled, got {other:?}"),
    }
    // One gate query + one generation query.
    assert_eq!(agent.query_count(), 2);

    // The record and transcript are on disk.
    assert!(dir.path().join("a/record.json").is_file());
    assert!(dir.path().join("a/COMPILE_a.log").is_file());
}

#[tokio::test]
async fn test_dependent_receives_dependency_artifact_in_context() {
    let dir = tempfile::tempdir().unwrap();
    let (agent, pipeline) = pipeline_at(
        dir.path(),
        vec![
            StubReply::text(CLEAR), // gate a
            good_impl("a"),
            StubReply::text(CLEAR), // gate b
            good_impl("b"),
        ],
    );

    let set = ModuleSet::new(vec![sh_module("a", &[]), sh_module("b", &["a"])]).unwrap();
    let report = pipeline
        .run(&set, RunOptions::default(), &CancelFlag::new())
        .await
        .unwrap();

    assert!(report.all_compiled());

    let prompts = agent.prompts();
    // a: gate, generate; b: gate, generate, in dependency order.
    assert_eq!(prompts.len(), 4);
    // b's gate already sees a's compiled artifact...
    assert!(prompts[2].contains("dependency `a`"));
    assert!(prompts[2].contains("add()"));
    // ...and so does b's generation prompt.
    assert!(prompts[3].contains("dependency `a`"));
    assert!(prompts[3].contains("add()"));
}

#[tokio::test]
async fn test_ambiguous_module_short_circuits_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let (agent, pipeline) = pipeline_at(
        dir.path(),
        vec![StubReply::text(
            "AMBIGUITY:\nIssue: operation set unspecified\n",
        )],
    );

    let set = ModuleSet::new(vec![sh_module("calc", &[])]).unwrap();
    let report = pipeline
        .run(&set, RunOptions::default(), &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(
        report.status_of("calc").unwrap(),
        &ModuleStatus::Ambiguous {
            findings: vec!["operation set unspecified".to_string()]
        }
    );
    // Only the gate query ran: no generation, no test execution.
    assert_eq!(agent.query_count(), 1);
    // No implementation files were written.
    assert!(!dir.path().join("calc/calc.sh").exists());
    assert!(!dir.path().join("calc/run_tests.sh").exists());

    // The ambiguous verdict is sealed in the record.
    let record: specforge_core::CompilationRecord = serde_json::from_slice(
        &std::fs::read(dir.path().join("calc/record.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(record.outcome, Outcome::Ambiguous);
    assert_eq!(record.iterations.len(), 0);
}

#[tokio::test]
async fn test_ambiguous_dependency_blocks_dependents() {
    let dir = tempfile::tempdir().unwrap();
    let (agent, pipeline) = pipeline_at(
        dir.path(),
        vec![StubReply::text("AMBIGUITY:\nIssue: unclear\n")],
    );

    let set = ModuleSet::new(vec![sh_module("a", &[]), sh_module("b", &["a"])]).unwrap();
    let report = pipeline
        .run(&set, RunOptions::default(), &CancelFlag::new())
        .await
        .unwrap();

    assert!(matches!(
        report.status_of("a").unwrap(),
        ModuleStatus::Ambiguous { .. }
    ));
    match report.status_of("b").unwrap() {
        ModuleStatus::Failed {
            iterations,
            last_failure,
        } => {
            assert_eq!(*iterations, 0);
            assert!(last_failure.contains("dependency `a`"));
        }
        other => panic!("expected blocked failure, got {other:?}"),
    }
    // b was never attempted: not even its gate ran.
    assert_eq!(agent.query_count(), 1);
}

#[tokio::test]
async fn test_failed_dependency_blocks_transitive_dependents() {
    let dir = tempfile::tempdir().unwrap();
    // a's agent never produces an implementation: three wasted iterations.
    let (agent, pipeline) = pipeline_at(
        dir.path(),
        vec![
            StubReply::text(CLEAR),
            StubReply::text("nothing written"),
            StubReply::text("still nothing"),
            StubReply::text("giving up"),
        ],
    );

    let set = ModuleSet::new(vec![
        sh_module("a", &[]),
        sh_module("b", &["a"]),
        sh_module("c", &["b"]),
    ])
    .unwrap();
    let report = pipeline
        .run(&set, RunOptions::default(), &CancelFlag::new())
        .await
        .unwrap();

    match report.status_of("a").unwrap() {
        ModuleStatus::Failed { iterations, .. } => assert_eq!(*iterations, 3),
        other => panic!("expected failed, got {other:?}"),
    }
    for name in ["b", "c"] {
        match report.status_of(name).unwrap() {
            ModuleStatus::Failed { iterations, .. } => assert_eq!(*iterations, 0),
            other => panic!("expected blocked failure for {name}, got {other:?}"),
        }
    }
    // 1 gate + 3 generation attempts, all for a.
    assert_eq!(agent.query_count(), 4);
}

#[tokio::test]
async fn test_force_bypasses_the_gate() {
    let dir = tempfile::tempdir().unwrap();
    let (agent, pipeline) = pipeline_at(dir.path(), vec![good_impl("a")]);

    let set = ModuleSet::new(vec![sh_module("a", &[])]).unwrap();
    let options = RunOptions {
        force: true,
        ..Default::default()
    };
    let report = pipeline
        .run(&set, options, &CancelFlag::new())
        .await
        .unwrap();

    assert!(report.all_compiled());
    // Only the generation query; no ambiguity check.
    assert_eq!(agent.query_count(), 1);
}

#[tokio::test]
async fn test_rerun_with_unchanged_spec_is_structurally_identical() {
    // Same spec + same deterministic stub script => identical iteration
    // count and terminal status, independent of generation content.
    let set = ModuleSet::new(vec![sh_module("a", &[])]).unwrap();
    let script = || {
        vec![
            StubReply::text(CLEAR),
            StubReply::with_files(
                "attempt",
                vec![
                    ("a.sh", "add() { echo 3; }\n"),
                    ("run_tests.sh", "echo expected 2 got 3; exit 1\n"),
                ],
            ),
            StubReply::with_files(
                "fixed",
                vec![
                    ("a.sh", "add() { echo 2; }\n"),
                    ("run_tests.sh", "exit 0\n"),
                ],
            ),
        ]
    };

    let mut outcomes = Vec::new();
    for _ in 0..2 {
        let dir = tempfile::tempdir().unwrap();
        let (_, pipeline) = pipeline_at(dir.path(), script());
        let report = pipeline
            .run(&set, RunOptions::default(), &CancelFlag::new())
            .await
            .unwrap();
        let record: specforge_core::CompilationRecord = serde_json::from_slice(
            &std::fs::read(dir.path().join("a/record.json")).unwrap(),
        )
        .unwrap();
        outcomes.push((
            report.status_of("a").cloned(),
            record.iterations.len(),
            record.outcome,
        ));
    }

    assert_eq!(outcomes[0].1, 2);
    assert_eq!(outcomes[0], outcomes[1]);
}

#[tokio::test]
async fn test_cached_gate_verdict_skips_agent_query() {
    let dir = tempfile::tempdir().unwrap();
    let set = ModuleSet::new(vec![sh_module("a", &[])]).unwrap();

    // First run populates the cache.
    let (first_agent, pipeline) = pipeline_at(
        dir.path(),
        vec![StubReply::text(CLEAR), good_impl("a")],
    );
    let options = RunOptions {
        force: false,
        cache: Some(AmbiguityCache::open(dir.path()).unwrap()),
    };
    pipeline
        .run(&set, options, &CancelFlag::new())
        .await
        .unwrap();
    assert_eq!(first_agent.query_count(), 2);

    // Second run: the gate query disappears, only generation remains.
    let (second_agent, pipeline) = pipeline_at(dir.path(), vec![good_impl("a")]);
    let options = RunOptions {
        force: false,
        cache: Some(AmbiguityCache::open(dir.path()).unwrap()),
    };
    let report = pipeline
        .run(&set, options, &CancelFlag::new())
        .await
        .unwrap();

    assert!(report.all_compiled());
    assert_eq!(second_agent.query_count(), 1);
}

#[tokio::test]
async fn test_cancellation_between_modules_preserves_sealed_records() {
    let dir = tempfile::tempdir().unwrap();
    let cancel = CancelFlag::new();

    // The stub cancels the run as a side effect of a's generation query
    // completing, so the pipeline sees the flag before starting b.
    struct CancellingAgent {
        inner: StubAgent,
        cancel: CancelFlag,
    }

    #[async_trait::async_trait]
    impl specforge_core::Agent for CancellingAgent {
        async fn query(
            &self,
            prompt: &str,
            working_dir: Option<&std::path::Path>,
        ) -> Result<String, specforge_core::AgentError> {
            let response = self.inner.query(prompt, working_dir).await?;
            if working_dir.is_some() {
                self.cancel.cancel();
            }
            Ok(response)
        }
    }

    let agent = Arc::new(CancellingAgent {
        inner: StubAgent::scripted(vec![StubReply::text(CLEAR), good_impl("a")]),
        cancel: cancel.clone(),
    });
    let store = Arc::new(FsArtifactStore::open(dir.path()).unwrap());
    let pipeline = Pipeline::new(agent, store, CompileConfig::default());

    let set = ModuleSet::new(vec![sh_module("a", &[]), sh_module("b", &["a"])]).unwrap();
    let report = pipeline.run(&set, RunOptions::default(), &cancel).await.unwrap();

    assert!(report.cancelled);
    // a finished and its record survived; b was never started.
    assert!(matches!(
        report.status_of("a").unwrap(),
        ModuleStatus::Compiled { .. }
    ));
    assert!(report.status_of("b").is_none());
    assert!(dir.path().join("a/record.json").is_file());
    assert!(!dir.path().join("b/record.json").exists());
}
