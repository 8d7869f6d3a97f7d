//! Specforge Core Library
//!
//! Compiles declarative, natural-language module specifications into
//! working, tested source code by driving an external code-producing agent
//! through a dependency-ordered, ambiguity-gated, bounded-retry pipeline.

pub mod agent;
pub mod ambiguity;
pub mod cache;
pub mod cancel;
pub mod compile;
pub mod domain;
pub mod language;
pub mod pipeline;
pub mod prompt;
pub mod resolver;
pub mod spec_file;
pub mod store;
pub mod telemetry;
pub mod testrun;

pub use agent::{Agent, CliAgent, HttpAgent, StubAgent, StubReply};
pub use ambiguity::AmbiguityGate;
pub use cache::AmbiguityCache;
pub use cancel::CancelFlag;
pub use compile::{CompilationLoop, CompileConfig};
pub use domain::{
    AgentError, AmbiguityVerdict, CompilationRecord, FailureKind, Finding, ForgeError,
    GateExchange, Iteration, Module, ModuleReport, ModuleSet, ModuleStatus, Outcome,
    PipelineReport, Result, SpecError, StoreError, TestResult,
};
pub use language::LanguageProfile;
pub use pipeline::{Pipeline, RunOptions};
pub use resolver::{resolve, Blocked, DependencyOrder};
pub use spec_file::load_spec;
pub use store::{ArtifactStore, DependencyContext, FsArtifactStore, SourceFile};
pub use telemetry::init_tracing;

/// Specforge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
