//! Domain-level error taxonomy for specforge.

/// Errors in the submitted specification itself.
///
/// These are configuration errors: they are reported before (or instead of)
/// any agent interaction and never consume a compilation retry.
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("module must have a non-empty name")]
    EmptyName,

    #[error("module `{module}` must have a non-empty purpose")]
    EmptyPurpose { module: String },

    #[error("duplicate module name: {name}")]
    DuplicateName { name: String },

    #[error("module `{name}` depends on itself")]
    SelfDependency { name: String },

    #[error("dependency cycle: {}", path.join(" -> "))]
    DependencyCycle { path: Vec<String> },

    #[error("module `{module}` depends on `{missing}`, which is not in the submitted set")]
    MissingDependency { module: String, missing: String },

    #[error("invalid spec file {path}: {detail}")]
    InvalidSpecFile { path: String, detail: String },
}

/// Transport-level agent failures.
///
/// A well-formed but semantically negative response (ambiguity findings,
/// failing tests described in prose) is NOT an `AgentError`; only
/// infrastructure failures reach this type.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("failed to spawn agent command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("agent call timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("agent exited with status {code} and produced no usable output: {stderr}")]
    Exit { code: i32, stderr: String },

    #[error("agent backend unreachable: {0}")]
    Unreachable(String),
}

/// Artifact store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no record persisted for module `{module}`")]
    RecordNotFound { module: String },

    #[error("module `{module}` has no usable interface (terminal outcome: {outcome})")]
    NotCompiled { module: String, outcome: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Umbrella error for pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("compilation run cancelled")]
    Cancelled,
}

/// Result type for specforge domain operations.
pub type Result<T> = std::result::Result<T, ForgeError>;
