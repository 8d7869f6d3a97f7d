//! Artifact and log store: the durable, per-module record of a run.
//!
//! Layout under the store root, one directory per module:
//!
//! ```text
//! <root>/<module>/              working directory (generated code)
//! <root>/<module>/record.json   sealed CompilationRecord
//! <root>/<module>/COMPILE_<module>.log   human-readable transcript
//! ```
//!
//! Writes are whole-file and atomic (temp file + rename); each module is
//! persisted exactly once, after its loop terminates, so no interleaved
//! writes across modules can occur. Sealed records may be read
//! concurrently.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::error::StoreError;
use crate::domain::record::{CompilationRecord, Outcome};

/// One source file of a compiled dependency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the dependency's working directory.
    pub path: String,

    /// Full file content.
    pub content: String,
}

/// The payload a downstream module receives about one compiled dependency:
/// its usable implementation code, sufficient to reference it correctly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencyContext {
    /// The dependency's module name.
    pub module_name: String,

    /// Implementation sources (interface files, not test files).
    pub files: Vec<SourceFile>,
}

/// Durable store for compilation records and their artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// The working directory assigned to a module. Created on demand.
    fn module_dir(&self, module: &str) -> PathBuf;

    /// Persist a sealed record (JSON + transcript). Returns the module's
    /// directory. Overwrites any previous record for the same module.
    async fn persist(&self, record: &CompilationRecord) -> Result<PathBuf, StoreError>;

    /// Load a previously persisted record, if one exists.
    async fn load_record(&self, module: &str) -> Result<Option<CompilationRecord>, StoreError>;

    /// Load the dependency-context payload for a module that reached
    /// `Passed`. Errors if no record exists or the module never passed.
    async fn load_interface(&self, module: &str) -> Result<DependencyContext, StoreError>;
}

/// Filesystem-backed artifact store.
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Open (or create) a store rooted at `root`. Pointing a later run at
    /// the same root makes the earlier run's interfaces loadable.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, module: &str) -> PathBuf {
        self.root.join(module).join("record.json")
    }

    fn log_path(&self, module: &str) -> PathBuf {
        self.root.join(module).join(format!("COMPILE_{module}.log"))
    }

    // Atomic write: temp file in the target directory, then rename.
    fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StoreError> {
        let dir = path.parent().expect("store paths always have a parent");
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(data)?;
        tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    fn module_dir(&self, module: &str) -> PathBuf {
        self.root.join(module)
    }

    async fn persist(&self, record: &CompilationRecord) -> Result<PathBuf, StoreError> {
        let dir = self.module_dir(&record.module_name);
        fs::create_dir_all(&dir)?;

        let json = serde_json::to_vec_pretty(record)?;
        Self::write_atomic(&self.record_path(&record.module_name), &json)?;

        let transcript = render_transcript(record);
        Self::write_atomic(&self.log_path(&record.module_name), transcript.as_bytes())?;

        Ok(dir)
    }

    async fn load_record(&self, module: &str) -> Result<Option<CompilationRecord>, StoreError> {
        let path = self.record_path(module);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn load_interface(&self, module: &str) -> Result<DependencyContext, StoreError> {
        let record = self
            .load_record(module)
            .await?
            .ok_or_else(|| StoreError::RecordNotFound {
                module: module.to_string(),
            })?;

        if record.outcome != Outcome::Passed {
            return Err(StoreError::NotCompiled {
                module: module.to_string(),
                outcome: record.outcome.to_string(),
            });
        }

        let dir = self.module_dir(module);
        let mut files = Vec::with_capacity(record.interface_files.len());
        for rel in &record.interface_files {
            let content = fs::read_to_string(dir.join(rel))?;
            files.push(SourceFile {
                path: rel.clone(),
                content,
            });
        }

        Ok(DependencyContext {
            module_name: module.to_string(),
            files,
        })
    }
}

/// Render the human-readable transcript for a record: every iteration's
/// prompt, response, and test outcome, in order, plus the final status.
/// This is the audit trail that makes compilation decisions reviewable
/// without reading generated code.
pub fn render_transcript(record: &CompilationRecord) -> String {
    let rule = "-".repeat(60);
    let mut out = format!(
        "Compilation log for {name}\n{heavy}\nRun: {run}\nLanguage: {lang}\n",
        name = record.module_name,
        heavy = "=".repeat(60),
        run = record.run_id,
        lang = record.language,
    );

    if let Some(gate) = &record.gate {
        out.push_str(&format!(
            "\nAmbiguity check\n{rule}\nPrompt:\n{}\n{rule}\nResponse:\n{}\n",
            gate.prompt, gate.response
        ));
        if gate.findings.is_empty() {
            out.push_str("Verdict: clear\n");
        } else {
            out.push_str("Verdict: ambiguous\n");
            for finding in &gate.findings {
                out.push_str(&format!("  - {finding}\n"));
            }
        }
    }

    for it in &record.iterations {
        out.push_str(&format!(
            "\nIteration {seq}\n{rule}\nPrompt:\n{prompt}\n{rule}\nResponse:\n{response}\n{rule}\n",
            seq = it.seq,
            prompt = it.prompt,
            response = it.response,
        ));
        if it.files_written.is_empty() {
            out.push_str("Files written: (none)\n");
        } else {
            out.push_str(&format!("Files written: {}\n", it.files_written.join(", ")));
        }
        match &it.test_result {
            None => out.push_str("Test run: not executed\n"),
            Some(t) => {
                out.push_str(&format!(
                    "Test run: exit {} in {}ms\n",
                    t.exit_code, t.duration_ms
                ));
                let combined = t.combined_output();
                if !combined.is_empty() {
                    out.push_str(&combined);
                    out.push('\n');
                }
            }
        }
        if let Some(summary) = &it.failure_summary {
            out.push_str(&format!("Failure summary:\n{summary}\n"));
        }
    }

    out.push_str(&format!(
        "\n{rule}\nFinal status: {}\n",
        record.outcome.to_string().to_uppercase()
    ));
    out
}
