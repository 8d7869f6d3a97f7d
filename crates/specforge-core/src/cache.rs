//! Ambiguity-verdict cache.
//!
//! Caches gate verdicts keyed by a SHA-256 fingerprint of the
//! spec-relevant module fields, so unchanged modules skip the agent query
//! on re-runs. Only verdicts are cached; generated code never is.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::domain::error::StoreError;
use crate::domain::module::Module;
use crate::domain::verdict::{AmbiguityVerdict, Finding};

const CACHE_FILE: &str = ".ambiguity_cache.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedVerdict {
    findings: Vec<Finding>,
}

/// On-disk ambiguity cache, one JSON file per store root.
pub struct AmbiguityCache {
    path: PathBuf,
    entries: HashMap<String, CachedVerdict>,
}

impl AmbiguityCache {
    /// Open the cache under `root`, loading any existing entries.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = root.as_ref().join(CACHE_FILE);
        let entries = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(StoreError::Io(e)),
        };
        Ok(Self { path, entries })
    }

    /// Cached verdict for a module, if its fingerprint matches.
    pub fn get(&self, module: &Module) -> Option<AmbiguityVerdict> {
        self.entries
            .get(&fingerprint(module))
            .map(|cached| match cached.findings.is_empty() {
                true => AmbiguityVerdict::Clear,
                false => AmbiguityVerdict::Ambiguous {
                    findings: cached.findings.clone(),
                },
            })
    }

    /// Store a verdict and save the cache file.
    pub fn put(&mut self, module: &Module, verdict: &AmbiguityVerdict) -> Result<(), StoreError> {
        let findings = match verdict {
            AmbiguityVerdict::Clear => Vec::new(),
            AmbiguityVerdict::Ambiguous { findings } => findings.clone(),
        };
        self.entries
            .insert(fingerprint(module), CachedVerdict { findings });
        self.save()
    }

    fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(&self.entries)?)?;
        Ok(())
    }
}

/// SHA-256 fingerprint over the fields that affect the ambiguity check:
/// name, purpose, dependency names, and tests. The language tag and any
/// generated artifacts are deliberately excluded.
fn fingerprint(module: &Module) -> String {
    let stable = json!({
        "name": module.name,
        "purpose": module.purpose,
        "dependencies": module.dependencies,
        "tests": module.tests,
    });
    let mut hasher = Sha256::new();
    hasher.update(stable.to_string().as_bytes());
    hex::encode(hasher.finalize())
}
