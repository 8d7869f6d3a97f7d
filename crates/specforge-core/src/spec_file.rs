//! TOML spec file loading.
//!
//! A spec file declares the module set for one compilation run:
//!
//! ```toml
//! language = "python"          # default for all modules
//!
//! [[module]]
//! name = "calculator"
//! purpose = "Adds two integers."
//! tests = ["returns 2 for inputs 1 and 1"]
//!
//! [[module]]
//! name = "statistics"
//! purpose = "Computes the mean of a list using calculator for summation."
//! dependencies = ["calculator"]
//! tests = ["mean of [1, 2, 3] is 2"]
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::domain::error::SpecError;
use crate::domain::module::{Module, ModuleSet};

#[derive(Debug, Deserialize)]
struct SpecFile {
    /// Default language tag applied to modules that do not set their own.
    language: Option<String>,

    #[serde(default, rename = "module")]
    modules: Vec<ModuleEntry>,
}

#[derive(Debug, Deserialize)]
struct ModuleEntry {
    name: String,
    purpose: String,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    tests: Vec<String>,
    language: Option<String>,
}

/// Load and validate a module set from a TOML spec file.
pub fn load_spec(path: &Path) -> Result<ModuleSet, SpecError> {
    let text = fs::read_to_string(path).map_err(|e| SpecError::InvalidSpecFile {
        path: path.display().to_string(),
        detail: e.to_string(),
    })?;
    parse_spec(&text, &path.display().to_string())
}

fn parse_spec(text: &str, origin: &str) -> Result<ModuleSet, SpecError> {
    let spec: SpecFile = toml::from_str(text).map_err(|e| SpecError::InvalidSpecFile {
        path: origin.to_string(),
        detail: e.to_string(),
    })?;

    if spec.modules.is_empty() {
        return Err(SpecError::InvalidSpecFile {
            path: origin.to_string(),
            detail: "spec file declares no [[module]] entries".to_string(),
        });
    }

    let default_language = spec.language;
    let modules = spec
        .modules
        .into_iter()
        .map(|entry| {
            let mut module = Module::new(entry.name, entry.purpose)
                .with_dependencies(entry.dependencies)
                .with_tests(entry.tests);
            if let Some(language) = entry.language.or_else(|| default_language.clone()) {
                module.language = language;
            }
            module
        })
        .collect();

    ModuleSet::new(modules)
}
