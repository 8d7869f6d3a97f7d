//! Module specifications and the arena that holds a submitted set.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::error::SpecError;

/// A single module specification.
///
/// The description is intentionally minimal: the ambiguity gate forces the
/// purpose and tests to be specific enough that generation is unambiguous.
/// Everything here is caller-owned input and read-only to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Module {
    /// Unique identifier within a compilation run.
    pub name: String,

    /// High-level intent in natural language.
    pub purpose: String,

    /// Names of modules this one depends on, in declaration order.
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Natural-language behavior descriptions. Opaque to the pipeline;
    /// only the agent interprets them.
    #[serde(default)]
    pub tests: Vec<String>,

    /// Target-language tag, forwarded verbatim to the language profile.
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "python".to_string()
}

impl Module {
    /// Create a module with no dependencies or tests.
    pub fn new(name: impl Into<String>, purpose: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            purpose: purpose.into(),
            dependencies: Vec::new(),
            tests: Vec::new(),
            language: default_language(),
        }
    }

    /// Builder-style dependency list.
    pub fn with_dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = deps;
        self
    }

    /// Builder-style test list.
    pub fn with_tests(mut self, tests: Vec<String>) -> Self {
        self.tests = tests;
        self
    }

    /// Builder-style language tag.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    fn validate(&self) -> Result<(), SpecError> {
        if self.name.trim().is_empty() {
            return Err(SpecError::EmptyName);
        }
        if self.purpose.trim().is_empty() {
            return Err(SpecError::EmptyPurpose {
                module: self.name.clone(),
            });
        }
        if self.dependencies.iter().any(|d| d == &self.name) {
            return Err(SpecError::SelfDependency {
                name: self.name.clone(),
            });
        }
        Ok(())
    }
}

/// Flat arena of modules submitted together for one compilation run.
///
/// Modules reference each other by name; the arena resolves names to stable
/// indices so dependency edges are index pairs and graph algorithms never
/// touch owned references.
#[derive(Debug, Clone)]
pub struct ModuleSet {
    modules: Vec<Module>,
    index: HashMap<String, usize>,
}

impl ModuleSet {
    /// Build a set from caller-owned modules, validating each entry.
    ///
    /// Rejects empty names/purposes, duplicate names, and self-dependencies.
    /// Dependency names pointing outside the set and cycles are resolver
    /// concerns, not construction errors.
    pub fn new(modules: Vec<Module>) -> Result<Self, SpecError> {
        let mut index = HashMap::with_capacity(modules.len());
        for (i, module) in modules.iter().enumerate() {
            module.validate()?;
            if index.insert(module.name.clone(), i).is_some() {
                return Err(SpecError::DuplicateName {
                    name: module.name.clone(),
                });
            }
        }
        Ok(Self { modules, index })
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Module at a stable arena index.
    pub fn at(&self, idx: usize) -> &Module {
        &self.modules[idx]
    }

    /// Look up a module by name.
    pub fn get(&self, name: &str) -> Option<&Module> {
        self.index.get(name).map(|&i| &self.modules[i])
    }

    /// Arena index for a name, if present in the set.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Iterate modules in submission order.
    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }
}
