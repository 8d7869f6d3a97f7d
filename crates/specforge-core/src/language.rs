//! Language profiles: map the opaque language tag onto file naming,
//! test-command, and prompt-instruction conventions.
//!
//! The pipeline itself never interprets the tag beyond this lookup; the
//! tag travels verbatim into prompts.

/// Conventions for one target language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageProfile {
    tag: String,
}

impl LanguageProfile {
    /// Resolve a profile from a language tag. Unknown tags get the generic
    /// profile, which delegates test entry-point choice to the agent.
    pub fn for_tag(tag: &str) -> Self {
        Self {
            tag: tag.to_lowercase(),
        }
    }

    /// The normalized tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Expected implementation file for a module, relative to its working
    /// directory. Its absence after an agent call means no implementation
    /// was produced.
    pub fn impl_file(&self, module: &str) -> String {
        match self.tag.as_str() {
            "python" => format!("{module}.py"),
            "rust" => "src/lib.rs".to_string(),
            "javascript" => format!("{module}.js"),
            other => format!("{module}.{other}"),
        }
    }

    /// Expected test file for a module, relative to its working directory.
    pub fn test_file(&self, module: &str) -> String {
        match self.tag.as_str() {
            "python" => format!("test_{module}.py"),
            "rust" => "src/lib.rs".to_string(),
            "javascript" => format!("{module}.test.js"),
            other => format!("test_{module}.{other}"),
        }
    }

    /// Command the core executes to verify the module, independent of any
    /// claim the agent makes. First element is the executable.
    pub fn test_command(&self, module: &str) -> Vec<String> {
        match self.tag.as_str() {
            "python" => vec![
                "python3".into(),
                "-m".into(),
                "pytest".into(),
                self.test_file(module),
                "-v".into(),
            ],
            "rust" => vec!["cargo".into(), "test".into()],
            "javascript" => vec!["npx".into(), "jest".into(), self.test_file(module)],
            _ => vec!["sh".into(), "run_tests.sh".into()],
        }
    }

    /// Language-specific instructions appended to the generation prompt.
    pub fn instructions(&self, module: &str) -> String {
        match self.tag.as_str() {
            "python" => format!(
                "## Python instructions\n\
                 - Write the implementation to {impl_file}\n\
                 - Write pytest tests to {test_file} covering ALL the test cases above\n\
                 - Use type hints on all function signatures\n\
                 - If external packages are needed, create a requirements.txt and \
                 install into a local .venv; never install globally\n\
                 - Verify with: python3 -m pytest {test_file} -v",
                impl_file = self.impl_file(module),
                test_file = self.test_file(module),
            ),
            "rust" => format!(
                "## Rust instructions\n\
                 - Initialize a library crate if none exists (cargo init --lib)\n\
                 - Write the implementation to {impl_file} with a #[cfg(test)] module \
                 covering ALL the test cases above\n\
                 - Use Result-based error handling; no unwrap in library code\n\
                 - Add any dependencies to Cargo.toml\n\
                 - Verify with: cargo test",
                impl_file = self.impl_file(module),
            ),
            "javascript" => format!(
                "## JavaScript instructions\n\
                 - Write the implementation to {impl_file}\n\
                 - Write Jest tests to {test_file} covering ALL the test cases above\n\
                 - Use ES modules and async/await where appropriate\n\
                 - Install dev dependencies locally (npm install --save-dev jest)\n\
                 - Verify with: npx jest {test_file}",
                impl_file = self.impl_file(module),
                test_file = self.test_file(module),
            ),
            other => format!(
                "## {other} instructions\n\
                 - Write the implementation to {impl_file} following {other} conventions\n\
                 - Write tests to {test_file} covering ALL the test cases above\n\
                 - Write a run_tests.sh entry point that runs the tests and exits \
                 non-zero on any failure\n\
                 - Verify with: sh run_tests.sh",
                impl_file = self.impl_file(module),
                test_file = self.test_file(module),
            ),
        }
    }
}
