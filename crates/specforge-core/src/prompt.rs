//! Prompt builders for the ambiguity gate and the generation loop.
//!
//! The wire format the gate parser expects (`NO_AMBIGUITIES`, `AMBIGUITY:`
//! blocks) is defined here; `ambiguity.rs` owns the parsing side.

use crate::domain::module::Module;
use crate::language::LanguageProfile;
use crate::store::DependencyContext;

fn spec_block(module: &Module) -> String {
    let mut block = format!("Name: {}\nPurpose: {}\n", module.name, module.purpose);

    if module.tests.is_empty() {
        block.push_str("\nTests: (none provided)\n");
    } else {
        block.push_str("\nTests (the implementation must pass all of these):\n");
        for (i, test) in module.tests.iter().enumerate() {
            block.push_str(&format!("{}. {}\n", i + 1, test));
        }
    }
    block
}

fn dependency_block(deps: &[DependencyContext]) -> String {
    if deps.is_empty() {
        return String::new();
    }
    let mut block = String::from("\nDependency code (already compiled, available for use):\n");
    for dep in deps {
        for file in &dep.files {
            block.push_str(&format!(
                "\n--- dependency `{}`, file {} ---\n{}\n",
                dep.module_name, file.path, file.content
            ));
        }
    }
    block
}

/// Build the generation prompt for one loop iteration.
///
/// `previous_failure` carries the prior iteration's test output from the
/// second iteration onward.
pub fn generation_prompt(
    module: &Module,
    profile: &LanguageProfile,
    deps: &[DependencyContext],
    previous_failure: Option<&str>,
) -> String {
    let mut prompt = format!(
        "You are implementing a {} module from its specification.\n\n\
         Module specification:\n---\n{}{}---\n",
        module.language,
        spec_block(module),
        dependency_block(deps),
    );

    if let Some(failure) = previous_failure {
        prompt.push_str(&format!(
            "\nYour previous attempt FAILED its test run. Fix the implementation.\n\
             Test output from the failed run:\n---\n{failure}\n---\n"
        ));
    }

    prompt.push_str(&format!(
        "\nYour task:\n\
         1. Write the implementation and its tests into the current directory\n\
         2. Run the tests yourself and iterate until they all pass\n\
         3. FAIL FAST: let errors surface; do not add fallback handling or \
         default values unless the purpose asks for them\n\n\
         {}\n",
        profile.instructions(&module.name),
    ));

    prompt
}

/// Build the ambiguity-check prompt for one module.
///
/// The reply must be either the literal `NO_AMBIGUITIES` or one or more
/// `AMBIGUITY:` blocks with `Location:`/`Issue:`/`Severity:`/`Suggestions:`
/// lines.
pub fn ambiguity_prompt(module: &Module, deps: &[DependencyContext]) -> String {
    let dep_summary = if module.dependencies.is_empty() {
        "  (none)".to_string()
    } else {
        module
            .dependencies
            .iter()
            .map(|d| format!("  - {d}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Ambiguity check on a module specification.\n\n\
         Module specification:\n---\n{spec}\nDependencies:\n{dep_summary}\n{dep_code}---\n\n\
         Identify ambiguities that would make a correct implementation impossible.\n\
         Be strict about correctness-relevant ambiguity; be lenient about stylistic \
         and naming choices.\n\n\
         Flag only:\n\
         - missing information critical to behavior (unclear algorithm, undefined \
         edge-case handling)\n\
         - tests that contradict the purpose\n\
         - genuinely undefined behavior (what happens when X?)\n\n\
         Do NOT flag:\n\
         - function or file naming (infer from the module name)\n\
         - style choices or error-message wording\n\
         - anything with an obvious reasonable default\n\n\
         For each REAL ambiguity reply with a block:\n\n\
         AMBIGUITY:\n\
         Location: <where in the spec>\n\
         Issue: <what is ambiguous>\n\
         Severity: <error|warning>\n\
         Suggestions:\n\
         - <how to resolve it>\n\n\
         If there are no significant ambiguities reply with exactly: NO_AMBIGUITIES\n",
        spec = spec_block(module),
        dep_summary = dep_summary,
        dep_code = dependency_block(deps),
    )
}
