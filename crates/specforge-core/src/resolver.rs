//! Dependency resolution over a submitted module set.
//!
//! Produces a compilation order in which every module appears after all of
//! its dependencies. Traversal is depth-first with three-color marking;
//! reaching an in-progress node again is a cycle, fatal for the whole set.
//! A dependency name absent from the set blocks only that module and its
//! transitive dependents.

use crate::domain::error::SpecError;
use crate::domain::module::ModuleSet;

/// A module excluded from the order because a dependency is unavailable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blocked {
    /// Arena index of the blocked module.
    pub index: usize,

    /// Name of the blocked module.
    pub module: String,

    /// The dependency name that is missing from the submitted set.
    pub missing: String,

    /// Direct dependency through which the missing name was inherited;
    /// `None` when this module names the missing dependency itself.
    pub via: Option<String>,
}

impl Blocked {
    /// Human-readable detail for the caller-facing error status.
    pub fn detail(&self) -> String {
        match &self.via {
            None => format!(
                "module `{}` depends on `{}`, which is not in the submitted set",
                self.module, self.missing
            ),
            Some(via) => format!(
                "module `{}` is blocked by dependency `{}` (missing `{}`)",
                self.module, via, self.missing
            ),
        }
    }
}

/// A valid compilation order plus the modules excluded from it.
///
/// Recomputed for every run; never cached across runs, since spec content
/// may have changed.
#[derive(Debug, Clone)]
pub struct DependencyOrder {
    order: Vec<usize>,
    blocked: Vec<Blocked>,
}

impl DependencyOrder {
    /// Arena indices in compilation order (dependencies before dependents).
    pub fn sequence(&self) -> &[usize] {
        &self.order
    }

    /// Modules excluded because of missing dependencies.
    pub fn blocked(&self) -> &[Blocked] {
        &self.blocked
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

struct Walk<'a> {
    set: &'a ModuleSet,
    color: Vec<Color>,
    // index -> (missing name, inherited-via direct dependency)
    blocked: Vec<Option<(String, Option<String>)>>,
    stack: Vec<usize>,
    order: Vec<usize>,
}

impl Walk<'_> {
    fn visit(&mut self, i: usize) -> Result<(), SpecError> {
        self.color[i] = Color::Gray;
        self.stack.push(i);

        for dep in &self.set.at(i).dependencies {
            match self.set.position(dep) {
                None => {
                    if self.blocked[i].is_none() {
                        self.blocked[i] = Some((dep.clone(), None));
                    }
                }
                Some(j) => {
                    match self.color[j] {
                        Color::Gray => return Err(self.cycle_error(j)),
                        Color::White => self.visit(j)?,
                        Color::Black => {}
                    }
                    // Inherit a block from the dependency subtree.
                    if self.blocked[i].is_none() {
                        if let Some((missing, _)) = &self.blocked[j] {
                            self.blocked[i] = Some((missing.clone(), Some(dep.clone())));
                        }
                    }
                }
            }
        }

        self.stack.pop();
        self.color[i] = Color::Black;
        if self.blocked[i].is_none() {
            self.order.push(i);
        }
        Ok(())
    }

    fn cycle_error(&self, reentered: usize) -> SpecError {
        let start = self
            .stack
            .iter()
            .position(|&n| n == reentered)
            .unwrap_or(0);
        let mut path: Vec<String> = self.stack[start..]
            .iter()
            .map(|&n| self.set.at(n).name.clone())
            .collect();
        path.push(self.set.at(reentered).name.clone());
        SpecError::DependencyCycle { path }
    }
}

/// Compute a valid compilation order for the set.
///
/// Returns `SpecError::DependencyCycle` when the set is cyclic; in that
/// case no partial order is usable and zero modules compile. Missing
/// dependencies do not fail the call; the affected subtree is reported in
/// [`DependencyOrder::blocked`] and unrelated modules still compile.
///
/// Ties between unrelated modules are broken by submission order, so the
/// output is deterministic for identical input.
pub fn resolve(set: &ModuleSet) -> Result<DependencyOrder, SpecError> {
    let mut walk = Walk {
        set,
        color: vec![Color::White; set.len()],
        blocked: vec![None; set.len()],
        stack: Vec::new(),
        order: Vec::new(),
    };

    for i in 0..set.len() {
        if walk.color[i] == Color::White {
            walk.visit(i)?;
        }
    }

    let blocked = walk
        .blocked
        .iter()
        .enumerate()
        .filter_map(|(i, b)| {
            b.as_ref().map(|(missing, via)| Blocked {
                index: i,
                module: set.at(i).name.clone(),
                missing: missing.clone(),
                via: via.clone(),
            })
        })
        .collect();

    Ok(DependencyOrder {
        order: walk.order,
        blocked,
    })
}
