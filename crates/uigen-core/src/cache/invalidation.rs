use rustc_hash::FxHashSet;
use std::collections::BTreeSet;

use crate::build::BuildResult;
use crate::graph::DependencyGraph;

/// Engine for computing which modules a change makes stale
pub struct InvalidationEngine<'a> {
    graph: &'a DependencyGraph,
}

impl<'a> InvalidationEngine<'a> {
    pub fn new(graph: &'a DependencyGraph) -> Self {
        Self { graph }
    }

    /// Changed files plus every module that transitively imports one of them
    pub fn compute_stale_modules(&self, changed_files: &[String]) -> FxHashSet<String> {
        let mut stale: FxHashSet<String> = changed_files.iter().cloned().collect();
        let mut to_process: Vec<&str> = changed_files.iter().map(String::as_str).collect();

        while let Some(changed) = to_process.pop() {
            for dependent in self.graph.dependents(changed) {
                if stale.insert(dependent.clone()) {
                    to_process.push(dependent);
                }
            }
        }

        stale
    }

    pub fn is_module_stale(&self, module_path: &str, changed_files: &[String]) -> bool {
        self.compute_stale_modules(changed_files).contains(module_path)
    }

    /// Modules a host must re-evaluate or dispose when moving from `old` to
    /// `new`: files whose version changed or that disappeared, and their
    /// dependents in either graph. Sorted.
    pub fn stale_between(old: &BuildResult, new: &BuildResult) -> BTreeSet<String> {
        let changed: Vec<String> = old
            .versions
            .iter()
            .filter(|(path, version)| new.versions.get(*path) != Some(*version))
            .map(|(path, _)| path.clone())
            .collect();

        let mut stale: BTreeSet<String> = InvalidationEngine::new(&old.graph)
            .compute_stale_modules(&changed)
            .into_iter()
            .collect();
        stale.extend(InvalidationEngine::new(&new.graph).compute_stale_modules(&changed));
        stale
    }
}
