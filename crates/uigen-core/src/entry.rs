use crate::config::BuildOptions;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::fs::StoreSnapshot;
use crate::graph::DependencyGraph;
use crate::scanner::ModuleRecord;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Checks that the application entry exists and exports a component
#[derive(Debug, Clone)]
pub struct EntryValidator {
    candidates: Vec<String>,
}

impl EntryValidator {
    pub fn new(options: &BuildOptions) -> Self {
        Self {
            candidates: options.entry_candidates.clone(),
        }
    }

    /// The entry a build should start from.
    ///
    /// A missing `requested` that is itself an entry candidate falls back to
    /// the first candidate present in `files`.
    pub fn select_entry(&self, files: &StoreSnapshot, requested: &str) -> String {
        if files.contains(requested) || !self.candidates.iter().any(|c| c == requested) {
            return requested.to_string();
        }
        self.candidates
            .iter()
            .find(|c| files.contains(c))
            .cloned()
            .unwrap_or_else(|| requested.to_string())
    }

    pub fn validate(
        &self,
        graph: &DependencyGraph,
        records: &FxHashMap<String, Arc<ModuleRecord>>,
    ) -> Vec<Diagnostic> {
        let entry = graph.root();
        if !graph.contains(entry) {
            let message = if self.candidates.len() > 1 && self.candidates.iter().any(|c| c == entry) {
                format!(
                    "Entry file {} does not exist (looked for {})",
                    entry,
                    self.candidates.join(", ")
                )
            } else {
                format!("Entry file {} does not exist", entry)
            };
            return vec![Diagnostic::error(DiagnosticKind::MissingEntry, entry, message)];
        }

        let default_exports = records
            .get(entry)
            .map(|r| r.default_export_count)
            .unwrap_or(0);
        match default_exports {
            0 => vec![Diagnostic::error(
                DiagnosticKind::MissingDefaultExport,
                entry,
                format!("{} must export a React component as its default export", entry),
            )],
            1 => Vec::new(),
            n => vec![Diagnostic::error(
                DiagnosticKind::DuplicateDefaultExport,
                entry,
                format!("{} has {} default exports; expected exactly one", entry, n),
            )],
        }
    }
}
