//! Mock implementations for testing

use std::sync::{Arc, Mutex, MutexGuard};
use uigen_core::diagnostics::{Diagnostic, DiagnosticHandler, DiagnosticKind, DiagnosticLevel};

/// A mock diagnostic handler that collects diagnostics
#[derive(Debug, Default)]
pub struct MockDiagnosticHandler {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl MockDiagnosticHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        self.diagnostics.lock().unwrap()
    }

    /// Kinds of every reported diagnostic, in report order
    pub fn kinds(&self) -> Vec<DiagnosticKind> {
        self.lock().iter().map(|d| d.kind).collect()
    }

    /// Rendered diagnostics, one per line
    pub fn rendered(&self) -> String {
        self.lock()
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl DiagnosticHandler for MockDiagnosticHandler {
    fn report(&self, diagnostic: Diagnostic) {
        self.lock().push(diagnostic);
    }

    fn has_errors(&self) -> bool {
        self.lock().iter().any(|d| d.level == DiagnosticLevel::Error)
    }

    fn error_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Error)
            .count()
    }

    fn warning_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Warning)
            .count()
    }

    fn get_diagnostics(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }
}
