use crate::span::Span;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Error,
    Warning,
    Info,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticLevel::Error => "error",
            DiagnosticLevel::Warning => "warning",
            DiagnosticLevel::Info => "info",
        };
        f.write_str(s)
    }
}

/// What went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticKind {
    /// A store operation named a path that is not in the store. Builds
    /// never emit it; hosts get it from `StoreError::to_diagnostic`.
    NotFound,
    /// An import specifier did not resolve to any file
    ModuleNotFound,
    /// A chain of eager imports leads back to itself
    CyclicImport,
    /// The entry file does not exist
    MissingEntry,
    /// The entry file has no default export
    MissingDefaultExport,
    /// The entry file has more than one default export
    DuplicateDefaultExport,
    /// A path or specifier escapes the project root or is malformed
    InvalidPath,
    /// The source could not be scanned (unterminated comment or template)
    ParseError,
    /// `import()` with a non-literal argument
    UnanalyzableImport,
    /// A source file that nothing reachable from the entry imports
    UnreachableFile,
}

impl DiagnosticKind {
    /// Stable kebab-case code, used in rendered output
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::NotFound => "not-found",
            DiagnosticKind::ModuleNotFound => "module-not-found",
            DiagnosticKind::CyclicImport => "cyclic-import",
            DiagnosticKind::MissingEntry => "missing-entry",
            DiagnosticKind::MissingDefaultExport => "missing-default-export",
            DiagnosticKind::DuplicateDefaultExport => "duplicate-default-export",
            DiagnosticKind::InvalidPath => "invalid-path",
            DiagnosticKind::ParseError => "parse-error",
            DiagnosticKind::UnanalyzableImport => "unanalyzable-import",
            DiagnosticKind::UnreachableFile => "unreachable-file",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A diagnostic message attributed to a file in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub kind: DiagnosticKind,
    /// File the diagnostic is attributed to (the importer for import errors)
    pub path: String,
    #[serde(default, skip_serializing_if = "Span::is_dummy")]
    pub span: Span,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specifier: Option<String>,
    /// Full cycle, first node repeated at the end
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle: Option<Vec<String>>,
}

impl Diagnostic {
    pub fn new(
        level: DiagnosticLevel,
        kind: DiagnosticKind,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level,
            kind,
            path: path.into(),
            span: Span::dummy(),
            message: message.into(),
            specifier: None,
            cycle: None,
        }
    }

    pub fn error(kind: DiagnosticKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Error, kind, path, message)
    }

    pub fn warning(
        kind: DiagnosticKind,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(DiagnosticLevel::Warning, kind, path, message)
    }

    pub fn info(kind: DiagnosticKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Info, kind, path, message)
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_specifier(mut self, specifier: impl Into<String>) -> Self {
        self.specifier = Some(specifier.into());
        self
    }

    pub fn with_cycle(mut self, cycle: Vec<String>) -> Self {
        self.cycle = Some(cycle);
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagnosticLevel::Error
    }

    /// `path` or `path:line:column`
    pub fn location(&self) -> String {
        if self.span.is_dummy() {
            self.path.clone()
        } else {
            format!("{}:{}", self.path, self.span)
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] {}: {}",
            self.level,
            self.kind,
            self.location(),
            self.message
        )
    }
}

/// True if any diagnostic has error severity
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Trait for handling diagnostics
/// This allows for dependency injection and testing with mock handlers
pub trait DiagnosticHandler: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);

    fn error(&self, kind: DiagnosticKind, path: &str, message: &str) {
        self.report(Diagnostic::error(kind, path, message));
    }

    fn warning(&self, kind: DiagnosticKind, path: &str, message: &str) {
        self.report(Diagnostic::warning(kind, path, message));
    }

    fn info(&self, kind: DiagnosticKind, path: &str, message: &str) {
        self.report(Diagnostic::info(kind, path, message));
    }

    fn has_errors(&self) -> bool;
    fn error_count(&self) -> usize;
    fn warning_count(&self) -> usize;
    fn get_diagnostics(&self) -> Vec<Diagnostic>;
}

fn count_level(diagnostics: &[Diagnostic], level: DiagnosticLevel) -> usize {
    diagnostics.iter().filter(|d| d.level == level).count()
}

fn lock(diagnostics: &Mutex<Vec<Diagnostic>>) -> MutexGuard<'_, Vec<Diagnostic>> {
    diagnostics.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Console-based diagnostic handler that prints to stderr
pub struct ConsoleDiagnosticHandler {
    diagnostics: Mutex<Vec<Diagnostic>>,
    pretty: bool,
}

impl ConsoleDiagnosticHandler {
    pub fn new(pretty: bool) -> Self {
        Self {
            diagnostics: Mutex::new(Vec::new()),
            pretty,
        }
    }
}

impl DiagnosticHandler for ConsoleDiagnosticHandler {
    fn report(&self, diagnostic: Diagnostic) {
        if self.pretty {
            let color = match diagnostic.level {
                DiagnosticLevel::Error => "\x1b[1;31m",
                DiagnosticLevel::Warning => "\x1b[1;33m",
                DiagnosticLevel::Info => "\x1b[1m",
            };
            eprintln!(
                "{}{}\x1b[0m[{}] \x1b[1m{}\x1b[0m: {}",
                color,
                diagnostic.level,
                diagnostic.kind,
                diagnostic.location(),
                diagnostic.message
            );
        } else {
            eprintln!("{}", diagnostic);
        }
        if let Some(cycle) = &diagnostic.cycle {
            eprintln!("    cycle: {}", cycle.join(" -> "));
        }

        lock(&self.diagnostics).push(diagnostic);
    }

    fn has_errors(&self) -> bool {
        has_errors(&lock(&self.diagnostics))
    }

    fn error_count(&self) -> usize {
        count_level(&lock(&self.diagnostics), DiagnosticLevel::Error)
    }

    fn warning_count(&self) -> usize {
        count_level(&lock(&self.diagnostics), DiagnosticLevel::Warning)
    }

    fn get_diagnostics(&self) -> Vec<Diagnostic> {
        lock(&self.diagnostics).clone()
    }
}

/// Collecting diagnostic handler for testing
/// Collects all diagnostics without printing
pub struct CollectingDiagnosticHandler {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl CollectingDiagnosticHandler {
    pub fn new() -> Self {
        Self {
            diagnostics: Mutex::new(Vec::new()),
        }
    }

    pub fn clear(&self) {
        lock(&self.diagnostics).clear();
    }
}

impl Default for CollectingDiagnosticHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticHandler for CollectingDiagnosticHandler {
    fn report(&self, diagnostic: Diagnostic) {
        lock(&self.diagnostics).push(diagnostic);
    }

    fn has_errors(&self) -> bool {
        has_errors(&lock(&self.diagnostics))
    }

    fn error_count(&self) -> usize {
        count_level(&lock(&self.diagnostics), DiagnosticLevel::Error)
    }

    fn warning_count(&self) -> usize {
        count_level(&lock(&self.diagnostics), DiagnosticLevel::Warning)
    }

    fn get_diagnostics(&self) -> Vec<Diagnostic> {
        lock(&self.diagnostics).clone()
    }
}
