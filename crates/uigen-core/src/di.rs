use crate::build::{BuildResult, Builder, CancellationToken};
use crate::cache::InvalidationEngine;
use crate::config::BuildConfig;
use crate::diagnostics::{ConsoleDiagnosticHandler, DiagnosticHandler};
use crate::errors::{BuildError, ResolveError, StoreError};
use crate::fs::{path, VirtualFileStore};
use crate::module_resolver::Resolution;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Dependency injection container
/// Owns the store, the builder and the diagnostic sink for one session
pub struct Container {
    config: Arc<BuildConfig>,
    diagnostic_handler: Arc<dyn DiagnosticHandler>,
    store: Arc<VirtualFileStore>,
    builder: Arc<Builder>,
    last_build: Mutex<Option<Arc<BuildResult>>>,
}

impl Container {
    /// Create a new container with production dependencies
    pub fn new(config: BuildConfig) -> Self {
        let diagnostic_handler = Arc::new(ConsoleDiagnosticHandler::new(
            config.build_options.pretty,
        ));
        Self::with_dependencies(config, diagnostic_handler, Arc::new(VirtualFileStore::new()))
    }

    /// Create a container with custom dependencies (for testing)
    pub fn with_dependencies(
        config: BuildConfig,
        diagnostic_handler: Arc<dyn DiagnosticHandler>,
        store: Arc<VirtualFileStore>,
    ) -> Self {
        let builder = Arc::new(Builder::new(config.build_options.clone()));
        Container {
            config: Arc::new(config),
            diagnostic_handler,
            store,
            builder,
            last_build: Mutex::new(None),
        }
    }

    /// Replace the builder, e.g. to start from a persisted cache
    pub fn with_builder(mut self, builder: Builder) -> Self {
        self.builder = Arc::new(builder);
        self
    }

    pub fn config(&self) -> &Arc<BuildConfig> {
        &self.config
    }

    pub fn diagnostic_handler(&self) -> &Arc<dyn DiagnosticHandler> {
        &self.diagnostic_handler
    }

    pub fn store(&self) -> &Arc<VirtualFileStore> {
        &self.store
    }

    pub fn builder(&self) -> &Arc<Builder> {
        &self.builder
    }

    fn last(&self) -> MutexGuard<'_, Option<Arc<BuildResult>>> {
        self.last_build.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn last_build(&self) -> Option<Arc<BuildResult>> {
        self.last().clone()
    }

    /// Build `entry` and report every diagnostic to the handler
    pub fn build(&self, entry: &str) -> Result<Arc<BuildResult>, BuildError> {
        let result = self.builder.build(&self.store, entry)?;
        Ok(self.finish(result))
    }

    pub fn build_with_cancel(
        &self,
        entry: &str,
        token: &CancellationToken,
    ) -> Result<Arc<BuildResult>, BuildError> {
        let result = self.builder.build_with_cancel(&self.store, entry, token)?;
        Ok(self.finish(result))
    }

    fn finish(&self, result: BuildResult) -> Arc<BuildResult> {
        for diagnostic in &result.diagnostics {
            self.diagnostic_handler.report(diagnostic.clone());
        }
        let result = Arc::new(result);
        *self.last() = Some(Arc::clone(&result));
        result
    }

    /// Delete a file, returning the modules of the last build that depended
    /// on it (directly or transitively), sorted
    pub fn delete(&self, file_path: &str) -> Result<Vec<String>, StoreError> {
        let normalized = path::normalize(file_path)?;
        self.store.delete(&normalized)?;

        let Some(last) = self.last_build() else {
            return Ok(Vec::new());
        };
        let mut dependents: Vec<String> = InvalidationEngine::new(&last.graph)
            .compute_stale_modules(std::slice::from_ref(&normalized))
            .into_iter()
            .filter(|p| *p != normalized)
            .collect();
        dependents.sort();
        Ok(dependents)
    }

    /// Resolve a specifier against the current store contents
    pub fn resolve(&self, from: &str, specifier: &str) -> Result<Resolution, ResolveError> {
        let snapshot = self.store.snapshot();
        self.builder.resolver().resolve(&snapshot, from, specifier)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostic_handler.has_errors()
    }

    pub fn error_count(&self) -> usize {
        self.diagnostic_handler.error_count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostic_handler.warning_count()
    }
}
