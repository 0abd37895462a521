use crate::cache::{hash_config, ModuleCache};
use crate::config::BuildOptions;
use crate::diagnostics::{has_errors, Diagnostic, DiagnosticKind, DiagnosticLevel};
use crate::entry::EntryValidator;
use crate::errors::BuildError;
use crate::fs::{path, StoreSnapshot, VirtualFileStore};
use crate::graph::{DependencyGraph, GraphBuilder};
use crate::module_resolver::{ModuleResolver, Resolution};
use crate::scanner::{self, ModuleRecord};
use indexmap::IndexMap;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Shared flag that asks a running build to stop
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A module ready for the host to evaluate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltModule {
    pub path: String,
    pub version: u64,
    pub source: Arc<str>,
    /// Every specifier in the file, in import order, mapped to its target.
    /// External targets are CDN URLs when a CDN prefix is configured.
    pub import_map: IndexMap<String, Resolution>,
}

/// Outcome of one build; never mutated after it is returned
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    pub entry: String,
    /// Empty when the build has errors
    pub evaluation_order: Vec<String>,
    /// Built modules in evaluation order; empty when the build has errors
    pub modules: Vec<BuiltModule>,
    pub externals: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
    /// Snapshot version of every file in the graph
    pub versions: BTreeMap<String, u64>,
    #[serde(skip)]
    pub graph: DependencyGraph,
}

impl BuildResult {
    pub fn is_success(&self) -> bool {
        !has_errors(&self.diagnostics)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Warning)
            .count()
    }

    pub fn module(&self, path: &str) -> Option<&BuiltModule> {
        self.modules.iter().find(|m| m.path == path)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Runs builds over store snapshots, keeping scanned records between runs.
///
/// `Builder` is `Send + Sync`; concurrent builds share the module cache.
#[derive(Debug)]
pub struct Builder {
    options: BuildOptions,
    resolver: ModuleResolver,
    validator: EntryValidator,
    cache: Mutex<ModuleCache>,
}

impl Builder {
    pub fn new(options: BuildOptions) -> Self {
        let cache = ModuleCache::new(hash_config(&options));
        Self::with_cache(options, cache)
    }

    /// Start from a previously persisted cache
    pub fn with_cache(options: BuildOptions, mut cache: ModuleCache) -> Self {
        cache.ensure_config(&hash_config(&options));
        Self {
            resolver: ModuleResolver::new(&options),
            validator: EntryValidator::new(&options),
            options,
            cache: Mutex::new(cache),
        }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn resolver(&self) -> &ModuleResolver {
        &self.resolver
    }

    fn lock_cache(&self) -> MutexGuard<'_, ModuleCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with the module cache locked
    pub fn with_module_cache<R>(&self, f: impl FnOnce(&mut ModuleCache) -> R) -> R {
        f(&mut self.lock_cache())
    }

    pub fn build(&self, store: &VirtualFileStore, entry: &str) -> Result<BuildResult, BuildError> {
        self.build_snapshot(&store.snapshot(), entry, None)
    }

    pub fn build_with_cancel(
        &self,
        store: &VirtualFileStore,
        entry: &str,
        token: &CancellationToken,
    ) -> Result<BuildResult, BuildError> {
        self.build_snapshot(&store.snapshot(), entry, Some(token))
    }

    pub fn build_snapshot(
        &self,
        snapshot: &StoreSnapshot,
        entry: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<BuildResult, BuildError> {
        let check = || match cancel {
            Some(token) if token.is_cancelled() => Err(BuildError::Cancelled),
            _ => Ok(()),
        };

        let requested = path::normalize(entry)?;
        debug!(entry = %requested, files = snapshot.len(), "build started");
        check()?;

        let records = self.refresh_records(snapshot);
        check()?;

        let entry = self.validator.select_entry(snapshot, &requested);
        let graph_builder = GraphBuilder::new(&self.resolver, snapshot, &records, &self.options);
        let report = match cancel {
            Some(token) => graph_builder.with_cancellation(token).build(&entry)?,
            None => graph_builder.build(&entry)?,
        };
        let graph = report.graph;
        let mut diagnostics = report.diagnostics;
        check()?;

        diagnostics.extend(self.validator.validate(&graph, &records));
        if !graph.is_empty() {
            diagnostics.extend(self.unreachable_files(snapshot, &graph));
        }
        check()?;

        let versions: BTreeMap<String, u64> = graph
            .nodes()
            .map(|node| (node.path.clone(), node.version))
            .collect();
        let externals: Vec<String> = graph.externals().map(str::to_string).collect();

        let (evaluation_order, modules) = if has_errors(&diagnostics) {
            (Vec::new(), Vec::new())
        } else {
            let order = graph.evaluation_order().to_vec();
            let modules = order
                .iter()
                .filter_map(|p| self.built_module(snapshot, &graph, &records, p))
                .collect();
            (order, modules)
        };

        let result = BuildResult {
            entry,
            evaluation_order,
            modules,
            externals,
            diagnostics,
            versions,
            graph,
        };
        info!(
            entry = %result.entry,
            modules = result.modules.len(),
            errors = result.error_count(),
            warnings = result.warning_count(),
            "build finished"
        );
        Ok(result)
    }

    /// Up-to-date records for every file in the snapshot
    fn refresh_records(&self, snapshot: &StoreSnapshot) -> FxHashMap<String, Arc<ModuleRecord>> {
        let (mut records, stale) = self.lock_cache().plan(snapshot);
        if stale.is_empty() {
            return records;
        }

        // Scan outside the lock so concurrent builds are not serialized
        let refreshed: Vec<_> = stale
            .par_iter()
            .map(|file| (file.file.path.clone(), file.refresh()))
            .collect();

        let mut cache = self.lock_cache();
        for (path, (module, rescanned)) in refreshed {
            let record = cache.store(path.clone(), module, rescanned);
            records.insert(path, record);
        }
        debug!(stats = ?cache.stats(), "module cache refreshed");
        records
    }

    fn unreachable_files<'s>(
        &'s self,
        snapshot: &'s StoreSnapshot,
        graph: &'s DependencyGraph,
    ) -> impl Iterator<Item = Diagnostic> + 's {
        let level = self.options.unreachable_files.level();
        snapshot
            .paths()
            .filter(move |p| scanner::is_source_file(p) && !graph.contains(p))
            .filter_map(move |p| {
                Some(Diagnostic::new(
                    level?,
                    DiagnosticKind::UnreachableFile,
                    p,
                    format!("{} is not imported from {}", p, graph.root()),
                ))
            })
    }

    fn built_module(
        &self,
        snapshot: &StoreSnapshot,
        graph: &DependencyGraph,
        records: &FxHashMap<String, Arc<ModuleRecord>>,
        module_path: &str,
    ) -> Option<BuiltModule> {
        let file = snapshot.get(module_path)?;
        let node = graph.node(module_path)?;

        let mut import_map = IndexMap::new();
        if let Some(record) = records.get(module_path) {
            for import in &record.imports {
                if import_map.contains_key(&import.specifier) {
                    continue;
                }
                let target = match node.edges.iter().find(|e| e.specifier == import.specifier) {
                    Some(edge) => Resolution::Internal(edge.to.clone()),
                    None if node.externals.contains(&import.specifier) => {
                        Resolution::External(self.external_url(&import.specifier))
                    }
                    None => continue,
                };
                import_map.insert(import.specifier.clone(), target);
            }
        }

        Some(BuiltModule {
            path: module_path.to_string(),
            version: file.version,
            source: Arc::from(file.content.as_str()),
            import_map,
        })
    }

    fn external_url(&self, package: &str) -> String {
        match &self.options.external_cdn {
            Some(cdn) if !package.contains("://") => format!("{}{}", cdn, package),
            _ => package.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrictLevel;

    fn calculator_store() -> VirtualFileStore {
        VirtualFileStore::with_files([
            (
                "/App.jsx",
                "import React from 'react';\nimport Calculator from '@/components/Calculator';\n\nexport default function App() {\n  return <Calculator />;\n}\n",
            ),
            (
                "/components/Calculator.jsx",
                "import { useState } from 'react';\nimport Button from './Button';\n\nexport default function Calculator() {\n  const [value, setValue] = useState(0);\n  return <Button onClick={() => setValue(value + 1)} />;\n}\n",
            ),
            (
                "/components/Button.jsx",
                "export default function Button({ onClick }) {\n  return <button onClick={onClick}>+</button>;\n}\n",
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_successful_build() {
        let store = calculator_store();
        let result = Builder::new(BuildOptions::default())
            .build(&store, "/App.jsx")
            .unwrap();

        assert!(result.is_success(), "{:?}", result.diagnostics);
        assert_eq!(
            result.evaluation_order,
            vec![
                "/components/Button.jsx",
                "/components/Calculator.jsx",
                "/App.jsx"
            ]
        );
        assert_eq!(result.modules.len(), 3);
        assert_eq!(result.externals, vec!["react"]);

        let app = result.module("/App.jsx").unwrap();
        assert_eq!(
            app.import_map.get("@/components/Calculator"),
            Some(&Resolution::Internal("/components/Calculator.jsx".to_string()))
        );
        assert_eq!(
            app.import_map.get("react"),
            Some(&Resolution::External("https://esm.sh/react".to_string()))
        );
    }

    #[test]
    fn test_empty_store_is_missing_entry() {
        let store = VirtualFileStore::new();
        let result = Builder::new(BuildOptions::default())
            .build(&store, "/App.jsx")
            .unwrap();

        assert!(!result.is_success());
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::MissingEntry);
        assert!(result.evaluation_order.is_empty());
        assert!(result.modules.is_empty());
    }

    #[test]
    fn test_errors_clear_evaluation_order() {
        let store = calculator_store();
        store.delete("/components/Button.jsx").unwrap();
        let result = Builder::new(BuildOptions::default())
            .build(&store, "/App.jsx")
            .unwrap();

        assert_eq!(result.error_count(), 1);
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::ModuleNotFound);
        assert_eq!(result.diagnostics[0].path, "/components/Calculator.jsx");
        assert!(result.evaluation_order.is_empty());
        assert!(result.modules.is_empty());
    }

    #[test]
    fn test_entry_errors_reported_alongside_import_errors() {
        let store = VirtualFileStore::with_files([("/App.jsx", "import x from '@/missing';")]).unwrap();
        let result = Builder::new(BuildOptions::default())
            .build(&store, "/App.jsx")
            .unwrap();
        let kinds: Vec<_> = result.diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![DiagnosticKind::ModuleNotFound, DiagnosticKind::MissingDefaultExport]
        );
    }

    #[test]
    fn test_consecutive_builds_are_identical() {
        let store = calculator_store();
        let builder = Builder::new(BuildOptions::default());
        let first = builder.build(&store, "/App.jsx").unwrap();
        let second = builder.build(&store, "/App.jsx").unwrap();
        assert_eq!(first, second);
        assert!(builder.with_module_cache(|c| c.stats().hits) >= 3);
    }

    #[test]
    fn test_unreachable_files_warn() {
        let store = calculator_store();
        store.write("/components/Unused.jsx", "export default 1").unwrap();
        store.write("/styles.css", "body {}").unwrap();
        let result = Builder::new(BuildOptions::default())
            .build(&store, "/App.jsx")
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.warning_count(), 1);
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::UnreachableFile);
        assert_eq!(result.diagnostics[0].path, "/components/Unused.jsx");

        let options = BuildOptions {
            unreachable_files: StrictLevel::Off,
            ..Default::default()
        };
        let result = Builder::new(options).build(&store, "/App.jsx").unwrap();
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_external_without_cdn() {
        let store = calculator_store();
        let options = BuildOptions {
            external_cdn: None,
            ..Default::default()
        };
        let result = Builder::new(options).build(&store, "/App.jsx").unwrap();
        let app = result.module("/App.jsx").unwrap();
        assert_eq!(
            app.import_map.get("react"),
            Some(&Resolution::External("react".to_string()))
        );
    }

    #[test]
    fn test_cancelled_build() {
        let store = calculator_store();
        let token = CancellationToken::new();
        token.cancel();
        let result = Builder::new(BuildOptions::default()).build_with_cancel(&store, "/App.jsx", &token);
        assert_eq!(result, Err(BuildError::Cancelled));
    }

    #[test]
    fn test_invalid_entry_path() {
        let store = VirtualFileStore::new();
        let result = Builder::new(BuildOptions::default()).build(&store, "/../App.jsx");
        assert!(matches!(result, Err(BuildError::Store(_))));
    }

    #[test]
    fn test_builder_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Builder>();
    }

    #[test]
    fn test_concurrent_builds_with_writes() {
        let store = Arc::new(calculator_store());
        let builder = Arc::new(Builder::new(BuildOptions::default()));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = Arc::clone(&store);
                let builder = Arc::clone(&builder);
                std::thread::spawn(move || {
                    store
                        .write(&format!("/extra/File{}.jsx", i), "export default 1")
                        .unwrap();
                    builder.build(&store, "/App.jsx").unwrap()
                })
            })
            .collect();

        for handle in handles {
            let result = handle.join().unwrap();
            assert!(result.is_success());
            assert_eq!(result.evaluation_order.len(), 3);
        }
    }
}
