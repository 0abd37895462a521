//! Dependency graph over store paths.
//!
//! Construction is two passes. The first is a depth-first walk from the
//! root that resolves every import and records nodes in visit order. The
//! second walks eager edges only, reports cycles and yields the evaluation
//! order (dependencies first, ties broken by import order).

use crate::build::CancellationToken;
use crate::config::BuildOptions;
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticLevel};
use crate::errors::{BuildError, ResolveError};
use crate::fs::StoreSnapshot;
use crate::module_resolver::{ModuleResolver, Resolution};
use crate::scanner::{ImportKind, ModuleRecord};
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// An `imports` edge between two store files
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub to: String,
    pub specifier: String,
    pub kind: ImportKind,
    /// Statement position of the import in the importing file
    pub order: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleNode {
    pub path: String,
    pub version: u64,
    /// Internal edges in import order
    pub edges: Vec<Edge>,
    /// Package specifiers in import order
    pub externals: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGraph {
    root: String,
    /// Nodes in depth-first visit order
    nodes: IndexMap<String, ModuleNode>,
    #[serde(skip)]
    reverse: FxHashMap<String, Vec<String>>,
    externals: BTreeSet<String>,
    /// Eager cycles, each with its first node repeated at the end
    cycles: Vec<Vec<String>>,
    evaluation_order: Vec<String>,
}

impl DependencyGraph {
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn node(&self, path: &str) -> Option<&ModuleNode> {
        self.nodes.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ModuleNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Files that import `path` directly
    pub fn dependents(&self, path: &str) -> &[String] {
        self.reverse.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every package specifier reached, sorted
    pub fn externals(&self) -> impl Iterator<Item = &str> {
        self.externals.iter().map(String::as_str)
    }

    pub fn cycles(&self) -> &[Vec<String>] {
        &self.cycles
    }

    pub fn has_cycles(&self) -> bool {
        !self.cycles.is_empty()
    }

    /// Reachable modules, dependencies before dependents
    pub fn evaluation_order(&self) -> &[String] {
        &self.evaluation_order
    }
}

/// Graph plus everything found while building it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphReport {
    pub graph: DependencyGraph,
    pub diagnostics: Vec<Diagnostic>,
}

/// Builds a [`DependencyGraph`] from scanned module records
pub struct GraphBuilder<'a> {
    resolver: &'a ModuleResolver,
    files: &'a StoreSnapshot,
    records: &'a FxHashMap<String, Arc<ModuleRecord>>,
    options: &'a BuildOptions,
    cancel: Option<&'a CancellationToken>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(
        resolver: &'a ModuleResolver,
        files: &'a StoreSnapshot,
        records: &'a FxHashMap<String, Arc<ModuleRecord>>,
        options: &'a BuildOptions,
    ) -> Self {
        Self {
            resolver,
            files,
            records,
            options,
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, token: &'a CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn check_cancelled(&self) -> Result<(), BuildError> {
        match self.cancel {
            Some(token) if token.is_cancelled() => Err(BuildError::Cancelled),
            _ => Ok(()),
        }
    }

    pub fn build(&self, root: &str) -> Result<GraphReport, BuildError> {
        let mut graph = DependencyGraph {
            root: root.to_string(),
            ..Default::default()
        };
        let mut diagnostics = Vec::new();

        if self.files.contains(root) {
            self.walk(root, &mut graph, &mut diagnostics)?;
            self.check_cancelled()?;
            self.order_and_cycles(&mut graph, &mut diagnostics);
        }

        debug!(
            root,
            modules = graph.len(),
            externals = graph.externals.len(),
            cycles = graph.cycles.len(),
            "built dependency graph"
        );
        Ok(GraphReport { graph, diagnostics })
    }

    /// Add `path` as a node and resolve its imports; returns internal targets
    fn visit(
        &self,
        path: &str,
        graph: &mut DependencyGraph,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Vec<String>, BuildError> {
        self.check_cancelled()?;

        let mut node = ModuleNode {
            path: path.to_string(),
            version: self.files.version(path).unwrap_or_default(),
            edges: Vec::new(),
            externals: Vec::new(),
        };

        if let Some(record) = self.records.get(path) {
            diagnostics.extend(record.diagnostics.iter().cloned());

            for import in &record.imports {
                match self.resolver.resolve(self.files, path, &import.specifier) {
                    Ok(Resolution::Internal(target)) => {
                        let dependents = graph.reverse.entry(target.clone()).or_default();
                        if !dependents.iter().any(|d| d == path) {
                            dependents.push(path.to_string());
                        }
                        node.edges.push(Edge {
                            to: target,
                            specifier: import.specifier.clone(),
                            kind: import.kind,
                            order: import.order,
                        });
                    }
                    Ok(Resolution::External(package)) => {
                        graph.externals.insert(package.clone());
                        if !node.externals.contains(&package) {
                            node.externals.push(package);
                        }
                    }
                    Err(err) => {
                        let kind = match err {
                            ResolveError::ModuleNotFound { .. } => DiagnosticKind::ModuleNotFound,
                            ResolveError::InvalidPath { .. } => DiagnosticKind::InvalidPath,
                        };
                        debug!(from = path, specifier = %import.specifier, "unresolved import");
                        diagnostics.push(
                            Diagnostic::error(kind, path, err.to_string())
                                .with_span(import.span)
                                .with_specifier(import.specifier.clone()),
                        );
                    }
                }
            }
        }

        let targets = node.edges.iter().map(|e| e.to.clone()).collect();
        graph.nodes.insert(path.to_string(), node);
        Ok(targets)
    }

    fn walk(
        &self,
        root: &str,
        graph: &mut DependencyGraph,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<(), BuildError> {
        let mut stack: Vec<std::vec::IntoIter<String>> = Vec::new();
        let targets = self.visit(root, graph, diagnostics)?;
        stack.push(targets.into_iter());

        while let Some(frame) = stack.last_mut() {
            match frame.next() {
                Some(target) if !graph.nodes.contains_key(&target) => {
                    let targets = self.visit(&target, graph, diagnostics)?;
                    stack.push(targets.into_iter());
                }
                Some(_) => {}
                None => {
                    stack.pop();
                }
            }
        }
        Ok(())
    }

    fn cycle_level(&self, cycle: &[String], root: &str) -> Option<DiagnosticLevel> {
        if cycle.iter().any(|p| p == root) {
            Some(DiagnosticLevel::Error)
        } else {
            self.options.cyclic_imports.level()
        }
    }

    /// Post-order walk over eager edges. Lazily imported modules not reached
    /// eagerly become additional starting points, in visit order.
    fn order_and_cycles(&self, graph: &mut DependencyGraph, diagnostics: &mut Vec<Diagnostic>) {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Active,
            Done,
        }

        let root = graph.root.clone();
        let mut marks: FxHashMap<&str, Mark> = FxHashMap::default();
        let mut order: Vec<String> = Vec::new();
        let mut cycles: Vec<Vec<String>> = Vec::new();
        let mut seen_cycles: FxHashSet<Vec<String>> = FxHashSet::default();

        let starts: Vec<&str> = graph.nodes.keys().map(String::as_str).collect();
        for start in starts {
            if marks.contains_key(start) {
                continue;
            }
            // (node, index of the next edge to follow)
            let mut stack: Vec<(&str, usize)> = vec![(start, 0)];
            marks.insert(start, Mark::Active);

            while let Some((current, cursor)) = stack.last().copied() {
                let Some(node) = graph.nodes.get(current) else {
                    stack.pop();
                    continue;
                };
                let next_edge = node.edges[cursor.min(node.edges.len())..]
                    .iter()
                    .position(|e| e.kind.is_eager())
                    .map(|offset| cursor + offset);

                let Some(edge_index) = next_edge else {
                    marks.insert(current, Mark::Done);
                    order.push(current.to_string());
                    stack.pop();
                    continue;
                };
                if let Some(top) = stack.last_mut() {
                    top.1 = edge_index + 1;
                }

                let edge = &node.edges[edge_index];
                match marks.get(edge.to.as_str()) {
                    Some(Mark::Done) => {}
                    Some(Mark::Active) => {
                        let Some(begin) = stack.iter().position(|(p, _)| *p == edge.to) else {
                            continue;
                        };
                        let mut cycle: Vec<String> =
                            stack[begin..].iter().map(|(p, _)| p.to_string()).collect();
                        cycle.push(edge.to.clone());

                        if !seen_cycles.insert(canonical_cycle(&cycle)) {
                            continue;
                        }
                        debug!(cycle = ?cycle, "import cycle");
                        if let Some(level) = self.cycle_level(&cycle, &root) {
                            let import_span = self
                                .records
                                .get(current)
                                .and_then(|r| r.imports.get(edge.order))
                                .map(|i| i.span)
                                .unwrap_or_default();
                            diagnostics.push(
                                Diagnostic::new(
                                    level,
                                    DiagnosticKind::CyclicImport,
                                    current,
                                    format!("Circular import: {}", cycle.join(" -> ")),
                                )
                                .with_span(import_span)
                                .with_specifier(edge.specifier.clone())
                                .with_cycle(cycle.clone()),
                            );
                        }
                        cycles.push(cycle);
                    }
                    None => {
                        if let Some((to, _)) = graph.nodes.get_key_value(edge.to.as_str()) {
                            marks.insert(to.as_str(), Mark::Active);
                            stack.push((to.as_str(), 0));
                        }
                    }
                }
            }
        }

        graph.cycles = cycles;
        graph.evaluation_order = order;
    }
}

/// Rotation of `cycle` (closed, first node repeated) starting at its
/// smallest path, without the closing repeat
fn canonical_cycle(cycle: &[String]) -> Vec<String> {
    let open = &cycle[..cycle.len().saturating_sub(1)];
    let start = open
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    open[start..].iter().chain(&open[..start]).cloned().collect()
}
