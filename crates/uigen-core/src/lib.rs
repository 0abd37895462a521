pub mod build;
pub mod cache;
pub mod config;
pub mod di;
pub mod diagnostics;
pub mod entry;
pub mod errors;
pub mod fs;
pub mod graph;
pub mod module_resolver;
pub mod scanner;
pub mod span;

pub use build::{BuildResult, Builder, BuiltModule, CancellationToken};
pub use config::{BuildConfig, BuildOptions, CliOverrides, StrictLevel};
pub use di::Container;
pub use diagnostics::{
    has_errors, Diagnostic, DiagnosticHandler, DiagnosticKind, DiagnosticLevel,
};
pub use errors::{BuildError, ConfigError, ResolveError, StoreError, UigenError};
pub use fs::{File, ProjectState, StoreSnapshot, VirtualFileStore};
pub use graph::DependencyGraph;
pub use module_resolver::{ModuleResolver, Resolution};
pub use scanner::{ImportKind, ModuleRecord};
pub use span::Span;
