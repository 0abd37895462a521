//! Helpers that load fixtures into a store and build them

use std::sync::Arc;
use uigen_core::config::{BuildConfig, BuildOptions};
use uigen_core::{BuildResult, Builder, Container, VirtualFileStore};

use crate::fixtures::Project;
use crate::mocks::MockDiagnosticHandler;

/// Store holding every file of `project`
pub fn store(project: Project) -> VirtualFileStore {
    VirtualFileStore::with_files(project.iter().copied()).expect("fixture paths are valid")
}

/// Build `project` from `/App.jsx` with default options
pub fn build(project: Project) -> BuildResult {
    build_with(project, BuildOptions::default())
}

pub fn build_with(project: Project, options: BuildOptions) -> BuildResult {
    Builder::new(options)
        .build(&store(project), "/App.jsx")
        .expect("build was not cancelled")
}

/// Session container over `project` that reports into a mock handler
pub fn container(project: Project) -> (Container, Arc<MockDiagnosticHandler>) {
    let handler = MockDiagnosticHandler::new();
    let container = Container::with_dependencies(
        BuildConfig::default(),
        handler.clone(),
        Arc::new(store(project)),
    );
    (container, handler)
}
