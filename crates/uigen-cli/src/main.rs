use anyhow::Context;
use clap::Parser;
use glob::Pattern;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use uigen_core::cache::{hash_config, InvalidationEngine, ModuleCache};
use uigen_core::config::{BuildConfig, CliOverrides, StrictLevel};
use uigen_core::diagnostics::{
    CollectingDiagnosticHandler, ConsoleDiagnosticHandler, DiagnosticHandler,
};
use uigen_core::{BuildResult, Builder, Container, StoreError, VirtualFileStore};
use walkdir::WalkDir;

const CONFIG_FILES: [&str; 3] = ["uigen.json", "uigen.yaml", "uigen.yml"];

/// UIGen - build a generated React project from a directory
#[derive(Parser, Debug, Clone)]
#[command(name = "uigen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project directory loaded into the virtual store
    #[arg(value_name = "DIR", default_value = ".")]
    dir: PathBuf,

    /// Entry file, as a store path
    #[arg(long, value_name = "PATH", default_value = "/App.jsx")]
    entry: String,

    /// Path to a uigen.json or uigen.yaml configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write a default uigen.json into DIR and exit
    #[arg(long)]
    init: bool,

    /// Print the build result as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Rebuild whenever a file under DIR changes
    #[arg(short, long)]
    watch: bool,

    /// Module cache persisted between runs
    #[arg(long, value_name = "FILE")]
    cache_file: Option<PathBuf>,

    /// Severity of import cycles (error, warning, off)
    #[arg(long, value_name = "LEVEL")]
    cyclic_imports: Option<String>,

    /// Severity of source files the entry never imports (error, warning, off)
    #[arg(long, value_name = "LEVEL")]
    unreachable_files: Option<String>,

    /// Import prefix that maps to DIR, e.g. "~/"
    #[arg(long, value_name = "PREFIX")]
    alias_prefix: Option<String>,

    /// Skip paths matching GLOB; repeatable, replaces the configured list
    #[arg(long, value_name = "GLOB")]
    exclude: Vec<String>,

    /// Keep package imports as bare specifiers instead of CDN URLs
    #[arg(long)]
    no_cdn: bool,

    /// Plain diagnostics without ANSI colors
    #[arg(long)]
    no_pretty: bool,
}

fn main() -> anyhow::Result<()> {
    // Set RUST_LOG=debug for detailed logs
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.init {
        let path = cli.dir.join("uigen.json");
        if path.exists() {
            anyhow::bail!("{} already exists", path.display());
        }
        BuildConfig::init_file(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Created {}", path.display());
        return Ok(());
    }

    if !cli.dir.is_dir() {
        anyhow::bail!("{} is not a directory", cli.dir.display());
    }

    let config = load_config(&cli)?;
    let store = Arc::new(load_project(&cli.dir, &config.exclude)?);
    info!(files = store.len(), dir = %cli.dir.display(), "Loaded project");

    let handler: Arc<dyn DiagnosticHandler> = if cli.json {
        Arc::new(CollectingDiagnosticHandler::new())
    } else {
        Arc::new(ConsoleDiagnosticHandler::new(config.build_options.pretty))
    };
    let builder = load_builder(&cli, &config);
    let container = Container::with_dependencies(config, handler, store).with_builder(builder);

    if cli.watch {
        return watch_mode(&cli, &container);
    }

    let result = container.build(&cli.entry)?;
    report(&cli, &result)?;
    save_cache(&cli, &container);

    if !result.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn parse_level(flag: &str, value: &str) -> anyhow::Result<StrictLevel> {
    StrictLevel::parse(value).with_context(|| format!("Invalid value for --{}", flag))
}

/// Load configuration from --config, else from DIR, then apply CLI flags
fn load_config(cli: &Cli) -> anyhow::Result<BuildConfig> {
    let mut config = match &cli.config {
        Some(path) => BuildConfig::from_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config file: {}", e))?,
        None => match CONFIG_FILES
            .iter()
            .map(|name| cli.dir.join(name))
            .find(|path| path.exists())
        {
            Some(path) => BuildConfig::from_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load {}: {}", path.display(), e))?,
            None => BuildConfig::default(),
        },
    };

    let mut overrides = CliOverrides::default();
    if let Some(level) = &cli.cyclic_imports {
        overrides.cyclic_imports = Some(parse_level("cyclic-imports", level)?);
    }
    if let Some(level) = &cli.unreachable_files {
        overrides.unreachable_files = Some(parse_level("unreachable-files", level)?);
    }
    if let Some(prefix) = &cli.alias_prefix {
        overrides.alias_prefix = Some(prefix.clone());
    }
    if !cli.exclude.is_empty() {
        overrides.exclude = Some(cli.exclude.clone());
    }
    if cli.no_cdn {
        overrides.external_cdn = Some(None);
    }
    if cli.no_pretty || cli.json {
        overrides.pretty = Some(false);
    }
    config.merge(&overrides);
    config
        .build_options
        .validate()
        .context("Invalid build options")?;

    debug!(?config, "Resolved configuration");
    Ok(config)
}

/// Store path for a file under `root`, or `None` when it cannot be expressed
fn store_path(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    let mut out = String::new();
    for component in relative.components() {
        out.push('/');
        out.push_str(component.as_os_str().to_str()?);
    }
    (!out.is_empty()).then_some(out)
}

fn compile_excludes(exclude: &[String]) -> anyhow::Result<Vec<Pattern>> {
    exclude
        .iter()
        .map(|p| Pattern::new(p).with_context(|| format!("Invalid exclude pattern '{}'", p)))
        .collect()
}

fn is_excluded(patterns: &[Pattern], store_path: &str) -> bool {
    let relative = store_path.trim_start_matches('/');
    patterns
        .iter()
        .any(|p| p.matches(relative) || p.matches(store_path))
}

/// Read every UTF-8 file under `dir` into a fresh store
fn load_project(dir: &Path, exclude: &[String]) -> anyhow::Result<VirtualFileStore> {
    let patterns = compile_excludes(exclude)?;
    let store = VirtualFileStore::new();

    // Sorted so files get the same versions on every run
    let walker = WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();
    for entry in walker.filter_entry(|e| {
        e.depth() == 0
            || store_path(dir, e.path())
                .map(|p| !is_excluded(&patterns, &format!("{}/", p)) && !is_excluded(&patterns, &p))
                .unwrap_or(false)
    }) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(path) = store_path(dir, entry.path()) else {
            continue;
        };
        if CONFIG_FILES.iter().any(|name| path == format!("/{}", name)) {
            continue;
        }
        match std::fs::read_to_string(entry.path()) {
            Ok(content) => {
                if let Err(e) = store.write(&path, content) {
                    warn!(path = %entry.path().display(), error = %e, "Skipping file");
                }
            }
            Err(e) => warn!(path = %entry.path().display(), error = %e, "Skipping unreadable file"),
        }
    }
    Ok(store)
}

/// Builder seeded from --cache-file when that cache matches the options
fn load_builder(cli: &Cli, config: &BuildConfig) -> Builder {
    let options = config.build_options.clone();
    let Some(path) = &cli.cache_file else {
        return Builder::new(options);
    };
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return Builder::new(options),
    };
    match ModuleCache::from_json(&content, &hash_config(&options)) {
        Ok(cache) => Builder::with_cache(options, cache),
        Err(e) => {
            warn!(error = %e, "Ignoring module cache");
            Builder::new(options)
        }
    }
}

fn save_cache(cli: &Cli, container: &Container) {
    let Some(path) = &cli.cache_file else {
        return;
    };
    let written = container
        .builder()
        .with_module_cache(|cache| cache.to_json())
        .map_err(anyhow::Error::from)
        .and_then(|json| std::fs::write(path, json).map_err(anyhow::Error::from));
    if let Err(e) = written {
        warn!(path = %path.display(), error = %e, "Failed to save module cache");
    }
}

fn report(cli: &Cli, result: &BuildResult) -> anyhow::Result<()> {
    if cli.json {
        println!("{}", result.to_json()?);
        return Ok(());
    }

    if result.is_success() {
        println!(
            "Built {}: {} module(s), {} external package(s), {} warning(s)",
            result.entry,
            result.modules.len(),
            result.externals.len(),
            result.warning_count()
        );
        for module in &result.modules {
            println!("  {}", module.path);
        }
    } else {
        println!(
            "Build of {} failed with {} error(s) and {} warning(s)",
            result.entry,
            result.error_count(),
            result.warning_count()
        );
    }
    Ok(())
}

/// Mirror one changed disk path into the store
fn sync_path(
    dir: &Path,
    patterns: &[Pattern],
    store: &VirtualFileStore,
    disk_path: &Path,
) -> Result<(), StoreError> {
    let Some(path) = store_path(dir, disk_path) else {
        return Ok(());
    };
    if is_excluded(patterns, &path) || CONFIG_FILES.iter().any(|n| path == format!("/{}", n)) {
        return Ok(());
    }

    if disk_path.is_file() {
        let content = match std::fs::read_to_string(disk_path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %disk_path.display(), error = %e, "Skipping unreadable file");
                return Ok(());
            }
        };
        if store.read(&path).ok().as_deref() != Some(content.as_str()) {
            store.write(&path, content)?;
        }
        return Ok(());
    }

    if disk_path.is_dir() {
        return Ok(());
    }

    // Gone from disk: drop the file or everything under the directory
    let prefix = format!("{}/", path);
    let doomed: Vec<String> = store
        .list()
        .into_iter()
        .filter(|p| *p == path || p.starts_with(&prefix))
        .collect();
    for p in &doomed {
        store.delete(p)?;
    }
    Ok(())
}

/// Watch mode - rebuild on file changes
fn watch_mode(cli: &Cli, container: &Container) -> anyhow::Result<()> {
    use notify::{Event, EventKind, RecursiveMode, Watcher};
    use std::collections::BTreeSet;
    use std::sync::mpsc::{channel, RecvTimeoutError};
    use std::time::Duration;

    let dir = cli.dir.canonicalize()?;
    let patterns = compile_excludes(&container.config().exclude)?;

    println!("Watching {} for changes... (Press Ctrl+C to stop)", dir.display());
    let mut previous = container.build(&cli.entry)?;
    report(cli, &previous)?;
    save_cache(cli, container);

    let (tx, rx) = channel();
    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        if let Ok(event) = res {
            let _ = tx.send(event);
        }
    })?;
    watcher.watch(&dir, RecursiveMode::Recursive)?;

    let debounce_duration = Duration::from_millis(100);
    let mut pending: BTreeSet<PathBuf> = BTreeSet::new();

    loop {
        match rx.recv_timeout(debounce_duration) {
            Ok(event) => {
                if matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                ) {
                    pending.extend(event.paths);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if pending.is_empty() {
                    continue;
                }
                let generation = container.store().generation();
                for path in std::mem::take(&mut pending) {
                    if let Err(e) = sync_path(&dir, &patterns, container.store(), &path) {
                        let Some(diagnostic) = e.to_diagnostic() else {
                            return Err(e.into());
                        };
                        container.diagnostic_handler().report(diagnostic);
                    }
                }
                if container.store().generation() == generation {
                    continue;
                }

                println!("\nFiles changed, rebuilding...");
                let result = container.build(&cli.entry)?;
                let stale = InvalidationEngine::stale_between(&previous, &result);
                info!(
                    stale = stale.len(),
                    modules = ?stale,
                    "Modules to re-evaluate"
                );
                report(cli, &result)?;
                save_cache(cli, container);
                previous = result;
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(anyhow::anyhow!("File watcher disconnected"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uigen_core::diagnostics::DiagnosticKind;

    #[test]
    fn test_store_path() {
        let root = Path::new("/tmp/project");
        assert_eq!(
            store_path(root, Path::new("/tmp/project/components/Button.jsx")).as_deref(),
            Some("/components/Button.jsx")
        );
        assert_eq!(store_path(root, root), None);
        assert_eq!(store_path(root, Path::new("/elsewhere/App.jsx")), None);
    }

    #[test]
    fn test_default_excludes() {
        let patterns = compile_excludes(&BuildConfig::default().exclude).unwrap();
        assert!(is_excluded(&patterns, "/node_modules/react/index.js"));
        assert!(is_excluded(&patterns, "/web/dist/bundle.js"));
        assert!(!is_excluded(&patterns, "/components/Button.jsx"));
    }

    #[test]
    fn test_sync_path_mirrors_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path();
        let store = VirtualFileStore::new();
        let patterns = compile_excludes(&[]).unwrap();

        std::fs::create_dir_all(root.join("components")).unwrap();
        let file = root.join("components/Card.jsx");
        std::fs::write(&file, "export default 1").unwrap();
        sync_path(root, &patterns, &store, &file).unwrap();
        let generation = store.generation();
        sync_path(root, &patterns, &store, &file).unwrap();
        assert_eq!(store.generation(), generation);
        assert_eq!(store.read("/components/Card.jsx").unwrap(), "export default 1");

        std::fs::remove_dir_all(root.join("components")).unwrap();
        sync_path(root, &patterns, &store, &root.join("components")).unwrap();
        assert!(store.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_unrepresentable_paths_are_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path();
        let patterns = compile_excludes(&[]).unwrap();
        std::fs::write(root.join("App.jsx"), "export default 1").unwrap();
        let bad = root.join("bad\\name.jsx");
        std::fs::write(&bad, "export default 2").unwrap();

        let store = load_project(root, &[]).unwrap();
        assert_eq!(store.list(), vec!["/App.jsx"]);

        let err = sync_path(root, &patterns, &store, &bad).unwrap_err();
        let diagnostic = err.to_diagnostic().unwrap();
        assert_eq!(diagnostic.kind, DiagnosticKind::InvalidPath);
        assert!(diagnostic.is_error());
    }

    #[test]
    fn test_load_project_versions_follow_path_order() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("lib")).unwrap();
        for name in ["zeta.js", "App.jsx", "lib/b.js", "lib/a.js", "beta.js"] {
            std::fs::write(root.join(name), "").unwrap();
        }

        let store = load_project(root, &[]).unwrap();
        let versions: Vec<_> = ["/App.jsx", "/beta.js", "/lib/a.js", "/lib/b.js", "/zeta.js"]
            .iter()
            .map(|p| store.version(p).unwrap())
            .collect();
        assert!(versions.windows(2).all(|w| w[0] < w[1]), "{:?}", versions);
    }
}
