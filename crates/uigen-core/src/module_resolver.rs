use crate::config::BuildOptions;
use crate::errors::ResolveError;
use crate::fs::{path, FileSource};
use serde::Serialize;

/// Where an import specifier points
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "target", rename_all = "camelCase")]
pub enum Resolution {
    /// Absolute store path of a project file
    Internal(String),
    /// Package supplied by the host, kept as written
    External(String),
}

impl Resolution {
    pub fn internal_path(&self) -> Option<&str> {
        match self {
            Resolution::Internal(p) => Some(p),
            Resolution::External(_) => None,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Resolution::External(_))
    }
}

/// How a specifier is interpreted before any probing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
    Alias,
    Relative,
    Absolute,
    Package,
}

/// Resolves import specifiers against a set of store paths
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    alias_prefix: String,
    extensions: Vec<String>,
    resolve_index_files: bool,
}

impl Default for ModuleResolver {
    fn default() -> Self {
        Self::new(&BuildOptions::default())
    }
}

impl ModuleResolver {
    pub fn new(options: &BuildOptions) -> Self {
        Self {
            alias_prefix: options.alias_prefix.clone(),
            extensions: options.extensions.clone(),
            resolve_index_files: options.resolve_index_files,
        }
    }

    pub fn classify(&self, specifier: &str) -> SpecifierKind {
        if specifier.starts_with(&self.alias_prefix) {
            SpecifierKind::Alias
        } else if specifier == "."
            || specifier == ".."
            || specifier.starts_with("./")
            || specifier.starts_with("../")
        {
            SpecifierKind::Relative
        } else if specifier.starts_with('/') {
            SpecifierKind::Absolute
        } else {
            SpecifierKind::Package
        }
    }

    /// Resolve `specifier` as imported from the file `from`.
    ///
    /// Pure over `files`: the same inputs always give the same answer.
    pub fn resolve(
        &self,
        files: &dyn FileSource,
        from: &str,
        specifier: &str,
    ) -> Result<Resolution, ResolveError> {
        let invalid = |reason: String| ResolveError::InvalidPath {
            specifier: specifier.to_string(),
            from: from.to_string(),
            reason,
        };

        if specifier.trim().is_empty() {
            return Err(invalid("empty specifier".to_string()));
        }

        let kind = self.classify(specifier);
        let base = match kind {
            SpecifierKind::Package => return Ok(Resolution::External(specifier.to_string())),
            SpecifierKind::Alias => {
                let rest = &specifier[self.alias_prefix.len()..];
                if rest.trim_matches('/').is_empty() {
                    return Err(invalid(format!(
                        "'{}' names no file after the alias",
                        self.alias_prefix
                    )));
                }
                path::join(path::ROOT, rest)
            }
            SpecifierKind::Relative => path::join(path::parent(from), specifier),
            SpecifierKind::Absolute => path::join(path::ROOT, specifier),
        }
        .map_err(|e| invalid(reason_of(e)))?;

        let names_directory = specifier.ends_with('/')
            || specifier.ends_with("/.")
            || specifier.ends_with("/..")
            || specifier == "."
            || specifier == "..";

        let tried = self.candidates(&base, names_directory);
        match tried.iter().find(|candidate| files.contains(candidate)) {
            Some(found) => Ok(Resolution::Internal(found.clone())),
            None => Err(ResolveError::ModuleNotFound {
                specifier: specifier.to_string(),
                from: from.to_string(),
                tried,
            }),
        }
    }

    /// Paths probed for `base`, in priority order
    pub fn candidates(&self, base: &str, names_directory: bool) -> Vec<String> {
        let mut out = Vec::new();
        if !names_directory && base != path::ROOT {
            if path::extension(base).is_some() {
                out.push(base.to_string());
            }
            for ext in &self.extensions {
                if !base.ends_with(ext.as_str()) {
                    out.push(format!("{}{}", base, ext));
                }
            }
        }
        if self.resolve_index_files {
            let dir = base.trim_end_matches('/');
            for ext in &self.extensions {
                out.push(format!("{}/index{}", dir, ext));
            }
        }
        out
    }
}

fn reason_of(err: crate::errors::StoreError) -> String {
    match err {
        crate::errors::StoreError::InvalidPath { reason, .. } => reason,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::VirtualFileStore;

    fn snapshot(paths: &[&str]) -> crate::fs::StoreSnapshot {
        let store = VirtualFileStore::with_files(paths.iter().map(|p| (*p, ""))).unwrap();
        store.snapshot()
    }

    #[test]
    fn test_alias_resolves_from_root() {
        let files = snapshot(&["/App.jsx", "/components/Calculator.jsx"]);
        let resolver = ModuleResolver::default();
        assert_eq!(
            resolver
                .resolve(&files, "/App.jsx", "@/components/Calculator")
                .unwrap(),
            Resolution::Internal("/components/Calculator.jsx".to_string())
        );
        assert_eq!(
            resolver
                .resolve(&files, "/deep/nested/File.jsx", "@/components/Calculator")
                .unwrap(),
            Resolution::Internal("/components/Calculator.jsx".to_string())
        );
    }

    #[test]
    fn test_relative_resolution() {
        let files = snapshot(&["/components/Button.jsx", "/utils/math.js"]);
        let resolver = ModuleResolver::default();
        assert_eq!(
            resolver
                .resolve(&files, "/components/Calculator.jsx", "./Button")
                .unwrap(),
            Resolution::Internal("/components/Button.jsx".to_string())
        );
        assert_eq!(
            resolver
                .resolve(&files, "/components/Calculator.jsx", "../utils/math")
                .unwrap(),
            Resolution::Internal("/utils/math.js".to_string())
        );
    }

    #[test]
    fn test_extension_priority() {
        let files = snapshot(&["/lib/a.ts", "/lib/a.js", "/lib/a.jsx"]);
        let resolver = ModuleResolver::default();
        assert_eq!(
            resolver.resolve(&files, "/App.jsx", "@/lib/a").unwrap(),
            Resolution::Internal("/lib/a.jsx".to_string())
        );
    }

    #[test]
    fn test_explicit_extension_matched_exactly() {
        let files = snapshot(&["/styles.css", "/lib/a.js"]);
        let resolver = ModuleResolver::default();
        assert_eq!(
            resolver.resolve(&files, "/App.jsx", "./styles.css").unwrap(),
            Resolution::Internal("/styles.css".to_string())
        );
        assert_eq!(
            resolver.resolve(&files, "/App.jsx", "@/lib/a.js").unwrap(),
            Resolution::Internal("/lib/a.js".to_string())
        );
    }

    #[test]
    fn test_index_files() {
        let files = snapshot(&["/components/index.js"]);
        let resolver = ModuleResolver::default();
        assert_eq!(
            resolver.resolve(&files, "/App.jsx", "@/components").unwrap(),
            Resolution::Internal("/components/index.js".to_string())
        );
        assert_eq!(
            resolver.resolve(&files, "/App.jsx", "./components/").unwrap(),
            Resolution::Internal("/components/index.js".to_string())
        );

        let options = BuildOptions {
            resolve_index_files: false,
            ..Default::default()
        };
        assert!(ModuleResolver::new(&options)
            .resolve(&files, "/App.jsx", "@/components")
            .is_err());
    }

    #[test]
    fn test_packages_are_external() {
        let files = snapshot(&[]);
        let resolver = ModuleResolver::default();
        for spec in ["react", "react-dom/client", "@heroicons/react/24/solid", "https://esm.sh/x"] {
            assert_eq!(
                resolver.resolve(&files, "/App.jsx", spec).unwrap(),
                Resolution::External(spec.to_string())
            );
        }
    }

    #[test]
    fn test_not_found_lists_candidates() {
        let files = snapshot(&[]);
        let resolver = ModuleResolver::default();
        let err = resolver
            .resolve(&files, "/App.jsx", "@/components/Nope")
            .unwrap_err();
        let ResolveError::ModuleNotFound { tried, .. } = err else {
            panic!("expected ModuleNotFound, got {:?}", err);
        };
        assert_eq!(
            &tried[..4],
            &[
                "/components/Nope.jsx",
                "/components/Nope.js",
                "/components/Nope.tsx",
                "/components/Nope.ts"
            ]
        );
        assert_eq!(tried[4], "/components/Nope/index.jsx");
    }

    #[test]
    fn test_invalid_specifiers() {
        let files = snapshot(&["/App.jsx"]);
        let resolver = ModuleResolver::default();
        assert!(matches!(
            resolver.resolve(&files, "/App.jsx", "@/"),
            Err(ResolveError::InvalidPath { .. })
        ));
        assert!(matches!(
            resolver.resolve(&files, "/App.jsx", "../../outside"),
            Err(ResolveError::InvalidPath { .. })
        ));
        assert!(matches!(
            resolver.resolve(&files, "/App.jsx", ""),
            Err(ResolveError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_absolute_specifier() {
        let files = snapshot(&["/lib/x.js"]);
        let resolver = ModuleResolver::default();
        assert_eq!(
            resolver.resolve(&files, "/a/b/c.jsx", "/lib/x").unwrap(),
            Resolution::Internal("/lib/x.js".to_string())
        );
    }

    #[test]
    fn test_custom_alias() {
        let files = snapshot(&["/components/Button.jsx"]);
        let options = BuildOptions {
            alias_prefix: "~/".to_string(),
            ..Default::default()
        };
        let resolver = ModuleResolver::new(&options);
        assert!(resolver
            .resolve(&files, "/App.jsx", "~/components/Button")
            .is_ok());
        assert_eq!(
            resolver.resolve(&files, "/App.jsx", "@/components/Button").unwrap(),
            Resolution::External("@/components/Button".to_string())
        );
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let files = snapshot(&["/components/Calculator.jsx", "/components/Calculator.tsx"]);
        let resolver = ModuleResolver::default();
        let first = resolver.resolve(&files, "/App.jsx", "@/components/Calculator");
        for _ in 0..10 {
            assert_eq!(
                resolver.resolve(&files, "/App.jsx", "@/components/Calculator"),
                first
            );
        }
    }
}
