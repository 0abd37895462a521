//! Property-based tests for path normalization and module resolution

use proptest::prelude::*;
use uigen_core::config::BuildOptions;
use uigen_core::fs::path;
use uigen_core::{ModuleResolver, Resolution, VirtualFileStore};

// =============================================================================
// Strategies
// =============================================================================

fn segment_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        6 => "[A-Za-z][A-Za-z0-9_-]{0,8}",
        1 => Just(".".to_string()),
        1 => Just("..".to_string()),
        1 => Just(String::new()),
    ]
}

/// Slash-joined segments, sometimes rooted, possibly climbing above the root
fn raw_path_strategy() -> impl Strategy<Value = String> {
    (any::<bool>(), prop::collection::vec(segment_strategy(), 1..8)).prop_map(
        |(rooted, segments)| {
            let joined = segments.join("/");
            if rooted {
                format!("/{}", joined)
            } else {
                joined
            }
        },
    )
}

fn module_name_strategy() -> impl Strategy<Value = String> {
    "[A-Z][a-zA-Z]{0,10}"
}

// =============================================================================
// Normalization Properties
// =============================================================================

proptest! {
    #[test]
    fn normalized_paths_are_canonical(raw in raw_path_strategy()) {
        if let Ok(normalized) = path::normalize_dir(&raw) {
            prop_assert!(normalized.starts_with('/'));
            prop_assert!(!normalized.split('/').any(|s| s == ".." || s == "."));
            prop_assert!(normalized == "/" || !normalized.ends_with('/'));
            prop_assert!(!normalized.contains("//"));
        }
    }

    #[test]
    fn normalize_is_idempotent(raw in raw_path_strategy()) {
        if let Ok(once) = path::normalize_dir(&raw) {
            prop_assert_eq!(path::normalize_dir(&once).unwrap(), once);
        }
    }

    #[test]
    fn escaping_the_root_is_rejected(depth in 1usize..5, name in module_name_strategy()) {
        let raw = format!("/{}{}.jsx", "../".repeat(depth), name);
        prop_assert!(path::normalize(&raw).is_err());
    }

    #[test]
    fn join_stays_inside_root(
        dir in prop::collection::vec("[a-z]{1,6}", 0..4),
        relative in raw_path_strategy(),
    ) {
        let base = if dir.is_empty() { "/".to_string() } else { format!("/{}", dir.join("/")) };
        if let Ok(joined) = path::join(&base, &relative) {
            prop_assert!(joined.starts_with('/'));
            prop_assert!(!joined.split('/').any(|s| s == ".."));
        }
    }
}

// =============================================================================
// Resolution Properties
// =============================================================================

proptest! {
    #[test]
    fn alias_and_absolute_specifiers_agree(
        dirs in prop::collection::vec("[a-z]{1,6}", 0..3),
        name in module_name_strategy(),
        ext in prop::sample::select(vec!["js", "jsx", "ts", "tsx"]),
    ) {
        let module = if dirs.is_empty() {
            format!("/{}", name)
        } else {
            format!("/{}/{}", dirs.join("/"), name)
        };
        let file = format!("{}.{}", module, ext);
        let store = VirtualFileStore::with_files([(file.as_str(), "export default 1")]).unwrap();
        let snapshot = store.snapshot();
        let resolver = ModuleResolver::new(&BuildOptions::default());

        let aliased = resolver.resolve(&snapshot, "/App.jsx", &format!("@{}", module));
        let absolute = resolver.resolve(&snapshot, "/App.jsx", &module);
        prop_assert_eq!(aliased.unwrap(), Resolution::Internal(file.clone()));
        prop_assert_eq!(absolute.unwrap(), Resolution::Internal(file));
    }

    #[test]
    fn resolution_is_deterministic(
        name in module_name_strategy(),
        present in prop::collection::vec(any::<bool>(), 4),
    ) {
        let extensions = ["jsx", "js", "tsx", "ts"];
        let files: Vec<(String, &str)> = extensions
            .iter()
            .zip(&present)
            .filter(|(_, p)| **p)
            .map(|(ext, _)| (format!("/components/{}.{}", name, ext), ""))
            .collect();
        let store = VirtualFileStore::with_files(files.iter().map(|(p, c)| (p.as_str(), *c))).unwrap();
        let snapshot = store.snapshot();
        let resolver = ModuleResolver::new(&BuildOptions::default());
        let specifier = format!("./components/{}", name);

        let first = resolver.resolve(&snapshot, "/App.jsx", &specifier);
        let second = resolver.resolve(&snapshot, "/App.jsx", &specifier);
        prop_assert_eq!(first.is_ok(), present.iter().any(|p| *p));
        if let (Ok(a), Ok(b)) = (first, second) {
            let expected = extensions
                .iter()
                .zip(&present)
                .find(|(_, p)| **p)
                .map(|(ext, _)| format!("/components/{}.{}", name, ext))
                .unwrap();
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(a, Resolution::Internal(expected));
        }
    }

    #[test]
    fn bare_specifiers_are_external(name in "[a-z][a-z0-9-]{0,12}") {
        let snapshot = VirtualFileStore::new().snapshot();
        let resolver = ModuleResolver::new(&BuildOptions::default());
        prop_assert_eq!(
            resolver.resolve(&snapshot, "/App.jsx", &name).unwrap(),
            Resolution::External(name.clone())
        );
    }
}
