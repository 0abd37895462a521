use crate::diagnostics::DiagnosticLevel;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StrictLevel {
    #[serde(rename = "off")]
    Off,
    #[serde(rename = "warning")]
    Warning,
    #[default]
    #[serde(rename = "error")]
    Error,
}

impl StrictLevel {
    /// Severity a diagnostic gets at this strictness, `None` when suppressed
    pub fn level(&self) -> Option<DiagnosticLevel> {
        match self {
            StrictLevel::Off => None,
            StrictLevel::Warning => Some(DiagnosticLevel::Warning),
            StrictLevel::Error => Some(DiagnosticLevel::Error),
        }
    }

    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "off" => Ok(StrictLevel::Off),
            "warning" | "warn" => Ok(StrictLevel::Warning),
            "error" => Ok(StrictLevel::Error),
            other => Err(ConfigError::Invalid(format!(
                "unknown strictness '{}', expected error, warning or off",
                other
            ))),
        }
    }
}

/// Options that control resolution and build behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOptions {
    /// Import prefix that maps to the project root (default: "@/")
    #[serde(default = "default_alias_prefix")]
    pub alias_prefix: String,

    /// Extensions probed for extension-less specifiers, in priority order
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Also probe `<dir>/index.<ext>` (default: true)
    #[serde(default = "default_true")]
    pub resolve_index_files: bool,

    /// Files accepted as the application entry, in preference order
    #[serde(default = "default_entry_candidates")]
    pub entry_candidates: Vec<String>,

    /// URL prefix for package imports in built import maps
    #[serde(default = "default_external_cdn")]
    pub external_cdn: Option<String>,

    /// Severity of cycles that do not pass through the entry (default: error)
    #[serde(default)]
    pub cyclic_imports: StrictLevel,

    /// Severity of source files unreachable from the entry (default: warning)
    #[serde(default = "default_unreachable")]
    pub unreachable_files: StrictLevel,

    /// Pretty-print diagnostics (default: true)
    #[serde(default = "default_true")]
    pub pretty: bool,
}

fn default_true() -> bool {
    true
}

fn default_alias_prefix() -> String {
    "@/".to_string()
}

fn default_extensions() -> Vec<String> {
    [".jsx", ".js", ".tsx", ".ts"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_entry_candidates() -> Vec<String> {
    vec!["/App.jsx".to_string(), "/App.tsx".to_string()]
}

fn default_external_cdn() -> Option<String> {
    Some("https://esm.sh/".to_string())
}

fn default_unreachable() -> StrictLevel {
    StrictLevel::Warning
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            alias_prefix: default_alias_prefix(),
            extensions: default_extensions(),
            resolve_index_files: true,
            entry_candidates: default_entry_candidates(),
            external_cdn: default_external_cdn(),
            cyclic_imports: StrictLevel::Error,
            unreachable_files: StrictLevel::Warning,
            pretty: true,
        }
    }
}

impl BuildOptions {
    /// Reject option values the resolver cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.alias_prefix.ends_with('/') || self.alias_prefix.len() < 2 {
            return Err(ConfigError::Invalid(format!(
                "aliasPrefix '{}' must be at least one character followed by '/'",
                self.alias_prefix
            )));
        }
        if self.alias_prefix.starts_with('.') || self.alias_prefix.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "aliasPrefix '{}' would shadow relative or absolute imports",
                self.alias_prefix
            )));
        }
        if let Some(ext) = self
            .extensions
            .iter()
            .find(|ext| !ext.starts_with('.') || ext.len() < 2 || ext.contains('/'))
        {
            return Err(ConfigError::Invalid(format!(
                "extension '{}' must look like '.jsx'",
                ext
            )));
        }
        if self.entry_candidates.is_empty() {
            return Err(ConfigError::Invalid(
                "entryCandidates must name at least one file".to_string(),
            ));
        }
        Ok(())
    }
}

/// Overrides coming from command-line flags; `None` keeps the file value
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub alias_prefix: Option<String>,
    pub external_cdn: Option<Option<String>>,
    pub cyclic_imports: Option<StrictLevel>,
    pub unreachable_files: Option<StrictLevel>,
    pub pretty: Option<bool>,
    pub exclude: Option<Vec<String>>,
}

/// Main project configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    #[serde(default)]
    pub build_options: BuildOptions,

    /// Paths to skip when a host loads files from disk (glob patterns)
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

fn default_exclude() -> Vec<String> {
    vec![
        "**/node_modules/**".to_string(),
        "**/.git/**".to_string(),
        "**/dist/**".to_string(),
    ]
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            build_options: BuildOptions::default(),
            exclude: default_exclude(),
        }
    }
}

impl BuildConfig {
    /// Load configuration from a JSON or YAML file, chosen by extension
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let config = if is_yaml {
            Self::from_yaml(&content)?
        } else {
            Self::from_json(&content)?
        };
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: BuildConfig = serde_json::from_str(content)?;
        config.build_options.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: BuildConfig = serde_yaml::from_str(content)?;
        config.build_options.validate()?;
        Ok(config)
    }

    /// Create a default configuration and write it to a file
    pub fn init_file(path: &Path) -> Result<(), ConfigError> {
        let config = BuildConfig::default();
        let json = serde_json::to_string_pretty(&config)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Merge CLI overrides into the file config
    pub fn merge(&mut self, overrides: &CliOverrides) {
        let options = &mut self.build_options;
        if let Some(prefix) = &overrides.alias_prefix {
            options.alias_prefix = prefix.clone();
        }
        if let Some(cdn) = &overrides.external_cdn {
            options.external_cdn = cdn.clone();
        }
        if let Some(level) = overrides.cyclic_imports {
            options.cyclic_imports = level;
        }
        if let Some(level) = overrides.unreachable_files {
            options.unreachable_files = level;
        }
        if let Some(pretty) = overrides.pretty {
            options.pretty = pretty;
        }
        if let Some(exclude) = &overrides.exclude {
            self.exclude = exclude.clone();
        }
    }
}
