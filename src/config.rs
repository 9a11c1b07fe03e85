use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::pipeline::MergeStrategy;
use crate::types::Bucket;

/// Main configuration structure for madaa
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MadaaConfig {
    /// Custom category definitions with extensions
    #[serde(default)]
    pub categories: Vec<CustomCategory>,

    /// Extension remaps to reassign extensions to different categories
    #[serde(default)]
    pub remaps: Vec<ExtensionRemap>,

    /// Category-level color overrides
    #[serde(default)]
    pub category_colors: HashMap<String, String>,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub display: DisplayConfig,
}

/// Custom category with name, extensions, and optional color
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CustomCategory {
    pub name: String,
    pub extensions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Remap extensions to a different category
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtensionRemap {
    pub extensions: Vec<String>,
    pub category: String,
}

/// Scan tuning; every field can be overridden from the command line.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanConfig {
    pub top: usize,
    /// 0 = number of available processing units
    pub threads: usize,
    pub progress_interval_ms: u64,
    pub strategy: MergeStrategy,
    pub exclude: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            top: 10,
            threads: 0,
            progress_interval_ms: 100,
            strategy: MergeStrategy::Locked,
            exclude: Vec::new(),
            max_depth: None,
        }
    }
}

/// Display configuration options
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DisplayConfig {
    /// Rows shown per ranked section
    #[serde(default = "default_top_entries")]
    pub top_entries: usize,

    /// Whether to use percentage-based coloring as fallback (default: true)
    #[serde(default = "default_true")]
    pub use_percentage_colors: bool,
}

fn default_top_entries() -> usize {
    3
}

fn default_true() -> bool {
    true
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            top_entries: default_top_entries(),
            use_percentage_colors: true,
        }
    }
}

impl MadaaConfig {
    /// Load config from custom path or default XDG location
    pub fn load(custom_path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match custom_path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_config_path() {
                Ok(p) => p,
                Err(_) => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        Self::parse(&contents).map_err(|err| match err {
            ConfigError::Toml(source) => ConfigError::Parse { path, source },
            other => other,
        })
    }

    /// Parses and validates a TOML document.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(contents)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Get default config path: ~/.config/madaa/config.toml
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;

        Ok(config_dir.join("madaa").join("config.toml"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan.top == 0 {
            return Err(ConfigError::Invalid("scan.top must be at least 1".to_string()));
        }
        if self.scan.progress_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "scan.progress_interval_ms must be at least 1".to_string(),
            ));
        }
        if self.display.top_entries == 0 {
            return Err(ConfigError::Invalid(
                "display.top_entries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn normalize(&mut self) {
        for category in &mut self.categories {
            for ext in &mut category.extensions {
                *ext = normalize_config_extension(ext);
            }
        }
        for remap in &mut self.remaps {
            for ext in &mut remap.extensions {
                *ext = normalize_config_extension(ext);
            }
        }
    }
}

/// `.JPG`, `jpg` and `Jpg` all name the same extension.
fn normalize_config_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Color resolution with priority: category > percentage
pub struct ColorResolver {
    category_colors: HashMap<String, String>,
    use_percentage_colors: bool,
}

impl ColorResolver {
    pub fn new(config: &MadaaConfig) -> Self {
        let mut category_colors = config.category_colors.clone();
        for cat in &config.categories {
            if let Some(color) = &cat.color {
                category_colors
                    .entry(cat.name.clone())
                    .or_insert_with(|| color.clone());
            }
        }

        Self {
            category_colors,
            use_percentage_colors: config.display.use_percentage_colors,
        }
    }

    /// Resolve color for a bucket based on priority system
    pub fn resolve_bucket_color(&self, bucket: &Bucket) -> Option<String> {
        if let Some(color) = self.category_colors.get(&bucket.key) {
            return Some(color.clone());
        }

        if self.use_percentage_colors {
            return Some(Self::percentage_to_color(bucket.percent).to_string());
        }

        None
    }

    fn percentage_to_color(percent: f64) -> &'static str {
        if percent > 50.0 {
            "red"
        } else if percent > 20.0 {
            "yellow"
        } else {
            "white"
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,

    #[error("failed to read config at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = MadaaConfig::parse("").unwrap();
        assert_eq!(config.scan.top, 10);
        assert_eq!(config.scan.threads, 0);
        assert_eq!(config.scan.progress_interval_ms, 100);
        assert_eq!(config.scan.strategy, MergeStrategy::Locked);
        assert_eq!(config.display.top_entries, 3);
        assert!(config.display.use_percentage_colors);
    }

    #[test]
    fn test_parse_full_document() {
        let config = MadaaConfig::parse(
            r#"
            [[categories]]
            name = "Notebooks"
            extensions = [".IPYNB", "rmd"]
            color = "magenta"

            [[remaps]]
            extensions = ["LOG"]
            category = "Documents"

            [scan]
            top = 25
            threads = 4
            strategy = "sharded"
            exclude = ["node_modules", ".git"]
            max_depth = 8

            [display]
            top_entries = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.categories[0].extensions, vec!["ipynb", "rmd"]);
        assert_eq!(config.remaps[0].extensions, vec!["log"]);
        assert_eq!(config.scan.top, 25);
        assert_eq!(config.scan.threads, 4);
        assert_eq!(config.scan.strategy, MergeStrategy::Sharded);
        assert_eq!(config.scan.exclude.len(), 2);
        assert_eq!(config.scan.max_depth, Some(8));
        assert_eq!(config.scan.progress_interval_ms, 100);
        assert_eq!(config.display.top_entries, 5);
    }

    #[test]
    fn test_zero_top_is_rejected() {
        let err = MadaaConfig::parse("[scan]\ntop = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_zero_top_entries_is_rejected() {
        let err = MadaaConfig::parse("[display]\ntop_entries = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("top_entries")));
    }

    #[test]
    fn test_unknown_strategy_is_parse_error() {
        let err = MadaaConfig::parse("[scan]\nstrategy = \"eventual\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = MadaaConfig::load(Some(dir.path().join("absent.toml").as_path())).unwrap();
        assert_eq!(config.scan.top, 10);
    }

    #[test]
    fn test_load_reports_path_on_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scan\ntop = ").unwrap();

        match MadaaConfig::load(Some(path.as_path())) {
            Err(ConfigError::Parse { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_color_resolution_priority() {
        let mut config = MadaaConfig::parse(
            r#"
            [[categories]]
            name = "Notebooks"
            extensions = ["ipynb"]
            color = "magenta"

            [category_colors]
            Images = "green"
            "#,
        )
        .unwrap();

        let bucket = |key: &str, percent: f64| Bucket {
            key: key.to_string(),
            bytes: 0,
            percent,
            file_count: 0,
        };

        let resolver = ColorResolver::new(&config);
        assert_eq!(resolver.resolve_bucket_color(&bucket("Images", 90.0)).as_deref(), Some("green"));
        assert_eq!(resolver.resolve_bucket_color(&bucket("Notebooks", 1.0)).as_deref(), Some("magenta"));
        assert_eq!(resolver.resolve_bucket_color(&bucket("Other", 60.0)).as_deref(), Some("red"));
        assert_eq!(resolver.resolve_bucket_color(&bucket("Other", 30.0)).as_deref(), Some("yellow"));

        config.display.use_percentage_colors = false;
        let resolver = ColorResolver::new(&config);
        assert_eq!(resolver.resolve_bucket_color(&bucket("Other", 60.0)), None);
    }
}
