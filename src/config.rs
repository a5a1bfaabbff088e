//! Configuration management for sdscheck.
//!
//! Settings come from three layers, later ones winning: the config file
//! (`sdscheck.toml`, or any TOML/JSON/YAML file passed with `--config`),
//! environment variables, and command-line flags applied by the CLI.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::llm::LlmConfig;
use crate::search::SearchConfig;

/// Config file names tried in the working directory, in order.
const CONFIG_CANDIDATES: &[&str] = &["sdscheck.toml", "sdscheck.yaml", "sdscheck.yml", "sdscheck.json"];

/// Default document extensions.
const DEFAULT_EXTENSIONS: &[&str] = &["pdf"];

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config {path}: {message}")]
    Parse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },
}

/// Resolved paths used by a run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory enumerated for documents.
    pub documents_dir: PathBuf,
    /// Result table.
    pub output_csv: PathBuf,
    /// Processed log.
    pub processed_csv: PathBuf,
    /// Directory holding stage checkpoints.
    pub checkpoint_dir: PathBuf,
    /// Document extensions picked up from `documents_dir`.
    pub extensions: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("./pdfs"),
            output_csv: PathBuf::from("output.csv"),
            processed_csv: PathBuf::from("processed_file.csv"),
            checkpoint_dir: PathBuf::from("./pdfs-json"),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Settings {
    /// Create the checkpoint directory and the parents of both CSV files.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.checkpoint_dir)?;
        for file in [&self.output_csv, &self.processed_csv] {
            if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

/// `[paths]` section. Unset entries keep the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_csv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_csv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        let parse_err = |format: &'static str, message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            format,
            message,
        };

        let mut config: Config = match ext {
            "json" => serde_json::from_str(&contents).map_err(|e| parse_err("JSON", e.to_string()))?,
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents).map_err(|e| parse_err("YAML", e.to_string()))?
            }
            _ => toml::from_str(&contents).map_err(|e| parse_err("TOML", e.to_string()))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Look for a config file in `dir`.
    pub fn discover(dir: &Path) -> Option<PathBuf> {
        CONFIG_CANDIDATES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Apply environment variable overrides to the search and LLM sections.
    pub fn with_env_overrides(mut self) -> Self {
        self.search = self.search.with_env_overrides();
        self.llm = self.llm.with_env_overrides();
        self
    }

    /// Get the base directory for resolving relative paths.
    /// Returns the config file's parent directory if available, otherwise None.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply the `[paths]` section to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        let paths = &self.paths;
        if let Some(ref dir) = paths.documents_dir {
            settings.documents_dir = self.resolve_path(dir, base_dir);
        }
        if let Some(ref file) = paths.output_csv {
            settings.output_csv = self.resolve_path(file, base_dir);
        }
        if let Some(ref file) = paths.processed_csv {
            settings.processed_csv = self.resolve_path(file, base_dir);
        }
        if let Some(ref dir) = paths.checkpoint_dir {
            settings.checkpoint_dir = self.resolve_path(dir, base_dir);
        }
        if let Some(ref extensions) = paths.extensions {
            if !extensions.is_empty() {
                settings.extensions = extensions.clone();
            }
        }
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Directory searched for a config file when none is given.
    pub search_dir: Option<PathBuf>,
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(
    options: LoadOptions,
) -> Result<(Settings, Config), ConfigError> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let search_dir = options.search_dir.clone().unwrap_or_else(|| cwd.clone());

    let config_path = options
        .config_path
        .clone()
        .or_else(|| Config::discover(&search_dir));

    let config = match config_path {
        Some(ref path) => {
            tracing::debug!("Loading config from {}", path.display());
            Config::load_from_path(path).await?
        }
        None => Config::default(),
    }
    .with_env_overrides();

    let mut settings = Settings::default();
    let base_dir = config.base_dir().unwrap_or(cwd);
    config.apply_to_settings(&mut settings, &base_dir);

    Ok((settings, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_toml_sections() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sdscheck.toml");
        std::fs::write(
            &path,
            r#"
[paths]
documents_dir = "sheets"
output_csv = "/tmp/out.csv"
extensions = ["pdf", "html"]

[search]
backend = "duckduckgo"
max_results = 5

[llm]
model = "mistral"
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.search.backend, "duckduckgo");
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.search.region, "wt-wt");
        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.llm.timeout_secs, 30);

        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, &config.base_dir().unwrap());
        assert_eq!(settings.documents_dir, dir.path().join("sheets"));
        assert_eq!(settings.output_csv, PathBuf::from("/tmp/out.csv"));
        assert_eq!(settings.processed_csv, PathBuf::from("processed_file.csv"));
        assert_eq!(settings.extensions, vec!["pdf", "html"]);
    }

    #[tokio::test]
    async fn load_json_and_yaml() {
        let dir = TempDir::new().unwrap();
        let json = dir.path().join("cfg.json");
        std::fs::write(&json, r#"{"search": {"region": "dk-da"}}"#).unwrap();
        assert_eq!(
            Config::load_from_path(&json).await.unwrap().search.region,
            "dk-da"
        );

        let yaml = dir.path().join("cfg.yaml");
        std::fs::write(&yaml, "llm:\n  max_tokens: 256\n").unwrap();
        assert_eq!(
            Config::load_from_path(&yaml).await.unwrap().llm.max_tokens,
            256
        );
    }

    #[tokio::test]
    async fn bad_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sdscheck.toml");
        std::fs::write(&path, "[search\nbackend = 1").unwrap();
        assert!(matches!(
            Config::load_from_path(&path).await,
            Err(ConfigError::Parse { format: "TOML", .. })
        ));
    }

    #[test]
    fn discover_finds_candidate() {
        let dir = TempDir::new().unwrap();
        assert!(Config::discover(dir.path()).is_none());
        std::fs::write(dir.path().join("sdscheck.yaml"), "{}").unwrap();
        assert_eq!(
            Config::discover(dir.path()),
            Some(dir.path().join("sdscheck.yaml"))
        );
    }

    #[test]
    fn resolve_path_expands_tilde() {
        let config = Config::default();
        let base = Path::new("/base");
        assert_eq!(config.resolve_path("rel", base), PathBuf::from("/base/rel"));
        assert_eq!(config.resolve_path("/abs", base), PathBuf::from("/abs"));
        if std::env::var("HOME").is_ok() {
            assert!(!config
                .resolve_path("~/x", base)
                .to_string_lossy()
                .starts_with('~'));
        }
    }
}
