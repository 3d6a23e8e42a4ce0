//! Settings file support for codekb.
//!
//! All codekb data lives under one data directory:
//! - `codekb.toml` - Settings file
//! - `config.json` - Current login
//! - `logs/` - Log files
//! - `<username>/` - One knowledge-base namespace per user
//!
//! The data directory is `--data-dir`, else `$CODEKB_HOME`, else `~/.codekb`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use codekb_index::embed::{DEFAULT_BATCH_SIZE, DEFAULT_HASH_DIMENSION, DEFAULT_MODEL};
use codekb_index::index::MAX_DIMENSION;
use codekb_index::{DEFAULT_TOP_K, EmbedBackend, EmbedderConfig, Parser, ScanConfig};
use serde::{Deserialize, Serialize};

/// Default data directory name under the home directory.
pub const DATA_DIR_NAME: &str = ".codekb";
/// The settings file name within the data directory.
pub const SETTINGS_FILE: &str = "codekb.toml";
/// Environment variable overriding the data directory.
pub const HOME_ENV: &str = "CODEKB_HOME";

/// Main settings structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Embedding model settings.
    pub embedding: EmbeddingSettings,
    /// Source scan settings.
    pub scan: ScanSettings,
    /// Search settings.
    pub search: SearchSettings,
}

/// Embedding configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Backend: "fastembed" or "hash".
    pub backend: String,
    /// Model name for the fastembed backend.
    pub model: String,
    /// Vector dimension for the hash backend.
    pub dimension: usize,
    /// Texts per embedding batch.
    pub batch_size: usize,
    /// Model cache directory, relative to the data directory.
    pub cache_dir: Option<PathBuf>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: "fastembed".to_string(),
            model: DEFAULT_MODEL.to_string(),
            dimension: DEFAULT_HASH_DIMENSION,
            batch_size: DEFAULT_BATCH_SIZE,
            cache_dir: None,
        }
    }
}

/// Scan configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanSettings {
    /// File extensions to scan.
    pub extensions: Vec<String>,
    /// Honour .gitignore and hidden-file rules.
    pub respect_ignore_files: bool,
    /// Follow symbolic links.
    pub follow_links: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            extensions: vec!["py".to_string(), "pyi".to_string(), "rs".to_string()],
            respect_ignore_files: false,
            follow_links: false,
        }
    }
}

/// Search configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Default number of results.
    pub top_k: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// Commented settings written by `codekb init`.
pub const DEFAULT_SETTINGS: &str = r#"# codekb settings

[embedding]
# "fastembed" runs a local sentence-embedding model, "hash" needs no download
backend = "fastembed"
model = "all-MiniLM-L6-v2"
# Vector size, hash backend only
dimension = 384
batch_size = 64
# Model cache, relative to the data directory
# cache_dir = "models"

[scan]
extensions = ["py", "pyi", "rs"]
respect_ignore_files = false
follow_links = false

[search]
top_k = 5
"#;

/// Resolve the data directory from the flag, the environment or the home
/// directory, in that order.
pub fn resolve_data_dir(flag: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = flag {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().context("Could not determine home directory; set CODEKB_HOME")?;
    Ok(home.join(DATA_DIR_NAME))
}

impl Settings {
    /// Load settings from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;
        Ok(settings)
    }

    /// Load `codekb.toml` from the data directory, or defaults if absent.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = Self::settings_path(data_dir);
        if !path.exists() {
            tracing::debug!("No {} found, using defaults", path.display());
            return Ok(Self::default());
        }
        let settings = Self::from_file(&path)?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Get the settings file path for a data directory.
    pub fn settings_path(data_dir: &Path) -> PathBuf {
        data_dir.join(SETTINGS_FILE)
    }

    /// Write the commented default settings file.
    ///
    /// Returns `false` without touching an existing file unless `force`.
    pub fn write_default(data_dir: &Path, force: bool) -> Result<bool> {
        let path = Self::settings_path(data_dir);
        if path.exists() && !force {
            return Ok(false);
        }
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create {}", data_dir.display()))?;
        std::fs::write(&path, DEFAULT_SETTINGS)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(true)
    }

    /// Build the embedder configuration, resolving the cache directory.
    pub fn embedder_config(&self, data_dir: &Path) -> Result<EmbedderConfig> {
        let backend = EmbedBackend::parse(&self.embedding.backend)?;
        let cache_dir = self.embedding.cache_dir.as_ref().map(|dir| {
            if dir.is_absolute() {
                dir.clone()
            } else {
                data_dir.join(dir)
            }
        });
        Ok(EmbedderConfig {
            backend,
            model: self.embedding.model.clone(),
            dimension: self.embedding.dimension,
            batch_size: self.embedding.batch_size,
            cache_dir,
        })
    }

    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            extensions: self.scan.extensions.clone(),
            respect_ignore_files: self.scan.respect_ignore_files,
            follow_links: self.scan.follow_links,
        }
    }
}

/// Settings validation error.
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigValidationError {}

impl Settings {
    /// Validate the settings.
    ///
    /// Returns a list of validation errors if any are found.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: String| {
            errors.push(ConfigValidationError {
                field: field.to_string(),
                message,
            })
        };

        if EmbedBackend::parse(&self.embedding.backend).is_err() {
            push(
                "embedding.backend",
                format!(
                    "Invalid backend '{}'. Expected 'fastembed' or 'hash'.",
                    self.embedding.backend
                ),
            );
        }
        if self.embedding.model.trim().is_empty() {
            push("embedding.model", "Model cannot be empty.".to_string());
        }
        if self.embedding.dimension == 0 {
            push("embedding.dimension", "Dimension must be positive.".to_string());
        } else if self.embedding.dimension > MAX_DIMENSION {
            push(
                "embedding.dimension",
                format!("Dimension must be at most {}.", MAX_DIMENSION),
            );
        }
        if self.embedding.batch_size == 0 {
            push("embedding.batch_size", "Batch size must be positive.".to_string());
        }

        if self.scan.extensions.is_empty() {
            push("scan.extensions", "At least one extension is required.".to_string());
        }
        for ext in &self.scan.extensions {
            if !Parser::supports_extension(ext.trim_start_matches('.')) {
                push(
                    "scan.extensions",
                    format!(
                        "Unsupported extension '{}'. Supported: {}.",
                        ext,
                        Parser::supported_extensions().join(", ")
                    ),
                );
            }
        }

        if self.search.top_k == 0 {
            push("search.top_k", "top_k must be positive.".to_string());
        }

        errors
    }
}
