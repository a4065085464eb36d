//! Build configuration for coursebuild.
//!
//! An optional `coursebuild.toml` lives next to the content tree.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CourseBuildError, Result};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "coursebuild.toml";

// ---------------------------------------------------------------------------
// Config structs (matching coursebuild.toml schema)
// ---------------------------------------------------------------------------

/// Top-level build config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Input/output locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Compile stage settings.
    #[serde(default)]
    pub compile: CompileConfig,

    /// Integrity check settings.
    #[serde(default)]
    pub validate: ValidateConfig,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Root of the content source tree.
    #[serde(default = "default_content_dir")]
    pub content_dir: String,

    /// Generated-content directory (fully replaced on each run).
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Location of the persisted compile cache.
    #[serde(default = "default_cache_file")]
    pub cache_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            content_dir: default_content_dir(),
            output_dir: default_output_dir(),
            cache_file: default_cache_file(),
        }
    }
}

fn default_content_dir() -> String {
    "content".into()
}
fn default_output_dir() -> String {
    "generated".into()
}
fn default_cache_file() -> String {
    ".coursebuild/compile-cache.json".into()
}

/// `[compile]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompileConfig {
    /// Number of atoms compiled concurrently per batch.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Whether to reuse compiled output across runs.
    #[serde(default = "default_true")]
    pub cache: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            cache: true,
        }
    }
}

fn default_concurrency() -> usize {
    20
}
fn default_true() -> bool {
    true
}

/// `[validate]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidateConfig {
    /// How many orphan atom IDs to list in the aggregated warning.
    #[serde(default = "default_orphan_preview")]
    pub orphan_preview: usize,
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self {
            orphan_preview: default_orphan_preview(),
        }
    }
}

fn default_orphan_preview() -> usize {
    10
}

impl AppConfig {
    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.compile.concurrency == 0 {
            return Err(CourseBuildError::config(
                "compile.concurrency must be at least 1",
            ));
        }
        if self.paths.content_dir.trim().is_empty() {
            return Err(CourseBuildError::config("paths.content_dir must not be empty"));
        }
        if self.paths.output_dir.trim().is_empty() {
            return Err(CourseBuildError::config("paths.output_dir must not be empty"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of the content source tree.
    pub content_dir: PathBuf,
    /// Generated-content directory.
    pub output_dir: PathBuf,
    /// Compile batch width.
    pub concurrency: usize,
    /// Compile cache location; `None` disables caching.
    pub cache_file: Option<PathBuf>,
    /// Orphan preview length for the aggregated warning.
    pub orphan_preview: usize,
    /// Tool version recorded in the manifest.
    pub tool_version: String,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            content_dir: PathBuf::from(&config.paths.content_dir),
            output_dir: PathBuf::from(&config.paths.output_dir),
            concurrency: config.compile.concurrency,
            cache_file: config
                .compile
                .cache
                .then(|| PathBuf::from(&config.paths.cache_file)),
            orphan_preview: config.validate.orphan_preview,
            tool_version: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load `coursebuild.toml` from `dir`. Returns defaults if the file does not exist.
pub fn load_config(dir: &Path) -> Result<AppConfig> {
    let path = dir.join(CONFIG_FILE_NAME);

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the build config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CourseBuildError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        CourseBuildError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;

    tracing::debug!(?path, "loaded config file");
    Ok(config)
}
