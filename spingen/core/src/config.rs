//! TOML Configuration File Support
//!
//! Configuration for the worker host and the viewer defaults, read from
//! `$XDG_CONFIG_HOME/spingen/spingen.toml`.
//!
//! # Configuration Priority
//!
//! Highest first:
//! 1. Environment variables
//! 2. TOML configuration file
//! 3. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [worker]
//! channel_capacity = 64
//! thread_name = "spingen-worker"
//!
//! [viewer]
//! default_sprite = "STIN"
//! default_frame = "A"
//! default_scale = "2x"
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Overrides |
//! |---|---|
//! | `SPINGEN_CONFIG` | config file path |
//! | `SPINGEN_CHANNEL_CAPACITY` | `worker.channel_capacity` |
//! | `SPINGEN_WORKER_THREAD` | `worker.thread_name` |
//! | `SPINGEN_DEFAULT_SPRITE` | `viewer.default_sprite` |
//! | `SPINGEN_DEFAULT_FRAME` | `viewer.default_frame` |
//! | `SPINGEN_DEFAULT_SCALE` | `viewer.default_scale` |
//!
//! Unparseable environment values are logged and ignored.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::SpriteScale;
use crate::transport::DEFAULT_CHANNEL_CAPACITY;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("cannot read {}: {source}", path.display())]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("spingen.toml is not valid TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("bad config value: {0}")]
    ValidationError(String),
}

/// Where the effective configuration came from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Environment variable (at least one)
    Env,
    /// TOML configuration file
    File,
    /// Built-in defaults
    #[default]
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// Effective Configuration
// =============================================================================

/// Worker host settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Capacity of the worker → client reply channel; requests are unbounded
    pub channel_capacity: usize,
    /// Name of the worker OS thread
    pub thread_name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            thread_name: "spingen-worker".to_string(),
        }
    }
}

/// Initial preview controls of the viewer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewerConfig {
    /// Sprite shown when a skin is opened
    pub default_sprite: String,
    /// Frame shown when a skin is opened
    pub default_frame: String,
    /// Animation scale
    pub default_scale: SpriteScale,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            default_sprite: "STIN".to_string(),
            default_frame: "A".to_string(),
            default_scale: SpriteScale::X1,
        }
    }
}

/// Effective configuration after merging all sources
#[derive(Clone, Debug, Default)]
pub struct SpingenConfig {
    /// `[worker]`
    pub worker: WorkerConfig,
    /// `[viewer]`
    pub viewer: ViewerConfig,
    source: ConfigSource,
    config_file_path: Option<PathBuf>,
}

impl SpingenConfig {
    /// Where the highest-priority value came from
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// File the configuration was read from, if any
    #[must_use]
    pub fn config_file_path(&self) -> Option<&PathBuf> {
        self.config_file_path.as_ref()
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[worker]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerToml {
    /// Channel capacity
    pub channel_capacity: Option<usize>,
    /// Worker thread name
    pub thread_name: Option<String>,
}

/// `[viewer]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerToml {
    /// Initial sprite code
    pub default_sprite: Option<String>,
    /// Initial frame
    pub default_frame: Option<String>,
    /// Initial scale, e.g. `"2x"`
    pub default_scale: Option<String>,
}

/// Whole file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpingenToml {
    /// `[worker]`
    pub worker: WorkerToml,
    /// `[viewer]`
    pub viewer: ViewerToml,
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Default configuration file path
///
/// `$XDG_CONFIG_HOME/spingen/spingen.toml`, falling back to the platform
/// config directory.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("spingen").join("spingen.toml"))
}

/// Load configuration from all sources
///
/// `SPINGEN_CONFIG` replaces the default file path.
///
/// # Errors
///
/// Returns an error if the config file exists but can't be read, parsed or
/// validated. A missing file is not an error.
pub fn load_config() -> Result<SpingenConfig, ConfigError> {
    let path = std::env::var("SPINGEN_CONFIG")
        .ok()
        .map(PathBuf::from)
        .or_else(default_config_path);
    load_config_from_path(path)
}

/// Load configuration from a specific file, then apply the environment
///
/// # Errors
///
/// Returns an error if the file exists but can't be read, parsed or
/// validated.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<SpingenConfig, ConfigError> {
    let mut config = load_file(path)?;
    apply_env_with(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Defaults overlaid with the TOML file, without consulting the environment
///
/// # Errors
///
/// Same as [`load_config_from_path`].
pub fn load_file(path: Option<PathBuf>) -> Result<SpingenConfig, ConfigError> {
    let mut config = SpingenConfig::default();

    let Some(config_path) = path else {
        return Ok(config);
    };
    if !config_path.exists() {
        tracing::debug!(
            path = %config_path.display(),
            "Config file not found, using defaults"
        );
        return Ok(config);
    }

    let content = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;
    let parsed: SpingenToml = toml::from_str(&content)?;
    apply_toml_config(&mut config, &parsed)?;

    tracing::info!(path = %config_path.display(), "Loaded configuration from file");
    config.config_file_path = Some(config_path);
    config.source = ConfigSource::File;
    Ok(config)
}

fn apply_toml_config(config: &mut SpingenConfig, toml: &SpingenToml) -> Result<(), ConfigError> {
    if let Some(capacity) = toml.worker.channel_capacity {
        if capacity == 0 {
            return Err(ConfigError::ValidationError(
                "worker.channel_capacity must be at least 1".to_string(),
            ));
        }
        config.worker.channel_capacity = capacity;
    }
    if let Some(name) = &toml.worker.thread_name {
        config.worker.thread_name = name.clone();
    }

    if let Some(sprite) = &toml.viewer.default_sprite {
        config.viewer.default_sprite = sprite.clone();
    }
    if let Some(frame) = &toml.viewer.default_frame {
        config.viewer.default_frame = frame.clone();
    }
    if let Some(scale) = &toml.viewer.default_scale {
        config.viewer.default_scale = scale
            .parse()
            .map_err(|e| ConfigError::ValidationError(format!("viewer.default_scale: {e}")))?;
    }
    Ok(())
}

/// Apply environment overrides read through `lookup`
pub fn apply_env_with<F>(config: &mut SpingenConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("SPINGEN_CHANNEL_CAPACITY") {
        match value.parse::<usize>() {
            Ok(capacity) if capacity > 0 => {
                config.worker.channel_capacity = capacity;
                config.source = ConfigSource::Env;
            }
            _ => tracing::warn!(%value, "Ignoring invalid SPINGEN_CHANNEL_CAPACITY"),
        }
    }
    if let Some(name) = lookup("SPINGEN_WORKER_THREAD") {
        config.worker.thread_name = name;
        config.source = ConfigSource::Env;
    }
    if let Some(sprite) = lookup("SPINGEN_DEFAULT_SPRITE") {
        config.viewer.default_sprite = sprite;
        config.source = ConfigSource::Env;
    }
    if let Some(frame) = lookup("SPINGEN_DEFAULT_FRAME") {
        config.viewer.default_frame = frame;
        config.source = ConfigSource::Env;
    }
    if let Some(value) = lookup("SPINGEN_DEFAULT_SCALE") {
        match value.parse::<SpriteScale>() {
            Ok(scale) => {
                config.viewer.default_scale = scale;
                config.source = ConfigSource::Env;
            }
            Err(e) => tracing::warn!(%value, error = %e, "Ignoring invalid SPINGEN_DEFAULT_SCALE"),
        }
    }
}
