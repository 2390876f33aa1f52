//! Configuration loader for procmem
//!
//! Handles loading configuration from TOML files and merging with defaults.

use super::defaults::default_config;
use crate::core::types::{AllocationRequest, Protection};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "procmem.toml";

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_memory")]
    pub memory: MemoryConfig,

    #[serde(default = "default_cache")]
    pub cache: CacheConfig,

    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,
}

/// Memory access configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Upper bound on a single `readMemory` transfer
    #[serde(default = "default_max_read_size")]
    pub max_read_size: usize,
    /// Upper bound on a single `allocateMemory` request
    #[serde(default = "default_max_allocation_size")]
    pub max_allocation_size: usize,
    #[serde(default = "default_allocation_size")]
    pub default_allocation_size: usize,
    #[serde(default = "default_protection")]
    pub default_protection: Protection,
}

impl MemoryConfig {
    /// The allocation used when `allocateMemory` is called with a pid only
    pub fn default_allocation(&self) -> AllocationRequest {
        AllocationRequest {
            size: self.default_allocation_size,
            protection: self.default_protection,
        }
    }
}

/// Process handle cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Configuration loader
#[derive(Debug)]
pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Creates a new configuration loader
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        ConfigLoader {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// Loads configuration from file
    pub fn load(&self) -> Result<Config, ConfigError> {
        if !self.config_path.exists() {
            return Err(ConfigError::FileNotFound(
                self.config_path.display().to_string(),
            ));
        }

        let contents = fs::read_to_string(&self.config_path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Loads configuration, falling back to defaults only when the file is
    /// absent; parse errors are still reported
    pub fn load_or_default(&self) -> Result<Config, ConfigError> {
        match self.load() {
            Err(ConfigError::FileNotFound(_)) => Ok(Config::default()),
            other => other,
        }
    }

    /// Saves configuration to file
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, contents)?;
        Ok(())
    }
}

/// Loads configuration from the default location
pub fn load_config() -> Result<Config, ConfigError> {
    ConfigLoader::new(DEFAULT_CONFIG_FILE).load_or_default()
}

// Default functions for serde
fn default_memory() -> MemoryConfig {
    let defaults = default_config();
    MemoryConfig {
        max_read_size: defaults.memory.max_read_size,
        max_allocation_size: defaults.memory.max_allocation_size,
        default_allocation_size: defaults.memory.default_allocation_size,
        default_protection: defaults.memory.default_protection,
    }
}

fn default_cache() -> CacheConfig {
    let defaults = default_config();
    CacheConfig {
        enabled: defaults.cache.enabled,
        max_entries: defaults.cache.max_entries,
    }
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        level: default_config().logging.level,
    }
}

// Individual field defaults
fn default_max_read_size() -> usize {
    default_config().memory.max_read_size
}

fn default_max_allocation_size() -> usize {
    default_config().memory.max_allocation_size
}

fn default_allocation_size() -> usize {
    default_config().memory.default_allocation_size
}

fn default_protection() -> Protection {
    default_config().memory.default_protection
}

fn default_cache_enabled() -> bool {
    default_config().cache.enabled
}

fn default_max_entries() -> usize {
    default_config().cache.max_entries
}

fn default_log_level() -> String {
    default_config().logging.level
}

impl Default for Config {
    fn default() -> Self {
        Config {
            memory: default_memory(),
            cache: default_cache(),
            logging: default_logging(),
        }
    }
}
