//! Configuration validator for procmem
//!
//! Validates configuration values to ensure they are within acceptable ranges.

use super::loader::{CacheConfig, Config, ConfigError, LoggingConfig, MemoryConfig};
use tracing::warn;

/// Reads above this size are allowed but logged
const LARGE_READ_WARNING: usize = 104857600; // 100MB

/// Configuration validator
#[derive(Debug)]
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates the entire configuration
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        Self::validate_memory(&config.memory)?;
        Self::validate_cache(&config.cache)?;
        Self::validate_logging(&config.logging)?;
        Ok(())
    }

    /// Validates memory configuration
    fn validate_memory(memory: &MemoryConfig) -> Result<(), ConfigError> {
        if memory.max_read_size == 0 {
            return Err(ConfigError::Invalid(
                "Maximum read size must be greater than 0".to_string(),
            ));
        }

        if memory.max_read_size > LARGE_READ_WARNING {
            warn!(
                max_read_size = memory.max_read_size,
                "Maximum read size exceeds 100MB"
            );
        }

        if memory.max_allocation_size == 0 {
            return Err(ConfigError::Invalid(
                "Maximum allocation size must be greater than 0".to_string(),
            ));
        }

        if memory.default_allocation_size == 0 {
            return Err(ConfigError::Invalid(
                "Default allocation size must be greater than 0".to_string(),
            ));
        }

        if memory.default_allocation_size > memory.max_read_size {
            return Err(ConfigError::Invalid(
                "Default allocation size cannot exceed the maximum read size".to_string(),
            ));
        }

        if memory.default_allocation_size > memory.max_allocation_size {
            return Err(ConfigError::Invalid(
                "Default allocation size cannot exceed the maximum allocation size".to_string(),
            ));
        }

        Ok(())
    }

    /// Validates handle cache configuration
    fn validate_cache(cache: &CacheConfig) -> Result<(), ConfigError> {
        if cache.enabled && cache.max_entries == 0 {
            return Err(ConfigError::Invalid(
                "Cache max entries must be at least 1 when the cache is enabled".to_string(),
            ));
        }

        Ok(())
    }

    /// Validates logging configuration
    fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                logging.level, valid_levels
            )));
        }

        Ok(())
    }
}

/// Validates a configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    ConfigValidator::validate(config)
}
