//! Configuration module for procmem
//!
//! Provides configuration loading, validation, and default settings.

mod defaults;
mod loader;
mod validator;

pub use defaults::{default_config, ConfigDefaults};
pub use loader::{
    load_config, CacheConfig, Config, ConfigError, ConfigLoader, LoggingConfig, MemoryConfig,
    DEFAULT_CONFIG_FILE,
};
pub use validator::{validate_config, ConfigValidator};

// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_config_export() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_config_error_from_io() {
        use std::io;
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let config_error: ConfigError = io_error.into();
        assert!(matches!(config_error, ConfigError::Io(_)));
    }

    #[test]
    fn test_config_result_type() {
        fn returns_config_result() -> ConfigResult<Config> {
            Ok(Config::default())
        }

        assert!(returns_config_result().is_ok());
    }
}
