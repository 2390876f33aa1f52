//! Default configuration values for procmem

use crate::core::types::{AllocationRequest, Protection};
use serde::{Deserialize, Serialize};

/// Default configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDefaults {
    pub memory: MemoryDefaults,
    pub cache: CacheDefaults,
    pub logging: LoggingDefaults,
}

/// Default memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryDefaults {
    pub max_read_size: usize,
    pub max_allocation_size: usize,
    pub default_allocation_size: usize,
    pub default_protection: Protection,
}

/// Default handle cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheDefaults {
    pub enabled: bool,
    pub max_entries: usize,
}

/// Default logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingDefaults {
    pub level: String,
}

/// Returns the default configuration
pub fn default_config() -> ConfigDefaults {
    ConfigDefaults {
        memory: MemoryDefaults {
            max_read_size: 10485760,       // 10MB
            max_allocation_size: 67108864, // 64MB
            default_allocation_size: AllocationRequest::NATIVE_INT.size,
            default_protection: AllocationRequest::NATIVE_INT.protection,
        },
        cache: CacheDefaults {
            // Off by default: every call re-resolves the pid
            enabled: false,
            max_entries: 64,
        },
        logging: LoggingDefaults {
            level: "info".to_string(),
        },
    }
}
