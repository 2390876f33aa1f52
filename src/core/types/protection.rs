//! Page protection presets and allocation requests

use super::{MemoryError, MemoryResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Protection applied to a freshly allocated region.
///
/// Only combinations that map onto a single Win32 `PAGE_*` constant are
/// representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Protection {
    NoAccess,
    ReadOnly,
    ReadWrite,
    Execute,
    ExecuteRead,
    ExecuteReadWrite,
}

impl Protection {
    pub const PAGE_NOACCESS: u32 = 0x01;
    pub const PAGE_READONLY: u32 = 0x02;
    pub const PAGE_READWRITE: u32 = 0x04;
    pub const PAGE_EXECUTE: u32 = 0x10;
    pub const PAGE_EXECUTE_READ: u32 = 0x20;
    pub const PAGE_EXECUTE_READWRITE: u32 = 0x40;

    /// Every allowed preset
    pub const ALL: [Protection; 6] = [
        Protection::NoAccess,
        Protection::ReadOnly,
        Protection::ReadWrite,
        Protection::Execute,
        Protection::ExecuteRead,
        Protection::ExecuteReadWrite,
    ];

    /// The Win32 `PAGE_*` value for this preset
    pub const fn raw(&self) -> u32 {
        match self {
            Protection::NoAccess => Self::PAGE_NOACCESS,
            Protection::ReadOnly => Self::PAGE_READONLY,
            Protection::ReadWrite => Self::PAGE_READWRITE,
            Protection::Execute => Self::PAGE_EXECUTE,
            Protection::ExecuteRead => Self::PAGE_EXECUTE_READ,
            Protection::ExecuteReadWrite => Self::PAGE_EXECUTE_READWRITE,
        }
    }

    /// Maps a raw `PAGE_*` value back to a preset, ignoring modifier bits
    pub fn from_raw(value: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.raw() == value & 0xFF)
    }

    /// Check if protection allows reading
    pub const fn is_readable(&self) -> bool {
        matches!(
            self,
            Protection::ReadOnly
                | Protection::ReadWrite
                | Protection::ExecuteRead
                | Protection::ExecuteReadWrite
        )
    }

    /// Check if protection allows writing
    pub const fn is_writable(&self) -> bool {
        matches!(self, Protection::ReadWrite | Protection::ExecuteReadWrite)
    }

    /// Check if protection allows execution
    pub const fn is_executable(&self) -> bool {
        matches!(
            self,
            Protection::Execute | Protection::ExecuteRead | Protection::ExecuteReadWrite
        )
    }

    /// Short flag form, e.g. `rwx`
    pub const fn as_str(&self) -> &'static str {
        match self {
            Protection::NoAccess => "none",
            Protection::ReadOnly => "r",
            Protection::ReadWrite => "rw",
            Protection::Execute => "x",
            Protection::ExecuteRead => "rx",
            Protection::ExecuteReadWrite => "rwx",
        }
    }
}

impl FromStr for Protection {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "noaccess" => Ok(Protection::NoAccess),
            "r" => Ok(Protection::ReadOnly),
            "rw" => Ok(Protection::ReadWrite),
            "x" => Ok(Protection::Execute),
            "rx" => Ok(Protection::ExecuteRead),
            "rwx" => Ok(Protection::ExecuteReadWrite),
            other => Err(MemoryError::invalid_parameters(format!(
                "unknown protection '{}', expected one of none, r, rw, x, rx, rwx",
                other
            ))),
        }
    }
}

impl TryFrom<String> for Protection {
    type Error = MemoryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Protection> for String {
    fn from(protection: Protection) -> Self {
        protection.as_str().to_string()
    }
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Size and protection of a remote allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub size: usize,
    pub protection: Protection,
}

impl AllocationRequest {
    /// One native `int` of read/write/execute memory
    pub const NATIVE_INT: AllocationRequest = AllocationRequest {
        size: std::mem::size_of::<i32>(),
        protection: Protection::ExecuteReadWrite,
    };

    /// Creates a request, rejecting zero-sized allocations
    pub fn new(size: usize, protection: Protection) -> MemoryResult<Self> {
        if size == 0 {
            return Err(MemoryError::invalid_parameters(
                "allocation size must be greater than 0",
            ));
        }
        Ok(AllocationRequest { size, protection })
    }
}

impl Default for AllocationRequest {
    fn default() -> Self {
        Self::NATIVE_INT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_values() {
        assert_eq!(Protection::ExecuteReadWrite.raw(), 0x40);
        assert_eq!(Protection::ReadWrite.raw(), 0x04);
        assert_eq!(Protection::from_raw(0x20), Some(Protection::ExecuteRead));
        assert_eq!(Protection::from_raw(0x104), Some(Protection::ReadWrite));
        assert_eq!(Protection::from_raw(0x08), None);
    }

    #[test]
    fn test_access_flags() {
        assert!(Protection::ExecuteReadWrite.is_readable());
        assert!(Protection::ExecuteReadWrite.is_writable());
        assert!(Protection::ExecuteReadWrite.is_executable());
        assert!(!Protection::Execute.is_readable());
        assert!(!Protection::ReadOnly.is_writable());
        assert!(!Protection::NoAccess.is_readable());
    }

    #[test]
    fn test_parse() {
        for protection in Protection::ALL {
            assert_eq!(protection.as_str().parse::<Protection>().unwrap(), protection);
        }
        assert_eq!("RWX".parse::<Protection>().unwrap(), Protection::ExecuteReadWrite);
        assert!("wx".parse::<Protection>().is_err());
    }

    #[test]
    fn test_native_int_preset() {
        let preset = AllocationRequest::default();
        assert_eq!(preset.size, 4);
        assert_eq!(preset.protection, Protection::ExecuteReadWrite);
        assert!(AllocationRequest::new(0, Protection::ReadWrite).is_err());
    }

    #[test]
    fn test_serde_uses_flag_form() {
        let json = serde_json::to_string(&Protection::ExecuteRead).unwrap();
        assert_eq!(json, "\"rx\"");
        let parsed: Protection = serde_json::from_str("\"rw\"").unwrap();
        assert_eq!(parsed, Protection::ReadWrite);
    }
}
