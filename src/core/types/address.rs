//! Remote address wrapper with hex parsing

use super::error::{MemoryError, MemoryResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An address inside a target process's address space.
///
/// The value is never dereferenced locally; it is only handed to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub usize);

impl Address {
    /// Creates a new address from a usize value
    pub const fn new(value: usize) -> Self {
        Address(value)
    }

    /// Creates a null address (0x0)
    pub const fn null() -> Self {
        Address(0)
    }

    /// Checks if the address is null
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the address is aligned to the specified boundary
    pub const fn is_aligned(&self, alignment: usize) -> bool {
        alignment != 0 && self.0 % alignment == 0
    }

    /// Adds a byte count, failing on overflow
    pub fn checked_add(&self, bytes: usize) -> MemoryResult<Self> {
        self.0
            .checked_add(bytes)
            .map(Address)
            .ok_or_else(|| MemoryError::InvalidAddress(format!("{} + 0x{:X} overflows", self, bytes)))
    }

    /// Returns the raw usize value
    pub const fn as_usize(&self) -> usize {
        self.0
    }
}

impl FromStr for Address {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let value = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            usize::from_str_radix(hex, 16)
        } else if let Some(hex) = s.strip_prefix('$') {
            usize::from_str_radix(hex, 16)
        } else if s.chars().any(|c| c.is_ascii_alphabetic()) {
            usize::from_str_radix(s, 16)
        } else {
            s.parse::<usize>()
        };

        value
            .map(Address::new)
            .map_err(|_| MemoryError::InvalidAddress(s.to_string()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

impl From<usize> for Address {
    fn from(value: usize) -> Self {
        Address::new(value)
    }
}

impl From<Address> for usize {
    fn from(address: Address) -> Self {
        address.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parsing() {
        assert_eq!(Address::from_str("0x1000").unwrap(), Address::new(0x1000));
        assert_eq!(Address::from_str("0X1000").unwrap(), Address::new(0x1000));
        assert_eq!(Address::from_str("$1000").unwrap(), Address::new(0x1000));
        assert_eq!(
            Address::from_str("DEADBEEF").unwrap(),
            Address::new(0xDEADBEEF)
        );
        assert_eq!(Address::from_str("4096").unwrap(), Address::new(4096));
        assert!(Address::from_str("0xZZ").is_err());
        assert!(Address::from_str("").is_err());
    }

    #[test]
    fn test_checked_add() {
        let addr = Address::new(0x1000);
        assert_eq!(addr.checked_add(0x10).unwrap(), Address::new(0x1010));
        assert!(Address::new(usize::MAX).checked_add(1).is_err());
    }

    #[test]
    fn test_alignment() {
        assert!(Address::new(0x2000).is_aligned(0x1000));
        assert!(!Address::new(0x2001).is_aligned(0x1000));
        assert!(!Address::new(0x2000).is_aligned(0));
    }

    #[test]
    fn test_address_display() {
        let addr = Address::new(0xDEADBEEF);
        assert_eq!(format!("{}", addr), "0x00000000DEADBEEF");
        assert_eq!(format!("{:x}", addr), "0x00000000deadbeef");
    }
}
