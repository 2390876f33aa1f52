//! Process and module value types

use super::{Address, MemoryError, MemoryResult, ProcessId};
use serde::{Deserialize, Serialize};

/// Snapshot of a process's identity, copied out of the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub name: String,
    pub pid: ProcessId,
    /// Native handle value at the time of the query. Without the handle
    /// cache the handle is closed again before the call returns.
    pub handle: i64,
}

impl ProcessInfo {
    /// Creates a new ProcessInfo
    pub fn new(name: impl Into<String>, pid: ProcessId, handle: i64) -> Self {
        ProcessInfo {
            name: name.into(),
            pid,
            handle,
        }
    }
}

/// A pid together with the handle-cache generation it was resolved under.
///
/// Two identities with the same pid but different generations refer to
/// different process instances (the OS reused the identifier).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessIdentity {
    pub pid: ProcessId,
    pub generation: u64,
}

/// A loaded module inside a target process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: String,
    pub path: String,
    pub base: Address,
    pub size: usize,
    pub end: Address,
}

impl ModuleInfo {
    /// Builds a module description, deriving `end` from `base + size`
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        base: Address,
        size: usize,
    ) -> MemoryResult<Self> {
        let end = base.checked_add(size)?;
        Ok(ModuleInfo {
            name: name.into(),
            path: path.into(),
            base,
            size,
            end,
        })
    }

    /// Builds a module description from backend-supplied bounds, rejecting
    /// values where `end != base + size`
    pub fn from_bounds(
        name: impl Into<String>,
        path: impl Into<String>,
        base: Address,
        size: usize,
        end: Address,
    ) -> MemoryResult<Self> {
        let module = Self::new(name, path, base, size)?;
        if module.end != end {
            return Err(MemoryError::native(
                "find_module",
                format!(
                    "inconsistent bounds for {}: base {} + 0x{:X} != end {}",
                    module.name, base, size, end
                ),
            ));
        }
        Ok(module)
    }

    /// Checks if an address is within this module
    pub fn contains_address(&self, address: Address) -> bool {
        address >= self.base && address < self.end
    }
}
