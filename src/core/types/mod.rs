//! Core type definitions for procmem
//!
//! Address wrappers, process and module descriptions, allocation presets and
//! the error taxonomy shared by every layer.

mod address;
mod error;
mod process_info;
mod protection;

// Re-export all public types
pub use address::Address;
pub use error::{ErrorCode, MemoryError, MemoryResult};
pub use process_info::{ModuleInfo, ProcessIdentity, ProcessInfo};
pub use protection::{AllocationRequest, Protection};

// Common type aliases
pub type ProcessId = u32;

/// Sentinel the backend returns when a name lookup finds nothing
pub const INVALID_PROCESS_ID: ProcessId = 0xFFFF_FFFF;
