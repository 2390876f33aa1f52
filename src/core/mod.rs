//! Core module containing fundamental types for procmem
//!
//! This module provides the value types copied out of the backend
//! (process and module descriptions, addresses) and the error taxonomy.

pub mod types;

// Re-export commonly used types for convenience
pub use types::{
    Address, AllocationRequest, ErrorCode, MemoryError, MemoryResult, ModuleInfo, ProcessId,
    ProcessIdentity, ProcessInfo, Protection, INVALID_PROCESS_ID,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
