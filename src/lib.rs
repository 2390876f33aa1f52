//! procmem: inspect and modify the memory of other processes
//!
//! [`ProcessMemoryService`] exposes nine synchronous operations: find a
//! process by name, describe it, look up a loaded module, allocate and free
//! regions, read and write bytes, and check liveness. Platform access goes
//! through a [`MemoryBackend`]: [`WindowsBackend`] on Windows, or the
//! in-memory [`SimulatedBackend`] everywhere.
//!
//! Processes are addressed by pid and re-resolved on every call. A pid can
//! be reused by the OS once its process exits, so a call may land in a
//! different process than the previous one; enable the handle cache and use
//! [`ProcessMemoryService::verify_identity`] where that matters.
//!
//! `write_memory` reports `true` only after a complete write. Failed or
//! partial writes surface as `NATIVE_OPERATION_FAILED`.
//!
//! [`WindowsBackend`]: crate::backend::WindowsBackend

pub mod backend;
pub mod calls;
pub mod config;
pub mod core;
pub mod process;
pub mod service;
#[cfg(windows)]
pub mod windows;

pub use backend::{MemoryBackend, ProcessHandle, SimulatedBackend};
pub use calls::{invoke, Operation};
pub use core::types::{
    Address, AllocationRequest, ErrorCode, MemoryError, MemoryResult, ModuleInfo, ProcessId,
    ProcessIdentity, ProcessInfo, Protection, INVALID_PROCESS_ID,
};
pub use service::ProcessMemoryService;
