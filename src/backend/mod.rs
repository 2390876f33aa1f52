//! Memory-access backends
//!
//! The service never talks to the operating system directly. Everything
//! OS-specific sits behind [`MemoryBackend`], so the same validation and
//! error translation runs against the Windows API or against the in-memory
//! [`SimulatedBackend`] used by the tests.

pub mod simulated;

pub use simulated::{SimulatedBackend, SimulatedHandle};

#[cfg(windows)]
pub use crate::windows::WindowsBackend;

use crate::core::types::{
    Address, AllocationRequest, MemoryResult, ModuleInfo, ProcessId, ProcessInfo,
};
use std::fmt;

/// An opened process, as handed out by a backend
pub trait ProcessHandle: fmt::Debug + Send + Sync {
    /// The identifier the handle was opened from
    fn pid(&self) -> ProcessId;

    /// The native handle value, widened to an integer for reporting
    fn raw_value(&self) -> i64;
}

/// Capabilities the service consumes from the platform.
///
/// Implementations report failures as `MemoryError` values; the only
/// sentinel in the contract is [`INVALID_PROCESS_ID`](crate::core::INVALID_PROCESS_ID)
/// from [`find_process_id`](MemoryBackend::find_process_id).
pub trait MemoryBackend: Send + Sync {
    type Handle: ProcessHandle;

    /// Resolves a process by executable name, returning the sentinel on a miss
    fn find_process_id(&self, name: &str) -> MemoryResult<ProcessId>;

    /// Opens the process, failing with `ProcessNotFound` when it cannot be opened
    fn open_process(&self, pid: ProcessId) -> MemoryResult<Self::Handle>;

    fn process_name(&self, handle: &Self::Handle) -> MemoryResult<String>;

    fn process_info(&self, handle: &Self::Handle) -> MemoryResult<ProcessInfo>;

    /// Looks up a loaded module by name; `Ok(None)` when it is not loaded.
    ///
    /// Name matching follows the platform: case-insensitive on Windows,
    /// where module names are, and exact in [`SimulatedBackend`].
    fn find_module(&self, handle: &Self::Handle, name: &str) -> MemoryResult<Option<ModuleInfo>>;

    fn allocate(&self, handle: &Self::Handle, request: AllocationRequest) -> MemoryResult<Address>;

    /// Releases a region previously returned by [`allocate`](MemoryBackend::allocate).
    ///
    /// `size` must match the allocation; backends reject mismatches instead
    /// of freeing a different extent than the caller described.
    fn deallocate(&self, handle: &Self::Handle, address: Address, size: usize) -> MemoryResult<bool>;

    fn is_running(&self, handle: &Self::Handle) -> MemoryResult<bool>;

    /// Reads into `buffer`, returning the number of bytes transferred
    fn read_bytes(&self, handle: &Self::Handle, address: Address, buffer: &mut [u8]) -> MemoryResult<usize>;

    /// Writes `data`, returning the number of bytes transferred
    fn write_bytes(&self, handle: &Self::Handle, address: Address, data: &[u8]) -> MemoryResult<usize>;
}
