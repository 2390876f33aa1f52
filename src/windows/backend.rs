//! Memory-access backend over the Win32 API

use crate::backend::{MemoryBackend, ProcessHandle};
use crate::core::types::{
    Address, AllocationRequest, MemoryError, MemoryResult, ModuleInfo, ProcessId, ProcessInfo,
    INVALID_PROCESS_ID,
};
use crate::windows::bindings::{kernel32, Snapshot};
use crate::windows::types::Handle;
use crate::windows::utils::extract_filename;
use tracing::trace;
use winapi::um::winnt::PROCESS_ALL_ACCESS;

const PAGE_SIZE: usize = 0x1000;
const MEM_COMMIT: u32 = 0x1000;

/// An open process handle with all access rights
#[derive(Debug)]
pub struct WindowsHandle {
    handle: Handle,
    pid: ProcessId,
}

impl ProcessHandle for WindowsHandle {
    fn pid(&self) -> ProcessId {
        self.pid
    }

    fn raw_value(&self) -> i64 {
        self.handle.raw() as isize as i64
    }
}

/// Backend issuing ToolHelp32 and kernel32 calls against live processes
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsBackend;

impl WindowsBackend {
    pub fn new() -> Self {
        WindowsBackend
    }
}

impl MemoryBackend for WindowsBackend {
    type Handle = WindowsHandle;

    fn find_process_id(&self, name: &str) -> MemoryResult<ProcessId> {
        let snapshot = Snapshot::processes()?;
        Ok(snapshot.find_process(name).unwrap_or(INVALID_PROCESS_ID))
    }

    fn open_process(&self, pid: ProcessId) -> MemoryResult<WindowsHandle> {
        let raw = kernel32::open_process(pid, PROCESS_ALL_ACCESS)?;
        trace!(pid, handle = ?raw, "opened process");
        Ok(WindowsHandle {
            handle: Handle::new(raw),
            pid,
        })
    }

    fn process_name(&self, handle: &WindowsHandle) -> MemoryResult<String> {
        let path = unsafe { kernel32::process_image_path(handle.handle.raw())? };
        Ok(extract_filename(&path))
    }

    fn process_info(&self, handle: &WindowsHandle) -> MemoryResult<ProcessInfo> {
        let name = self.process_name(handle)?;
        Ok(ProcessInfo::new(name, handle.pid, handle.raw_value()))
    }

    fn find_module(&self, handle: &WindowsHandle, name: &str) -> MemoryResult<Option<ModuleInfo>> {
        Snapshot::modules(handle.pid)?.find_module(name)
    }

    fn allocate(&self, handle: &WindowsHandle, request: AllocationRequest) -> MemoryResult<Address> {
        let address = unsafe {
            kernel32::virtual_alloc_ex(handle.handle.raw(), request.size, request.protection.raw())?
        };
        Ok(Address::new(address))
    }

    fn deallocate(&self, handle: &WindowsHandle, address: Address, size: usize) -> MemoryResult<bool> {
        // MEM_RELEASE frees the whole reservation, so confirm the caller
        // describes exactly that reservation before releasing it.
        let mbi = unsafe { kernel32::virtual_query_ex(handle.handle.raw(), address.as_usize())? };

        if mbi.State != MEM_COMMIT || mbi.AllocationBase as usize != address.as_usize() {
            return Err(MemoryError::native(
                "VirtualFreeEx",
                format!("{} is not an allocation base", address),
            ));
        }

        let rounded = size
            .checked_add(PAGE_SIZE - 1)
            .map(|s| s & !(PAGE_SIZE - 1))
            .unwrap_or(usize::MAX);
        if size == 0 || rounded != mbi.RegionSize {
            return Err(MemoryError::native(
                "VirtualFreeEx",
                format!(
                    "size 0x{:X} does not match allocation of 0x{:X} at {}",
                    size, mbi.RegionSize, address
                ),
            ));
        }

        unsafe { kernel32::virtual_free_ex(handle.handle.raw(), address.as_usize())? };
        Ok(true)
    }

    fn is_running(&self, handle: &WindowsHandle) -> MemoryResult<bool> {
        let code = unsafe { kernel32::exit_code(handle.handle.raw())? };
        Ok(code == kernel32::STILL_ACTIVE)
    }

    fn read_bytes(&self, handle: &WindowsHandle, address: Address, buffer: &mut [u8]) -> MemoryResult<usize> {
        unsafe { kernel32::read_process_memory(handle.handle.raw(), address.as_usize(), buffer) }
    }

    fn write_bytes(&self, handle: &WindowsHandle, address: Address, data: &[u8]) -> MemoryResult<usize> {
        unsafe { kernel32::write_process_memory(handle.handle.raw(), address.as_usize(), data) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Protection;

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_allocate_write_read_free_in_current_process() {
        let backend = WindowsBackend::new();
        let handle = backend.open_process(std::process::id()).unwrap();
        assert!(backend.is_running(&handle).unwrap());

        let request = AllocationRequest::new(64, Protection::ReadWrite).unwrap();
        let address = backend.allocate(&handle, request).unwrap();

        assert_eq!(backend.write_bytes(&handle, address, &[1, 2, 3, 4]).unwrap(), 4);
        let mut buffer = [0u8; 4];
        assert_eq!(backend.read_bytes(&handle, address, &mut buffer).unwrap(), 4);
        assert_eq!(buffer, [1, 2, 3, 4]);

        assert!(backend.deallocate(&handle, address, 2 * PAGE_SIZE).is_err());
        assert!(backend.deallocate(&handle, address, 64).unwrap());
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_unknown_name_yields_sentinel() {
        let backend = WindowsBackend::new();
        let pid = backend
            .find_process_id("__definitely_nonexistent_process__.exe")
            .unwrap();
        assert_eq!(pid, INVALID_PROCESS_ID);
    }
}
