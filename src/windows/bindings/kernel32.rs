//! Kernel32.dll bindings for process and memory operations

use crate::core::types::{MemoryError, MemoryResult};
use crate::windows::utils::{last_native_error, wide_to_string, ErrorCode};
use std::mem;
use winapi::shared::minwindef::{DWORD, FALSE, LPVOID};
use winapi::um::handleapi::CloseHandle;
use winapi::um::memoryapi::{
    ReadProcessMemory, VirtualAllocEx, VirtualFreeEx, VirtualQueryEx, WriteProcessMemory,
};
use winapi::um::processthreadsapi::{GetExitCodeProcess, OpenProcess};
use winapi::um::winbase::QueryFullProcessImageNameW;
use winapi::um::winnt::{HANDLE, MEMORY_BASIC_INFORMATION, MEM_COMMIT, MEM_RELEASE, MEM_RESERVE};

/// Exit code reported while a process has not terminated
pub const STILL_ACTIVE: u32 = 259;

/// Safe wrapper for OpenProcess
pub fn open_process(pid: u32, desired_access: u32) -> MemoryResult<HANDLE> {
    unsafe {
        let handle = OpenProcess(desired_access, FALSE, pid);
        if handle.is_null() {
            Err(MemoryError::ProcessNotFound(pid))
        } else {
            Ok(handle)
        }
    }
}

/// Safe wrapper for CloseHandle
///
/// # Safety
/// The handle must be a valid Windows handle
pub unsafe fn close_handle(handle: HANDLE) -> MemoryResult<()> {
    if handle.is_null() {
        return Ok(());
    }

    if CloseHandle(handle) == FALSE {
        Err(last_native_error("CloseHandle"))
    } else {
        Ok(())
    }
}

/// Safe wrapper for ReadProcessMemory
///
/// A partial copy is reported as a short count rather than an error so the
/// caller can describe the truncation.
///
/// # Safety
/// The handle must be a valid process handle with appropriate access rights
pub unsafe fn read_process_memory(
    handle: HANDLE,
    address: usize,
    buffer: &mut [u8],
) -> MemoryResult<usize> {
    let mut bytes_read = 0;

    let result = ReadProcessMemory(
        handle,
        address as LPVOID,
        buffer.as_mut_ptr() as LPVOID,
        buffer.len(),
        &mut bytes_read,
    );

    if result == FALSE {
        if ErrorCode::last_error() == ErrorCode::PartialCopy {
            return Ok(bytes_read);
        }
        Err(last_native_error("ReadProcessMemory"))
    } else {
        Ok(bytes_read)
    }
}

/// Safe wrapper for WriteProcessMemory
///
/// # Safety
/// The handle must be a valid process handle with appropriate access rights
pub unsafe fn write_process_memory(
    handle: HANDLE,
    address: usize,
    data: &[u8],
) -> MemoryResult<usize> {
    let mut bytes_written = 0;

    let result = WriteProcessMemory(
        handle,
        address as LPVOID,
        data.as_ptr() as LPVOID,
        data.len(),
        &mut bytes_written,
    );

    if result == FALSE {
        if ErrorCode::last_error() == ErrorCode::PartialCopy {
            return Ok(bytes_written);
        }
        Err(last_native_error("WriteProcessMemory"))
    } else {
        Ok(bytes_written)
    }
}

/// Safe wrapper for VirtualAllocEx, committing and reserving in one call
///
/// # Safety
/// The handle must be a valid process handle with PROCESS_VM_OPERATION
pub unsafe fn virtual_alloc_ex(handle: HANDLE, size: usize, protection: u32) -> MemoryResult<usize> {
    let address = VirtualAllocEx(
        handle,
        std::ptr::null_mut(),
        size,
        MEM_COMMIT | MEM_RESERVE,
        protection,
    );

    if address.is_null() {
        Err(last_native_error("VirtualAllocEx"))
    } else {
        Ok(address as usize)
    }
}

/// Safe wrapper for VirtualFreeEx with MEM_RELEASE
///
/// # Safety
/// The handle must be a valid process handle with PROCESS_VM_OPERATION
pub unsafe fn virtual_free_ex(handle: HANDLE, address: usize) -> MemoryResult<()> {
    if VirtualFreeEx(handle, address as LPVOID, 0, MEM_RELEASE) == FALSE {
        Err(last_native_error("VirtualFreeEx"))
    } else {
        Ok(())
    }
}

/// Safe wrapper for VirtualQueryEx
///
/// # Safety
/// The handle must be a valid process handle with appropriate access rights
pub unsafe fn virtual_query_ex(
    handle: HANDLE,
    address: usize,
) -> MemoryResult<MEMORY_BASIC_INFORMATION> {
    let mut mbi: MEMORY_BASIC_INFORMATION = mem::zeroed();

    let result = VirtualQueryEx(
        handle,
        address as LPVOID,
        &mut mbi,
        mem::size_of::<MEMORY_BASIC_INFORMATION>(),
    );

    if result == 0 {
        Err(last_native_error("VirtualQueryEx"))
    } else {
        Ok(mbi)
    }
}

/// Safe wrapper for GetExitCodeProcess
///
/// # Safety
/// The handle must be a valid process handle with query access
pub unsafe fn exit_code(handle: HANDLE) -> MemoryResult<u32> {
    let mut code: DWORD = 0;
    if GetExitCodeProcess(handle, &mut code) == FALSE {
        Err(last_native_error("GetExitCodeProcess"))
    } else {
        Ok(code)
    }
}

/// Safe wrapper for QueryFullProcessImageNameW
///
/// # Safety
/// The handle must be a valid process handle with query access
pub unsafe fn process_image_path(handle: HANDLE) -> MemoryResult<String> {
    let mut buffer = [0u16; 1024];
    let mut size = buffer.len() as DWORD;

    if QueryFullProcessImageNameW(handle, 0, buffer.as_mut_ptr(), &mut size) == FALSE {
        return Err(last_native_error("QueryFullProcessImageNameW"));
    }

    Ok(wide_to_string(&buffer[..size as usize]))
}
