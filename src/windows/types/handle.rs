//! Safe HANDLE wrapper with automatic cleanup

use crate::windows::bindings::kernel32;
use std::ptr;
use winapi::um::handleapi::INVALID_HANDLE_VALUE;
use winapi::um::winnt::HANDLE;

/// Safe wrapper around Windows HANDLE with RAII semantics
#[derive(Debug)]
pub struct Handle {
    handle: HANDLE,
}

impl Handle {
    /// Create a new Handle wrapper
    pub fn new(handle: HANDLE) -> Self {
        Handle { handle }
    }

    /// Create a null handle
    pub fn null() -> Self {
        Handle {
            handle: ptr::null_mut(),
        }
    }

    /// Check if handle is null or INVALID_HANDLE_VALUE
    pub fn is_invalid(&self) -> bool {
        self.handle.is_null() || self.handle == INVALID_HANDLE_VALUE
    }

    /// Get the raw handle
    pub fn raw(&self) -> HANDLE {
        self.handle
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if !self.is_invalid() {
            // Ignore errors on cleanup
            unsafe {
                let _ = kernel32::close_handle(self.handle);
            }
        }
    }
}

// Send + Sync are safe because HANDLEs are process-local
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}
