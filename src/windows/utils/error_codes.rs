//! Windows error code handling utilities

use crate::core::types::MemoryError;
use std::fmt;
use ::windows::core::HRESULT;
use winapi::um::errhandlingapi::GetLastError;

/// Common Windows error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success,
    AccessDenied,
    InvalidHandle,
    InvalidParameter,
    PartialCopy,
    InvalidAddress,
    NoAccess,
    Unknown(u32),
}

impl From<u32> for ErrorCode {
    fn from(code: u32) -> Self {
        match code {
            0 => ErrorCode::Success,
            5 => ErrorCode::AccessDenied,
            6 => ErrorCode::InvalidHandle,
            87 => ErrorCode::InvalidParameter,
            299 => ErrorCode::PartialCopy,
            487 => ErrorCode::InvalidAddress,
            998 => ErrorCode::NoAccess,
            _ => ErrorCode::Unknown(code),
        }
    }
}

impl ErrorCode {
    /// Get the last Windows error
    pub fn last_error() -> Self {
        unsafe { ErrorCode::from(GetLastError()) }
    }

    /// The raw Win32 value
    pub fn raw(&self) -> u32 {
        match self {
            ErrorCode::Success => 0,
            ErrorCode::AccessDenied => 5,
            ErrorCode::InvalidHandle => 6,
            ErrorCode::InvalidParameter => 87,
            ErrorCode::PartialCopy => 299,
            ErrorCode::InvalidAddress => 487,
            ErrorCode::NoAccess => 998,
            ErrorCode::Unknown(code) => *code,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Success => write!(f, "Success"),
            ErrorCode::AccessDenied => write!(f, "Access denied"),
            ErrorCode::InvalidHandle => write!(f, "Invalid handle"),
            ErrorCode::InvalidParameter => write!(f, "Invalid parameter"),
            ErrorCode::PartialCopy => write!(f, "Partial copy"),
            ErrorCode::InvalidAddress => write!(f, "Invalid address"),
            ErrorCode::NoAccess => write!(f, "Invalid access to memory location"),
            ErrorCode::Unknown(code) => write!(f, "Unknown error: {}", code),
        }
    }
}

/// Builds a native failure from the calling thread's last error.
///
/// `GetLastError` is read once, before any formatting call can overwrite it.
pub fn last_native_error(operation: &'static str) -> MemoryError {
    native_error(operation, ErrorCode::last_error())
}

/// Builds a native failure for `code`, with the system message for it
pub fn native_error(operation: &'static str, code: ErrorCode) -> MemoryError {
    let message = ::windows::core::Error::from(HRESULT::from_win32(code.raw()))
        .message()
        .to_string();
    let reason = if message.trim().is_empty() {
        code.to_string()
    } else {
        message.trim().to_string()
    };
    MemoryError::native_with_code(operation, code.raw(), reason)
}
