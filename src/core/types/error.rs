//! Error types for process memory operations

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::ProcessId;

/// Stable identifier for each failure condition.
///
/// The string form is part of the public contract: callers match on it, so
/// variants must never be renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MissingProcessName,
    MissingProcessPid,
    MissingFunctionArguments,
    InvalidParameters,
    NoProcessFound,
    ProcessNotFound,
    ProcessIdentityChanged,
    ModuleNotFound,
    NativeOperationFailed,
    InvalidAddress,
    IoError,
    JsonError,
}

impl ErrorCode {
    /// Returns the identifier as it is reported to callers
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MissingProcessName => "MISSING_PROCESS_NAME",
            ErrorCode::MissingProcessPid => "MISSING_PROCESS_PID",
            ErrorCode::MissingFunctionArguments => "MISSING_FUNCTION_ARGUMENTS",
            ErrorCode::InvalidParameters => "INVALID_PARAMETERS",
            ErrorCode::NoProcessFound => "NO_PROCESS_FOUND",
            ErrorCode::ProcessNotFound => "PROCESS_NOT_FOUND",
            ErrorCode::ProcessIdentityChanged => "PROCESS_IDENTITY_CHANGED",
            ErrorCode::ModuleNotFound => "MODULE_NOT_FOUND",
            ErrorCode::NativeOperationFailed => "NATIVE_OPERATION_FAILED",
            ErrorCode::InvalidAddress => "INVALID_ADDRESS",
            ErrorCode::IoError => "IO_ERROR",
            ErrorCode::JsonError => "JSON_ERROR",
        }
    }

    /// True for failures detected before any backend call
    pub const fn is_argument_error(&self) -> bool {
        matches!(
            self,
            ErrorCode::MissingProcessName
                | ErrorCode::MissingProcessPid
                | ErrorCode::MissingFunctionArguments
                | ErrorCode::InvalidParameters
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for memory operations
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("MISSING_PROCESS_NAME")]
    MissingProcessName,

    #[error("MISSING_PROCESS_PID")]
    MissingProcessPid,

    #[error("MISSING_FUNCTION_ARGUMENTS ({0})")]
    MissingFunctionArguments(&'static str),

    #[error("INVALID_PARAMETERS: {0}")]
    InvalidParameters(String),

    #[error("NO_PROCESS_FOUND: {0}")]
    NoProcessFound(String),

    #[error("Process not found: {0}")]
    ProcessNotFound(ProcessId),

    #[error("Process {pid} changed identity: generation {expected} is now {actual}")]
    ProcessIdentityChanged {
        pid: ProcessId,
        expected: u64,
        actual: u64,
    },

    #[error("Module not found in process {pid}: {name}")]
    ModuleNotFound { pid: ProcessId, name: String },

    #[error("{operation} failed{}: {reason}", os_code_suffix(.code))]
    NativeOperationFailed {
        operation: &'static str,
        code: Option<u32>,
        reason: String,
    },

    #[error("Invalid memory address: {0}")]
    InvalidAddress(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

fn os_code_suffix(code: &Option<u32>) -> String {
    code.map(|c| format!(" (os error {})", c)).unwrap_or_default()
}

/// Result type alias for memory operations
pub type MemoryResult<T> = Result<T, MemoryError>;

impl MemoryError {
    /// Returns the stable identifier for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            MemoryError::MissingProcessName => ErrorCode::MissingProcessName,
            MemoryError::MissingProcessPid => ErrorCode::MissingProcessPid,
            MemoryError::MissingFunctionArguments(_) => ErrorCode::MissingFunctionArguments,
            MemoryError::InvalidParameters(_) => ErrorCode::InvalidParameters,
            MemoryError::NoProcessFound(_) => ErrorCode::NoProcessFound,
            MemoryError::ProcessNotFound(_) => ErrorCode::ProcessNotFound,
            MemoryError::ProcessIdentityChanged { .. } => ErrorCode::ProcessIdentityChanged,
            MemoryError::ModuleNotFound { .. } => ErrorCode::ModuleNotFound,
            MemoryError::NativeOperationFailed { .. } => ErrorCode::NativeOperationFailed,
            MemoryError::InvalidAddress(_) => ErrorCode::InvalidAddress,
            MemoryError::IoError(_) => ErrorCode::IoError,
            MemoryError::JsonError(_) => ErrorCode::JsonError,
        }
    }

    /// Creates a native failure without an OS error code
    pub fn native(operation: &'static str, reason: impl Into<String>) -> Self {
        MemoryError::NativeOperationFailed {
            operation,
            code: None,
            reason: reason.into(),
        }
    }

    /// Creates a native failure carrying an OS error code
    pub fn native_with_code(operation: &'static str, code: u32, reason: impl Into<String>) -> Self {
        MemoryError::NativeOperationFailed {
            operation,
            code: Some(code),
            reason: reason.into(),
        }
    }

    /// Creates an invalid parameters error
    pub fn invalid_parameters(reason: impl Into<String>) -> Self {
        MemoryError::InvalidParameters(reason.into())
    }
}
