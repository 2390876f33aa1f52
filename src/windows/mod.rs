//! Windows API layer for process memory access
//!
//! All unsafe FFI calls are contained within this module. The public
//! surface is [`WindowsBackend`], an implementation of
//! [`MemoryBackend`](crate::backend::MemoryBackend).

pub mod backend;
pub mod bindings;
pub mod types;
pub mod utils;

pub use backend::{WindowsBackend, WindowsHandle};
pub use types::Handle;
pub use utils::ErrorCode;
