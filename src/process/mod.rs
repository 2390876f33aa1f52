//! Process handle management
//!
//! Handles are short-lived by default: the service opens one per call and
//! drops it when the call returns. [`HandleCache`] keeps them across calls
//! and tracks which process instance each pid currently names.

pub mod cache;

pub use cache::HandleCache;
