//! Windows utility functions

pub mod error_codes;
pub mod string_conv;

pub use error_codes::{last_native_error, native_error, ErrorCode};
pub use string_conv::{extract_filename, wide_to_string};
