//! String conversion utilities for Windows API

use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;

/// Convert a NUL-padded Windows wide string (UTF-16) to a Rust string
pub fn wide_to_string(wide: &[u16]) -> String {
    let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
    let os_string = OsString::from_wide(&wide[..len]);
    os_string.to_string_lossy().into_owned()
}

/// Extract filename from full path
pub fn extract_filename(path: &str) -> String {
    path.rsplit(|c: char| c == '\\' || c == '/').next().unwrap_or(path).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wide_to_string() {
        let wide = vec![72, 101, 108, 108, 111, 0, 0, 0];
        assert_eq!(wide_to_string(&wide), "Hello");

        let no_null = vec![72, 101, 108, 108, 111];
        assert_eq!(wide_to_string(&no_null), "Hello");
    }

    #[test]
    fn test_extract_filename() {
        assert_eq!(
            extract_filename("C:\\Windows\\explorer.exe"),
            "explorer.exe"
        );
        assert_eq!(extract_filename("explorer.exe"), "explorer.exe");
        assert_eq!(extract_filename(""), "");
    }
}
