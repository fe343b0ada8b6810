//! Bundle archives: gzip-compressed tar files.
//!
//! Every entry name is checked with [`validate_entry_path`] before any of its
//! bytes are accepted.

mod tar_gz;

use std::path::Path;

use crate::errors::BundleError;
use crate::runtime::clean_path;

pub use tar_gz::TarGz;

const MAX_PATH_LEN: usize = 255;

/// Characters rejected at either end of an entry name.
const EDGE_CHARS: &[char] = &[' ', '\t', '\n', '\r', '\0'];

/// Reject entry names that could escape the extraction root or smuggle
/// bytes past later path handling.
pub fn validate_entry_path(path: &[u8]) -> Result<&str, BundleError> {
    let display = String::from_utf8_lossy(path);

    if path.is_empty() || path.len() > MAX_PATH_LEN {
        return Err(BundleError::invalid_path(
            display,
            format!("length must be between 1 and {MAX_PATH_LEN} bytes"),
        ));
    }

    let path = std::str::from_utf8(path)
        .map_err(|_| BundleError::invalid_path(display.clone(), "not valid UTF-8"))?;

    if path.contains("..") {
        return Err(BundleError::invalid_path(path, "contains '..'"));
    }
    if path.contains("://") {
        return Err(BundleError::invalid_path(path, "contains '://'"));
    }
    if path.contains('\0') {
        return Err(BundleError::invalid_path(path, "contains a NUL byte"));
    }
    if path.trim_matches(EDGE_CHARS) != path {
        return Err(BundleError::invalid_path(
            path,
            "has leading or trailing whitespace or control characters",
        ));
    }
    if clean_path(path) != path {
        return Err(BundleError::invalid_path(path, "is not in clean form"));
    }
    if path.starts_with('/') || Path::new(path).is_absolute() {
        return Err(BundleError::invalid_path(path, "is absolute"));
    }

    Ok(path)
}
