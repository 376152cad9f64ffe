//! Utility functions for text handling, secret masking, and file system operations.
//!
//! This module provides helper functions used throughout the application:
//! - Plain-text summary extraction for feed entries
//! - String truncation for logging response bodies
//! - Secret masking for credential diagnostics
//! - Parent directory creation for report output

use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{debug, instrument};

/// Reduce a feed summary to plain text by cutting at the first `<`.
///
/// Not HTML sanitization: everything from the first tag-opening character
/// onward is dropped, including any text that follows the markup.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(plain_summary("Hello <b>world</b>"), "Hello ");
/// assert_eq!(plain_summary("<p>Lead</p>"), "");
/// ```
pub fn plain_summary(raw: &str) -> String {
    match raw.find('<') {
        Some(idx) => raw[..idx].to_string(),
        None => raw.to_string(),
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to at most `max` bytes (on a character
/// boundary) with an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Mask a secret so only its last 4 characters are visible.
///
/// Secrets of 4 characters or fewer are fully masked.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("...{tail}")
}

/// Ensure the parent directory of `path` exists.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn ensure_parent_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
            debug!(dir = %parent.display(), "Parent directory ready");
        }
    }
    Ok(())
}
