//! Storage key derivation and validation.
//!
//! Filenames arrive from clients through the tus `Upload-Metadata` header and
//! must never be able to address anything outside `<prefix>/<service_id>/`.

use crate::MAX_KEY_BYTES;
use crate::error::{Error, Result};

/// Placeholder used when a filename sanitizes to nothing.
pub const UNKNOWN_FILENAME: &str = "unknown";

/// Turn an untrusted filename into a single safe key segment.
///
/// Only the final `/`-separated component is kept, `..` sequences are
/// removed, anything outside `[A-Za-z0-9._-]` becomes `_`, and a leading
/// `.` is replaced so the result never looks like a hidden file.
pub fn sanitize_filename(filename: &str) -> String {
    if filename.trim().is_empty() {
        return UNKNOWN_FILENAME.to_string();
    }

    let basename = filename.rsplit('/').next().unwrap_or_default();
    if basename.is_empty() {
        return UNKNOWN_FILENAME.to_string();
    }

    let stripped = collapse_separators(&basename.replace("..", ""));
    let mut sanitized: String = stripped
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        return UNKNOWN_FILENAME.to_string();
    }

    if sanitized.starts_with('.') {
        sanitized.replace_range(..1, "_");
    }

    sanitized
}

/// Replace every run of `/` and every run of `\` with a single `_`.
fn collapse_separators(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut previous: Option<char> = None;
    for c in s.chars() {
        if c == '/' || c == '\\' {
            if previous != Some(c) {
                out.push('_');
            }
        } else {
            out.push(c);
        }
        previous = Some(c);
    }
    out
}

/// Build the hierarchical key `<prefix>/<service_id>/<sanitized filename>`.
pub fn generate_upload_path(prefix: &str, service_id: &str, filename: &str) -> Result<String> {
    if service_id.trim().is_empty() {
        return Err(Error::InvalidServiceId(
            "service id is required for path generation".to_string(),
        ));
    }

    Ok(format!(
        "{}/{}/{}",
        prefix,
        service_id,
        sanitize_filename(filename)
    ))
}

/// Check that `path` is a well-formed key rooted at `expected_prefix`.
pub fn validate_path(path: &str, expected_prefix: &str) -> bool {
    let rooted = path
        .strip_prefix(expected_prefix)
        .is_some_and(|rest| rest.starts_with('/'));

    rooted
        && !path.contains("..")
        && !path.contains("//")
        && !path.contains('\\')
        && path.len() <= MAX_KEY_BYTES
}

/// Recover the service id from a key produced by [`generate_upload_path`].
///
/// Returns `None` unless at least two segments follow the prefix.
pub fn extract_service_id_from_path<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?.strip_prefix('/')?;
    let mut segments = rest.split('/');
    let service_id = segments.next()?;
    segments.next()?;
    if service_id.is_empty() {
        return None;
    }
    Some(service_id)
}

/// Whether a client-supplied path id carries a traversal pattern.
pub fn has_traversal_pattern(path: &str) -> bool {
    path.contains("..") || path.contains("//") || path.contains('\\')
}
