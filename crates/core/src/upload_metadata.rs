//! tus `Upload-Metadata` header parsing.
//!
//! The header is a comma-separated list of `key[ base64(value)]` pairs.

use crate::error::{Error, Result};
use base64::{Engine as _, engine::general_purpose};
use std::collections::HashMap;

/// Header name carrying upload metadata.
pub const UPLOAD_METADATA_HEADER: &str = "upload-metadata";

/// Decoded upload metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UploadMetadata {
    entries: HashMap<String, Option<String>>,
}

impl UploadMetadata {
    /// Parse a raw header value.
    pub fn parse(header: &str) -> Result<Self> {
        let mut entries = HashMap::new();

        for pair in header.split(',') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }

            let mut parts = pair.split(' ').filter(|p| !p.is_empty());
            let Some(key) = parts.next() else {
                continue;
            };
            let value = match parts.next() {
                Some(encoded) => Some(decode_value(key, encoded)?),
                None => None,
            };
            if parts.next().is_some() {
                return Err(Error::InvalidUploadMetadata(format!(
                    "unexpected trailing data for key {key}"
                )));
            }

            if entries.insert(key.to_string(), value).is_some() {
                return Err(Error::InvalidUploadMetadata(format!(
                    "duplicate key {key}"
                )));
            }
        }

        Ok(Self { entries })
    }

    /// Get a decoded value. Keys present without a value yield `None`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(|v| v.as_deref())
    }

    /// The `filename` entry, if present and non-empty.
    pub fn filename(&self) -> Option<&str> {
        self.get("filename").filter(|f| !f.is_empty())
    }
}

fn decode_value(key: &str, encoded: &str) -> Result<String> {
    let bytes = general_purpose::STANDARD.decode(encoded).map_err(|e| {
        Error::InvalidUploadMetadata(format!("value for {key} is not base64: {e}"))
    })?;
    String::from_utf8(bytes)
        .map_err(|_| Error::InvalidUploadMetadata(format!("value for {key} is not UTF-8")))
}
