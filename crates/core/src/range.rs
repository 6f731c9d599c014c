//! HTTP `Range` header handling for single byte ranges.

use crate::error::{Error, Result};

/// A single requested byte range, before it is resolved against an object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteRange {
    /// `bytes=<start>-` or `bytes=<start>-<end>` (end inclusive).
    From { start: u64, end: Option<u64> },
    /// `bytes=-<length>`: the final `length` bytes.
    Suffix { length: u64 },
}

/// A range resolved against a concrete object size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedRange {
    /// First byte offset.
    pub offset: u64,
    /// Number of bytes.
    pub length: u64,
}

impl ResolvedRange {
    /// Inclusive last byte offset.
    pub fn last(&self) -> u64 {
        self.offset + self.length.saturating_sub(1)
    }

    /// `Content-Range` header value for an object of `size` bytes.
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.offset, self.last(), size)
    }
}

impl ByteRange {
    /// Parse a `Range` header value.
    ///
    /// Only a single range in the `bytes` unit is supported; anything else
    /// is an error the caller may choose to ignore.
    pub fn parse(header: &str) -> Result<Self> {
        let ranges = header
            .trim()
            .strip_prefix("bytes=")
            .ok_or_else(|| Error::InvalidRange(format!("unsupported range unit: {header}")))?;

        if ranges.contains(',') {
            return Err(Error::InvalidRange(
                "multiple ranges are not supported".to_string(),
            ));
        }

        let (start, end) = ranges
            .split_once('-')
            .ok_or_else(|| Error::InvalidRange(format!("malformed range: {header}")))?;
        let (start, end) = (start.trim(), end.trim());

        let parse = |s: &str| {
            s.parse::<u64>()
                .map_err(|_| Error::InvalidRange(format!("malformed range: {header}")))
        };

        match (start.is_empty(), end.is_empty()) {
            (true, true) => Err(Error::InvalidRange(format!("malformed range: {header}"))),
            (true, false) => Ok(Self::Suffix {
                length: parse(end)?,
            }),
            (false, true) => Ok(Self::From {
                start: parse(start)?,
                end: None,
            }),
            (false, false) => {
                let (start, end) = (parse(start)?, parse(end)?);
                if end < start {
                    return Err(Error::InvalidRange(format!("malformed range: {header}")));
                }
                Ok(Self::From {
                    start,
                    end: Some(end),
                })
            }
        }
    }

    /// Resolve against an object of `size` bytes.
    ///
    /// Returns `None` when the range cannot be satisfied.
    pub fn resolve(&self, size: u64) -> Option<ResolvedRange> {
        match *self {
            Self::From { start, end } => {
                if start >= size {
                    return None;
                }
                let last = end.map_or(size - 1, |e| e.min(size - 1));
                Some(ResolvedRange {
                    offset: start,
                    length: last - start + 1,
                })
            }
            Self::Suffix { length } => {
                if length == 0 || size == 0 {
                    return None;
                }
                let length = length.min(size);
                Some(ResolvedRange {
                    offset: size - length,
                    length,
                })
            }
        }
    }
}
