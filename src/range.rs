//! HTTP byte-range parsing and resolution.
//!
//! Only the single-range form `bytes=<start>-<end?>` is supported. A header
//! that does not match that form is ignored by the caller (the request is
//! served as a full-resource response), per RFC 9110's allowance to ignore
//! an unrecognized Range header. A well-formed range that cannot be served
//! against the current container size resolves to 416.
//!
//! All arithmetic runs against a size snapshot captured once at the start
//! of a request; the container may grow during transmission and the
//! response must stay consistent with the snapshot.

use crate::error::{Result, WavecastError};

/// A parsed `Range: bytes=<start>-<end?>` header, before resolution
/// against the container size. `end` is inclusive when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeHeader {
    pub start: u64,
    pub end: Option<u64>,
}

impl RangeHeader {
    /// Parses a `Range` header value. Returns `None` for anything other
    /// than a single well-formed `bytes=` range.
    pub fn parse(value: &str) -> Option<Self> {
        let spec = value.strip_prefix("bytes=")?.trim();
        let (start, end) = spec.split_once('-')?;

        let start: u64 = start.trim().parse().ok()?;
        let end = match end.trim() {
            "" => None,
            e => Some(e.parse().ok()?),
        };

        Some(Self { start, end })
    }

    /// Resolves the range against the container size observed at the start
    /// of the request.
    ///
    /// A missing `end` defaults to `size - 1`; an `end` past the tail is
    /// clamped to `size - 1` (the client may probe past the known-good tail
    /// of a growing resource). `start >= size` or `start > end` is
    /// unsatisfiable.
    pub fn resolve(&self, size: u64) -> Result<ResolvedRange> {
        let unsatisfiable = || WavecastError::RangeNotSatisfiable {
            start: self.start,
            end: self.end,
            size,
        };

        if size == 0 || self.start >= size {
            return Err(unsatisfiable());
        }

        let end = self.end.unwrap_or(size - 1).min(size - 1);
        if self.start > end {
            return Err(unsatisfiable());
        }

        Ok(ResolvedRange {
            start: self.start,
            end,
        })
    }
}

/// A byte window `[start, end]` (inclusive) known to lie within the
/// container size it was resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub start: u64,
    pub end: u64,
}

impl ResolvedRange {
    /// Number of bytes in the window. Always at least 1 by construction.
    pub fn byte_len(&self) -> u64 {
        self.end - self.start + 1
    }
}
