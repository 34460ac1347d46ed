//! Segment recovery: locating a raw compressed stream near a hinted offset and
//! slicing out regions whose bounds are known exactly.
//!
//! Data flows one way: the caller owns the firmware buffer and lends it here
//! read-only; both operations return owned copies of what they recover.

mod decoder;
mod probe;

pub use decoder::{DecodeError, LzmaProps, RawLzmaDecoder, StreamDecoder};
pub use probe::{OffsetProbe, ProbePlan};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::report::Reporter;

/// A decode attempt that produced output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentCandidate {
    pub offset: usize,
    pub decoded_len: usize,
}

/// Decompressed payload recovered by [`SegmentLocator::locate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredStream {
    /// Offset in the firmware buffer the stream was decoded from.
    pub offset: usize,
    pub data: Vec<u8>,
}

impl RecoveredStream {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn candidate(&self) -> SegmentCandidate {
        SegmentCandidate { offset: self.offset, decoded_len: self.data.len() }
    }
}

/// Literal byte range copied out of the firmware buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSegment {
    pub offset: usize,
    /// Length the caller asked for; `data` is shorter when the buffer ends first.
    pub requested_len: usize,
    pub data: Vec<u8>,
}

impl RawSegment {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_truncated(&self) -> bool {
        self.data.len() < self.requested_len
    }
}

#[derive(Debug, Error)]
pub enum LocateError {
    /// No candidate offset decoded to a non-empty stream.
    #[error("no valid stream found around offset {nominal} (tried {tried:?})")]
    NotFound { nominal: usize, tried: Vec<usize> },
}

/// Searches a small, ordered neighbourhood of a nominal offset for a raw stream.
pub struct SegmentLocator<D: StreamDecoder> {
    plan: ProbePlan,
    decoder: D,
}

impl SegmentLocator<RawLzmaDecoder> {
    /// Locator for raw LZMA1 with the default probe plan.
    pub fn lzma(dict_size: u32) -> Self {
        Self::new(ProbePlan::default(), RawLzmaDecoder::new(dict_size))
    }
}

impl<D: StreamDecoder> SegmentLocator<D> {
    pub fn new(plan: ProbePlan, decoder: D) -> Self {
        Self { plan, decoder }
    }

    pub fn plan(&self) -> &ProbePlan {
        &self.plan
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Try each planned offset in order and return the first one that decodes
    /// without error to at least one byte.
    ///
    /// Decode failures at a candidate are not errors; they only move the
    /// search on. Exhausting the plan yields [`LocateError::NotFound`].
    pub fn locate(
        &self,
        buffer: &[u8],
        nominal_offset: usize,
        reporter: &dyn Reporter,
    ) -> Result<RecoveredStream, LocateError> {
        let candidates = self.plan.candidates(nominal_offset, buffer.len());
        let mut tried = Vec::with_capacity(candidates.len());

        for offset in candidates {
            tried.push(offset);
            reporter.info(&format!("Trying offset: {offset}"));

            match self.decoder.decode(&buffer[offset..]) {
                Ok(data) if !data.is_empty() => {
                    let recovered = RecoveredStream { offset, data };
                    reporter.success(&format!(
                        "Successfully decompressed: {} bytes at offset {offset}",
                        recovered.len()
                    ));
                    return Ok(recovered);
                }
                Ok(_) => {
                    reporter.info(&format!("Offset {offset} decoded to an empty stream"));
                }
                Err(err) => {
                    let name = self.decoder.name();
                    reporter.info(&format!("Offset {offset} rejected by {name}: {err}"));
                }
            }
        }

        reporter.error(&format!(
            "Could not find valid {} data around offset {nominal_offset}",
            self.decoder.name()
        ));
        Err(LocateError::NotFound { nominal: nominal_offset, tried })
    }
}

/// Copy `buffer[offset..offset + length]`, clamped to the end of the buffer.
///
/// Never fails: an offset past the end gives an empty segment. Callers that
/// need the exact length check [`RawSegment::is_truncated`].
pub fn extract(buffer: &[u8], offset: usize, length: usize) -> RawSegment {
    let start = offset.min(buffer.len());
    let end = offset.saturating_add(length).min(buffer.len());
    RawSegment { offset, requested_len: length, data: buffer[start..end].to_vec() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_clamps_to_buffer_end() {
        let buffer: Vec<u8> = (0u8..10).collect();

        let full = extract(&buffer, 2, 3);
        assert_eq!(full.data, vec![2, 3, 4]);
        assert!(!full.is_truncated());

        let short = extract(&buffer, 8, 5);
        assert_eq!(short.data, vec![8, 9]);
        assert!(short.is_truncated());

        let past = extract(&buffer, 20, 5);
        assert!(past.is_empty());
        assert_eq!(past.requested_len, 5);
    }

    #[test]
    fn extract_handles_overflowing_length() {
        let buffer = [1u8, 2, 3];
        let seg = extract(&buffer, 1, usize::MAX);
        assert_eq!(seg.data, vec![2, 3]);
    }
}
