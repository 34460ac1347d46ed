use std::io::Write;

use lzma_rs::decompress::raw::{LzmaDecoder, LzmaParams, LzmaProperties};
use lzma_rs::decompress::{Options, Stream, UnpackedSize};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned by a [`StreamDecoder`] for a single attempt.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The decoder could not be set up with the configured parameters.
    #[error("decoder setup failed: {0}")]
    Setup(String),

    /// The input did not decode as a valid stream.
    #[error("stream decode failed: {0}")]
    Stream(String),
}

/// A header-less stream decoder.
///
/// Raw streams carry no magic or length, so the only way to learn whether an
/// offset is right is to try decoding from it.
pub trait StreamDecoder {
    /// Short human-readable name used in log lines.
    fn name(&self) -> &str;

    /// Decode `input` from its first byte. Trailing bytes after the end of the
    /// stream may be ignored.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>, DecodeError>;
}

impl<T: StreamDecoder + ?Sized> StreamDecoder for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn decode(&self, input: &[u8]) -> Result<Vec<u8>, DecodeError> {
        (**self).decode(input)
    }
}

/// LZMA1 literal/position properties (`lc`, `lp`, `pb`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LzmaProps {
    pub lc: u32,
    pub lp: u32,
    pub pb: u32,
}

impl Default for LzmaProps {
    /// The `0x5D` properties byte almost every LZMA1 encoder emits.
    fn default() -> Self {
        Self { lc: 3, lp: 0, pb: 2 }
    }
}

impl LzmaProps {
    pub fn is_valid(&self) -> bool {
        self.lc <= 8 && self.lp <= 4 && self.pb <= 4
    }

    /// The packed properties byte of an `.lzma` header.
    pub fn to_byte(&self) -> u8 {
        ((self.pb * 5 + self.lp) * 9 + self.lc) as u8
    }
}

/// Raw-format (no header) LZMA1 decoder with an externally supplied
/// dictionary size and unknown unpacked size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawLzmaDecoder {
    pub dict_size: u32,
    pub props: LzmaProps,
}

impl RawLzmaDecoder {
    pub fn new(dict_size: u32) -> Self {
        Self { dict_size, props: LzmaProps::default() }
    }

    pub fn with_props(mut self, props: LzmaProps) -> Self {
        self.props = props;
        self
    }

    /// One decode pass. On failure, also returns how many input bytes were
    /// consumed.
    fn decode_prefix(&self, input: &[u8]) -> Result<Vec<u8>, (DecodeError, usize)> {
        let properties =
            LzmaProperties { lc: self.props.lc, lp: self.props.lp, pb: self.props.pb };
        let params = LzmaParams::new(properties, self.dict_size, None);
        let mut decoder = LzmaDecoder::new(params, None)
            .map_err(|e| (DecodeError::Setup(e.to_string()), 0))?;

        let mut reader = input;
        let mut output = Vec::new();
        decoder
            .decompress(&mut reader, &mut output)
            .map_err(|e| (DecodeError::Stream(e.to_string()), input.len() - reader.len()))?;
        Ok(output)
    }

    /// Decode as much of `input` as it holds, without requiring an end
    /// marker. Used when the stream runs past the end of the buffer.
    fn decode_incomplete(&self, input: &[u8]) -> Result<Vec<u8>, DecodeError> {
        let options = Options {
            unpacked_size: UnpackedSize::UseProvided(None),
            allow_incomplete: true,
            ..Options::default()
        };
        let mut header = [0u8; 5];
        header[0] = self.props.to_byte();
        header[1..].copy_from_slice(&self.dict_size.to_le_bytes());

        let mut stream = Stream::new_with_options(&options, Vec::new());
        stream.write_all(&header).map_err(|e| DecodeError::Stream(e.to_string()))?;
        stream.write_all(input).map_err(|e| DecodeError::Stream(e.to_string()))?;
        stream.finish().map_err(|e| DecodeError::Stream(e.to_string()))
    }
}

impl StreamDecoder for RawLzmaDecoder {
    fn name(&self) -> &str {
        "lzma-raw"
    }

    fn decode(&self, input: &[u8]) -> Result<Vec<u8>, DecodeError> {
        if !self.props.is_valid() {
            return Err(DecodeError::Setup(format!(
                "invalid properties lc={} lp={} pb={}",
                self.props.lc, self.props.lp, self.props.pb
            )));
        }
        // The range coder always opens with a zero byte.
        if input.first() != Some(&0) {
            return Err(DecodeError::Stream("range coder does not start with 0x00".into()));
        }

        match self.decode_prefix(input) {
            Ok(output) => Ok(output),
            // lzma-rs refuses an end marker followed by more input. The slice
            // reader stops right after the marker, so retry on exactly the
            // bytes it consumed.
            Err((err, consumed)) if consumed > 0 && consumed < input.len() => {
                self.decode_prefix(&input[..consumed]).map_err(|_| err)
            }
            // Input ran out before an end marker: keep what was decoded.
            Err((err, consumed)) if consumed == input.len() => {
                self.decode_incomplete(input).map_err(|_| err)
            }
            Err((err, _)) => Err(err),
        }
    }
}
