//! carver-core
//!
//! Core library for recovering embedded payloads from monolithic firmware images.
//!
//! A firmware image is treated as an opaque byte buffer holding (at least) two
//! payloads: a raw LZMA stream whose start offset is only approximately known,
//! and a SquashFS container whose offset and size are known exactly. This crate
//! locates and decodes the former, slices out the latter, and reproduces the
//! container's tree on the host filesystem.
//!
//! All substantive logic lives here so it is fully testable and reusable from
//! multiple frontends. The SquashFS parser and the LZMA decoder sit behind
//! traits (`image::ImageCodec`, `segment::StreamDecoder`) so tests and other
//! firmware families can swap them out.

pub mod config;
pub mod image;
pub mod layout;
pub mod materialize;
pub mod pipeline;
pub mod report;
pub mod segment;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
