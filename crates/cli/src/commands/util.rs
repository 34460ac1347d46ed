use std::path::Path;

use anyhow::{anyhow, Context, Result};
use clap::Args;

use carver_core::config::{load_profile, ExtractionProfile};
use carver_core::image::ImageCodec;
#[cfg(not(feature = "squashfs-backend"))]
use carver_core::image::{CodecError, FilesystemImage};

/// Command-line overrides for the raw stream search.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamOverrides {
    /// Nominal offset of the raw LZMA stream (overrides the profile).
    #[arg(long)]
    pub lzma_offset: Option<usize>,

    /// LZMA dictionary size in bytes (overrides the profile).
    #[arg(long)]
    pub dict_size: Option<u32>,
}

/// Command-line overrides for the container bounds.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerOverrides {
    /// Exact offset of the SquashFS container (overrides the profile).
    #[arg(long)]
    pub fs_offset: Option<usize>,

    /// Exact length of the SquashFS container (overrides the profile).
    #[arg(long)]
    pub fs_length: Option<usize>,
}

impl StreamOverrides {
    pub fn apply(&self, profile: &mut ExtractionProfile) {
        if let Some(offset) = self.lzma_offset {
            profile.stream.nominal_offset = offset;
        }
        if let Some(dict_size) = self.dict_size {
            profile.stream.dict_size = dict_size;
        }
    }
}

impl ContainerOverrides {
    pub fn apply(&self, profile: &mut ExtractionProfile) {
        if let Some(offset) = self.fs_offset {
            profile.container.offset = offset;
        }
        if let Some(length) = self.fs_length {
            profile.container.length = length;
        }
    }
}

/// Load the profile at `path` (or the built-in default), apply overrides and
/// validate the result.
pub fn resolve_profile(
    path: Option<&Path>,
    stream: &StreamOverrides,
    container: &ContainerOverrides,
) -> Result<ExtractionProfile> {
    let mut profile = match path {
        Some(path) => load_profile(path)?,
        None => ExtractionProfile::default(),
    };
    stream.apply(&mut profile);
    container.apply(&mut profile);
    profile
        .validate()
        .with_context(|| format!("Invalid extraction parameters for profile '{}'", profile.name))?;
    Ok(profile)
}

/// Serialization format accepted by `profile --format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileFormat {
    Json,
    Yaml,
}

pub fn validate_profile_format(format: &str) -> Result<ProfileFormat> {
    match format {
        "json" => Ok(ProfileFormat::Json),
        "yaml" | "yml" => Ok(ProfileFormat::Yaml),
        other => Err(anyhow!("Invalid format '{}'. Allowed: json, yaml", other)),
    }
}

/// Container codec compiled into this binary.
#[cfg(feature = "squashfs-backend")]
pub fn default_codec() -> Box<dyn ImageCodec> {
    Box::new(carver_core::image::BackhandCodec)
}

#[cfg(not(feature = "squashfs-backend"))]
pub fn default_codec() -> Box<dyn ImageCodec> {
    Box::new(UnavailableCodec)
}

/// Stand-in used when no container parser is compiled in. Every open fails,
/// so the raw segments are still written but nothing is materialized.
#[cfg(not(feature = "squashfs-backend"))]
struct UnavailableCodec;

#[cfg(not(feature = "squashfs-backend"))]
impl ImageCodec for UnavailableCodec {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn FilesystemImage>, CodecError> {
        Err(CodecError::malformed(path, "built without the squashfs-backend feature"))
    }
}
