//! Extraction profiles.
//!
//! A profile records where the payloads of one firmware family live: the
//! hinted offset and decoder parameters of the raw stream, and the exact bounds
//! of the filesystem container. Profiles are plain serde structs, read from
//! JSON or YAML depending on the file extension.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::segment::{LzmaProps, ProbePlan, RawLzmaDecoder, SegmentLocator};

/// Current profile format version.
pub const PROFILE_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("Profile has an empty probe plan; at least one offset must be tried")]
    EmptyProbePlan,

    #[error("Dictionary size must be non-zero")]
    ZeroDictSize,

    #[error("Invalid LZMA properties lc={lc} lp={lp} pb={pb} (limits: lc<=8, lp<=4, pb<=4)")]
    InvalidProps { lc: u32, lp: u32, pb: u32 },

    #[error("Container length must be non-zero")]
    ZeroContainerLength,
}

/// Where and how to look for the raw compressed stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamParams {
    /// Best guess at the first byte of the stream.
    pub nominal_offset: usize,
    pub dict_size: u32,
    /// Decoded size the stream is believed to have. Logged, never enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_size: Option<u64>,
    #[serde(default)]
    pub props: LzmaProps,
    #[serde(default)]
    pub probes: ProbePlan,
}

impl StreamParams {
    pub fn decoder(&self) -> RawLzmaDecoder {
        RawLzmaDecoder::new(self.dict_size).with_props(self.props)
    }

    pub fn locator(&self) -> SegmentLocator<RawLzmaDecoder> {
        SegmentLocator::new(self.probes.clone(), self.decoder())
    }
}

/// Exact bounds of the filesystem container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerParams {
    pub offset: usize,
    pub length: usize,
}

/// Serializable description of one firmware family's layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionProfile {
    /// Human-friendly profile name.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Profile format version, not the firmware version.
    #[serde(default = "default_profile_version")]
    pub config_version: String,
    pub stream: StreamParams,
    pub container: ContainerParams,
}

fn default_profile_version() -> String {
    PROFILE_VERSION.to_string()
}

impl Default for ExtractionProfile {
    /// Layout of the firmware family this tool was first written for.
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            description: Some("LZMA kernel at ~0x2818, SquashFS root at 0x29FC22".to_string()),
            config_version: default_profile_version(),
            stream: StreamParams {
                nominal_offset: 10_264,
                dict_size: 8_388_608,
                expected_size: Some(8_861_280),
                props: LzmaProps::default(),
                probes: ProbePlan::default(),
            },
            container: ContainerParams { offset: 2_751_522, length: 5_159_718 },
        }
    }
}

impl ExtractionProfile {
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.stream.probes.is_empty() {
            return Err(ProfileError::EmptyProbePlan);
        }
        if self.stream.dict_size == 0 {
            return Err(ProfileError::ZeroDictSize);
        }
        let props = self.stream.props;
        if !props.is_valid() {
            return Err(ProfileError::InvalidProps { lc: props.lc, lp: props.lp, pb: props.pb });
        }
        if self.container.length == 0 {
            return Err(ProfileError::ZeroContainerLength);
        }
        Ok(())
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref(),
        Some("yaml") | Some("yml")
    )
}

/// Load and validate a profile from a `.json`, `.yaml` or `.yml` file.
pub fn load_profile(path: &Path) -> Result<ExtractionProfile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read profile at {}", path.display()))?;
    let profile: ExtractionProfile = if is_yaml(path) {
        serde_yaml::from_str(&text).context("Failed to parse profile YAML")?
    } else {
        serde_json::from_str(&text).context("Failed to parse profile JSON")?
    };
    profile.validate().with_context(|| format!("Invalid profile at {}", path.display()))?;
    Ok(profile)
}

/// Write `profile` to `path`, choosing the format from the extension.
pub fn save_profile(profile: &ExtractionProfile, path: &Path) -> Result<()> {
    let text = if is_yaml(path) {
        serde_yaml::to_string(profile).context("Failed to serialize profile to YAML")?
    } else {
        serde_json::to_string_pretty(profile).context("Failed to serialize profile to JSON")?
    };
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write profile to {}", path.display()))?;
    Ok(())
}
