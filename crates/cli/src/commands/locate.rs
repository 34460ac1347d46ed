use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use carver_core::segment::SegmentCandidate;

use crate::commands::util::{resolve_profile, ContainerOverrides, StreamOverrides};
use crate::reporter_for;

/// Result of a stand-alone stream search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocateResult {
    pub nominal_offset: usize,
    #[serde(flatten)]
    pub found: SegmentCandidate,
    /// Signed distance from the nominal offset.
    pub delta: i64,
}

/// Search for the raw stream only. Nothing is written to disk.
pub fn locate_command(
    firmware: &Path,
    profile: Option<&Path>,
    overrides: &StreamOverrides,
    quiet: bool,
    json: bool,
) -> Result<LocateResult> {
    let profile = resolve_profile(profile, overrides, &ContainerOverrides::default())?;
    let buffer = fs::read(firmware)
        .with_context(|| format!("Failed to read firmware file {}", firmware.display()))?;

    let reporter = reporter_for(quiet || json);
    let nominal = profile.stream.nominal_offset;
    let recovered = profile
        .stream
        .locator()
        .locate(&buffer, nominal, reporter.as_ref())
        .with_context(|| format!("No stream found in {}", firmware.display()))?;

    let found = recovered.candidate();
    let result = LocateResult {
        nominal_offset: nominal,
        found,
        delta: found.offset as i64 - nominal as i64,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Stream found at offset {} ({:+} from nominal {}), {} bytes decoded",
            result.found.offset, result.delta, result.nominal_offset, result.found.decoded_len
        );
    }

    Ok(result)
}
