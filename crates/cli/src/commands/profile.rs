use std::path::Path;

use anyhow::{Context, Result};

use carver_core::config::{save_profile, ExtractionProfile};

use crate::commands::util::{validate_profile_format, ProfileFormat};

/// Render the built-in profile in the requested format.
pub fn render_default_profile(format: ProfileFormat) -> Result<String> {
    let profile = ExtractionProfile::default();
    match format {
        ProfileFormat::Json => serde_json::to_string_pretty(&profile)
            .context("Failed to serialize profile to JSON"),
        ProfileFormat::Yaml => {
            serde_yaml::to_string(&profile).context("Failed to serialize profile to YAML")
        }
    }
}

/// Print the built-in profile, or write it to `output` (format taken from the
/// file extension).
pub fn profile_command(format: &str, output: Option<&Path>) -> Result<()> {
    let format = validate_profile_format(format)?;

    match output {
        Some(path) => {
            save_profile(&ExtractionProfile::default(), path)?;
            println!("Wrote default profile to {}", path.display());
        }
        None => {
            let rendered = render_default_profile(format)?;
            println!("{}", rendered.trim_end());
        }
    }

    Ok(())
}
