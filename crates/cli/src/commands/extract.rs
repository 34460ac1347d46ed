use std::path::PathBuf;

use anyhow::{Context, Result};

use carver_core::layout::OutputLayout;
use carver_core::materialize::{MaterializeOutcome, Materializer, SymlinkReconciler};
use carver_core::pipeline::{FirmwareExtractor, RunReport, SegmentStage, StreamStage};

use crate::commands::util::{default_codec, resolve_profile, ContainerOverrides, StreamOverrides};
use crate::{canonicalize_or_current, reporter_for};

/// Everything the `extract` command needs.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub firmware: PathBuf,
    pub out: PathBuf,
    pub profile: Option<PathBuf>,
    pub stream: StreamOverrides,
    pub container: ContainerOverrides,
    /// Write every symlink as a placeholder file.
    pub no_symlinks: bool,
    pub quiet: bool,
    /// Print the run manifest as JSON instead of progress lines.
    pub json: bool,
}

/// Run the full extraction pipeline.
///
/// Soft stage failures are reported in the output and the manifest; only a
/// missing or unreadable input (or an invalid profile) is an error here.
pub fn extract_command(options: &ExtractOptions) -> Result<RunReport> {
    let profile =
        resolve_profile(options.profile.as_deref(), &options.stream, &options.container)?;
    let root = canonicalize_or_current(&options.out)?;
    let layout = OutputLayout::new(&root);

    let decoder = profile.stream.decoder();
    let codec = default_codec();
    let reporter = reporter_for(options.quiet || options.json);
    let materializer = if options.no_symlinks {
        Materializer::with_reconciler(SymlinkReconciler::placeholders_only())
    } else {
        Materializer::new()
    };

    let extractor = FirmwareExtractor {
        profile: &profile,
        layout: &layout,
        decoder: &decoder,
        codec: codec.as_ref(),
        materializer,
        reporter: reporter.as_ref(),
    };
    let report = extractor
        .run(&options.firmware)
        .with_context(|| format!("Extraction of {} aborted", options.firmware.display()))?;

    if options.json {
        let serialized = serde_json::to_string_pretty(&report.manifest)
            .context("Failed to serialize run manifest to JSON")?;
        println!("{}", serialized);
    } else if !options.quiet {
        print_summary(&layout, &report);
    }

    Ok(report)
}

fn print_summary(layout: &OutputLayout, report: &RunReport) {
    println!();
    println!("Extraction summary");
    println!("==================");
    println!("Profile: {}", report.manifest.profile);
    println!("Output: {}", layout.root.display());

    match &report.stream {
        StreamStage::Recovered { offset, len, path, .. } => println!(
            "- LZMA stream: OK ({len} bytes from offset {offset}) -> {}",
            layout.relative_display(path)
        ),
        StreamStage::NotFound { nominal, tried } => {
            println!("- LZMA stream: NOT FOUND near {nominal} (tried {tried:?})")
        }
        StreamStage::WriteFailed { reason, .. } => println!("- LZMA stream: NOT SAVED ({reason})"),
    }

    match &report.segment {
        SegmentStage::Saved { len, truncated, path, .. } => println!(
            "- SquashFS segment: {} ({len} bytes) -> {}",
            if *truncated { "TRUNCATED" } else { "OK" },
            layout.relative_display(path)
        ),
        SegmentStage::WriteFailed { reason, .. } => {
            println!("- SquashFS segment: NOT SAVED ({reason})")
        }
    }

    match &report.contents {
        Some(MaterializeOutcome::Complete(summary)) => {
            println!("- Contents: OK ({} entries)", summary.counts.entries)
        }
        Some(MaterializeOutcome::Partial(summary)) => {
            let c = summary.counts;
            println!(
                "- Contents: PARTIAL ({} entries, {} placeholders, {} skipped, {} failed)",
                c.entries, c.placeholders, c.skipped, c.failed
            )
        }
        Some(MaterializeOutcome::ContainerMalformed(err)) => println!("- Contents: FAILED ({err})"),
        None => println!("- Contents: NOT ATTEMPTED"),
    }

    if let Some(path) = &report.manifest_path {
        println!("Manifest: {}", path.display());
    }
}
