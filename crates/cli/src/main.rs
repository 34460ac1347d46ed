use std::path::PathBuf;

use anyhow::Result;
use carver_core::layout::DEFAULT_OUTPUT_DIR;
use clap::{Parser, Subcommand};
use fw_carver::commands::{
    extract_command, locate_command, profile_command, superblock_command, ContainerOverrides,
    ExtractOptions, StreamOverrides,
};

/// Firmware payload carver.
///
/// This CLI is a thin wrapper around `carver-core` (exposed in code as
/// `carver_core`). All substantive logic lives in the library so it can be
/// tested thoroughly and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "fw-carver",
    version,
    about = "Recover the LZMA kernel and SquashFS root filesystem from a firmware image",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full extraction pipeline on a firmware image.
    ///
    /// This will:
    /// - Search for the raw LZMA stream near its nominal offset and save it.
    /// - Slice out the SquashFS container at its exact bounds and save it.
    /// - Reproduce the container's tree under `squashfs_contents/`.
    /// - Write `manifest.json` describing every stage.
    Extract {
        /// Firmware image to extract from.
        firmware: PathBuf,

        /// Output directory.
        #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
        out: PathBuf,

        /// Extraction profile (JSON, or YAML for `.yaml`/`.yml`). Defaults to the built-in one.
        #[arg(long)]
        profile: Option<PathBuf>,

        #[command(flatten)]
        stream: StreamOverrides,

        #[command(flatten)]
        container: ContainerOverrides,

        /// Write symlinks as `Symlink to: <target>` placeholder files.
        #[arg(long, default_value_t = false)]
        no_symlinks: bool,

        /// Suppress progress lines.
        #[arg(long, default_value_t = false)]
        quiet: bool,

        /// Emit the run manifest as JSON (implies --quiet).
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print the superblock of a stored SquashFS container.
    Superblock {
        /// Container file, e.g. `extracted_firmware/filesystem.squashfs`.
        image: PathBuf,

        /// Emit JSON instead of the text table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print the built-in extraction profile so it can be edited and reused.
    Profile {
        /// Output format: json or yaml.
        #[arg(long, default_value = "json")]
        format: String,

        /// Write to this file instead of stdout (format taken from the extension).
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Search for the raw LZMA stream only and report where it decodes.
    Locate {
        /// Firmware image to search.
        firmware: PathBuf,

        /// Extraction profile to take the stream parameters from.
        #[arg(long)]
        profile: Option<PathBuf>,

        #[command(flatten)]
        stream: StreamOverrides,

        /// Suppress per-offset progress lines.
        #[arg(long, default_value_t = false)]
        quiet: bool,

        /// Emit JSON instead of human-readable text (implies --quiet).
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Extract {
            firmware,
            out,
            profile,
            stream,
            container,
            no_symlinks,
            quiet,
            json,
        } => {
            let options = ExtractOptions {
                firmware,
                out,
                profile,
                stream,
                container,
                no_symlinks,
                quiet,
                json,
            };
            extract_command(&options)?;
        }
        Command::Superblock { image, json } => {
            superblock_command(&image, json)?;
        }
        Command::Profile { format, output } => profile_command(&format, output.as_deref())?,
        Command::Locate { firmware, profile, stream, quiet, json } => {
            locate_command(&firmware, profile.as_deref(), &stream, quiet, json)?;
        }
    }

    Ok(())
}
