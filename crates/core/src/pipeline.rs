//! End-to-end extraction run.
//!
//! Stages run in a fixed order and never roll back each other's output:
//! 1. read the firmware (fatal on failure),
//! 2. locate and save the raw stream (soft failure),
//! 3. slice and save the container,
//! 4. materialize the container (fatal to this stage only),
//! 5. write the run manifest.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::ExtractionProfile;
use crate::image::{ImageCodec, SuperblockInfo};
use crate::layout::OutputLayout;
use crate::materialize::{EntryReport, MaterializeOutcome, Materializer, SummaryCounts};
use crate::report::Reporter;
use crate::segment::{self, LocateError, SegmentLocator, StreamDecoder};

/// Fatal errors that stop a run before any extraction happens.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Firmware file not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("Error reading firmware file {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to create output directory {}: {source}", path.display())]
    OutputRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Outcome of locating and saving the raw stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StreamStage {
    Recovered {
        offset: usize,
        len: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expected_len: Option<u64>,
        path: PathBuf,
        sha256: String,
    },
    NotFound {
        nominal: usize,
        tried: Vec<usize>,
    },
    WriteFailed {
        offset: usize,
        len: usize,
        path: PathBuf,
        reason: String,
    },
}

/// Outcome of slicing and saving the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SegmentStage {
    Saved {
        offset: usize,
        requested_len: usize,
        len: usize,
        truncated: bool,
        path: PathBuf,
        sha256: String,
    },
    WriteFailed {
        path: PathBuf,
        reason: String,
    },
}

/// Firmware file facts recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputInfo {
    pub path: PathBuf,
    pub size: usize,
    pub sha256: String,
}

/// Serializable view of the materialization stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentsRecord {
    /// `complete`, `partial`, `container_malformed` or `not_attempted`.
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superblock: Option<SuperblockInfo>,
    #[serde(default)]
    pub counts: SummaryCounts,
    /// Every entry not reproduced exactly (placeholders, skips, failures).
    #[serde(default)]
    pub issues: Vec<EntryReport>,
}

impl ContentsRecord {
    fn from_outcome(outcome: Option<&MaterializeOutcome>) -> Self {
        let (status, error) = match outcome {
            None => ("not_attempted", None),
            Some(MaterializeOutcome::Complete(_)) => ("complete", None),
            Some(MaterializeOutcome::Partial(_)) => ("partial", None),
            Some(MaterializeOutcome::ContainerMalformed(err)) => {
                ("container_malformed", Some(err.to_string()))
            }
        };
        let summary = outcome.and_then(|o| o.summary());
        Self {
            status: status.to_string(),
            error,
            superblock: summary.and_then(|s| s.superblock.clone()),
            counts: summary.map(|s| s.counts).unwrap_or_default(),
            issues: summary.map(|s| s.issues().cloned().collect()).unwrap_or_default(),
        }
    }
}

/// Persisted record of a run, written to `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunManifest {
    pub tool_version: String,
    pub profile: String,
    pub started_at: String,
    pub finished_at: String,
    pub input: InputInfo,
    pub stream: StreamStage,
    pub segment: SegmentStage,
    pub contents: ContentsRecord,
}

/// Typed per-stage results of a run.
#[derive(Debug)]
pub struct RunReport {
    pub input: InputInfo,
    pub stream: StreamStage,
    pub segment: SegmentStage,
    /// `None` when the container could not be saved and was not opened.
    pub contents: Option<MaterializeOutcome>,
    pub manifest: RunManifest,
    /// Where the manifest was written, if writing it succeeded.
    pub manifest_path: Option<PathBuf>,
}

impl RunReport {
    /// True when every stage fully succeeded.
    pub fn is_clean(&self) -> bool {
        matches!(self.stream, StreamStage::Recovered { .. })
            && matches!(self.segment, SegmentStage::Saved { truncated: false, .. })
            && self.contents.as_ref().is_some_and(|c| c.is_complete())
    }
}

/// Hex-encoded SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Coordinator that runs every stage for one firmware image.
pub struct FirmwareExtractor<'a> {
    pub profile: &'a ExtractionProfile,
    pub layout: &'a OutputLayout,
    pub decoder: &'a dyn StreamDecoder,
    pub codec: &'a dyn ImageCodec,
    pub materializer: Materializer,
    pub reporter: &'a dyn Reporter,
}

impl<'a> FirmwareExtractor<'a> {
    pub fn run(&self, firmware_path: &Path) -> Result<RunReport, InputError> {
        let started_at = Utc::now().to_rfc3339();
        let reporter = self.reporter;

        if !firmware_path.is_file() {
            reporter.error(&format!("Firmware file not found: {}", firmware_path.display()));
            return Err(InputError::Missing(firmware_path.to_path_buf()));
        }

        fs::create_dir_all(&self.layout.root).map_err(|source| InputError::OutputRoot {
            path: self.layout.root.clone(),
            source,
        })?;
        reporter.info(&format!("Created output directory: {}", self.layout.root.display()));

        reporter.info(&format!("Starting extraction of firmware: {}", firmware_path.display()));
        let firmware = match fs::read(firmware_path) {
            Ok(bytes) => bytes,
            Err(source) => {
                reporter.error(&format!("Error reading firmware file: {source}"));
                return Err(InputError::Unreadable { path: firmware_path.to_path_buf(), source });
            }
        };
        reporter.success(&format!("Successfully read firmware: {} bytes", firmware.len()));

        let input = InputInfo {
            path: firmware_path.to_path_buf(),
            size: firmware.len(),
            sha256: sha256_hex(&firmware),
        };

        let stream = self.recover_stream(&firmware);
        let segment = self.save_container(&firmware);
        drop(firmware);

        let contents = match &segment {
            SegmentStage::Saved { .. } => Some(self.materializer.materialize_image(
                self.codec,
                &self.layout.container_path,
                &self.layout.contents_dir,
                reporter,
            )),
            SegmentStage::WriteFailed { .. } => {
                reporter.error("Container was not saved, skipping contents extraction");
                None
            }
        };

        let manifest = RunManifest {
            tool_version: crate::version().to_string(),
            profile: self.profile.name.clone(),
            started_at,
            finished_at: Utc::now().to_rfc3339(),
            input: input.clone(),
            stream: stream.clone(),
            segment: segment.clone(),
            contents: ContentsRecord::from_outcome(contents.as_ref()),
        };
        let manifest_path = self.write_manifest(&manifest);

        reporter.success("Extraction process completed");
        Ok(RunReport { input, stream, segment, contents, manifest, manifest_path })
    }

    fn recover_stream(&self, firmware: &[u8]) -> StreamStage {
        let params = &self.profile.stream;
        let expected = params
            .expected_size
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        self.reporter.info(&format!(
            "Attempting to extract LZMA section: Offset: {}, Dictionary size: {}, \
             Expected uncompressed size: {expected}",
            params.nominal_offset, params.dict_size
        ));

        let locator = SegmentLocator::new(params.probes.clone(), self.decoder);
        let recovered = match locator.locate(firmware, params.nominal_offset, self.reporter) {
            Ok(recovered) => recovered,
            Err(LocateError::NotFound { nominal, tried }) => {
                self.reporter
                    .error("LZMA extraction failed, continuing with SquashFS extraction");
                return StreamStage::NotFound { nominal, tried };
            }
        };

        if let Some(hint) = params.expected_size {
            if hint != recovered.len() as u64 {
                self.reporter.info(&format!(
                    "Decoded size {} differs from expected {hint} (hint only)",
                    recovered.len()
                ));
            }
        }

        let path = self.layout.stream_path.clone();
        match fs::write(&path, &recovered.data) {
            Ok(()) => {
                self.reporter.success(&format!("LZMA section saved: {}", path.display()));
                StreamStage::Recovered {
                    offset: recovered.offset,
                    len: recovered.len(),
                    expected_len: params.expected_size,
                    sha256: sha256_hex(&recovered.data),
                    path,
                }
            }
            Err(err) => {
                self.reporter.error(&format!("Failed to save LZMA section: {err}"));
                StreamStage::WriteFailed {
                    offset: recovered.offset,
                    len: recovered.len(),
                    path,
                    reason: err.to_string(),
                }
            }
        }
    }

    fn save_container(&self, firmware: &[u8]) -> SegmentStage {
        let params = self.profile.container;
        self.reporter.info(&format!(
            "Extracting SquashFS section: Offset: {}, Size: {}",
            params.offset, params.length
        ));

        let segment = segment::extract(firmware, params.offset, params.length);
        if segment.is_truncated() {
            self.reporter.error(&format!(
                "SquashFS section is truncated: wanted {} bytes, firmware only has {}",
                segment.requested_len,
                segment.len()
            ));
        }

        let path = self.layout.container_path.clone();
        match fs::write(&path, &segment.data) {
            Ok(()) => {
                self.reporter.success(&format!("SquashFS filesystem saved: {}", path.display()));
                SegmentStage::Saved {
                    offset: segment.offset,
                    requested_len: segment.requested_len,
                    len: segment.len(),
                    truncated: segment.is_truncated(),
                    sha256: sha256_hex(&segment.data),
                    path,
                }
            }
            Err(err) => {
                self.reporter.error(&format!("Failed to save SquashFS section: {err}"));
                SegmentStage::WriteFailed { path, reason: err.to_string() }
            }
        }
    }

    fn write_manifest(&self, manifest: &RunManifest) -> Option<PathBuf> {
        let path = &self.layout.manifest_path;
        let written = serde_json::to_string_pretty(manifest)
            .map_err(|e| e.to_string())
            .and_then(|json| fs::write(path, json).map_err(|e| e.to_string()));
        match written {
            Ok(()) => {
                self.reporter.info(&format!("Manifest written: {}", path.display()));
                Some(path.clone())
            }
            Err(err) => {
                self.reporter.error(&format!("Failed to write manifest: {err}"));
                None
            }
        }
    }
}
