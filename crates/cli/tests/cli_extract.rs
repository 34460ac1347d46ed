use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use backhand::{FilesystemWriter, NodeHeader};
use carver_core::config::{save_profile, ContainerParams, ExtractionProfile};
use carver_core::pipeline::RunManifest;
use predicates::prelude::*;
use tempfile::tempdir;

const STREAM_OFFSET: usize = 256;
const CONTAINER_OFFSET: usize = 16_384;

fn kernel_payload() -> Vec<u8> {
    b"Linux version 2.6.36 (builder@host) #1 PREEMPT Tue Jan 1 00:00:00 UTC\n".repeat(50)
}

fn raw_lzma(payload: &[u8]) -> Vec<u8> {
    let mut input = payload;
    let mut out = Vec::new();
    lzma_rs::lzma_compress(&mut input, &mut out).expect("compress");
    out.split_off(13)
}

fn squashfs_image() -> Vec<u8> {
    let header = NodeHeader::default();
    let mut writer = FilesystemWriter::default();
    writer.push_dir("etc", header).expect("push etc");
    writer
        .push_file(Cursor::new(b"V1.0.4\n".to_vec()), "etc/version", header)
        .expect("push version");
    writer.push_dir("bin", header).expect("push bin");
    writer
        .push_file(Cursor::new(b"\x7fELF busybox".to_vec()), "bin/busybox", header)
        .expect("push busybox");
    writer.push_symlink("busybox", "bin/sh", header).expect("push symlink");

    let mut out = Cursor::new(Vec::new());
    writer.write(&mut out).expect("write squashfs");
    out.into_inner()
}

/// Write a firmware image and a matching profile into `dir`.
fn write_fixture(dir: &Path) -> (PathBuf, PathBuf) {
    let squashfs = squashfs_image();

    let mut firmware = vec![0x11u8; STREAM_OFFSET];
    firmware.extend_from_slice(&raw_lzma(&kernel_payload()));
    assert!(firmware.len() < CONTAINER_OFFSET, "fixture stream too large");
    firmware.resize(CONTAINER_OFFSET, 0xFF);
    firmware.extend_from_slice(&squashfs);
    firmware.extend_from_slice(&[0xEE; 512]);

    let mut profile = ExtractionProfile::default();
    profile.name = "fixture".to_string();
    profile.stream.nominal_offset = STREAM_OFFSET;
    profile.stream.dict_size = 1 << 20;
    profile.stream.expected_size = Some(kernel_payload().len() as u64);
    profile.container = ContainerParams { offset: CONTAINER_OFFSET, length: squashfs.len() };

    let firmware_path = dir.join("firmware.bin");
    fs::write(&firmware_path, &firmware).expect("write firmware");
    let profile_path = dir.join("profile.json");
    save_profile(&profile, &profile_path).expect("write profile");
    (firmware_path, profile_path)
}

#[test]
fn extract_writes_all_outputs() {
    let dir = tempdir().expect("tempdir");
    let (firmware, profile) = write_fixture(dir.path());
    let out = dir.path().join("extracted_firmware");

    assert_cmd::cargo::cargo_bin_cmd!("fw-carver")
        .arg("extract")
        .arg(&firmware)
        .arg("--out")
        .arg(&out)
        .arg("--profile")
        .arg(&profile)
        .assert()
        .success()
        .stdout(predicate::str::contains("[+] Successfully read firmware"))
        .stdout(predicate::str::contains("Trying offset: 256"))
        .stdout(predicate::str::contains("Superblock Information:"))
        .stdout(predicate::str::contains("Extraction summary"));

    assert_eq!(fs::read(out.join("extracted_lzma.bin")).expect("stream"), kernel_payload());
    assert!(out.join("filesystem.squashfs").is_file());
    assert_eq!(
        fs::read_to_string(out.join("squashfs_contents/etc/version")).expect("version"),
        "V1.0.4\n"
    );
    assert!(fs::symlink_metadata(out.join("squashfs_contents/bin/sh")).is_ok());

    let manifest: RunManifest =
        serde_json::from_str(&fs::read_to_string(out.join("manifest.json")).expect("manifest"))
            .expect("parse manifest");
    assert_eq!(manifest.profile, "fixture");
    assert_ne!(manifest.contents.status, "container_malformed");
    assert_eq!(manifest.contents.counts.failed, 0);
}

#[test]
fn extract_json_prints_manifest_only() {
    let dir = tempdir().expect("tempdir");
    let (firmware, profile) = write_fixture(dir.path());
    let out = dir.path().join("out");

    let output = assert_cmd::cargo::cargo_bin_cmd!("fw-carver")
        .arg("extract")
        .arg(&firmware)
        .arg("--out")
        .arg(&out)
        .arg("--profile")
        .arg(&profile)
        .arg("--no-symlinks")
        .arg("--json")
        .output()
        .expect("run fw-carver");
    assert!(output.status.success());

    let manifest: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is only the manifest");
    assert_eq!(manifest["stream"]["result"], "recovered");
    assert_eq!(manifest["stream"]["offset"], STREAM_OFFSET);
    assert_eq!(manifest["segment"]["truncated"], false);
    assert_eq!(manifest["contents"]["status"], "partial");
    let issues = manifest["contents"]["issues"].as_array().expect("issues");
    let sh = issues.iter().find(|i| i["path"] == "/bin/sh").expect("/bin/sh listed");
    assert_eq!(sh["status"], "placeholder");
    assert_eq!(sh["target"], "busybox");

    assert_eq!(
        fs::read_to_string(out.join("squashfs_contents/bin/sh")).expect("placeholder"),
        "Symlink to: busybox"
    );
}

#[test]
fn extract_overrides_take_precedence_over_profile() {
    let dir = tempdir().expect("tempdir");
    let (firmware, profile) = write_fixture(dir.path());
    let out = dir.path().join("out");

    // Point the stream search somewhere with no stream and shrink the container.
    assert_cmd::cargo::cargo_bin_cmd!("fw-carver")
        .arg("extract")
        .arg(&firmware)
        .arg("--out")
        .arg(&out)
        .arg("--profile")
        .arg(&profile)
        .arg("--lzma-offset")
        .arg("40")
        .arg("--fs-length")
        .arg("64")
        .assert()
        .success()
        .stdout(predicate::str::contains("[!] Could not find valid lzma-raw data around offset 40"))
        .stdout(predicate::str::contains("LZMA extraction failed"));

    assert!(!out.join("extracted_lzma.bin").exists());
    assert_eq!(fs::metadata(out.join("filesystem.squashfs")).expect("container").len(), 64);
    let manifest: RunManifest =
        serde_json::from_str(&fs::read_to_string(out.join("manifest.json")).expect("manifest"))
            .expect("parse manifest");
    assert_eq!(manifest.contents.status, "container_malformed");
}

#[test]
fn extract_fails_without_creating_output_for_missing_input() {
    let dir = tempdir().expect("tempdir");
    let out = dir.path().join("out");

    assert_cmd::cargo::cargo_bin_cmd!("fw-carver")
        .arg("extract")
        .arg(dir.path().join("missing.bin"))
        .arg("--out")
        .arg(&out)
        .assert()
        .failure()
        .stdout(predicate::str::contains("[!] Firmware file not found"))
        .stderr(predicate::str::contains("aborted"));

    assert!(!out.exists());
}

#[test]
fn extract_rejects_invalid_profile() {
    let dir = tempdir().expect("tempdir");
    let (firmware, _) = write_fixture(dir.path());
    let out = dir.path().join("out");

    assert_cmd::cargo::cargo_bin_cmd!("fw-carver")
        .arg("extract")
        .arg(&firmware)
        .arg("--out")
        .arg(&out)
        .arg("--dict-size")
        .arg("0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Dictionary size must be non-zero"));

    assert!(!out.exists());
}

#[test]
fn locate_reports_winning_offset() {
    let dir = tempdir().expect("tempdir");
    let (firmware, profile) = write_fixture(dir.path());

    assert_cmd::cargo::cargo_bin_cmd!("fw-carver")
        .arg("locate")
        .arg(&firmware)
        .arg("--profile")
        .arg(&profile)
        .arg("--lzma-offset")
        .arg((STREAM_OFFSET + 13).to_string())
        .arg("--quiet")
        .assert()
        .success()
        .stdout(predicate::str::contains("Stream found at offset 256 (-13 from nominal 269)"));
}

#[test]
fn locate_fails_when_nothing_decodes() {
    let dir = tempdir().expect("tempdir");
    let firmware = dir.path().join("blank.bin");
    fs::write(&firmware, vec![0xFFu8; 4096]).expect("write blank");

    assert_cmd::cargo::cargo_bin_cmd!("fw-carver")
        .arg("locate")
        .arg(&firmware)
        .arg("--lzma-offset")
        .arg("100")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Trying offset: 113"))
        .stderr(predicate::str::contains("No stream found"));
}
