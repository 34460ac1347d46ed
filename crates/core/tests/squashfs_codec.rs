#![cfg(feature = "squashfs-backend")]

use std::fs;
use std::io::Cursor;

use backhand::{FilesystemWriter, NodeHeader};
use carver_core::image::{BackhandCodec, EntryLabel, ImageCodec, SQUASHFS_MAGIC};
use carver_core::materialize::{parse_placeholder, MaterializeOutcome, Materializer};
use carver_core::report::{Level, MemoryReporter, NullReporter};
use tempfile::tempdir;

fn build_squashfs() -> Vec<u8> {
    let header = NodeHeader::default();
    let mut writer = FilesystemWriter::default();
    writer.push_dir("etc", header).expect("push etc");
    writer
        .push_file(Cursor::new(b"V1.0.4\n".to_vec()), "etc/version", header)
        .expect("push version");
    writer.push_dir("bin", header).expect("push bin");
    writer
        .push_file(Cursor::new(vec![0x7f, b'E', b'L', b'F', 2, 1, 1]), "bin/busybox", header)
        .expect("push busybox");
    writer.push_symlink("busybox", "bin/sh", header).expect("push symlink");

    let mut out = Cursor::new(Vec::new());
    writer.write(&mut out).expect("write squashfs");
    out.into_inner()
}

#[test]
fn opens_image_and_lists_entries() {
    let dir = tempdir().unwrap();
    let container = dir.path().join("filesystem.squashfs");
    let bytes = build_squashfs();
    fs::write(&container, &bytes).unwrap();

    let image = BackhandCodec.open(&container).expect("open");
    let sb = image.superblock();
    assert_eq!(sb.magic, SQUASHFS_MAGIC);
    assert!(sb.bytes_used <= bytes.len() as u64);
    assert!(sb.inode_count >= 5);

    let listed: Vec<(String, EntryLabel)> =
        image.entries().map(|e| (e.path.clone(), e.kind.label())).collect();
    assert!(listed.contains(&("/etc/version".to_string(), EntryLabel::File)));
    assert!(listed.contains(&("/bin".to_string(), EntryLabel::Directory)));
    assert!(listed.contains(&("/bin/sh".to_string(), EntryLabel::Symlink)));
}

#[test]
fn materializes_real_image() {
    let dir = tempdir().unwrap();
    let container = dir.path().join("filesystem.squashfs");
    fs::write(&container, build_squashfs()).unwrap();
    let root = dir.path().join("squashfs_contents");
    let reporter = MemoryReporter::new();

    let outcome =
        Materializer::new().materialize_image(&BackhandCodec, &container, &root, &reporter);

    let summary = outcome.summary().expect("container opens");
    assert_eq!(summary.counts.failed, 0);
    assert_eq!(fs::read_to_string(root.join("etc/version")).unwrap(), "V1.0.4\n");
    let busybox = fs::read(root.join("bin/busybox")).unwrap();
    assert_eq!(busybox, vec![0x7f, b'E', b'L', b'F', 2, 1, 1]);

    let sh = root.join("bin/sh");
    if fs::symlink_metadata(&sh).unwrap().file_type().is_symlink() {
        assert_eq!(fs::read_link(&sh).unwrap(), std::path::Path::new("busybox"));
        assert!(outcome.is_complete());
    } else {
        assert_eq!(parse_placeholder(&fs::read(&sh).unwrap()).as_deref(), Some("busybox"));
    }
    assert!(reporter.contains(Level::Info, "0x73717368"));
}

#[test]
fn garbage_is_reported_as_malformed() {
    let dir = tempdir().unwrap();
    let container = dir.path().join("filesystem.squashfs");
    fs::write(&container, b"hsqs but nothing else that makes sense").unwrap();

    let outcome = Materializer::new().materialize_image(
        &BackhandCodec,
        &container,
        &dir.path().join("contents"),
        &NullReporter,
    );

    assert!(matches!(outcome, MaterializeOutcome::ContainerMalformed(_)));
    assert!(container.exists());
}
