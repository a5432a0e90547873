mod common;

use std::sync::Arc;

use common::memfs::{build_archive, MemArchiver, MemIo, MAGIC};
use common::Fixture;
use stratafs::{Error, FileType};

async fn register(fixture: &Fixture) {
    fixture.vfs.register_archiver(Arc::new(MemArchiver)).await.expect("register archiver");
}

#[tokio::test]
async fn a_stream_can_be_mounted_directly() {
    let fixture = Fixture::new().await;
    register(&fixture).await;

    let bytes = build_archive(&[
        ("readme.txt", b"hello from memory"),
        ("data/blob.bin", &[1, 2, 3, 4, 5]),
    ]);
    fixture
        .vfs
        .mount_io(Box::new(MemIo::new(bytes)), "ram0.mem", Some("/pak"), true)
        .await
        .expect("mount stream");

    let mut file = fixture.vfs.open_read("/pak/readme.txt").await.expect("open");
    let mut buf = [0u8; 32];
    let got = file.read_bytes(&mut buf).await.expect("read");
    assert_eq!(&buf[..got], b"hello from memory");

    assert_eq!(
        fixture.vfs.enumerate_files("/pak/data").await.expect("list"),
        ["blob.bin"]
    );

    let stat = fixture.vfs.stat("/pak/data/blob.bin").await.expect("stat");
    assert_eq!(stat.file_type, FileType::Regular);
    assert_eq!(stat.filesize, 5);
    assert_eq!(
        fixture.vfs.stat("/pak/data").await.expect("stat dir").file_type,
        FileType::Directory
    );

    assert_eq!(fixture.vfs.search_path().await, vec!["ram0.mem".to_owned()]);
    drop(file);
    fixture.vfs.unmount("ram0.mem").await.expect("unmount by name");
}

#[tokio::test]
async fn archive_files_are_probed_by_registered_drivers() {
    let fixture = Fixture::new().await;
    register(&fixture).await;

    let bytes = build_archive(&[("nested/file.txt", b"from disk archive")]);
    fixture.write_file("assets.mem", &bytes);
    fixture.write_file("not_an_archive.mem", b"wrong magic entirely");

    let archive_path = fixture.path("assets.mem").to_string_lossy().into_owned();
    fixture.vfs.mount(&archive_path, None, true).await.expect("mount archive by path");

    let mut file = fixture.vfs.open_read("nested/file.txt").await.expect("open");
    let mut buf = [0u8; 32];
    let got = file.read_bytes(&mut buf).await.expect("read");
    assert_eq!(&buf[..got], b"from disk archive");

    // Wrong magic: no driver claims it.
    let bogus_path = fixture.path("not_an_archive.mem").to_string_lossy().into_owned();
    assert_eq!(
        fixture.vfs.mount(&bogus_path, None, true).await.expect_err("unclaimed"),
        Error::Unsupported
    );
}

#[tokio::test]
async fn a_claimed_but_broken_archive_reports_its_own_error() {
    let fixture = Fixture::new().await;
    register(&fixture).await;

    // Valid magic, then a count pointing past the end of the data.
    let mut bytes = MAGIC.to_vec();
    bytes.extend_from_slice(&7u32.to_be_bytes());
    assert_eq!(
        fixture
            .vfs
            .mount_io(Box::new(MemIo::new(bytes)), "broken.mem", None, true)
            .await
            .expect_err("claimed then failed"),
        Error::Corrupt
    );
}

#[tokio::test]
async fn an_open_handle_can_back_a_mount() {
    let fixture = Fixture::new().await;
    register(&fixture).await;

    let bytes = build_archive(&[("inner.txt", b"mounted through a handle")]);
    fixture.write_file("bundle.mem", &bytes);
    fixture.mount_root().await;

    let file = fixture.vfs.open_read("bundle.mem").await.expect("open archive file");
    fixture
        .vfs
        .mount_handle(file, "bundle.mem!", Some("/inner"), true)
        .await
        .expect("mount through handle");

    let mut file = fixture.vfs.open_read("/inner/inner.txt").await.expect("open inner");
    let mut buf = [0u8; 32];
    let got = file.read_bytes(&mut buf).await.expect("read");
    assert_eq!(&buf[..got], b"mounted through a handle");
}

#[tokio::test]
async fn unsupported_streams_fail_without_registered_drivers() {
    let fixture = Fixture::new().await;
    let bytes = build_archive(&[("x", b"y")]);
    assert_eq!(
        fixture
            .vfs
            .mount_io(Box::new(MemIo::new(bytes)), "orphan.mem", None, true)
            .await
            .expect_err("no drivers"),
        Error::Unsupported
    );
}

#[tokio::test]
async fn registration_is_checked() {
    let fixture = Fixture::new().await;
    register(&fixture).await;
    assert_eq!(
        fixture
            .vfs
            .register_archiver(Arc::new(MemArchiver))
            .await
            .expect_err("same extension twice"),
        Error::Duplicate
    );

    let formats = fixture.vfs.supported_archive_types().await;
    assert_eq!(formats.len(), 1);
    assert_eq!(formats[0].extension, "mem");
    assert!(!formats[0].supports_symlinks);
}
