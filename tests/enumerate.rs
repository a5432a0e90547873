mod common;

use common::{scratch_dir, Fixture};
use stratafs::{EnumerateResult, Error};

#[tokio::test]
async fn lists_are_sorted_and_deduplicated() {
    let fixture = Fixture::new().await;
    fixture.write_file("foo", b"");
    fixture.write_file("bar", b"");
    fixture.write_file("baz", b"");
    fixture.mount_root().await;

    assert_eq!(fixture.vfs.enumerate_files("/").await.expect("list"), ["bar", "baz", "foo"]);
}

#[tokio::test]
async fn entries_from_every_mount_merge_without_duplicates() {
    let fixture = Fixture::new().await;
    let other = scratch_dir();
    fixture.write_file("shared.txt", b"a");
    fixture.write_file("only_a.txt", b"");
    std::fs::write(other.path().join("shared.txt"), b"b").expect("write fixture file");
    std::fs::write(other.path().join("only_b.txt"), b"").expect("write fixture file");

    fixture.mount_root().await;
    fixture
        .vfs
        .mount(&other.path().to_string_lossy(), None, true)
        .await
        .expect("mount second dir");

    assert_eq!(
        fixture.vfs.enumerate_files("/").await.expect("list"),
        ["only_a.txt", "only_b.txt", "shared.txt"]
    );
}

#[tokio::test]
async fn mountpoints_appear_as_virtual_directories() {
    let fixture = Fixture::new().await;
    let a = scratch_dir();
    let b = scratch_dir();
    fixture.write_file("top.txt", b"");
    std::fs::write(a.path().join("inside_a.txt"), b"").expect("write fixture file");

    fixture.mount_root().await;
    fixture.vfs.mount(&a.path().to_string_lossy(), Some("/a"), false).await.expect("mount a");
    fixture.vfs.mount(&b.path().to_string_lossy(), Some("/b"), true).await.expect("mount b");

    assert_eq!(
        fixture.vfs.enumerate_files("/").await.expect("list root"),
        ["a", "b", "top.txt"]
    );
    assert_eq!(fixture.vfs.enumerate_files("/a").await.expect("list a"), ["inside_a.txt"]);

    // Deeper mountpoints surface one segment at a time.
    let c = scratch_dir();
    fixture
        .vfs
        .mount(&c.path().to_string_lossy(), Some("/deep/nested/spot"), true)
        .await
        .expect("mount deep");
    assert!(fixture.vfs.enumerate_files("/").await.expect("list").contains(&"deep".to_owned()));
    assert_eq!(fixture.vfs.enumerate_files("/deep").await.expect("list"), ["nested"]);
    assert_eq!(fixture.vfs.enumerate_files("/deep/nested").await.expect("list"), ["spot"]);
}

#[tokio::test]
async fn callback_can_stop_early() {
    let fixture = Fixture::new().await;
    for name in ["one", "two", "three", "four"] {
        fixture.write_file(name, b"");
    }
    fixture.mount_root().await;

    let mut seen = 0;
    fixture
        .vfs
        .enumerate("/", |_dir, _name| {
            seen += 1;
            if seen == 2 {
                EnumerateResult::Stop
            } else {
                EnumerateResult::Continue
            }
        })
        .await
        .expect("stop is still success");
    assert_eq!(seen, 2);
}

#[tokio::test]
async fn callback_errors_surface_as_app_callback() {
    let fixture = Fixture::new().await;
    fixture.write_file("entry", b"");
    fixture.mount_root().await;

    assert_eq!(
        fixture
            .vfs
            .enumerate("/", |_dir, _name| EnumerateResult::Error)
            .await
            .expect_err("callback aborted"),
        Error::AppCallback
    );
}

#[tokio::test]
async fn callbacks_receive_the_requested_directory() {
    let fixture = Fixture::new().await;
    fixture.create_dir("sub");
    fixture.write_file("sub/file.txt", b"");
    fixture.mount_root().await;

    let mut seen = Vec::new();
    fixture
        .vfs
        .enumerate("/sub", |dir, name| {
            seen.push((dir.to_owned(), name.to_owned()));
            EnumerateResult::Continue
        })
        .await
        .expect("enumerate");
    assert_eq!(seen, [("/sub".to_owned(), "file.txt".to_owned())]);
}

#[tokio::test]
async fn missing_directories_enumerate_as_empty() {
    let fixture = Fixture::new().await;
    fixture.mount_root().await;
    assert_eq!(fixture.vfs.enumerate_files("/nowhere").await.expect("empty"), Vec::<String>::new());
}

#[tokio::test]
async fn legacy_callback_collects_everything() {
    let fixture = Fixture::new().await;
    fixture.write_file("x", b"");
    fixture.write_file("y", b"");
    fixture.mount_root().await;

    let mut names = Vec::new();
    fixture.vfs.enumerate_files_callback("/", |_dir, name| names.push(name.to_owned())).await;
    names.sort();
    assert_eq!(names, ["x", "y"]);
}
