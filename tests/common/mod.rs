#![allow(dead_code)]

pub mod memfs;

use std::path::PathBuf;

use stratafs::Vfs;
use tempfile::TempDir;

/// One instance over one scratch directory.
pub struct Fixture {
    pub tempdir: TempDir,
    pub vfs: Vfs,
}

impl Fixture {
    pub async fn new() -> Self {
        let tempdir = TempDir::new().expect("create temp dir");
        let vfs = Vfs::new(None).await.expect("create instance");
        Self { tempdir, vfs }
    }

    /// Host path of the scratch directory itself.
    pub fn root(&self) -> String {
        self.tempdir.path().to_string_lossy().into_owned()
    }

    /// Host path of `name` inside the scratch directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.tempdir.path().join(name)
    }

    pub fn write_file(&self, name: &str, data: &[u8]) {
        std::fs::write(self.path(name), data).expect("write fixture file");
    }

    pub fn create_dir(&self, name: &str) {
        std::fs::create_dir_all(self.path(name)).expect("create fixture dir");
    }

    /// Mounts the scratch directory at the virtual root, tail position.
    pub async fn mount_root(&self) {
        self.vfs.mount(&self.root(), None, true).await.expect("mount scratch dir");
    }

    /// Points the write directory at the scratch directory.
    pub async fn use_write_dir(&self) {
        self.vfs.set_write_dir(Some(&self.root())).await.expect("set write dir");
    }
}

/// A second scratch directory for multi-mount tests.
pub fn scratch_dir() -> TempDir {
    TempDir::new().expect("create temp dir")
}
