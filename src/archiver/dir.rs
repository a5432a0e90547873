//! Pass-through backend exposing a real directory tree.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::archiver::{Archive, Archiver, ArchiverInfo, FileStat, FileType};
use crate::error::{Error, Result};
use crate::io::{Io, NativeIo, OpenMode};
use crate::platform;

pub(crate) const DIR_ARCHIVER_INFO: ArchiverInfo = ArchiverInfo {
    extension: "",
    description: "Non-archive, direct filesystem I/O",
    author: "stratafs contributors",
    url: "https://example.invalid/stratafs",
    supports_symlinks: true,
};

/// Driver for mounting plain host directories.
///
/// Unlike real archive formats it never parses a byte stream; the mount
/// path itself is the container.
pub struct DirArchiver;

#[async_trait]
impl Archiver for DirArchiver {
    fn info(&self) -> ArchiverInfo {
        DIR_ARCHIVER_INFO
    }

    async fn open_archive(
        &self,
        io: Option<Box<dyn Io>>,
        name: &str,
        _for_writing: bool,
    ) -> Result<Box<dyn Archive>> {
        debug_assert!(io.is_none(), "directory mounts carry no byte stream");

        let base = PathBuf::from(name);
        let meta = platform::stat(&base, true).await?;
        if meta.file_type != FileType::Directory {
            return Err(Error::Unsupported);
        }
        Ok(Box::new(DirArchive { base }))
    }
}

/// One mounted host directory.
pub struct DirArchive {
    base: PathBuf,
}

impl DirArchive {
    async fn open_native(&self, name: &str, mode: OpenMode) -> Result<Box<dyn Io>> {
        let path = platform::host_path(&self.base, name);
        let io = NativeIo::open(&path, mode).await?;
        Ok(Box::new(io))
    }
}

#[async_trait]
impl Archive for DirArchive {
    async fn enumerate(&self, dir: &str) -> Result<Vec<String>> {
        platform::enumerate(&platform::host_path(&self.base, dir)).await
    }

    async fn open_read(&self, name: &str) -> Result<Box<dyn Io>> {
        self.open_native(name, OpenMode::Read).await
    }

    async fn open_write(&self, name: &str) -> Result<Box<dyn Io>> {
        self.open_native(name, OpenMode::Write).await
    }

    async fn open_append(&self, name: &str) -> Result<Box<dyn Io>> {
        self.open_native(name, OpenMode::Append).await
    }

    async fn remove(&self, name: &str) -> Result<()> {
        platform::delete(&platform::host_path(&self.base, name)).await
    }

    async fn mkdir(&self, name: &str) -> Result<()> {
        platform::mkdir(&platform::host_path(&self.base, name)).await
    }

    async fn stat(&self, name: &str) -> Result<FileStat> {
        platform::stat(&platform::host_path(&self.base, name), false).await
    }
}
