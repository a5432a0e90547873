//! Defines the archive backend interface --- [`Archiver`] and [`Archive`].
//!
//! An [`Archiver`] is a format driver: it recognizes containers of one
//! format and opens them. An [`Archive`] is one opened container,
//! resolving archive-relative paths handed down by the mount stack.

pub mod dir;

use async_trait::async_trait;

use crate::error::Result;
use crate::io::Io;

/// Static description of an archive format.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ArchiverInfo {
    /// File extension the format usually carries, lowercased, no dot.
    pub extension: &'static str,
    /// Human readable format name.
    pub description: &'static str,
    /// Maintainer of the driver.
    pub author: &'static str,
    /// Where to read more about the driver.
    pub url: &'static str,
    /// True if the format can represent symbolic links.
    pub supports_symlinks: bool,
}

/// Kind of an entry inside a mount.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FileType {
    Regular,
    Directory,
    Symlink,
    /// Sockets, device nodes and anything else without a portable kind.
    Other,
}

/// Metadata for one entry, as far as the backend can tell.
///
/// Sizes and timestamps the backend does not track are `-1`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FileStat {
    /// Size in bytes.
    pub filesize: i64,
    /// Last modification time, seconds since the Unix epoch.
    pub modtime: i64,
    /// Creation time, seconds since the Unix epoch.
    pub createtime: i64,
    /// Last access time, seconds since the Unix epoch.
    pub accesstime: i64,
    pub file_type: FileType,
    /// True if the entry cannot be written through this mount.
    pub readonly: bool,
}

impl FileStat {
    /// A stat record with every field unknown.
    pub fn unknown() -> Self {
        Self {
            filesize: -1,
            modtime: -1,
            createtime: -1,
            accesstime: -1,
            file_type: FileType::Other,
            readonly: true,
        }
    }
}

/// A format driver that can probe and open containers.
#[async_trait]
pub trait Archiver: Send + Sync {
    /// Describes the format this driver handles.
    fn info(&self) -> ArchiverInfo;

    /// Probes `io` and opens it as an archive.
    ///
    /// Each probe receives an independent stream positioned at offset
    /// 0. Returning [`crate::Error::Unsupported`] means "not my
    /// format, keep probing"; any other error claims the container and
    /// aborts the probe loop with that error. The directory driver is
    /// special and receives no `io` at all --- it works from `name`
    /// alone.
    async fn open_archive(
        &self,
        io: Option<Box<dyn Io>>,
        name: &str,
        for_writing: bool,
    ) -> Result<Box<dyn Archive>>;
}

/// One opened container.
///
/// Paths are archive-relative, in canonical slash form, already past
/// sanitization and mountpoint checks. Read-only formats fail the
/// write-side operations with [`crate::Error::ReadOnly`]. Resources are
/// released on drop.
#[async_trait]
pub trait Archive: Send + Sync {
    /// Basenames of the direct children of directory `dir`.
    async fn enumerate(&self, dir: &str) -> Result<Vec<String>>;

    /// Opens `name` for reading from the start.
    async fn open_read(&self, name: &str) -> Result<Box<dyn Io>>;

    /// Creates or truncates `name` for writing.
    async fn open_write(&self, name: &str) -> Result<Box<dyn Io>>;

    /// Opens `name` for writing at the end, creating it if missing.
    async fn open_append(&self, name: &str) -> Result<Box<dyn Io>>;

    /// Removes a file or empty directory.
    async fn remove(&self, name: &str) -> Result<()>;

    /// Creates one directory level.
    async fn mkdir(&self, name: &str) -> Result<()>;

    /// Stats `name` without following a final symlink.
    async fn stat(&self, name: &str) -> Result<FileStat>;
}
