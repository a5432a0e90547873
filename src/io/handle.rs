//! [`Io`] over an already-open [`File`] from the same instance.
//!
//! This is what lets an archive that lives *inside* a mount be mounted
//! itself: the outer file handle becomes the byte stream the inner
//! archiver parses.

use async_trait::async_trait;

use crate::error::Result;
use crate::io::Io;
use crate::vfs::File;

/// Byte stream delegating to an owned virtual file handle.
///
/// All operations go through the file's buffered paths, so a buffer set
/// on the handle before mounting keeps working underneath the archiver.
pub(crate) struct HandleIo {
    file: File,
}

impl HandleIo {
    pub(crate) fn new(file: File) -> Self {
        Self { file }
    }
}

#[async_trait]
impl Io for HandleIo {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.file.read_bytes(buf).await
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.file.write_bytes(data).await
    }

    async fn seek(&mut self, offset: u64) -> Result<()> {
        self.file.seek(offset).await
    }

    async fn tell(&mut self) -> Result<u64> {
        self.file.tell().await
    }

    async fn length(&mut self) -> Result<u64> {
        self.file.length().await
    }

    async fn duplicate(&mut self) -> Result<Box<dyn Io>> {
        let dupe = self.file.duplicate().await?;
        Ok(Box::new(HandleIo::new(dupe)))
    }

    async fn flush(&mut self) -> Result<()> {
        self.file.flush().await
    }
}
