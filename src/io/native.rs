//! [`Io`] over a real file on the host filesystem.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};

use crate::error::{Error, Result};
use crate::io::Io;

/// How a [`NativeIo`] was opened.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum OpenMode {
    Read,
    Write,
    Append,
}

/// Byte stream backed by a host file.
///
/// Keeps the path and mode around so [`Io::duplicate`] can reopen the
/// same file with an independent cursor.
pub(crate) struct NativeIo {
    file: File,
    path: PathBuf,
    mode: OpenMode,
}

impl NativeIo {
    /// Opens `path` according to `mode`.
    ///
    /// Write mode truncates or creates; append mode creates and forces
    /// writes to the end of the file.
    pub(crate) async fn open(path: &Path, mode: OpenMode) -> Result<Self> {
        let mut options = OpenOptions::new();
        match mode {
            OpenMode::Read => options.read(true),
            OpenMode::Write => options.write(true).create(true).truncate(true),
            OpenMode::Append => options.append(true).create(true),
        };
        let file = options.open(path).await.map_err(|err| Error::from_io(&err))?;
        Ok(Self { file, path: path.to_path_buf(), mode })
    }

    /// Settles the runtime's internal write buffer so the OS-level cursor
    /// and metadata are exact.
    async fn settle(&mut self) -> Result<()> {
        if self.mode != OpenMode::Read {
            self.file.flush().await.map_err(|err| Error::from_io(&err))?;
        }
        Ok(())
    }
}

#[async_trait]
impl Io for NativeIo {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.file.read(buf).await.map_err(|err| Error::from_io(&err))
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.file.write(data).await.map_err(|err| Error::from_io(&err))
    }

    async fn seek(&mut self, offset: u64) -> Result<()> {
        self.settle().await?;
        self.file
            .seek(SeekFrom::Start(offset))
            .await
            .map(|_| ())
            .map_err(|err| Error::from_io(&err))
    }

    async fn tell(&mut self) -> Result<u64> {
        self.settle().await?;
        self.file.stream_position().await.map_err(|err| Error::from_io(&err))
    }

    async fn length(&mut self) -> Result<u64> {
        self.settle().await?;
        let meta = self.file.metadata().await.map_err(|err| Error::from_io(&err))?;
        Ok(meta.len())
    }

    async fn duplicate(&mut self) -> Result<Box<dyn Io>> {
        let dupe = NativeIo::open(&self.path, self.mode).await?;
        Ok(Box::new(dupe))
    }

    async fn flush(&mut self) -> Result<()> {
        if self.mode == OpenMode::Read {
            return Ok(());
        }
        self.file.flush().await.map_err(|err| Error::from_io(&err))?;
        self.file.sync_data().await.map_err(|err| Error::from_io(&err))
    }
}
