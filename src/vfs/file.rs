//! Open file handles with optional user-sized buffering --- [`File`].

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::io::Io;
use crate::vfs::{DirHandle, ErrorState};

/// Largest byte count a single read or write accepts.
const MAX_IO_LENGTH: u64 = 0x7FFF_FFFF_FFFF_FFFF;

struct Buffer {
    data: Box<[u8]>,
    /// Bytes `[pos, fill)` are valid for reads; `[0, fill)` are pending
    /// for writes.
    fill: usize,
    pos: usize,
}

/// An open file inside the virtual tree.
///
/// Handles are single-owner: operations take `&mut self`, so a handle
/// is never raced with itself while distinct handles stay independent.
/// Read handles keep the underlying stream ahead of the logical
/// position by the unread portion of the buffer; write handles keep it
/// behind by the pending portion.
pub struct File {
    io: Box<dyn Io>,
    for_reading: bool,
    dir: Arc<DirHandle>,
    errors: Arc<ErrorState>,
    buffer: Option<Buffer>,
}

impl File {
    pub(crate) fn new(
        io: Box<dyn Io>,
        for_reading: bool,
        dir: Arc<DirHandle>,
        errors: Arc<ErrorState>,
    ) -> Self {
        Self { io, for_reading, dir, errors, buffer: None }
    }

    /// An independent handle on the same file: same direction and
    /// mount, fresh cursor, no buffer.
    pub(crate) async fn duplicate(&mut self) -> Result<File> {
        let io = self.io.duplicate().await?;
        Ok(File {
            io,
            for_reading: self.for_reading,
            dir: Arc::clone(&self.dir),
            errors: Arc::clone(&self.errors),
            buffer: None,
        })
    }

    /// Reads up to `out.len()` bytes into `out`.
    ///
    /// Returns how many bytes arrived; `Ok(0)` means end of file. Short
    /// counts are possible with or without a buffer.
    pub async fn read_bytes(&mut self, out: &mut [u8]) -> Result<usize> {
        let result = self.do_read_bytes(out).await;
        self.errors.track(result)
    }

    async fn do_read_bytes(&mut self, out: &mut [u8]) -> Result<usize> {
        if !self.for_reading {
            return Err(Error::OpenForWriting);
        }
        if out.len() as u64 > MAX_IO_LENGTH {
            return Err(Error::InvalidArgument);
        }
        if out.is_empty() {
            return Ok(0);
        }

        let Some(buffer) = &mut self.buffer else {
            return self.io.read(out).await;
        };

        let mut copied = 0;
        while copied < out.len() {
            let available = buffer.fill - buffer.pos;
            if available > 0 {
                let take = available.min(out.len() - copied);
                out[copied..copied + take]
                    .copy_from_slice(&buffer.data[buffer.pos..buffer.pos + take]);
                buffer.pos += take;
                copied += take;
            } else {
                buffer.pos = 0;
                match self.io.read(&mut buffer.data).await {
                    Ok(0) => {
                        buffer.fill = 0;
                        break;
                    }
                    Ok(refilled) => buffer.fill = refilled,
                    Err(err) => {
                        buffer.fill = 0;
                        if copied == 0 {
                            return Err(err);
                        }
                        break; // report what we already copied.
                    }
                }
            }
        }
        Ok(copied)
    }

    /// Reads whole objects of `obj_size` bytes, returning how many
    /// complete objects arrived. `out` must hold `obj_size * obj_count`
    /// bytes.
    pub async fn read(
        &mut self,
        out: &mut [u8],
        obj_size: u32,
        obj_count: u32,
    ) -> Result<u32> {
        let len = u64::from(obj_size) * u64::from(obj_count);
        if len > out.len() as u64 {
            return self.errors.track(Err(Error::InvalidArgument));
        }
        let got = self.read_bytes(&mut out[..len as usize]).await?;
        if obj_size == 0 {
            return Ok(0);
        }
        Ok((got as u64 / u64::from(obj_size)) as u32)
    }

    /// Writes up to `data.len()` bytes, returning how many were taken.
    pub async fn write_bytes(&mut self, data: &[u8]) -> Result<usize> {
        let result = self.do_write_bytes(data).await;
        self.errors.track(result)
    }

    async fn do_write_bytes(&mut self, data: &[u8]) -> Result<usize> {
        if self.for_reading {
            return Err(Error::OpenForReading);
        }
        if data.len() as u64 > MAX_IO_LENGTH {
            return Err(Error::InvalidArgument);
        }
        if data.is_empty() {
            return Ok(0);
        }

        match &mut self.buffer {
            None => return self.io.write(data).await,
            Some(buffer) => {
                if buffer.fill + data.len() < buffer.data.len() {
                    buffer.data[buffer.fill..buffer.fill + data.len()].copy_from_slice(data);
                    buffer.fill += data.len();
                    return Ok(data.len());
                }
            }
        }

        // Too big for the buffer: drain it, then write straight through.
        self.do_flush().await?;
        self.io.write(data).await
    }

    /// Writes whole objects of `obj_size` bytes from `data`, returning
    /// how many complete objects were taken.
    pub async fn write(
        &mut self,
        data: &[u8],
        obj_size: u32,
        obj_count: u32,
    ) -> Result<u32> {
        let len = u64::from(obj_size) * u64::from(obj_count);
        if len > data.len() as u64 {
            return self.errors.track(Err(Error::InvalidArgument));
        }
        let took = self.write_bytes(&data[..len as usize]).await?;
        if obj_size == 0 {
            return Ok(0);
        }
        Ok((took as u64 / u64::from(obj_size)) as u32)
    }

    /// Moves the logical position to `target` bytes from the start.
    ///
    /// A buffered read handle seeking within its buffered range only
    /// adjusts the buffer cursor and leaves the underlying stream
    /// untouched.
    pub async fn seek(&mut self, target: u64) -> Result<()> {
        let result = self.do_seek(target).await;
        self.errors.track(result)
    }

    async fn do_seek(&mut self, target: u64) -> Result<()> {
        self.do_flush().await?;

        if self.for_reading {
            if let Some(buffer) = &mut self.buffer {
                let io_pos = self.io.tell().await?;
                let logical = io_pos - buffer.fill as u64 + buffer.pos as u64;
                if target >= logical {
                    let ahead = target - logical;
                    if ahead <= (buffer.fill - buffer.pos) as u64 {
                        buffer.pos += ahead as usize;
                        return Ok(());
                    }
                } else {
                    let back = logical - target;
                    if back <= buffer.pos as u64 {
                        buffer.pos -= back as usize;
                        return Ok(());
                    }
                }
            }
        }

        if let Some(buffer) = &mut self.buffer {
            buffer.fill = 0;
            buffer.pos = 0;
        }
        self.io.seek(target).await
    }

    /// Current logical position in bytes from the start of the file.
    pub async fn tell(&mut self) -> Result<u64> {
        let io_pos = self.io.tell().await;
        let result = io_pos.map(|io_pos| match &self.buffer {
            Some(buffer) if self.for_reading => {
                io_pos - buffer.fill as u64 + buffer.pos as u64
            }
            Some(buffer) => io_pos + buffer.fill as u64,
            None => io_pos,
        });
        self.errors.track(result)
    }

    /// True once a read handle has consumed the whole file.
    ///
    /// Never true for write handles.
    pub async fn eof(&mut self) -> bool {
        if !self.for_reading {
            return false;
        }
        if let Some(buffer) = &self.buffer {
            if buffer.pos < buffer.fill {
                return false;
            }
        }
        let Ok(pos) = self.io.tell().await else {
            return false;
        };
        let Ok(len) = self.io.length().await else {
            return false;
        };
        pos >= len
    }

    /// Total length of the file in bytes.
    pub async fn length(&mut self) -> Result<u64> {
        let result = self.io.length().await;
        self.errors.track(result)
    }

    /// Resizes (or with 0, removes) this handle's buffer.
    ///
    /// Pending writes are flushed first; a read handle's underlying
    /// stream is re-seeked to the logical position so no buffered bytes
    /// are skipped or replayed.
    pub async fn set_buffer(&mut self, bufsize: usize) -> Result<()> {
        let result = self.do_set_buffer(bufsize).await;
        self.errors.track(result)
    }

    async fn do_set_buffer(&mut self, bufsize: usize) -> Result<()> {
        if bufsize as u64 > MAX_IO_LENGTH {
            return Err(Error::InvalidArgument);
        }
        self.do_flush().await?;

        if self.for_reading {
            if let Some(buffer) = &self.buffer {
                if buffer.fill != buffer.pos {
                    let io_pos = self.io.tell().await?;
                    let logical = io_pos - buffer.fill as u64 + buffer.pos as u64;
                    self.io.seek(logical).await?;
                }
            }
        }

        self.buffer = if bufsize == 0 {
            None
        } else {
            Some(Buffer { data: vec![0; bufsize].into_boxed_slice(), fill: 0, pos: 0 })
        };
        Ok(())
    }

    /// Pushes buffered writes to the underlying stream.
    ///
    /// A no-op for read handles and empty buffers. A short write fails
    /// and leaves the buffer contents in place.
    pub async fn flush(&mut self) -> Result<()> {
        let result = self.do_flush().await;
        self.errors.track(result)
    }

    async fn do_flush(&mut self) -> Result<()> {
        if self.for_reading {
            return Ok(());
        }
        let Some(buffer) = &mut self.buffer else {
            return Ok(());
        };
        if buffer.pos == buffer.fill {
            return Ok(());
        }

        let pending = &buffer.data[buffer.pos..buffer.fill];
        let written = self.io.write(pending).await?;
        if written < pending.len() {
            return Err(Error::Io);
        }
        buffer.pos = 0;
        buffer.fill = 0;
        Ok(())
    }

    /// Flushes and closes the handle.
    ///
    /// If the final flush fails the handle comes back unchanged inside
    /// the [`CloseError`], buffer contents intact, so the caller can
    /// retry or abandon it. Dropping a write handle without closing
    /// discards whatever is still buffered.
    pub async fn close(mut self) -> std::result::Result<(), CloseError> {
        if !self.for_reading {
            if let Err(error) = self.flush().await {
                return Err(CloseError { file: self, error });
            }
            if let Err(error) = self.io.flush().await {
                self.errors.set(Some(error));
                return Err(CloseError { file: self, error });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File")
            .field("for_reading", &self.for_reading)
            .field("mount", &self.dir.dir_name)
            .field("buffered", &self.buffer.is_some())
            .finish_non_exhaustive()
    }
}

/// A failed [`File::close`], carrying the still-open handle.
#[derive(Debug)]
pub struct CloseError {
    file: File,
    error: Error,
}

impl CloseError {
    /// Why the close failed.
    pub fn error(&self) -> Error {
        self.error
    }

    /// Recovers the handle to retry or drop.
    pub fn into_file(self) -> File {
        self.file
    }
}

impl fmt::Display for CloseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "close failed: {}", self.error)
    }
}

impl std::error::Error for CloseError {}
