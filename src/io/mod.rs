//! Defines the byte-stream abstraction --- [`Io`].
//!
//! Mounted archives read their containers through an [`Io`], which lets a
//! container live in a real file, inside another mount, or anywhere else a
//! caller can implement the trait over.

mod handle;
mod native;

pub(crate) use handle::HandleIo;
pub(crate) use native::{NativeIo, OpenMode};

use async_trait::async_trait;

use crate::error::Result;

/// A seekable byte stream with an independent cursor.
///
/// Implementations release their resources on drop.
#[async_trait]
pub trait Io: Send + Sync {
    /// Reads up to `buf.len()` bytes into `buf`.
    ///
    /// Returns the number of bytes read; `Ok(0)` means end of stream.
    /// Short reads are allowed.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Writes up to `data.len()` bytes, returning how many were taken.
    async fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Moves the cursor to `offset` bytes from the start of the stream.
    async fn seek(&mut self, offset: u64) -> Result<()>;

    /// Current cursor position in bytes from the start.
    async fn tell(&mut self) -> Result<u64>;

    /// Total length of the stream in bytes.
    async fn length(&mut self) -> Result<u64>;

    /// Creates an independent stream over the same underlying source.
    ///
    /// The duplicate's cursor starts at offset 0 regardless of this
    /// stream's position.
    async fn duplicate(&mut self) -> Result<Box<dyn Io>>;

    /// Pushes any pending writes down to the underlying storage.
    async fn flush(&mut self) -> Result<()>;
}
