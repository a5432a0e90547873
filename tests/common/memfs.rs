//! A tiny read-only in-memory archive format for exercising stream
//! mounts and the probe loop.
//!
//! Layout: an 8-byte magic, a big-endian entry count, then per entry a
//! length-prefixed path and length-prefixed contents.

use std::io::Read as _;
use std::sync::Arc;

use async_trait::async_trait;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use tokio::sync::Mutex;

use stratafs::{
    Archive, Archiver, ArchiverInfo, DirTree, Error, FileStat, FileType, Io, Result,
};

pub const MAGIC: &[u8; 8] = b"MEMFS\0v1";

/// Serializes `entries` into archive bytes.
pub fn build_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.write_u32::<BigEndian>(entries.len() as u32).expect("write count");
    for (path, data) in entries {
        out.write_u32::<BigEndian>(path.len() as u32).expect("write path len");
        out.extend_from_slice(path.as_bytes());
        out.write_u32::<BigEndian>(data.len() as u32).expect("write data len");
        out.extend_from_slice(data);
    }
    out
}

/// Read-only byte stream over shared memory.
pub struct MemIo {
    data: Arc<[u8]>,
    pos: usize,
}

impl MemIo {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { data: bytes.into(), pos: 0 }
    }

    fn slice(data: Arc<[u8]>) -> Self {
        Self { data, pos: 0 }
    }
}

#[async_trait]
impl Io for MemIo {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let take = buf.len().min(self.data.len() - self.pos);
        buf[..take].copy_from_slice(&self.data[self.pos..self.pos + take]);
        self.pos += take;
        Ok(take)
    }

    async fn write(&mut self, _data: &[u8]) -> Result<usize> {
        Err(Error::ReadOnly)
    }

    async fn seek(&mut self, offset: u64) -> Result<()> {
        if offset > self.data.len() as u64 {
            return Err(Error::PastEof);
        }
        self.pos = offset as usize;
        Ok(())
    }

    async fn tell(&mut self) -> Result<u64> {
        Ok(self.pos as u64)
    }

    async fn length(&mut self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    async fn duplicate(&mut self) -> Result<Box<dyn Io>> {
        Ok(Box::new(MemIo::slice(Arc::clone(&self.data))))
    }

    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Span of one archived file inside the raw bytes.
#[derive(Debug, Default, Copy, Clone)]
struct MemEntry {
    start: usize,
    len: usize,
}

/// Driver for the in-memory format.
pub struct MemArchiver;

#[async_trait]
impl Archiver for MemArchiver {
    fn info(&self) -> ArchiverInfo {
        ArchiverInfo {
            extension: "mem",
            description: "In-memory test archive",
            author: "stratafs tests",
            url: "https://example.invalid/stratafs",
            supports_symlinks: false,
        }
    }

    async fn open_archive(
        &self,
        io: Option<Box<dyn Io>>,
        _name: &str,
        for_writing: bool,
    ) -> Result<Box<dyn Archive>> {
        let Some(mut io) = io else {
            return Err(Error::Unsupported);
        };

        let mut raw = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let got = io.read(&mut chunk).await?;
            if got == 0 {
                break;
            }
            raw.extend_from_slice(&chunk[..got]);
        }

        if raw.len() < MAGIC.len() || &raw[..MAGIC.len()] != MAGIC {
            return Err(Error::Unsupported); // not ours, keep probing.
        }
        if for_writing {
            return Err(Error::ReadOnly);
        }

        let mut tree: DirTree<MemEntry> = DirTree::new();
        let mut cursor = std::io::Cursor::new(&raw[MAGIC.len()..]);
        let count = cursor.read_u32::<BigEndian>().map_err(|_| Error::Corrupt)?;
        for _ in 0..count {
            let path_len = cursor.read_u32::<BigEndian>().map_err(|_| Error::Corrupt)?;
            let mut path = vec![0u8; path_len as usize];
            cursor.read_exact(&mut path).map_err(|_| Error::Corrupt)?;
            let path = String::from_utf8(path).map_err(|_| Error::Corrupt)?;

            let data_len = cursor.read_u32::<BigEndian>().map_err(|_| Error::Corrupt)?;
            let start = MAGIC.len() + cursor.position() as usize;
            let end = start + data_len as usize;
            if end > raw.len() {
                return Err(Error::Corrupt);
            }
            cursor.set_position(cursor.position() + u64::from(data_len));

            *tree.add(&path, false)? = MemEntry { start, len: data_len as usize };
        }

        Ok(Box::new(MemArchive { data: raw.into(), tree: Mutex::new(tree) }))
    }
}

/// One opened in-memory archive.
pub struct MemArchive {
    data: Arc<[u8]>,
    tree: Mutex<DirTree<MemEntry>>,
}

#[async_trait]
impl Archive for MemArchive {
    async fn enumerate(&self, dir: &str) -> Result<Vec<String>> {
        let mut tree = self.tree.lock().await;
        let mut names = Vec::new();
        tree.enumerate(dir, |name| names.push(name.to_owned()))?;
        Ok(names)
    }

    async fn open_read(&self, name: &str) -> Result<Box<dyn Io>> {
        let mut tree = self.tree.lock().await;
        if tree.is_dir(name) == Some(true) {
            return Err(Error::NotAFile);
        }
        let entry = tree.find(name).copied().ok_or(Error::NotFound)?;
        let data: Arc<[u8]> = self.data[entry.start..entry.start + entry.len].into();
        Ok(Box::new(MemIo::slice(data)))
    }

    async fn open_write(&self, _name: &str) -> Result<Box<dyn Io>> {
        Err(Error::ReadOnly)
    }

    async fn open_append(&self, _name: &str) -> Result<Box<dyn Io>> {
        Err(Error::ReadOnly)
    }

    async fn remove(&self, _name: &str) -> Result<()> {
        Err(Error::ReadOnly)
    }

    async fn mkdir(&self, _name: &str) -> Result<()> {
        Err(Error::ReadOnly)
    }

    async fn stat(&self, name: &str) -> Result<FileStat> {
        let mut tree = self.tree.lock().await;
        let is_dir = tree.is_dir(name).ok_or(Error::NotFound)?;
        let entry = tree.find(name).copied().ok_or(Error::NotFound)?;
        let mut stat = FileStat::unknown();
        if is_dir {
            stat.file_type = FileType::Directory;
        } else {
            stat.file_type = FileType::Regular;
            stat.filesize = entry.len as i64;
        }
        Ok(stat)
    }
}
