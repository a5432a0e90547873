//! stratafs --- a portable, layered virtual filesystem.
//!
//! Applications see one tree of forward-slash paths assembled from an
//! ordered stack of mounted backing stores: real directories, archive
//! files, or caller-supplied byte streams. Reads resolve through the
//! stack front to back; a single optional write directory receives all
//! mutations. Paths are sanitized against traversal, symbolic links can
//! be forbidden per instance, and any number of fully isolated [`Vfs`]
//! instances can coexist in one process.

mod error;
mod path;
mod platform;
mod vfs;

pub mod archiver;
pub mod io;
pub mod tree;

pub use archiver::{Archive, Archiver, ArchiverInfo, FileStat, FileType};
pub use error::{Error, Result};
pub use io::Io;
pub use tree::DirTree;
pub use vfs::{CloseError, EnumerateResult, File, Vfs};

/// Version of the stratafs library in use.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

/// The version this crate was built as.
pub fn linked_version() -> Version {
    fn part(raw: &str) -> u32 {
        raw.parse().unwrap_or(0)
    }
    Version {
        major: part(env!("CARGO_PKG_VERSION_MAJOR")),
        minor: part(env!("CARGO_PKG_VERSION_MINOR")),
        patch: part(env!("CARGO_PKG_VERSION_PATCH")),
    }
}

/// The host platform's directory separator.
///
/// Virtual paths always use `/`; this only matters when handing paths
/// to the OS or interpreting [`Vfs::base_dir`]-style results.
pub fn dir_separator() -> char {
    platform::DIR_SEPARATOR
}
