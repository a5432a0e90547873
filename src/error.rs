//! Defines the closed error taxonomy shared by every stratafs operation.

use std::fmt;

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive as _, ToPrimitive as _};

/// Result of stratafs operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong, as a closed enum.
///
/// The numeric codes are stable and start at 1; code 0 means "no error"
/// and is represented as the absence of an [`Error`] (`None` / `Ok`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
pub enum Error {
    /// An error the taxonomy has no better name for.
    OtherError = 1,
    /// An allocation failed.
    OutOfMemory = 2,
    /// Operation requires an initialized instance.
    NotInitialized = 3,
    /// Instance is already initialized.
    IsInitialized = 4,
    /// No way to determine the base directory and `argv0` was absent.
    Argv0IsNull = 5,
    /// Operation or format is not supported.
    Unsupported = 6,
    /// Attempted to access past the end of a file.
    PastEof = 7,
    /// The operation needs all files on the affected mount closed first.
    FilesStillOpen = 8,
    /// A caller-supplied argument was malformed.
    InvalidArgument = 9,
    /// The named archive is not in the search path.
    NotMounted = 10,
    /// No such file or directory.
    NotFound = 11,
    /// A path element is a symbolic link and symlinks are disallowed.
    SymlinkForbidden = 12,
    /// A write operation was attempted with no write directory set.
    NoWriteDir = 13,
    /// A write was attempted on a handle opened for reading.
    OpenForReading = 14,
    /// A read was attempted on a handle opened for writing.
    OpenForWriting = 15,
    /// The path names something that is not a regular file.
    NotAFile = 16,
    /// A modifying operation hit a read-only backend.
    ReadOnly = 17,
    /// An archive's internal structure is damaged.
    Corrupt = 18,
    /// Symbolic links recurse into themselves.
    SymlinkLoop = 19,
    /// A hard I/O error from the OS or a backend.
    Io = 20,
    /// The OS denied permission.
    Permission = 21,
    /// The filesystem is out of space.
    NoSpace = 22,
    /// The path is illegal or insecure (`..`, `:`, `\`, ...).
    BadFilename = 23,
    /// The OS is using the file and refuses the modification.
    Busy = 24,
    /// Attempted to remove a directory that still has entries.
    DirNotEmpty = 25,
    /// The OS reported a failure not covered elsewhere.
    OsError = 26,
    /// The resource already exists.
    Duplicate = 27,
    /// An archive rejected the supplied password.
    BadPassword = 28,
    /// An application callback reported an error during enumeration.
    AppCallback = 29,
}

impl Error {
    /// One-line human readable message for this code.
    pub fn message(self) -> &'static str {
        match self {
            Error::OtherError => "unknown error",
            Error::OutOfMemory => "out of memory",
            Error::NotInitialized => "not initialized",
            Error::IsInitialized => "already initialized",
            Error::Argv0IsNull => "argv[0] is NULL",
            Error::Unsupported => "unsupported",
            Error::PastEof => "past end of file",
            Error::FilesStillOpen => "files still open",
            Error::InvalidArgument => "invalid argument",
            Error::NotMounted => "not mounted",
            Error::NotFound => "not found",
            Error::SymlinkForbidden => "symlinks are forbidden",
            Error::NoWriteDir => "write directory is not set",
            Error::OpenForReading => "file open for reading",
            Error::OpenForWriting => "file open for writing",
            Error::NotAFile => "not a file",
            Error::ReadOnly => "read-only filesystem",
            Error::Corrupt => "corrupted",
            Error::SymlinkLoop => "infinite symbolic link loop",
            Error::Io => "i/o error",
            Error::Permission => "permission denied",
            Error::NoSpace => "no space available for writing",
            Error::BadFilename => "filename is illegal or insecure",
            Error::Busy => "tried to modify a file the OS needs",
            Error::DirNotEmpty => "directory isn't empty",
            Error::OsError => "OS reported an error",
            Error::Duplicate => "duplicate resource",
            Error::BadPassword => "bad password",
            Error::AppCallback => "app callback reported error",
        }
    }

    /// The stable numeric code of this error.
    pub fn code(self) -> u32 {
        self.to_u32().unwrap_or(0)
    }

    /// Looks an error up by its stable numeric code.
    ///
    /// Returns `None` for 0 ("no error") and for codes outside the
    /// taxonomy.
    pub fn from_code(code: u32) -> Option<Error> {
        Error::from_u32(code)
    }

    /// Translates an OS-level I/O failure into the closed taxonomy.
    ///
    /// Prefers the raw errno where one is available since
    /// [`std::io::ErrorKind`] is coarser than the taxonomy.
    pub fn from_io(err: &std::io::Error) -> Error {
        #[cfg(unix)]
        if let Some(raw) = err.raw_os_error() {
            return match raw {
                libc::EACCES | libc::EPERM | libc::EROFS => Error::Permission,
                libc::ENOENT | libc::ENOTDIR => Error::NotFound,
                libc::EISDIR => Error::NotAFile,
                libc::ENOSPC | libc::EDQUOT => Error::NoSpace,
                libc::EEXIST => Error::Duplicate,
                libc::ENOTEMPTY => Error::DirNotEmpty,
                libc::EBUSY | libc::ETXTBSY => Error::Busy,
                libc::ELOOP => Error::SymlinkLoop,
                libc::EIO => Error::Io,
                libc::ENOMEM => Error::OutOfMemory,
                _ => Error::OsError,
            };
        }

        match err.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound,
            std::io::ErrorKind::PermissionDenied => Error::Permission,
            std::io::ErrorKind::AlreadyExists => Error::Duplicate,
            std::io::ErrorKind::UnexpectedEof => Error::PastEof,
            _ => Error::OsError,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::from_io(&err)
    }
}
