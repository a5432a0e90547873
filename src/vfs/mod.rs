//! The engine: per-instance state and the public operation surface.
//!
//! One [`Vfs`] value is one fully independent instance. Instances share
//! nothing --- mounting, write-dir changes and errors on one are
//! invisible to every other.

mod file;
mod mount;
mod ops;

pub use file::{CloseError, File};
pub use ops::EnumerateResult;

use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::thread::ThreadId;

use tokio::sync::Mutex;
use tracing::debug;

use crate::archiver::{Archive, Archiver, ArchiverInfo};
use crate::error::{Error, Result};
use crate::platform;

/// One mounted archive: backend instance plus its place in the tree.
pub(crate) struct DirHandle {
    /// Opened backend instance.
    pub(crate) archive: Box<dyn Archive>,
    /// Format descriptor of the backend that claimed the mount.
    pub(crate) info: ArchiverInfo,
    /// Source path exactly as the caller supplied it.
    pub(crate) dir_name: String,
    /// Virtual mountpoint, stored with a trailing `/`. `None` is `/`.
    pub(crate) mount_point: Option<String>,
}

impl DirHandle {
    pub(crate) fn mount_point_str(&self) -> &str {
        self.mount_point.as_deref().unwrap_or("/")
    }
}

/// Everything the state lock guards.
pub(crate) struct State {
    /// Ordered mount stack, consulted head to tail.
    pub(crate) search_path: Vec<Arc<DirHandle>>,
    /// Receiver of all mutations, outside the search path.
    pub(crate) write_dir: Option<Arc<DirHandle>>,
    /// Format drivers, probed in registration order.
    pub(crate) archivers: Vec<Arc<dyn Archiver>>,
    pub(crate) allow_symlinks: bool,
}

struct ErrRecord {
    thread: ThreadId,
    code: Option<Error>,
}

/// Per-thread last-error records, shared with every open [`File`].
pub(crate) struct ErrorState {
    records: StdMutex<Vec<ErrRecord>>,
}

impl ErrorState {
    fn new() -> Self {
        Self { records: StdMutex::new(Vec::new()) }
    }

    fn records(&self) -> MutexGuard<'_, Vec<ErrRecord>> {
        // A panicked holder cannot leave the list inconsistent.
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn set(&self, code: Option<Error>) {
        let Some(code) = code else {
            return; // "no error" never allocates a record.
        };
        let thread = std::thread::current().id();
        let mut records = self.records();
        match records.iter_mut().find(|record| record.thread == thread) {
            Some(record) => record.code = Some(code),
            None => records.push(ErrRecord { thread, code: Some(code) }),
        }
    }

    pub(crate) fn take(&self) -> Option<Error> {
        let thread = std::thread::current().id();
        self.records()
            .iter_mut()
            .find(|record| record.thread == thread)
            .and_then(|record| record.code.take())
    }

    fn clear(&self) {
        self.records().clear();
    }

    /// Mirrors a failed result into the calling thread's record.
    pub(crate) fn track<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.set(Some(*err));
        }
        result
    }
}

/// A portable, layered virtual filesystem instance.
///
/// Reads resolve through an ordered stack of mounted backends; all
/// mutations go to the single optional write directory. Paths use `/`
/// regardless of platform and are checked against traversal and
/// (optionally) symbolic links before any backend sees them.
pub struct Vfs {
    pub(crate) state: Mutex<State>,
    pub(crate) errors: Arc<ErrorState>,
    base_dir: String,
    user_dir: String,
    pref_dir: StdMutex<Option<String>>,
}

impl Vfs {
    /// Creates an instance, deriving the base and user directories.
    ///
    /// `argv0` is only consulted when the platform cannot name the
    /// running executable by itself; passing `None` then fails with
    /// [`Error::Argv0IsNull`].
    pub async fn new(argv0: Option<&str>) -> Result<Self> {
        let base_dir = platform::calc_base_dir(argv0).await?;
        let user_dir = platform::calc_user_dir()?;
        debug!(%base_dir, %user_dir, "instance initialized");

        Ok(Self {
            state: Mutex::new(State {
                search_path: Vec::new(),
                write_dir: None,
                archivers: Vec::new(),
                allow_symlinks: false,
            }),
            errors: Arc::new(ErrorState::new()),
            base_dir,
            user_dir,
            pref_dir: StdMutex::new(None),
        })
    }

    /// Tears the instance down to its freshly-constructed state.
    ///
    /// Refuses with [`Error::FilesStillOpen`] while any [`File`] opened
    /// from this instance is still alive; close those first. On success
    /// the write directory, search path, registered archivers,
    /// preference directory and error records are all cleared.
    pub async fn deinit(&self) -> Result<()> {
        let result = self.do_deinit().await;
        self.track(result)
    }

    async fn do_deinit(&self) -> Result<()> {
        let mut state = self.state.lock().await;

        if let Some(write_dir) = &state.write_dir {
            if Arc::strong_count(write_dir) > 1 {
                return Err(Error::FilesStillOpen);
            }
        }
        state.write_dir = None;

        if state.search_path.iter().any(|handle| Arc::strong_count(handle) > 1) {
            return Err(Error::FilesStillOpen);
        }
        state.search_path.clear();
        state.archivers.clear();
        state.allow_symlinks = false;
        drop(state);

        self.pref_dir.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take();
        self.errors.clear();
        debug!("instance deinitialized");
        Ok(())
    }

    /// Directory the running executable lives in, separator-terminated.
    pub fn base_dir(&self) -> &str {
        &self.base_dir
    }

    /// The current user's home directory, separator-terminated.
    pub fn user_dir(&self) -> &str {
        &self.user_dir
    }

    /// Allows or forbids symbolic links for subsequent path checks.
    pub async fn permit_symbolic_links(&self, allow: bool) {
        self.state.lock().await.allow_symlinks = allow;
    }

    /// Current symbolic link policy.
    pub async fn symbolic_links_permitted(&self) -> bool {
        self.state.lock().await.allow_symlinks
    }

    /// Overwrites the calling thread's last-error record.
    ///
    /// Passing `None` is a no-op and never allocates.
    pub fn set_error_code(&self, code: Option<Error>) {
        self.errors.set(code);
    }

    /// Reads *and resets* the calling thread's last-error record.
    ///
    /// Every failing operation also returns its [`Error`] directly;
    /// that is the primary channel. The per-thread mirror exists for
    /// callers porting from sentinel-style APIs and is most useful on
    /// current-thread runtimes, since a task that migrates between
    /// worker threads may read a different thread's record.
    pub fn last_error_code(&self) -> Option<Error> {
        self.errors.take()
    }

    /// Like [`Vfs::last_error_code`], but as the one-line message.
    pub fn last_error(&self) -> Option<&'static str> {
        self.last_error_code().map(Error::message)
    }

    pub(crate) fn track<T>(&self, result: Result<T>) -> Result<T> {
        self.errors.track(result)
    }

    pub(crate) fn cache_pref_dir(&self, dir: &str) {
        *self.pref_dir.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) =
            Some(dir.to_owned());
    }
}

impl std::fmt::Debug for Vfs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vfs")
            .field("base_dir", &self.base_dir)
            .field("user_dir", &self.user_dir)
            .finish_non_exhaustive()
    }
}
