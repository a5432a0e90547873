//! Mount stack management: probing, mounting, unmounting, path security.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::archiver::dir::{DirArchiver, DIR_ARCHIVER_INFO};
use crate::archiver::{Archive, Archiver, ArchiverInfo, FileType};
use crate::error::{Error, Result};
use crate::io::{HandleIo, Io, NativeIo, OpenMode};
use crate::path;
use crate::platform;
use crate::vfs::{DirHandle, File, State, Vfs};

/// True iff `fname` names a strict ancestor directory of the handle's
/// mountpoint.
///
/// With a mountpoint of `a/b/c/`, the empty path, `a` and `a/b` are
/// ancestors; `a/b/c` itself and anything deeper are not. Root mounts
/// have no ancestors. Used to synthesize the virtual directories a
/// mountpoint implies even when no backend owns that prefix.
pub(crate) fn part_of_mount_point(handle: &DirHandle, fname: &str) -> bool {
    let Some(mount_point) = &handle.mount_point else {
        return false;
    };
    if fname.is_empty() {
        return true;
    }

    let len = fname.len();
    let mount_point = mount_point.as_bytes();
    if len > mount_point.len() {
        return false;
    }
    if len + 1 == mount_point.len() {
        return false; // the mountpoint itself, not an ancestor.
    }
    if &mount_point[..len] != fname.as_bytes() {
        return false;
    }
    // `a/b` must match `a/b/` and not `a/bc/`.
    mount_point[len] == b'/'
}

/// Checks `fname` against one mount and returns the archive-relative
/// remainder the backend should see.
///
/// Paths outside the handle's mountpoint fail with [`Error::NotFound`].
/// When symlinks are disallowed, every path prefix is stat'd through the
/// backend: a symlink anywhere fails [`Error::SymlinkForbidden`], and a
/// missing non-final prefix fails [`Error::NotFound`] unless
/// `allow_missing` (the final element may always be absent, so files can
/// be created). `fname` must already be sanitized.
pub(crate) async fn verify_path<'a>(
    handle: &DirHandle,
    allow_symlinks: bool,
    fname: &'a str,
    allow_missing: bool,
) -> Result<&'a str> {
    if fname.is_empty() {
        return Ok(fname);
    }

    let mut rest = fname;
    if let Some(mount_point) = &handle.mount_point {
        let body = &mount_point.as_bytes()[..mount_point.len() - 1];
        let bytes = fname.as_bytes();
        if bytes.len() < body.len() || &bytes[..body.len()] != body {
            return Err(Error::NotFound);
        }
        if bytes.len() > body.len() && bytes[body.len()] != b'/' {
            return Err(Error::NotFound);
        }
        rest = &fname[body.len()..];
        if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
        }
    }

    if !allow_symlinks {
        let mut pos = 0;
        loop {
            let end = rest[pos..].find('/').map(|at| pos + at);
            let prefix = match end {
                Some(end) => &rest[..end],
                None => rest,
            };
            match handle.archive.stat(prefix).await {
                Ok(stat) => {
                    if stat.file_type == FileType::Symlink {
                        return Err(Error::SymlinkForbidden);
                    }
                }
                Err(Error::NotFound) => {
                    // The last element is allowed to not exist yet.
                    if end.is_none() || allow_missing {
                        return Ok(rest);
                    }
                    return Err(Error::NotFound);
                }
                Err(_) => {} // an unreadable prefix doesn't block the walk.
            }
            match end {
                Some(end) => pos = end + 1,
                None => break,
            }
        }
    }

    Ok(rest)
}

/// Probes archivers for `name` and opens the winning backend.
///
/// Directory paths go straight to the DIR driver. Everything else is
/// wrapped in native I/O (unless a stream was supplied) and offered to
/// the registered archivers in order, each probe on an independent
/// cursor at offset 0. A driver failing with [`Error::Unsupported`]
/// merely declines; any other failure claims the container and aborts
/// the probe with that error.
async fn open_directory(
    state: &State,
    io: Option<Box<dyn Io>>,
    name: &str,
    for_writing: bool,
) -> Result<(Box<dyn Archive>, ArchiverInfo)> {
    let mut io = match io {
        Some(io) => io,
        None => {
            let stat = platform::stat(Path::new(name), true).await?;
            if stat.file_type == FileType::Directory {
                let archive = DirArchiver.open_archive(None, name, for_writing).await?;
                return Ok((archive, DIR_ARCHIVER_INFO));
            }
            let mode = if for_writing { OpenMode::Write } else { OpenMode::Read };
            Box::new(NativeIo::open(Path::new(name), mode).await?)
        }
    };

    for archiver in &state.archivers {
        let probe = io.duplicate().await?;
        match archiver.open_archive(Some(probe), name, for_writing).await {
            Ok(archive) => return Ok((archive, archiver.info())),
            Err(Error::Unsupported) => continue,
            Err(err) => return Err(err),
        }
    }

    Err(Error::Unsupported)
}

/// Opens a backend for `new_dir` and pairs it with its mountpoint.
async fn create_dir_handle(
    state: &State,
    io: Option<Box<dyn Io>>,
    new_dir: &str,
    mount_point: Option<&str>,
    for_writing: bool,
) -> Result<DirHandle> {
    let mount_point = match mount_point {
        Some(raw) => {
            let clean = path::sanitize(raw)?;
            if clean.is_empty() {
                None
            } else {
                Some(format!("{clean}/"))
            }
        }
        None => None,
    };

    let (archive, info) = open_directory(state, io, new_dir, for_writing).await?;
    Ok(DirHandle { archive, info, dir_name: new_dir.to_owned(), mount_point })
}

impl Vfs {
    /// Mounts a directory or archive file into the virtual tree.
    ///
    /// `mount_point` defaults to the root; `append` places the mount at
    /// the tail of the search path instead of the head. Mounting a
    /// `new_dir` that is already mounted succeeds without changes.
    pub async fn mount(
        &self,
        new_dir: &str,
        mount_point: Option<&str>,
        append: bool,
    ) -> Result<()> {
        let result = self.do_mount(None, new_dir, mount_point, append).await;
        self.track(result)
    }

    /// Mounts an archive supplied as a raw byte stream.
    ///
    /// `name` stands in for a file path: it names the mount for
    /// [`Vfs::unmount`] and duplicate detection, and its extension may
    /// guide format probing.
    pub async fn mount_io(
        &self,
        io: Box<dyn Io>,
        name: &str,
        mount_point: Option<&str>,
        append: bool,
    ) -> Result<()> {
        let result = self.do_mount(Some(io), name, mount_point, append).await;
        self.track(result)
    }

    /// Mounts an archive that lives inside an already-mounted tree.
    ///
    /// The open `file` becomes the backing stream of the new mount and
    /// is owned by it from here on; if mounting fails the file is
    /// closed along the way.
    pub async fn mount_handle(
        &self,
        file: File,
        name: &str,
        mount_point: Option<&str>,
        append: bool,
    ) -> Result<()> {
        let io = Box::new(HandleIo::new(file));
        let result = self.do_mount(Some(io), name, mount_point, append).await;
        self.track(result)
    }

    async fn do_mount(
        &self,
        io: Option<Box<dyn Io>>,
        fname: &str,
        mount_point: Option<&str>,
        append: bool,
    ) -> Result<()> {
        if fname.is_empty() {
            return Err(Error::InvalidArgument);
        }

        let mut state = self.state.lock().await;
        if state.search_path.iter().any(|handle| handle.dir_name == fname) {
            return Ok(()); // already in the search path.
        }

        let handle = create_dir_handle(&state, io, fname, mount_point, false).await?;
        debug!(dir = fname, mount_point = handle.mount_point_str(), append, "mounted");

        let handle = Arc::new(handle);
        if append {
            state.search_path.push(handle);
        } else {
            state.search_path.insert(0, handle);
        }
        Ok(())
    }

    /// Removes a mount, named by the `new_dir` it was mounted as.
    ///
    /// Fails with [`Error::FilesStillOpen`] while files opened from that
    /// mount are alive, and [`Error::NotMounted`] if the name is
    /// unknown.
    pub async fn unmount(&self, old_dir: &str) -> Result<()> {
        let result = self.do_unmount(old_dir).await;
        self.track(result)
    }

    async fn do_unmount(&self, old_dir: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let position = state
            .search_path
            .iter()
            .position(|handle| handle.dir_name == old_dir)
            .ok_or(Error::NotMounted)?;
        if Arc::strong_count(&state.search_path[position]) > 1 {
            return Err(Error::FilesStillOpen);
        }
        state.search_path.remove(position);
        debug!(dir = old_dir, "unmounted");
        Ok(())
    }

    /// The current search path, head first.
    pub async fn search_path(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.search_path.iter().map(|handle| handle.dir_name.clone()).collect()
    }

    /// Where `dir` is mounted in the virtual tree, with a trailing `/`.
    pub async fn mount_point(&self, dir: &str) -> Result<String> {
        let state = self.state.lock().await;
        let found = state
            .search_path
            .iter()
            .find(|handle| handle.dir_name == dir)
            .map(|handle| handle.mount_point_str().to_owned())
            .ok_or(Error::NotMounted);
        drop(state);
        self.track(found)
    }

    /// Points all future mutations at `new_dir`, or clears the write
    /// directory with `None`.
    ///
    /// The previous write backend is closed first; that refuses with
    /// [`Error::FilesStillOpen`] while write handles are open.
    pub async fn set_write_dir(&self, new_dir: Option<&str>) -> Result<()> {
        let result = self.do_set_write_dir(new_dir).await;
        self.track(result)
    }

    async fn do_set_write_dir(&self, new_dir: Option<&str>) -> Result<()> {
        let mut state = self.state.lock().await;

        if let Some(current) = &state.write_dir {
            if Arc::strong_count(current) > 1 {
                return Err(Error::FilesStillOpen);
            }
            state.write_dir = None;
        }

        if let Some(new_dir) = new_dir {
            let handle = create_dir_handle(&state, None, new_dir, None, true).await?;
            state.write_dir = Some(Arc::new(handle));
            debug!(dir = new_dir, "write dir set");
        } else {
            debug!("write dir cleared");
        }
        Ok(())
    }

    /// The current write directory, if any.
    pub async fn write_dir(&self) -> Option<String> {
        let state = self.state.lock().await;
        state.write_dir.as_ref().map(|handle| handle.dir_name.clone())
    }

    /// Adds a format driver to this instance's probe order.
    ///
    /// Drivers are probed in registration order. A driver whose
    /// extension is already registered fails with [`Error::Duplicate`];
    /// an empty extension is reserved for the built-in directory driver
    /// and fails with [`Error::InvalidArgument`].
    pub async fn register_archiver(&self, archiver: Arc<dyn Archiver>) -> Result<()> {
        let result = self.do_register_archiver(archiver).await;
        self.track(result)
    }

    async fn do_register_archiver(&self, archiver: Arc<dyn Archiver>) -> Result<()> {
        let extension = archiver.info().extension;
        if extension.is_empty() {
            return Err(Error::InvalidArgument);
        }

        let mut state = self.state.lock().await;
        if state
            .archivers
            .iter()
            .any(|known| known.info().extension.eq_ignore_ascii_case(extension))
        {
            return Err(Error::Duplicate);
        }
        state.archivers.push(archiver);
        Ok(())
    }

    /// Descriptors of every registered archive format.
    ///
    /// The built-in directory driver is not an archive format and is
    /// not listed.
    pub async fn supported_archive_types(&self) -> Vec<ArchiverInfo> {
        let state = self.state.lock().await;
        state.archivers.iter().map(|archiver| archiver.info()).collect()
    }
}
