//! File, directory and enumeration operations over the mount stack.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::archiver::{FileStat, FileType};
use crate::error::{Error, Result};
use crate::path;
use crate::platform;
use crate::vfs::mount::{part_of_mount_point, verify_path};
use crate::vfs::{File, Vfs};

/// What an enumeration callback wants next.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EnumerateResult {
    /// Keep delivering entries.
    Continue,
    /// Stop early; the enumeration still succeeds.
    Stop,
    /// Abort; the enumeration fails with [`Error::AppCallback`].
    Error,
}

type EnumerateFn<'a> = dyn FnMut(&str, &str) -> EnumerateResult + Send + 'a;

fn matches_extension(name: &str, ext: &str) -> bool {
    let (name, ext) = (name.as_bytes(), ext.as_bytes());
    if name.len() <= ext.len() {
        return false;
    }
    if name[name.len() - ext.len() - 1] != b'.' {
        return false;
    }
    name[name.len() - ext.len()..].eq_ignore_ascii_case(ext)
}

impl Vfs {
    /// Opens `name` for reading.
    ///
    /// The search path is consulted head to tail; the first mount that
    /// resolves the path provides the bytes.
    pub async fn open_read(&self, name: &str) -> Result<File> {
        let result = self.do_open_read(name).await;
        self.track(result)
    }

    async fn do_open_read(&self, name: &str) -> Result<File> {
        let fname = path::sanitize(name)?;
        let state = self.state.lock().await;
        if state.search_path.is_empty() {
            return Err(Error::NotFound);
        }

        let mut last_err = None;
        for handle in &state.search_path {
            match verify_path(handle, state.allow_symlinks, &fname, false).await {
                Ok(arcname) => match handle.archive.open_read(arcname).await {
                    Ok(io) => {
                        return Ok(File::new(
                            io,
                            true,
                            Arc::clone(handle),
                            Arc::clone(&self.errors),
                        ));
                    }
                    Err(err) => last_err = Some(err),
                },
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or(Error::NotFound))
    }

    /// Creates or truncates `name` in the write directory.
    pub async fn open_write(&self, name: &str) -> Result<File> {
        let result = self.do_open_write(name, false).await;
        self.track(result)
    }

    /// Opens `name` in the write directory for appending.
    pub async fn open_append(&self, name: &str) -> Result<File> {
        let result = self.do_open_write(name, true).await;
        self.track(result)
    }

    async fn do_open_write(&self, name: &str, appending: bool) -> Result<File> {
        let fname = path::sanitize(name)?;
        let state = self.state.lock().await;
        let handle = state.write_dir.as_ref().ok_or(Error::NoWriteDir)?;
        let arcname = verify_path(handle, state.allow_symlinks, &fname, false).await?;

        let io = if appending {
            handle.archive.open_append(arcname).await?
        } else {
            handle.archive.open_write(arcname).await?
        };
        Ok(File::new(io, false, Arc::clone(handle), Arc::clone(&self.errors)))
    }

    /// Creates a directory (and missing parents) in the write directory.
    pub async fn mkdir(&self, dname: &str) -> Result<()> {
        let result = self.do_mkdir(dname).await;
        self.track(result)
    }

    async fn do_mkdir(&self, dname: &str) -> Result<()> {
        let dname = path::sanitize(dname)?;
        let state = self.state.lock().await;
        let handle = state.write_dir.as_ref().ok_or(Error::NoWriteDir)?;
        let rest = verify_path(handle, state.allow_symlinks, &dname, true).await?;

        // Walk the prefixes, creating from the first missing level on.
        let mut exists = true;
        let mut end = 0;
        while end < rest.len() {
            end = rest[end..].find('/').map(|at| end + at).unwrap_or(rest.len());
            let prefix = &rest[..end];
            if exists {
                match handle.archive.stat(prefix).await {
                    Ok(stat) => {
                        if stat.file_type != FileType::Directory {
                            return Err(Error::Duplicate);
                        }
                    }
                    Err(Error::NotFound) => exists = false,
                    Err(err) => return Err(err),
                }
            }
            if !exists {
                handle.archive.mkdir(prefix).await?;
            }
            end += 1;
        }
        Ok(())
    }

    /// Removes a file or empty directory from the write directory.
    pub async fn delete(&self, fname: &str) -> Result<()> {
        let result = self.do_delete(fname).await;
        self.track(result)
    }

    async fn do_delete(&self, fname: &str) -> Result<()> {
        let fname = path::sanitize(fname)?;
        let state = self.state.lock().await;
        let handle = state.write_dir.as_ref().ok_or(Error::NoWriteDir)?;
        let arcname = verify_path(handle, state.allow_symlinks, &fname, false).await?;
        handle.archive.remove(arcname).await
    }

    /// Metadata for `name`, from the first mount that knows it.
    ///
    /// The empty path is the virtual root: a directory, writable iff a
    /// write directory is set. Directories implied by mountpoints stat
    /// as read-only directories even when no backend owns them.
    pub async fn stat(&self, name: &str) -> Result<FileStat> {
        let result = self.do_stat(name).await;
        self.track(result)
    }

    async fn do_stat(&self, name: &str) -> Result<FileStat> {
        let fname = path::sanitize(name)?;
        let state = self.state.lock().await;

        if fname.is_empty() {
            let mut stat = FileStat::unknown();
            stat.file_type = FileType::Directory;
            stat.readonly = state.write_dir.is_none();
            return Ok(stat);
        }

        let mut last_err = Error::NotFound;
        for handle in &state.search_path {
            if part_of_mount_point(handle, &fname) {
                let mut stat = FileStat::unknown();
                stat.file_type = FileType::Directory;
                stat.readonly = true;
                return Ok(stat);
            }
            match verify_path(handle, state.allow_symlinks, &fname, false).await {
                Ok(arcname) => match handle.archive.stat(arcname).await {
                    Ok(stat) => return Ok(stat),
                    Err(Error::NotFound) => last_err = Error::NotFound,
                    Err(err) => return Err(err),
                },
                Err(err) => last_err = err,
            }
        }
        Err(last_err)
    }

    /// True if any mount resolves `name`.
    pub async fn exists(&self, name: &str) -> bool {
        self.do_real_dir(name).await.is_ok()
    }

    /// True if `name` resolves to a directory.
    pub async fn is_directory(&self, name: &str) -> bool {
        matches!(
            self.do_stat(name).await,
            Ok(FileStat { file_type: FileType::Directory, .. })
        )
    }

    /// True if `name` resolves to a symbolic link.
    pub async fn is_symbolic_link(&self, name: &str) -> bool {
        matches!(
            self.do_stat(name).await,
            Ok(FileStat { file_type: FileType::Symlink, .. })
        )
    }

    /// Last modification time of `name`, seconds since the Unix epoch.
    pub async fn last_mod_time(&self, name: &str) -> Result<i64> {
        let result = self.do_stat(name).await.map(|stat| stat.modtime);
        self.track(result)
    }

    /// The `new_dir` of the mount that would serve reads of `name`.
    pub async fn real_dir(&self, name: &str) -> Result<String> {
        let result = self.do_real_dir(name).await;
        self.track(result)
    }

    async fn do_real_dir(&self, name: &str) -> Result<String> {
        let fname = path::sanitize(name)?;
        let state = self.state.lock().await;
        for handle in &state.search_path {
            if part_of_mount_point(handle, &fname) {
                return Ok(handle.dir_name.clone());
            }
            if let Ok(arcname) =
                verify_path(handle, state.allow_symlinks, &fname, false).await
            {
                if handle.archive.stat(arcname).await.is_ok() {
                    return Ok(handle.dir_name.clone());
                }
            }
        }
        Err(Error::NotFound)
    }

    /// Walks the entries of virtual directory `path`, one callback per
    /// entry.
    ///
    /// The callback receives the directory as given and the entry's
    /// basename, and steers the walk through its [`EnumerateResult`].
    /// Every mount containing the directory contributes its entries;
    /// mountpoints below `path` contribute their next path segment.
    /// When symbolic links are forbidden, entries that are symlinks in
    /// a link-capable backend are withheld.
    ///
    /// The instance's state lock is held for the whole walk: the
    /// callback must not call back into the same instance.
    pub async fn enumerate<F>(&self, path: &str, mut cb: F) -> Result<()>
    where
        F: FnMut(&str, &str) -> EnumerateResult + Send,
    {
        let result = self.do_enumerate(path, &mut cb).await;
        self.track(result)
    }

    async fn do_enumerate(&self, path: &str, cb: &mut EnumerateFn<'_>) -> Result<()> {
        let fname = path::sanitize(path)?;
        let state = self.state.lock().await;

        for handle in &state.search_path {
            if part_of_mount_point(handle, &fname) {
                // Synthesize the next segment of the mountpoint.
                let Some(mount_point) = &handle.mount_point else {
                    continue;
                };
                let start = if fname.is_empty() { 0 } else { fname.len() + 1 };
                let end = mount_point[start..]
                    .find('/')
                    .map(|at| start + at)
                    .unwrap_or(mount_point.len());
                match cb(path, &mount_point[start..end]) {
                    EnumerateResult::Continue => {}
                    EnumerateResult::Stop => return Ok(()),
                    EnumerateResult::Error => return Err(Error::AppCallback),
                }
                continue;
            }

            let Ok(arcname) =
                verify_path(handle, state.allow_symlinks, &fname, false).await
            else {
                continue;
            };
            match handle.archive.stat(arcname).await {
                Ok(stat) if stat.file_type == FileType::Directory => {}
                Ok(_) | Err(_) => continue, // not a directory in this mount.
            }

            let filter_symlinks = !state.allow_symlinks && handle.info.supports_symlinks;
            for entry in handle.archive.enumerate(arcname).await? {
                if filter_symlinks {
                    let full = if arcname.is_empty() {
                        entry.clone()
                    } else {
                        format!("{arcname}/{entry}")
                    };
                    match handle.archive.stat(&full).await {
                        Ok(stat) if stat.file_type == FileType::Symlink => continue,
                        Ok(_) => {}
                        Err(err) => return Err(err),
                    }
                }
                match cb(path, &entry) {
                    EnumerateResult::Continue => {}
                    EnumerateResult::Stop => return Ok(()),
                    EnumerateResult::Error => return Err(Error::AppCallback),
                }
            }
        }
        Ok(())
    }

    /// Entries of virtual directory `path`, sorted and deduplicated.
    pub async fn enumerate_files(&self, path: &str) -> Result<Vec<String>> {
        let result = self.do_enumerate_files(path).await;
        self.track(result)
    }

    async fn do_enumerate_files(&self, path: &str) -> Result<Vec<String>> {
        let mut list: Vec<String> = Vec::new();
        self.do_enumerate(path, &mut |_dir, name| {
            if let Err(at) = list.binary_search_by(|probe| probe.as_str().cmp(name)) {
                list.insert(at, name.to_owned());
            }
            EnumerateResult::Continue
        })
        .await?;
        Ok(list)
    }

    /// Legacy enumeration: delivers every entry, cannot stop or fail
    /// from the callback, and swallows traversal errors.
    pub async fn enumerate_files_callback<F>(&self, path: &str, mut cb: F)
    where
        F: FnMut(&str, &str) + Send,
    {
        let _ = self
            .enumerate(path, |dir, name| {
                cb(dir, name);
                EnumerateResult::Continue
            })
            .await;
    }

    /// Per-user data directory for `app`, created on first use.
    ///
    /// Follows the platform's conventions ($XDG_DATA_HOME on this one);
    /// both names must be non-empty even where only `app` ends up in
    /// the path. Ends with the directory separator.
    pub async fn pref_dir(&self, org: &str, app: &str) -> Result<String> {
        let result = self.do_pref_dir(org, app).await;
        self.track(result)
    }

    async fn do_pref_dir(&self, org: &str, app: &str) -> Result<String> {
        if org.is_empty() || app.is_empty() {
            return Err(Error::InvalidArgument);
        }

        let dir = platform::calc_pref_dir(self.user_dir(), org, app);
        let bare = dir.trim_end_matches(platform::DIR_SEPARATOR);
        if platform::stat(Path::new(bare), true).await.is_err() {
            tokio::fs::create_dir_all(bare).await.map_err(|err| Error::from_io(&err))?;
        }
        self.cache_pref_dir(&dir);
        Ok(dir)
    }

    /// Sets up the conventional search path and write directory in one
    /// call.
    ///
    /// The preference directory becomes the write directory and the
    /// head of the search path; the base directory goes to the tail.
    /// With `archive_ext` set, archives carrying that extension found
    /// at the virtual root are mounted too, before everything else if
    /// `archives_first`. Archives that fail to mount are skipped with a
    /// warning rather than failing the call. `include_cdroms` is
    /// accepted for compatibility; this platform enumerates no
    /// removable media.
    pub async fn set_sane_config(
        &self,
        organization: &str,
        app_name: &str,
        archive_ext: Option<&str>,
        include_cdroms: bool,
        archives_first: bool,
    ) -> Result<()> {
        let result = self
            .do_set_sane_config(organization, app_name, archive_ext, archives_first)
            .await;
        let _ = include_cdroms;
        self.track(result)
    }

    async fn do_set_sane_config(
        &self,
        organization: &str,
        app_name: &str,
        archive_ext: Option<&str>,
        archives_first: bool,
    ) -> Result<()> {
        let pref_dir = self.do_pref_dir(organization, app_name).await?;
        let base_dir = self.base_dir().to_owned();

        self.set_write_dir(Some(&pref_dir)).await.map_err(|_| Error::NoWriteDir)?;

        if let Err(err) = self.mount(&pref_dir, None, false).await {
            warn!(dir = %pref_dir, %err, "sane config: pref dir not mounted");
        }
        if let Err(err) = self.mount(&base_dir, None, true).await {
            warn!(dir = %base_dir, %err, "sane config: base dir not mounted");
        }

        let Some(ext) = archive_ext else {
            return Ok(());
        };
        let Ok(names) = self.enumerate_files("/").await else {
            return Ok(());
        };
        for name in names.iter().filter(|name| matches_extension(name, ext)) {
            let Ok(real) = self.real_dir(name).await else {
                continue;
            };
            let archive = format!("{real}{}{name}", platform::DIR_SEPARATOR);
            match self.mount(&archive, None, !archives_first).await {
                Ok(()) => debug!(%archive, "sane config: archive mounted"),
                Err(err) => warn!(%archive, %err, "sane config: archive skipped"),
            }
        }
        Ok(())
    }
}
