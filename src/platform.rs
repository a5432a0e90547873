//! POSIX host filesystem shims.
//!
//! Everything that touches the OS outside of open byte streams lives
//! here: stat, directory listing, mkdir/delete, and the derivation of
//! the base, user and preference directories.

use std::env;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::archiver::{FileStat, FileType};
use crate::error::{Error, Result};

/// The one directory separator of this platform.
pub const DIR_SEPARATOR: char = '/';

fn secs_since_epoch(time: std::io::Result<SystemTime>) -> i64 {
    match time {
        Ok(time) => match time.duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_secs() as i64,
            Err(_) => -1,
        },
        Err(_) => -1,
    }
}

/// Stats `path`, optionally following a final symlink.
pub async fn stat(path: &Path, follow: bool) -> Result<FileStat> {
    let meta = if follow {
        tokio::fs::metadata(path).await
    } else {
        tokio::fs::symlink_metadata(path).await
    }
    .map_err(|err| Error::from_io(&err))?;

    let file_type = if meta.file_type().is_symlink() {
        FileType::Symlink
    } else if meta.is_dir() {
        FileType::Directory
    } else if meta.is_file() {
        FileType::Regular
    } else {
        FileType::Other
    };

    Ok(FileStat {
        filesize: meta.len() as i64,
        modtime: secs_since_epoch(meta.modified()),
        createtime: secs_since_epoch(meta.created()),
        accesstime: secs_since_epoch(meta.accessed()),
        file_type,
        readonly: meta.permissions().readonly(),
    })
}

/// Names of the direct children of directory `path`.
pub async fn enumerate(path: &Path) -> Result<Vec<String>> {
    let mut reader = tokio::fs::read_dir(path).await.map_err(|err| Error::from_io(&err))?;
    let mut names = Vec::new();
    while let Some(entry) = reader.next_entry().await.map_err(|err| Error::from_io(&err))? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Creates one directory level.
pub async fn mkdir(path: &Path) -> Result<()> {
    tokio::fs::create_dir(path).await.map_err(|err| Error::from_io(&err))
}

/// Removes a file or an empty directory.
pub async fn delete(path: &Path) -> Result<()> {
    let meta = tokio::fs::symlink_metadata(path).await.map_err(|err| Error::from_io(&err))?;
    if meta.is_dir() {
        tokio::fs::remove_dir(path).await.map_err(|err| Error::from_io(&err))
    } else {
        tokio::fs::remove_file(path).await.map_err(|err| Error::from_io(&err))
    }
}

async fn read_link_string(path: &str) -> Option<String> {
    let target = tokio::fs::read_link(path).await.ok()?;
    Some(target.to_string_lossy().into_owned())
}

fn parent_with_separator(path: &str) -> Option<String> {
    let sep = path.rfind(DIR_SEPARATOR)?;
    Some(path[..=sep].to_owned())
}

/// Finds an executable `bin` along `$PATH`, returning its directory.
async fn find_binary_in_path(bin: &str) -> Option<String> {
    let path_env = env::var("PATH").ok()?;
    for dir in path_env.split(':') {
        if dir.is_empty() {
            continue;
        }
        let candidate = Path::new(dir).join(bin);
        let Ok(meta) = tokio::fs::metadata(&candidate).await else {
            continue;
        };
        if meta.is_file() {
            let mut dir = dir.to_owned();
            if !dir.ends_with(DIR_SEPARATOR) {
                dir.push(DIR_SEPARATOR);
            }
            return Some(dir);
        }
    }
    None
}

/// Directory the running executable lives in, with a trailing separator.
///
/// Tries the `/proc` symlinks first, then the directory portion of
/// `argv0`, then a `$PATH` search for a bare `argv0`. With no `argv0`
/// and no platform answer this fails with [`Error::Argv0IsNull`].
pub async fn calc_base_dir(argv0: Option<&str>) -> Result<String> {
    let mut exe = read_link_string("/proc/self/exe").await;
    if exe.is_none() {
        exe = read_link_string("/proc/curproc/file").await;
    }
    if exe.is_none() {
        exe = read_link_string("/proc/curproc/exe").await;
    }
    if exe.is_none() {
        let pid = std::process::id();
        exe = read_link_string(&format!("/proc/{pid}/exe")).await;
    }
    if let Some(exe) = exe {
        if let Some(dir) = parent_with_separator(&exe) {
            return Ok(dir);
        }
    }

    let argv0 = argv0.ok_or(Error::Argv0IsNull)?;
    if argv0.contains(DIR_SEPARATOR) {
        return parent_with_separator(argv0).ok_or(Error::InvalidArgument);
    }
    find_binary_in_path(argv0).await.ok_or(Error::InvalidArgument)
}

/// The current user's home directory, with a trailing separator.
pub fn calc_user_dir() -> Result<String> {
    let mut dir = match env::var("HOME") {
        Ok(home) if !home.is_empty() => home,
        _ => home_from_passwd().ok_or(Error::OsError)?,
    };
    if !dir.ends_with(DIR_SEPARATOR) {
        dir.push(DIR_SEPARATOR);
    }
    Ok(dir)
}

#[cfg(unix)]
fn home_from_passwd() -> Option<String> {
    use std::ffi::CStr;

    let mut buf = vec![0u8; 4096];
    let mut passwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut result: *mut libc::passwd = std::ptr::null_mut();

    let rc = unsafe {
        libc::getpwuid_r(
            libc::getuid(),
            &mut passwd,
            buf.as_mut_ptr() as *mut libc::c_char,
            buf.len(),
            &mut result,
        )
    };
    if rc != 0 || result.is_null() || passwd.pw_dir.is_null() {
        return None;
    }
    let home = unsafe { CStr::from_ptr(passwd.pw_dir) };
    let home = home.to_str().ok()?;
    if home.is_empty() {
        return None;
    }
    Some(home.to_owned())
}

#[cfg(not(unix))]
fn home_from_passwd() -> Option<String> {
    None
}

/// Per-user, per-application data directory, with a trailing separator.
///
/// Follows the XDG base directory spec: `$XDG_DATA_HOME` if set, else
/// `<user>/.local/share`. The organization name is not part of XDG
/// paths, so `_org` only participates in validation upstream.
pub fn calc_pref_dir(user_dir: &str, _org: &str, app: &str) -> String {
    match env::var("XDG_DATA_HOME") {
        Ok(base) if !base.is_empty() => {
            let sep = if base.ends_with(DIR_SEPARATOR) { "" } else { "/" };
            format!("{base}{sep}{app}/")
        }
        _ => format!("{user_dir}.local/share/{app}/"),
    }
}

/// Builds the host path of an archive-relative name under `base`.
pub fn host_path(base: &Path, name: &str) -> PathBuf {
    if name.is_empty() {
        base.to_path_buf()
    } else {
        // Virtual paths already use this platform's separator.
        base.join(name)
    }
}
