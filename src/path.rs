//! Platform-independent path sanitization.
//!
//! Every path entering the public API passes through [`sanitize`] before
//! any mount or backend sees it. The canonical internal form uses `/` as
//! the only separator, has no leading or trailing separator, no empty
//! segments and no `.`/`..` segments.

use crate::error::{Error, Result};

/// Cleans up a caller-supplied virtual path into canonical form.
///
/// Leading slashes are stripped, runs of slashes collapse into one and a
/// trailing slash is dropped. Paths containing `:` or `\`, or with any
/// segment equal to `.` or `..`, are rejected with
/// [`Error::BadFilename`]. The empty string is the virtual root and is
/// accepted.
pub fn sanitize(src: &str) -> Result<String> {
    let src = src.trim_start_matches('/');

    if src == "." || src == ".." {
        return Err(Error::BadFilename);
    }

    let mut dst = String::with_capacity(src.len());
    for segment in src.split('/') {
        if segment.is_empty() {
            continue; // collapsed double separator, or the trailing one.
        }
        if segment == "." || segment == ".." {
            return Err(Error::BadFilename);
        }
        if segment.contains(':') || segment.contains('\\') {
            return Err(Error::BadFilename);
        }
        if !dst.is_empty() {
            dst.push('/');
        }
        dst.push_str(segment);
    }

    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_leading_and_trailing_separators() {
        assert_eq!(sanitize("/a/b/c").unwrap(), "a/b/c");
        assert_eq!(sanitize("a/b/c/").unwrap(), "a/b/c");
        assert_eq!(sanitize("///a").unwrap(), "a");
        assert_eq!(sanitize("/").unwrap(), "");
        assert_eq!(sanitize("").unwrap(), "");
    }

    #[test]
    fn collapses_separator_runs() {
        assert_eq!(sanitize("a//b///c").unwrap(), "a/b/c");
    }

    #[test]
    fn rejects_dot_and_dotdot() {
        assert_eq!(sanitize("."), Err(Error::BadFilename));
        assert_eq!(sanitize(".."), Err(Error::BadFilename));
        assert_eq!(sanitize("/.."), Err(Error::BadFilename));
        assert_eq!(sanitize("a/../b"), Err(Error::BadFilename));
        assert_eq!(sanitize("a/./b"), Err(Error::BadFilename));
        assert_eq!(sanitize("a/b/.."), Err(Error::BadFilename));
        assert_eq!(sanitize("../etc/passwd"), Err(Error::BadFilename));
    }

    #[test]
    fn rejects_illegal_characters() {
        assert_eq!(sanitize("c:/windows"), Err(Error::BadFilename));
        assert_eq!(sanitize("a\\b"), Err(Error::BadFilename));
        assert_eq!(sanitize("dir/na:me"), Err(Error::BadFilename));
    }

    #[test]
    fn dotted_names_survive() {
        assert_eq!(sanitize("a/.hidden").unwrap(), "a/.hidden");
        assert_eq!(sanitize("archive.tar.gz").unwrap(), "archive.tar.gz");
        assert_eq!(sanitize("...").unwrap(), "...");
    }
}
