//! Paths inside a user volume.
//!
//! Callers address files with `/`-separated paths relative to the volume
//! root (`/`, `/sub`, `sub/`, ...). [`join`] takes such a path apart segment
//! by segment, which rules out `..`. Symlinks created inside the volume can
//! still lead elsewhere, so every joined path is also passed through
//! [`confine`] before it is read or written.
use std::path::{Component, Path, PathBuf};

/// Relative path errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// `..` segments are not allowed.
    #[error("`..` is not allowed in volume paths")]
    ParentDir,

    /// NUL characters are not allowed.
    #[error("volume paths cannot contain NUL characters")]
    Nul,

    /// The path resolves (through a symlink) to somewhere outside the volume.
    #[error("path leads outside the volume")]
    Escapes,
}

/// Split a relative path into its meaningful segments. Empty segments (from
/// leading, trailing or doubled separators) and `.` are dropped.
///
/// # Errors
///
/// If a segment is `..` or the path contains NUL.
pub fn segments(relative: &str) -> Result<Vec<&str>, PathError> {
    if relative.contains('\0') {
        return Err(PathError::Nul);
    }

    relative
        .split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .map(|seg| {
            if seg == ".." {
                Err(PathError::ParentDir)
            } else {
                Ok(seg)
            }
        })
        .collect()
}

/// Resolve `relative` below `root`.
///
/// ```
/// use std::path::Path;
/// use jhub_store::path::join;
///
/// let root = Path::new("/vol/u1");
///
/// assert_eq!(join(root, "/sub/").unwrap(), Path::new("/vol/u1/sub"));
/// assert_eq!(join(root, "sub").unwrap(), Path::new("/vol/u1/sub"));
/// assert_eq!(join(root, "/").unwrap(), Path::new("/vol/u1"));
/// assert!(join(root, "/../u2").is_err());
/// ```
///
/// # Errors
///
/// See [`segments`].
pub fn join(root: &Path, relative: &str) -> Result<PathBuf, PathError> {
    let mut path = root.to_path_buf();

    for seg in segments(relative)? {
        path.push(seg);
    }

    Ok(path)
}

/// Check that `path` really is below `root` once symlinks are resolved.
///
/// `path` need not exist: its deepest existing ancestor is checked instead,
/// which is where anything created at `path` would end up.
///
/// # Errors
///
/// [`PathError::Escapes`] if the resolved path is not below the resolved
/// root.
pub async fn confine(root: &Path, path: &Path) -> Result<(), PathError> {
    // a missing root holds nothing to escape through
    let Ok(root) = tokio::fs::canonicalize(root).await else {
        return Ok(());
    };

    let mut existing = path;

    loop {
        if let Ok(real) = tokio::fs::canonicalize(existing).await {
            return if real.starts_with(&root) {
                Ok(())
            } else {
                Err(PathError::Escapes)
            };
        }

        match existing.parent() {
            Some(parent) => existing = parent,
            None => return Ok(()),
        }
    }
}

/// Express `path` relative to `root` with a leading `/`, the form returned to
/// callers. Returns `None` if `path` is not below `root`.
///
/// ```
/// use std::path::Path;
/// use jhub_store::path::relative_to;
///
/// assert_eq!(
///     relative_to(Path::new("/vol/u1"), Path::new("/vol/u1/sub/file.txt")).as_deref(),
///     Some("/sub/file.txt")
/// );
/// assert_eq!(relative_to(Path::new("/vol/u1"), Path::new("/vol/u1")).as_deref(), Some("/"));
/// assert_eq!(relative_to(Path::new("/vol/u1"), Path::new("/vol/u2/x")), None);
/// ```
#[must_use]
pub fn relative_to(root: &Path, path: &Path) -> Option<String> {
    let rest = path.strip_prefix(root).ok()?;

    let segments = rest
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>();

    Some(format!("/{}", segments.join("/")))
}

/// The last `/`-separated segment of `name`, the only part of a source name
/// used for the copy destination.
///
/// ```
/// use jhub_store::path::file_name;
///
/// assert_eq!(file_name("data/2019/results.csv"), Some("results.csv"));
/// assert_eq!(file_name("results.csv"), Some("results.csv"));
/// assert_eq!(file_name("data/"), None);
/// assert_eq!(file_name("a/.."), None);
/// ```
#[must_use]
pub fn file_name(name: &str) -> Option<&str> {
    let last = name.rsplit('/').next()?;

    match last {
        "" | "." | ".." => None,
        s if s.contains('\0') || s.contains('\\') => None,
        s => Some(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_are_normalized() {
        assert_eq!(segments("//a/./b//").unwrap(), vec!["a", "b"]);
        assert!(segments("").unwrap().is_empty());
        assert_eq!(segments("a/../b"), Err(PathError::ParentDir));
        assert_eq!(segments("a\0"), Err(PathError::Nul));
    }

    #[test]
    fn trailing_separator_is_irrelevant() {
        let root = Path::new("/vol/u1");

        assert_eq!(join(root, "/sub/dir/").unwrap(), join(root, "/sub/dir").unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinks_cannot_escape() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();

        let inner = root.path().join("inner");
        std::fs::create_dir(&inner).unwrap();
        std::os::unix::fs::symlink(outside.path(), root.path().join("escape")).unwrap();
        std::os::unix::fs::symlink(&inner, root.path().join("alias")).unwrap();

        let root = root.path();
        let check = |rel: &str| {
            let path = join(root, rel).unwrap();
            async move { confine(root, &path).await }
        };

        assert_eq!(check("/").await, Ok(()));
        assert_eq!(check("/inner/new/file").await, Ok(()));
        assert_eq!(check("/alias").await, Ok(()));
        assert_eq!(check("/escape").await, Err(PathError::Escapes));
        assert_eq!(check("/escape/not/there").await, Err(PathError::Escapes));
    }

    #[test]
    fn dotdot_file_names() {
        assert_eq!(file_name(".."), None);
        assert_eq!(file_name("evil\\..\\name"), None);
        assert_eq!(file_name("/abs/path/x.bin"), Some("x.bin"));
    }
}
