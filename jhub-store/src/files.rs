//! Listing and creating directories inside a user volume.
use std::{io::ErrorKind, path::Path};

use mime::Mime;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::{errors::Error, path, session::Session};

/// Content type reported for directories.
pub const DIRECTORY_TYPE: &str = "httpd/unix-directory";

/// A file or directory in a volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    /// File name.
    pub name: String,
    /// [`DIRECTORY_TYPE`] or the media type guessed from the file name.
    pub content_type: String,
    /// Path relative to the volume root, starting with `/`.
    pub path: String,
}

/// Guess the media type of a file from its name, falling back to
/// `application/octet-stream`.
#[must_use]
pub fn content_type(path: &Path) -> Mime {
    match mime_guess::from_path(path).first() {
        Some(mime) => mime,
        None => {
            debug!("no media type known for {}", path.display());
            mime::APPLICATION_OCTET_STREAM
        }
    }
}

/// List the immediate children of `dir` (relative to the volume root),
/// sorted by name.
///
/// # Errors
///
/// - [`Error::InvalidPath`] if `dir` tries to leave the volume, either with
///   `..` or through a symlink
/// - [`Error::DirectoryNotFound`] if there is no such directory, or `dir` is
///   not a directory
/// - [`Error::DirectoryUnreadable`] for any other I/O error
#[instrument(skip(session), fields(session = %session.pseudonym()))]
pub async fn list_files(session: &Session, dir: &str) -> crate::Result<Vec<Entry>> {
    let root = session.volume().path();
    let invalid = |e| Error::InvalidPath(format!("{dir}: {e}"));

    let abs = path::join(root, dir).map_err(invalid)?;
    path::confine(root, &abs).await.map_err(invalid)?;

    info!("retrieving files from {}", abs.display());

    let unreadable = |source| Error::DirectoryUnreadable {
        path: dir.to_owned(),
        source,
    };

    let mut read_dir = match tokio::fs::read_dir(&abs).await {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(Error::DirectoryNotFound(dir.to_owned()))
        }
        Err(e) => {
            // a regular file has nothing to list
            return match tokio::fs::metadata(&abs).await {
                Ok(meta) if !meta.is_dir() => Err(Error::DirectoryNotFound(dir.to_owned())),
                _ => Err(unreadable(e)),
            };
        }
    };

    let mut entries = Vec::new();

    while let Some(entry) = read_dir.next_entry().await.map_err(unreadable)? {
        let path = entry.path();

        // follow symlinks, like a file manager would
        let is_dir = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.is_dir(),
            Err(e) => {
                warn!("could not stat {}: {}", path.display(), e);
                false
            }
        };

        let content_type = if is_dir {
            DIRECTORY_TYPE.to_owned()
        } else {
            content_type(&path).to_string()
        };

        let Some(relative) = path::relative_to(root, &path) else {
            continue;
        };

        entries.push(Entry {
            name: entry.file_name().to_string_lossy().into_owned(),
            content_type,
            path: relative,
        });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));

    debug!("listed {} entries", entries.len());

    Ok(entries)
}

/// Create the directory `name` inside `parent` (relative to the volume root).
/// Exactly one level is created; the parent must exist.
///
/// Returns `false` if the directory could not be created for any reason:
/// it already exists, the parent is missing or not writable, or either
/// argument is not a plain path.
#[instrument(skip(session), fields(session = %session.pseudonym()))]
pub async fn create_dir(session: &Session, parent: &str, name: &str) -> bool {
    let parent = parent.trim_end_matches('/');

    let Some(name) = path::file_name(name).filter(|n| *n == name) else {
        warn!("refusing to create directory named {:?}", name);
        return false;
    };

    let root = session.volume().path();

    let target = match path::join(root, parent) {
        Ok(parent) => parent.join(name),
        Err(e) => {
            warn!("refusing to create directory in {:?}: {}", parent, e);
            return false;
        }
    };

    if let Err(e) = path::confine(root, &target).await {
        warn!("refusing to create directory in {:?}: {}", parent, e);
        return false;
    }

    match tokio::fs::create_dir(&target).await {
        Ok(()) => {
            debug!("created {}", target.display());
            true
        }
        Err(e) => {
            warn!("could not create {}: {}", target.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guesses_types() {
        assert_eq!(content_type(Path::new("/v/a.txt")), mime::TEXT_PLAIN);
        assert_eq!(content_type(Path::new("/v/a.png")), mime::IMAGE_PNG);
        assert_eq!(
            content_type(Path::new("/v/no-extension")),
            mime::APPLICATION_OCTET_STREAM
        );
    }
}
