//! Background copies into a user volume.
//!
//! [`copy_file`] validates the request, then hands the transfer to the
//! [`Copier`], a pool that runs at most `copy_workers` transfers at a time.
//! The caller gets a [`CopyHandle`] back right away and can poll it, wait for
//! it or cancel it. Dropping the last clone of a handle cancels the copy.
use std::{
    fmt,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use kubeclaim::ClaimApi;
use serde::Serialize;
use tokio::{
    fs::OpenOptions,
    io::{AsyncRead, AsyncWriteExt},
    sync::{watch, Semaphore},
};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, instrument, warn, Instrument};

use crate::{path, session::Session, Context};

type Source = Box<dyn AsyncRead + Send + Unpin>;

/// Progress of a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CopyStatus {
    /// Queued or running.
    Pending,
    /// All bytes are on disk.
    Finished,
    /// See [`CopyHandle::failure`].
    Error,
}

/// Why a copy ended in [`CopyStatus::Error`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CopyFailure {
    /// Something already lives at the destination. Nothing was written.
    #[error("destination `{0}` already exists")]
    DestinationExists(String),

    /// The source name has no usable last segment.
    #[error("invalid file name `{0}`")]
    InvalidName(String),

    /// The target directory is not a path inside the volume.
    #[error("invalid target directory `{0}`")]
    InvalidTarget(String),

    /// Reading the source or writing the destination failed.
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// [`CopyHandle::cancel`] was called before the copy completed.
    #[error("copy was cancelled")]
    Cancelled,
}

#[derive(Debug, Clone)]
struct CopyState {
    status: CopyStatus,
    failure: Option<CopyFailure>,
}

impl CopyState {
    fn pending() -> Self {
        Self {
            status: CopyStatus::Pending,
            failure: None,
        }
    }

    fn finished() -> Self {
        Self {
            status: CopyStatus::Finished,
            failure: None,
        }
    }

    fn failed(failure: CopyFailure) -> Self {
        Self {
            status: CopyStatus::Error,
            failure: Some(failure),
        }
    }
}

/// A file to copy: a name and a byte stream.
pub struct CopyTask {
    name: String,
    source: Source,
}

impl CopyTask {
    /// Only the last `/`-separated segment of `name` is used for the
    /// destination.
    pub fn new(name: impl Into<String>, source: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// The source name as given.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for CopyTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopyTask")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A submitted copy. The copy is cancelled once every clone of its handle
/// has been dropped.
#[derive(Debug, Clone)]
pub struct CopyHandle {
    destination: String,
    state: watch::Receiver<CopyState>,
    cancel: CancellationToken,
    _guard: Arc<DropGuard>,
}

impl CopyHandle {
    fn new(
        destination: String,
        state: watch::Receiver<CopyState>,
        cancel: CancellationToken,
    ) -> Self {
        let guard = Arc::new(cancel.clone().drop_guard());

        Self {
            destination,
            state,
            cancel,
            _guard: guard,
        }
    }

    fn failed(destination: String, failure: CopyFailure) -> Self {
        // the sender is dropped right away; receivers keep the last value
        let (_, state) = watch::channel(CopyState::failed(failure));

        Self::new(destination, state, CancellationToken::new())
    }

    /// Destination path relative to the volume root.
    #[must_use]
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> CopyStatus {
        self.state.borrow().status
    }

    /// The failure, once the status is [`CopyStatus::Error`].
    #[must_use]
    pub fn failure(&self) -> Option<CopyFailure> {
        self.state.borrow().failure.clone()
    }

    /// Wait until the copy is no longer pending.
    pub async fn wait(&self) -> CopyStatus {
        let mut state = self.state.clone();

        loop {
            let status = state.borrow_and_update().status;

            if status != CopyStatus::Pending {
                return status;
            }

            if state.changed().await.is_err() {
                return state.borrow().status;
            }
        }
    }

    /// Stop the copy. A partially written destination is removed. Has no
    /// effect once the copy has ended.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Bounded pool of copy workers.
#[derive(Debug, Clone)]
pub struct Copier {
    semaphore: Arc<Semaphore>,
}

impl Copier {
    /// Run at most `workers` transfers concurrently.
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Transfers that could start right now.
    #[must_use]
    pub fn idle_workers(&self) -> usize {
        self.semaphore.available_permits()
    }

    fn spawn(&self, path: PathBuf, destination: String, source: Source) -> CopyHandle {
        let (tx, state) = watch::channel(CopyState::pending());
        let cancel = CancellationToken::new();

        let semaphore = Arc::clone(&self.semaphore);
        let token = cancel.clone();
        let dest = destination.clone();

        tokio::spawn(
            async move {
                let state = match transfer(&semaphore, &path, &dest, source, &token).await {
                    Ok(bytes) => {
                        debug!("copied {} bytes to {}", bytes, dest);
                        CopyState::finished()
                    }
                    Err(failure) => {
                        error!("copy to {} failed: {}", dest, failure);
                        CopyState::failed(failure)
                    }
                };

                tx.send_replace(state);
            }
            .in_current_span(),
        );

        CopyHandle::new(destination, state, cancel)
    }
}

async fn transfer(
    semaphore: &Semaphore,
    path: &Path,
    destination: &str,
    mut source: Source,
    token: &CancellationToken,
) -> Result<u64, CopyFailure> {
    let _permit = tokio::select! {
        () = token.cancelled() => return Err(CopyFailure::Cancelled),
        permit = semaphore.acquire() => {
            permit.map_err(|_| CopyFailure::Transfer("copy pool is closed".to_owned()))?
        }
    };

    let mut file = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
    {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(CopyFailure::DestinationExists(destination.to_owned()))
        }
        Err(e) => return Err(CopyFailure::Transfer(e.to_string())),
    };

    let copied = tokio::select! {
        () = token.cancelled() => Err(CopyFailure::Cancelled),
        res = async {
            let bytes = tokio::io::copy(&mut source, &mut file).await?;
            file.flush().await?;
            Ok::<_, std::io::Error>(bytes)
        } => res.map_err(|e| CopyFailure::Transfer(e.to_string())),
    };

    if copied.is_err() {
        drop(file);

        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!("could not remove partial file {}: {}", path.display(), e);
        }
    }

    copied
}

/// Copy `task` into `target_dir` (relative to the volume root) in the
/// background.
///
/// The destination is `target_dir` joined with the last segment of the task
/// name. Invalid names, invalid targets and existing destinations produce a
/// handle that is already in [`CopyStatus::Error`]; nothing is written in
/// that case. Otherwise the transfer is queued on the context's [`Copier`].
#[instrument(skip(ctx, session, task), fields(session = %session.pseudonym(), name = %task.name))]
pub async fn copy_file(
    ctx: &Context<impl ClaimApi>,
    session: &Session,
    target_dir: &str,
    task: CopyTask,
) -> CopyHandle {
    let CopyTask { name, source } = task;
    let root = session.volume().path();

    let Some(file_name) = path::file_name(&name) else {
        warn!("refusing to copy a file named {:?}", name);
        return CopyHandle::failed(name.clone(), CopyFailure::InvalidName(name));
    };

    let dir = match path::join(root, target_dir) {
        Ok(dir) => dir,
        Err(e) => {
            warn!("refusing to copy into {:?}: {}", target_dir, e);
            return CopyHandle::failed(
                target_dir.to_owned(),
                CopyFailure::InvalidTarget(target_dir.to_owned()),
            );
        }
    };

    let path = dir.join(file_name);
    let destination = path::relative_to(root, &path).unwrap_or_else(|| format!("/{file_name}"));

    if let Err(e) = path::confine(root, &path).await {
        warn!("refusing to copy into {:?}: {}", target_dir, e);
        return CopyHandle::failed(destination, CopyFailure::InvalidTarget(target_dir.to_owned()));
    }

    match tokio::fs::try_exists(&path).await {
        Ok(false) => {}
        Ok(true) => {
            warn!("{} already exists", destination);
            return CopyHandle::failed(
                destination.clone(),
                CopyFailure::DestinationExists(destination),
            );
        }
        Err(e) => {
            warn!("could not check {}: {}", destination, e);
            return CopyHandle::failed(destination, CopyFailure::Transfer(e.to_string()));
        }
    }

    debug!("queueing copy to {}", destination);

    ctx.copier().spawn(path, destination, source)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn status_strings() {
        assert_eq!(CopyStatus::Pending.to_string(), "pending");
        assert_eq!(
            serde_json::to_string(&CopyStatus::Finished).unwrap(),
            "\"finished\""
        );
    }

    #[tokio::test]
    async fn failed_handle_is_final() {
        let handle = CopyHandle::failed("/a".into(), CopyFailure::Cancelled);

        assert_eq!(handle.wait().await, CopyStatus::Error);
        assert_eq!(handle.failure(), Some(CopyFailure::Cancelled));
    }

    #[tokio::test]
    async fn cancel_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stalled.bin");

        // the writer half is kept alive so the copy never completes
        let (_writer, reader) = tokio::io::duplex(64);

        let copier = Copier::new(1);
        let handle = copier.spawn(path.clone(), "/stalled.bin".into(), Box::new(reader));

        while !path.exists() {
            tokio::task::yield_now().await;
        }

        handle.cancel();

        assert_eq!(handle.wait().await, CopyStatus::Error);
        assert_eq!(handle.failure(), Some(CopyFailure::Cancelled));
        assert!(!path.exists());
        assert_eq!(copier.idle_workers(), 1);
    }

    #[tokio::test]
    async fn dropping_the_handle_cancels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abandoned.bin");

        let (_writer, reader) = tokio::io::duplex(64);

        let copier = Copier::new(1);
        let handle = copier.spawn(path.clone(), "/abandoned.bin".into(), Box::new(reader));
        let mut watcher = handle.state.clone();

        while !path.exists() {
            tokio::task::yield_now().await;
        }

        drop(handle);

        let state = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if watcher.borrow_and_update().status != CopyStatus::Pending {
                    return watcher.borrow().clone();
                }
                if watcher.changed().await.is_err() {
                    return watcher.borrow().clone();
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(state.failure, Some(CopyFailure::Cancelled));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn finished_copy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");

        let handle = Copier::new(2).spawn(
            path.clone(),
            "/hello.txt".into(),
            Box::new(&b"hello"[..]),
        );

        assert_eq!(handle.wait().await, CopyStatus::Finished);
        assert_eq!(handle.failure(), None);
        assert_eq!(std::fs::read(path).unwrap(), b"hello");
    }
}
