//! Logged-in users.
use std::path::{Path, PathBuf};

use rand::{distributions::Alphanumeric, Rng};
use serde::Serialize;

use crate::identity::UserIdentity;

/// Length of a session pseudonym.
pub const PSEUDONYM_LEN: usize = 15;

/// The host directory backing a bound claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedVolume {
    path: PathBuf,
    volume_name: String,
}

impl ResolvedVolume {
    /// `{mount_root}/{prefix}-{username}-{volume_name}`, the layout used by
    /// the NFS client provisioner.
    #[must_use]
    pub fn new(
        mount_root: &Path,
        prefix: &str,
        user: &UserIdentity,
        volume_name: impl Into<String>,
    ) -> Self {
        let volume_name = volume_name.into();
        let path = mount_root.join(format!("{prefix}-{user}-{volume_name}"));

        Self { path, volume_name }
    }

    /// Absolute path of the volume root.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name of the bound `PersistentVolume`.
    #[must_use]
    pub fn volume_name(&self) -> &str {
        &self.volume_name
    }
}

/// Random display name for a session. Carries no authority.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, Serialize)]
pub struct Pseudonym(String);

impl Pseudonym {
    /// Generate a fresh pseudonym.
    #[must_use]
    pub fn generate() -> Self {
        let name = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(PSEUDONYM_LEN)
            .map(char::from)
            .collect();

        Self(name)
    }
}

/// A user whose volume has been resolved. There is no such thing as a
/// session without a volume: [`crate::login::login`] is the only way to get
/// one and it fails instead of returning a half-initialized session.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    identity: UserIdentity,
    volume: ResolvedVolume,
    pseudonym: Pseudonym,
}

impl Session {
    pub(crate) fn new(identity: UserIdentity, volume: ResolvedVolume) -> Self {
        Self {
            identity,
            volume,
            pseudonym: Pseudonym::generate(),
        }
    }

    /// The (lowercased) user.
    #[must_use]
    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    /// The user's volume.
    #[must_use]
    pub fn volume(&self) -> &ResolvedVolume {
        &self.volume
    }

    /// Display name for logs.
    #[must_use]
    pub fn pseudonym(&self) -> &Pseudonym {
        &self.pseudonym
    }
}

/// Whether the caller holds a usable session.
#[must_use]
pub fn is_logged_in(session: Option<&Session>) -> bool {
    session.is_some()
}
