#![doc = include_str!("../README.md")]
#![warn(
    unreachable_pub,
    missing_debug_implementations,
    missing_docs,
    clippy::pedantic
)]

use async_trait::async_trait;

pub mod api;
pub mod claim;
mod client;
pub mod errors;
pub(crate) mod serde;

/// Result type used by the entire crate.
pub type Result<T> = core::result::Result<T, errors::Error>;

pub use claim::{AccessMode, ClaimList, ClaimPhase, PersistentVolumeClaim};
pub use client::*;
pub use errors::Error;

/// The two claim operations a volume provisioner needs from the cluster.
///
/// [`Client`] talks to a real API server. Anything else implementing this
/// trait (an in-memory fake, a caching layer) can be used in its place.
#[async_trait]
pub trait ClaimApi: Send + Sync {
    /// List every claim in `namespace`.
    async fn list_claims(&self, namespace: &str) -> Result<Vec<PersistentVolumeClaim>>;

    /// Create a claim in `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] if a claim with the same name is
    /// already present.
    async fn create_claim(
        &self,
        namespace: &str,
        claim: &PersistentVolumeClaim,
    ) -> Result<PersistentVolumeClaim>;
}

#[async_trait]
impl<T: ClaimApi + ?Sized> ClaimApi for std::sync::Arc<T> {
    async fn list_claims(&self, namespace: &str) -> Result<Vec<PersistentVolumeClaim>> {
        (**self).list_claims(namespace).await
    }

    async fn create_claim(
        &self,
        namespace: &str,
        claim: &PersistentVolumeClaim,
    ) -> Result<PersistentVolumeClaim> {
        (**self).create_claim(namespace, claim).await
    }
}

#[async_trait]
impl<T: ClaimApi + ?Sized> ClaimApi for Box<T> {
    async fn list_claims(&self, namespace: &str) -> Result<Vec<PersistentVolumeClaim>> {
        (**self).list_claims(namespace).await
    }

    async fn create_claim(
        &self,
        namespace: &str,
        claim: &PersistentVolumeClaim,
    ) -> Result<PersistentVolumeClaim> {
        (**self).create_claim(namespace, claim).await
    }
}
