//! Errors surfaced to the caller of a store operation.
use thiserror::Error;

use crate::identity::ParseIdentityError;

/// Error used by the entire store crate.
#[derive(Debug, Error)]
pub enum Error {
    /// No user identity was supplied.
    #[error("no user identity supplied")]
    MissingIdentity,

    /// The identity cannot be used as part of a claim name or path.
    #[error("invalid user identity: {0}")]
    InvalidIdentity(ParseIdentityError),

    /// The orchestrator could not be reached or rejected the request.
    #[error("orchestrator unavailable: {0}")]
    OrchestratorUnavailable(#[source] kubeclaim::Error),

    /// The claim was not bound within the retry ceiling.
    #[error("no volume bound after {attempts} attempts")]
    ProvisionExhausted {
        /// Resolve attempts made.
        attempts: u32,
    },

    /// The directory to list does not exist.
    #[error("directory not found: {0}")]
    DirectoryNotFound(String),

    /// The directory exists but could not be read.
    #[error("could not read directory {path}: {source}")]
    DirectoryUnreadable {
        /// Path relative to the volume root.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A relative path tried to leave the volume.
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

impl From<ParseIdentityError> for Error {
    fn from(e: ParseIdentityError) -> Self {
        match e {
            ParseIdentityError::Empty => Self::MissingIdentity,
            e => Self::InvalidIdentity(e),
        }
    }
}

impl From<kubeclaim::Error> for Error {
    fn from(e: kubeclaim::Error) -> Self {
        Self::OrchestratorUnavailable(e)
    }
}

/// How a boundary layer should report an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Disposition {
    /// The request itself was malformed (`400`).
    BadRequest,
    /// The user could not be logged in (`401`).
    Unauthorized,
    /// The target does not exist (`404`).
    NotFound,
    /// Something went wrong on our side (`500`).
    Internal,
}

impl Error {
    /// Classify the error for the boundary layer.
    #[must_use]
    pub fn disposition(&self) -> Disposition {
        match self {
            Error::MissingIdentity | Error::InvalidIdentity(_) | Error::InvalidPath(_) => {
                Disposition::BadRequest
            }
            Error::ProvisionExhausted { .. } => Disposition::Unauthorized,
            Error::DirectoryNotFound(_) => Disposition::NotFound,
            Error::OrchestratorUnavailable(_) | Error::DirectoryUnreadable { .. } => {
                Disposition::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispositions() {
        assert_eq!(
            Error::MissingIdentity.disposition(),
            Disposition::BadRequest
        );
        assert_eq!(
            Error::from(ParseIdentityError::IllegalChar('/')).disposition(),
            Disposition::BadRequest
        );
        assert_eq!(
            Error::ProvisionExhausted { attempts: 4 }.disposition(),
            Disposition::Unauthorized
        );
        assert_eq!(
            Error::from(kubeclaim::Error::NotConfigured("KUBERNETES_SERVICE_HOST")).disposition(),
            Disposition::Internal
        );
        assert_eq!(
            Error::DirectoryNotFound("/nope".into()).disposition(),
            Disposition::NotFound
        );
        assert_eq!(Disposition::BadRequest.to_string(), "bad_request");
    }

    #[test]
    fn empty_identity_is_missing() {
        assert!(matches!(
            Error::from(ParseIdentityError::Empty),
            Error::MissingIdentity
        ));
    }
}
