//! Errors returned by the claim client.
use thiserror::Error;

use crate::api::{Status, StatusReason};

/// Error used by the entire kubeclaim crate.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP error.
    #[error("{0}")]
    HttpError(#[from] reqwest::Error),

    /// Url error.
    #[error("invalid url")]
    UrlError(#[from] url::ParseError),

    /// Reading credentials from disk failed.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// Neither an explicit API url nor an in-cluster environment was found.
    #[error("no kubernetes api server configured (`{0}` is not set)")]
    NotConfigured(&'static str),

    /// A resource with the same name already exists.
    #[error("resource already exists")]
    AlreadyExists,

    /// Resource or namespace not found.
    #[error("resource not found")]
    NotFound,

    /// The service account token was rejected or lacks permissions.
    #[error("unauthorized: {0}")]
    Unauthorized(Status),

    /// Any other upstream error.
    #[error("kubernetes error: {0}")]
    Kube(Status),
}

impl Error {
    /// Classify a non-2xx response.
    #[must_use]
    pub fn from_status(code: u16, status: Status) -> Self {
        match (code, &status.reason) {
            (409, _) | (_, Some(StatusReason::AlreadyExists)) => Self::AlreadyExists,
            (404, _) | (_, Some(StatusReason::NotFound)) => Self::NotFound,
            (401 | 403, _) | (_, Some(StatusReason::Unauthorized | StatusReason::Forbidden)) => {
                Self::Unauthorized(status)
            }
            _ => Self::Kube(status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16, reason: Option<StatusReason>) -> Status {
        Status {
            code,
            message: None,
            reason,
        }
    }

    #[test]
    fn classify_statuses() {
        assert!(matches!(
            Error::from_status(409, status(409, Some(StatusReason::AlreadyExists))),
            Error::AlreadyExists
        ));
        assert!(matches!(
            Error::from_status(409, status(409, None)),
            Error::AlreadyExists
        ));
        assert!(matches!(
            Error::from_status(404, status(404, None)),
            Error::NotFound
        ));
        assert!(matches!(
            Error::from_status(403, status(403, Some(StatusReason::Forbidden))),
            Error::Unauthorized(_)
        ));
        assert!(matches!(
            Error::from_status(503, status(503, None)),
            Error::Kube(_)
        ));
    }
}
