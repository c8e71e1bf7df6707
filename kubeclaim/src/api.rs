//! API client utilities.
use reqwest::Response;
use serde::{de::DeserializeOwned, Deserialize};
use tracing::trace;

/// Machine-readable reason carried by a [`Status`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum StatusReason {
    /// The resource already exists.
    AlreadyExists,
    /// The resource does not exist.
    NotFound,
    /// Missing or invalid credentials.
    Unauthorized,
    /// The credentials are valid but lack the required permissions.
    Forbidden,
    /// The request conflicted with the current state.
    Conflict,
    /// The request body was rejected.
    Invalid,
    /// The server could not be reached in time.
    Timeout,
    /// Too many requests.
    TooManyRequests,
    /// Something else.
    #[serde(other)]
    Unknown,
}

/// The `Status` object returned by the API server on errors.
#[derive(Debug, Clone, Deserialize)]
pub struct Status {
    /// HTTP status code.
    #[serde(default)]
    pub code: u16,
    /// Human-readable description.
    pub message: Option<String>,
    /// Machine-readable reason.
    pub reason: Option<StatusReason>,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code)?;

        if let Some(ref reason) = self.reason {
            write!(f, " {reason:?}")?;
        }

        if let Some(ref message) = self.message {
            write!(f, ": {message}")?;
        }

        Ok(())
    }
}

/// Parse JSON as the associated type if the response has a 2xx status
/// code, otherwise parse it as a [`Status`] and convert it into an error.
///
/// # Errors
///
/// - invalid json
/// - non-2xx status
pub async fn read_json<T: DeserializeOwned>(res: Response) -> crate::Result<T> {
    let code = res.status();

    trace!("{} {}", code, res.url());

    if code.is_success() {
        return res.json().await.map_err(Into::into);
    }

    let text = res.text().await?;

    // Proxies in front of the API server don't always answer with a Status.
    let status = serde_json::from_str::<Status>(&text).unwrap_or_else(|_| Status {
        code: code.as_u16(),
        message: Some(text),
        reason: None,
    });

    Err(crate::Error::from_status(code.as_u16(), status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_status() {
        let status: Status = serde_json::from_value(json!({
            "kind": "Status",
            "apiVersion": "v1",
            "status": "Failure",
            "message": "persistentvolumeclaims \"claim-alice\" already exists",
            "reason": "AlreadyExists",
            "details": { "name": "claim-alice", "kind": "persistentvolumeclaims" },
            "code": 409
        }))
        .unwrap();

        assert_eq!(status.code, 409);
        assert_eq!(status.reason, Some(StatusReason::AlreadyExists));
        assert_eq!(
            status.to_string(),
            "409 AlreadyExists: persistentvolumeclaims \"claim-alice\" already exists"
        );
    }

    #[test]
    fn unknown_reason() {
        let status: Status = serde_json::from_value(json!({
            "code": 500,
            "reason": "InternalError"
        }))
        .unwrap();

        assert_eq!(status.reason, Some(StatusReason::Unknown));
    }
}
