//! User identities.

use std::str::FromStr;

use derive_more::{AsRef, Deref, Display};
use serde::Serialize;

/// A JupyterHub username, normalized to lowercase.
///
/// Claim names must be valid DNS subdomain names, so `Alice` and `alice`
/// are the same user as far as storage is concerned.
///
/// ```
/// use jhub_store::identity::UserIdentity;
///
/// let id: UserIdentity = " Alice ".parse().unwrap();
/// assert_eq!(id.as_str(), "alice");
///
/// assert!("".parse::<UserIdentity>().is_err());
/// assert!("../etc".parse::<UserIdentity>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Deref, AsRef, Serialize)]
pub struct UserIdentity(String);

impl UserIdentity {
    /// The normalized username.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for UserIdentity {
    type Err = ParseIdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if s.is_empty() {
            return Err(ParseIdentityError::Empty);
        }

        for c in s.chars() {
            if c == '/' || c == '\\' || c.is_control() {
                return Err(ParseIdentityError::IllegalChar(c));
            }
        }

        if s == "." || s == ".." {
            return Err(ParseIdentityError::Reserved);
        }

        Ok(Self(s.to_lowercase()))
    }
}

/// Identity parse errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseIdentityError {
    /// Nothing (or only whitespace) was supplied.
    #[error("username is empty")]
    Empty,

    /// Path separators and control characters end up in claim names and
    /// mount paths, so they are rejected.
    #[error("invalid character in username: {0:?}")]
    IllegalChar(char),

    /// `.` and `..` are not usernames.
    #[error("reserved username")]
    Reserved,
}
