//! Logging in: resolve the user's volume, provisioning it on first contact.
//!
//! ```text
//! START ─▶ RESOLVING ─▶ FOUND
//!              │  ▲
//!   not found  │  │ backoff
//!              ▼  │
//!         PROVISIONING (once) ─ ─ ─▶ EXHAUSTED (bounded policy only)
//! ```
use std::time::Duration;

use kubeclaim::ClaimApi;
use tracing::{debug, info, instrument, warn};

use crate::{
    errors::Error, identity::UserIdentity, provision::provision, resolve::resolve,
    session::Session, Context,
};

/// How long a login keeps polling for the claim to be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: Option<u32>,
    backoff: Duration,
}

impl RetryPolicy {
    /// Give up after `attempts` resolve attempts.
    #[must_use]
    pub fn bounded(attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: Some(attempts),
            backoff,
        }
    }

    /// Poll until the claim is bound. Callers that need a deadline should
    /// wrap the login in `tokio::time::timeout`.
    #[must_use]
    pub fn unbounded(backoff: Duration) -> Self {
        Self {
            max_attempts: None,
            backoff,
        }
    }

    /// Attempt ceiling, or `None` if unbounded.
    #[must_use]
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Pause between attempts.
    #[must_use]
    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Whether another attempt may follow attempt number `made` (1-based).
    fn allows_after(&self, made: u32) -> bool {
        self.max_attempts.map_or(true, |max| made < max)
    }
}

/// Log in the user named by `identity`.
///
/// `wait` selects the retry policy from the configuration: without it the
/// login fails after [`crate::config::RetryConfig::attempts`] attempts,
/// with it the login polls until the volume is bound.
///
/// # Errors
///
/// - [`Error::MissingIdentity`] / [`Error::InvalidIdentity`]: unusable identity
/// - [`Error::OrchestratorUnavailable`]: the cluster could not be asked
/// - [`Error::ProvisionExhausted`]: the claim was not bound in time
pub async fn login(
    ctx: &Context<impl ClaimApi>,
    identity: Option<&str>,
    wait: bool,
) -> crate::Result<Session> {
    debug!("wait set to {}", wait);

    let user: UserIdentity = identity.ok_or(Error::MissingIdentity)?.parse()?;
    let policy = ctx.config().retry.policy(wait);

    login_with_policy(ctx, user, policy).await
}

/// Like [`login`], with an already parsed identity and an explicit policy.
///
/// # Errors
///
/// See [`login`].
#[instrument(skip(ctx, policy), fields(user = %user))]
pub async fn login_with_policy(
    ctx: &Context<impl ClaimApi>,
    user: UserIdentity,
    policy: RetryPolicy,
) -> crate::Result<Session> {
    let mut attempts: u32 = 0;
    let mut provisioned = false;

    loop {
        attempts = attempts.saturating_add(1);

        if let Some(volume) = resolve(ctx, &user).await? {
            let session = Session::new(user, volume);

            info!(
                session = %session.pseudonym(),
                "logged in after {} attempt(s), volume at {}",
                attempts,
                session.volume().path().display()
            );

            return Ok(session);
        }

        if !provisioned {
            provision(ctx, &user).await?;
            provisioned = true;
        }

        if !policy.allows_after(attempts) {
            warn!("no volume bound after {} attempts", attempts);
            return Err(Error::ProvisionExhausted { attempts });
        }

        debug!("attempt {} found no bound volume, retrying", attempts);

        ctx.sleeper.sleep(policy.backoff()).await;
    }
}
