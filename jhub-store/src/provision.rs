//! Create storage for a user.
use kubeclaim::ClaimApi;
use tracing::{debug, info, instrument};

use crate::{identity::UserIdentity, Context};

/// Submit a claim for `user` rendered from the configured template.
///
/// Does not wait for the claim to be bound. If a claim with the same name
/// already exists (typically because a concurrent login got there first) the
/// call succeeds without doing anything.
///
/// # Errors
///
/// [`crate::errors::Error::OrchestratorUnavailable`] for every other client
/// error.
#[instrument(skip(ctx), fields(user = %user))]
pub async fn provision(ctx: &Context<impl ClaimApi>, user: &UserIdentity) -> crate::Result<()> {
    let config = ctx.config();
    let claim = config.claim.render(&config.namespace, user);

    match ctx.api().create_claim(&config.namespace, &claim).await {
        Ok(created) => {
            info!(
                "created claim {} in `{}`",
                created.name().or(claim.name()).unwrap_or_default(),
                config.namespace
            );
            Ok(())
        }
        Err(kubeclaim::Error::AlreadyExists) => {
            debug!("claim {:?} already exists", claim.name());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
