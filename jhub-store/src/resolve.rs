//! Find the volume belonging to a user.
use kubeclaim::ClaimApi;
use tracing::{debug, instrument};

use crate::{identity::UserIdentity, session::ResolvedVolume, Context};

/// Look up the bound volume of `user`.
///
/// The first claim in the namespace annotated with the username decides the
/// outcome. If that claim is not bound yet, `Ok(None)` is returned, the same
/// as if there were no claim at all: binding happens asynchronously and the
/// caller is expected to ask again.
///
/// # Errors
///
/// [`crate::errors::Error::OrchestratorUnavailable`] if the claims cannot be
/// listed.
#[instrument(skip(ctx), fields(user = %user))]
pub async fn resolve(
    ctx: &Context<impl ClaimApi>,
    user: &UserIdentity,
) -> crate::Result<Option<ResolvedVolume>> {
    let config = ctx.config();
    let claims = ctx.api().list_claims(&config.namespace).await?;

    let Some(claim) = claims
        .iter()
        .find(|c| c.annotation(&config.claim.identity_annotation) == Some(user.as_str()))
    else {
        debug!("no claim among {} in `{}`", claims.len(), config.namespace);
        return Ok(None);
    };

    let Some(volume_name) = claim.volume_name() else {
        debug!("claim {:?} is not bound yet", claim.name());
        return Ok(None);
    };

    let volume = ResolvedVolume::new(
        &config.mount_root,
        &config.volume_dir_prefix,
        user,
        volume_name,
    );

    debug!("resolved to {}", volume.path().display());

    Ok(Some(volume))
}
