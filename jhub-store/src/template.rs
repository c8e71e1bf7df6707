//! The claim template used when a user has no storage yet.
use std::collections::BTreeMap;

use kubeclaim::{
    claim::{ObjectMeta, RESOURCE_STORAGE},
    AccessMode, PersistentVolumeClaim,
};
use serde::{Deserialize, Serialize};

use crate::identity::UserIdentity;

/// Annotation JupyterHub's KubeSpawner puts on user claims.
pub const USERNAME_ANNOTATION: &str = "hub.jupyter.org/username";

/// Everything about a user claim that doesn't depend on the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimTemplate {
    /// Claim names are `<name_prefix>-<username>`.
    pub name_prefix: String,
    /// Annotation holding the owning username.
    pub identity_annotation: String,
    /// Labels tying the claim to the hub's Helm release.
    pub labels: BTreeMap<String, String>,
    /// Storage request, e.g. `1Gi`.
    pub storage_request: String,
    /// Access mode.
    pub access_mode: AccessMode,
    /// Storage class to provision from.
    pub storage_class: String,
}

impl Default for ClaimTemplate {
    fn default() -> Self {
        let labels = [
            ("app", "jupyterhub"),
            ("chart", "jupyterhub-0.7.0"),
            ("component", "singleuser-storage"),
            ("heritage", "jupyterhub"),
            ("release", "jhub"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();

        Self {
            name_prefix: "claim".into(),
            identity_annotation: USERNAME_ANNOTATION.into(),
            labels,
            storage_request: "1Gi".into(),
            access_mode: AccessMode::ReadWriteOnce,
            storage_class: "managed-nfs-storage".into(),
        }
    }
}

impl ClaimTemplate {
    /// Name of the claim belonging to `user`.
    #[must_use]
    pub fn claim_name(&self, user: &UserIdentity) -> String {
        format!("{}-{}", self.name_prefix, user)
    }

    /// Render the claim for `user` in `namespace`.
    #[must_use]
    pub fn render(&self, namespace: &str, user: &UserIdentity) -> PersistentVolumeClaim {
        let mut claim = PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some(self.claim_name(user)),
                namespace: Some(namespace.to_owned()),
                annotations: BTreeMap::from([(
                    self.identity_annotation.clone(),
                    user.to_string(),
                )]),
                labels: self.labels.clone(),
                uid: None,
            },
            ..PersistentVolumeClaim::default()
        };

        claim.spec.access_modes = vec![self.access_mode];
        claim
            .spec
            .resources
            .requests
            .insert(RESOURCE_STORAGE.into(), self.storage_request.clone());
        claim.spec.storage_class_name = Some(self.storage_class.clone());

        claim
    }
}

/// Parse `key=value` pairs separated by commas, e.g.
/// `app=jupyterhub,release=jhub`.
///
/// # Errors
///
/// Returns the offending pair if it lacks a `=` or has an empty key.
pub fn parse_labels(s: &str) -> Result<BTreeMap<String, String>, String> {
    s.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_owned(), v.trim().to_owned())),
            _ => Err(pair.to_owned()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_default_template() {
        let user: UserIdentity = "Alice".parse().unwrap();
        let claim = ClaimTemplate::default().render("jhub", &user);

        assert_eq!(claim.name(), Some("claim-alice"));
        assert_eq!(claim.metadata.namespace.as_deref(), Some("jhub"));
        assert_eq!(claim.annotation(USERNAME_ANNOTATION), Some("alice"));
        assert_eq!(claim.metadata.labels["component"], "singleuser-storage");
        assert_eq!(claim.metadata.labels.len(), 5);
        assert_eq!(claim.storage_request(), Some("1Gi"));
        assert_eq!(claim.spec.access_modes, vec![AccessMode::ReadWriteOnce]);
        assert_eq!(
            claim.spec.storage_class_name.as_deref(),
            Some("managed-nfs-storage")
        );
        assert_eq!(claim.volume_name(), None);
        assert!(claim.status.is_none());
    }

    #[test]
    fn labels() {
        let labels = parse_labels("app=jupyterhub, release = jhub,").unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels["release"], "jhub");

        assert!(parse_labels("").unwrap().is_empty());
        assert_eq!(parse_labels("app"), Err("app".to_owned()));
        assert_eq!(parse_labels("=x"), Err("=x".to_owned()));
    }
}
