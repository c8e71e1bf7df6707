//! The core/v1 `PersistentVolumeClaim` resource, trimmed down to the fields
//! a provisioner reads or writes.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::serde::{EmptyAsNone, NullAsDefault};

/// Resource key for storage requests.
pub const RESOURCE_STORAGE: &str = "storage";

/// How a volume may be mounted.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum AccessMode {
    /// Read-write by a single node.
    ReadWriteOnce,
    /// Read-only by many nodes.
    ReadOnlyMany,
    /// Read-write by many nodes.
    ReadWriteMany,
    /// Read-write by a single pod.
    ReadWriteOncePod,
}

/// Lifecycle phase reported in the claim status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimPhase {
    /// Not yet bound to a volume.
    Pending,
    /// Bound to a volume.
    Bound,
    /// The bound volume disappeared.
    Lost,
}

/// Object metadata.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Object name, unique per namespace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Namespace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Free-form annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    #[serde_as(as = "NullAsDefault")]
    pub annotations: BTreeMap<String, String>,

    /// Labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    #[serde_as(as = "NullAsDefault")]
    pub labels: BTreeMap<String, String>,

    /// Server-assigned uid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

/// Minimum resources requested by a claim.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    /// Resource name to quantity, e.g. `storage: 1Gi`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    #[serde_as(as = "NullAsDefault")]
    pub requests: BTreeMap<String, String>,
}

/// Desired state of a claim.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSpec {
    /// Requested access modes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[serde_as(as = "NullAsDefault")]
    pub access_modes: Vec<AccessMode>,

    /// Requested resources.
    #[serde(default)]
    pub resources: ResourceRequirements,

    /// Storage class to provision from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,

    /// Name of the bound volume. `None` until the cluster binds the claim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde_as(as = "EmptyAsNone")]
    pub volume_name: Option<String>,
}

/// Observed state of a claim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimStatus {
    /// Current phase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<ClaimPhase>,
}

/// A `PersistentVolumeClaim`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeClaim {
    /// Always `v1`.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Always `PersistentVolumeClaim`.
    #[serde(default = "default_kind")]
    pub kind: String,

    /// Metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Desired state.
    #[serde(default)]
    pub spec: ClaimSpec,

    /// Observed state. Never sent on create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ClaimStatus>,
}

fn default_api_version() -> String {
    "v1".into()
}

fn default_kind() -> String {
    "PersistentVolumeClaim".into()
}

impl Default for PersistentVolumeClaim {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: ObjectMeta::default(),
            spec: ClaimSpec::default(),
            status: None,
        }
    }
}

impl PersistentVolumeClaim {
    /// Name of the claim, if set.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.metadata.name.as_deref()
    }

    /// Look up an annotation.
    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata.annotations.get(key).map(String::as_str)
    }

    /// Name of the bound volume, or `None` if the claim is still unbound.
    #[must_use]
    pub fn volume_name(&self) -> Option<&str> {
        self.spec
            .volume_name
            .as_deref()
            .filter(|name| !name.is_empty())
    }

    /// The requested storage quantity, e.g. `1Gi`.
    #[must_use]
    pub fn storage_request(&self) -> Option<&str> {
        self.spec
            .resources
            .requests
            .get(RESOURCE_STORAGE)
            .map(String::as_str)
    }
}

/// Response body of a list request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClaimList {
    /// Claims in the namespace.
    #[serde(default)]
    pub items: Vec<PersistentVolumeClaim>,
}
