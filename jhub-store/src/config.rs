//! Deployment configuration.
//!
//! Every value has a default matching a stock Zero-to-JupyterHub install
//! with an NFS client provisioner, so an empty environment yields a usable
//! [`Config`]. Overrides come from `JHUB_*` variables (see
//! [`Config::from_env`]) or a TOML file (see [`Config::from_file`]).
use std::{
    fmt::Display,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use kubeclaim::AccessMode;
use serde::{Deserialize, Serialize};

use crate::{
    login::RetryPolicy,
    template::{parse_labels, ClaimTemplate},
};

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable was set but could not be parsed.
    #[error("`{key}` was defined but could not be parsed: {message}")]
    Parse {
        /// Variable name.
        key: &'static str,
        /// Parser message.
        message: String,
    },

    /// The config file could not be read.
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML or has the wrong shape.
    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value parsed fine but makes no sense.
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Login polling settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Resolve attempts before a non-waiting login gives up.
    pub attempts: u32,
    /// Pause between attempts, in milliseconds.
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 4,
            backoff_ms: 50,
        }
    }
}

impl RetryConfig {
    /// The policy for a login with the given wait flag: bounded unless the
    /// caller asked to wait.
    #[must_use]
    pub fn policy(&self, wait: bool) -> RetryPolicy {
        let backoff = Duration::from_millis(self.backoff_ms);

        if wait {
            RetryPolicy::unbounded(backoff)
        } else {
            RetryPolicy::bounded(self.attempts, backoff)
        }
    }
}

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Namespace the hub's claims live in.
    pub namespace: String,
    /// Host directory under which bound volumes are mounted.
    pub mount_root: PathBuf,
    /// Volume directories are named `<prefix>-<username>-<volume name>`.
    pub volume_dir_prefix: String,
    /// Template for new claims.
    pub claim: ClaimTemplate,
    /// Login polling.
    pub retry: RetryConfig,
    /// Maximum number of concurrent copy transfers.
    pub copy_workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: "jhub".into(),
            mount_root: "/mnt/nfs/nfs-test".into(),
            volume_dir_prefix: "jhub-claim".into(),
            claim: ClaimTemplate::default(),
            retry: RetryConfig::default(),
            copy_workers: 4,
        }
    }
}

impl Config {
    /// Defaults, overridden by whichever of these variables are set:
    ///
    /// | variable | field |
    /// |---|---|
    /// | `JHUB_NAMESPACE` | `namespace` |
    /// | `JHUB_MOUNT_ROOT` | `mount_root` |
    /// | `JHUB_VOLUME_PREFIX` | `volume_dir_prefix` |
    /// | `JHUB_CLAIM_PREFIX` | `claim.name_prefix` |
    /// | `JHUB_IDENTITY_ANNOTATION` | `claim.identity_annotation` |
    /// | `JHUB_CLAIM_LABELS` | `claim.labels` (`k=v,k=v`) |
    /// | `JHUB_STORAGE_REQUEST` | `claim.storage_request` |
    /// | `JHUB_ACCESS_MODE` | `claim.access_mode` |
    /// | `JHUB_STORAGE_CLASS` | `claim.storage_class` |
    /// | `JHUB_LOGIN_ATTEMPTS` | `retry.attempts` |
    /// | `JHUB_LOGIN_BACKOFF_MS` | `retry.backoff_ms` |
    /// | `JHUB_COPY_WORKERS` | `copy_workers` |
    ///
    /// A `.env` file in the working directory is honoured.
    ///
    /// # Errors
    ///
    /// If a variable is set but cannot be parsed, or the result fails
    /// validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        override_with(&mut config.namespace, "JHUB_NAMESPACE")?;
        override_with(&mut config.mount_root, "JHUB_MOUNT_ROOT")?;
        override_with(&mut config.volume_dir_prefix, "JHUB_VOLUME_PREFIX")?;
        override_with(&mut config.claim.name_prefix, "JHUB_CLAIM_PREFIX")?;
        override_with(
            &mut config.claim.identity_annotation,
            "JHUB_IDENTITY_ANNOTATION",
        )?;
        override_with(&mut config.claim.storage_request, "JHUB_STORAGE_REQUEST")?;
        override_with::<AccessMode>(&mut config.claim.access_mode, "JHUB_ACCESS_MODE")?;
        override_with(&mut config.claim.storage_class, "JHUB_STORAGE_CLASS")?;
        override_with(&mut config.retry.attempts, "JHUB_LOGIN_ATTEMPTS")?;
        override_with(&mut config.retry.backoff_ms, "JHUB_LOGIN_BACKOFF_MS")?;
        override_with(&mut config.copy_workers, "JHUB_COPY_WORKERS")?;

        if let Some(labels) = env_opt::<String>("JHUB_CLAIM_LABELS")? {
            config.claim.labels = parse_labels(&labels).map_err(|pair| ConfigError::Parse {
                key: "JHUB_CLAIM_LABELS",
                message: format!("expected `key=value`, got `{pair}`"),
            })?;
        }

        config.validate()
    }

    /// Parse a TOML document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Malformed TOML, or a result that fails validation.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;

        config.validate()
    }

    /// Read and parse a TOML file.
    ///
    /// # Errors
    ///
    /// See [`Config::from_toml_str`]; additionally fails if the file cannot
    /// be read.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path)?;

        Self::from_toml_str(&s)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.namespace.is_empty() {
            return Err(ConfigError::Invalid("namespace must not be empty"));
        }

        if self.retry.attempts == 0 {
            return Err(ConfigError::Invalid("retry.attempts must be at least 1"));
        }

        if self.copy_workers == 0 {
            return Err(ConfigError::Invalid("copy_workers must be at least 1"));
        }

        Ok(self)
    }
}

/// Get an environment variable, or `None` if it isn't set.
///
/// # Errors
///
/// If the variable exists but cannot be parsed.
pub fn env_opt<T>(key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    <T as FromStr>::Err: Display,
{
    match dotenv::var(key) {
        Ok(s) => s.parse::<T>().map(Some).map_err(|e| ConfigError::Parse {
            key,
            message: e.to_string(),
        }),
        Err(_) => Ok(None),
    }
}

fn override_with<T>(field: &mut T, key: &'static str) -> Result<(), ConfigError>
where
    T: FromStr,
    <T as FromStr>::Err: Display,
{
    if let Some(value) = env_opt(key)? {
        *field = value;
    }

    Ok(())
}
