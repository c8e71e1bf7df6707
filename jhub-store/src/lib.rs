#![doc = include_str!("../README.md")]
#![warn(
    unreachable_pub,
    missing_debug_implementations,
    missing_docs,
    clippy::pedantic
)]

use std::sync::Arc;

pub mod clock;
pub mod config;
pub mod copy;
pub mod errors;
pub mod files;
pub mod identity;
pub mod login;
pub mod path;
pub mod provision;
pub mod resolve;
pub mod session;
pub mod template;

/// Result type used by the store operations.
pub type Result<T> = core::result::Result<T, errors::Error>;

pub use config::Config;
pub use kubeclaim;
use kubeclaim::ClaimApi;

use clock::{Sleeper, TokioSleeper};
use copy::Copier;

/// The context is used for all store operations. It is meant to be created
/// once per process and shared (by reference or in an `Arc`) between
/// requests.
#[derive(Debug)]
pub struct Context<C: ClaimApi> {
    api: C,
    config: Config,
    sleeper: Arc<dyn Sleeper>,
    copier: Copier,
}

impl<C: ClaimApi> Context<C> {
    /// Create a new context. Nothing is contacted until the first login.
    #[must_use]
    pub fn new(api: C, config: Config) -> Self {
        let copier = Copier::new(config.copy_workers);

        Self {
            api,
            config,
            sleeper: Arc::new(TokioSleeper),
            copier,
        }
    }

    /// Replace the sleeper used between login attempts.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// The orchestrator client.
    pub fn api(&self) -> &C {
        &self.api
    }

    /// The configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The copy worker pool.
    pub fn copier(&self) -> &Copier {
        &self.copier
    }
}
