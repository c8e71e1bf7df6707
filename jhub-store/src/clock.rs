//! Waiting between login attempts.
//!
//! The polling loop never calls a timer directly; it goes through a
//! [`Sleeper`] so tests can observe (and skip) the waits.
use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;

/// Something that can wait.
#[async_trait]
pub trait Sleeper: Send + Sync + Debug {
    /// Suspend the calling task for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
