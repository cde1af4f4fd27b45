//! Runtime abstraction for time.
//!
//! Polling sleeps and reads the clock through this trait so tests can drive
//! it without wall-clock delay.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Runtime: Send + Sync {
    async fn sleep(&self, duration: Duration);
    fn now(&self) -> Instant;
}

/// Runtime backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealRuntime;

#[async_trait]
impl Runtime for RealRuntime {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}
