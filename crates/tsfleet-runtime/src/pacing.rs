//! Pacing policy between successive store mutations.

use std::time::Duration;

use async_trait::async_trait;

/// Injectable pause applied between drops and between creations.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self);
}

/// Fixed delay between calls, bounding the request rate against the store.
pub struct FixedDelayPacer {
    delay: Duration,
}

impl FixedDelayPacer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }
}

#[async_trait]
impl Pacer for FixedDelayPacer {
    async fn pause(&self) {
        tokio::time::sleep(self.delay).await;
    }
}

/// No pacing. Tests run with this so batches finish immediately.
pub struct NoopPacer;

#[async_trait]
impl Pacer for NoopPacer {
    async fn pause(&self) {}
}
