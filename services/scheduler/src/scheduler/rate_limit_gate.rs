use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::errors::StoreError;
use crate::store::RateLimitStore;

/// Durable backoff shared by every invocation. A value, not a lock: the last
/// writer wins.
#[derive(Clone)]
pub struct RateLimitGate {
    store: Arc<dyn RateLimitStore>,
    fallback: Duration,
}

impl RateLimitGate {
    pub fn new(store: Arc<dyn RateLimitStore>, fallback: Duration) -> Self {
        Self { store, fallback }
    }

    /// The stored resume time, if it is still in the future.
    pub async fn blocked_until(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, StoreError> {
        let resume_at = self.store.resume_at().await?;
        Ok(resume_at.filter(|resume_at| now < *resume_at))
    }

    /// Blocks publishing until `resume_at`, or for the fallback window when the
    /// platform gave no usable reset time. Returns the stored resume time.
    pub async fn block(
        &self,
        resume_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, StoreError> {
        let resume_at = resume_at
            .filter(|resume_at| *resume_at > now)
            .unwrap_or(now + self.fallback);

        self.store.set_resume_at(Some(resume_at), now).await?;
        warn!(%resume_at, "platform throttled publishing");
        Ok(resume_at)
    }

    pub async fn clear(&self, now: DateTime<Utc>) -> Result<(), StoreError> {
        if self.store.resume_at().await?.is_some() {
            self.store.set_resume_at(None, now).await?;
            info!("rate limit gate cleared");
        }
        Ok(())
    }
}
