use chrono::{DateTime, Duration, Utc};
use postgres_models::models::{Category, NewClaim, RecordStatus, TokenCooldown};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use super::candidate::{CandidateEvent, CandidatePayload};
use super::rate_limit_gate::RateLimitGate;
use super::render::{render, OutboundPost};
use crate::adapters::{MirrorChannel, PlatformAdapter, PostResult};
use crate::clock::Clock;
use crate::config::SchedulerConfig;
use crate::errors::StoreError;
use crate::store::{CooldownStore, PublishedRecordStore};

const MARK_PUBLISHED_ATTEMPTS: u32 = 3;
const MARK_PUBLISHED_BACKOFF: std::time::Duration = std::time::Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct PublisherSettings {
    pub claim_ttl: Duration,
    pub max_attempts: i32,
    pub platform_timeout: std::time::Duration,
    pub max_chars: usize,
}

impl From<&SchedulerConfig> for PublisherSettings {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            claim_ttl: config.claim_ttl,
            max_attempts: config.publish_max_attempts,
            platform_timeout: config.platform_timeout,
            max_chars: config.post_max_chars,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Published {
        post_id: String,
        /// `None` when the category is not mirrored or no mirror is configured.
        mirrored: Option<bool>,
    },
    Throttled {
        resume_at: DateTime<Utc>,
    },
    /// Another invocation holds or has completed this natural key.
    AlreadyPublished,
    /// The candidate aged out between selection and publishing.
    Stale,
    Failed {
        error: String,
        abandoned: bool,
    },
}

pub struct Publisher {
    platform: Arc<dyn PlatformAdapter>,
    mirror: Option<Arc<dyn MirrorChannel>>,
    records: Arc<dyn PublishedRecordStore>,
    cooldowns: Arc<dyn CooldownStore>,
    gate: RateLimitGate,
    clock: Arc<dyn Clock>,
    settings: PublisherSettings,
}

impl Publisher {
    pub fn new(
        platform: Arc<dyn PlatformAdapter>,
        mirror: Option<Arc<dyn MirrorChannel>>,
        records: Arc<dyn PublishedRecordStore>,
        cooldowns: Arc<dyn CooldownStore>,
        gate: RateLimitGate,
        clock: Arc<dyn Clock>,
        settings: PublisherSettings,
    ) -> Self {
        Self {
            platform,
            mirror,
            records,
            cooldowns,
            gate,
            clock,
            settings,
        }
    }

    /// Claims, posts and records one candidate. Only errors that leave the
    /// store unreachable are returned as `Err`.
    #[instrument(skip(self, candidate), fields(category = %candidate.category, natural_key = %candidate.natural_key))]
    pub async fn publish(&self, candidate: &CandidateEvent) -> Result<PublishOutcome, StoreError> {
        let now = self.clock.now();
        if !candidate.is_fresh(now) {
            info!("candidate went stale before publishing");
            return Ok(PublishOutcome::Stale);
        }

        let post = render(candidate, self.settings.max_chars);
        let claim = NewClaim::new(
            candidate.category,
            candidate.natural_key.clone(),
            candidate.observed_at,
            Some(post.text.clone()),
            now,
        );

        let record = match self.records.claim(&claim, now - self.settings.claim_ttl).await {
            Ok(Some(record)) => record,
            Ok(None) | Err(StoreError::Conflict(_)) => {
                info!("natural key already claimed by another cycle");
                return Ok(PublishOutcome::AlreadyPublished);
            }
            Err(e) => return Err(e),
        };

        // From here on the post may exist, so the row must never be reclaimed.
        if !self.records.mark_posting(record.id, self.clock.now()).await? {
            info!("claim lost before posting");
            return Ok(PublishOutcome::AlreadyPublished);
        }

        let result = match tokio::time::timeout(
            self.settings.platform_timeout,
            self.platform.post_content(&post),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => PostResult::Failed {
                reason: format!(
                    "platform call timed out after {:?}",
                    self.settings.platform_timeout
                ),
            },
        };
        let finished_at = self.clock.now();

        match result {
            PostResult::Posted { id } => {
                self.record_published(record.id, &id, finished_at).await;
                if let Err(e) = self.gate.clear(finished_at).await {
                    warn!(error = %e, "failed to clear rate limit gate");
                }
                if let CandidatePayload::Token(token) = &candidate.payload {
                    let cooldown = TokenCooldown {
                        address: token.address.clone(),
                        last_published_at: finished_at,
                        publish_count: token.generation + 1,
                    };
                    if let Err(e) = self.cooldowns.record_publish(&cooldown).await {
                        warn!(error = %e, "failed to record token cooldown");
                    }
                }

                let mirrored = self.mirror(candidate.category, &post).await;
                info!(post_id = %id, ?mirrored, "alert published");
                Ok(PublishOutcome::Published { post_id: id, mirrored })
            }
            PostResult::RateLimited { reset_at } => {
                let resume_at = self.gate.block(reset_at, finished_at).await?;
                self.records.release(record.id, finished_at).await?;
                Ok(PublishOutcome::Throttled { resume_at })
            }
            PostResult::Failed { reason } => {
                error!(error = %reason, "publish attempt failed");
                let status = self
                    .records
                    .mark_failed(record.id, &reason, finished_at, self.settings.max_attempts)
                    .await?;
                let abandoned = status == RecordStatus::Abandoned;
                if abandoned {
                    warn!(
                        attempts = self.settings.max_attempts,
                        "giving up on natural key after repeated failures"
                    );
                }
                Ok(PublishOutcome::Failed {
                    error: reason,
                    abandoned,
                })
            }
        }
    }

    /// Confirms a successful post, retrying a few times. If every attempt
    /// fails the row stays `posting`, which still blocks the key and counts
    /// toward the caps.
    async fn record_published(&self, record_id: uuid::Uuid, post_id: &str, at: DateTime<Utc>) {
        for attempt in 1..=MARK_PUBLISHED_ATTEMPTS {
            match self.records.mark_published(record_id, post_id, at).await {
                Ok(()) => return,
                Err(e) if attempt < MARK_PUBLISHED_ATTEMPTS => {
                    warn!(error = %e, attempt, post_id, "failed to record publication, retrying");
                    tokio::time::sleep(MARK_PUBLISHED_BACKOFF).await;
                }
                Err(e) => {
                    error!(error = %e, post_id, "posted but failed to record publication");
                }
            }
        }
    }

    async fn mirror(&self, category: Category, post: &OutboundPost) -> Option<bool> {
        if !matches!(category, Category::Whale | Category::News) {
            return None;
        }
        let mirror = self.mirror.as_ref()?;

        match mirror.mirror(category, post).await {
            Ok(()) => Some(true),
            Err(e) => {
                warn!(error = %e, "mirror channel failed");
                Some(false)
            }
        }
    }
}
