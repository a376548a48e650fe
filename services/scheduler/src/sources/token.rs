//! Bonding-curve token candidates.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use postgres_models::models::{Category, TrackedToken};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::config::SchedulerConfig;
use crate::errors::SourceError;
use crate::scheduler::candidate::{CandidateEvent, CandidatePayload, CandidateSource, TokenPayload};
use crate::store::{CooldownStore, PublishedRecordStore, TokenSnapshotStore};

/// Raw metrics a snapshot provides for one token.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetrics {
    /// Bonding curve completion, 0..100.
    pub progress: f64,
    /// Recent whale inflows, expected in 0..10.
    pub whale_inflows: f64,
    pub hype: f64,
    pub volume_change: f64,
    pub rug_risk: f64,
}

/// One entry of a snapshot refresh.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSnapshot {
    pub address: String,
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(flatten)]
    pub metrics: TokenMetrics,
}

impl TokenSnapshot {
    pub fn into_tracked(self, now: DateTime<Utc>) -> TrackedToken {
        TrackedToken {
            score: composite_score(&self.metrics),
            address: self.address,
            name: self.name,
            symbol: self.symbol,
            progress: self.metrics.progress,
            whale_inflows: self.metrics.whale_inflows,
            hype: self.metrics.hype,
            volume_change: self.metrics.volume_change,
            rug_risk: self.metrics.rug_risk,
            image_url: self.image_url,
            updated_at: now,
        }
    }
}

/// Scales `value` from `[min, max]` onto 0..100.
pub fn normalize(value: f64, min: f64, max: f64) -> f64 {
    if max <= min {
        return 0.0;
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0) * 100.0
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn composite_score(m: &TokenMetrics) -> f64 {
    let raw = 0.4 * m.progress + 0.3 * normalize(m.whale_inflows, 0.0, 10.0) + 0.2 * m.hype
        + 0.1 * m.volume_change.clamp(0.0, 100.0)
        - 0.1 * (100.0 - m.rug_risk);

    round2(raw.clamp(0.0, 100.0))
}

/// `address:generation`, where generation counts earlier publications so a
/// token may be posted again once its cooldown has passed.
pub fn natural_key(address: &str, generation: i32) -> String {
    format!("{address}:{generation}")
}

pub struct TokenSource {
    tokens: Arc<dyn TokenSnapshotStore>,
    cooldowns: Arc<dyn CooldownStore>,
    records: Arc<dyn PublishedRecordStore>,
    min_progress: f64,
    min_score: f64,
    snapshot_max_age: Duration,
    repost_cooldown: Duration,
    claim_ttl: Duration,
}

impl TokenSource {
    pub fn new(
        tokens: Arc<dyn TokenSnapshotStore>,
        cooldowns: Arc<dyn CooldownStore>,
        records: Arc<dyn PublishedRecordStore>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            tokens,
            cooldowns,
            records,
            min_progress: config.token_min_progress,
            min_score: config.token_min_score,
            snapshot_max_age: config.token_snapshot_max_age,
            repost_cooldown: config.token_repost_cooldown,
            claim_ttl: config.claim_ttl,
        }
    }
}

#[async_trait]
impl CandidateSource for TokenSource {
    fn category(&self) -> Category {
        Category::Token
    }

    async fn next_candidate(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<CandidateEvent>, SourceError> {
        let mut tokens = self
            .tokens
            .qualifying_tokens(self.min_progress, self.min_score, now - self.snapshot_max_age)
            .await?;
        if tokens.is_empty() {
            return Ok(None);
        }
        tokens.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.progress.total_cmp(&a.progress))
        });

        let addresses: Vec<String> = tokens.iter().map(|t| t.address.clone()).collect();
        let cooldowns = self.cooldowns.cooldowns(&addresses).await?;

        let eligible: Vec<(TrackedToken, i32)> = tokens
            .into_iter()
            .filter_map(|token| match cooldowns.get(&token.address) {
                Some(c) if now - c.last_published_at < self.repost_cooldown => {
                    debug!(address = %token.address, "token still cooling down");
                    None
                }
                Some(c) => Some((token, c.publish_count)),
                None => Some((token, 0)),
            })
            .collect();
        if eligible.is_empty() {
            return Ok(None);
        }

        let keys: Vec<String> = eligible
            .iter()
            .map(|(token, generation)| natural_key(&token.address, *generation))
            .collect();
        let blocked = self
            .records
            .blocked_keys(Category::Token, &keys, now - self.claim_ttl)
            .await?;

        Ok(eligible
            .into_iter()
            .zip(keys)
            .find(|(_, key)| !blocked.contains(key))
            .map(|((token, generation), key)| CandidateEvent {
                category: Category::Token,
                natural_key: key,
                priority: token.score,
                observed_at: token.updated_at,
                expires_at: Some(token.updated_at + self.snapshot_max_age),
                bypass_category_cap: false,
                payload: CandidatePayload::Token(TokenPayload {
                    address: token.address,
                    name: token.name,
                    symbol: token.symbol,
                    score: token.score,
                    progress: token.progress,
                    generation,
                    image_url: token.image_url,
                }),
            }))
    }
}
