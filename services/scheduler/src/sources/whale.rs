use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use postgres_models::models::{Category, NewWhaleEvent, WhaleEvent};
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::errors::SourceError;
use crate::scheduler::candidate::{CandidateEvent, CandidatePayload, CandidateSource, WhalePayload};
use crate::store::{PublishedRecordStore, WhaleEventStore};

/// Keeps transfers worth storing: at or above `min_usd`, with a hash, once
/// per hash.
pub fn detect(transfers: impl IntoIterator<Item = NewWhaleEvent>, min_usd: f64) -> Vec<NewWhaleEvent> {
    let mut seen = HashSet::new();
    transfers
        .into_iter()
        .filter(|t| !t.tx_hash.is_empty() && t.amount_usd >= min_usd)
        .filter(|t| seen.insert(t.tx_hash.clone()))
        .collect()
}

pub struct WhaleSource {
    events: Arc<dyn WhaleEventStore>,
    records: Arc<dyn PublishedRecordStore>,
    lookback: Duration,
    post_min_usd: f64,
    claim_ttl: Duration,
}

impl WhaleSource {
    pub fn new(
        events: Arc<dyn WhaleEventStore>,
        records: Arc<dyn PublishedRecordStore>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            events,
            records,
            lookback: config.whale_lookback,
            post_min_usd: config.whale_post_min_usd,
            claim_ttl: config.claim_ttl,
        }
    }

    fn to_candidate(&self, event: WhaleEvent) -> CandidateEvent {
        CandidateEvent {
            category: Category::Whale,
            natural_key: event.tx_hash.clone(),
            priority: event.amount_usd,
            observed_at: event.occurred_at,
            expires_at: Some(event.occurred_at + self.lookback),
            bypass_category_cap: false,
            payload: CandidatePayload::Whale(WhalePayload {
                tx_hash: event.tx_hash,
                chain: event.chain,
                symbol: event.symbol,
                amount: event.amount,
                amount_usd: event.amount_usd,
                threshold_usd: self.post_min_usd,
                from_label: event.from_label,
                to_label: event.to_label,
            }),
        }
    }
}

#[async_trait]
impl CandidateSource for WhaleSource {
    fn category(&self) -> Category {
        Category::Whale
    }

    async fn next_candidate(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<CandidateEvent>, SourceError> {
        let mut events = self
            .events
            .recent_whale_events(now - self.lookback, self.post_min_usd)
            .await?;
        if events.is_empty() {
            return Ok(None);
        }
        events.sort_by(|a, b| b.amount_usd.total_cmp(&a.amount_usd));

        let keys: Vec<String> = events.iter().map(|e| e.tx_hash.clone()).collect();
        let blocked = self
            .records
            .blocked_keys(Category::Whale, &keys, now - self.claim_ttl)
            .await?;

        Ok(events
            .into_iter()
            .find(|e| !blocked.contains(&e.tx_hash))
            .map(|e| self.to_candidate(e)))
    }
}
