use async_trait::async_trait;
use chrono::{DateTime, Utc};
use postgres_models::models::{
    Category, NewClaim, NewWhaleEvent, PublishedRecord, RecordStatus, TokenCooldown, TrackedToken,
    WhaleEvent,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{
    CooldownStore, PublishedRecordStore, RateLimitStore, TokenSnapshotStore, WhaleEventStore,
};
use crate::errors::StoreError;

#[derive(Default)]
struct MemoryState {
    records: Vec<PublishedRecord>,
    resume_at: Option<DateTime<Utc>>,
    cooldowns: HashMap<String, TokenCooldown>,
    whale_events: Vec<WhaleEvent>,
    tokens: HashMap<String, TrackedToken>,
}

/// In-process store with the same uniqueness and claim semantics as the
/// Postgres tables. Used for local runs without a database and in tests.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<PublishedRecord> {
        self.lock().records.clone()
    }

    pub fn record(&self, category: Category, natural_key: &str) -> Option<PublishedRecord> {
        self.lock()
            .records
            .iter()
            .find(|r| r.category == category.as_str() && r.natural_key == natural_key)
            .cloned()
    }

    /// Inserts an already-published record, bypassing the claim flow.
    pub fn seed_published(&self, category: Category, natural_key: &str, at: DateTime<Utc>) {
        self.lock().records.push(PublishedRecord {
            id: Uuid::new_v4(),
            category: category.as_str().to_string(),
            natural_key: natural_key.to_string(),
            status: RecordStatus::Published.as_str().to_string(),
            post_id: Some(format!("seed-{natural_key}")),
            published_at: Some(at),
            source_timestamp: at,
            content: None,
            attempts: 0,
            last_error: None,
            claimed_at: Some(at),
            created_at: at,
            updated_at: at,
        });
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn guard(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        Ok(self.lock())
    }
}

fn find_record(state: &mut MemoryState, record_id: Uuid) -> Result<&mut PublishedRecord, StoreError> {
    state
        .records
        .iter_mut()
        .find(|r| r.id == record_id)
        .ok_or_else(|| StoreError::Query(format!("record {record_id} not found")))
}

/// When a record counts as a publish: confirmed rows at `published_at`,
/// unconfirmed `posting` rows at their claim time.
fn counted_at(record: &PublishedRecord) -> Option<DateTime<Utc>> {
    match record.record_status() {
        Some(RecordStatus::Published) => record.published_at,
        Some(RecordStatus::Posting) => record.claimed_at,
        _ => None,
    }
}

#[async_trait]
impl PublishedRecordStore for MemoryStore {
    async fn blocked_keys(
        &self,
        category: Category,
        keys: &[String],
        stale_before: DateTime<Utc>,
    ) -> Result<HashSet<String>, StoreError> {
        let state = self.guard()?;
        Ok(state
            .records
            .iter()
            .filter(|r| r.category == category.as_str() && keys.contains(&r.natural_key))
            .filter(|r| match r.record_status() {
                Some(RecordStatus::Published)
                | Some(RecordStatus::Posting)
                | Some(RecordStatus::Abandoned) => true,
                Some(RecordStatus::Pending) => r.claimed_at.map_or(false, |c| c >= stale_before),
                _ => false,
            })
            .map(|r| r.natural_key.clone())
            .collect())
    }

    async fn claim(
        &self,
        claim: &NewClaim,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<PublishedRecord>, StoreError> {
        let mut state = self.guard()?;

        if let Some(existing) = state.records.iter_mut().find(|r| {
            r.category == claim.category.as_str() && r.natural_key == claim.natural_key
        }) {
            let reclaimable = match existing.record_status() {
                Some(RecordStatus::Retry) => true,
                Some(RecordStatus::Pending) => existing.claimed_at.map_or(false, |c| c < stale_before),
                _ => false,
            };
            if !reclaimable {
                return Ok(None);
            }

            existing.status = RecordStatus::Pending.as_str().to_string();
            existing.content = claim.content.clone();
            existing.claimed_at = Some(claim.claimed_at);
            existing.updated_at = claim.claimed_at;
            return Ok(Some(existing.clone()));
        }

        let record = PublishedRecord {
            id: claim.id,
            category: claim.category.as_str().to_string(),
            natural_key: claim.natural_key.clone(),
            status: RecordStatus::Pending.as_str().to_string(),
            post_id: None,
            published_at: None,
            source_timestamp: claim.source_timestamp,
            content: claim.content.clone(),
            attempts: 0,
            last_error: None,
            claimed_at: Some(claim.claimed_at),
            created_at: claim.claimed_at,
            updated_at: claim.claimed_at,
        };
        state.records.push(record.clone());
        Ok(Some(record))
    }

    async fn mark_posting(&self, record_id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut state = self.guard()?;
        let record = find_record(&mut state, record_id)?;
        if record.record_status() != Some(RecordStatus::Pending) {
            return Ok(false);
        }
        record.status = RecordStatus::Posting.as_str().to_string();
        record.updated_at = at;
        Ok(true)
    }

    async fn mark_published(
        &self,
        record_id: Uuid,
        post_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.guard()?;
        let record = find_record(&mut state, record_id)?;
        record.status = RecordStatus::Published.as_str().to_string();
        record.post_id = Some(post_id.to_string());
        record.published_at = Some(at);
        record.updated_at = at;
        Ok(())
    }

    async fn release(&self, record_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut state = self.guard()?;
        let record = find_record(&mut state, record_id)?;
        if matches!(
            record.record_status(),
            Some(RecordStatus::Pending) | Some(RecordStatus::Posting)
        ) {
            record.status = RecordStatus::Retry.as_str().to_string();
            record.updated_at = at;
        }
        Ok(())
    }

    async fn mark_failed(
        &self,
        record_id: Uuid,
        error: &str,
        at: DateTime<Utc>,
        max_attempts: i32,
    ) -> Result<RecordStatus, StoreError> {
        let mut state = self.guard()?;
        let record = find_record(&mut state, record_id)?;
        record.attempts += 1;
        record.last_error = Some(error.to_string());
        record.updated_at = at;

        let status = if record.attempts >= max_attempts {
            RecordStatus::Abandoned
        } else {
            RecordStatus::Retry
        };
        record.status = status.as_str().to_string();
        Ok(status)
    }

    async fn published_counts(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<HashMap<Category, i64>, StoreError> {
        let state = self.guard()?;
        let mut counts = HashMap::new();
        for record in &state.records {
            let in_window = counted_at(record).map_or(false, |at| at >= since && at < until);
            if let (true, Some(category)) = (in_window, record.record_category()) {
                *counts.entry(category).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn last_published_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let state = self.guard()?;
        Ok(state.records.iter().filter_map(counted_at).max())
    }
}

#[async_trait]
impl RateLimitStore for MemoryStore {
    async fn resume_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.guard()?.resume_at)
    }

    async fn set_resume_at(
        &self,
        resume_at: Option<DateTime<Utc>>,
        _now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.guard()?.resume_at = resume_at;
        Ok(())
    }
}

#[async_trait]
impl CooldownStore for MemoryStore {
    async fn cooldowns(
        &self,
        addresses: &[String],
    ) -> Result<HashMap<String, TokenCooldown>, StoreError> {
        let state = self.guard()?;
        Ok(addresses
            .iter()
            .filter_map(|a| state.cooldowns.get(a).map(|c| (a.clone(), c.clone())))
            .collect())
    }

    async fn record_publish(&self, cooldown: &TokenCooldown) -> Result<(), StoreError> {
        self.guard()?
            .cooldowns
            .insert(cooldown.address.clone(), cooldown.clone());
        Ok(())
    }
}

#[async_trait]
impl WhaleEventStore for MemoryStore {
    async fn insert_whale_events(&self, events: &[NewWhaleEvent]) -> Result<usize, StoreError> {
        let mut state = self.guard()?;
        let mut inserted = 0;
        for event in events {
            if state.whale_events.iter().any(|e| e.tx_hash == event.tx_hash) {
                continue;
            }
            state.whale_events.push(WhaleEvent {
                id: event.id,
                tx_hash: event.tx_hash.clone(),
                chain: event.chain.clone(),
                symbol: event.symbol.clone(),
                amount: event.amount,
                amount_usd: event.amount_usd,
                from_label: event.from_label.clone(),
                to_label: event.to_label.clone(),
                occurred_at: event.occurred_at,
                created_at: event.occurred_at,
            });
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn recent_whale_events(
        &self,
        since: DateTime<Utc>,
        min_usd: f64,
    ) -> Result<Vec<WhaleEvent>, StoreError> {
        let state = self.guard()?;
        let mut events: Vec<WhaleEvent> = state
            .whale_events
            .iter()
            .filter(|e| e.occurred_at >= since && e.amount_usd >= min_usd)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.amount_usd.total_cmp(&a.amount_usd));
        Ok(events)
    }
}

#[async_trait]
impl TokenSnapshotStore for MemoryStore {
    async fn upsert_tokens(&self, tokens: &[TrackedToken]) -> Result<usize, StoreError> {
        let mut state = self.guard()?;
        for token in tokens {
            state.tokens.insert(token.address.clone(), token.clone());
        }
        Ok(tokens.len())
    }

    async fn qualifying_tokens(
        &self,
        min_progress: f64,
        min_score: f64,
        updated_since: DateTime<Utc>,
    ) -> Result<Vec<TrackedToken>, StoreError> {
        let state = self.guard()?;
        let mut tokens: Vec<TrackedToken> = state
            .tokens
            .values()
            .filter(|t| t.progress >= min_progress && t.score >= min_score)
            .filter(|t| t.updated_at >= updated_since)
            .cloned()
            .collect();
        tokens.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.progress.total_cmp(&a.progress))
        });
        Ok(tokens)
    }
}
