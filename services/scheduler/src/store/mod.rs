//! Persistence seams used by the scheduler.
//!
//! Each trait is a narrow view of the relational store. `PgStore` backs them
//! with Postgres; `MemoryStore` keeps the same uniqueness and claim rules in
//! process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use postgres_models::models::{
    Category, NewClaim, NewWhaleEvent, PublishedRecord, RecordStatus, TokenCooldown, TrackedToken,
    WhaleEvent,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::StoreError;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait PublishedRecordStore: Send + Sync {
    /// Subset of `keys` that must not be selected again.
    async fn blocked_keys(
        &self,
        category: Category,
        keys: &[String],
        stale_before: DateTime<Utc>,
    ) -> Result<HashSet<String>, StoreError>;

    /// Takes the claim on a natural key. `None` means someone else holds it or
    /// it is already published.
    async fn claim(
        &self,
        claim: &NewClaim,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<PublishedRecord>, StoreError>;

    /// Marks a claim as about to be posted. `false` means the claim was lost.
    async fn mark_posting(&self, record_id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError>;

    async fn mark_published(
        &self,
        record_id: Uuid,
        post_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn release(&self, record_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    async fn mark_failed(
        &self,
        record_id: Uuid,
        error: &str,
        at: DateTime<Utc>,
        max_attempts: i32,
    ) -> Result<RecordStatus, StoreError>;

    async fn published_counts(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<HashMap<Category, i64>, StoreError>;

    async fn last_published_at(&self) -> Result<Option<DateTime<Utc>>, StoreError>;
}

#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn resume_at(&self) -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn set_resume_at(
        &self,
        resume_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CooldownStore: Send + Sync {
    async fn cooldowns(
        &self,
        addresses: &[String],
    ) -> Result<HashMap<String, TokenCooldown>, StoreError>;

    async fn record_publish(&self, cooldown: &TokenCooldown) -> Result<(), StoreError>;
}

#[async_trait]
pub trait WhaleEventStore: Send + Sync {
    async fn insert_whale_events(&self, events: &[NewWhaleEvent]) -> Result<usize, StoreError>;

    async fn recent_whale_events(
        &self,
        since: DateTime<Utc>,
        min_usd: f64,
    ) -> Result<Vec<WhaleEvent>, StoreError>;
}

#[async_trait]
pub trait TokenSnapshotStore: Send + Sync {
    async fn upsert_tokens(&self, tokens: &[TrackedToken]) -> Result<usize, StoreError>;

    /// Tokens refreshed at or after `updated_since` that clear both thresholds.
    async fn qualifying_tokens(
        &self,
        min_progress: f64,
        min_score: f64,
        updated_since: DateTime<Utc>,
    ) -> Result<Vec<TrackedToken>, StoreError>;
}

/// Every store the scheduler and its routes need, as trait objects.
#[derive(Clone)]
pub struct Stores {
    pub records: Arc<dyn PublishedRecordStore>,
    pub rate_limit: Arc<dyn RateLimitStore>,
    pub cooldowns: Arc<dyn CooldownStore>,
    pub whales: Arc<dyn WhaleEventStore>,
    pub tokens: Arc<dyn TokenSnapshotStore>,
}

impl Stores {
    /// Uses one backend for every seam.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: PublishedRecordStore
            + RateLimitStore
            + CooldownStore
            + WhaleEventStore
            + TokenSnapshotStore
            + 'static,
    {
        Self {
            records: store.clone(),
            rate_limit: store.clone(),
            cooldowns: store.clone(),
            whales: store.clone(),
            tokens: store,
        }
    }
}
