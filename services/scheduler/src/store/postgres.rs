use async_trait::async_trait;
use chrono::{DateTime, Utc};
use postgres_models::models::{
    published_records, rate_limit_state, token_cooldowns, tracked_tokens, whale_events, Category,
    NewClaim, NewWhaleEvent, PublishedRecord, RecordStatus, TokenCooldown, TrackedToken,
    WhaleEvent,
};
use postgres_models::{DbConnection, DbPool};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

use super::{
    CooldownStore, PublishedRecordStore, RateLimitStore, TokenSnapshotStore, WhaleEventStore,
};
use crate::errors::StoreError;

/// Postgres-backed store. Every call is bounded by `timeout`.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
    timeout: Duration,
}

impl PgStore {
    pub fn new(pool: DbPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn conn(&self) -> Result<DbConnection, StoreError> {
        Ok(postgres_models::connection(&self.pool).await?)
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(format!(
                "{operation} timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

#[async_trait]
impl PublishedRecordStore for PgStore {
    async fn blocked_keys(
        &self,
        category: Category,
        keys: &[String],
        stale_before: DateTime<Utc>,
    ) -> Result<HashSet<String>, StoreError> {
        self.bounded("blocked_keys", async {
            let mut conn = self.conn().await?;
            let blocked =
                published_records::blocked_keys(&mut conn, category, keys, stale_before).await?;
            Ok(blocked.into_iter().collect())
        })
        .await
    }

    async fn claim(
        &self,
        claim: &NewClaim,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<PublishedRecord>, StoreError> {
        self.bounded("claim", async {
            let mut conn = self.conn().await?;
            Ok(published_records::claim(&mut conn, claim, stale_before).await?)
        })
        .await
    }

    async fn mark_posting(&self, record_id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        self.bounded("mark_posting", async {
            let mut conn = self.conn().await?;
            Ok(published_records::mark_posting(&mut conn, record_id, at).await? == 1)
        })
        .await
    }

    async fn mark_published(
        &self,
        record_id: Uuid,
        post_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.bounded("mark_published", async {
            let mut conn = self.conn().await?;
            published_records::mark_published(&mut conn, record_id, post_id, at).await?;
            Ok(())
        })
        .await
    }

    async fn release(&self, record_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.bounded("release", async {
            let mut conn = self.conn().await?;
            published_records::release(&mut conn, record_id, at).await?;
            Ok(())
        })
        .await
    }

    async fn mark_failed(
        &self,
        record_id: Uuid,
        error: &str,
        at: DateTime<Utc>,
        max_attempts: i32,
    ) -> Result<RecordStatus, StoreError> {
        self.bounded("mark_failed", async {
            let mut conn = self.conn().await?;
            Ok(published_records::mark_failed(&mut conn, record_id, error, at, max_attempts).await?)
        })
        .await
    }

    async fn published_counts(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<HashMap<Category, i64>, StoreError> {
        self.bounded("published_counts", async {
            let mut conn = self.conn().await?;
            let rows = published_records::published_counts(&mut conn, since, until).await?;
            Ok(rows
                .into_iter()
                .filter_map(|(category, count)| Category::parse(&category).map(|c| (c, count)))
                .collect())
        })
        .await
    }

    async fn last_published_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.bounded("last_published_at", async {
            let mut conn = self.conn().await?;
            Ok(published_records::last_published_at(&mut conn).await?)
        })
        .await
    }
}

#[async_trait]
impl RateLimitStore for PgStore {
    async fn resume_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.bounded("resume_at", async {
            let mut conn = self.conn().await?;
            let state = rate_limit_state::load(&mut conn).await?;
            Ok(state.and_then(|s| s.resume_at))
        })
        .await
    }

    async fn set_resume_at(
        &self,
        resume_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.bounded("set_resume_at", async {
            let mut conn = self.conn().await?;
            rate_limit_state::store_resume_at(&mut conn, resume_at, now).await?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl CooldownStore for PgStore {
    async fn cooldowns(
        &self,
        addresses: &[String],
    ) -> Result<HashMap<String, TokenCooldown>, StoreError> {
        self.bounded("cooldowns", async {
            let mut conn = self.conn().await?;
            let rows = token_cooldowns::load_for(&mut conn, addresses).await?;
            Ok(rows.into_iter().map(|c| (c.address.clone(), c)).collect())
        })
        .await
    }

    async fn record_publish(&self, cooldown: &TokenCooldown) -> Result<(), StoreError> {
        self.bounded("record_publish", async {
            let mut conn = self.conn().await?;
            token_cooldowns::record_publish(&mut conn, cooldown).await?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl WhaleEventStore for PgStore {
    async fn insert_whale_events(&self, events: &[NewWhaleEvent]) -> Result<usize, StoreError> {
        self.bounded("insert_whale_events", async {
            let mut conn = self.conn().await?;
            Ok(whale_events::insert_many(&mut conn, events).await?)
        })
        .await
    }

    async fn recent_whale_events(
        &self,
        since: DateTime<Utc>,
        min_usd: f64,
    ) -> Result<Vec<WhaleEvent>, StoreError> {
        self.bounded("recent_whale_events", async {
            let mut conn = self.conn().await?;
            Ok(whale_events::recent(&mut conn, since, min_usd).await?)
        })
        .await
    }
}

#[async_trait]
impl TokenSnapshotStore for PgStore {
    async fn upsert_tokens(&self, tokens: &[TrackedToken]) -> Result<usize, StoreError> {
        self.bounded("upsert_tokens", async {
            let mut conn = self.conn().await?;
            Ok(tracked_tokens::upsert_many(&mut conn, tokens).await?)
        })
        .await
    }

    async fn qualifying_tokens(
        &self,
        min_progress: f64,
        min_score: f64,
        updated_since: DateTime<Utc>,
    ) -> Result<Vec<TrackedToken>, StoreError> {
        self.bounded("qualifying_tokens", async {
            let mut conn = self.conn().await?;
            Ok(tracked_tokens::qualifying(&mut conn, min_progress, min_score, updated_since).await?)
        })
        .await
    }
}
