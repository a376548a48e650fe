//! Daily publish quotas.
//!
//! Counts are derived from `published_at` timestamps inside the current UTC
//! day, so nothing ever needs resetting at midnight.

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use postgres_models::models::Category;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::StoreError;
use crate::store::PublishedRecordStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaCaps {
    pub whale: i64,
    pub news: i64,
    pub token: i64,
    pub global: i64,
}

impl Default for QuotaCaps {
    fn default() -> Self {
        Self {
            whale: 2,
            news: 12,
            token: 1,
            global: 15,
        }
    }
}

impl QuotaCaps {
    pub fn cap_for(&self, category: Category) -> i64 {
        match category {
            Category::Whale => self.whale,
            Category::News => self.news,
            Category::Token => self.token,
        }
    }
}

/// Quota state read once at the start of a cycle.
#[derive(Debug, Clone)]
pub struct QuotaSnapshot {
    pub caps: QuotaCaps,
    pub counts: HashMap<Category, i64>,
    pub last_published_at: Option<DateTime<Utc>>,
}

impl QuotaSnapshot {
    pub fn count_today(&self, category: Category) -> i64 {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    pub fn count_global_today(&self) -> i64 {
        self.counts.values().sum()
    }

    pub fn global_under_cap(&self) -> bool {
        self.count_global_today() < self.caps.global
    }

    pub fn category_under_cap(&self, category: Category) -> bool {
        self.count_today(category) < self.caps.cap_for(category)
    }

    pub fn under_cap(&self, category: Category) -> bool {
        self.category_under_cap(category) && self.global_under_cap()
    }
}

pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::default()))
}

#[derive(Clone)]
pub struct QuotaLedger {
    records: Arc<dyn PublishedRecordStore>,
    caps: QuotaCaps,
}

impl QuotaLedger {
    pub fn new(records: Arc<dyn PublishedRecordStore>, caps: QuotaCaps) -> Self {
        Self { records, caps }
    }

    pub fn caps(&self) -> QuotaCaps {
        self.caps
    }

    pub async fn snapshot(&self, now: DateTime<Utc>) -> Result<QuotaSnapshot, StoreError> {
        let counts = self.records.published_counts(start_of_day(now), now).await?;
        let last_published_at = self.records.last_published_at().await?;

        Ok(QuotaSnapshot {
            caps: self.caps,
            counts,
            last_published_at,
        })
    }

    pub async fn count_today(&self, category: Category, now: DateTime<Utc>) -> Result<i64, StoreError> {
        Ok(self.snapshot(now).await?.count_today(category))
    }

    pub async fn count_global_today(&self, now: DateTime<Utc>) -> Result<i64, StoreError> {
        Ok(self.snapshot(now).await?.count_global_today())
    }

    pub async fn under_cap(&self, category: Category, now: DateTime<Utc>) -> Result<bool, StoreError> {
        Ok(self.snapshot(now).await?.under_cap(category))
    }
}
