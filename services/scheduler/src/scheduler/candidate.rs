use async_trait::async_trait;
use chrono::{DateTime, Utc};
use postgres_models::models::Category;
use serde::Serialize;

use crate::errors::SourceError;

/// An unpublished event eligible for selection in the current cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateEvent {
    pub category: Category,
    pub natural_key: String,
    /// Relative ranking inside one category. Not comparable across categories.
    pub priority: f64,
    /// When the underlying event happened.
    pub observed_at: DateTime<Utc>,
    /// Last instant at which the candidate may still be published.
    pub expires_at: Option<DateTime<Utc>>,
    /// Skip the category cap (house-account news).
    pub bypass_category_cap: bool,
    pub payload: CandidatePayload,
}

impl CandidateEvent {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expires_at| now <= expires_at)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CandidatePayload {
    Whale(WhalePayload),
    News(NewsPayload),
    Token(TokenPayload),
}

#[derive(Debug, Clone, Serialize)]
pub struct WhalePayload {
    pub tx_hash: String,
    pub chain: String,
    pub symbol: String,
    pub amount: f64,
    pub amount_usd: f64,
    pub threshold_usd: f64,
    pub from_label: Option<String>,
    pub to_label: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewsPayload {
    pub post_id: String,
    pub account: String,
    pub text: String,
    pub hook: bool,
    pub relevant: bool,
    pub house: bool,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPayload {
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub score: f64,
    pub progress: f64,
    /// Number of earlier publications of this token.
    pub generation: i32,
    pub image_url: Option<String>,
}


/// A producer of at most one candidate per cycle.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    fn category(&self) -> Category;

    /// Whether this source can produce candidates that ignore the category
    /// cap. Sources that cannot are not queried once their category is full.
    fn may_bypass_cap(&self) -> bool {
        false
    }

    async fn next_candidate(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<CandidateEvent>, SourceError>;
}
