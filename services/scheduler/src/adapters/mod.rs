//! Outbound integrations. The scheduler only sees the traits below.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use postgres_models::models::Category;

use crate::errors::SchedulerError;
use crate::scheduler::render::OutboundPost;

pub mod discord;
pub mod feed_cache;
pub mod x;

pub use discord::DiscordWebhook;
pub use feed_cache::{CachedFeed, FeedCache};
pub use x::{XClient, XFeed};

/// Result of one post attempt on the primary platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostResult {
    Posted { id: String },
    RateLimited { reset_at: Option<DateTime<Utc>> },
    Failed { reason: String },
}

#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Fails when a required credential is missing. Checked before any work.
    fn ensure_configured(&self) -> Result<(), SchedulerError> {
        Ok(())
    }

    async fn post_content(&self, post: &OutboundPost) -> PostResult;
}

/// Secondary channel that receives a copy of whale and news alerts.
#[async_trait]
pub trait MirrorChannel: Send + Sync {
    async fn mirror(&self, category: Category, post: &OutboundPost) -> anyhow::Result<()>;
}
