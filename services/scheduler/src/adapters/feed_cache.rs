use async_trait::async_trait;
use redis_cache::JsonCache;
use std::sync::Arc;
use tracing::warn;

use crate::errors::SourceError;
use crate::sources::news::{FeedFetch, SocialFeed, SocialPost};

/// Per-account storage for recently fetched posts.
#[async_trait]
pub trait FeedCache: Send + Sync {
    async fn get_posts(&self, account: &str) -> anyhow::Result<Option<Vec<SocialPost>>>;

    async fn put_posts(&self, account: &str, posts: &[SocialPost], ttl_seconds: u64) -> anyhow::Result<()>;
}

#[async_trait]
impl FeedCache for JsonCache {
    async fn get_posts(&self, account: &str) -> anyhow::Result<Option<Vec<SocialPost>>> {
        Ok(self.get(&account.to_ascii_lowercase()).await?)
    }

    async fn put_posts(&self, account: &str, posts: &[SocialPost], ttl_seconds: u64) -> anyhow::Result<()> {
        Ok(self.put(&account.to_ascii_lowercase(), posts, ttl_seconds).await?)
    }
}

/// Serves an account from the cache when it was fetched recently. Cache
/// failures fall through to the wrapped feed.
pub struct CachedFeed {
    inner: Arc<dyn SocialFeed>,
    cache: Arc<dyn FeedCache>,
    ttl_seconds: u64,
}

impl CachedFeed {
    pub fn new(inner: Arc<dyn SocialFeed>, cache: Arc<dyn FeedCache>, ttl_seconds: u64) -> Self {
        Self {
            inner,
            cache,
            ttl_seconds,
        }
    }
}

#[async_trait]
impl SocialFeed for CachedFeed {
    async fn recent_posts(&self, account: &str) -> Result<FeedFetch, SourceError> {
        match self.cache.get_posts(account).await {
            Ok(Some(posts)) => return Ok(FeedFetch { posts, cached: true }),
            Ok(None) => {}
            Err(e) => warn!(account, error = %e, "feed cache read failed"),
        }

        let fetch = self.inner.recent_posts(account).await?;
        if let Err(e) = self.cache.put_posts(account, &fetch.posts, self.ttl_seconds).await {
            warn!(account, error = %e, "feed cache write failed");
        }
        Ok(fetch)
    }
}
