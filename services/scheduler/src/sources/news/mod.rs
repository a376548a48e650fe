//! News aggregation over a fixed set of monitored social accounts.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use postgres_models::models::Category;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::SchedulerConfig;
use crate::errors::SourceError;
use crate::scheduler::candidate::{CandidateEvent, CandidatePayload, CandidateSource, NewsPayload};
use crate::store::PublishedRecordStore;

pub mod filter;
pub mod format;

use filter::{assess, NewsPolicy};

/// A short-form post as returned by the social feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialPost {
    pub id: String,
    pub account: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
}

impl SocialPost {
    pub fn has_media(&self) -> bool {
        self.image_url.is_some() || self.video_url.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeedFetch {
    pub posts: Vec<SocialPost>,
    /// Served without touching the upstream provider.
    pub cached: bool,
}

#[async_trait]
pub trait SocialFeed: Send + Sync {
    async fn recent_posts(&self, account: &str) -> Result<FeedFetch, SourceError>;
}

pub struct NewsSource {
    feed: Arc<dyn SocialFeed>,
    records: Arc<dyn PublishedRecordStore>,
    accounts: Vec<String>,
    house: Option<String>,
    policy: NewsPolicy,
    fetch_delay: std::time::Duration,
    claim_ttl: Duration,
}

impl NewsSource {
    pub fn new(
        feed: Arc<dyn SocialFeed>,
        records: Arc<dyn PublishedRecordStore>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            feed,
            records,
            accounts: config.news_accounts.clone(),
            house: config.news_house_account.clone(),
            policy: NewsPolicy {
                max_age: config.news_max_age,
                fresh_window: config.news_fresh_window,
            },
            fetch_delay: config.news_fetch_delay,
            claim_ttl: config.claim_ttl,
        }
    }

    fn is_house(&self, account: &str) -> bool {
        self.house
            .as_deref()
            .map_or(false, |house| house.eq_ignore_ascii_case(account))
    }

    /// House account first, then every monitored account once.
    fn scan_order(&self) -> Vec<String> {
        let mut order: Vec<String> = self.house.iter().cloned().collect();
        order.extend(
            self.accounts
                .iter()
                .filter(|account| !self.is_house(account))
                .cloned(),
        );
        order
    }

    /// Fetches accounts one at a time, pausing between upstream calls. Fails
    /// only when every account failed.
    async fn fetch_all(&self) -> Result<Vec<SocialPost>, SourceError> {
        let accounts = self.scan_order();
        let mut posts = Vec::new();
        let mut failures = 0;
        let mut last_error = None;
        let mut hit_upstream = false;

        for account in &accounts {
            if hit_upstream && !self.fetch_delay.is_zero() {
                tokio::time::sleep(self.fetch_delay).await;
            }

            match self.feed.recent_posts(account).await {
                Ok(fetch) => {
                    debug!(account = %account, posts = fetch.posts.len(), cached = fetch.cached, "fetched feed");
                    hit_upstream = !fetch.cached;
                    posts.extend(fetch.posts);
                }
                Err(e) => {
                    warn!(account = %account, error = %e, "feed fetch failed");
                    hit_upstream = true;
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if failures == accounts.len() => Err(e),
            _ => Ok(posts),
        }
    }

    fn to_candidate(&self, post: SocialPost, now: DateTime<Utc>) -> Option<CandidateEvent> {
        if self.is_house(&post.account) {
            return Some(CandidateEvent {
                category: Category::News,
                natural_key: post.id.clone(),
                priority: f64::MAX,
                observed_at: post.created_at,
                expires_at: None,
                bypass_category_cap: true,
                payload: CandidatePayload::News(NewsPayload {
                    hook: filter::has_hook(&post.text),
                    relevant: filter::is_relevant(&post.text),
                    house: true,
                    post_id: post.id,
                    account: post.account,
                    text: post.text,
                    image_url: post.image_url,
                    video_url: post.video_url,
                }),
            });
        }

        let assessment = assess(&post, now, &self.policy)?;
        Some(CandidateEvent {
            category: Category::News,
            natural_key: post.id.clone(),
            priority: assessment.priority,
            observed_at: post.created_at,
            expires_at: Some(post.created_at + self.policy.max_age),
            bypass_category_cap: false,
            payload: CandidatePayload::News(NewsPayload {
                hook: assessment.hook,
                relevant: assessment.relevant,
                house: false,
                post_id: post.id,
                account: post.account,
                text: post.text,
                image_url: post.image_url,
                video_url: post.video_url,
            }),
        })
    }
}

/// House posts win outright; otherwise the highest priority, newest first
/// on ties.
fn choose(candidates: Vec<CandidateEvent>) -> Option<CandidateEvent> {
    candidates.into_iter().max_by(|a, b| {
        a.bypass_category_cap
            .cmp(&b.bypass_category_cap)
            .then(a.priority.total_cmp(&b.priority))
            .then(a.observed_at.cmp(&b.observed_at))
    })
}

#[async_trait]
impl CandidateSource for NewsSource {
    fn category(&self) -> Category {
        Category::News
    }

    fn may_bypass_cap(&self) -> bool {
        self.house.is_some()
    }

    async fn next_candidate(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<CandidateEvent>, SourceError> {
        let posts = self.fetch_all().await?;

        let mut candidates: Vec<CandidateEvent> = posts
            .into_iter()
            .filter_map(|post| self.to_candidate(post, now))
            .collect();
        if candidates.is_empty() {
            return Ok(None);
        }

        let keys: Vec<String> = candidates.iter().map(|c| c.natural_key.clone()).collect();
        let blocked = self
            .records
            .blocked_keys(Category::News, &keys, now - self.claim_ttl)
            .await?;
        candidates.retain(|c| !blocked.contains(&c.natural_key));

        Ok(choose(candidates))
    }
}
