#![allow(dead_code)]

use alert_scheduler::adapters::{MirrorChannel, PlatformAdapter, PostResult};
use alert_scheduler::clock::{Clock, ManualClock};
use alert_scheduler::config::SchedulerConfig;
use alert_scheduler::errors::{SchedulerError, SourceError, StoreError};
use alert_scheduler::scheduler::candidate::{CandidateEvent, CandidateSource};
use alert_scheduler::scheduler::render::OutboundPost;
use alert_scheduler::scheduler::Scheduler;
use alert_scheduler::sources::{FeedFetch, NewsSource, SocialFeed, SocialPost, TokenSource, WhaleSource};
use alert_scheduler::store::{
    MemoryStore, PublishedRecordStore, Stores, TokenSnapshotStore, WhaleEventStore,
};
use alert_scheduler::AppState;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use postgres_models::models::{
    Category, NewClaim, NewWhaleEvent, PublishedRecord, RecordStatus, TrackedToken,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const HOUSE_ACCOUNT: &str = "HouseDesk";

/// Platform double. Answers `Posted` with increasing ids unless a result was
/// queued.
#[derive(Default)]
pub struct FakePlatform {
    queued: Mutex<VecDeque<PostResult>>,
    posts: Mutex<Vec<OutboundPost>>,
    next_id: AtomicUsize,
    unconfigured: AtomicBool,
}

impl FakePlatform {
    pub fn push_result(&self, result: PostResult) {
        self.queued.lock().unwrap().push_back(result);
    }

    pub fn set_unconfigured(&self) {
        self.unconfigured.store(true, Ordering::SeqCst);
    }

    pub fn posts(&self) -> Vec<OutboundPost> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformAdapter for FakePlatform {
    fn ensure_configured(&self) -> Result<(), SchedulerError> {
        if self.unconfigured.load(Ordering::SeqCst) {
            return Err(SchedulerError::Configuration("X_USER_ACCESS_TOKEN is not set".into()));
        }
        Ok(())
    }

    async fn post_content(&self, post: &OutboundPost) -> PostResult {
        self.posts.lock().unwrap().push(post.clone());
        if let Some(result) = self.queued.lock().unwrap().pop_front() {
            return result;
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        PostResult::Posted {
            id: format!("post-{id}"),
        }
    }
}

#[derive(Default)]
pub struct FakeMirror {
    pub fail: AtomicBool,
    mirrored: Mutex<Vec<(Category, OutboundPost)>>,
}

impl FakeMirror {
    pub fn mirrored(&self) -> Vec<(Category, OutboundPost)> {
        self.mirrored.lock().unwrap().clone()
    }
}

#[async_trait]
impl MirrorChannel for FakeMirror {
    async fn mirror(&self, category: Category, post: &OutboundPost) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("webhook returned 500");
        }
        self.mirrored.lock().unwrap().push((category, post.clone()));
        Ok(())
    }
}

/// Feed double serving whatever posts were pushed for an account.
#[derive(Default)]
pub struct StaticFeed {
    posts: Mutex<Vec<SocialPost>>,
    pub failing: AtomicBool,
}

impl StaticFeed {
    pub fn push(&self, post: SocialPost) {
        self.posts.lock().unwrap().push(post);
    }
}

#[async_trait]
impl SocialFeed for StaticFeed {
    async fn recent_posts(&self, account: &str) -> Result<FeedFetch, SourceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Upstream(format!("{account}: 503 Service Unavailable")));
        }
        let posts = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.account == account)
            .cloned()
            .collect();
        Ok(FeedFetch { posts, cached: false })
    }
}

/// Wraps a real source and counts how often it is queried.
pub struct CountingSource {
    inner: Arc<dyn CandidateSource>,
    calls: AtomicUsize,
}

impl CountingSource {
    pub fn wrap(inner: Arc<dyn CandidateSource>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CandidateSource for CountingSource {
    fn category(&self) -> Category {
        self.inner.category()
    }

    fn may_bypass_cap(&self) -> bool {
        self.inner.may_bypass_cap()
    }

    async fn next_candidate(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<CandidateEvent>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.next_candidate(now).await
    }
}

/// Record store whose `mark_published` fails a set number of times before
/// reaching the in-memory store. Everything else passes through.
pub struct FlakyRecords {
    inner: Arc<MemoryStore>,
    failures_left: AtomicUsize,
    mark_calls: AtomicUsize,
}

impl FlakyRecords {
    pub fn new(inner: Arc<MemoryStore>, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            inner,
            failures_left: AtomicUsize::new(failures),
            mark_calls: AtomicUsize::new(0),
        })
    }

    pub fn mark_calls(&self) -> usize {
        self.mark_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PublishedRecordStore for FlakyRecords {
    async fn blocked_keys(
        &self,
        category: Category,
        keys: &[String],
        stale_before: DateTime<Utc>,
    ) -> Result<HashSet<String>, StoreError> {
        self.inner.blocked_keys(category, keys, stale_before).await
    }

    async fn claim(
        &self,
        claim: &NewClaim,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<PublishedRecord>, StoreError> {
        self.inner.claim(claim, stale_before).await
    }

    async fn mark_posting(&self, record_id: uuid::Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        self.inner.mark_posting(record_id, at).await
    }

    async fn mark_published(
        &self,
        record_id: uuid::Uuid,
        post_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.mark_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Unavailable("mark_published timed out after 5s".into()));
        }
        self.inner.mark_published(record_id, post_id, at).await
    }

    async fn release(&self, record_id: uuid::Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.inner.release(record_id, at).await
    }

    async fn mark_failed(
        &self,
        record_id: uuid::Uuid,
        error: &str,
        at: DateTime<Utc>,
        max_attempts: i32,
    ) -> Result<RecordStatus, StoreError> {
        self.inner.mark_failed(record_id, error, at, max_attempts).await
    }

    async fn published_counts(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<HashMap<Category, i64>, StoreError> {
        self.inner.published_counts(since, until).await
    }

    async fn last_published_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.inner.last_published_at().await
    }
}

/// Test data builders
pub struct TestData;

impl TestData {
    /// 18:00 UTC, so seeded publishes a few hours back still count as today.
    pub fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 18, 0, 0).unwrap()
    }

    pub fn config() -> SchedulerConfig {
        SchedulerConfig {
            news_accounts: vec!["WatcherGuru".into(), "tier10k".into()],
            news_house_account: Some(HOUSE_ACCOUNT.into()),
            news_fetch_delay: std::time::Duration::ZERO,
            ..SchedulerConfig::default()
        }
    }

    pub fn social_post(id: &str, account: &str, text: &str, created_at: DateTime<Utc>) -> SocialPost {
        SocialPost {
            id: id.into(),
            account: account.into(),
            text: text.into(),
            created_at,
            image_url: None,
            video_url: None,
        }
    }

    pub fn whale_transfer(hash: &str, usd: f64, occurred_at: DateTime<Utc>) -> NewWhaleEvent {
        NewWhaleEvent::new(
            hash.into(),
            "ethereum".into(),
            "ETH".into(),
            usd / 3_000.0,
            usd,
            occurred_at,
        )
        .with_labels(Some("Binance".into()), None)
    }

    pub fn token(address: &str, score: f64, progress: f64, updated_at: DateTime<Utc>) -> TrackedToken {
        TrackedToken {
            address: address.into(),
            name: format!("{address} coin"),
            symbol: address.to_uppercase(),
            progress,
            whale_inflows: 5.0,
            hype: 60.0,
            volume_change: 40.0,
            rug_risk: 70.0,
            score,
            image_url: None,
            updated_at,
        }
    }
}

/// Everything one scheduler needs, backed by the in-memory store and fakes.
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub platform: Arc<FakePlatform>,
    pub mirror: Arc<FakeMirror>,
    pub feed: Arc<StaticFeed>,
    pub clock: Arc<ManualClock>,
    pub config: SchedulerConfig,
    counters: Mutex<Vec<Arc<CountingSource>>>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(TestData::config())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            platform: Arc::new(FakePlatform::default()),
            mirror: Arc::new(FakeMirror::default()),
            feed: Arc::new(StaticFeed::default()),
            clock: Arc::new(ManualClock::new(TestData::start_time())),
            config,
            counters: Mutex::new(Vec::new()),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn stores(&self) -> Stores {
        Stores::shared(self.store.clone())
    }

    /// A scheduler whose sources are wrapped in query counters.
    pub fn scheduler(&self) -> Scheduler {
        let stores = self.stores();
        let mirror: Arc<dyn MirrorChannel> = self.mirror.clone();

        let sources: Vec<Arc<dyn CandidateSource>> = vec![
            Arc::new(WhaleSource::new(stores.whales.clone(), stores.records.clone(), &self.config)),
            Arc::new(NewsSource::new(self.feed.clone(), stores.records.clone(), &self.config)),
            Arc::new(TokenSource::new(
                stores.tokens.clone(),
                stores.cooldowns.clone(),
                stores.records.clone(),
                &self.config,
            )),
        ];
        let counted: Vec<Arc<dyn CandidateSource>> = sources
            .into_iter()
            .map(|source| {
                let counter = CountingSource::wrap(source);
                self.counters.lock().unwrap().push(counter.clone());
                counter as Arc<dyn CandidateSource>
            })
            .collect();

        Scheduler::new(
            &self.config,
            &stores,
            self.platform.clone(),
            Some(mirror),
            self.feed.clone(),
            self.clock.clone(),
        )
        .with_sources(counted)
    }

    /// A scheduler over `stores` instead of the harness store bundle.
    pub fn scheduler_with_stores(&self, stores: &Stores) -> Scheduler {
        let mirror: Arc<dyn MirrorChannel> = self.mirror.clone();
        Scheduler::new(
            &self.config,
            stores,
            self.platform.clone(),
            Some(mirror),
            self.feed.clone(),
            self.clock.clone(),
        )
    }

    /// Total source queries across every scheduler built by this harness.
    pub fn source_queries(&self) -> usize {
        self.counters.lock().unwrap().iter().map(|c| c.calls()).sum()
    }

    pub fn state(&self, cron_secret: Option<&str>) -> AppState {
        AppState::from_parts(
            self.scheduler(),
            self.stores(),
            self.config.clone(),
            cron_secret.map(str::to_string),
            self.clock.clone(),
        )
    }

    pub async fn seed_whale(&self, hash: &str, usd: f64, minutes_ago: i64) {
        let transfer = TestData::whale_transfer(hash, usd, self.now() - Duration::minutes(minutes_ago));
        self.store.insert_whale_events(&[transfer]).await.unwrap();
    }

    pub fn seed_news(&self, id: &str, account: &str, text: &str, minutes_ago: i64) {
        let created_at = self.now() - Duration::minutes(minutes_ago);
        self.feed.push(TestData::social_post(id, account, text, created_at));
    }

    pub async fn seed_token(&self, address: &str, score: f64, progress: f64) {
        let token = TestData::token(address, score, progress, self.now());
        self.store.upsert_tokens(&[token]).await.unwrap();
    }

    /// Records `count` publishes in `category`, five minutes apart, the
    /// newest an hour ago.
    pub fn seed_published_today(&self, category: Category, count: i64) {
        for i in 0..count {
            let at = self.now() - Duration::hours(1) - Duration::minutes(i * 5);
            self.store
                .seed_published(category, &format!("{category}-seed-{i}"), at);
        }
    }
}
