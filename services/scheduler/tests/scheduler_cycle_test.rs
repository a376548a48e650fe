mod common;

use alert_scheduler::adapters::PostResult;
use alert_scheduler::scheduler::outcome::Reason;
use alert_scheduler::store::{CooldownStore, RateLimitStore};
use chrono::Duration;
use common::*;
use postgres_models::models::{Category, TokenCooldown};
use std::sync::atomic::Ordering;

/// With a whale, a news and a token candidate available, the whale is posted
#[tokio::test]
async fn test_whale_wins_when_every_source_has_a_candidate() {
    let harness = TestHarness::new();
    harness.seed_whale("0xwhale", 12_000_000.0, 10).await;
    harness.seed_news("n-1", "tier10k", "JUST IN: SEC approves spot ETF", 5);
    harness.seed_token("frog", 85.0, 90.0).await;

    let outcome = harness.scheduler().run_cycle().await;

    assert!(outcome.success);
    assert_eq!(outcome.posted_count, 1);
    assert_eq!(outcome.category, Some(Category::Whale));
    assert_eq!(outcome.natural_key.as_deref(), Some("0xwhale"));
    assert_eq!(outcome.post_id.as_deref(), Some("post-1"));
    assert_eq!(outcome.mirrored, Some(true));
    assert_eq!(outcome.global_count, 1);

    let posts = harness.platform.posts();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].text.starts_with("🐋 WHALE ALERT"));
    assert_eq!(harness.mirror.mirrored().len(), 1);

    let record = harness.store.record(Category::Whale, "0xwhale").unwrap();
    assert_eq!(record.status, "published");
    assert_eq!(record.post_id.as_deref(), Some("post-1"));
}

/// An active platform block short-circuits before any source is queried
#[tokio::test]
async fn test_rate_limited_cycle_queries_no_source() {
    let harness = TestHarness::new();
    let now = harness.now();
    harness.seed_whale("0xwhale", 12_000_000.0, 10).await;
    harness
        .store
        .set_resume_at(Some(now + Duration::minutes(10)), now)
        .await
        .unwrap();

    let outcome = harness.scheduler().run_cycle().await;

    assert!(outcome.success);
    assert_eq!(outcome.posted_count, 0);
    assert_eq!(outcome.reason, Some(Reason::RateLimited));
    assert_eq!(outcome.resume_at, Some(now + Duration::minutes(10)));
    assert_eq!(harness.source_queries(), 0);
    assert!(harness.platform.posts().is_empty());
}

/// House-account news is posted even when the news cap is used up
#[tokio::test]
async fn test_house_account_bypasses_news_cap() {
    let harness = TestHarness::new();
    harness.seed_published_today(Category::News, 12);
    harness.seed_news("n-1", "tier10k", "BREAKING: SEC approves ETF", 3);
    harness.seed_news("h-1", HOUSE_ACCOUNT, "Our weekly market wrap is live", 40);

    let outcome = harness.scheduler().run_cycle().await;

    assert!(outcome.success);
    assert_eq!(outcome.posted_count, 1);
    assert_eq!(outcome.category, Some(Category::News));
    assert_eq!(outcome.natural_key.as_deref(), Some("h-1"));
    assert_eq!(outcome.global_count, 13);
}

/// Without a house account a full news category is not even queried
#[tokio::test]
async fn test_full_category_reports_category_limit() {
    let mut config = TestData::config();
    config.news_house_account = None;
    let harness = TestHarness::with_config(config);
    harness.seed_published_today(Category::News, 12);
    harness.seed_news("n-1", "tier10k", "BREAKING: SEC approves ETF", 3);

    let outcome = harness.scheduler().run_cycle().await;

    assert!(outcome.success);
    assert_eq!(outcome.reason, Some(Reason::CategoryLimit));
    assert!(!outcome.diagnostics[&Category::News].queried);
    assert_eq!(harness.source_queries(), 2);
}

/// Reaching the global cap stops the cycle before candidates are gathered
#[tokio::test]
async fn test_global_cap_reports_daily_limit() {
    let harness = TestHarness::new();
    harness.seed_published_today(Category::Whale, 2);
    harness.seed_published_today(Category::News, 12);
    harness.seed_published_today(Category::Token, 1);
    harness.seed_whale("0xwhale", 12_000_000.0, 10).await;

    let outcome = harness.scheduler().run_cycle().await;

    assert!(outcome.success);
    assert_eq!(outcome.reason, Some(Reason::DailyLimit));
    assert_eq!(outcome.global_count, 15);
    assert_eq!(harness.source_queries(), 0);
}

/// A publish five minutes ago blocks the next one under a 15 minute interval
#[tokio::test]
async fn test_minimum_interval_between_posts() {
    let harness = TestHarness::new();
    let now = harness.now();
    harness
        .store
        .seed_published(Category::Token, "old:0", now - Duration::minutes(5));
    harness.seed_whale("0xwhale", 12_000_000.0, 10).await;

    let outcome = harness.scheduler().run_cycle().await;

    assert!(outcome.success);
    assert_eq!(outcome.reason, Some(Reason::MinInterval));
    assert!(harness.platform.posts().is_empty());
}

/// A token published 10 hours ago stays out under a 48 hour cooldown
#[tokio::test]
async fn test_token_cooldown_excludes_recently_posted_token() {
    let mut config = TestData::config();
    config.caps.token = 2;
    let harness = TestHarness::with_config(config);
    let now = harness.now();

    harness.seed_token("best", 95.0, 90.0).await;
    harness.seed_token("next", 80.0, 75.0).await;
    harness
        .store
        .seed_published(Category::Token, "best:0", now - Duration::hours(10));
    harness
        .store
        .record_publish(&TokenCooldown {
            address: "best".into(),
            last_published_at: now - Duration::hours(10),
            publish_count: 1,
        })
        .await
        .unwrap();

    let outcome = harness.scheduler().run_cycle().await;

    assert_eq!(outcome.posted_count, 1);
    assert_eq!(outcome.natural_key.as_deref(), Some("next:0"));
    assert_eq!(outcome.mirrored, None);

    let cooldowns = harness.store.cooldowns(&["next".to_string()]).await.unwrap();
    assert_eq!(cooldowns["next"].publish_count, 1);
    assert_eq!(cooldowns["next"].last_published_at, now);
}

/// A throttled post blocks the gate and stays eligible once the block expires
#[tokio::test]
async fn test_throttle_blocks_then_retries_same_candidate() {
    let harness = TestHarness::new();
    let scheduler = harness.scheduler();
    let now = harness.now();
    harness.seed_whale("0xwhale", 12_000_000.0, 10).await;
    harness.platform.push_result(PostResult::RateLimited {
        reset_at: Some(now + Duration::minutes(7)),
    });

    let throttled = scheduler.run_cycle().await;

    assert!(throttled.success);
    assert_eq!(throttled.posted_count, 0);
    assert_eq!(throttled.reason, Some(Reason::RateLimited));
    assert_eq!(throttled.resume_at, Some(now + Duration::minutes(7)));
    let record = harness.store.record(Category::Whale, "0xwhale").unwrap();
    assert_eq!(record.status, "retry");
    assert_eq!(record.attempts, 0);

    harness.clock.advance(Duration::minutes(8));
    let retried = scheduler.run_cycle().await;

    assert_eq!(retried.posted_count, 1);
    assert_eq!(retried.natural_key.as_deref(), Some("0xwhale"));
    assert_eq!(harness.platform.posts().len(), 2);
}

/// A throttle without a reset time falls back to a 20 minute block
#[tokio::test]
async fn test_throttle_without_reset_uses_fallback() {
    let harness = TestHarness::new();
    let now = harness.now();
    harness.seed_whale("0xwhale", 12_000_000.0, 10).await;
    harness
        .platform
        .push_result(PostResult::RateLimited { reset_at: None });

    let outcome = harness.scheduler().run_cycle().await;

    assert_eq!(outcome.reason, Some(Reason::RateLimited));
    assert_eq!(outcome.resume_at, Some(now + Duration::minutes(20)));
}

/// The mirror failing does not fail the cycle
#[tokio::test]
async fn test_mirror_failure_is_best_effort() {
    let harness = TestHarness::new();
    harness.mirror.fail.store(true, Ordering::SeqCst);
    harness.seed_whale("0xwhale", 12_000_000.0, 10).await;

    let outcome = harness.scheduler().run_cycle().await;

    assert!(outcome.success);
    assert_eq!(outcome.posted_count, 1);
    assert_eq!(outcome.mirrored, Some(false));
}

/// Missing posting credentials fail fast without touching any source
#[tokio::test]
async fn test_missing_credentials_is_configuration_error() {
    let harness = TestHarness::new();
    harness.platform.set_unconfigured();
    harness.seed_whale("0xwhale", 12_000_000.0, 10).await;

    let outcome = harness.scheduler().run_cycle().await;

    assert!(!outcome.success);
    assert_eq!(outcome.reason, Some(Reason::ConfigurationError));
    assert!(outcome.error.is_some());
    assert_eq!(harness.source_queries(), 0);
}

/// An unreachable store aborts the cycle with a structured outcome
#[tokio::test]
async fn test_store_outage_reports_store_unavailable() {
    let harness = TestHarness::new();
    harness.seed_whale("0xwhale", 12_000_000.0, 10).await;
    harness.store.set_unavailable(true);

    let outcome = harness.scheduler().run_cycle().await;

    assert!(!outcome.success);
    assert_eq!(outcome.posted_count, 0);
    assert_eq!(outcome.reason, Some(Reason::StoreUnavailable));
}

/// A failing feed only removes news from this cycle
#[tokio::test]
async fn test_failing_source_does_not_abort_cycle() {
    let harness = TestHarness::new();
    harness.feed.failing.store(true, Ordering::SeqCst);
    harness.seed_token("frog", 85.0, 90.0).await;

    let outcome = harness.scheduler().run_cycle().await;

    assert!(outcome.success);
    assert_eq!(outcome.category, Some(Category::Token));
    assert_eq!(outcome.natural_key.as_deref(), Some("frog:0"));
    let news = &outcome.diagnostics[&Category::News];
    assert!(news.queried);
    assert!(news.error.is_some());
}

/// A hard platform failure is reported and counted against the key
#[tokio::test]
async fn test_hard_failure_reports_publish_failed() {
    let harness = TestHarness::new();
    harness.seed_whale("0xwhale", 12_000_000.0, 10).await;
    harness.platform.push_result(PostResult::Failed {
        reason: "platform returned 400 Bad Request".into(),
    });

    let outcome = harness.scheduler().run_cycle().await;

    assert!(!outcome.success);
    assert_eq!(outcome.reason, Some(Reason::PublishFailed));
    assert!(outcome.error.as_deref().unwrap().contains("400"));

    let record = harness.store.record(Category::Whale, "0xwhale").unwrap();
    assert_eq!(record.status, "retry");
    assert_eq!(record.attempts, 1);
}

/// Nothing to post is a successful no-op
#[tokio::test]
async fn test_empty_sources_report_no_candidates() {
    let harness = TestHarness::new();

    let outcome = harness.scheduler().run_cycle().await;

    assert!(outcome.success);
    assert_eq!(outcome.posted_count, 0);
    assert_eq!(outcome.reason, Some(Reason::NoCandidates));
    assert_eq!(harness.source_queries(), 3);
}
