use anyhow::{bail, Context, Result};
use chrono::Duration;
use std::str::FromStr;

use crate::scheduler::quota::QuotaCaps;

const DEFAULT_NEWS_ACCOUNTS: &[&str] = &[
    "WatcherGuru",
    "tier10k",
    "DeItaone",
    "WuBlockchain",
    "Cointelegraph",
    "CoinDesk",
    "BitcoinMagazine",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub redis_url: String,
    pub environment: String,
    pub cron_secret: Option<String>,
    pub x_api_base_url: String,
    pub x_bearer_token: Option<String>,
    pub x_user_access_token: Option<String>,
    pub discord_webhook_url: Option<String>,
    pub scheduler: SchedulerConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            port: var_or("PORT", 3000)?,
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            environment: std::env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            cron_secret: optional_var("CRON_SECRET"),
            x_api_base_url: std::env::var("X_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.twitter.com".to_string()),
            x_bearer_token: optional_var("X_BEARER_TOKEN"),
            x_user_access_token: optional_var("X_USER_ACCESS_TOKEN"),
            discord_webhook_url: optional_var("DISCORD_WEBHOOK_URL"),
            scheduler: SchedulerConfig::from_env()?,
        })
    }
}

/// Policy knobs for the publication scheduler. Changing them changes which
/// items get posted and when, never the shape of a cycle.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub caps: QuotaCaps,
    pub min_post_interval: Duration,
    pub whale_lookback: Duration,
    pub whale_detect_min_usd: f64,
    pub whale_post_min_usd: f64,
    pub token_repost_cooldown: Duration,
    pub token_min_progress: f64,
    pub token_min_score: f64,
    /// Snapshots not refreshed within this window no longer produce candidates.
    pub token_snapshot_max_age: Duration,
    pub news_accounts: Vec<String>,
    pub news_house_account: Option<String>,
    pub news_max_age: Duration,
    pub news_fresh_window: Duration,
    pub news_fetch_delay: std::time::Duration,
    pub news_cache_ttl_seconds: u64,
    pub rate_limit_fallback: Duration,
    pub publish_max_attempts: i32,
    pub claim_ttl: Duration,
    pub store_timeout: std::time::Duration,
    pub platform_timeout: std::time::Duration,
    pub post_max_chars: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            caps: QuotaCaps::default(),
            min_post_interval: Duration::minutes(15),
            whale_lookback: Duration::minutes(90),
            whale_detect_min_usd: 1_000_000.0,
            whale_post_min_usd: 5_000_000.0,
            token_repost_cooldown: Duration::hours(48),
            token_min_progress: 69.0,
            token_min_score: 72.0,
            token_snapshot_max_age: Duration::minutes(120),
            news_accounts: DEFAULT_NEWS_ACCOUNTS.iter().map(|a| a.to_string()).collect(),
            news_house_account: None,
            news_max_age: Duration::minutes(30),
            news_fresh_window: Duration::minutes(15),
            news_fetch_delay: std::time::Duration::from_millis(1100),
            news_cache_ttl_seconds: 300,
            rate_limit_fallback: Duration::minutes(20),
            publish_max_attempts: 3,
            claim_ttl: Duration::minutes(10),
            store_timeout: std::time::Duration::from_secs(5),
            platform_timeout: std::time::Duration::from_secs(30),
            post_max_chars: 280,
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            caps: QuotaCaps {
                whale: var_or("WHALE_DAILY_CAP", defaults.caps.whale)?,
                news: var_or("NEWS_DAILY_CAP", defaults.caps.news)?,
                token: var_or("TOKEN_DAILY_CAP", defaults.caps.token)?,
                global: var_or("GLOBAL_DAILY_CAP", defaults.caps.global)?,
            },
            min_post_interval: Duration::minutes(var_or("MIN_POST_INTERVAL_MINUTES", 15)?),
            whale_lookback: Duration::minutes(var_or("WHALE_LOOKBACK_MINUTES", 90)?),
            whale_detect_min_usd: var_or("WHALE_DETECT_MIN_USD", defaults.whale_detect_min_usd)?,
            whale_post_min_usd: var_or("WHALE_POST_MIN_USD", defaults.whale_post_min_usd)?,
            token_repost_cooldown: Duration::hours(var_or("TOKEN_REPOST_COOLDOWN_HOURS", 48)?),
            token_min_progress: var_or("TOKEN_MIN_PROGRESS", defaults.token_min_progress)?,
            token_min_score: var_or("TOKEN_MIN_SCORE", defaults.token_min_score)?,
            token_snapshot_max_age: Duration::minutes(var_or("TOKEN_SNAPSHOT_MAX_AGE_MINUTES", 120)?),
            news_accounts: optional_var("NEWS_ACCOUNTS")
                .map(|raw| parse_accounts(&raw))
                .unwrap_or(defaults.news_accounts),
            news_house_account: optional_var("NEWS_HOUSE_ACCOUNT")
                .map(|handle| handle.trim_start_matches('@').to_string()),
            news_max_age: Duration::minutes(var_or("NEWS_MAX_AGE_MINUTES", 30)?),
            news_fresh_window: Duration::minutes(var_or("NEWS_FRESH_MINUTES", 15)?),
            news_fetch_delay: std::time::Duration::from_millis(var_or("NEWS_FETCH_DELAY_MS", 1100)?),
            news_cache_ttl_seconds: var_or("NEWS_CACHE_TTL_SECONDS", defaults.news_cache_ttl_seconds)?,
            rate_limit_fallback: Duration::minutes(var_or("RATE_LIMIT_FALLBACK_MINUTES", 20)?),
            publish_max_attempts: var_or("PUBLISH_MAX_ATTEMPTS", defaults.publish_max_attempts)?,
            claim_ttl: Duration::minutes(var_or("CLAIM_TTL_MINUTES", 10)?),
            store_timeout: std::time::Duration::from_secs(var_or("STORE_TIMEOUT_SECONDS", 5)?),
            platform_timeout: std::time::Duration::from_secs(var_or("PLATFORM_TIMEOUT_SECONDS", 30)?),
            post_max_chars: var_or("POST_MAX_CHARS", defaults.post_max_chars)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.whale_post_min_usd < self.whale_detect_min_usd {
            bail!("WHALE_POST_MIN_USD must not be lower than WHALE_DETECT_MIN_USD");
        }
        if self.publish_max_attempts < 1 {
            bail!("PUBLISH_MAX_ATTEMPTS must be at least 1");
        }
        if self.token_snapshot_max_age <= Duration::zero() {
            bail!("TOKEN_SNAPSHOT_MAX_AGE_MINUTES must be positive");
        }
        if self.post_max_chars < 32 {
            bail!("POST_MAX_CHARS is too small to hold an alert");
        }
        Ok(())
    }
}

fn optional_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn var_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_var(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        None => Ok(default),
    }
}

fn parse_accounts(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|handle| handle.trim().trim_start_matches('@').to_string())
        .filter(|handle| !handle.is_empty())
        .collect()
}
