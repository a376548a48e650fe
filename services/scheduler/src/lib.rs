use axum::{routing::get, Json, Router};
use redis_cache::JsonCache;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub mod adapters;
pub mod clock;
pub mod config;
pub mod errors;
pub mod extractors;
pub mod scheduler;
pub mod sources;
pub mod store;
pub mod v1;

use crate::adapters::{CachedFeed, DiscordWebhook, MirrorChannel, XClient, XFeed};
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, SchedulerConfig};
use crate::scheduler::Scheduler;
use crate::store::{PgStore, Stores};

const FEED_CACHE_NAMESPACE: &str = "alerts:feed";

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    pub stores: Stores,
    pub settings: Arc<SchedulerConfig>,
    pub cron_secret: Option<String>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let db_pool = postgres_models::create_pool(&config.database_url).await
            .map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?;
        let redis_pool = redis_cache::create_pool(&config.redis_url).await
            .map_err(|e| anyhow::anyhow!("Failed to create Redis pool: {}", e))?;

        let settings = &config.scheduler;
        let stores = Stores::shared(Arc::new(PgStore::new(db_pool, settings.store_timeout)));

        let platform = Arc::new(XClient::new(
            &config.x_api_base_url,
            config.x_user_access_token.clone(),
            settings.platform_timeout,
        )?);
        let mirror: Option<Arc<dyn MirrorChannel>> = match &config.discord_webhook_url {
            Some(url) => Some(Arc::new(DiscordWebhook::new(url, settings.platform_timeout)?)),
            None => None,
        };
        let feed = Arc::new(CachedFeed::new(
            Arc::new(XFeed::new(
                &config.x_api_base_url,
                config.x_bearer_token.clone(),
                settings.platform_timeout,
            )?),
            Arc::new(JsonCache::new(redis_pool, FEED_CACHE_NAMESPACE)),
            settings.news_cache_ttl_seconds,
        ));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let scheduler = Scheduler::new(settings, &stores, platform, mirror, feed, clock.clone());

        Ok(Self::from_parts(
            scheduler,
            stores,
            settings.clone(),
            config.cron_secret.clone(),
            clock,
        ))
    }

    pub fn from_parts(
        scheduler: Scheduler,
        stores: Stores,
        settings: SchedulerConfig,
        cron_secret: Option<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            scheduler: Arc::new(scheduler),
            stores,
            settings: Arc::new(settings),
            cron_secret,
            clock,
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "alert-scheduler"
    }))
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/v1", v1::router())
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
