use axum::{extract::State, Json};
use chrono::{DateTime, NaiveDate, Utc};
use postgres_models::models::Category;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::{errors::AppResult, extractors::CronAuth, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryQuota {
    pub today_count: i64,
    pub cap: i64,
    pub remaining: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaResponse {
    pub date: NaiveDate,
    pub global_count: i64,
    pub global_cap: i64,
    pub categories: BTreeMap<Category, CategoryQuota>,
    pub last_published_at: Option<DateTime<Utc>>,
    pub resume_at: Option<DateTime<Utc>>,
}

/// Today's publish counts against their caps, and any active platform block.
pub async fn handler(_auth: CronAuth, State(state): State<AppState>) -> AppResult<Json<QuotaResponse>> {
    let now = state.clock.now();
    let quota = state.scheduler.ledger().snapshot(now).await?;
    let resume_at = state.scheduler.gate().blocked_until(now).await?;

    let categories = Category::ALL
        .into_iter()
        .map(|category| {
            let today_count = quota.count_today(category);
            let cap = quota.caps.cap_for(category);
            (
                category,
                CategoryQuota {
                    today_count,
                    cap,
                    remaining: (cap - today_count).max(0),
                },
            )
        })
        .collect();

    Ok(Json(QuotaResponse {
        date: now.date_naive(),
        global_count: quota.count_global_today(),
        global_cap: quota.caps.global,
        categories,
        last_published_at: quota.last_published_at,
        resume_at,
    }))
}
