use crate::schema::tracked_tokens;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

const QUALIFYING_LIMIT: i64 = 50;

/// Latest snapshot of a bonding-curve token. `score` is the composite score
/// computed when the snapshot was ingested.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = tracked_tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TrackedToken {
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub progress: f64,
    pub whale_inflows: f64,
    pub hype: f64,
    pub volume_change: f64,
    pub rug_risk: f64,
    pub score: f64,
    pub image_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

pub async fn upsert_many(
    conn: &mut AsyncPgConnection,
    tokens: &[TrackedToken],
) -> QueryResult<usize> {
    use crate::schema::tracked_tokens::dsl;

    if tokens.is_empty() {
        return Ok(0);
    }

    diesel::insert_into(dsl::tracked_tokens)
        .values(tokens)
        .on_conflict(dsl::address)
        .do_update()
        .set((
            dsl::name.eq(excluded(dsl::name)),
            dsl::symbol.eq(excluded(dsl::symbol)),
            dsl::progress.eq(excluded(dsl::progress)),
            dsl::whale_inflows.eq(excluded(dsl::whale_inflows)),
            dsl::hype.eq(excluded(dsl::hype)),
            dsl::volume_change.eq(excluded(dsl::volume_change)),
            dsl::rug_risk.eq(excluded(dsl::rug_risk)),
            dsl::score.eq(excluded(dsl::score)),
            dsl::image_url.eq(excluded(dsl::image_url)),
            dsl::updated_at.eq(excluded(dsl::updated_at)),
        ))
        .execute(conn)
        .await
}

/// Tokens refreshed since `updated_since` at or above both thresholds, best
/// score first and progress as the tie-breaker.
pub async fn qualifying(
    conn: &mut AsyncPgConnection,
    min_progress: f64,
    min_score: f64,
    updated_since: DateTime<Utc>,
) -> QueryResult<Vec<TrackedToken>> {
    use crate::schema::tracked_tokens::dsl;

    dsl::tracked_tokens
        .filter(dsl::updated_at.ge(updated_since))
        .filter(dsl::progress.ge(min_progress))
        .filter(dsl::score.ge(min_score))
        .order((dsl::score.desc(), dsl::progress.desc()))
        .limit(QUALIFYING_LIMIT)
        .select(TrackedToken::as_select())
        .load(conn)
        .await
}
