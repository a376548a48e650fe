use crate::schema::published_records;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{Int4, Nullable, Text, Timestamptz};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Alert category. Each category has its own daily cap and natural key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Whale,
    News,
    Token,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Whale, Category::News, Category::Token];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Whale => "whale",
            Self::News => "news",
            Self::Token => "token",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "whale" => Some(Self::Whale),
            "news" => Some(Self::News),
            "token" => Some(Self::Token),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a published record.
///
/// `pending` is a live claim held by one invocation. `posting` is written just
/// before the platform call; from then on the post may exist, so the row is
/// never reclaimed and counts as published until confirmed. `retry` means the
/// last attempt was throttled or failed and the key may be claimed again.
/// `abandoned` is the dead-letter state reached after too many hard failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Posting,
    Retry,
    Published,
    Abandoned,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Posting => "posting",
            Self::Retry => "retry",
            Self::Published => "published",
            Self::Abandoned => "abandoned",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "posting" => Some(Self::Posting),
            "retry" => Some(Self::Retry),
            "published" => Some(Self::Published),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = published_records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PublishedRecord {
    pub id: Uuid,
    pub category: String,
    pub natural_key: String,
    pub status: String,
    pub post_id: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub source_timestamp: DateTime<Utc>,
    pub content: Option<String>,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PublishedRecord {
    pub fn record_status(&self) -> Option<RecordStatus> {
        RecordStatus::parse(&self.status)
    }

    pub fn record_category(&self) -> Option<Category> {
        Category::parse(&self.category)
    }
}

/// A claim taken on a natural key just before the publish attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClaim {
    pub id: Uuid,
    pub category: Category,
    pub natural_key: String,
    pub source_timestamp: DateTime<Utc>,
    pub content: Option<String>,
    pub claimed_at: DateTime<Utc>,
}

impl NewClaim {
    pub fn new(
        category: Category,
        natural_key: String,
        source_timestamp: DateTime<Utc>,
        content: Option<String>,
        claimed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            category,
            natural_key,
            source_timestamp,
            content,
            claimed_at,
        }
    }
}

#[derive(QueryableByName)]
struct StatusRow {
    #[diesel(sql_type = Text)]
    status: String,
}

const CLAIM_SQL: &str = "\
INSERT INTO published_records \
    (id, category, natural_key, status, source_timestamp, content, attempts, claimed_at, created_at, updated_at) \
VALUES ($1, $2, $3, 'pending', $4, $5, 0, $6, $6, $6) \
ON CONFLICT (category, natural_key) DO UPDATE \
SET status = 'pending', content = EXCLUDED.content, claimed_at = EXCLUDED.claimed_at, updated_at = EXCLUDED.updated_at \
WHERE published_records.status = 'retry' \
   OR (published_records.status = 'pending' AND published_records.claimed_at < $7) \
RETURNING *";

/// Claims a natural key. Returns `None` when another invocation already holds
/// a live claim or the key has been published or abandoned.
pub async fn claim(
    conn: &mut AsyncPgConnection,
    new_claim: &NewClaim,
    stale_before: DateTime<Utc>,
) -> QueryResult<Option<PublishedRecord>> {
    diesel::sql_query(CLAIM_SQL)
        .bind::<diesel::sql_types::Uuid, _>(new_claim.id)
        .bind::<Text, _>(new_claim.category.as_str())
        .bind::<Text, _>(&new_claim.natural_key)
        .bind::<Timestamptz, _>(new_claim.source_timestamp)
        .bind::<Nullable<Text>, _>(new_claim.content.as_deref())
        .bind::<Timestamptz, _>(new_claim.claimed_at)
        .bind::<Timestamptz, _>(stale_before)
        .get_result::<PublishedRecord>(conn)
        .await
        .optional()
}

/// Moves a live claim to `posting`. Returns 0 when the claim was lost.
pub async fn mark_posting(
    conn: &mut AsyncPgConnection,
    record_id: Uuid,
    at: DateTime<Utc>,
) -> QueryResult<usize> {
    use crate::schema::published_records::dsl;

    diesel::update(
        dsl::published_records
            .find(record_id)
            .filter(dsl::status.eq(RecordStatus::Pending.as_str())),
    )
    .set((
        dsl::status.eq(RecordStatus::Posting.as_str()),
        dsl::updated_at.eq(at),
    ))
    .execute(conn)
    .await
}

pub async fn mark_published(
    conn: &mut AsyncPgConnection,
    record_id: Uuid,
    external_post_id: &str,
    at: DateTime<Utc>,
) -> QueryResult<usize> {
    use crate::schema::published_records::dsl;

    diesel::update(dsl::published_records.find(record_id))
        .set((
            dsl::status.eq(RecordStatus::Published.as_str()),
            dsl::post_id.eq(external_post_id),
            dsl::published_at.eq(at),
            dsl::updated_at.eq(at),
        ))
        .execute(conn)
        .await
}

/// Returns a throttled claim to the pool without counting an attempt.
pub async fn release(
    conn: &mut AsyncPgConnection,
    record_id: Uuid,
    at: DateTime<Utc>,
) -> QueryResult<usize> {
    use crate::schema::published_records::dsl;

    diesel::update(
        dsl::published_records
            .find(record_id)
            .filter(dsl::status.eq_any([RecordStatus::Pending.as_str(), RecordStatus::Posting.as_str()])),
    )
    .set((
        dsl::status.eq(RecordStatus::Retry.as_str()),
        dsl::updated_at.eq(at),
    ))
    .execute(conn)
    .await
}

const MARK_FAILED_SQL: &str = "\
UPDATE published_records \
SET attempts = attempts + 1, \
    last_error = $2, \
    updated_at = $3, \
    status = CASE WHEN attempts + 1 >= $4 THEN 'abandoned' ELSE 'retry' END \
WHERE id = $1 \
RETURNING status";

/// Records a hard failure and returns the resulting status.
pub async fn mark_failed(
    conn: &mut AsyncPgConnection,
    record_id: Uuid,
    error: &str,
    at: DateTime<Utc>,
    max_attempts: i32,
) -> QueryResult<RecordStatus> {
    let row = diesel::sql_query(MARK_FAILED_SQL)
        .bind::<diesel::sql_types::Uuid, _>(record_id)
        .bind::<Text, _>(error)
        .bind::<Timestamptz, _>(at)
        .bind::<Int4, _>(max_attempts)
        .get_result::<StatusRow>(conn)
        .await?;

    Ok(RecordStatus::parse(&row.status).unwrap_or(RecordStatus::Retry))
}

/// Keys among `keys` that may not be selected: published, posting, abandoned,
/// or held by a claim newer than `stale_before`.
pub async fn blocked_keys(
    conn: &mut AsyncPgConnection,
    category: Category,
    keys: &[String],
    stale_before: DateTime<Utc>,
) -> QueryResult<Vec<String>> {
    use crate::schema::published_records::dsl;

    if keys.is_empty() {
        return Ok(Vec::new());
    }

    dsl::published_records
        .filter(dsl::category.eq(category.as_str()))
        .filter(dsl::natural_key.eq_any(keys))
        .filter(
            dsl::status
                .eq_any([
                    RecordStatus::Published.as_str(),
                    RecordStatus::Posting.as_str(),
                    RecordStatus::Abandoned.as_str(),
                ])
                .or(dsl::status
                    .eq(RecordStatus::Pending.as_str())
                    .and(dsl::claimed_at.ge(stale_before))),
        )
        .select(dsl::natural_key)
        .load::<String>(conn)
        .await
}

/// Publishes per category in `[since, until)`. Unconfirmed `posting` rows
/// count at their claim time.
pub async fn published_counts(
    conn: &mut AsyncPgConnection,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> QueryResult<Vec<(String, i64)>> {
    use crate::schema::published_records::dsl;

    dsl::published_records
        .filter(
            dsl::status
                .eq(RecordStatus::Published.as_str())
                .and(dsl::published_at.ge(since))
                .and(dsl::published_at.lt(until))
                .or(dsl::status
                    .eq(RecordStatus::Posting.as_str())
                    .and(dsl::claimed_at.ge(since))
                    .and(dsl::claimed_at.lt(until))),
        )
        .group_by(dsl::category)
        .select((dsl::category, diesel::dsl::count_star()))
        .load::<(String, i64)>(conn)
        .await
}

pub async fn last_published_at(
    conn: &mut AsyncPgConnection,
) -> QueryResult<Option<DateTime<Utc>>> {
    use crate::schema::published_records::dsl;

    let published = dsl::published_records
        .filter(dsl::status.eq(RecordStatus::Published.as_str()))
        .select(diesel::dsl::max(dsl::published_at))
        .get_result::<Option<DateTime<Utc>>>(conn)
        .await?;
    let posting = dsl::published_records
        .filter(dsl::status.eq(RecordStatus::Posting.as_str()))
        .select(diesel::dsl::max(dsl::claimed_at))
        .get_result::<Option<DateTime<Utc>>>(conn)
        .await?;

    Ok(published.max(posting))
}
