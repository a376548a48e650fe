use crate::schema::whale_events;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upper bound on rows a single candidate query looks at.
const RECENT_LIMIT: i64 = 50;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = whale_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct WhaleEvent {
    pub id: Uuid,
    pub tx_hash: String,
    pub chain: String,
    pub symbol: String,
    pub amount: f64,
    pub amount_usd: f64,
    pub from_label: Option<String>,
    pub to_label: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Insertable)]
#[diesel(table_name = whale_events)]
pub struct NewWhaleEvent {
    pub id: Uuid,
    pub tx_hash: String,
    pub chain: String,
    pub symbol: String,
    pub amount: f64,
    pub amount_usd: f64,
    pub from_label: Option<String>,
    pub to_label: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl NewWhaleEvent {
    pub fn new(
        tx_hash: String,
        chain: String,
        symbol: String,
        amount: f64,
        amount_usd: f64,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx_hash,
            chain,
            symbol,
            amount,
            amount_usd,
            from_label: None,
            to_label: None,
            occurred_at,
        }
    }

    pub fn with_labels(mut self, from: Option<String>, to: Option<String>) -> Self {
        self.from_label = from;
        self.to_label = to;
        self
    }
}

/// Inserts detected transfers, skipping hashes that are already stored.
/// Returns the number of new rows.
pub async fn insert_many(
    conn: &mut AsyncPgConnection,
    events: &[NewWhaleEvent],
) -> QueryResult<usize> {
    use crate::schema::whale_events::dsl;

    if events.is_empty() {
        return Ok(0);
    }

    diesel::insert_into(dsl::whale_events)
        .values(events)
        .on_conflict(dsl::tx_hash)
        .do_nothing()
        .execute(conn)
        .await
}

/// Transfers at or above `min_usd` since `since`, largest first.
pub async fn recent(
    conn: &mut AsyncPgConnection,
    since: DateTime<Utc>,
    min_usd: f64,
) -> QueryResult<Vec<WhaleEvent>> {
    use crate::schema::whale_events::dsl;

    dsl::whale_events
        .filter(dsl::occurred_at.ge(since))
        .filter(dsl::amount_usd.ge(min_usd))
        .order(dsl::amount_usd.desc())
        .limit(RECENT_LIMIT)
        .select(WhaleEvent::as_select())
        .load(conn)
        .await
}
