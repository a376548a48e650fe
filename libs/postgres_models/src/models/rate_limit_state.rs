use crate::schema::rate_limit_state;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

/// Primary key of the only row in `rate_limit_state`.
pub const SINGLETON_ID: i32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = rate_limit_state)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RateLimitState {
    pub id: i32,
    pub resume_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

pub async fn load(conn: &mut AsyncPgConnection) -> QueryResult<Option<RateLimitState>> {
    use crate::schema::rate_limit_state::dsl;

    dsl::rate_limit_state
        .find(SINGLETON_ID)
        .select(RateLimitState::as_select())
        .first(conn)
        .await
        .optional()
}

/// Upserts the singleton row. Last writer wins.
pub async fn store_resume_at(
    conn: &mut AsyncPgConnection,
    resume_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> QueryResult<usize> {
    use crate::schema::rate_limit_state::dsl;

    diesel::insert_into(dsl::rate_limit_state)
        .values((
            dsl::id.eq(SINGLETON_ID),
            dsl::resume_at.eq(resume_at),
            dsl::updated_at.eq(now),
        ))
        .on_conflict(dsl::id)
        .do_update()
        .set((dsl::resume_at.eq(resume_at), dsl::updated_at.eq(now)))
        .execute(conn)
        .await
}
