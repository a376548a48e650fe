use crate::schema::token_cooldowns;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

/// Last publication of a bonding-curve token. `publish_count` doubles as the
/// generation suffix of the token's next natural key.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = token_cooldowns)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TokenCooldown {
    pub address: String,
    pub last_published_at: DateTime<Utc>,
    pub publish_count: i32,
}

pub async fn load_for(
    conn: &mut AsyncPgConnection,
    addresses: &[String],
) -> QueryResult<Vec<TokenCooldown>> {
    use crate::schema::token_cooldowns::dsl;

    if addresses.is_empty() {
        return Ok(Vec::new());
    }

    dsl::token_cooldowns
        .filter(dsl::address.eq_any(addresses))
        .select(TokenCooldown::as_select())
        .load(conn)
        .await
}

pub async fn record_publish(
    conn: &mut AsyncPgConnection,
    cooldown: &TokenCooldown,
) -> QueryResult<usize> {
    use crate::schema::token_cooldowns::dsl;

    diesel::insert_into(dsl::token_cooldowns)
        .values(cooldown)
        .on_conflict(dsl::address)
        .do_update()
        .set((
            dsl::last_published_at.eq(cooldown.last_published_at),
            dsl::publish_count.eq(cooldown.publish_count),
        ))
        .execute(conn)
        .await
}
