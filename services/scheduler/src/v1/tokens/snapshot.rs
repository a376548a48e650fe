use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use postgres_models::models::TrackedToken;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::{
    errors::{AppError, AppResult},
    extractors::CronAuth,
    sources::TokenSnapshot,
    AppState,
};

const MAX_TOKENS: usize = 1_000;

#[derive(Debug, Deserialize)]
pub struct TokenSnapshotRequest {
    pub tokens: Vec<TokenSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct TokenSnapshotResponse {
    pub received: usize,
    pub upserted: usize,
}

fn validate(token: &TokenSnapshot) -> AppResult<()> {
    if token.address.trim().is_empty() || token.address.len() > 64 {
        return Err(AppError::bad_request("Invalid address: must be 1-64 characters"));
    }
    let m = &token.metrics;
    let finite = [m.progress, m.whale_inflows, m.hype, m.volume_change, m.rug_risk]
        .iter()
        .all(|v| v.is_finite());
    if !finite || !(0.0..=100.0).contains(&m.progress) {
        return Err(AppError::bad_request(format!(
            "Invalid metrics for token {}",
            token.address
        )));
    }
    Ok(())
}

/// One row per address, the last entry winning, in first-seen order. A batch
/// upsert may not touch the same row twice.
fn dedupe_by_address(tokens: Vec<TrackedToken>) -> Vec<TrackedToken> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<TrackedToken> = Vec::with_capacity(tokens.len());
    for token in tokens {
        match positions.get(&token.address) {
            Some(&index) => unique[index] = token,
            None => {
                positions.insert(token.address.clone(), unique.len());
                unique.push(token);
            }
        }
    }
    unique
}

/// Refreshes the tracked token snapshot, scoring every entry on the way in.
pub async fn handler(
    _auth: CronAuth,
    State(state): State<AppState>,
    payload: Result<Json<TokenSnapshotRequest>, JsonRejection>,
) -> AppResult<Json<TokenSnapshotResponse>> {
    let Json(request) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;

    if request.tokens.len() > MAX_TOKENS {
        return Err(AppError::bad_request(format!("At most {MAX_TOKENS} tokens per request")));
    }
    for token in &request.tokens {
        validate(token)?;
    }

    let now = state.clock.now();
    let received = request.tokens.len();
    let tracked = dedupe_by_address(
        request
            .tokens
            .into_iter()
            .map(|token| token.into_tracked(now))
            .collect(),
    );

    let upserted = state.stores.tokens.upsert_tokens(&tracked).await?;
    info!(received, upserted, "refreshed token snapshot");

    Ok(Json(TokenSnapshotResponse { received, upserted }))
}
