use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::{DateTime, Utc};
use postgres_models::models::NewWhaleEvent;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    errors::{AppError, AppResult},
    extractors::CronAuth,
    sources::whale::detect,
    AppState,
};

const MAX_TRANSFERS: usize = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestWhaleEventsRequest {
    pub transfers: Vec<TransferInput>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferInput {
    pub tx_hash: String,
    pub chain: String,
    pub symbol: String,
    pub amount: f64,
    pub amount_usd: f64,
    #[serde(default)]
    pub from_label: Option<String>,
    #[serde(default)]
    pub to_label: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct IngestWhaleEventsResponse {
    pub received: usize,
    pub stored: usize,
}

fn validate(transfer: &TransferInput) -> AppResult<()> {
    if transfer.tx_hash.trim().is_empty() || transfer.tx_hash.len() > 128 {
        return Err(AppError::bad_request("Invalid txHash: must be 1-128 characters"));
    }
    if transfer.chain.trim().is_empty() || transfer.symbol.trim().is_empty() {
        return Err(AppError::bad_request("chain and symbol are required"));
    }
    if !transfer.amount.is_finite() || !transfer.amount_usd.is_finite() || transfer.amount_usd < 0.0 {
        return Err(AppError::bad_request(format!(
            "Invalid amounts for transfer {}",
            transfer.tx_hash
        )));
    }
    Ok(())
}

/// Stores detected whale transfers. Transfers below the detection threshold
/// are accepted but not stored; hashes already stored are skipped.
pub async fn handler(
    _auth: CronAuth,
    State(state): State<AppState>,
    payload: Result<Json<IngestWhaleEventsRequest>, JsonRejection>,
) -> AppResult<Json<IngestWhaleEventsResponse>> {
    let Json(request) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;

    if request.transfers.len() > MAX_TRANSFERS {
        return Err(AppError::bad_request(format!(
            "At most {MAX_TRANSFERS} transfers per request"
        )));
    }
    for transfer in &request.transfers {
        validate(transfer)?;
    }

    let received = request.transfers.len();
    let events = detect(
        request.transfers.into_iter().map(|t| {
            NewWhaleEvent::new(
                t.tx_hash.trim().to_string(),
                t.chain.trim().to_lowercase(),
                t.symbol.trim().to_uppercase(),
                t.amount,
                t.amount_usd,
                t.occurred_at,
            )
            .with_labels(t.from_label, t.to_label)
        }),
        state.settings.whale_detect_min_usd,
    );

    let stored = state.stores.whales.insert_whale_events(&events).await?;
    info!(received, detected = events.len(), stored, "ingested whale transfers");

    Ok(Json(IngestWhaleEventsResponse { received, stored }))
}
