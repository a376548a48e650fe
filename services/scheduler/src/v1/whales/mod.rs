use axum::{routing::post, Router};

use crate::AppState;

mod ingest;

pub fn router() -> Router<AppState> {
    Router::new().route("/events", post(ingest::handler))
}
