use axum::{routing::post, Router};

use crate::AppState;

mod snapshot;

pub fn router() -> Router<AppState> {
    Router::new().route("/snapshot", post(snapshot::handler))
}
