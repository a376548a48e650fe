use axum::{routing::get, Router};

use crate::AppState;

mod publish;

pub fn router() -> Router<AppState> {
    Router::new().route("/publish-alerts", get(publish::handler).post(publish::handler))
}
