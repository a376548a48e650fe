use axum::{routing::get, Router};

use crate::AppState;

mod quota;

pub fn router() -> Router<AppState> {
    Router::new().route("/quota", get(quota::handler))
}
