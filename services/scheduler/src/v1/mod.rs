use axum::Router;

use crate::AppState;

mod alerts;
mod cron;
mod tokens;
mod whales;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/cron", cron::router())
        .nest("/whales", whales::router())
        .nest("/tokens", tokens::router())
        .nest("/alerts", alerts::router())
}
