use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::errors::AppError;
use crate::AppState;

/// Admits a request when it carries `Authorization: Bearer <CRON_SECRET>`, or
/// when no secret is configured.
pub struct CronAuth;

#[async_trait]
impl<S> FromRequestParts<S> for CronAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let Some(secret) = app_state.cron_secret.as_deref() else {
            return Ok(CronAuth);
        };

        let provided = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));

        match provided {
            Some(token) if constant_time_eq(token.trim().as_bytes(), secret.as_bytes()) => Ok(CronAuth),
            _ => {
                tracing::warn!(path = %parts.uri.path(), "rejected request without a valid bearer token");
                Err(AppError::unauthorized("Missing or invalid bearer token"))
            }
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
