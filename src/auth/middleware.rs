use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::AuthError;
use crate::AppContext;

pub const API_KEY_HEADER: &str = "X-API-Key";
pub const ADMIN_SECRET_HEADER: &str = "secret-key";

/// Bearer credential from `Authorization` (`Bearer <key>` or a bare key) or
/// from `X-API-Key`. Other authorization schemes are ignored.
pub fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .or_else(|| {
            headers
                .get(API_KEY_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
        })
        .filter(|key| !key.is_empty())
}

fn bearer_token(value: &str) -> Option<&str> {
    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(key), None, None) => Some(key),
        (Some(scheme), Some(key), None) if scheme.eq_ignore_ascii_case("bearer") => Some(key),
        _ => None,
    }
}

fn forbidden() -> Response {
    AuthError::Forbidden.into_response()
}

/// Lets a request through only with a valid, active, unexpired API key. The
/// rejection never says why, so it cannot be used to probe for key ids.
pub async fn require_api_key(State(ctx): State<Arc<AppContext>>, req: Request, next: Next) -> Response {
    let Some(api_key) = extract_api_key(req.headers()).map(str::to_owned) else {
        debug!("Rejecting request without API key");
        return forbidden();
    };

    match ctx.keys.validate(&api_key).await {
        Ok(true) => next.run(req).await,
        Ok(false) => forbidden(),
        Err(e) => e.into_response(),
    }
}

/// Gate for the administrative routes: compares the `secret-key` header with
/// the configured secret.
pub async fn require_admin_secret(State(ctx): State<Arc<AppContext>>, req: Request, next: Next) -> Response {
    let authorized = req
        .headers()
        .get(ADMIN_SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|provided| ctx.admin_secret.verify(provided));

    if authorized {
        next.run(req).await
    } else {
        debug!("Rejecting admin request with bad secret");
        forbidden()
    }
}
