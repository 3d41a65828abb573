use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::credentials::{check_password_strength, hash_password, validate_email, validate_username};
use crate::auth::{require_admin_secret, AuthError, UsageLogs};
use crate::utils::http::HttpResponse;
use crate::AppContext;

use std::sync::Arc;

/// Administrative routes, all behind the shared secret.
pub fn auth_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/api-keys", post(issue_api_key))
        .route("/api-keys/:key_id", delete(revoke_api_key))
        .route("/api-keys/:key_id/renew", post(renew_api_key))
        .route("/usage", get(usage_logs))
        .route_layer(middleware::from_fn_with_state(ctx.clone(), require_admin_secret))
        .with_state(ctx)
}

#[derive(Deserialize)]
pub struct IssueApiKeyRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub never_expires: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IssuedApiKey {
    pub key_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RenewQuery {
    #[serde(default, alias = "expiration-date")]
    pub expiration_date: Option<String>,
}

async fn issue_api_key(
    State(ctx): State<Arc<AppContext>>,
    payload: Result<Json<IssueApiKeyRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<HttpResponse<IssuedApiKey>>), AuthError> {
    let Json(req) = payload?;
    let username = validate_username(&req.username)?;
    let email = validate_email(&req.email)?;
    check_password_strength(&req.password)?;
    let password_hash = hash_password(req.password).await?;

    let key_id = ctx.keys.issue(username, email, password_hash, req.never_expires).await?;

    Ok((StatusCode::CREATED, Json(HttpResponse::ok(IssuedApiKey { key_id }))))
}

async fn revoke_api_key(
    State(ctx): State<Arc<AppContext>>,
    key_id: Result<Path<String>, PathRejection>,
) -> Result<Json<HttpResponse<()>>, AuthError> {
    let Path(key_id) = key_id?;
    ctx.keys.revoke(&key_id).await?;
    Ok(Json(HttpResponse::ok(())))
}

async fn renew_api_key(
    State(ctx): State<Arc<AppContext>>,
    key_id: Result<Path<String>, PathRejection>,
    query: Result<Query<RenewQuery>, QueryRejection>,
) -> Result<Json<HttpResponse<String>>, AuthError> {
    let Path(key_id) = key_id?;
    let Query(query) = query?;
    let message = ctx.keys.renew(&key_id, query.expiration_date.as_deref()).await?;
    Ok(Json(HttpResponse::ok(message)))
}

async fn usage_logs(State(ctx): State<Arc<AppContext>>) -> Result<Json<HttpResponse<UsageLogs>>, AuthError> {
    let report = ctx.reporter.report().await?;
    info!("Reporting usage for {} API keys", report.logs.len());
    Ok(Json(HttpResponse::ok(report)))
}
