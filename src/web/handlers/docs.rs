use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::utils::http::HttpResponse;
use crate::AppContext;

use std::sync::Arc;

pub fn docs_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/openapi.json", get(openapi))
        .route("/health", get(health))
        .with_state(ctx)
}

async fn health() -> Json<HttpResponse<Value>> {
    Json(HttpResponse::ok(json!({
        "status": "up",
        "version": env!("CARGO_PKG_VERSION"),
        "git": env!("GIT_HASH"),
    })))
}

async fn openapi(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    Json(describe(&ctx))
}

/// API description. Admin paths are left out when they are meant to stay
/// unpublished; the routes themselves are still served.
pub fn describe(ctx: &AppContext) -> Value {
    let mut paths = serde_json::Map::new();

    paths.insert(
        "/health".to_string(),
        json!({ "get": { "summary": "Service liveness and version" } }),
    );

    if ctx.transformer.is_some() {
        paths.insert(
            "/cartoonify".to_string(),
            json!({ "post": {
                "summary": "Cartoonify an image",
                "security": [{ "apiKey": [] }],
                "requestBody": { "content": { "application/octet-stream": {} } },
                "responses": { "200": { "content": { "image/png": {} } }, "403": {} }
            }}),
        );
    }

    if !ctx.hide_admin_docs {
        let admin = json!([{ "adminSecret": [] }]);
        paths.insert(
            "/auth/api-keys".to_string(),
            json!({ "post": { "summary": "Issue a new API key", "security": admin.clone() } }),
        );
        paths.insert(
            "/auth/api-keys/{key_id}".to_string(),
            json!({ "delete": { "summary": "Revoke an API key", "security": admin.clone() } }),
        );
        paths.insert(
            "/auth/api-keys/{key_id}/renew".to_string(),
            json!({ "post": {
                "summary": "Renew an API key, reactivating it if revoked",
                "security": admin.clone(),
                "parameters": [{ "name": "expiration_date", "in": "query", "required": false }]
            }}),
        );
        paths.insert(
            "/auth/usage".to_string(),
            json!({ "get": { "summary": "Usage of every API key", "security": admin.clone() } }),
        );
    }

    json!({
        "openapi": "3.0.3",
        "info": { "title": "keygate", "version": env!("CARGO_PKG_VERSION") },
        "paths": Value::Object(paths),
        "components": { "securitySchemes": {
            "apiKey": { "type": "http", "scheme": "bearer" },
            "adminSecret": { "type": "apiKey", "in": "header", "name": "secret-key" }
        }}
    })
}
