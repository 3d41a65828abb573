use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use tracing::{error, info};

use crate::auth::require_api_key;
use crate::utils::http::error_response;
use crate::AppContext;

use std::sync::Arc;

/// The protected endpoint: only callers with a valid API key get through.
pub fn cartoon_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/cartoonify", post(cartoonify))
        .route_layer(middleware::from_fn_with_state(ctx.clone(), require_api_key))
        .layer(DefaultBodyLimit::max(ctx.max_image_bytes))
        .with_state(ctx)
}

async fn cartoonify(State(ctx): State<Arc<AppContext>>, body: Result<Bytes, BytesRejection>) -> Response {
    // keeps the rejection status (413 over the body limit) inside the envelope
    let body = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(rejection.status(), rejection.body_text()),
    };

    let Some(transformer) = ctx.transformer.clone() else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "Cartoonifier is not configured");
    };

    if body.is_empty() {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, "Request body must contain an image");
    }

    match transformer.transform(body.to_vec()).await {
        Ok(image) => {
            info!("Cartoonified image of {} bytes", body.len());
            ([(header::CONTENT_TYPE, "image/png")], image).into_response()
        }
        Err(e) => {
            error!("Failed to cartoonify image: {}", e);
            error_response(StatusCode::BAD_GATEWAY, "Failed to transform image")
        }
    }
}
