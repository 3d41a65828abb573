use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::{Deserialize, Serialize};

/// Envelope shared by every JSON response: `code` is 0 on success and the
/// HTTP status otherwise.
#[derive(Debug, Deserialize, Serialize)]
pub struct HttpResponse<T> {
    pub code: u16,
    pub message: String,
    pub body: T,
}

impl<T> HttpResponse<T> {
    pub fn new(code: u16, message: String, body: T) -> Self {
        Self { code, message, body }
    }

    pub fn ok(body: T) -> Self {
        Self::new(0, "ok".to_string(), body)
    }
}

/// Builds an error response with an empty body.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let response = HttpResponse::new(status.as_u16(), message.into(), None::<()>);
    (status, Json(response)).into_response()
}
