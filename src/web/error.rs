use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::auth::AuthError;
use crate::utils::http::error_response;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::Conflict(msg) => error_response(StatusCode::CONFLICT, msg),
            AuthError::NotFound(msg) => error_response(StatusCode::NOT_FOUND, msg),
            AuthError::UnprocessableInput(msg) => error_response(StatusCode::UNPROCESSABLE_ENTITY, msg),
            AuthError::Forbidden => error_response(StatusCode::FORBIDDEN, "Forbidden"),
            AuthError::StoreUnavailable(detail) => {
                error!("Credential store unavailable: {}", detail);
                error_response(StatusCode::SERVICE_UNAVAILABLE, "Credential store unavailable")
            }
            AuthError::Internal(detail) => {
                error!("Internal error: {}", detail);
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        AuthError::UnprocessableInput(rejection.body_text())
    }
}

impl From<QueryRejection> for AuthError {
    fn from(rejection: QueryRejection) -> Self {
        AuthError::UnprocessableInput(rejection.body_text())
    }
}

impl From<PathRejection> for AuthError {
    fn from(rejection: PathRejection) -> Self {
        AuthError::UnprocessableInput(rejection.body_text())
    }
}
