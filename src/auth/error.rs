use thiserror::Error;

use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    UnprocessableInput(String),

    #[error("forbidden")]
    Forbidden,

    #[error("credential store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict => AuthError::Conflict(
                "This user already exists. Please choose another username or email.".to_string(),
            ),
            StoreError::NotFound => AuthError::NotFound("API key not found".to_string()),
            StoreError::Malformed { .. } | StoreError::HorizonOutOfRange(_) => {
                AuthError::Internal(error.to_string())
            }
            StoreError::Unavailable(e) => AuthError::StoreUnavailable(e.to_string()),
        }
    }
}
