use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::{qr_generator::EncodingError, registration::RegistrationError};
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error("Token encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::Store(StoreError::Unavailable(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Record store unavailable".to_string(),
            ),
            AppError::Store(StoreError::Conflict(msg)) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Store(StoreError::NotFound(msg)) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Encoding(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            AppError::Registration(e) => {
                let status = match e {
                    RegistrationError::Validation(_) => StatusCode::BAD_REQUEST,
                    RegistrationError::DuplicateEmail | RegistrationError::AlreadyRegistered => {
                        StatusCode::CONFLICT
                    }
                    RegistrationError::EventNotFound | RegistrationError::StudentNotFound => {
                        StatusCode::NOT_FOUND
                    }
                    RegistrationError::IncompleteProfile => StatusCode::UNPROCESSABLE_ENTITY,
                    RegistrationError::Encoding(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    RegistrationError::Store(StoreError::Unavailable(_)) => {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    RegistrationError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
                    RegistrationError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
                };
                (status, e.to_string())
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();

        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
        }

        let body = Json(json!({
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": error_message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
            (
                AppError::Store(StoreError::Unavailable("down".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AppError::Registration(RegistrationError::DuplicateEmail),
                StatusCode::CONFLICT,
            ),
            (
                AppError::Registration(RegistrationError::StudentNotFound),
                StatusCode::NOT_FOUND,
            ),
            (AppError::Validation("bad".into()), StatusCode::BAD_REQUEST),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
