use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
};

use crate::api::state::AppState;

/// Header carrying the organizer key on privileged requests
pub const ORGANIZER_KEY_HEADER: &str = "x-organizer-key";

/// Authentication error responses
#[derive(Debug)]
pub enum AuthError {
    MissingKey,
    InvalidKey,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::MissingKey => (
                StatusCode::UNAUTHORIZED,
                "Organizer access required. Provide the organizer key.",
            )
                .into_response(),
            AuthError::InvalidKey => {
                (StatusCode::UNAUTHORIZED, "Invalid organizer key.").into_response()
            }
        }
    }
}

/// Extractor that only succeeds for requests carrying a valid organizer key.
/// Add it as a handler argument to restrict the route to organizers.
#[derive(Debug, Clone, Copy)]
pub struct Organizer;

#[async_trait]
impl FromRequestParts<AppState> for Organizer {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(ORGANIZER_KEY_HEADER)
            .ok_or(AuthError::MissingKey)?
            .to_str()
            .map_err(|_| AuthError::InvalidKey)?;

        if !state.organizer_key.verify(presented) {
            tracing::warn!("Rejected request with invalid organizer key");
            return Err(AuthError::InvalidKey);
        }

        Ok(Organizer)
    }
}
