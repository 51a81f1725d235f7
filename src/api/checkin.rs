use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{middleware::auth::Organizer, state::AppState};
use crate::models::Student;
use crate::services::check_in::{self, CheckInResult, Rejection};

#[derive(Debug, Deserialize)]
pub struct CheckInRequest {
    /// Raw text decoded from the scanned QR code
    pub payload: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckInResponse {
    pub result: String, // "applied", "already_checked_in", "malformed_token", ...
    pub confirmed: bool,
    pub message: String,
    pub student: Option<Student>,
    pub checked_in_at: Option<DateTime<Utc>>,
}

impl From<CheckInResult> for CheckInResponse {
    fn from(result: CheckInResult) -> Self {
        let result_type = result.result_type().to_string();
        let confirmed = result.is_confirmation();
        let message = result.message();

        let (student, checked_in_at) = match result {
            CheckInResult::Applied {
                student,
                checked_in_at,
            }
            | CheckInResult::Rejected(Rejection::AlreadyCheckedIn {
                student,
                checked_in_at,
            }) => (Some(student), Some(checked_in_at)),
            CheckInResult::Rejected(_) => (None, None),
        };

        Self {
            result: result_type,
            confirmed,
            message,
            student,
            checked_in_at,
        }
    }
}

fn status_for(result: &CheckInResult) -> StatusCode {
    match result {
        CheckInResult::Applied { .. } => StatusCode::OK,
        CheckInResult::Rejected(Rejection::AlreadyCheckedIn { .. }) => StatusCode::OK,
        CheckInResult::Rejected(Rejection::MalformedToken) => StatusCode::BAD_REQUEST,
        CheckInResult::Rejected(Rejection::StudentNotFound) => StatusCode::NOT_FOUND,
        CheckInResult::Rejected(Rejection::StoreUnavailable { .. }) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Apply a scanned token at a check-in station
async fn scan(
    _organizer: Organizer,
    State(state): State<AppState>,
    Json(req): Json<CheckInRequest>,
) -> Response {
    let result = check_in::check_in(state.store.as_ref(), &req.payload).await;

    tracing::info!(result = result.result_type(), "Scan processed");

    let status = status_for(&result);
    (status, Json(CheckInResponse::from(result))).into_response()
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/checkin", post(scan))
}
