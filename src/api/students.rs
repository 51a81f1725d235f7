use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::api::{middleware::auth::Organizer, state::AppState};
use crate::error::{AppError, Result};
use crate::models::{
    student::{CreateStudentData, UpdateStudentData},
    Student, StudentId,
};
use crate::services::{
    attendance::{self, CheckInStats, StudentAttendance},
    registration::{self, RegisteredStudent},
    token_reissue::{self, ReissueReport},
};
use crate::store::StudentLookup;

#[derive(Debug, Deserialize)]
pub struct SetCheckInRequest {
    pub checked_in: bool,
}

async fn find_student(state: &AppState, id: &StudentId) -> Result<Student> {
    state
        .store
        .find_student(&StudentLookup::Id(id.clone()))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Student {} not found", id)))
}

// Handlers

/// Register a new student and issue their QR token
async fn register_student(
    State(state): State<AppState>,
    Json(req): Json<CreateStudentData>,
) -> Result<(StatusCode, Json<RegisteredStudent>)> {
    let registered =
        registration::register_student(state.store.as_ref(), &state.encoder, req).await?;

    Ok((StatusCode::CREATED, Json(registered)))
}

/// QR code of a student's token as PNG
async fn student_qr_png(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let student = find_student(&state, &StudentId::new(id)).await?;
    let token = state.encoder.encode(&student.id)?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/png")],
        token.png,
    )
        .into_response())
}

/// QR code of a student's token as SVG
async fn student_qr_svg(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let student = find_student(&state, &StudentId::new(id)).await?;
    let svg = state.encoder.render_svg(&student.id)?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/svg+xml")],
        svg,
    )
        .into_response())
}

/// List all students, newest first
async fn list_students(
    _organizer: Organizer,
    State(state): State<AppState>,
) -> Result<Json<Vec<Student>>> {
    Ok(Json(state.store.list_students().await?))
}

/// Overall totals for the organizer dashboard
async fn student_stats(
    _organizer: Organizer,
    State(state): State<AppState>,
) -> Result<Json<CheckInStats>> {
    Ok(Json(attendance::check_in_stats(state.store.as_ref()).await?))
}

/// A student's event registrations and attendance
async fn student_registrations(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StudentAttendance>> {
    let id = StudentId::new(id);
    let report = attendance::student_attendance(state.store.as_ref(), &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Student {} not found", id)))?;

    Ok(Json(report))
}

/// Update profile fields
async fn update_student(
    _organizer: Organizer,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStudentData>,
) -> Result<Json<Student>> {
    let id = StudentId::new(id);
    let blank = [&req.name, &req.phone, &req.college, &req.department]
        .into_iter()
        .flatten()
        .any(|value| value.trim().is_empty());
    if blank {
        return Err(AppError::Validation(
            "Profile fields cannot be blank".to_string(),
        ));
    }

    let student = state
        .store
        .update_student(&id, req)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Student {} not found", id)))?;

    tracing::info!(student_id = %student.id, "Student updated");

    Ok(Json(student))
}

/// Delete a student along with their event registrations
async fn delete_student(
    _organizer: Organizer,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = StudentId::new(id);
    if !state.store.delete_student(&id).await? {
        return Err(AppError::NotFound(format!("Student {} not found", id)));
    }

    tracing::info!(student_id = %id, "Student deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Organizer override of the check-in marker. Unlike scanning, this can
/// clear the marker.
async fn set_check_in(
    _organizer: Organizer,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SetCheckInRequest>,
) -> Result<Json<Student>> {
    let id = StudentId::new(id);
    let at = req.checked_in.then(Utc::now);

    let student = state
        .store
        .set_checked_in_at(&id, at)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Student {} not found", id)))?;

    tracing::info!(
        student_id = %student.id,
        checked_in = req.checked_in,
        "Check-in marker set by organizer"
    );

    Ok(Json(student))
}

/// Re-issue every student's token in the structured format
async fn reissue_tokens(
    _organizer: Organizer,
    State(state): State<AppState>,
) -> Result<Json<ReissueReport>> {
    let report = token_reissue::reissue_all_tokens(state.store.as_ref(), &state.encoder).await?;
    Ok(Json(report))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/students", get(list_students).post(register_student))
        .route("/api/students/stats", get(student_stats))
        .route("/api/students/reissue-tokens", post(reissue_tokens))
        .route(
            "/api/students/:id",
            put(update_student).delete(delete_student),
        )
        .route("/api/students/:id/check-in", put(set_check_in))
        .route("/api/students/:id/registrations", get(student_registrations))
        .route("/api/students/:id/qr.png", get(student_qr_png))
        .route("/api/students/:id/qr.svg", get(student_qr_svg))
}
