use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{middleware::auth::Organizer, state::AppState};
use crate::error::{AppError, Result};
use crate::models::{event::CreateEventData, Event, RegistrationWithStudent};
use crate::services::{
    attendance,
    registration::{self, EventRegistrationReceipt},
};

// Request/Response types
#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub name: String,
    pub event_date: NaiveDate,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForEventRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct EventRegistrations {
    pub event: Event,
    pub total: usize,
    pub checked_in: usize,
    pub registrations: Vec<RegistrationWithStudent>,
}

async fn find_event(state: &AppState, id: Uuid) -> Result<Event> {
    state
        .store
        .find_event(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))
}

// Handlers

/// List events, soonest first
async fn list_events(State(state): State<AppState>) -> Result<Json<Vec<Event>>> {
    Ok(Json(state.store.list_events().await?))
}

/// Create event
async fn create_event(
    _organizer: Organizer,
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Event>)> {
    // Validate
    if req.name.trim().is_empty() {
        return Err(AppError::Validation("Event name is required".to_string()));
    }

    let event = state
        .store
        .create_event(CreateEventData {
            name: req.name.trim().to_string(),
            event_date: req.event_date,
            description: req.description,
        })
        .await?;

    tracing::info!(event_id = %event.id, event_name = %event.name, "Event created");

    Ok((StatusCode::CREATED, Json(event)))
}

/// Get event
async fn get_event(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Event>> {
    Ok(Json(find_event(&state, id).await?))
}

/// Register an existing student for the event by email
async fn register_for_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RegisterForEventRequest>,
) -> Result<(StatusCode, Json<EventRegistrationReceipt>)> {
    let receipt = registration::register_for_event(state.store.as_ref(), id, &req.email).await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Registrations for an event with student details
async fn list_registrations(
    _organizer: Organizer,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EventRegistrations>> {
    let event = find_event(&state, id).await?;
    let registrations = state.store.list_registrations(id).await?;

    let checked_in = registrations
        .iter()
        .filter(|r| {
            r.student
                .as_ref()
                .is_some_and(|s| attendance::attended(s, &event))
        })
        .count();

    Ok(Json(EventRegistrations {
        event,
        total: registrations.len(),
        checked_in,
        registrations,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/events", get(list_events).post(create_event))
        .route("/api/events/:id", get(get_event))
        .route("/api/events/:id/register", post(register_for_event))
        .route("/api/events/:id/registrations", get(list_registrations))
}
