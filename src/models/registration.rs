use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::event::Event;
use super::student::{Student, StudentId};

/// Links a student to an event; unique per (student, event)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct EventRegistration {
    pub id: Uuid,
    pub student_id: StudentId,
    pub event_id: Uuid,
    pub registered_at: DateTime<Utc>,
}

/// A registration together with the student it points at, for organizer listings.
/// `student` is `None` when the student row has since been deleted.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationWithStudent {
    #[serde(flatten)]
    pub registration: EventRegistration,
    pub student: Option<Student>,
}

/// A registration together with its event, for a student's own listing.
/// `event` is `None` when the event row has since been deleted.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationWithEvent {
    #[serde(flatten)]
    pub registration: EventRegistration,
    pub event: Option<Event>,
}

impl EventRegistration {
    /// Create a registration. A second registration for the same pair fails
    /// with a unique violation on `event_registrations_student_event_key`.
    pub async fn create(
        pool: &PgPool,
        student_id: &StudentId,
        event_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, EventRegistration>(
            r#"
            INSERT INTO event_registrations (student_id, event_id)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(student_id)
        .bind(event_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find(
        pool: &PgPool,
        student_id: &StudentId,
        event_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, EventRegistration>(
            r#"
            SELECT * FROM event_registrations
            WHERE student_id = $1 AND event_id = $2
            "#,
        )
        .bind(student_id)
        .bind(event_id)
        .fetch_optional(pool)
        .await
    }

    /// List registrations for an event, most recent first
    pub async fn list_by_event(pool: &PgPool, event_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, EventRegistration>(
            r#"
            SELECT * FROM event_registrations
            WHERE event_id = $1
            ORDER BY registered_at DESC
            "#,
        )
        .bind(event_id)
        .fetch_all(pool)
        .await
    }

    pub async fn list_by_student(
        pool: &PgPool,
        student_id: &StudentId,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, EventRegistration>(
            r#"
            SELECT * FROM event_registrations
            WHERE student_id = $1
            ORDER BY registered_at DESC
            "#,
        )
        .bind(student_id)
        .fetch_all(pool)
        .await
    }
}
