use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub event_date: NaiveDate,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEventData {
    pub name: String,
    pub event_date: NaiveDate,
    pub description: Option<String>,
}

impl Event {
    /// Create a new event
    pub async fn create(pool: &PgPool, data: CreateEventData) -> Result<Self, sqlx::Error> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (name, event_date, description)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(data.name)
        .bind(data.event_date)
        .bind(data.description)
        .fetch_one(pool)
        .await?;

        Ok(event)
    }

    /// Find event by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            SELECT * FROM events WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(event)
    }

    pub async fn find_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Event>(
            r#"
            SELECT * FROM events WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(pool)
        .await
    }

    /// List all events, soonest first
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let events = sqlx::query_as::<_, Event>(
            r#"
            SELECT * FROM events
            ORDER BY event_date ASC
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(events)
    }
}
