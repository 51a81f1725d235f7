use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::fmt;

/// Durable identifier of a student row, generated by the record store.
///
/// Kept as text so that identifiers issued by any backend (uuid strings,
/// hand-seeded ids like `abc-123`) round-trip through tokens unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct StudentId(String);

impl StudentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StudentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub college: String,
    pub department: String,
    pub qr_code: Option<String>, // data:image/png;base64 URL of the issued token
    pub checked_in_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Student {
    /// A profile is complete when every contact and affiliation field is filled in.
    pub fn has_complete_profile(&self) -> bool {
        [
            &self.name,
            &self.phone,
            &self.college,
            &self.department,
        ]
        .iter()
        .all(|field| !field.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStudentData {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub college: String,
    pub department: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateStudentData {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub college: Option<String>,
    pub department: Option<String>,
}

/// Emails are stored trimmed and lowercased; lookups normalize the same way.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl Student {
    /// Creates a new student record
    pub async fn create(pool: &PgPool, data: CreateStudentData) -> Result<Self, sqlx::Error> {
        let student = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO students (name, email, phone, college, department)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&data.name)
        .bind(&data.email)
        .bind(&data.phone)
        .bind(&data.college)
        .bind(&data.department)
        .fetch_one(pool)
        .await?;

        Ok(student)
    }

    pub async fn find_by_id(pool: &PgPool, id: &StudentId) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM students WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM students WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_ids(pool: &PgPool, ids: &[StudentId]) -> Result<Vec<Self>, sqlx::Error> {
        let ids: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();

        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM students WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(pool)
        .await
    }

    /// Lists all students, newest first
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM students
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(pool)
        .await
    }

    /// Updates profile fields, leaving unspecified ones untouched
    pub async fn update_profile(
        pool: &PgPool,
        id: &StudentId,
        data: UpdateStudentData,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE students
            SET
                name = COALESCE($2, name),
                phone = COALESCE($3, phone),
                college = COALESCE($4, college),
                department = COALESCE($5, department)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.name)
        .bind(data.phone)
        .bind(data.college)
        .bind(data.department)
        .fetch_optional(pool)
        .await
    }

    pub async fn set_qr_code(
        pool: &PgPool,
        id: &StudentId,
        qr_code: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE students SET qr_code = $2 WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(qr_code)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Sets the check-in marker only if it is currently unset.
    ///
    /// Returns `None` when no row matched, either because the student does not
    /// exist or because another scan already set the marker.
    pub async fn mark_checked_in(
        pool: &PgPool,
        id: &StudentId,
        at: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE students
            SET checked_in_at = $2
            WHERE id = $1 AND checked_in_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(at)
        .fetch_optional(pool)
        .await
    }

    /// Organizer override: sets or clears the marker unconditionally
    pub async fn set_checked_in_at(
        pool: &PgPool,
        id: &StudentId,
        at: Option<DateTime<Utc>>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE students SET checked_in_at = $2 WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(at)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: &StudentId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM students WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
