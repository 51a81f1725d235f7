use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{MarkOutcome, RecordStore, StoreError, StudentLookup};
use crate::models::{
    event::CreateEventData,
    student::{CreateStudentData, UpdateStudentData},
    Event, EventRegistration, RegistrationWithEvent, RegistrationWithStudent, Student,
    StudentId,
};

/// Record store backed by the shared Postgres database
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict(db_err.message().to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                StoreError::NotFound(db_err.message().to_string())
            }
            sqlx::Error::RowNotFound => StoreError::NotFound("row not found".to_string()),
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

#[async_trait]
impl RecordStore for PostgresStore {
    fn backend_tag(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    async fn find_student(&self, lookup: &StudentLookup) -> Result<Option<Student>, StoreError> {
        let student = match lookup {
            StudentLookup::Id(id) => Student::find_by_id(&self.pool, id).await?,
            StudentLookup::Email(email) => Student::find_by_email(&self.pool, email).await?,
        };
        Ok(student)
    }

    async fn list_students(&self) -> Result<Vec<Student>, StoreError> {
        Ok(Student::list(&self.pool).await?)
    }

    async fn insert_student(&self, data: CreateStudentData) -> Result<Student, StoreError> {
        Ok(Student::create(&self.pool, data).await?)
    }

    async fn update_student(
        &self,
        id: &StudentId,
        patch: UpdateStudentData,
    ) -> Result<Option<Student>, StoreError> {
        Ok(Student::update_profile(&self.pool, id, patch).await?)
    }

    async fn delete_student(&self, id: &StudentId) -> Result<bool, StoreError> {
        Ok(Student::delete(&self.pool, id).await?)
    }

    async fn set_qr_code(&self, id: &StudentId, qr_code: &str) -> Result<bool, StoreError> {
        Ok(Student::set_qr_code(&self.pool, id, qr_code).await?)
    }

    async fn mark_checked_in(
        &self,
        id: &StudentId,
        at: DateTime<Utc>,
    ) -> Result<MarkOutcome, StoreError> {
        if let Some(student) = Student::mark_checked_in(&self.pool, id, at).await? {
            return Ok(MarkOutcome::Marked(student));
        }

        // The guarded update matched nothing: either the row is gone or the
        // marker was already set (possibly by a concurrent scan).
        match Student::find_by_id(&self.pool, id).await? {
            Some(student) if student.checked_in_at.is_some() => {
                Ok(MarkOutcome::AlreadyMarked(student))
            }
            Some(_) => Err(StoreError::Unavailable(
                "conditional check-in update matched no row".to_string(),
            )),
            None => Ok(MarkOutcome::Missing),
        }
    }

    async fn set_checked_in_at(
        &self,
        id: &StudentId,
        at: Option<DateTime<Utc>>,
    ) -> Result<Option<Student>, StoreError> {
        Ok(Student::set_checked_in_at(&self.pool, id, at).await?)
    }

    async fn create_event(&self, data: CreateEventData) -> Result<Event, StoreError> {
        Ok(Event::create(&self.pool, data).await?)
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        Ok(Event::find_by_id(&self.pool, id).await?)
    }

    async fn list_events(&self) -> Result<Vec<Event>, StoreError> {
        Ok(Event::list(&self.pool).await?)
    }

    async fn insert_registration(
        &self,
        student_id: &StudentId,
        event_id: Uuid,
    ) -> Result<EventRegistration, StoreError> {
        Ok(EventRegistration::create(&self.pool, student_id, event_id).await?)
    }

    async fn find_registration(
        &self,
        student_id: &StudentId,
        event_id: Uuid,
    ) -> Result<Option<EventRegistration>, StoreError> {
        Ok(EventRegistration::find(&self.pool, student_id, event_id).await?)
    }

    async fn list_registrations(
        &self,
        event_id: Uuid,
    ) -> Result<Vec<RegistrationWithStudent>, StoreError> {
        let registrations = EventRegistration::list_by_event(&self.pool, event_id).await?;
        if registrations.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<StudentId> = registrations.iter().map(|r| r.student_id.clone()).collect();
        let students = Student::find_by_ids(&self.pool, &ids).await?;

        Ok(registrations
            .into_iter()
            .map(|registration| {
                let student = students
                    .iter()
                    .find(|s| s.id == registration.student_id)
                    .cloned();
                RegistrationWithStudent {
                    registration,
                    student,
                }
            })
            .collect())
    }

    async fn list_registrations_for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Vec<RegistrationWithEvent>, StoreError> {
        let registrations = EventRegistration::list_by_student(&self.pool, student_id).await?;
        if registrations.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = registrations.iter().map(|r| r.event_id).collect();
        let events = Event::find_by_ids(&self.pool, &ids).await?;

        Ok(registrations
            .into_iter()
            .map(|registration| {
                let event = events
                    .iter()
                    .find(|e| e.id == registration.event_id)
                    .cloned();
                RegistrationWithEvent {
                    registration,
                    event,
                }
            })
            .collect())
    }
}
