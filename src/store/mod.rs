//! Record store contract.
//!
//! Every durable read and write the service performs goes through
//! [`RecordStore`]. The store is handed to services explicitly (usually as
//! `Arc<dyn RecordStore>` inside the application state) so the check-in flow
//! can run against Postgres in production and against [`MemoryStore`] in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    event::CreateEventData,
    student::{CreateStudentData, UpdateStudentData},
    Event, EventRegistration, RegistrationWithEvent, RegistrationWithStudent, Student,
    StudentId,
};

#[cfg(test)]
pub(crate) mod faulty;
pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The store could not be reached or failed mid-request
    #[error("Record store unavailable: {0}")]
    Unavailable(String),

    /// A uniqueness constraint rejected the write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A referenced row does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Exact-match lookup keys for a single student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudentLookup {
    Id(StudentId),
    /// Matched against the normalized (trimmed, lowercased) stored email
    Email(String),
}

/// Outcome of the conditional "set marker if unset" write.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkOutcome {
    /// The marker was unset and now holds the given time
    Marked(Student),
    /// The marker was already set; the row is returned unchanged
    AlreadyMarked(Student),
    /// No student has this id
    Missing,
}

#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    fn backend_tag(&self) -> &'static str;

    /// Cheap round trip used by the health endpoint
    async fn ping(&self) -> Result<(), StoreError>;

    async fn find_student(&self, lookup: &StudentLookup) -> Result<Option<Student>, StoreError>;

    async fn list_students(&self) -> Result<Vec<Student>, StoreError>;

    /// Inserts a student; the store generates the id. Fails with
    /// [`StoreError::Conflict`] when the email is already taken.
    async fn insert_student(&self, data: CreateStudentData) -> Result<Student, StoreError>;

    async fn update_student(
        &self,
        id: &StudentId,
        patch: UpdateStudentData,
    ) -> Result<Option<Student>, StoreError>;

    async fn delete_student(&self, id: &StudentId) -> Result<bool, StoreError>;

    async fn set_qr_code(&self, id: &StudentId, qr_code: &str) -> Result<bool, StoreError>;

    /// Conditional write: set `checked_in_at = at` only if it is currently
    /// unset. Implementations must make the check and the write a single
    /// atomic step.
    async fn mark_checked_in(
        &self,
        id: &StudentId,
        at: DateTime<Utc>,
    ) -> Result<MarkOutcome, StoreError>;

    /// Unconditional organizer override of the marker
    async fn set_checked_in_at(
        &self,
        id: &StudentId,
        at: Option<DateTime<Utc>>,
    ) -> Result<Option<Student>, StoreError>;

    async fn create_event(&self, data: CreateEventData) -> Result<Event, StoreError>;

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, StoreError>;

    async fn list_events(&self) -> Result<Vec<Event>, StoreError>;

    /// Fails with [`StoreError::Conflict`] if the pair is already registered
    async fn insert_registration(
        &self,
        student_id: &StudentId,
        event_id: Uuid,
    ) -> Result<EventRegistration, StoreError>;

    async fn find_registration(
        &self,
        student_id: &StudentId,
        event_id: Uuid,
    ) -> Result<Option<EventRegistration>, StoreError>;

    async fn list_registrations(
        &self,
        event_id: Uuid,
    ) -> Result<Vec<RegistrationWithStudent>, StoreError>;

    /// A student's registrations with their events, most recent first
    async fn list_registrations_for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Vec<RegistrationWithEvent>, StoreError>;
}
