//! [`MemoryStore`] wrapper with per-operation fault knobs, for exercising
//! the failure branches of services.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use uuid::Uuid;

use super::{MarkOutcome, MemoryStore, RecordStore, StoreError, StudentLookup};
use crate::models::{
    event::CreateEventData,
    student::{CreateStudentData, UpdateStudentData},
    Event, EventRegistration, RegistrationWithEvent, RegistrationWithStudent, Student,
    StudentId,
};

#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    /// Error returned by `set_qr_code` instead of writing
    pub qr_write_error: Mutex<Option<String>>,
    /// Reports the row as gone from `set_qr_code` without writing
    pub qr_write_misses: bool,
    /// Outcome returned by `mark_checked_in` instead of writing
    pub mark_outcome: Mutex<Option<MarkOutcome>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_qr_writes(&self, message: &str) {
        *self.qr_write_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn force_mark_outcome(&self, outcome: MarkOutcome) {
        *self.mark_outcome.lock().unwrap() = Some(outcome);
    }
}

#[async_trait]
impl RecordStore for FaultyStore {
    fn backend_tag(&self) -> &'static str {
        "faulty"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }

    async fn find_student(&self, lookup: &StudentLookup) -> Result<Option<Student>, StoreError> {
        self.inner.find_student(lookup).await
    }

    async fn list_students(&self) -> Result<Vec<Student>, StoreError> {
        self.inner.list_students().await
    }

    async fn insert_student(&self, data: CreateStudentData) -> Result<Student, StoreError> {
        self.inner.insert_student(data).await
    }

    async fn update_student(
        &self,
        id: &StudentId,
        patch: UpdateStudentData,
    ) -> Result<Option<Student>, StoreError> {
        self.inner.update_student(id, patch).await
    }

    async fn delete_student(&self, id: &StudentId) -> Result<bool, StoreError> {
        self.inner.delete_student(id).await
    }

    async fn set_qr_code(&self, id: &StudentId, qr_code: &str) -> Result<bool, StoreError> {
        let injected = self.qr_write_error.lock().unwrap().clone();
        if let Some(message) = injected {
            return Err(StoreError::Unavailable(message));
        }
        if self.qr_write_misses {
            return Ok(false);
        }
        self.inner.set_qr_code(id, qr_code).await
    }

    async fn mark_checked_in(
        &self,
        id: &StudentId,
        at: DateTime<Utc>,
    ) -> Result<MarkOutcome, StoreError> {
        let forced = self.mark_outcome.lock().unwrap().clone();
        match forced {
            Some(outcome) => Ok(outcome),
            None => self.inner.mark_checked_in(id, at).await,
        }
    }

    async fn set_checked_in_at(
        &self,
        id: &StudentId,
        at: Option<DateTime<Utc>>,
    ) -> Result<Option<Student>, StoreError> {
        self.inner.set_checked_in_at(id, at).await
    }

    async fn create_event(&self, data: CreateEventData) -> Result<Event, StoreError> {
        self.inner.create_event(data).await
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        self.inner.find_event(id).await
    }

    async fn list_events(&self) -> Result<Vec<Event>, StoreError> {
        self.inner.list_events().await
    }

    async fn insert_registration(
        &self,
        student_id: &StudentId,
        event_id: Uuid,
    ) -> Result<EventRegistration, StoreError> {
        self.inner.insert_registration(student_id, event_id).await
    }

    async fn find_registration(
        &self,
        student_id: &StudentId,
        event_id: Uuid,
    ) -> Result<Option<EventRegistration>, StoreError> {
        self.inner.find_registration(student_id, event_id).await
    }

    async fn list_registrations(
        &self,
        event_id: Uuid,
    ) -> Result<Vec<RegistrationWithStudent>, StoreError> {
        self.inner.list_registrations(event_id).await
    }

    async fn list_registrations_for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Vec<RegistrationWithEvent>, StoreError> {
        self.inner.list_registrations_for_student(student_id).await
    }
}
