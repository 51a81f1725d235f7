use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{MarkOutcome, RecordStore, StoreError, StudentLookup};
use crate::models::{
    event::CreateEventData,
    student::{CreateStudentData, UpdateStudentData},
    Event, EventRegistration, RegistrationWithEvent, RegistrationWithStudent, Student,
    StudentId,
};

#[derive(Default)]
struct Tables {
    students: Vec<Student>,
    events: Vec<Event>,
    registrations: Vec<EventRegistration>,
}

/// In-process record store. All tables sit behind one mutex, so the
/// conditional check-in write is atomic with respect to concurrent scans.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with [`StoreError::Unavailable`]
    #[cfg(test)]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Inserts a student under a caller-chosen id, bypassing id generation
    #[cfg(test)]
    pub async fn insert_student_with_id(
        &self,
        id: StudentId,
        data: CreateStudentData,
    ) -> Result<Student, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        insert_student(&mut tables, id, data)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory store switched off".to_string(),
            ));
        }
        Ok(())
    }
}

fn insert_student(
    tables: &mut Tables,
    id: StudentId,
    data: CreateStudentData,
) -> Result<Student, StoreError> {
    if tables.students.iter().any(|s| s.email == data.email) {
        return Err(StoreError::Conflict(format!(
            "email {} already registered",
            data.email
        )));
    }
    if tables.students.iter().any(|s| s.id == id) {
        return Err(StoreError::Conflict(format!("student id {} already exists", id)));
    }

    let student = Student {
        id,
        name: data.name,
        email: data.email,
        phone: data.phone,
        college: data.college,
        department: data.department,
        qr_code: None,
        checked_in_at: None,
        created_at: Utc::now(),
    };
    tables.students.push(student.clone());
    Ok(student)
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }

    async fn find_student(&self, lookup: &StudentLookup) -> Result<Option<Student>, StoreError> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        let found = tables.students.iter().find(|s| match lookup {
            StudentLookup::Id(id) => &s.id == id,
            StudentLookup::Email(email) => &s.email == email,
        });
        Ok(found.cloned())
    }

    async fn list_students(&self) -> Result<Vec<Student>, StoreError> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        // Insertion order is creation order; newest first
        Ok(tables.students.iter().rev().cloned().collect())
    }

    async fn insert_student(&self, data: CreateStudentData) -> Result<Student, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        insert_student(&mut tables, StudentId::new(Uuid::new_v4().to_string()), data)
    }

    async fn update_student(
        &self,
        id: &StudentId,
        patch: UpdateStudentData,
    ) -> Result<Option<Student>, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let Some(student) = tables.students.iter_mut().find(|s| &s.id == id) else {
            return Ok(None);
        };

        if let Some(name) = patch.name {
            student.name = name;
        }
        if let Some(phone) = patch.phone {
            student.phone = phone;
        }
        if let Some(college) = patch.college {
            student.college = college;
        }
        if let Some(department) = patch.department {
            student.department = department;
        }

        Ok(Some(student.clone()))
    }

    async fn delete_student(&self, id: &StudentId) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let before = tables.students.len();
        tables.students.retain(|s| &s.id != id);
        let removed = tables.students.len() != before;
        if removed {
            tables.registrations.retain(|r| &r.student_id != id);
        }
        Ok(removed)
    }

    async fn set_qr_code(&self, id: &StudentId, qr_code: &str) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        match tables.students.iter_mut().find(|s| &s.id == id) {
            Some(student) => {
                student.qr_code = Some(qr_code.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_checked_in(
        &self,
        id: &StudentId,
        at: DateTime<Utc>,
    ) -> Result<MarkOutcome, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let Some(student) = tables.students.iter_mut().find(|s| &s.id == id) else {
            return Ok(MarkOutcome::Missing);
        };

        if student.checked_in_at.is_some() {
            return Ok(MarkOutcome::AlreadyMarked(student.clone()));
        }

        student.checked_in_at = Some(at);
        Ok(MarkOutcome::Marked(student.clone()))
    }

    async fn set_checked_in_at(
        &self,
        id: &StudentId,
        at: Option<DateTime<Utc>>,
    ) -> Result<Option<Student>, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        Ok(tables
            .students
            .iter_mut()
            .find(|s| &s.id == id)
            .map(|student| {
                student.checked_in_at = at;
                student.clone()
            }))
    }

    async fn create_event(&self, data: CreateEventData) -> Result<Event, StoreError> {
        self.check_available()?;
        let event = Event {
            id: Uuid::new_v4(),
            name: data.name,
            event_date: data.event_date,
            description: data.description,
            created_at: Utc::now(),
        };
        self.tables.lock().await.events.push(event.clone());
        Ok(event)
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(tables.events.iter().find(|e| e.id == id).cloned())
    }

    async fn list_events(&self) -> Result<Vec<Event>, StoreError> {
        self.check_available()?;
        let mut events = self.tables.lock().await.events.clone();
        events.sort_by_key(|e| e.event_date);
        Ok(events)
    }

    async fn insert_registration(
        &self,
        student_id: &StudentId,
        event_id: Uuid,
    ) -> Result<EventRegistration, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;

        if !tables.students.iter().any(|s| &s.id == student_id) {
            return Err(StoreError::NotFound(format!("student {}", student_id)));
        }
        if !tables.events.iter().any(|e| e.id == event_id) {
            return Err(StoreError::NotFound(format!("event {}", event_id)));
        }
        if tables
            .registrations
            .iter()
            .any(|r| &r.student_id == student_id && r.event_id == event_id)
        {
            return Err(StoreError::Conflict(format!(
                "student {} already registered for event {}",
                student_id, event_id
            )));
        }

        let registration = EventRegistration {
            id: Uuid::new_v4(),
            student_id: student_id.clone(),
            event_id,
            registered_at: Utc::now(),
        };
        tables.registrations.push(registration.clone());
        Ok(registration)
    }

    async fn find_registration(
        &self,
        student_id: &StudentId,
        event_id: Uuid,
    ) -> Result<Option<EventRegistration>, StoreError> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .registrations
            .iter()
            .find(|r| &r.student_id == student_id && r.event_id == event_id)
            .cloned())
    }

    async fn list_registrations(
        &self,
        event_id: Uuid,
    ) -> Result<Vec<RegistrationWithStudent>, StoreError> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .registrations
            .iter()
            .rev()
            .filter(|r| r.event_id == event_id)
            .map(|r| RegistrationWithStudent {
                registration: r.clone(),
                student: tables
                    .students
                    .iter()
                    .find(|s| s.id == r.student_id)
                    .cloned(),
            })
            .collect())
    }

    async fn list_registrations_for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Vec<RegistrationWithEvent>, StoreError> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .registrations
            .iter()
            .rev()
            .filter(|r| &r.student_id == student_id)
            .map(|r| RegistrationWithEvent {
                registration: r.clone(),
                event: tables.events.iter().find(|e| e.id == r.event_id).cloned(),
            })
            .collect())
    }
}
