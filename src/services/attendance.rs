use serde::Serialize;

use crate::models::{Event, RegistrationWithEvent, Student, StudentId};
use crate::store::{RecordStore, StoreError, StudentLookup};

/// Dashboard counters over every registered student
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckInStats {
    pub total: usize,
    pub checked_in: usize,
    pub pending: usize,
}

impl CheckInStats {
    pub fn from_students(students: &[Student]) -> Self {
        let total = students.len();
        let checked_in = students
            .iter()
            .filter(|s| s.checked_in_at.is_some())
            .count();

        Self {
            total,
            checked_in,
            pending: total - checked_in,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentAttendance {
    pub student: Student,
    pub events_registered: usize,
    pub events_attended: usize,
    pub registrations: Vec<RegistrationWithEvent>,
}

/// A registered student attended an event when their check-in marker
/// falls on the event's date (UTC).
pub fn attended(student: &Student, event: &Event) -> bool {
    student
        .checked_in_at
        .is_some_and(|at| at.date_naive() == event.event_date)
}

pub async fn check_in_stats(store: &dyn RecordStore) -> Result<CheckInStats, StoreError> {
    let students = store.list_students().await?;
    Ok(CheckInStats::from_students(&students))
}

/// A student's registrations and how many of them they attended.
/// Returns `None` when no student has this id.
#[tracing::instrument(skip(store))]
pub async fn student_attendance(
    store: &dyn RecordStore,
    id: &StudentId,
) -> Result<Option<StudentAttendance>, StoreError> {
    let Some(student) = store.find_student(&StudentLookup::Id(id.clone())).await? else {
        return Ok(None);
    };

    let registrations = store.list_registrations_for_student(&student.id).await?;
    let events_attended = registrations
        .iter()
        .filter_map(|r| r.event.as_ref())
        .filter(|event| attended(&student, event))
        .count();

    Ok(Some(StudentAttendance {
        events_registered: registrations.len(),
        events_attended,
        registrations,
        student,
    }))
}
