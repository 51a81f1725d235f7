use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    student::{normalize_email, CreateStudentData},
    Event, EventRegistration, Student, StudentId,
};
use crate::services::qr_generator::{EncodingError, TokenEncoder};
use crate::store::{RecordStore, StoreError, StudentLookup};

#[derive(thiserror::Error, Debug)]
pub enum RegistrationError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("A student with this email already exists")]
    DuplicateEmail,

    #[error("Event not found")]
    EventNotFound,

    #[error("Student profile not found, please register first")]
    StudentNotFound,

    #[error("Student profile is incomplete, please update it first")]
    IncompleteProfile,

    #[error("Already registered for this event")]
    AlreadyRegistered,

    #[error("Token encoding failed: {0}")]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisteredStudent {
    pub student: Student,
    /// Text encoded in the student's QR code
    pub token_payload: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventRegistrationReceipt {
    pub registration: EventRegistration,
    pub event: Event,
    pub student: Student,
}

/// Loose `local@domain.tld` shape check; the store enforces uniqueness.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

fn validate(data: &CreateStudentData) -> Result<CreateStudentData, RegistrationError> {
    let fields = [
        ("name", &data.name),
        ("email", &data.email),
        ("phone", &data.phone),
        ("college", &data.college),
        ("department", &data.department),
    ];
    if let Some((field, _)) = fields.iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(RegistrationError::Validation(format!("{} is required", field)));
    }

    let email = normalize_email(&data.email);
    if !is_valid_email(&email) {
        return Err(RegistrationError::Validation(
            "Please enter a valid email address".to_string(),
        ));
    }

    Ok(CreateStudentData {
        name: data.name.trim().to_string(),
        email,
        phone: data.phone.trim().to_string(),
        college: data.college.trim().to_string(),
        department: data.department.trim().to_string(),
    })
}

/// Creates a student and issues their token.
///
/// The row is inserted first so the store can assign the id the token
/// refers to; the rendered image is then stored on that row. If issuing
/// the token fails the row is removed again, so the email stays free for
/// a retry.
#[tracing::instrument(skip(store, encoder, data))]
pub async fn register_student(
    store: &dyn RecordStore,
    encoder: &TokenEncoder,
    data: CreateStudentData,
) -> Result<RegisteredStudent, RegistrationError> {
    let data = validate(&data)?;

    if store
        .find_student(&StudentLookup::Email(data.email.clone()))
        .await?
        .is_some()
    {
        return Err(RegistrationError::DuplicateEmail);
    }

    let student = match store.insert_student(data).await {
        Ok(s) => s,
        Err(StoreError::Conflict(_)) => return Err(RegistrationError::DuplicateEmail),
        Err(e) => return Err(e.into()),
    };

    match issue_token(store, encoder, student).await {
        Ok(registered) => {
            tracing::info!(student_id = %registered.student.id, "Student registered");
            Ok(registered)
        }
        Err((id, err)) => {
            tracing::error!(student_id = %id, error = %err, "Failed to issue token for new student");
            rollback_student(store, &id).await;
            Err(err)
        }
    }
}

async fn issue_token(
    store: &dyn RecordStore,
    encoder: &TokenEncoder,
    mut student: Student,
) -> Result<RegisteredStudent, (StudentId, RegistrationError)> {
    let token = match encoder.encode(&student.id) {
        Ok(token) => token,
        Err(e) => return Err((student.id, e.into())),
    };

    let data_url = token.data_url();
    match store.set_qr_code(&student.id, &data_url).await {
        Ok(true) => {}
        Ok(false) => return Err((student.id, RegistrationError::StudentNotFound)),
        Err(e) => return Err((student.id, e.into())),
    }
    student.qr_code = Some(data_url);

    Ok(RegisteredStudent {
        student,
        token_payload: token.payload,
    })
}

async fn rollback_student(store: &dyn RecordStore, id: &StudentId) {
    if let Err(e) = store.delete_student(id).await {
        tracing::error!(student_id = %id, error = %e, "Failed to remove partially registered student");
    }
}

/// Registers an existing student, identified by email, for an event
#[tracing::instrument(skip(store, email))]
pub async fn register_for_event(
    store: &dyn RecordStore,
    event_id: Uuid,
    email: &str,
) -> Result<EventRegistrationReceipt, RegistrationError> {
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        return Err(RegistrationError::Validation(
            "Please enter a valid email address".to_string(),
        ));
    }

    let event = store
        .find_event(event_id)
        .await?
        .ok_or(RegistrationError::EventNotFound)?;

    let student = store
        .find_student(&StudentLookup::Email(email))
        .await?
        .ok_or(RegistrationError::StudentNotFound)?;

    if !student.has_complete_profile() {
        return Err(RegistrationError::IncompleteProfile);
    }

    if store.find_registration(&student.id, event.id).await?.is_some() {
        return Err(RegistrationError::AlreadyRegistered);
    }

    let registration = match store.insert_registration(&student.id, event.id).await {
        Ok(r) => r,
        Err(StoreError::Conflict(_)) => return Err(RegistrationError::AlreadyRegistered),
        Err(e) => return Err(e.into()),
    };

    tracing::info!(
        student_id = %student.id,
        event_id = %event.id,
        "Student registered for event"
    );

    Ok(EventRegistrationReceipt {
        registration,
        event,
        student,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::CreateEventData;
    use crate::services::{check_in, token};
    use crate::store::{faulty::FaultyStore, MemoryStore};
    use chrono::NaiveDate;

    fn form(email: &str) -> CreateStudentData {
        CreateStudentData {
            name: " Asha Rao ".to_string(),
            email: email.to_string(),
            phone: "555-0100".to_string(),
            college: "Engineering".to_string(),
            department: "Physics".to_string(),
        }
    }

    async fn event(store: &MemoryStore) -> Event {
        store
            .create_event(CreateEventData {
                name: "Tech Fest".to_string(),
                event_date: NaiveDate::from_ymd_opt(2025, 9, 12).unwrap(),
                description: None,
            })
            .await
            .unwrap()
    }

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.co"));
        assert!(!is_valid_email("a b@c.co"));
        assert!(!is_valid_email("a@b@c.co"));
        assert!(!is_valid_email("a@.co"));
    }

    #[tokio::test]
    async fn test_register_issues_token_for_stored_id() {
        let store = MemoryStore::new();
        let registered = register_student(&store, &TokenEncoder::default(), form(" Asha@Example.EDU"))
            .await
            .unwrap();

        assert_eq!(registered.student.email, "asha@example.edu");
        assert_eq!(registered.student.name, "Asha Rao");
        assert_eq!(
            token::decode(&registered.token_payload),
            token::DecodedToken::Structured(registered.student.id.clone())
        );

        let stored = store
            .find_student(&StudentLookup::Id(registered.student.id.clone()))
            .await
            .unwrap()
            .unwrap();
        assert!(stored
            .qr_code
            .as_deref()
            .unwrap()
            .starts_with("data:image/png;base64,"));

        let result = check_in::check_in(&store, &registered.token_payload).await;
        assert_eq!(result.result_type(), "applied");
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStore::new();
        let encoder = TokenEncoder::default();
        register_student(&store, &encoder, form("asha@example.edu"))
            .await
            .unwrap();

        let err = register_student(&store, &encoder, form("ASHA@example.edu "))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateEmail));
    }

    #[tokio::test]
    async fn test_failed_image_write_leaves_email_free() {
        let store = FaultyStore::new();
        let encoder = TokenEncoder::default();
        store.fail_qr_writes("connection reset");

        let err = register_student(&store, &encoder, form("asha@example.edu"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Store(StoreError::Unavailable(_))));
        assert!(store.list_students().await.unwrap().is_empty());

        *store.qr_write_error.lock().unwrap() = None;
        let registered = register_student(&store, &encoder, form("asha@example.edu"))
            .await
            .unwrap();
        assert!(registered.student.qr_code.is_some());
        assert_eq!(store.list_students().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_row_vanishing_before_image_write_is_reported() {
        let store = FaultyStore {
            qr_write_misses: true,
            ..FaultyStore::default()
        };

        let err = register_student(&store, &TokenEncoder::default(), form("asha@example.edu"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::StudentNotFound));
        assert!(store.list_students().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_fields_rejected() {
        let store = MemoryStore::new();
        let mut data = form("asha@example.edu");
        data.college = "   ".to_string();
        let err = register_student(&store, &TokenEncoder::default(), data)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Validation(ref m) if m.contains("college")));
        assert!(store.list_students().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_register_for_event() {
        let store = MemoryStore::new();
        let ev = event(&store).await;
        register_student(&store, &TokenEncoder::default(), form("asha@example.edu"))
            .await
            .unwrap();

        let receipt = register_for_event(&store, ev.id, "Asha@example.edu")
            .await
            .unwrap();
        assert_eq!(receipt.event.id, ev.id);
        assert!(receipt.student.qr_code.is_some());

        let again = register_for_event(&store, ev.id, "asha@example.edu")
            .await
            .unwrap_err();
        assert!(matches!(again, RegistrationError::AlreadyRegistered));

        let listed = store.list_registrations(ev.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(
            listed[0].student.as_ref().map(|s| s.email.as_str()),
            Some("asha@example.edu")
        );
    }

    #[tokio::test]
    async fn test_register_for_event_requires_profile_and_event() {
        let store = MemoryStore::new();
        let ev = event(&store).await;

        let err = register_for_event(&store, ev.id, "ghost@example.edu")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::StudentNotFound));

        let err = register_for_event(&store, Uuid::new_v4(), "ghost@example.edu")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::EventNotFound));

        let mut incomplete = form("half@example.edu");
        incomplete.department = String::new();
        store.insert_student(incomplete).await.unwrap();
        let err = register_for_event(&store, ev.id, "half@example.edu")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::IncompleteProfile));
    }
}
