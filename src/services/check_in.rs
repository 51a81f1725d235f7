use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::Student;
use crate::services::token::{self, DecodedToken};
use crate::store::{MarkOutcome, RecordStore, StoreError};

/// Why a scan did not produce a fresh check-in
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    /// Input matched neither the structured nor the legacy token shape
    MalformedToken,
    /// Exact-match lookup found no student
    StudentNotFound,
    /// Not a fault: the student was already checked in at `checked_in_at`
    AlreadyCheckedIn {
        student: Student,
        checked_in_at: DateTime<Utc>,
    },
    /// The record store could not be reached; the scan may be retried
    StoreUnavailable { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckInResult {
    Applied {
        student: Student,
        checked_in_at: DateTime<Utc>,
    },
    Rejected(Rejection),
}

impl CheckInResult {
    /// Returns the result type as a string for logging
    pub fn result_type(&self) -> &'static str {
        match self {
            CheckInResult::Applied { .. } => "applied",
            CheckInResult::Rejected(Rejection::MalformedToken) => "malformed_token",
            CheckInResult::Rejected(Rejection::StudentNotFound) => "student_not_found",
            CheckInResult::Rejected(Rejection::AlreadyCheckedIn { .. }) => "already_checked_in",
            CheckInResult::Rejected(Rejection::StoreUnavailable { .. }) => "store_unavailable",
        }
    }

    /// Applied and already-checked-in both count as a confirmed attendee
    pub fn is_confirmation(&self) -> bool {
        matches!(
            self,
            CheckInResult::Applied { .. }
                | CheckInResult::Rejected(Rejection::AlreadyCheckedIn { .. })
        )
    }

    /// Human readable line for the check-in station
    pub fn message(&self) -> String {
        match self {
            CheckInResult::Applied { student, .. } => {
                format!("Check-in successful for {}!", student.name)
            }
            CheckInResult::Rejected(Rejection::AlreadyCheckedIn {
                student,
                checked_in_at,
            }) => format!(
                "{} already checked in at {}",
                student.name,
                checked_in_at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            CheckInResult::Rejected(Rejection::MalformedToken) => "Invalid QR code".to_string(),
            CheckInResult::Rejected(Rejection::StudentNotFound) => "Student not found".to_string(),
            CheckInResult::Rejected(Rejection::StoreUnavailable { .. }) => {
                "Check-in service unavailable, please scan again".to_string()
            }
        }
    }
}

fn store_unavailable(err: StoreError) -> CheckInResult {
    tracing::error!(error = %err, "Record store failed during check-in");
    CheckInResult::Rejected(Rejection::StoreUnavailable {
        message: err.to_string(),
    })
}

/// Resolves a scanned token and applies the check-in.
///
/// 1. Decodes the payload (structured JSON or legacy pipe format)
/// 2. Looks the student up by exact id or email
/// 3. Returns `AlreadyCheckedIn` if the marker is set
/// 4. Otherwise sets the marker with a conditional write
///
/// The conditional write in step 4 is what makes concurrent scans of one
/// token safe: only one of them can flip the marker, the others come back
/// as `AlreadyCheckedIn` with the winner's timestamp.
#[tracing::instrument(skip(store, scanned_payload), fields(payload_len = scanned_payload.len()))]
pub async fn check_in(store: &dyn RecordStore, scanned_payload: &str) -> CheckInResult {
    check_in_at(store, scanned_payload, Utc::now()).await
}

/// [`check_in`] with an explicit clock reading
pub async fn check_in_at(
    store: &dyn RecordStore,
    scanned_payload: &str,
    now: DateTime<Utc>,
) -> CheckInResult {
    // 1. Decode
    let decoded = token::decode(scanned_payload);
    let Some(lookup) = decoded.lookup() else {
        tracing::warn!("Scanned payload is not a recognized token");
        return CheckInResult::Rejected(Rejection::MalformedToken);
    };

    if matches!(decoded, DecodedToken::Legacy(_)) {
        tracing::info!("Resolving legacy token by email");
    }

    // 2. Resolve
    let student = match store.find_student(&lookup).await {
        Ok(Some(s)) => s,
        Ok(None) => {
            tracing::warn!(format = decoded.format_name(), "Student not found for token");
            return CheckInResult::Rejected(Rejection::StudentNotFound);
        }
        Err(e) => return store_unavailable(e),
    };

    tracing::debug!(student_id = %student.id, format = decoded.format_name(), "Resolved token");

    // 3. Idempotency check
    if let Some(checked_in_at) = student.checked_in_at {
        tracing::info!(student_id = %student.id, checked_in_at = %checked_in_at, "Student already checked in");
        return CheckInResult::Rejected(Rejection::AlreadyCheckedIn {
            student,
            checked_in_at,
        });
    }

    // 4. Apply
    match store.mark_checked_in(&student.id, now).await {
        Ok(MarkOutcome::Marked(student)) => {
            let checked_in_at = student.checked_in_at.unwrap_or(now);
            tracing::info!(student_id = %student.id, "Check-in applied");
            CheckInResult::Applied {
                student,
                checked_in_at,
            }
        }
        Ok(MarkOutcome::AlreadyMarked(student)) => {
            tracing::info!(student_id = %student.id, "Lost check-in race to a concurrent scan");
            match student.checked_in_at {
                Some(checked_in_at) => CheckInResult::Rejected(Rejection::AlreadyCheckedIn {
                    student,
                    checked_in_at,
                }),
                None => store_unavailable(StoreError::Unavailable(
                    "store reported a set marker without a timestamp".to_string(),
                )),
            }
        }
        Ok(MarkOutcome::Missing) => {
            tracing::warn!(student_id = %student.id, "Student removed before check-in was applied");
            CheckInResult::Rejected(Rejection::StudentNotFound)
        }
        Err(e) => store_unavailable(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{student::CreateStudentData, StudentId};
    use crate::services::qr_generator::TokenEncoder;
    use crate::store::{faulty::FaultyStore, MemoryStore};
    use chrono::TimeZone;
    use std::sync::Arc;

    fn profile(email: &str) -> CreateStudentData {
        CreateStudentData {
            name: "Asha Rao".to_string(),
            email: email.to_string(),
            phone: "555-0100".to_string(),
            college: "Engineering".to_string(),
            department: "Physics".to_string(),
        }
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_student_with_id(StudentId::new("abc-123"), profile("asha@example.edu"))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_scenario_applied_then_already_checked_in() {
        let store = seeded().await;
        let token = TokenEncoder::default()
            .encode(&StudentId::new("abc-123"))
            .unwrap();
        assert_eq!(token.payload, r#"{"studentId":"abc-123"}"#);

        let first = check_in(&store, &token.payload).await;
        let applied_at = match &first {
            CheckInResult::Applied {
                student,
                checked_in_at,
            } => {
                assert_eq!(student.id, StudentId::new("abc-123"));
                assert_eq!(student.checked_in_at, Some(*checked_in_at));
                *checked_in_at
            }
            other => panic!("expected Applied, got {:?}", other),
        };

        let second = check_in(&store, &token.payload).await;
        match second {
            CheckInResult::Rejected(Rejection::AlreadyCheckedIn { checked_in_at, .. }) => {
                assert_eq!(checked_in_at, applied_at);
            }
            other => panic!("expected AlreadyCheckedIn, got {:?}", other),
        }
        assert!(first.is_confirmation());
    }

    #[tokio::test]
    async fn test_legacy_token_resolves_same_student() {
        let store = seeded().await;
        let legacy = "Asha Rao|ASHA@example.edu |555-0100|Engineering|Physics";

        match check_in(&store, legacy).await {
            CheckInResult::Applied { student, .. } => {
                assert_eq!(student.id, StudentId::new("abc-123"))
            }
            other => panic!("expected Applied, got {:?}", other),
        }

        let structured = structured("abc-123");
        assert_eq!(
            check_in(&store, &structured).await.result_type(),
            "already_checked_in"
        );
    }

    fn structured(id: &str) -> String {
        format!(r#"{{"studentId":"{}"}}"#, id)
    }

    #[tokio::test]
    async fn test_unknown_student_is_never_applied() {
        let store = seeded().await;
        let result = check_in(&store, &structured("does-not-exist")).await;
        assert_eq!(result, CheckInResult::Rejected(Rejection::StudentNotFound));

        let legacy = check_in(&store, "X|nobody@example.edu|1|2|3").await;
        assert_eq!(legacy, CheckInResult::Rejected(Rejection::StudentNotFound));
    }

    #[tokio::test]
    async fn test_malformed_input() {
        let store = seeded().await;
        for input in ["", "garbage", "{\"studentId\":", "a|b|c", "\u{0}\u{1}"] {
            assert_eq!(
                check_in(&store, input).await,
                CheckInResult::Rejected(Rejection::MalformedToken),
                "input {:?}",
                input
            );
        }
    }

    #[tokio::test]
    async fn test_store_unavailable() {
        let store = seeded().await;
        store.set_unavailable(true);
        let result = check_in(&store, &structured("abc-123")).await;
        assert_eq!(result.result_type(), "store_unavailable");
        assert!(!result.is_confirmation());

        store.set_unavailable(false);
        assert_eq!(
            check_in(&store, &structured("abc-123")).await.result_type(),
            "applied"
        );
    }

    #[tokio::test]
    async fn test_check_ins_are_independent_per_student() {
        let store = seeded().await;
        store
            .insert_student_with_id(StudentId::new("def-456"), profile("ben@example.edu"))
            .await
            .unwrap();

        assert_eq!(check_in(&store, &structured("def-456")).await.result_type(), "applied");
        assert_eq!(check_in(&store, &structured("abc-123")).await.result_type(), "applied");
        assert_eq!(
            check_in(&store, &structured("def-456")).await.result_type(),
            "already_checked_in"
        );
    }

    #[tokio::test]
    async fn test_concurrent_scans_apply_once() {
        let store = Arc::new(seeded().await);
        let payload = structured("abc-123");

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            let payload = payload.clone();
            handles.push(tokio::spawn(async move {
                check_in(&*store, &payload).await
            }));
        }

        let mut applied = 0;
        let mut already = 0;
        for handle in handles {
            match handle.await.unwrap() {
                CheckInResult::Applied { .. } => applied += 1,
                CheckInResult::Rejected(Rejection::AlreadyCheckedIn { .. }) => already += 1,
                other => panic!("unexpected result {:?}", other),
            }
        }
        assert_eq!(applied, 1);
        assert_eq!(already, 15);
    }

    async fn faulty_seeded() -> FaultyStore {
        let store = FaultyStore::new();
        store
            .inner
            .insert_student_with_id(StudentId::new("abc-123"), profile("asha@example.edu"))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_student_deleted_before_write_is_not_found() {
        let store = faulty_seeded().await;
        store.force_mark_outcome(MarkOutcome::Missing);

        let result = check_in(&store, &structured("abc-123")).await;
        assert_eq!(result, CheckInResult::Rejected(Rejection::StudentNotFound));
        assert!(!result.is_confirmation());
    }

    #[tokio::test]
    async fn test_lost_write_reports_winner_timestamp() {
        let store = faulty_seeded().await;
        let winner_at = Utc.with_ymd_and_hms(2025, 9, 12, 8, 30, 0).unwrap();
        let mut winner = store
            .inner
            .find_student(&crate::store::StudentLookup::Id(StudentId::new("abc-123")))
            .await
            .unwrap()
            .unwrap();
        winner.checked_in_at = Some(winner_at);
        store.force_mark_outcome(MarkOutcome::AlreadyMarked(winner));

        let now = winner_at + chrono::Duration::seconds(2);
        match check_in_at(&store, &structured("abc-123"), now).await {
            CheckInResult::Rejected(Rejection::AlreadyCheckedIn {
                student,
                checked_in_at,
            }) => {
                assert_eq!(checked_in_at, winner_at);
                assert_eq!(student.id, StudentId::new("abc-123"));
            }
            other => panic!("expected AlreadyCheckedIn, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_already_marked_without_timestamp_is_a_store_fault() {
        let store = faulty_seeded().await;
        let student = store
            .inner
            .find_student(&crate::store::StudentLookup::Id(StudentId::new("abc-123")))
            .await
            .unwrap()
            .unwrap();
        store.force_mark_outcome(MarkOutcome::AlreadyMarked(student));

        let result = check_in(&store, &structured("abc-123")).await;
        assert_eq!(result.result_type(), "store_unavailable");
    }

    #[test]
    fn test_messages_distinguish_outcomes() {
        let student = crate::models::Student {
            id: StudentId::new("abc-123"),
            name: "Asha Rao".to_string(),
            email: "asha@example.edu".to_string(),
            phone: String::new(),
            college: String::new(),
            department: String::new(),
            qr_code: None,
            checked_in_at: None,
            created_at: Utc::now(),
        };
        let at = Utc::now();
        let applied = CheckInResult::Applied {
            student: student.clone(),
            checked_in_at: at,
        };
        let already = CheckInResult::Rejected(Rejection::AlreadyCheckedIn {
            student,
            checked_in_at: at,
        });
        assert!(applied.message().starts_with("Check-in successful"));
        assert!(already.message().contains("already checked in at"));
    }
}
