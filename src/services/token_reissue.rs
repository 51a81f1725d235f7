use serde::Serialize;

use crate::services::qr_generator::TokenEncoder;
use crate::store::{RecordStore, StoreError};

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReissueReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Rewrites every student's stored QR image with a freshly encoded
/// structured token.
///
/// Used to move students whose badges still carry the legacy pipe format
/// (or no image at all) onto id-only tokens. Per-student failures are
/// collected in the report; only failing to list students aborts the run.
#[tracing::instrument(skip(store, encoder))]
pub async fn reissue_all_tokens(
    store: &dyn RecordStore,
    encoder: &TokenEncoder,
) -> Result<ReissueReport, StoreError> {
    let students = store.list_students().await?;
    let mut report = ReissueReport {
        total: students.len(),
        ..Default::default()
    };

    for student in students {
        let token = match encoder.encode(&student.id) {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(student_id = %student.id, error = %e, "Token encoding failed");
                report.failed += 1;
                report.errors.push(format!("{}: {}", student.name, e));
                continue;
            }
        };

        match store.set_qr_code(&student.id, &token.data_url()).await {
            Ok(true) => report.succeeded += 1,
            Ok(false) => {
                report.failed += 1;
                report
                    .errors
                    .push(format!("{}: student no longer exists", student.name));
            }
            Err(e) => {
                tracing::warn!(student_id = %student.id, error = %e, "Failed to store reissued token");
                report.failed += 1;
                report.errors.push(format!("{}: {}", student.name, e));
            }
        }
    }

    tracing::info!(
        total = report.total,
        succeeded = report.succeeded,
        failed = report.failed,
        "Token reissue completed"
    );

    Ok(report)
}
