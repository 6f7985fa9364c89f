//! Axum route handlers for the upload workflow and the stored results.

use axum::{
    extract::{
        multipart::{Field, MultipartError},
        Multipart, Path, State,
    },
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::kv::load_record;
use crate::models::analysis::AnalysisRecord;
use crate::raster::looks_like_pdf;
use crate::state::AppState;
use crate::storage::UploadedFile;
use crate::workflow::orchestrator::Submission;
use crate::workflow::state::WorkflowState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct UploadAcceptedResponse {
    pub job_id: Uuid,
    pub status_url: String,
}

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    #[serde(flatten)]
    pub state: WorkflowState,
    pub label: &'static str,
    pub is_processing: bool,
    pub redirect: Option<String>,
    pub started_at: DateTime<Utc>,
}

fn status_url(job_id: Uuid) -> String {
    format!("/api/v1/uploads/{job_id}")
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/uploads
///
/// Multipart form with `file`, `company-name`, `job-title` and `job-description`.
/// Starts the workflow in the background; poll the returned status URL.
pub async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadAcceptedResponse>), AppError> {
    let submission = read_submission(&mut multipart, state.config.max_upload_bytes).await?;

    let file = submission
        .file
        .as_ref()
        .ok_or_else(|| AppError::Validation("a resume file is required".to_string()))?;
    validate_pdf(file)?;

    let (job_id, status, cancel) = state.jobs.register(&state.shutdown);
    info!(
        "Accepted upload job {job_id}: '{}' ({} bytes)",
        file.file_name,
        file.bytes.len()
    );

    let workflow = state.workflow.clone();
    tokio::spawn(async move {
        if let Err(e) = workflow.run(submission, &status, &cancel).await {
            warn!("Upload job {job_id} ended without results: {e}");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadAcceptedResponse {
            job_id,
            status_url: status_url(job_id),
        }),
    ))
}

/// GET /api/v1/uploads/:job_id
pub async fn handle_upload_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, AppError> {
    let snapshot = state
        .jobs
        .snapshot(job_id)
        .ok_or_else(|| AppError::NotFound(format!("Upload job {job_id} not found")))?;

    Ok(Json(JobStatusResponse {
        job_id,
        label: snapshot.state.label(),
        is_processing: snapshot.state.is_processing(),
        redirect: snapshot.state.redirect(),
        state: snapshot.state,
        started_at: snapshot.started_at,
    }))
}

/// DELETE /api/v1/uploads/:job_id
///
/// Stops the job at its current step. No-op for jobs already finished.
pub async fn handle_cancel_upload(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.jobs.cancel(job_id) {
        return Err(AppError::NotFound(format!("Upload job {job_id} not found")));
    }
    info!("Cancellation requested for upload job {job_id}");
    Ok(StatusCode::ACCEPTED)
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AnalysisRecord>, AppError> {
    let record = load_record(state.store.as_ref(), id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;
    Ok(Json(record))
}

// ────────────────────────────────────────────────────────────────────────────
// Form parsing
// ────────────────────────────────────────────────────────────────────────────

async fn read_submission(
    multipart: &mut Multipart,
    max_file_bytes: usize,
) -> Result<Submission, AppError> {
    let mut submission = Submission::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| form_error("invalid multipart body", e))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("resume.pdf").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| form_error("could not read file", e))?;
                if bytes.len() > max_file_bytes {
                    return Err(AppError::PayloadTooLarge(format!(
                        "resume exceeds the {max_file_bytes} byte limit"
                    )));
                }
                // Browsers send an empty part when nothing was selected.
                if !bytes.is_empty() {
                    submission.file = Some(UploadedFile::new(file_name, content_type, bytes));
                }
            }
            "company-name" => submission.company_name = read_text(field).await?,
            "job-title" => submission.job_title = read_text(field).await?,
            "job-description" => submission.job_description = read_text(field).await?,
            other => warn!("Ignoring unknown form field '{other}'"),
        }
    }

    Ok(submission)
}

async fn read_text(field: Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| form_error("invalid form field", e))
}

/// Bodies cut off by the request size limit surface as 413, everything else as 400.
fn form_error(context: &str, err: MultipartError) -> AppError {
    let message = format!("{context}: {}", err.body_text());
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(message)
    } else {
        AppError::Validation(message)
    }
}

fn validate_pdf(file: &UploadedFile) -> Result<(), AppError> {
    let declared_pdf = file.content_type == "application/pdf"
        || file.file_name.to_ascii_lowercase().ends_with(".pdf");
    if !declared_pdf || !looks_like_pdf(&file.bytes) {
        return Err(AppError::Validation(
            "only PDF resumes are supported".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_pdf_accepts_by_content_type_or_extension() {
        let by_type = UploadedFile::new("resume", "application/pdf", &b"%PDF-1.4"[..]);
        let by_ext = UploadedFile::new("CV.PDF", "application/octet-stream", &b"%PDF-1.4"[..]);
        assert!(validate_pdf(&by_type).is_ok());
        assert!(validate_pdf(&by_ext).is_ok());
    }

    #[test]
    fn test_validate_pdf_rejects_wrong_type_or_bytes() {
        let docx = UploadedFile::new("resume.docx", "application/msword", &b"PK\x03\x04"[..]);
        let disguised = UploadedFile::new("resume.pdf", "application/pdf", &b"PK\x03\x04"[..]);
        assert!(matches!(validate_pdf(&docx), Err(AppError::Validation(_))));
        assert!(matches!(validate_pdf(&disguised), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_status_response_flattens_state() {
        let id = Uuid::new_v4();
        let state = WorkflowState::Complete { id };
        let response = JobStatusResponse {
            job_id: Uuid::nil(),
            label: state.label(),
            is_processing: state.is_processing(),
            redirect: state.redirect(),
            state,
            started_at: Utc::now(),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["state"], "complete");
        assert_eq!(value["id"], id.to_string());
        assert_eq!(value["label"], "Analysis complete, redirecting...");
        assert_eq!(value["redirect"], format!("/resume/{id}"));
        assert_eq!(value["is_processing"], false);
    }
}
