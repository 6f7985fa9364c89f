//! Upload workflow — drives one resume submission from raw file to stored feedback.
//!
//! Flow: upload original → rasterize → upload preview → save partial record →
//!       inference → parse feedback → save final record.
//!
//! Steps run strictly in sequence. The first failing step halts the workflow
//! and nothing after it runs. Uploads, conversion and inference are raced
//! against the cancellation token. Store writes only check it beforehand: once a
//! write is sent it is awaited, so a stored record always matches the reported state.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::inference::prompts::build_feedback_prompt;
use crate::inference::{parse_feedback, FeedbackParseError, InferenceClient, InferenceError};
use crate::kv::{save_record, KeyValueStore, StoreError};
use crate::models::analysis::AnalysisRecord;
use crate::raster::{RasterizeError, Rasterizer};
use crate::storage::{FileStorage, StorageError, UploadedFile};
use crate::workflow::state::{FailureReason, StatusReporter, WorkflowState};

/// A resume submission as entered by the user.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub file: Option<UploadedFile>,
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("no resume file was selected")]
    NoFile,

    #[error("resume upload failed: {0}")]
    UploadFile(#[source] StorageError),

    #[error("PDF conversion failed: {0}")]
    Convert(#[source] RasterizeError),

    #[error("preview upload failed: {0}")]
    UploadImage(#[source] StorageError),

    #[error("saving analysis record failed: {0}")]
    Persist(#[source] StoreError),

    #[error("resume analysis failed: {0}")]
    Analyze(#[source] InferenceError),

    #[error("reading analysis result failed: {0}")]
    ParseFeedback(#[source] FeedbackParseError),

    #[error("workflow cancelled")]
    Cancelled,
}

impl WorkflowError {
    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            WorkflowError::NoFile | WorkflowError::Cancelled => None,
            WorkflowError::UploadFile(_) => Some(FailureReason::UploadFile),
            WorkflowError::Convert(_) => Some(FailureReason::Convert),
            WorkflowError::UploadImage(_) => Some(FailureReason::UploadImage),
            WorkflowError::Persist(_) => Some(FailureReason::Persist),
            WorkflowError::Analyze(_) => Some(FailureReason::Analyze),
            WorkflowError::ParseFeedback(_) => Some(FailureReason::ParseFeedback),
        }
    }

    /// State the workflow ends in. `None` for a submission rejected before it started.
    pub fn terminal_state(&self) -> Option<WorkflowState> {
        match self {
            WorkflowError::NoFile => None,
            WorkflowError::Cancelled => Some(WorkflowState::Cancelled),
            other => other.reason().map(|reason| WorkflowState::Failed { reason }),
        }
    }
}

/// Orchestrates the upload-and-analyze pipeline over its collaborators.
pub struct UploadWorkflow {
    storage: Arc<dyn FileStorage>,
    rasterizer: Arc<dyn Rasterizer>,
    inference: Arc<dyn InferenceClient>,
    store: Arc<dyn KeyValueStore>,
}

impl UploadWorkflow {
    pub fn new(
        storage: Arc<dyn FileStorage>,
        rasterizer: Arc<dyn Rasterizer>,
        inference: Arc<dyn InferenceClient>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            storage,
            rasterizer,
            inference,
            store,
        }
    }

    /// Runs the workflow to completion, reporting every state it enters.
    ///
    /// Returns the final, feedback-carrying record. On failure the terminal
    /// state has already been reported; a record saved before the failure
    /// stays in the store with `feedback: None`.
    pub async fn run(
        &self,
        submission: Submission,
        reporter: &dyn StatusReporter,
        cancel: &CancellationToken,
    ) -> Result<AnalysisRecord, WorkflowError> {
        let result = self.execute(submission, reporter, cancel).await;

        match &result {
            Ok(record) => {
                info!("Analysis {} complete", record.id);
                reporter.report(&WorkflowState::Complete { id: record.id });
            }
            Err(err) => {
                if let Some(state) = err.terminal_state() {
                    error!("Upload workflow halted: {err}");
                    reporter.report(&state);
                }
            }
        }

        result
    }

    async fn execute(
        &self,
        submission: Submission,
        reporter: &dyn StatusReporter,
        cancel: &CancellationToken,
    ) -> Result<AnalysisRecord, WorkflowError> {
        let Submission {
            file,
            company_name,
            job_title,
            job_description,
        } = submission;
        let file = file.ok_or(WorkflowError::NoFile)?;

        // 1. Original document
        enter(reporter, WorkflowState::Uploading);
        let uploaded_file = until_cancelled(cancel, self.storage.upload(&file))
            .await?
            .map_err(WorkflowError::UploadFile)?;
        info!("Stored resume at {} ({} bytes)", uploaded_file.path, uploaded_file.size);

        // 2. Preview image
        enter(reporter, WorkflowState::Converting);
        let image = until_cancelled(cancel, self.rasterizer.convert(&file))
            .await?
            .map_err(WorkflowError::Convert)?;
        debug!("Rendered preview {}x{} px", image.width, image.height);

        enter(reporter, WorkflowState::UploadingImage);
        let uploaded_image = until_cancelled(cancel, self.storage.upload(&image.file))
            .await?
            .map_err(WorkflowError::UploadImage)?;

        // 3. Partial record, so a later failure still leaves something to recover
        enter(reporter, WorkflowState::Preparing);
        let mut record = AnalysisRecord {
            id: Uuid::new_v4(),
            resume_path: uploaded_file.path,
            image_path: uploaded_image.path,
            company_name,
            job_title,
            job_description,
            feedback: None,
        };
        self.persist(&record, cancel).await?;
        info!("Saved partial analysis record {}", record.key());

        // 4. Inference
        enter(reporter, WorkflowState::Analyzing);
        let prompt = build_feedback_prompt(&record.job_title, &record.job_description);
        let inference = self.inference.feedback(&record.resume_path, &prompt);
        let response = until_cancelled(cancel, inference)
            .await?
            .map_err(WorkflowError::Analyze)?;

        record.feedback = Some(parse_feedback(&response).map_err(WorkflowError::ParseFeedback)?);

        self.persist(&record, cancel).await?;

        Ok(record)
    }

    async fn persist(
        &self,
        record: &AnalysisRecord,
        cancel: &CancellationToken,
    ) -> Result<(), WorkflowError> {
        if cancel.is_cancelled() {
            return Err(WorkflowError::Cancelled);
        }
        save_record(self.store.as_ref(), record)
            .await
            .map_err(WorkflowError::Persist)
    }
}

fn enter(reporter: &dyn StatusReporter, state: WorkflowState) {
    info!("Upload workflow: {}", state.label());
    reporter.report(&state);
}

async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    step: F,
) -> Result<F::Output, WorkflowError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(WorkflowError::Cancelled),
        output = step => Ok(output),
    }
}
