//! Workflow state machine and status reporting.

use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

use crate::models::analysis::results_path;

/// The step that halted a failed workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    UploadFile,
    Convert,
    UploadImage,
    Persist,
    Analyze,
    ParseFeedback,
}

impl FailureReason {
    pub fn label(self) -> &'static str {
        match self {
            FailureReason::UploadFile => "Error: Failed to upload file",
            FailureReason::Convert => "Error: Failed to convert PDF to image",
            FailureReason::UploadImage => "Error: Failed to upload image",
            FailureReason::Persist => "Error: Failed to save analysis data",
            FailureReason::Analyze => "Error: Failed to analyze resume",
            FailureReason::ParseFeedback => "Error: Failed to read analysis result",
        }
    }
}

/// Current position of one upload workflow.
///
/// `Idle → Uploading → Converting → UploadingImage → Preparing → Analyzing`
/// then exactly one of `Complete`, `Failed` or `Cancelled`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    Uploading,
    Converting,
    UploadingImage,
    Preparing,
    Analyzing,
    Complete { id: Uuid },
    Failed { reason: FailureReason },
    Cancelled,
}

impl WorkflowState {
    /// Human-readable status shown while the workflow runs.
    pub fn label(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "",
            WorkflowState::Uploading => "Uploading the file...",
            WorkflowState::Converting => "Converting to image...",
            WorkflowState::UploadingImage => "Uploading the image...",
            WorkflowState::Preparing => "Preparing data...",
            WorkflowState::Analyzing => "Analyzing...",
            WorkflowState::Complete { .. } => "Analysis complete, redirecting...",
            WorkflowState::Failed { reason } => reason.label(),
            WorkflowState::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowState::Complete { .. } | WorkflowState::Failed { .. } | WorkflowState::Cancelled
        )
    }

    /// True between submission and a terminal state.
    pub fn is_processing(&self) -> bool {
        !self.is_terminal() && *self != WorkflowState::Idle
    }

    /// Results view to navigate to, once complete.
    pub fn redirect(&self) -> Option<String> {
        match self {
            WorkflowState::Complete { id } => Some(results_path(*id)),
            _ => None,
        }
    }
}

/// Receives every state the workflow enters, in order.
pub trait StatusReporter: Send + Sync {
    fn report(&self, state: &WorkflowState);
}

impl StatusReporter for watch::Sender<WorkflowState> {
    fn report(&self, state: &WorkflowState) {
        // send_replace never fails, even with no receivers left.
        self.send_replace(state.clone());
    }
}
