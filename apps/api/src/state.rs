use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::auth::Authenticator;
use crate::config::Config;
use crate::kv::KeyValueStore;
use crate::workflow::jobs::JobRegistry;
use crate::workflow::orchestrator::UploadWorkflow;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<UploadWorkflow>,
    /// Read side of the analysis records, for the results endpoint.
    pub store: Arc<dyn KeyValueStore>,
    pub auth: Arc<dyn Authenticator>,
    pub jobs: JobRegistry,
    /// Parent of every job's cancellation token; cancelled on shutdown.
    pub shutdown: CancellationToken,
    pub config: Config,
}
