pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};

use crate::auth::require_auth;
use crate::state::AppState;
use crate::workflow::handlers;

/// Room for the text fields and multipart framing on top of the file itself.
const FORM_OVERHEAD_BYTES: usize = 256 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes + FORM_OVERHEAD_BYTES;

    let protected = Router::new()
        .route("/api/v1/uploads", post(handlers::handle_upload))
        .route(
            "/api/v1/uploads/:job_id",
            get(handlers::handle_upload_status).delete(handlers::handle_cancel_upload),
        )
        .route("/api/v1/resumes/:id", get(handlers::handle_get_resume))
        .layer(DefaultBodyLimit::max(body_limit))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health::health_handler))
        .merge(protected)
        .with_state(state)
}
