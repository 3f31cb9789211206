use axum::routing::{get, post};
use axum::Router;

use crate::handlers::orchestrations;
use crate::state::AppState;

/// Orchestration routes.
///
/// ```text
/// POST /orchestrations/{function}        start (?action=&filepath=&blob_name=)
/// GET  /orchestrations/instances/{id}    runtime status and output
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orchestrations/{function}", post(orchestrations::start_orchestration))
        .route(
            "/orchestrations/instances/{id}",
            get(orchestrations::get_orchestration_status),
        )
}
