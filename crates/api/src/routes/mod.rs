pub mod blobs;
pub mod health;
pub mod orchestrations;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /blobs                                 list, upload
/// /blobs/folder                          folder download
/// /blobs/chunked                         chunked download
///
/// /orchestrations/{function}             start orchestration
/// /orchestrations/instances/{id}         orchestration status
/// ```
pub fn api_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .merge(blobs::router(max_upload_bytes))
        .merge(orchestrations::router())
}
