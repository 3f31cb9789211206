use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;

use crate::handlers::blobs;
use crate::state::AppState;

/// Blob routes.
///
/// ```text
/// GET  /blobs                 list all blobs
/// POST /blobs?filepath=       multipart upload
/// GET  /blobs/folder?name=    download every blob under a prefix
/// GET  /blobs/chunked         chunked download of ?filepath= to staging
/// ```
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/blobs",
            get(blobs::list_blobs)
                .post(blobs::upload_blobs)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/blobs/folder", get(blobs::download_blob_folder))
        .route("/blobs/chunked", get(blobs::chunked_blob_download))
}
