//! Handlers for starting orchestrations and polling their status.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use dropzone_cloud::BlobAction;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::orchestrations::{OrchestrationInstance, RuntimeStatus};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartQuery {
    pub action: Option<String>,
    pub filepath: Option<String>,
    pub blob_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartedOrchestration {
    pub id: Uuid,
    pub runtime_status: RuntimeStatus,
    pub status_query_get_uri: String,
}

fn status_uri(id: Uuid) -> String {
    format!("/api/v1/orchestrations/instances/{id}")
}

// ---------------------------------------------------------------------------
// POST /orchestrations/{function}
// ---------------------------------------------------------------------------

/// Start an orchestration and return 202 with the status URL.
///
/// Without an `action`, a `filepath` alone starts an upload (the blob name
/// defaults to the file's base name).
pub async fn start_orchestration(
    State(state): State<AppState>,
    Path(function_name): Path<String>,
    Query(params): Query<StartQuery>,
) -> AppResult<impl IntoResponse> {
    let action_name = match params.action.as_deref().map(str::trim) {
        Some(action) if !action.is_empty() => action.to_string(),
        _ if params.filepath.is_some() => "upload".to_string(),
        _ => {
            return Err(AppError::BadRequest(
                "Query parameter 'action' is required (list, download or upload)".into(),
            ))
        }
    };

    let action = BlobAction::parse(&action_name, params.filepath, params.blob_name)?;
    let instance = state
        .orchestrations
        .start(state.orchestrator.clone(), function_name, action)
        .await;

    let uri = status_uri(instance.instance_id);
    Ok((
        StatusCode::ACCEPTED,
        [(header::LOCATION, uri.clone())],
        Json(DataResponse {
            data: StartedOrchestration {
                id: instance.instance_id,
                runtime_status: instance.runtime_status,
                status_query_get_uri: uri,
            },
        }),
    ))
}

// ---------------------------------------------------------------------------
// GET /orchestrations/instances/{id}
// ---------------------------------------------------------------------------

pub async fn get_orchestration_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<OrchestrationInstance>>> {
    let instance = state
        .orchestrations
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Orchestration instance {id}")))?;
    Ok(Json(DataResponse { data: instance }))
}
