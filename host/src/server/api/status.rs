use axum::{
    debug_handler,
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use hashcrack_store::{RequestStatus, StateStore};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::{
    error::{HostError, HostResult},
    metrics, ManagerState,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct StatusParams {
    /// Id returned by the crack route.
    #[serde(rename = "requestId")]
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
/// The response body of a status lookup. `progress` is present while the
/// search runs, `results` once it is READY.
pub struct StatusResponse {
    pub status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<String>>,
}

#[utoipa::path(
    get,
    path = "/status",
    tag = "Cracking",
    params(StatusParams),
    responses (
        (status = 200, description = "Current state of the request", body = StatusResponse),
        (status = 400, description = "Missing requestId"),
        (status = 404, description = "Unknown requestId"),
    )
)]
#[debug_handler(state = ManagerState)]
/// Look up a crack request
///
/// While the search is IN_PROGRESS the response carries the percentage of
/// tasks done; once READY it carries every preimage found, possibly none.
async fn status_handler(
    State(state): State<ManagerState>,
    Query(params): Query<StatusParams>,
) -> HostResult<Json<StatusResponse>> {
    metrics::inc_status_requests();
    let request_id = params
        .request_id
        .ok_or_else(|| HostError::Validation("Missing requestId".to_owned()))?;

    let request = state
        .store
        .get_request(&request_id)
        .await?
        .ok_or(HostError::NotFound(request_id.clone()))?;

    let response = match request.status {
        RequestStatus::InProgress => {
            let counts = state.store.request_task_counts(&request_id).await?;
            let progress = (counts.total > 0)
                .then(|| (100 * counts.done / counts.total) as u8);
            StatusResponse {
                status: request.status,
                progress,
                results: None,
            }
        }
        RequestStatus::Ready => StatusResponse {
            status: request.status,
            progress: None,
            results: Some(request.results),
        },
        RequestStatus::Error => StatusResponse {
            status: request.status,
            progress: None,
            results: None,
        },
    };

    Ok(Json(response))
}

#[derive(OpenApi)]
#[openapi(paths(status_handler))]
struct Docs;

pub fn create_docs() -> utoipa::openapi::OpenApi {
    Docs::openapi()
}

pub fn create_router() -> Router<ManagerState> {
    Router::new().route("/status", get(status_handler))
}
