use axum::{
    body::Body, debug_handler, extract::State, http::header, response::Response, routing::get,
    Json, Router,
};
use hashcrack_store::{RequestCounts, StateStore, TaskCounts};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::{error::HostResult, ManagerState};

#[derive(Debug, Serialize, ToSchema)]
/// Request and task tallies by status, straight from the state store.
pub struct ManagerMetrics {
    pub requests: RequestCounts,
    pub tasks: TaskCounts,
}

#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Metrics",
    responses (
        (status = 200, description = "The request was successful"),
    ),
)]
#[debug_handler(state = ManagerState)]
/// Get prometheus metrics
async fn prometheus_handler() -> HostResult<Response> {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    let mf = prometheus::gather();
    encoder
        .encode(&mf, &mut buffer)
        .map_err(|e| anyhow::anyhow!(e))?;
    let resp = Response::builder()
        .header(header::CONTENT_TYPE, encoder.format_type())
        .body(Body::from(buffer))
        .map_err(|e| anyhow::anyhow!(e))?;
    Ok(resp)
}

#[utoipa::path(
    get,
    path = "/metrics/manager",
    tag = "Metrics",
    responses (
        (status = 200, description = "Counts of requests and tasks by status", body = ManagerMetrics),
    ),
)]
#[debug_handler(state = ManagerState)]
/// Get manager-level counters
async fn manager_handler(State(state): State<ManagerState>) -> HostResult<Json<ManagerMetrics>> {
    let requests: RequestCounts = state.store.request_counts().await?;
    let tasks: TaskCounts = state.store.task_counts().await?;
    Ok(Json(ManagerMetrics { requests, tasks }))
}

#[derive(OpenApi)]
#[openapi(paths(prometheus_handler, manager_handler))]
struct Docs;

pub fn create_docs() -> utoipa::openapi::OpenApi {
    Docs::openapi()
}

pub fn create_router() -> Router<ManagerState> {
    Router::new()
        .route("/", get(prometheus_handler))
        .route("/manager", get(manager_handler))
}
