use axum::{debug_handler, extract::State, routing::post, Json, Router};
use serde_json::{json, Value};
use tracing::info;
use utoipa::OpenApi;

use crate::ManagerState;

#[utoipa::path(
    post,
    path = "/shutdown",
    tag = "Admin",
    responses (
        (status = 200, description = "Shutdown initiated"),
    )
)]
#[debug_handler(state = ManagerState)]
/// Stop the manager
///
/// Cancels the retry sweeper and the result consumer and drains the HTTP
/// listener.
async fn handler(State(state): State<ManagerState>) -> Json<Value> {
    info!("received shutdown request");
    state.shutdown.cancel();
    Json(json!({ "status": "shutting down" }))
}

#[derive(OpenApi)]
#[openapi(paths(handler))]
struct Docs;

pub fn create_docs() -> utoipa::openapi::OpenApi {
    Docs::openapi()
}

pub fn create_router() -> Router<ManagerState> {
    Router::new().route("/", post(handler))
}
