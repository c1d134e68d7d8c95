use std::collections::BTreeMap;

use axum::{debug_handler, extract::State, http::StatusCode, routing::get, Json, Router};
use hashcrack_store::StateStore;
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::ManagerState;

#[derive(Debug, Serialize, ToSchema)]
/// Per-component health report.
pub struct HealthResponse {
    pub status: String,
    pub components: BTreeMap<String, String>,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses (
        (status = 200, description = "Both the state store and the broker are reachable", body = HealthResponse),
        (status = 503, description = "At least one component is unhealthy", body = HealthResponse),
    )
)]
#[debug_handler(state = ManagerState)]
/// Health check
///
/// Probes the state store and the broker connection.
async fn handler(State(state): State<ManagerState>) -> (StatusCode, Json<HealthResponse>) {
    let mut components = BTreeMap::new();
    let mut healthy = true;

    match state.store.ping().await {
        Ok(()) => {
            components.insert("mongodb".to_owned(), "healthy".to_owned());
        }
        Err(err) => {
            healthy = false;
            components.insert("mongodb".to_owned(), format!("unhealthy: {err}"));
        }
    }

    if state.broker.is_connected().await {
        components.insert("rabbitmq".to_owned(), "healthy".to_owned());
    } else {
        healthy = false;
        components.insert(
            "rabbitmq".to_owned(),
            "unhealthy: connection closed".to_owned(),
        );
    }

    let (code, status) = if healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };
    (
        code,
        Json(HealthResponse {
            status: status.to_owned(),
            components,
        }),
    )
}

#[derive(OpenApi)]
#[openapi(paths(handler))]
struct Docs;

pub fn create_docs() -> utoipa::openapi::OpenApi {
    Docs::openapi()
}

pub fn create_router() -> Router<ManagerState> {
    Router::new().route("/", get(handler))
}
