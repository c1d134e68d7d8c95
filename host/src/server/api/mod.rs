use axum::{
    http::{header, HeaderName, HeaderValue, Method, StatusCode, Uri},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{self, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};
use utoipa_swagger_ui::SwaggerUi;

use crate::ManagerState;

mod admin;
mod crack;
mod health;
mod metrics;
mod status;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Hashcrack Manager API",
        version = "1.0",
        description = "Submits MD5 preimage searches, reports their progress and results",
    ),
    components(
        schemas(
            crate::error::HostError,
            crack::CrackRequestBody,
            crack::CrackResponse,
            status::StatusResponse,
            health::HealthResponse,
            metrics::ManagerMetrics,
            hashcrack_store::RequestStatus,
            hashcrack_store::RequestCounts,
            hashcrack_store::TaskCounts,
        )
    ),
    tags(
        (name = "Cracking", description = "Routes that accept and track crack requests"),
        (name = "Health", description = "Routes that report the server health status"),
        (name = "Metrics", description = "Routes that give detailed insight into the system"),
        (name = "Admin", description = "Routes that control the manager lifecycle")
    )
)]
/// The root API struct which is generated from the `OpenApi` derive macro.
pub struct Docs;

#[must_use]
pub fn create_docs() -> utoipa::openapi::OpenApi {
    [
        admin::create_docs(),
        crack::create_docs(),
        health::create_docs(),
        metrics::create_docs(),
        status::create_docs(),
    ]
    .into_iter()
    .fold(Docs::openapi(), |mut doc, sub_doc| {
        doc.merge(sub_doc);
        doc
    })
}

pub fn create_router() -> Router<ManagerState> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::ORIGIN,
            header::ACCEPT,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-requested-with"),
        ])
        .allow_origin(cors::Any);
    let compression = CompressionLayer::new();

    // `if_not_present` so the prometheus exposition keeps its text format.
    let middleware = ServiceBuilder::new().layer(cors).layer(compression).layer(
        SetResponseHeaderLayer::if_not_present(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        ),
    );

    let trace = TraceLayer::new_for_http();

    let docs = create_docs();

    Router::new()
        .nest(
            "/api/hash",
            crack::create_router().merge(status::create_router()),
        )
        .nest("/health", health::create_router())
        .nest("/metrics", metrics::create_router())
        .nest("/shutdown", admin::create_router())
        .layer(middleware)
        .layer(trace)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", docs.clone()))
        .merge(Scalar::with_url("/scalar", docs))
        .fallback(|uri: Uri| async move {
            (StatusCode::NOT_FOUND, format!("No handler found for {uri}"))
        })
}
