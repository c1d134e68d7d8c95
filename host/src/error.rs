use axum::{http::StatusCode, response::IntoResponse, Json};
use hashcrack_broker::BrokerError;
use hashcrack_store::StoreError;
use tracing::error;
use utoipa::ToSchema;

/// The standardized error returned by the manager.
#[derive(Debug, thiserror::Error, ToSchema)]
pub enum HostError {
    /// For malformed client input.
    #[error("{0}")]
    Validation(String),

    /// For lookups of unknown request ids.
    #[error("request {0} not found")]
    NotFound(String),

    /// For state store failures.
    #[error("store error: {0}")]
    #[schema(value_type = Value)]
    Store(#[from] StoreError),

    /// For broker failures outside the publish-flagging path.
    #[error("broker error: {0}")]
    #[schema(value_type = Value)]
    Broker(#[from] BrokerError),

    /// A catch-all for any other error type.
    #[error("unexpected error: {0}")]
    #[schema(value_type = Value)]
    Anyhow(#[from] anyhow::Error),
}

impl IntoResponse for HostError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            HostError::Validation(message) => (StatusCode::BAD_REQUEST, message),
            HostError::NotFound(_) => (StatusCode::NOT_FOUND, "Request not found".to_owned()),
            HostError::Store(err) => {
                error!("store error while handling request: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_owned(),
                )
            }
            HostError::Broker(err) => {
                error!("broker error while handling request: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_owned(),
                )
            }
            HostError::Anyhow(err) => {
                error!("unexpected error while handling request: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_owned(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub type HostResult<T> = Result<T, HostError>;
