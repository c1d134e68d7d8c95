use axum::{debug_handler, extract::State, http::StatusCode, routing::post, Json, Router};
use hashcrack_lib::hasher;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{OpenApi, ToSchema};

use crate::{
    error::{HostError, HostResult},
    metrics, submission, ManagerState,
};

#[derive(Debug, Deserialize, ToSchema)]
/// The body of a crack submission.
pub struct CrackRequestBody {
    /// Target digest, 32 hex characters, case-insensitive.
    pub hash: String,
    /// Upper bound on candidate length, 1 to 8.
    #[serde(rename = "maxLength")]
    pub max_length: u8,
}

#[derive(Debug, Serialize, ToSchema)]
/// The response body of an accepted crack submission.
pub struct CrackResponse {
    #[serde(rename = "requestId")]
    pub request_id: String,
}

/// Pulls and validates the submission fields out of an untyped body so the
/// client gets a 400 with the precise complaint instead of a generic
/// deserialization rejection.
fn parse_body(body: &Value, min_length: u8, max_length: u8) -> Result<(String, u8), HostError> {
    let hash = body.get("hash").filter(|v| !v.is_null());
    let length = body.get("maxLength").filter(|v| !v.is_null());
    let (Some(hash), Some(length)) = (hash, length) else {
        return Err(HostError::Validation("Missing hash or maxLength".to_owned()));
    };

    let hash = hash
        .as_str()
        .and_then(hasher::normalize)
        .ok_or_else(|| HostError::Validation("Invalid MD5 hash".to_owned()))?;

    let length = length
        .as_u64()
        .filter(|l| (u64::from(min_length)..=u64::from(max_length)).contains(l))
        .ok_or_else(|| {
            HostError::Validation(format!(
                "maxLength must be integer between {min_length} and {max_length}"
            ))
        })?;

    Ok((hash, length as u8))
}

#[utoipa::path(
    post,
    path = "/crack",
    tag = "Cracking",
    request_body = CrackRequestBody,
    responses (
        (status = 202, description = "Search accepted and dispatched", body = CrackResponse),
        (status = 400, description = "Malformed hash or maxLength"),
    )
)]
#[debug_handler(state = ManagerState)]
/// Submit a crack request
///
/// Partitions the keyspace up to `maxLength`, persists the request and its
/// tasks and dispatches them to the workers. Processing continues
/// asynchronously; poll the status route with the returned id.
async fn crack_handler(
    State(state): State<ManagerState>,
    Json(body): Json<Value>,
) -> HostResult<(StatusCode, Json<CrackResponse>)> {
    metrics::inc_crack_requests();
    let (hash, max_length) = parse_body(
        &body,
        state.opts.min_allowed_length,
        state.opts.max_allowed_length,
    )?;

    let outcome = submission::submit(
        &state.store,
        &state.broker,
        hash,
        max_length,
        state.opts.task_size,
    )
    .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(CrackResponse {
            request_id: outcome.request_id,
        }),
    ))
}

#[derive(OpenApi)]
#[openapi(paths(crack_handler))]
struct Docs;

pub fn create_docs() -> utoipa::openapi::OpenApi {
    Docs::openapi()
}

pub fn create_router() -> Router<ManagerState> {
    Router::new().route("/crack", post(crack_handler))
}
