use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::post,
    Router,
};
use serde_json::Value;
use std::sync::Arc;

use crate::agent::{LegacyAdapter, ManagementAgent};
use crate::protocol::{Error, Request, Response, ADDRESS_LEGACY, ADDRESS_MANAGEMENT};

/// Shared state for the management endpoints: both addresses hold the same
/// underlying store through their agent/adapter.
pub struct ManagementAppState {
    pub agent: ManagementAgent,
    pub legacy: LegacyAdapter,
}

/// Create the management router exposing the primary address and its
/// legacy-suffixed sibling.
pub fn create_management_router(state: Arc<ManagementAppState>) -> Router {
    Router::new()
        .route(ADDRESS_MANAGEMENT, post(handle_management))
        .route(ADDRESS_LEGACY, post(handle_legacy))
        .with_state(state)
}

async fn handle_management(
    State(state): State<Arc<ManagementAppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> axum::response::Response {
    match decode(body) {
        Ok(request) => respond(state.agent.handle(request)),
        Err(e) => respond(Response::Error(e)),
    }
}

async fn handle_legacy(
    State(state): State<Arc<ManagementAppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> axum::response::Response {
    match decode(body) {
        Ok(request) => respond(state.legacy.handle(request)),
        Err(e) => respond(Response::Error(e)),
    }
}

/// Body and envelope decode failures are protocol BadRequests, not
/// transport-level plain-text rejections
fn decode(body: Result<Json<Value>, JsonRejection>) -> Result<Request, Error> {
    let Json(body) = body.map_err(|e| Error::bad_request(format!("malformed request: {}", e)))?;
    serde_json::from_value(body)
        .map_err(|e| Error::bad_request(format!("malformed request: {}", e)))
}

fn respond(response: Response) -> axum::response::Response {
    let status = StatusCode::from_u16(response.status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response.body())).into_response()
}
