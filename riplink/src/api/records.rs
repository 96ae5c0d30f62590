//! Rip and record endpoints
//!
//! - GET  /ripped
//! - GET  /missing
//! - GET  /outstanding
//! - POST /records/:id/force
//! - POST /records/:id/update
//! - POST /records/:id/verify

use axum::{
    extract::{rejection::PathRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::models::{IssueHandle, Record, RipEntry};
use crate::services::LinkOutcome;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct RippedResponse {
    pub ripped: Vec<RipEntry>,
}

#[derive(Debug, Serialize)]
pub struct MissingResponse {
    /// Lowest pending record, if any
    pub missing: Option<Record>,
}

#[derive(Debug, Serialize)]
pub struct OutstandingResponse {
    pub handles: Vec<IssueHandle>,
}

#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub record_id: i32,
    #[serde(flatten)]
    pub outcome: LinkOutcome,
}

/// GET /ripped
pub async fn get_ripped(State(state): State<AppState>) -> Json<RippedResponse> {
    Json(RippedResponse {
        ripped: state.processor.get_ripped().await,
    })
}

/// GET /missing
pub async fn get_missing(State(state): State<AppState>) -> ApiResult<Json<MissingResponse>> {
    let missing = state.processor.get_missing().await?;
    Ok(Json(MissingResponse { missing }))
}

/// GET /outstanding
pub async fn get_outstanding(State(state): State<AppState>) -> ApiResult<Json<OutstandingResponse>> {
    let handles = state.processor.get_outstanding().await?;
    Ok(Json(OutstandingResponse { handles }))
}

/// Record id from the path, rejecting anything that is not an integer
fn record_id(id: Result<Path<i32>, PathRejection>) -> ApiResult<i32> {
    id.map(|Path(id)| id)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// POST /records/:id/force
pub async fn force_relink(
    State(state): State<AppState>,
    id: Result<Path<i32>, PathRejection>,
) -> ApiResult<Json<LinkResponse>> {
    let id = record_id(id)?;
    let outcome = state.processor.force_relink(id).await?;
    Ok(Json(LinkResponse { record_id: id, outcome }))
}

/// POST /records/:id/update
pub async fn client_update(
    State(state): State<AppState>,
    id: Result<Path<i32>, PathRejection>,
) -> ApiResult<Json<LinkResponse>> {
    let id = record_id(id)?;
    let outcome = state.processor.client_update(id).await?;
    Ok(Json(LinkResponse { record_id: id, outcome }))
}

/// POST /records/:id/verify
pub async fn verify(
    State(state): State<AppState>,
    id: Result<Path<i32>, PathRejection>,
) -> ApiResult<Json<LinkResponse>> {
    let id = record_id(id)?;
    let outcome = state.processor.verify(id).await?;
    Ok(Json(LinkResponse { record_id: id, outcome }))
}

/// Build record routes
pub fn record_routes() -> Router<AppState> {
    Router::new()
        .route("/ripped", get(get_ripped))
        .route("/missing", get(get_missing))
        .route("/outstanding", get(get_outstanding))
        .route("/records/:id/force", post(force_relink))
        .route("/records/:id/update", post(client_update))
        .route("/records/:id/verify", post(verify))
}
