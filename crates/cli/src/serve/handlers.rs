//! HTTP route handlers: health and process CRUD.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use proctrack_core::{ListQuery, ProcessId, ProcessInput, ValidationError, PROCTRACK_VERSION};

use super::error::ApiError;
use super::json_error;
use super::state::AppState;

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "version": PROCTRACK_VERSION,
        "timestamp": OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
    });
    (StatusCode::OK, Json(response))
}

fn parse_id(raw: &str) -> Result<ProcessId, ApiError> {
    raw.parse::<ProcessId>()
        .map_err(|_| ValidationError::single("id", "must be a positive integer").into())
}

/// Decode a JSON request body into process input.
fn parse_input(body: &[u8]) -> Result<ProcessInput, ApiError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("malformed JSON body: {e}")))?;
    Ok(ProcessInput::from_json(&value)?)
}

/// GET /processes
pub(crate) async fn handle_list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, ApiError> {
    let query = ListQuery::from_params(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
    let page = state.store.list(&query).await?;
    Ok(Json(page))
}

/// GET /processes/{id}
pub(crate) async fn handle_get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.store.get(parse_id(&id)?).await?;
    Ok(Json(record))
}

/// POST /processes
pub(crate) async fn handle_create(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let input = parse_input(&body)?;
    let record = state.store.create(input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// PUT /processes/{id}
pub(crate) async fn handle_update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let patch = parse_input(&body)?;
    let record = state.store.update(id, patch).await?;
    Ok(Json(record))
}

/// DELETE /processes/{id}
pub(crate) async fn handle_delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.store.delete(parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /processes/import
///
/// The body is the CSV document itself.
pub(crate) async fn handle_import(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let text = std::str::from_utf8(&body)
        .map_err(|_| ApiError::BadRequest("CSV body must be UTF-8 text".to_string()))?;
    let report = state.store.import_csv(text).await?;
    Ok(Json(report))
}
