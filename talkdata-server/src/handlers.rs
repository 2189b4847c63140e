//! Request handlers.

use crate::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use talkdata_core::{QueryResponse, SchemaCatalog};

/// Body of `POST /query`.
#[derive(Debug, Default, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: Option<String>,
}

/// A request-level failure rendered as `{ "error": ... }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Simple health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "service": "talkdata",
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// `GET /schema`
pub async fn schema_handler(
    State(state): State<AppState>,
) -> Result<Json<SchemaCatalog>, ApiError> {
    let catalog = state.pipeline.schema().await.map_err(|e| {
        tracing::error!("Schema discovery failed: {}", e);
        ApiError::internal(e.to_string())
    })?;
    Ok(Json(catalog.as_ref().clone()))
}

/// Whether the request declares a JSON body.
fn is_json(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    essence.eq_ignore_ascii_case("application/json") || essence.ends_with("+json")
}

/// Reads the `POST /query` body. A missing, empty or non-JSON body carries
/// no query; a JSON body that does not parse is a `400`.
fn parse_query_request(headers: &HeaderMap, body: &[u8]) -> Result<QueryRequest, ApiError> {
    if !is_json(headers) || body.iter().all(u8::is_ascii_whitespace) {
        return Ok(QueryRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!("Rejected request body: {}", e);
        ApiError::bad_request(format!("Invalid JSON body: {}", e))
    })
}

/// `POST /query`
///
/// Translator misses, guard rejections and failed statements are all
/// `200` responses; only a malformed request (`400`) or unreachable storage
/// (`500`) is a request-level error.
pub async fn query_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<QueryResponse>, ApiError> {
    let request = parse_query_request(&headers, &body)?;

    let question = request
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing query"))?;

    let response = state.pipeline.answer(question).await.map_err(|e| {
        tracing::error!("Query failed: {}", e);
        ApiError::internal(e.to_string())
    })?;

    Ok(Json(response))
}
