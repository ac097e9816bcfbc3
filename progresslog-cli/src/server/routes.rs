use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::Json;
use progresslog_lib::{is_known_status, validate_entry, LogFilter};
use serde::Deserialize;

use super::auth::check_delete_key;
use super::error::ApiError;
use super::metrics::metrics;
use super::state::AppState;

const INDEX_PAGE: &str = include_str!("../../static/index.html");

type JsonResponse = (StatusCode, Json<serde_json::Value>);

// ── GET / ────────────────────────────────────────────────────

pub async fn handle_index() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

// ── Health ───────────────────────────────────────────────────

pub async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

// ── POST /log ────────────────────────────────────────────────

pub async fn handle_create_log(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<JsonResponse, ApiError> {
    let Json(body) = payload.map_err(|rejection| match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::BadRequest("Content-Type must be application/json".to_string())
        }
        other => {
            tracing::debug!(error = %other, "rejected request body");
            ApiError::BadRequest("Invalid JSON body".to_string())
        }
    })?;

    let entry = validate_entry(&body)?;

    let status_class = if is_known_status(&entry.status) {
        "known"
    } else {
        tracing::warn!(status = %entry.status, "non-standard status received");
        "unknown"
    };

    let stored = state.store.add(entry).await?;
    metrics()
        .entries_created
        .with_label_values(&[status_class])
        .inc();

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Progress logged successfully",
            "data": stored,
        })),
    ))
}

// ── GET /logs ────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    pub email: Option<String>,
    pub student_id: Option<String>,
    pub week: Option<String>,
}

impl From<LogsQuery> for LogFilter {
    fn from(q: LogsQuery) -> Self {
        LogFilter::new(q.email, q.student_id, q.week)
    }
}

pub async fn handle_get_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogsQuery>,
) -> Result<JsonResponse, ApiError> {
    let filter = LogFilter::from(query);
    let logs = state.store.query(&filter).await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "total_count": logs.len(),
            "logs": logs,
            "filters_applied": filter.applied(),
        })),
    ))
}

// ── GET /logs/all ────────────────────────────────────────────

pub async fn handle_all_logs(State(state): State<Arc<AppState>>) -> Result<JsonResponse, ApiError> {
    let logs = state.store.all().await?;
    tracing::debug!(count = logs.len(), backend = state.store.backend(), "healthcheck listing");

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "total_count": logs.len(),
            "logs": logs,
            "health": {
                "status": "ok",
                "storage": state.store.backend(),
                "log_filter": state.log_filter,
                "uptime_seconds": state.started_at.elapsed().as_secs(),
                "checked_at": chrono::Utc::now().to_rfc3339(),
            },
        })),
    ))
}

// ── DELETE /logs ─────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    pub key: Option<String>,
}

pub async fn handle_delete_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeleteQuery>,
) -> Result<JsonResponse, ApiError> {
    if let Err(e) = check_delete_key(&state.delete_secret, query.key.as_deref()) {
        let reason = match e {
            ApiError::Forbidden(_) => "invalid_key",
            _ => "missing_key",
        };
        metrics().delete_rejected.with_label_values(&[reason]).inc();
        return Err(e);
    }

    let deleted = state.store.clear().await?;
    metrics().entries_deleted.inc_by(deleted as u64);
    tracing::info!(deleted, backend = state.store.backend(), "progress logs cleared");

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "message": "All progress logs have been cleared successfully",
            "deleted_count": deleted,
        })),
    ))
}

// ── Fallbacks ────────────────────────────────────────────────

pub async fn handle_not_found() -> ApiError {
    ApiError::NotFound
}

pub async fn handle_method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
