// ==========================================
// 安保业务后台 - HTTP 路由
// ==========================================
// 路由:
// - POST /api/import-data       JSON 行导入
// - POST /api/import-preview    JSON 行预览（不写入）
// - POST /api/import-file       表格文件导入（?type=&format=）
// - GET  /api/export-data       导出 .xlsx（?type=）
// - GET  /api/import-batches    最近批次（?limit=）
// - GET  /health
// ==========================================

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::error::{ApiError, ApiResult};
use crate::api::export_api::nothing_to_export_message;
use crate::api::import_api::{ImportApiResponse, ImportRequest};
use crate::app::state::AppState;
use crate::domain::import_report::{ImportBatch, ImportMode};
use crate::exporter::ExportOutcome;

/// 上传文件大小上限
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// 批次列表默认条数
const DEFAULT_BATCH_LIST_LIMIT: usize = 20;

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

type SharedState = Arc<AppState>;

#[derive(Debug, Deserialize)]
pub struct EntityQuery {
    #[serde(rename = "type")]
    pub entity_type: String,
}

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub format: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchQuery {
    pub limit: Option<usize>,
}

/// 创建 HTTP 应用
pub fn create_app(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/import-data", post(import_data))
        .route("/api/import-preview", post(import_preview))
        .route("/api/import-file", post(import_file))
        .route("/api/export-data", get(export_data))
        .route("/api/import-batches", get(list_batches))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": crate::VERSION }))
}

async fn import_data(
    State(state): State<SharedState>,
    payload: Result<Json<ImportRequest>, JsonRejection>,
) -> ApiResult<Json<ImportApiResponse>> {
    run_json_import(&state, payload, ImportMode::Apply).await
}

async fn import_preview(
    State(state): State<SharedState>,
    payload: Result<Json<ImportRequest>, JsonRejection>,
) -> ApiResult<Json<ImportApiResponse>> {
    run_json_import(&state, payload, ImportMode::Preview).await
}

async fn run_json_import(
    state: &AppState,
    payload: Result<Json<ImportRequest>, JsonRejection>,
    mode: ImportMode,
) -> ApiResult<Json<ImportApiResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
    let response = state
        .import_api
        .import_data(&request.entity_type, &request.data, mode)
        .await?;
    Ok(Json(response))
}

async fn import_file(
    State(state): State<SharedState>,
    query: Result<Query<FileQuery>, QueryRejection>,
    body: Bytes,
) -> ApiResult<Json<ImportApiResponse>> {
    let Query(query) = query.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
    let format = query.format.as_deref().unwrap_or("xlsx");
    let response = state
        .import_api
        .import_file(&query.entity_type, format, &body)
        .await?;
    Ok(Json(response))
}

async fn export_data(
    State(state): State<SharedState>,
    query: Result<Query<EntityQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
    let outcome = state.export_api.export_data(&query.entity_type).await?;

    let response = match outcome {
        ExportOutcome::Empty => Json(json!({
            "message": nothing_to_export_message(&query.entity_type)
        }))
        .into_response(),
        ExportOutcome::Workbook { filename, bytes } => (
            [
                (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename={}", filename),
                ),
            ],
            bytes,
        )
            .into_response(),
    };
    Ok(response)
}

async fn list_batches(
    State(state): State<SharedState>,
    query: Result<Query<BatchQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<ImportBatch>>> {
    let Query(query) = query.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
    let limit = query.limit.unwrap_or(DEFAULT_BATCH_LIST_LIMIT);
    Ok(Json(state.import_api.list_batches(limit).await?))
}
