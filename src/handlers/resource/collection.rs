use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

use super::{body_object, request_context};
use crate::error::ApiError;
use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult, FileResponse, Identity};
use crate::services::{exporter_for, RequestContext};

/// Body of a bulk update: the ids to touch and the columns to set.
#[derive(Debug, Deserialize)]
pub struct BulkUpdateBody {
    #[serde(rename = "IDs")]
    pub ids: Vec<Value>,
    #[serde(rename = "Fields")]
    pub fields: Map<String, Value>,
}

/// GET /api/resource/:resource - filtered, sorted, paged list; `format`
/// switches to an export of the whole filtered set.
pub async fn get(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let ctx = request_context(identity, query, Map::new());
    if let Some(format) = ctx.input.get_str("format") {
        return export_file(&state, &resource, &ctx, &format).await.map(IntoResponse::into_response);
    }

    let result = state.service.read_list_by(&resource, &ctx).await?;
    Ok(ApiResponse::success(result).into_response())
}

/// GET /api/resource/:resource/export
pub async fn export(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<FileResponse, ApiError> {
    let ctx = request_context(identity, query, Map::new());
    let format = ctx.input.get_str("format").unwrap_or_else(|| "jsonl".to_string());
    export_file(&state, &resource, &ctx, &format).await
}

async fn export_file(state: &AppState, resource: &str, ctx: &RequestContext, format: &str) -> Result<FileResponse, ApiError> {
    let exporter = exporter_for(format).map_err(|e| ApiError::bad_request("UNSUPPORTED_FORMAT", e.to_string()))?;
    let bytes = state.service.export(resource, ctx, exporter.as_ref()).await?;
    Ok(FileResponse {
        content_type: exporter.content_type(),
        file_name: format!("{}.{}", resource, exporter.file_extension()),
        bytes,
    })
}

/// POST /api/resource/:resource - create one record
pub async fn post(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<HashMap<String, String>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = payload.map_err(|e| ApiError::invalid_json(e.body_text()))?;
    let data = body_object(body)?;
    let ctx = request_context(identity, query, Map::new());

    let id = state.service.create(&resource, &ctx, &data, &Map::new()).await?;
    Ok(ApiResponse::created(json!({ "id": id })))
}

/// POST /api/resource/:resource/bulk - create many records in one statement.
/// Accepts a bare array or `{"rows": [...]}`.
pub async fn bulk(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<HashMap<String, String>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = payload.map_err(|e| ApiError::invalid_json(e.body_text()))?;
    let rows = match body {
        Value::Array(rows) => rows,
        Value::Object(mut map) => match map.remove("rows") {
            Some(Value::Array(rows)) => rows,
            _ => return Err(ApiError::bad_request("INVALID_PAYLOAD", "Expected an array of rows")),
        },
        _ => return Err(ApiError::bad_request("INVALID_PAYLOAD", "Expected an array of rows")),
    };
    let ctx = request_context(identity, query, Map::new());

    let ids = state.service.create_bulk(&resource, &ctx, &rows).await?;
    Ok(ApiResponse::created(json!({ "ids": ids })))
}

/// PATCH /api/resource/:resource - set the same fields on a list of ids
pub async fn patch(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<BulkUpdateBody>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = payload.map_err(|e| ApiError::invalid_json(e.body_text()))?;
    let ctx = request_context(identity, HashMap::new(), Map::new());

    let affected = state.service.bulk_update(&resource, &ctx, &body.ids, &body.fields).await?;
    Ok(ApiResponse::success(json!({ "affected": affected })))
}
