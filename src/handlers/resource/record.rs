use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

use super::{body_object, request_context, require_affected};
use crate::error::ApiError;
use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult, Identity};
use crate::types::is_truthy;

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    /// `hard=1` removes the row instead of archiving it.
    pub hard: Option<String>,
}

/// GET /api/resource/:resource/:id - one record with its nested tables
pub async fn get(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Map<String, Value>> {
    let ctx = request_context(identity, HashMap::new(), Map::new());
    match state.service.find_by_id(&resource, &ctx, &id).await? {
        Some(row) => Ok(ApiResponse::success(row)),
        None => Err(ApiError::not_found(format!("{} {} not found", resource, id))),
    }
}

/// PUT /api/resource/:resource/:id - update; a truthy `ArchivedDate` restores
pub async fn put(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<HashMap<String, String>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = payload.map_err(|e| ApiError::invalid_json(e.body_text()))?;
    let data = body_object(body)?;
    let ctx = request_context(identity, query, Map::new());

    let affected = state.service.update(&resource, &ctx, &id, &data, &Map::new()).await?;
    let affected = require_affected(affected, &resource, &id)?;
    Ok(ApiResponse::success(json!({ "affected": affected })))
}

/// DELETE /api/resource/:resource/:id - soft delete, or hard with `?hard=1`
pub async fn delete(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<Value> {
    let ctx = request_context(identity, HashMap::new(), Map::new());
    let hard = query.hard.map(Value::String).as_ref().map(is_truthy).unwrap_or(false);

    let affected = if hard {
        state.service.hard_delete(&resource, &ctx, &id).await?
    } else {
        state.service.soft_delete(&resource, &ctx, &id).await?
    };
    let affected = require_affected(affected, &resource, &id)?;
    Ok(ApiResponse::success(json!({ "affected": affected })))
}

/// POST /api/resource/:resource/:id/restore - clear the archive stamp
pub async fn restore(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Value> {
    let ctx = request_context(identity, HashMap::new(), Map::new());
    let affected = state.service.restore(&resource, &ctx, &id).await?;
    let affected = require_affected(affected, &resource, &id)?;
    Ok(ApiResponse::success(json!({ "affected": affected })))
}

#[cfg(test)]
mod tests {
    use crate::handlers::tests::{app, body_json};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    fn request(method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri).header("x-company-id", "1");
        match body {
            Some(v) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    #[tokio::test]
    async fn get_returns_record_with_nested_rows() {
        let (app, db) = app();
        db.push_rows(vec![json!({ "OrderID": 5 })]);
        db.push_rows(vec![json!({ "OrderItemID": 1, "Sku": "A-1" })]);

        let response = app.oneshot(request("GET", "/api/resource/orders/5", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["OrderID"], json!(5));
        assert_eq!(body["data"]["order_item"][0]["Sku"], json!("A-1"));
    }

    #[tokio::test]
    async fn get_missing_record_is_404() {
        let (app, _) = app();
        let response = app.oneshot(request("GET", "/api/resource/orders/5", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["data"]["code"], json!("NOT_FOUND"));
    }

    #[tokio::test]
    async fn update_touching_nothing_is_404() {
        let (app, db) = app();
        db.push_affected(0);
        let response = app
            .oneshot(request("PUT", "/api/resource/customers/4", Some(json!({ "Name": "X" }))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_is_soft_unless_hard_requested() {
        let (app, db) = app();
        db.push_affected(1);
        let response = app.clone().oneshot(request("DELETE", "/api/resource/orders/5", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(db.last_statement().query.starts_with("UPDATE \"tbl_order\" SET \"ArchivedDate\""));

        db.push_affected(1);
        let response = app.oneshot(request("DELETE", "/api/resource/orders/5?hard=1", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(db.last_statement().query.starts_with("DELETE FROM \"tbl_order\""));
    }

    #[tokio::test]
    async fn soft_delete_without_archive_column_is_400() {
        let (app, _) = app();
        let response = app.oneshot(request("DELETE", "/api/resource/companies/1", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["data"]["code"], json!("SOFT_DELETE_UNSUPPORTED"));
    }

    #[tokio::test]
    async fn restore_clears_archive_stamp() {
        let (app, db) = app();
        db.push_affected(1);
        let response = app.oneshot(request("POST", "/api/resource/orders/5/restore", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(db.last_statement().params[2].is_null());
    }
}
