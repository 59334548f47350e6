// handlers/mod.rs - HTTP surface over the CRUD orchestrator
//
// Public: `/` and `/health`.
// Identity required: `/api/resource/:resource/*`, generic for every
// resource registered in the descriptor catalog.

pub mod resource;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::format::success_envelope;
use crate::database::DatabaseGateway;
use crate::error::ApiError;
use crate::middleware::{identity_middleware, IdentityHeaders};
use crate::services::ResourceService;

/// Shared by every handler; cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ResourceService>,
    pub db: Arc<dyn DatabaseGateway>,
}

impl AppState {
    pub fn new(service: ResourceService, db: Arc<dyn DatabaseGateway>) -> Self {
        Self { service: Arc::new(service), db }
    }
}

pub fn router(state: AppState, identity: IdentityHeaders) -> Router {
    let resources = Router::new()
        .route(
            "/api/resource/:resource",
            get(resource::collection::get)
                .post(resource::collection::post)
                .patch(resource::collection::patch),
        )
        .route("/api/resource/:resource/export", get(resource::collection::export))
        .route("/api/resource/:resource/bulk", post(resource::collection::bulk))
        .route(
            "/api/resource/:resource/:id",
            get(resource::record::get)
                .put(resource::record::put)
                .delete(resource::record::delete),
        )
        .route("/api/resource/:resource/:id/restore", post(resource::record::restore))
        .route_layer(middleware::from_fn_with_state(identity, identity_middleware));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(resources)
        .with_state(state)
}

async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(success_envelope(json!({
        "name": "kcore API (Rust)",
        "version": env!("CARGO_PKG_VERSION"),
        "resources": state.service.registry().resource_names(),
        "endpoints": {
            "list": "GET /api/resource/:resource",
            "export": "GET /api/resource/:resource/export",
            "record": "GET|PUT|DELETE /api/resource/:resource/:id",
            "create": "POST /api/resource/:resource",
            "bulk_create": "POST /api/resource/:resource/bulk",
            "bulk_update": "PATCH /api/resource/:resource",
            "restore": "POST /api/resource/:resource/:id/restore",
        }
    })))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.db.ping().await {
        Ok(_) => (
            StatusCode::OK,
            Json(success_envelope(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok"
            }))),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            ApiError::ServiceUnavailable("database unavailable".to_string()).into_response()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use crate::testing::{sample_registry, MockGateway};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    pub(crate) fn app() -> (Router, Arc<MockGateway>) {
        let db = Arc::new(MockGateway::new());
        let service = ResourceService::new(Arc::new(sample_registry()), db.clone(), FilterConfig::default());
        let headers = IdentityHeaders { tenant: "x-company-id".into(), principal: "x-contact-id".into() };
        (router(AppState::new(service, db.clone()), headers), db)
    }

    pub(crate) async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn root_lists_resources() {
        let (app, _) = app();
        let response = app.oneshot(Request::builder().uri("/").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], json!(0));
        assert!(body["data"]["resources"].as_array().unwrap().contains(&json!("orders")));
    }

    #[tokio::test]
    async fn health_pings_database() {
        let (app, db) = app();
        let response = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(db.last_statement().query, "SELECT 1 AS ok");
    }

    #[tokio::test]
    async fn health_reports_unavailable_database() {
        let (app, db) = app();
        db.push_query_error("connection refused");
        let response = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
