// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::Value;
use std::collections::HashMap;

use crate::api::format::error_envelope;
use crate::database::DatabaseError;
use crate::services::CrudError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest {
        code: &'static str,
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },
    InvalidJson(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 404 Not Found
    NotFound { code: &'static str, message: String },

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } | ApiError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest { message, .. } | ApiError::NotFound { message, .. } => message,
            ApiError::InvalidJson(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::InternalServerError(msg)
            | ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest { code, .. } | ApiError::NotFound { code, .. } => code,
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let field_errors = match self {
            ApiError::BadRequest { field_errors, .. } => field_errors.as_ref(),
            _ => None,
        };
        error_envelope(self.error_code(), self.message(), field_errors)
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::BadRequest { code, message: message.into(), field_errors: None }
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound { code: "NOT_FOUND", message: message.into() }
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        if err.is_unavailable() {
            tracing::error!("Database unavailable: {}", err);
            return ApiError::ServiceUnavailable("Database temporarily unavailable".to_string());
        }
        // Don't expose internal SQL errors to clients
        tracing::error!("Database error: {}", err);
        ApiError::internal_server_error("An error occurred while processing your request")
    }
}

impl From<CrudError> for ApiError {
    fn from(err: CrudError) -> Self {
        match err {
            CrudError::Database(e) => e.into(),
            CrudError::UnknownResource(name) => ApiError::NotFound {
                code: "UNKNOWN_RESOURCE",
                message: format!("Unknown resource: {}", name),
            },
            CrudError::Record(e) => {
                let field_errors = e.field().map(|field| {
                    let mut errors = HashMap::new();
                    errors.insert(field.to_string(), e.to_string());
                    errors
                });
                ApiError::BadRequest { code: e.code(), message: e.to_string(), field_errors }
            }
            err @ (CrudError::Filter(_) | CrudError::SoftDeleteUnsupported(_)) => {
                ApiError::bad_request(err.code(), err.to_string())
            }
            err @ (CrudError::Descriptor(_) | CrudError::NotCreated(_) | CrudError::Export(_)) => {
                tracing::error!("Request failed: {}", err);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::RecordError;
    use crate::filter::FilterError;
    use serde_json::json;

    #[test]
    fn validation_errors_are_bad_requests() {
        let err: ApiError = CrudError::from(FilterError::UnsupportedCompareField("Bogus".into())).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_json()["data"]["code"], json!("UNSUPPORTED_COMPARE_FIELD"));
    }

    #[test]
    fn missing_field_reports_field_error() {
        let err: ApiError = CrudError::from(RecordError::MissingRequiredField {
            table: "tbl_customer".into(),
            column: "Name".into(),
        })
        .into();
        let body = err.to_json();
        assert_eq!(body["status"], json!(1));
        assert_eq!(body["data"]["code"], json!("MISSING_REQUIRED_FIELD"));
        assert!(body["data"]["field_errors"]["Name"].is_string());
    }

    #[test]
    fn database_errors_hide_details() {
        let err: ApiError = CrudError::from(DatabaseError::QueryError("relation \"x\" does not exist".into())).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message().contains("relation"));

        let unavailable: ApiError = DatabaseError::Sqlx(sqlx::Error::PoolTimedOut).into();
        assert_eq!(unavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn unknown_resource_is_not_found() {
        let err: ApiError = CrudError::UnknownResource("widgets".into()).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), "UNKNOWN_RESOURCE");
    }
}
