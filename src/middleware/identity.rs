use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::SecurityConfig;
use crate::error::ApiError;

/// Tenant and principal ids asserted by the upstream auth layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Identity {
    pub tenant_id: Option<i64>,
    pub principal_id: Option<i64>,
}

/// Header names the identity is read from.
#[derive(Clone, Debug)]
pub struct IdentityHeaders {
    pub tenant: String,
    pub principal: String,
}

impl IdentityHeaders {
    pub fn from_config(security: &SecurityConfig) -> Self {
        Self { tenant: security.tenant_header.clone(), principal: security.principal_header.clone() }
    }

    pub fn extract(&self, headers: &HeaderMap) -> Result<Identity, ApiError> {
        let tenant_id = header_id(headers, &self.tenant)?
            .ok_or_else(|| ApiError::unauthorized(format!("Missing {} header", self.tenant)))?;
        let principal_id = header_id(headers, &self.principal)?;
        Ok(Identity { tenant_id: Some(tenant_id), principal_id })
    }
}

/// Rejects requests without a tenant header and injects `Identity`.
pub async fn identity_middleware(
    State(headers): State<IdentityHeaders>,
    mut request: Request,
    next: Next,
) -> Response {
    match headers.extract(request.headers()) {
        Ok(identity) => {
            tracing::debug!(tenant = ?identity.tenant_id, principal = ?identity.principal_id, "Identity resolved");
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

fn header_id(headers: &HeaderMap, name: &str) -> Result<Option<i64>, ApiError> {
    let Some(raw) = headers.get(name) else {
        return Ok(None);
    };
    raw.to_str()
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .map(Some)
        .ok_or_else(|| ApiError::bad_request("INVALID_IDENTITY", format!("Header {} must be an integer id", name)))
}
