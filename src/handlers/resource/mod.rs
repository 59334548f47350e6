pub mod collection;
pub mod record;

use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::api::format::query_to_map;
use crate::error::ApiError;
use crate::middleware::Identity;
use crate::services::RequestContext;
use crate::types::RequestInput;

/// Orchestrator context for one request: identity plus query and body.
pub(crate) fn request_context(identity: Identity, query: HashMap<String, String>, body: Map<String, Value>) -> RequestContext {
    RequestContext::new(identity.tenant_id, identity.principal_id)
        .with_input(RequestInput::new(query_to_map(query), body))
}

pub(crate) fn body_object(body: Value) -> Result<Map<String, Value>, ApiError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::bad_request("INVALID_PAYLOAD", "Body must be a JSON object")),
    }
}

/// Single-record mutations that touched nothing did not find the record
/// (or found it under another tenant).
pub(crate) fn require_affected(affected: u64, resource: &str, id: &str) -> Result<u64, ApiError> {
    if affected == 0 {
        return Err(ApiError::not_found(format!("{} {} not found", resource, id)));
    }
    Ok(affected)
}
