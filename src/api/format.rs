use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// Status field of the envelope: 0 on success, 1 on failure.
pub const STATUS_OK: u8 = 0;
pub const STATUS_ERROR: u8 = 1;

/// `{status: 0, message: "OK", data}`
pub fn success_envelope(data: Value) -> Value {
    json!({
        "status": STATUS_OK,
        "message": "OK",
        "data": data,
    })
}

/// `{status: 1, message, data: {code, field_errors?}}`
pub fn error_envelope(code: &str, message: &str, field_errors: Option<&HashMap<String, String>>) -> Value {
    let mut data = Map::new();
    data.insert("code".into(), Value::String(code.to_string()));
    if let Some(errors) = field_errors {
        data.insert("field_errors".into(), json!(errors));
    }
    json!({
        "status": STATUS_ERROR,
        "message": message,
        "data": Value::Object(data),
    })
}

/// Query-string pairs as the loosely typed input map the filter layer reads.
pub fn query_to_map(pairs: HashMap<String, String>) -> Map<String, Value> {
    pairs.into_iter().map(|(k, v)| (k, Value::String(v))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_success_payload() {
        let envelope = success_envelope(json!({ "id": 4 }));
        assert_eq!(envelope, json!({ "status": 0, "message": "OK", "data": { "id": 4 } }));
    }

    #[test]
    fn error_envelope_carries_code_and_fields() {
        let mut fields = HashMap::new();
        fields.insert("Name".to_string(), "This field is required".to_string());
        let envelope = error_envelope("MISSING_REQUIRED_FIELD", "Missing required field", Some(&fields));

        assert_eq!(envelope["status"], json!(1));
        assert_eq!(envelope["data"]["code"], json!("MISSING_REQUIRED_FIELD"));
        assert_eq!(envelope["data"]["field_errors"]["Name"], json!("This field is required"));
        assert!(error_envelope("NOT_FOUND", "gone", None)["data"].get("field_errors").is_none());
    }
}
