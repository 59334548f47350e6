/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Database operations supported throughout the system
/// Used by the field-mapping engine and the CRUD orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Create,
    Update,
    Delete,
    Restore, // Undo soft-delete by clearing ArchivedDate
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Restore => "restore",
        }
    }
}

/// Raw request parameters: query-string values and the decoded body.
///
/// Lookups consult the query string first, then the body, matching how
/// list parameters may arrive either way.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestInput {
    pub query: Map<String, Value>,
    pub body: Map<String, Value>,
}

impl RequestInput {
    pub fn new(query: Map<String, Value>, body: Map<String, Value>) -> Self {
        Self { query, body }
    }

    pub fn from_query(query: Map<String, Value>) -> Self {
        Self { query, body: Map::new() }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.query
            .get(key)
            .filter(|v| !v.is_null())
            .or_else(|| self.body.get(key).filter(|v| !v.is_null()))
    }

    /// String form of a scalar value; empty strings count as absent.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(if *b { "1".to_string() } else { "0".to_string() }),
            _ => None,
        }
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn is_truthy(&self, key: &str) -> bool {
        self.get(key).map(is_truthy).unwrap_or(false)
    }
}

/// Loose truthiness used for flags such as `archived`.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => {
            let s = s.trim();
            !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
        }
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_wins_over_body() {
        let query = json!({ "limit": "25" }).as_object().cloned().unwrap();
        let body = json!({ "limit": 5, "offset": 10 }).as_object().cloned().unwrap();
        let input = RequestInput::new(query, body);

        assert_eq!(input.get_i64("limit"), Some(25));
        assert_eq!(input.get_i64("offset"), Some(10));
    }

    #[test]
    fn truthiness_follows_loose_rules() {
        assert!(is_truthy(&json!("1")));
        assert!(is_truthy(&json!("2024-01-01 00:00:00")));
        assert!(!is_truthy(&json!("0")));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(null)));
        assert!(is_truthy(&json!(true)));
    }

    #[test]
    fn blank_strings_are_absent() {
        let input = RequestInput::from_query(json!({ "query": "  " }).as_object().cloned().unwrap());
        assert_eq!(input.get_str("query"), None);
    }
}
