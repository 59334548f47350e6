use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use sqlx::types::BigDecimal;
use std::cmp::Ordering;
use std::str::FromStr;
use uuid::Uuid;

use crate::descriptor::{ColumnKind, ColumnRole, ColumnSpec, ModelDescriptor, ValidationRule};
use crate::filter::types::{CompareOp, SqlParam, DATETIME_FORMAT, DATE_FORMAT, TIME_FORMAT};
use crate::types::Operation;

/// Errors that can occur while mapping request data onto a descriptor
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Missing required field '{column}' on {table}")]
    MissingRequiredField { table: String, column: String },
    #[error("Validation failed on {table}: {rule}")]
    ValidationFailed { table: String, rule: String },
    #[error("Unknown column '{column}' on {table}")]
    UnknownColumn { table: String, column: String },
    #[error("Invalid value for '{column}': {value}")]
    InvalidValue { column: String, value: String },
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl RecordError {
    pub fn code(&self) -> &'static str {
        match self {
            RecordError::MissingRequiredField { .. } => "MISSING_REQUIRED_FIELD",
            RecordError::ValidationFailed { .. } => "VALIDATION_FAILED",
            RecordError::UnknownColumn { .. } => "UNKNOWN_COLUMN",
            RecordError::InvalidValue { .. } => "INVALID_VALUE",
            RecordError::InvalidPayload(_) => "INVALID_PAYLOAD",
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            RecordError::MissingRequiredField { column, .. }
            | RecordError::UnknownColumn { column, .. }
            | RecordError::InvalidValue { column, .. } => Some(column),
            _ => None,
        }
    }
}

/// Caller-supplied system values for one write.
#[derive(Debug, Clone)]
pub struct ResolveContext<'a> {
    pub tenant_id: Option<i64>,
    pub principal_id: Option<i64>,
    pub parent_key: Option<&'a str>,
    pub parent_id: Option<i64>,
    pub now: NaiveDateTime,
}

impl<'a> ResolveContext<'a> {
    pub fn new(tenant_id: Option<i64>, principal_id: Option<i64>) -> Self {
        Self {
            tenant_id,
            principal_id,
            parent_key: None,
            parent_id: None,
            now: chrono::Local::now().naive_local(),
        }
    }

    pub fn with_parent(mut self, parent_key: Option<&'a str>, parent_id: Option<i64>) -> Self {
        self.parent_key = parent_key;
        self.parent_id = parent_id;
        self
    }
}

/// Column values resolved for one write, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedFields {
    values: Vec<(String, SqlParam)>,
}

impl ResolvedFields {
    pub fn get(&self, column: &str) -> Option<&SqlParam> {
        self.values.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: SqlParam) {
        let column = column.into();
        match self.values.iter_mut().find(|(c, _)| *c == column) {
            Some(existing) => existing.1 = value,
            None => self.values.push((column, value)),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(c, _)| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_json(&self) -> Map<String, Value> {
        self.values.iter().map(|(c, v)| (c.clone(), v.to_json())).collect()
    }

    pub fn into_values(self) -> Vec<(String, SqlParam)> {
        self.values
    }
}

enum Resolution {
    /// Never written by generic mapping.
    Skip,
    /// Nothing supplied for the column.
    Absent,
    /// Supplied, but null after sanitization.
    Null,
    Value(SqlParam),
}

/// Map request data onto the descriptor's columns for an insert or update.
///
/// Priority per column: `defaults`, then the column's system role, then
/// `data` sanitized by kind. A non-nullable column without a default that
/// ends up null (or, on create, unsupplied) fails the whole resolution.
pub fn resolve_fields(
    descriptor: &ModelDescriptor,
    data: &Map<String, Value>,
    defaults: &Map<String, Value>,
    operation: Operation,
    ctx: &ResolveContext<'_>,
) -> Result<ResolvedFields, RecordError> {
    let creating = operation == Operation::Create;
    let mut resolved = ResolvedFields::default();

    for column in descriptor.columns() {
        let resolution = match defaults.get(&column.name) {
            Some(value) => match value_to_param(column.kind, value) {
                Some(param) if param.is_null() => Resolution::Null,
                Some(param) => Resolution::Value(param),
                None => {
                    return Err(RecordError::InvalidValue {
                        column: column.name.clone(),
                        value: value.to_string(),
                    })
                }
            },
            None => resolve_column(column, data, creating, ctx),
        };

        let value = match resolution {
            Resolution::Skip => continue,
            Resolution::Value(param) => param,
            Resolution::Absent if !creating => continue,
            Resolution::Absent if column.default_literal.is_none() && column.nullable => continue,
            Resolution::Absent | Resolution::Null => match fallback(descriptor, column, ctx)? {
                Some(param) => param,
                None => continue,
            },
        };
        resolved.insert(column.name.clone(), value);
    }

    Ok(resolved)
}

fn resolve_column(column: &ColumnSpec, data: &Map<String, Value>, creating: bool, ctx: &ResolveContext<'_>) -> Resolution {
    if ctx.parent_key == Some(column.name.as_str()) {
        return match (creating, ctx.parent_id) {
            (false, _) => Resolution::Skip,
            (true, Some(id)) => Resolution::Value(SqlParam::Int(id)),
            (true, None) => parent_from_data(column, data),
        };
    }

    match column.role {
        ColumnRole::PrimaryKey | ColumnRole::Geo | ColumnRole::Archived => Resolution::Skip,
        ColumnRole::Tenant => id_or_absent(ctx.tenant_id, creating),
        ColumnRole::Auditor => id_or_absent(ctx.principal_id, creating),
        ColumnRole::AuditTimestamp => Resolution::Value(now_param(column.kind, ctx.now)),
        ColumnRole::AutoToken => Resolution::Value(SqlParam::Text(generate_token())),
        ColumnRole::Data => match data.get(&column.name) {
            None => Resolution::Absent,
            Some(value) => match sanitize(column.kind, value) {
                Some(param) => Resolution::Value(param),
                None => Resolution::Null,
            },
        },
    }
}

/// Parent id carried in the payload: `id` first, then the parent key itself.
fn parent_from_data(column: &ColumnSpec, data: &Map<String, Value>) -> Resolution {
    ["id", column.name.as_str()]
        .into_iter()
        .filter_map(|key| data.get(key))
        .find_map(|value| sanitize(ColumnKind::Int, value).filter(|p| !p.is_null()))
        .map(Resolution::Value)
        .unwrap_or(Resolution::Absent)
}

fn id_or_absent(id: Option<i64>, creating: bool) -> Resolution {
    match (id, creating) {
        (Some(id), _) => Resolution::Value(SqlParam::Int(id)),
        (None, true) => Resolution::Absent,
        (None, false) => Resolution::Skip,
    }
}

/// Value for a column that resolved to nothing: its default literal, a
/// typed null when nullable, otherwise a required-field failure.
fn fallback(
    descriptor: &ModelDescriptor,
    column: &ColumnSpec,
    ctx: &ResolveContext<'_>,
) -> Result<Option<SqlParam>, RecordError> {
    if let Some(literal) = column.default_literal.as_deref() {
        return default_param(column, literal, ctx.now).map(Some);
    }
    if column.nullable {
        return Ok(Some(SqlParam::Null(column.kind)));
    }
    tracing::info!(table = %descriptor.table_name(), column = %column.name, "MISSING_FIELD");
    Err(RecordError::MissingRequiredField {
        table: descriptor.table_name().to_string(),
        column: column.name.clone(),
    })
}

fn default_param(column: &ColumnSpec, literal: &str, now: NaiveDateTime) -> Result<SqlParam, RecordError> {
    let upper = literal.trim().to_ascii_uppercase();
    if upper == "NULL" {
        return Ok(SqlParam::Null(column.kind));
    }
    let is_now = matches!(upper.as_str(), "CURRENT_TIMESTAMP" | "NOW()" | "GETDATE()" | "CURRENT_DATE");
    if is_now && matches!(column.kind, ColumnKind::DateTime | ColumnKind::Date | ColumnKind::Time) {
        return Ok(now_param(column.kind, now));
    }
    SqlParam::parse_as(column.kind, literal).ok_or_else(|| RecordError::InvalidValue {
        column: column.name.clone(),
        value: literal.to_string(),
    })
}

fn now_param(kind: ColumnKind, now: NaiveDateTime) -> SqlParam {
    match kind {
        ColumnKind::Date => SqlParam::Date(now.date()),
        ColumnKind::Time => SqlParam::Time(now.time()),
        ColumnKind::Text => SqlParam::Text(now.format(DATETIME_FORMAT).to_string()),
        _ => SqlParam::Timestamp(now),
    }
}

/// Type-directed sanitization of one inbound value. `None` means the value
/// did not survive and counts as null.
pub fn sanitize(kind: ColumnKind, value: &Value) -> Option<SqlParam> {
    match (kind, value) {
        (_, Value::Null) => None,
        (ColumnKind::Int, Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map(SqlParam::Int),
        (ColumnKind::Int, Value::String(s)) => s.trim().parse::<i64>().ok().map(SqlParam::Int),
        (ColumnKind::Int, Value::Bool(b)) => Some(SqlParam::Int(*b as i64)),
        (ColumnKind::Decimal, Value::Number(n)) => BigDecimal::from_str(&n.to_string()).ok().map(SqlParam::Decimal),
        (ColumnKind::Decimal, Value::String(s)) => BigDecimal::from_str(s.trim()).ok().map(SqlParam::Decimal),
        (ColumnKind::DateTime, Value::String(s)) => strict::<NaiveDateTime>(s, DATETIME_FORMAT).map(SqlParam::Timestamp),
        (ColumnKind::Date, Value::String(s)) => strict::<NaiveDate>(s, DATE_FORMAT).map(SqlParam::Date),
        (ColumnKind::Time, Value::String(s)) => strict::<NaiveTime>(s, TIME_FORMAT).map(SqlParam::Time),
        (ColumnKind::Bool, Value::Bool(b)) => Some(SqlParam::Bool(*b)),
        (ColumnKind::Bool, Value::Number(n)) => n.as_i64().filter(|i| *i == 0 || *i == 1).map(|i| SqlParam::Bool(i == 1)),
        (ColumnKind::Bool, Value::String(_)) => value.as_str().and_then(|s| SqlParam::parse_as(ColumnKind::Bool, s)),
        (ColumnKind::Text, Value::String(s)) => Some(SqlParam::Text(clean_text(s))),
        (ColumnKind::Text, Value::Number(n)) => Some(SqlParam::Text(n.to_string())),
        (ColumnKind::Text, Value::Bool(b)) => Some(SqlParam::Text(if *b { "1" } else { "0" }.to_string())),
        (ColumnKind::Text, other @ (Value::Array(_) | Value::Object(_))) => Some(SqlParam::Text(other.to_string())),
        _ => None,
    }
}

fn clean_text(raw: &str) -> String {
    raw.trim().chars().filter(|c| *c != '\0').collect()
}

trait StrictParse: Sized {
    fn parse(raw: &str, format: &str) -> Option<Self>;
    fn render(&self, format: &str) -> String;
}

macro_rules! strict_parse {
    ($($ty:ty),*) => {
        $(impl StrictParse for $ty {
            fn parse(raw: &str, format: &str) -> Option<Self> {
                <$ty>::parse_from_str(raw, format).ok()
            }
            fn render(&self, format: &str) -> String {
                self.format(format).to_string()
            }
        })*
    };
}

strict_parse!(NaiveDateTime, NaiveDate, NaiveTime);

/// Parse, re-render and compare: only the exact canonical form passes.
fn strict<T: StrictParse>(raw: &str, format: &str) -> Option<T> {
    let raw = raw.trim();
    T::parse(raw, format).filter(|parsed| parsed.render(format) == raw)
}

/// Conversion for caller defaults: typed, but without sanitizing.
fn value_to_param(kind: ColumnKind, value: &Value) -> Option<SqlParam> {
    match value {
        Value::Null => Some(SqlParam::Null(kind)),
        Value::String(s) => SqlParam::parse_as(kind, s),
        Value::Number(n) => SqlParam::parse_as(kind, &n.to_string()),
        Value::Bool(b) => SqlParam::parse_as(kind, if *b { "1" } else { "0" }),
        other => SqlParam::parse_as(kind, &other.to_string()),
    }
}

/// Opaque 24-character token: SHA-256 over the current time and a random
/// UUID, hex encoded.
pub fn generate_token() -> String {
    let seed = format!("{}{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default(), Uuid::new_v4());
    let digest = format!("{:x}", Sha256::digest(seed.as_bytes()));
    digest[..24].to_string()
}

/// Evaluate the rules that need no database access. `exists` rules are
/// left to the caller.
pub fn check_local_rules(descriptor: &ModelDescriptor, fields: &ResolvedFields) -> Result<(), RecordError> {
    for rule in descriptor.validation_rules() {
        let passed = match rule {
            ValidationRule::Exists { .. } => true,
            ValidationRule::Compare { left, op, right } => match (fields.get(left), fields.get(right)) {
                (Some(l), Some(r)) if !l.is_null() && !r.is_null() => compare_holds(l, *op, r),
                _ => true,
            },
            ValidationRule::OneOf { column, values } => match fields.get(column) {
                Some(value) if !value.is_null() => values.iter().any(|v| *v == plain_text(value)),
                _ => true,
            },
        };
        if !passed {
            return Err(RecordError::ValidationFailed {
                table: descriptor.table_name().to_string(),
                rule: rule.describe(),
            });
        }
    }
    Ok(())
}

fn plain_text(param: &SqlParam) -> String {
    match param.to_json() {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn compare_holds(left: &SqlParam, op: CompareOp, right: &SqlParam) -> bool {
    let Some(ordering) = order_params(left, right) else {
        return false;
    };
    match op {
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Lte => ordering != Ordering::Greater,
        CompareOp::Gte => ordering != Ordering::Less,
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Like => true,
    }
}

fn order_params(left: &SqlParam, right: &SqlParam) -> Option<Ordering> {
    match (left, right) {
        (SqlParam::Int(a), SqlParam::Int(b)) => Some(a.cmp(b)),
        (SqlParam::Decimal(a), SqlParam::Decimal(b)) => Some(a.cmp(b)),
        (SqlParam::Float(a), SqlParam::Float(b)) => a.partial_cmp(b),
        (SqlParam::Timestamp(a), SqlParam::Timestamp(b)) => Some(a.cmp(b)),
        (SqlParam::Date(a), SqlParam::Date(b)) => Some(a.cmp(b)),
        (SqlParam::Timestamp(a), SqlParam::Date(b)) => Some(a.date().cmp(b)),
        (SqlParam::Date(a), SqlParam::Timestamp(b)) => Some(a.cmp(&b.date())),
        (SqlParam::Time(a), SqlParam::Time(b)) => Some(a.cmp(b)),
        (SqlParam::Text(a), SqlParam::Text(b)) => Some(a.cmp(b)),
        (SqlParam::Bool(a), SqlParam::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
