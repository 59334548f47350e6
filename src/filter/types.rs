use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::types::BigDecimal;
use std::str::FromStr;

use super::error::FilterError;
use crate::descriptor::ColumnKind;
use crate::types::{is_truthy, RequestInput};

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// A bound statement parameter. Nulls carry the column kind so the
/// database sees a correctly typed NULL.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null(ColumnKind),
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(BigDecimal),
    Text(String),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl SqlParam {
    /// Convert a filter literal to the column's type. Temporal kinds accept
    /// a date or a full timestamp.
    pub fn parse_as(kind: ColumnKind, raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        match kind {
            ColumnKind::Int => trimmed.parse::<i64>().ok().map(SqlParam::Int),
            ColumnKind::Decimal => BigDecimal::from_str(trimmed).ok().map(SqlParam::Decimal),
            ColumnKind::DateTime => parse_loose_datetime(trimmed).map(SqlParam::Timestamp),
            ColumnKind::Date => parse_loose_datetime(trimmed).map(|dt| SqlParam::Date(dt.date())),
            ColumnKind::Time => NaiveTime::parse_from_str(trimmed, TIME_FORMAT).ok().map(SqlParam::Time),
            ColumnKind::Bool => parse_bool(trimmed).map(SqlParam::Bool),
            ColumnKind::Text => Some(SqlParam::Text(raw.to_string())),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlParam::Null(_))
    }

    pub fn to_json(&self) -> Value {
        match self {
            SqlParam::Null(_) => Value::Null,
            SqlParam::Bool(b) => Value::Bool(*b),
            SqlParam::Int(i) => Value::from(*i),
            SqlParam::Float(f) => serde_json::Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            SqlParam::Decimal(d) => Value::String(d.to_string()),
            SqlParam::Text(s) => Value::String(s.clone()),
            SqlParam::Timestamp(ts) => Value::String(ts.format(DATETIME_FORMAT).to_string()),
            SqlParam::Date(d) => Value::String(d.format(DATE_FORMAT).to_string()),
            SqlParam::Time(t) => Value::String(t.format(TIME_FORMAT).to_string()),
        }
    }
}

impl std::fmt::Display for SqlParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlParam::Null(_) => write!(f, "NULL"),
            SqlParam::Text(s) => write!(f, "'{}'", s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

/// `YYYY-MM-DD HH:MM:SS`, ISO `T` separator, or a bare date at midnight.
pub fn parse_loose_datetime(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| NaiveDate::parse_from_str(raw, DATE_FORMAT).ok().and_then(|d| d.and_hms_opt(0, 0, 0)))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<SqlParam>,
}

impl SqlResult {
    pub fn new(query: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self { query: query.into(), params }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, FilterError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(FilterError::InvalidSortDirection(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "<")] Lt,
    #[serde(rename = ">")] Gt,
    #[serde(rename = "<=")] Lte,
    #[serde(rename = ">=")] Gte,
    #[serde(rename = "=")] Eq,
    #[serde(rename = "<>")] Ne,
    #[serde(rename = "LIKE")] Like,
}

impl CompareOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Lte => "<=",
            CompareOp::Gte => ">=",
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Like => "LIKE",
        }
    }
}

impl FromStr for CompareOp {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "<" => CompareOp::Lt,
            ">" => CompareOp::Gt,
            "<=" => CompareOp::Lte,
            ">=" => CompareOp::Gte,
            "=" => CompareOp::Eq,
            "<>" => CompareOp::Ne,
            op if op.eq_ignore_ascii_case("LIKE") => CompareOp::Like,
            other => return Err(FilterError::UnsupportedCompareOperation(other.to_string())),
        })
    }
}

/// One entry of `searchFields`.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchField {
    Equals { column: String, value: String },
    Compare { column: String, op: CompareOp, value: String },
}

impl SearchField {
    pub fn column(&self) -> &str {
        match self {
            SearchField::Equals { column, .. } | SearchField::Compare { column, .. } => column.as_str(),
        }
    }

    /// Parse a decoded `searchFields` map. Null, empty and `false` entries
    /// are skipped; a three-element array is `[column, operator, literal]`.
    pub fn parse_map(map: &Map<String, Value>) -> Result<Vec<Self>, FilterError> {
        let mut fields = Vec::new();
        for (key, value) in map {
            match value {
                Value::Null | Value::Bool(false) => continue,
                Value::String(s) if s.is_empty() => continue,
                Value::Array(parts) => {
                    let [column, op, literal] = parts.as_slice() else {
                        return Err(FilterError::InvalidSearchFields(format!(
                            "{} must be [column, operator, value]",
                            key
                        )));
                    };
                    let column = column
                        .as_str()
                        .ok_or_else(|| FilterError::InvalidSearchFields(format!("{} column must be a string", key)))?;
                    let op = op
                        .as_str()
                        .ok_or_else(|| FilterError::UnsupportedCompareOperation(op.to_string()))?
                        .parse::<CompareOp>()?;
                    let Some(literal) = scalar_to_string(literal) else {
                        continue;
                    };
                    fields.push(SearchField::Compare { column: column.to_string(), op, value: literal });
                }
                other => {
                    let Some(literal) = scalar_to_string(other) else {
                        return Err(FilterError::InvalidSearchFields(format!("{} has an unsupported value", key)));
                    };
                    fields.push(SearchField::Equals { column: key.clone(), value: literal });
                }
            }
        }
        Ok(fields)
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("1".to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    Page { limit: i64, offset: i64 },
    Unbounded,
}

/// Typed view of the list parameters of a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListInput {
    pub query: Option<String>,
    pub sort_by: Option<String>,
    pub sort: Option<SortDirection>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub archived: bool,
    pub search_fields: Vec<SearchField>,
    pub exclude_ids: Vec<String>,
    pub parent_id: Option<i64>,
    pub format: Option<String>,
}

impl ListInput {
    pub fn from_input(input: &RequestInput) -> Result<Self, FilterError> {
        let limit = match input.get_str("limit") {
            Some(raw) => Some(parse_non_negative(&raw).ok_or(FilterError::InvalidLimit(raw))?),
            None => None,
        };
        let offset = match input.get_str("offset") {
            Some(raw) => Some(parse_non_negative(&raw).ok_or(FilterError::InvalidOffset(raw))?),
            None => None,
        };
        let sort = input.get_str("sort").map(|s| SortDirection::parse(&s)).transpose()?;

        let search_fields = match input.get("searchFields") {
            None => vec![],
            Some(Value::String(s)) if s.trim().is_empty() => vec![],
            Some(Value::String(s)) => {
                let decoded: Value = serde_json::from_str(s).map_err(|e| FilterError::InvalidSearchFields(e.to_string()))?;
                match decoded {
                    Value::Object(map) => SearchField::parse_map(&map)?,
                    Value::Array(a) if a.is_empty() => vec![],
                    _ => return Err(FilterError::InvalidSearchFields("expected a JSON object".to_string())),
                }
            }
            Some(Value::Object(map)) => SearchField::parse_map(map)?,
            Some(_) => return Err(FilterError::InvalidSearchFields("expected a JSON object".to_string())),
        };

        let exclude_ids = match input.get("ExcludeIDs") {
            Some(Value::Array(items)) => items.iter().filter_map(scalar_to_string).collect(),
            Some(_) => input
                .get_str("ExcludeIDs")
                .map(|s| s.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect())
                .unwrap_or_default(),
            None => vec![],
        };

        Ok(Self {
            query: input.get_str("query"),
            sort_by: input.get_str("sortBy"),
            sort,
            limit,
            offset,
            archived: input.get("archived").map(is_truthy).unwrap_or(false),
            search_fields,
            exclude_ids,
            parent_id: input.get_i64("id"),
            format: input.get_str("format"),
        })
    }
}

fn parse_non_negative(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|n| *n >= 0)
}
