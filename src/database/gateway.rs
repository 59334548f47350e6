use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::types::BigDecimal;
use sqlx::{Column, PgPool, Postgres, Row as _, TypeInfo};
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::DatabaseConfig;
use crate::database::manager::DatabaseError;
use crate::descriptor::ColumnKind;
use crate::filter::types::{SqlParam, SqlResult, DATETIME_FORMAT, DATE_FORMAT, TIME_FORMAT};

/// One result row keyed by column name, in select order.
pub type Row = Map<String, Value>;

/// The narrow database surface the engine needs: run a statement that
/// returns rows, or one that returns an affected count. Connection handling
/// stays behind this trait.
#[async_trait]
pub trait DatabaseGateway: Send + Sync {
    async fn query(&self, sql: &SqlResult) -> Result<Vec<Row>, DatabaseError>;

    async fn execute(&self, sql: &SqlResult) -> Result<u64, DatabaseError>;

    async fn ping(&self) -> Result<(), DatabaseError> {
        self.query(&SqlResult::new("SELECT 1 AS ok", vec![])).await.map(|_| ())
    }
}

pub struct PgGateway {
    pool: PgPool,
    config: DatabaseConfig,
}

impl PgGateway {
    pub fn new(pool: PgPool, config: DatabaseConfig) -> Self {
        Self { pool, config }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn prepare<'q>(sql: &'q SqlResult) -> sqlx::query::Query<'q, Postgres, PgArguments> {
        sql.params.iter().fold(sqlx::query(&sql.query), |q, p| bind_param(q, p))
    }

    fn log_statement(&self, sql: &SqlResult) {
        if self.config.enable_query_logging {
            debug!(sql = %sql.query, params = sql.params.len(), "SQL");
        }
    }

    fn check_slow(&self, sql: &SqlResult, started: Instant) {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if self.config.enable_slow_query_warning && elapsed_ms > self.config.slow_query_threshold_ms {
            warn!(sql = %sql.query, elapsed_ms, "Slow query");
        }
    }
}

#[async_trait]
impl DatabaseGateway for PgGateway {
    async fn query(&self, sql: &SqlResult) -> Result<Vec<Row>, DatabaseError> {
        self.log_statement(sql);
        let started = Instant::now();
        let rows = Self::prepare(sql).fetch_all(&self.pool).await?;
        self.check_slow(sql, started);
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn execute(&self, sql: &SqlResult) -> Result<u64, DatabaseError> {
        self.log_statement(sql);
        let started = Instant::now();
        let result = Self::prepare(sql).execute(&self.pool).await?;
        self.check_slow(sql, started);
        Ok(result.rows_affected())
    }
}

fn bind_param<'q>(
    q: sqlx::query::Query<'q, Postgres, PgArguments>,
    param: &SqlParam,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match param {
        SqlParam::Null(kind) => match kind {
            ColumnKind::Int => q.bind(None::<i64>),
            ColumnKind::Decimal => q.bind(None::<BigDecimal>),
            ColumnKind::DateTime => q.bind(None::<NaiveDateTime>),
            ColumnKind::Date => q.bind(None::<NaiveDate>),
            ColumnKind::Time => q.bind(None::<NaiveTime>),
            ColumnKind::Bool => q.bind(None::<bool>),
            ColumnKind::Text => q.bind(None::<String>),
        },
        SqlParam::Bool(b) => q.bind(*b),
        SqlParam::Int(i) => q.bind(*i),
        SqlParam::Float(f) => q.bind(*f),
        SqlParam::Decimal(d) => q.bind(d.clone()),
        SqlParam::Text(s) => q.bind(s.clone()),
        SqlParam::Timestamp(ts) => q.bind(*ts),
        SqlParam::Date(d) => q.bind(*d),
        SqlParam::Time(t) => q.bind(*t),
    }
}

/// Convert a row by column type. When the select list yields the same name
/// twice the first occurrence is kept, so own columns win over joined ones.
fn row_to_json(row: &PgRow) -> Row {
    let mut map = Map::new();
    for (i, column) in row.columns().iter().enumerate() {
        if map.contains_key(column.name()) {
            continue;
        }
        let value = column_value(row, i, column.type_info().name());
        map.insert(column.name().to_string(), value);
    }
    map
}

fn column_value(row: &PgRow, i: usize, type_name: &str) -> Value {
    fn get<'r, T>(row: &'r PgRow, i: usize) -> Option<T>
    where
        T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
    {
        row.try_get::<Option<T>, _>(i).ok().flatten()
    }

    let value = match type_name {
        "INT2" => get::<i16>(row, i).map(Value::from),
        "INT4" => get::<i32>(row, i).map(Value::from),
        "INT8" => get::<i64>(row, i).map(Value::from),
        "FLOAT4" => get::<f32>(row, i).and_then(|f| serde_json::Number::from_f64(f as f64)).map(Value::Number),
        "FLOAT8" => get::<f64>(row, i).and_then(serde_json::Number::from_f64).map(Value::Number),
        "NUMERIC" => get::<BigDecimal>(row, i).map(decimal_to_json),
        "BOOL" => get::<bool>(row, i).map(Value::Bool),
        "TIMESTAMP" => get::<NaiveDateTime>(row, i).map(|ts| Value::String(ts.format(DATETIME_FORMAT).to_string())),
        "TIMESTAMPTZ" => get::<DateTime<Utc>>(row, i).map(|ts| Value::String(ts.format(DATETIME_FORMAT).to_string())),
        "DATE" => get::<NaiveDate>(row, i).map(|d| Value::String(d.format(DATE_FORMAT).to_string())),
        "TIME" => get::<NaiveTime>(row, i).map(|t| Value::String(t.format(TIME_FORMAT).to_string())),
        "JSON" | "JSONB" => get::<Value>(row, i),
        "UUID" => get::<uuid::Uuid>(row, i).map(|u| Value::String(u.to_string())),
        _ => get::<String>(row, i).map(Value::String),
    };
    value.unwrap_or(Value::Null)
}

fn decimal_to_json(d: BigDecimal) -> Value {
    let text = d.to_string();
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::String(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn decimals_become_json_numbers() {
        let d = BigDecimal::from_str("12.50").unwrap();
        assert_eq!(decimal_to_json(d), json!(12.5));
    }
}
