use serde_json::Value;

use super::error::FilterError;
use super::filter_join::JoinPlan;
use super::types::{parse_loose_datetime, CompareOp, SearchField, SqlParam, SqlResult};
use crate::descriptor::{qualified, ColumnKind, ModelDescriptor};

#[derive(Debug, Clone, Default)]
pub struct FilterWhereOptions {
    /// Free-text search uses ILIKE instead of LIKE.
    pub case_insensitive: bool,
}

/// Everything that narrows a read, already lifted out of the request.
#[derive(Debug, Clone, Default)]
pub struct WhereCriteria {
    pub tenant_id: Option<i64>,
    pub include_archived: bool,
    pub query: Option<String>,
    pub search_fields: Vec<SearchField>,
    /// Exact-match conditions on own columns.
    pub conditions: Vec<(String, Value)>,
    pub exclude_ids: Vec<String>,
}

impl WhereCriteria {
    pub fn for_tenant(tenant_id: Option<i64>) -> Self {
        Self { tenant_id, ..Default::default() }
    }

    pub fn condition(mut self, column: impl Into<String>, value: Value) -> Self {
        self.conditions.push((column.into(), value));
        self
    }

    pub fn include_archived(mut self, include: bool) -> Self {
        self.include_archived = include;
        self
    }
}

enum Target {
    Column { sql: String, kind: ColumnKind },
    Computed { sql: String },
}

/// Builds a WHERE expression with `$n` placeholders and its bound values.
pub struct FilterWhere<'a> {
    descriptor: &'a ModelDescriptor,
    plan: &'a JoinPlan,
    options: &'a FilterWhereOptions,
    params: Vec<SqlParam>,
    conditions: Vec<String>,
}

impl<'a> FilterWhere<'a> {
    pub fn new(descriptor: &'a ModelDescriptor, plan: &'a JoinPlan, options: &'a FilterWhereOptions) -> Self {
        Self { descriptor, plan, options, params: vec![], conditions: vec![] }
    }

    pub fn generate(
        descriptor: &'a ModelDescriptor,
        plan: &'a JoinPlan,
        criteria: &WhereCriteria,
        options: &'a FilterWhereOptions,
    ) -> Result<SqlResult, FilterError> {
        let mut filter_where = Self::new(descriptor, plan, options);
        filter_where.tenant(criteria.tenant_id);
        if !criteria.include_archived {
            filter_where.not_archived();
        }
        if let Some(query) = criteria.query.as_deref() {
            filter_where.free_text(query);
        }
        for field in &criteria.search_fields {
            filter_where.search_field(field)?;
        }
        for (column, value) in &criteria.conditions {
            filter_where.equals(column, value)?;
        }
        filter_where.exclude_ids(&criteria.exclude_ids)?;
        Ok(filter_where.finish())
    }

    /// Tenant predicate, or the always-true root when there is none.
    pub fn tenant(&mut self, tenant_id: Option<i64>) {
        match (self.descriptor.tenant_column(), tenant_id) {
            (Some(column), Some(id)) => {
                let sql = self.own(&column.name);
                let p = self.param(SqlParam::Int(id));
                self.conditions.push(format!("{} = {}", sql, p));
            }
            _ => self.conditions.push("1=1".to_string()),
        }
    }

    pub fn not_archived(&mut self) {
        if let Some(column) = self.descriptor.archived_column() {
            let sql = self.own(&column.name);
            self.conditions.push(format!("{} IS NULL", sql));
        }
    }

    /// Every whitespace-separated term must match at least one searchable
    /// column of the primary table or of a searchable join.
    pub fn free_text(&mut self, query: &str) {
        let mut columns: Vec<(String, ColumnKind)> = self
            .descriptor
            .searchable_columns()
            .iter()
            .filter_map(|c| self.descriptor.column(c))
            .map(|c| (self.own(&c.name), c.kind))
            .collect();

        for join in &self.plan.joins {
            if !self.descriptor.is_searchable_key(&join.fk_column) {
                continue;
            }
            for name in join.descriptor.searchable_columns() {
                if let Some(column) = join.descriptor.column(name) {
                    columns.push((join.alias.column(name), column.kind));
                }
            }
        }

        if columns.is_empty() {
            return;
        }

        let op = if self.options.case_insensitive { "ILIKE" } else { "LIKE" };
        for chunk in query.split_whitespace() {
            let p = self.param(SqlParam::Text(format!("%{}%", chunk)));
            let group: Vec<String> = columns
                .iter()
                .map(|(sql, kind)| format!("{} {} {}", as_text(sql, *kind), op, p))
                .collect();
            self.conditions.push(format!("({})", group.join(" OR ")));
        }
    }

    pub fn search_field(&mut self, field: &SearchField) -> Result<(), FilterError> {
        match field {
            SearchField::Equals { column, value } => {
                let target = self.resolve_target(column)?;
                if column.ends_with("ID") && value.contains(',') {
                    self.in_list(column, target, value)
                } else {
                    self.exact(column, target, value)
                }
            }
            SearchField::Compare { column, op, value } => {
                let target = self.resolve_target(column)?;
                self.compare(column, target, *op, value)
            }
        }
    }

    /// Exact match on an own column; null matches NULL, arrays become IN.
    pub fn equals(&mut self, column: &str, value: &Value) -> Result<(), FilterError> {
        let spec = self
            .descriptor
            .column(column)
            .ok_or_else(|| FilterError::UnsupportedCompareField(column.to_string()))?;
        let (sql, kind) = (self.own(&spec.name), spec.kind);

        match value {
            Value::Null => self.conditions.push(format!("{} IS NULL", sql)),
            Value::Array(items) => {
                let mut placeholders = Vec::with_capacity(items.len());
                for item in items {
                    let param = typed(column, kind, &scalar(item))?;
                    placeholders.push(self.param(param));
                }
                if placeholders.is_empty() {
                    self.conditions.push("1=0".to_string());
                } else {
                    self.conditions.push(format!("{} IN ({})", sql, placeholders.join(", ")));
                }
            }
            other => {
                let param = typed(column, kind, &scalar(other))?;
                let p = self.param(param);
                self.conditions.push(format!("{} = {}", sql, p));
            }
        }
        Ok(())
    }

    pub fn exclude_ids(&mut self, ids: &[String]) -> Result<(), FilterError> {
        if ids.is_empty() {
            return Ok(());
        }
        let pk = self.descriptor.primary_key_column();
        let (sql, kind) = (self.own(&pk.name), pk.kind);

        let mut placeholders = Vec::with_capacity(ids.len());
        for id in ids {
            let param = SqlParam::parse_as(kind, id).ok_or_else(|| FilterError::InvalidIdList(ids.join(",")))?;
            placeholders.push(self.param(param));
        }
        self.conditions.push(format!("{} NOT IN ({})", sql, placeholders.join(", ")));
        Ok(())
    }

    pub fn finish(self) -> SqlResult {
        let query = if self.conditions.is_empty() { "1=1".to_string() } else { self.conditions.join(" AND ") };
        SqlResult { query, params: self.params }
    }

    fn resolve_target(&self, column: &str) -> Result<Target, FilterError> {
        if let Some(spec) = self.descriptor.column(column) {
            return Ok(Target::Column { sql: self.own(&spec.name), kind: spec.kind });
        }
        if let Some(field) = self.plan.computed_field(column) {
            return Ok(Target::Computed { sql: format!("({})", self.plan.render(&field.expr)) });
        }
        Err(FilterError::UnsupportedCompareField(column.to_string()))
    }

    fn in_list(&mut self, column: &str, target: Target, value: &str) -> Result<(), FilterError> {
        let pieces: Vec<&str> = value.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
        if pieces.is_empty() {
            return Ok(());
        }
        let (sql, kind) = match target {
            Target::Column { sql, kind } => (sql, kind),
            Target::Computed { sql } => (format!("CAST({} AS TEXT)", sql), ColumnKind::Text),
        };
        let mut placeholders = Vec::with_capacity(pieces.len());
        for piece in pieces {
            let param = typed(column, kind, piece)?;
            placeholders.push(self.param(param));
        }
        self.conditions.push(format!("{} IN ({})", sql, placeholders.join(", ")));
        Ok(())
    }

    /// Scalar match: the literal is bound at the column's type, dates included.
    fn exact(&mut self, column: &str, target: Target, value: &str) -> Result<(), FilterError> {
        match target {
            Target::Column { sql, kind } => {
                let p = self.param(typed(column, kind, value)?);
                self.conditions.push(format!("{} = {}", sql, p));
                Ok(())
            }
            computed => self.compare(column, computed, CompareOp::Eq, value),
        }
    }

    fn compare(&mut self, column: &str, target: Target, op: CompareOp, value: &str) -> Result<(), FilterError> {
        let condition = match target {
            Target::Column { sql, kind } if op == CompareOp::Like => {
                let p = self.param(SqlParam::Text(value.to_string()));
                format!("{} LIKE {}", as_text(&sql, kind), p)
            }
            Target::Column { sql, kind } if kind.is_date_like() => {
                // date-only semantics on both sides
                let date = parse_loose_datetime(value.trim())
                    .map(|dt| dt.date())
                    .ok_or_else(|| invalid(column, value))?;
                let p = self.param(SqlParam::Date(date));
                format!("CAST({} AS DATE) {} {}", sql, op.as_sql(), p)
            }
            Target::Column { sql, kind } => {
                let p = self.param(typed(column, kind, value)?);
                format!("{} {} {}", sql, op.as_sql(), p)
            }
            Target::Computed { sql } => match value.trim().parse::<f64>() {
                Ok(number) if op != CompareOp::Like => {
                    let p = self.param(SqlParam::Float(number));
                    format!("{} {} {}", sql, op.as_sql(), p)
                }
                _ => {
                    let p = self.param(SqlParam::Text(value.to_string()));
                    format!("CAST({} AS TEXT) {} {}", sql, op.as_sql(), p)
                }
            },
        };
        self.conditions.push(condition);
        Ok(())
    }

    fn own(&self, column: &str) -> String {
        qualified(self.descriptor.table_name(), column)
    }

    fn param(&mut self, value: SqlParam) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }
}

fn as_text(sql: &str, kind: ColumnKind) -> String {
    if kind.is_text() {
        sql.to_string()
    } else {
        format!("CAST({} AS TEXT)", sql)
    }
}

fn typed(column: &str, kind: ColumnKind, raw: &str) -> Result<SqlParam, FilterError> {
    SqlParam::parse_as(kind, raw).ok_or_else(|| invalid(column, raw))
}

fn invalid(column: &str, raw: &str) -> FilterError {
    FilterError::InvalidCompareValue { column: column.to_string(), value: raw.to_string() }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
