use crate::database::gateway::{DatabaseGateway, Row};
use crate::database::manager::DatabaseError;
use crate::descriptor::{qualified, quote_identifier};
use crate::filter::types::{Pagination, SortDirection, SqlResult};

/// Immutable SELECT builder. Every setter consumes and returns the builder,
/// so a configured query cannot leak state into another.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    table_name: String,
    primary_key: String,
    select: Vec<String>,
    joins: Option<Vec<String>>,
    where_clause: Option<SqlResult>,
    group_by: Option<String>,
    order_by: Option<String>,
    order: SortDirection,
    limit: Option<i64>,
    start: Option<i64>,
}

impl QueryBuilder {
    pub fn new(table_name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            primary_key: primary_key.into(),
            select: vec![],
            joins: None,
            where_clause: None,
            group_by: None,
            order_by: None,
            order: SortDirection::Asc,
            limit: None,
            start: None,
        }
    }

    pub fn select(mut self, columns: Vec<String>) -> Self {
        self.select = columns;
        self
    }

    /// `None` (or an empty list) renders no join at all.
    pub fn join(mut self, clauses: Option<Vec<String>>) -> Self {
        self.joins = clauses.filter(|c| !c.is_empty());
        self
    }

    pub fn where_clause(mut self, clause: SqlResult) -> Self {
        self.where_clause = Some(clause).filter(|c| !c.query.is_empty());
        self
    }

    pub fn group_by(mut self, expr: impl Into<String>) -> Self {
        self.group_by = Some(expr.into());
        self
    }

    pub fn order_by(mut self, expr: impl Into<String>) -> Self {
        self.order_by = Some(expr.into());
        self
    }

    pub fn order(mut self, direction: SortDirection) -> Self {
        self.order = direction;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start(mut self, start: i64) -> Self {
        self.start = Some(start);
        self
    }

    pub fn paginate(self, pagination: Pagination) -> Self {
        match pagination {
            Pagination::Page { limit, offset } => self.limit(limit).start(offset),
            Pagination::Unbounded => Self { limit: None, start: None, ..self },
        }
    }

    pub fn is_paginated(&self) -> bool {
        self.limit.is_some()
    }

    pub fn to_sql(&self) -> SqlResult {
        let select = if self.select.is_empty() { "*".to_string() } else { self.select.join(", ") };
        let mut parts = vec![format!("SELECT {}", select), self.from_clause()];

        if let Some(group_by) = &self.group_by {
            parts.push(format!("GROUP BY {}", group_by));
        }
        match (&self.order_by, self.limit) {
            (Some(order_by), _) => parts.push(format!("ORDER BY {} {}", order_by, self.order.to_sql())),
            // offset/fetch requires an ORDER BY
            (None, Some(_)) => parts.push("ORDER BY (SELECT NULL)".to_string()),
            (None, None) => {}
        }
        if let Some(limit) = self.limit {
            parts.push(format!("OFFSET {} ROWS FETCH NEXT {} ROWS ONLY", self.start.unwrap_or(0), limit));
        }

        SqlResult { query: parts.join(" "), params: self.params() }
    }

    /// Same FROM/JOIN/WHERE counted on the primary key; order, grouping and
    /// paging are dropped.
    pub fn to_count_sql(&self) -> SqlResult {
        let query = format!(
            "SELECT COUNT({}) AS count {}",
            qualified(&self.table_name, &self.primary_key),
            self.from_clause()
        );
        SqlResult { query, params: self.params() }
    }

    /// Rendered SQL for diagnostics.
    pub fn sql(&self) -> String {
        self.to_sql().query
    }

    pub async fn get_all(&self, db: &dyn DatabaseGateway) -> Result<Vec<Row>, DatabaseError> {
        db.query(&self.to_sql()).await
    }

    pub async fn get_one(&self, db: &dyn DatabaseGateway) -> Result<Option<Row>, DatabaseError> {
        let single = if self.is_paginated() { self.clone() } else { self.clone().limit(1).start(0) };
        Ok(single.get_all(db).await?.into_iter().next())
    }

    pub async fn count(&self, db: &dyn DatabaseGateway) -> Result<i64, DatabaseError> {
        let rows = db.query(&self.to_count_sql()).await?;
        let count = rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        Ok(count)
    }

    fn from_clause(&self) -> String {
        let mut parts = vec![format!("FROM {}", quote_identifier(&self.table_name))];
        if let Some(joins) = &self.joins {
            parts.extend(joins.iter().cloned());
        }
        if let Some(where_clause) = &self.where_clause {
            parts.push(format!("WHERE {}", where_clause.query));
        }
        parts.join(" ")
    }

    fn params(&self) -> Vec<crate::filter::types::SqlParam> {
        self.where_clause.as_ref().map(|w| w.params.clone()).unwrap_or_default()
    }
}
