//! INSERT / UPDATE / DELETE assembly. Values are always bound; only
//! descriptor-declared identifiers reach the SQL text.

use crate::descriptor::quote_identifier;
use crate::filter::types::{SqlParam, SqlResult};

/// Multi-row insert returning the primary key. The column list is the
/// union of all rows in first-seen order; cells a row lacks render as
/// `DEFAULT`.
#[derive(Debug, Clone)]
pub struct InsertStatement {
    table_name: String,
    primary_key: String,
    rows: Vec<Vec<(String, SqlParam)>>,
}

impl InsertStatement {
    pub fn new(table_name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self { table_name: table_name.into(), primary_key: primary_key.into(), rows: vec![] }
    }

    pub fn row(mut self, values: Vec<(String, SqlParam)>) -> Self {
        self.rows.push(values);
        self
    }

    pub fn to_sql(&self) -> SqlResult {
        let mut columns: Vec<&str> = Vec::new();
        for (column, _) in self.rows.iter().flatten() {
            if !columns.contains(&column.as_str()) {
                columns.push(column);
            }
        }
        // a row needs at least one column to spell DEFAULT
        if columns.is_empty() {
            columns.push(&self.primary_key);
        }

        let mut params = Vec::new();
        let mut tuples = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let cells: Vec<String> = columns
                .iter()
                .map(|column| match row.iter().find(|(c, _)| c.as_str() == *column) {
                    Some((_, value)) => {
                        params.push(value.clone());
                        format!("${}", params.len())
                    }
                    None => "DEFAULT".to_string(),
                })
                .collect();
            tuples.push(format!("({})", cells.join(", ")));
        }

        let column_list: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
        let query = format!(
            "INSERT INTO {} ({}) VALUES {} RETURNING {}",
            quote_identifier(&self.table_name),
            column_list.join(", "),
            tuples.join(", "),
            quote_identifier(&self.primary_key)
        );
        SqlResult { query, params }
    }
}

/// `UPDATE ... SET ... WHERE ...`. The WHERE clause keeps its own `$n`
/// numbering; SET values are numbered after it.
#[derive(Debug, Clone)]
pub struct UpdateStatement {
    table_name: String,
    set: Vec<(String, SqlParam)>,
    where_clause: SqlResult,
}

impl UpdateStatement {
    pub fn new(table_name: impl Into<String>, where_clause: SqlResult) -> Self {
        Self { table_name: table_name.into(), set: vec![], where_clause }
    }

    pub fn set(mut self, column: impl Into<String>, value: SqlParam) -> Self {
        let column = column.into();
        match self.set.iter_mut().find(|(c, _)| *c == column) {
            Some(existing) => existing.1 = value,
            None => self.set.push((column, value)),
        }
        self
    }

    pub fn set_all(self, values: impl IntoIterator<Item = (String, SqlParam)>) -> Self {
        values.into_iter().fold(self, |stmt, (column, value)| stmt.set(column, value))
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn to_sql(&self) -> SqlResult {
        let mut params = self.where_clause.params.clone();
        let assignments: Vec<String> = self
            .set
            .iter()
            .map(|(column, value)| {
                params.push(value.clone());
                format!("{} = ${}", quote_identifier(column), params.len())
            })
            .collect();

        let query = format!(
            "UPDATE {} SET {} WHERE {}",
            quote_identifier(&self.table_name),
            assignments.join(", "),
            self.where_clause.query
        );
        SqlResult { query, params }
    }
}

#[derive(Debug, Clone)]
pub struct DeleteStatement {
    table_name: String,
    where_clause: SqlResult,
}

impl DeleteStatement {
    pub fn new(table_name: impl Into<String>, where_clause: SqlResult) -> Self {
        Self { table_name: table_name.into(), where_clause }
    }

    pub fn to_sql(&self) -> SqlResult {
        SqlResult {
            query: format!("DELETE FROM {} WHERE {}", quote_identifier(&self.table_name), self.where_clause.query),
            params: self.where_clause.params.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ColumnKind;

    fn text(s: &str) -> SqlParam {
        SqlParam::Text(s.to_string())
    }

    #[test]
    fn insert_single_row() {
        let sql = InsertStatement::new("tbl_customer", "CustomerID")
            .row(vec![("CompanyID".into(), SqlParam::Int(1)), ("Name".into(), text("Acme"))])
            .to_sql();
        assert_eq!(
            sql.query,
            "INSERT INTO \"tbl_customer\" (\"CompanyID\", \"Name\") VALUES ($1, $2) RETURNING \"CustomerID\""
        );
        assert_eq!(sql.params, vec![SqlParam::Int(1), text("Acme")]);
    }

    #[test]
    fn bulk_insert_fills_missing_cells_with_default() {
        let sql = InsertStatement::new("tbl_customer", "CustomerID")
            .row(vec![("Name".into(), text("A"))])
            .row(vec![("Name".into(), text("B")), ("Code".into(), text("b"))])
            .to_sql();
        assert_eq!(
            sql.query,
            "INSERT INTO \"tbl_customer\" (\"Name\", \"Code\") VALUES ($1, DEFAULT), ($2, $3) RETURNING \"CustomerID\""
        );
        assert_eq!(sql.params.len(), 3);
    }

    #[test]
    fn insert_without_values_uses_defaults() {
        let sql = InsertStatement::new("tbl_company", "CompanyID").row(vec![]).to_sql();
        assert_eq!(sql.query, "INSERT INTO \"tbl_company\" (\"CompanyID\") VALUES (DEFAULT) RETURNING \"CompanyID\"");
    }

    #[test]
    fn update_numbers_set_values_after_where() {
        let where_clause = SqlResult::new(
            "\"tbl_order\".\"CompanyID\" = $1 AND \"tbl_order\".\"OrderID\" = $2",
            vec![SqlParam::Int(1), SqlParam::Int(9)],
        );
        let sql = UpdateStatement::new("tbl_order", where_clause)
            .set("Code", text("X"))
            .set("ArchivedDate", SqlParam::Null(ColumnKind::DateTime))
            .set("Code", text("Y"))
            .to_sql();
        assert_eq!(
            sql.query,
            "UPDATE \"tbl_order\" SET \"Code\" = $3, \"ArchivedDate\" = $4 WHERE \"tbl_order\".\"CompanyID\" = $1 AND \"tbl_order\".\"OrderID\" = $2"
        );
        assert_eq!(sql.params[2], text("Y"));
        assert!(sql.params[3].is_null());
    }

    #[test]
    fn delete_keeps_where_params() {
        let sql = DeleteStatement::new("tbl_order", SqlResult::new("\"tbl_order\".\"OrderID\" = $1", vec![SqlParam::Int(2)]))
            .to_sql();
        assert_eq!(sql.query, "DELETE FROM \"tbl_order\" WHERE \"tbl_order\".\"OrderID\" = $1");
        assert_eq!(sql.params, vec![SqlParam::Int(2)]);
    }
}
