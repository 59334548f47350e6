//! Test doubles shared by unit tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::database::gateway::{DatabaseGateway, Row};
use crate::database::manager::DatabaseError;
use crate::descriptor::DescriptorRegistry;
use crate::filter::types::SqlResult;

pub fn sample_registry() -> DescriptorRegistry {
    crate::database::models::sample_registry().expect("sample catalog must load")
}

/// Recording gateway. Queries pop queued row sets (empty when none are
/// queued); executes pop queued affected counts (0 when none are queued).
#[derive(Default)]
pub struct MockGateway {
    rows: Mutex<VecDeque<Result<Vec<Row>, String>>>,
    affected: Mutex<VecDeque<Result<u64, String>>>,
    statements: Mutex<Vec<SqlResult>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one result set; each value must be a JSON object.
    pub fn push_rows(&self, rows: Vec<Value>) {
        let rows = rows
            .into_iter()
            .map(|v| v.as_object().cloned().expect("row must be an object"))
            .collect();
        self.rows.lock().unwrap().push_back(Ok(rows));
    }

    pub fn push_query_error(&self, message: &str) {
        self.rows.lock().unwrap().push_back(Err(message.to_string()));
    }

    pub fn push_affected(&self, count: u64) {
        self.affected.lock().unwrap().push_back(Ok(count));
    }

    pub fn push_execute_error(&self, message: &str) {
        self.affected.lock().unwrap().push_back(Err(message.to_string()));
    }

    pub fn statements(&self) -> Vec<SqlResult> {
        self.statements.lock().unwrap().clone()
    }

    pub fn last_statement(&self) -> SqlResult {
        self.statements.lock().unwrap().last().cloned().expect("no statement issued")
    }
}

#[async_trait]
impl DatabaseGateway for MockGateway {
    async fn query(&self, sql: &SqlResult) -> Result<Vec<Row>, DatabaseError> {
        self.statements.lock().unwrap().push(sql.clone());
        match self.rows.lock().unwrap().pop_front() {
            Some(Ok(rows)) => Ok(rows),
            Some(Err(message)) => Err(DatabaseError::QueryError(message)),
            None => Ok(vec![]),
        }
    }

    async fn execute(&self, sql: &SqlResult) -> Result<u64, DatabaseError> {
        self.statements.lock().unwrap().push(sql.clone());
        match self.affected.lock().unwrap().pop_front() {
            Some(Ok(count)) => Ok(count),
            Some(Err(message)) => Err(DatabaseError::QueryError(message)),
            None => Ok(0),
        }
    }
}
