#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use kcore_api_rust::config::{DatabaseConfig, FilterConfig};
use kcore_api_rust::database::models::sample_registry;
use kcore_api_rust::database::{DatabaseManager, PgGateway};
use kcore_api_rust::services::{RequestContext, ResourceService};
use kcore_api_rust::types::RequestInput;

// Tables for the built-in sample catalog. Mixed-case names are quoted the
// same way the generated SQL quotes them.
const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS "tbl_company" (
        "CompanyID" SERIAL PRIMARY KEY,
        "Name" VARCHAR(100) NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "tbl_contact" (
        "ContactID" SERIAL PRIMARY KEY,
        "CompanyID" INT NOT NULL,
        "FirstName" VARCHAR(50) NOT NULL,
        "LastName" VARCHAR(50) NOT NULL,
        "Email" VARCHAR(100) NULL,
        "CreateUpdateDate" TIMESTAMP NOT NULL,
        "ArchivedDate" TIMESTAMP NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "tbl_customer" (
        "CustomerID" SERIAL PRIMARY KEY,
        "CompanyID" INT NOT NULL,
        "Name" VARCHAR(100) NOT NULL,
        "Code" VARCHAR(20) NULL,
        "Latitude" NUMERIC(9,6) NULL,
        "Longitude" NUMERIC(9,6) NULL,
        "UpdatedByContactID" INT NULL,
        "CreateUpdateDate" TIMESTAMP NOT NULL,
        "ArchivedDate" TIMESTAMP NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "tbl_order" (
        "OrderID" SERIAL PRIMARY KEY,
        "CompanyID" INT NOT NULL,
        "CustomerID" INT NOT NULL,
        "SalesContactID" INT NULL,
        "Code" VARCHAR(20) NULL,
        "Total" NUMERIC(10,2) NOT NULL,
        "OrderDate" TIMESTAMP NULL,
        "DueDate" TIMESTAMP NULL,
        "Status" VARCHAR(20) NOT NULL DEFAULT 'open',
        "AutoToken" VARCHAR(24) NOT NULL,
        "UpdatedByContactID" INT NULL,
        "CreateUpdateDate" TIMESTAMP NOT NULL,
        "ArchivedDate" TIMESTAMP NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "tbl_order_item" (
        "OrderItemID" SERIAL PRIMARY KEY,
        "OrderID" INT NOT NULL,
        "CompanyID" INT NOT NULL,
        "Sku" VARCHAR(40) NOT NULL,
        "Quantity" INT NOT NULL DEFAULT 1,
        "Price" NUMERIC(10,2) NOT NULL,
        "ArchivedDate" TIMESTAMP NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "tbl_note" (
        "NoteID" SERIAL PRIMARY KEY,
        "CompanyID" INT NOT NULL,
        "CustomerID" INT NULL,
        "OrderID" INT NULL,
        "Body" VARCHAR(500) NOT NULL,
        "CreateUpdateDate" TIMESTAMP NOT NULL DEFAULT NOW()
    )"#,
];

/// Orchestrator over a real Postgres, or `None` when `DATABASE_URL` is unset.
pub async fn service() -> Result<Option<ResourceService>> {
    let _ = dotenvy::dotenv();
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL not set; skipping database test");
        return Ok(None);
    }

    let config = DatabaseConfig {
        max_connections: 4,
        connection_timeout: 10,
        enable_query_logging: true,
        enable_slow_query_warning: false,
        slow_query_threshold_ms: 1000,
    };
    let pool = DatabaseManager::connect(&config).await?;
    DatabaseManager::health_check(&pool).await?;

    // serialize DDL across concurrently running test binaries
    let mut tx = pool.begin().await?;
    sqlx::query("SELECT pg_advisory_xact_lock(7150418)").execute(&mut *tx).await?;
    for ddl in SCHEMA {
        sqlx::query(ddl).execute(&mut *tx).await.context("creating test tables")?;
    }
    tx.commit().await?;

    let filter = FilterConfig { case_insensitive_search: true, ..FilterConfig::default() };
    let registry = Arc::new(sample_registry()?);
    Ok(Some(ResourceService::new(registry, Arc::new(PgGateway::new(pool, config)), filter)))
}

/// A tenant id no other test run uses.
pub fn fresh_tenant() -> i64 {
    (uuid::Uuid::new_v4().as_u128() % 1_000_000_000) as i64 + 1_000_000
}

pub fn ctx(tenant: i64, query: Value) -> RequestContext {
    let query = query.as_object().cloned().unwrap_or_default();
    RequestContext::new(Some(tenant), Some(7)).with_input(RequestInput::from_query(query))
}

pub fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

pub fn id_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
