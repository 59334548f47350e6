pub mod gateway;
pub mod manager;
pub mod models;
pub mod query_builder;
pub mod record;
pub mod statement;

pub use gateway::{DatabaseGateway, PgGateway, Row};
pub use manager::{DatabaseError, DatabaseManager};
pub use query_builder::QueryBuilder;
pub use record::{resolve_fields, RecordError, ResolveContext, ResolvedFields};
pub use statement::{DeleteStatement, InsertStatement, UpdateStatement};
