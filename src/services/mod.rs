pub mod context;
pub mod error;
pub mod export;
pub mod resource_service;

pub use context::RequestContext;
pub use error::CrudError;
pub use export::{exporter_for, JsonLinesExporter, ResultExporter};
pub use resource_service::{pagination, plan_list, ListMode, ListResult, ResourceService};
