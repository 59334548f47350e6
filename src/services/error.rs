use thiserror::Error;

use crate::database::{DatabaseError, RecordError};
use crate::descriptor::DescriptorError;
use crate::filter::FilterError;

/// Errors from the CRUD orchestrator
#[derive(Debug, Error)]
pub enum CrudError {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("{0} has no archive column")]
    SoftDeleteUnsupported(String),

    #[error("Insert into {0} returned no key")]
    NotCreated(String),

    #[error("Export failed: {0}")]
    Export(String),
}

impl CrudError {
    pub fn code(&self) -> &'static str {
        match self {
            CrudError::Filter(e) => e.code(),
            CrudError::Record(e) => e.code(),
            CrudError::Database(_) => "DATABASE_ERROR",
            CrudError::Descriptor(_) => "DESCRIPTOR_ERROR",
            CrudError::UnknownResource(_) => "UNKNOWN_RESOURCE",
            CrudError::SoftDeleteUnsupported(_) => "SOFT_DELETE_UNSUPPORTED",
            CrudError::NotCreated(_) => "NOT_CREATED",
            CrudError::Export(_) => "EXPORT_FAILED",
        }
    }

    /// Raised before any SQL ran.
    pub fn is_validation(&self) -> bool {
        matches!(self, CrudError::Filter(_) | CrudError::Record(_))
    }
}
