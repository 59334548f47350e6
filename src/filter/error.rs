use thiserror::Error;

use crate::descriptor::DescriptorError;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Unsupported compare field: {0}")]
    UnsupportedCompareField(String),

    #[error("Unsupported compare operation: {0}")]
    UnsupportedCompareOperation(String),

    #[error("Invalid value for {column}: '{value}'")]
    InvalidCompareValue { column: String, value: String },

    #[error("Unsupported sort field: {0}")]
    UnsupportedSortField(String),

    #[error("Invalid sort direction: {0}")]
    InvalidSortDirection(String),

    #[error("Invalid id list: {0}")]
    InvalidIdList(String),

    #[error("Invalid searchFields: {0}")]
    InvalidSearchFields(String),

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    #[error("Invalid offset: {0}")]
    InvalidOffset(String),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

impl FilterError {
    /// Stable code reported to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            FilterError::UnsupportedCompareField(_) => "UNSUPPORTED_COMPARE_FIELD",
            FilterError::UnsupportedCompareOperation(_) => "UNSUPPORTED_COMPARE_OPERATION",
            FilterError::InvalidCompareValue { .. } => "INVALID_COMPARE_VALUE",
            FilterError::UnsupportedSortField(_) => "UNSUPPORTED_SORT_FIELD",
            FilterError::InvalidSortDirection(_) => "INVALID_SORT_DIRECTION",
            FilterError::InvalidIdList(_) => "INVALID_ID_LIST",
            FilterError::InvalidSearchFields(_) => "INVALID_SEARCH_FIELDS",
            FilterError::InvalidLimit(_) => "INVALID_LIMIT",
            FilterError::InvalidOffset(_) => "INVALID_OFFSET",
            FilterError::Descriptor(_) => "UNKNOWN_RESOURCE",
        }
    }
}
