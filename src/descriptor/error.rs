use thiserror::Error;

#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("Invalid type spec for {column}: '{spec}'")]
    InvalidTypeSpec { column: String, spec: String },

    #[error("Primary key {primary_key} is not a field of {table}")]
    PrimaryKeyNotDeclared { table: String, primary_key: String },

    #[error("Column {column} referenced by {usage} is not a field of {table}")]
    UndeclaredColumn { table: String, column: String, usage: &'static str },

    #[error("Duplicate field {column} in {table}")]
    DuplicateField { table: String, column: String },

    #[error("Unknown descriptor: {0}")]
    UnknownDescriptor(String),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("Duplicate descriptor or resource name: {0}")]
    DuplicateName(String),

    #[error("Unterminated table placeholder in expression: {0}")]
    UnterminatedPlaceholder(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Catalog parse error: {0}")]
    Catalog(#[from] serde_yaml::Error),

    #[error("Cannot read catalog {path}: {source}")]
    CatalogFile { path: String, source: std::io::Error },
}
