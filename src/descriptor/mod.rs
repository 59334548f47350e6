pub mod catalog;
pub mod column;
pub mod error;
pub mod expr;
pub mod model;
pub mod registry;

pub use column::{ColumnKind, ColumnRole, ColumnSpec};
pub use error::DescriptorError;
pub use expr::{SqlExpr, TableResolver};
pub use model::{AdditionalField, ForeignKey, ModelDescriptor, ModelDescriptorBuilder, NestedTable, ValidationRule};
pub use registry::{DescriptorRegistry, Resource};

/// Table and column names are interpolated into SQL, so only plain
/// identifiers are accepted.
pub fn validate_identifier(name: &str) -> Result<(), DescriptorError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => (first.is_ascii_alphabetic() || first == '_') && chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(DescriptorError::InvalidIdentifier(name.to_string()))
    }
}

/// Quote SQL identifier to prevent injection
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `"table"."column"`
pub fn qualified(table: &str, column: &str) -> String {
    format!("{}.{}", quote_identifier(table), quote_identifier(column))
}
