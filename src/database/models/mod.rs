//! Built-in descriptor catalog and catalog loading.

use crate::descriptor::{DescriptorError, DescriptorRegistry};

pub const SAMPLE_CATALOG: &str = include_str!("catalog.yaml");

pub fn sample_registry() -> Result<DescriptorRegistry, DescriptorError> {
    DescriptorRegistry::from_yaml_str(SAMPLE_CATALOG)
}

/// Load the catalog at `path`, or the built-in sample when none is given.
pub fn load_registry(path: Option<&str>) -> Result<DescriptorRegistry, DescriptorError> {
    match path {
        Some(path) => {
            let source = std::fs::read_to_string(path)
                .map_err(|source| DescriptorError::CatalogFile { path: path.to_string(), source })?;
            DescriptorRegistry::from_yaml_str(&source)
        }
        None => sample_registry(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_catalog_is_consistent() {
        let registry = sample_registry().unwrap();
        assert_eq!(
            registry.resource_names(),
            vec!["companies", "contacts", "customers", "notes", "order_items", "order_lines", "orders"]
        );
        assert_eq!(registry.resource("order_lines").unwrap().parent_key(), Some("OrderID"));
    }

    #[test]
    fn missing_catalog_file_is_reported() {
        assert!(matches!(
            load_registry(Some("/nonexistent/catalog.yaml")),
            Err(DescriptorError::CatalogFile { .. })
        ));
    }
}
