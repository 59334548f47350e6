//! Serde shapes for YAML descriptor catalogs.

use serde::Deserialize;

use super::column::ColumnRole;
use super::error::DescriptorError;
use super::model::{ForeignKey, ModelDescriptor, NestedTable, ValidationRule};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogDef {
    #[serde(default)]
    pub descriptors: Vec<DescriptorDef>,
    #[serde(default)]
    pub resources: Vec<ResourceDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DescriptorDef {
    pub name: String,
    pub table: String,
    pub primary_key: String,
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub keys: Vec<ForeignKey>,
    #[serde(default)]
    pub searchable: Vec<String>,
    #[serde(default)]
    pub description: Vec<String>,
    #[serde(default)]
    pub additional: Vec<AdditionalDef>,
    #[serde(default)]
    pub tables: Vec<NestedTable>,
    #[serde(default)]
    pub non_searchable_keys: Vec<String>,
    #[serde(default)]
    pub validate: Vec<ValidationRule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub type_spec: String,
    #[serde(default)]
    pub role: Option<ColumnRole>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdditionalDef {
    pub alias: String,
    pub expr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDef {
    pub name: String,
    pub descriptor: String,
    #[serde(default)]
    pub parent_key: Option<String>,
}

impl DescriptorDef {
    pub fn into_descriptor(self) -> Result<ModelDescriptor, DescriptorError> {
        let mut builder = ModelDescriptor::builder(self.name, self.table, self.primary_key);

        for field in self.fields {
            builder = match field.role {
                Some(role) => builder.field_with_role(field.name, field.type_spec, role),
                None => builder.field(field.name, field.type_spec),
            };
        }
        for key in self.keys {
            builder = builder.foreign_key(key.column, key.target);
        }

        let searchable: Vec<&str> = self.searchable.iter().map(String::as_str).collect();
        let description: Vec<&str> = self.description.iter().map(String::as_str).collect();
        builder = builder.searchable(&searchable).description(&description);

        for field in self.additional {
            builder = builder.additional(field.alias, field.expr);
        }
        for nested in self.tables {
            builder = builder.nested(nested.target, nested.column);
        }
        for key in self.non_searchable_keys {
            builder = builder.non_searchable(key);
        }
        for rule in self.validate {
            builder = builder.rule(rule);
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorRegistry;

    const CATALOG: &str = r#"
descriptors:
  - name: customers
    table: tbl_customer
    primary_key: CustomerID
    fields:
      - { name: CustomerID, type: int }
      - { name: CompanyID, type: int }
      - { name: Name, type: varchar(100) }
    searchable: [Name]
    description: [Name]
  - name: orders
    table: tbl_order
    primary_key: OrderID
    fields:
      - { name: OrderID, type: int }
      - { name: CompanyID, type: int }
      - { name: CustomerID, type: int }
      - { name: StartDate, type: date NULL }
      - { name: EndDate, type: date NULL }
    keys:
      - { column: CustomerID, target: customers }
    additional:
      - alias: CustomerName
        expr: '{{tbl_customer}}."Name"'
    validate:
      - { rule: exists, column: CustomerID, target: customers }
      - { rule: compare, left: StartDate, op: "<=", right: EndDate }
resources:
  - { name: customer_orders, descriptor: orders, parent_key: CustomerID }
"#;

    #[test]
    fn loads_catalog_from_yaml() {
        let registry = DescriptorRegistry::from_yaml_str(CATALOG).unwrap();
        let orders = registry.descriptor("orders").unwrap();

        assert_eq!(orders.foreign_keys().len(), 1);
        assert_eq!(orders.validation_rules().len(), 2);
        assert_eq!(orders.additional_fields()[0].alias, "CustomerName");

        let scoped = registry.resource("customer_orders").unwrap();
        assert_eq!(scoped.parent_key(), Some("CustomerID"));
    }

    #[test]
    fn malformed_yaml_is_a_catalog_error() {
        let err = DescriptorRegistry::from_yaml_str("descriptors: [ {name: x").unwrap_err();
        assert!(matches!(err, DescriptorError::Catalog(_)));
    }
}
