use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::column::{ColumnRole, ColumnSpec};
use super::error::DescriptorError;
use super::expr::SqlExpr;
use super::validate_identifier;
use crate::filter::types::CompareOp;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub column: String,
    pub target: String,
}

/// Child records attached to a single-record read. `column` holds the
/// value on the parent row and is matched against the same column on the
/// child table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedTable {
    pub target: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdditionalField {
    pub alias: String,
    pub expr: SqlExpr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ValidationRule {
    /// Referenced id must exist in the target descriptor's table.
    Exists { column: String, target: String },
    /// Cross-field ordering, skipped when either side is null.
    Compare { left: String, op: CompareOp, right: String },
    OneOf { column: String, values: Vec<String> },
}

impl ValidationRule {
    pub fn describe(&self) -> String {
        match self {
            ValidationRule::Exists { column, target } => format!("{} must reference an existing {}", column, target),
            ValidationRule::Compare { left, op, right } => format!("{} {} {}", left, op.as_sql(), right),
            ValidationRule::OneOf { column, values } => format!("{} must be one of [{}]", column, values.join(", ")),
        }
    }

    fn columns(&self) -> Vec<&str> {
        match self {
            ValidationRule::Exists { column, .. } | ValidationRule::OneOf { column, .. } => vec![column.as_str()],
            ValidationRule::Compare { left, right, .. } => vec![left.as_str(), right.as_str()],
        }
    }
}

/// Declarative description of one table. Immutable once built and shared
/// through the registry.
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    name: String,
    table_name: String,
    primary_key: String,
    columns: Vec<ColumnSpec>,
    foreign_keys: Vec<ForeignKey>,
    searchable_columns: Vec<String>,
    description_columns: Vec<String>,
    additional_fields: Vec<AdditionalField>,
    nested_tables: Vec<NestedTable>,
    validation_rules: Vec<ValidationRule>,
    non_searchable_keys: Vec<String>,
}

impl ModelDescriptor {
    pub fn builder(name: impl Into<String>, table_name: impl Into<String>, primary_key: impl Into<String>) -> ModelDescriptorBuilder {
        ModelDescriptorBuilder {
            name: name.into(),
            table_name: table_name.into(),
            primary_key: primary_key.into(),
            fields: vec![],
            foreign_keys: vec![],
            searchable: vec![],
            description: vec![],
            additional: vec![],
            nested: vec![],
            rules: vec![],
            non_searchable: vec![],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn primary_key_column(&self) -> &ColumnSpec {
        // Presence is checked by the builder
        self.column(&self.primary_key).unwrap_or(&self.columns[0])
    }

    pub fn column_with_role(&self, role: ColumnRole) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.role == role)
    }

    pub fn tenant_column(&self) -> Option<&ColumnSpec> {
        self.column_with_role(ColumnRole::Tenant)
    }

    pub fn archived_column(&self) -> Option<&ColumnSpec> {
        self.column_with_role(ColumnRole::Archived)
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    pub fn searchable_columns(&self) -> &[String] {
        &self.searchable_columns
    }

    /// Columns that render this record in a join. Never empty.
    pub fn description_columns(&self) -> &[String] {
        &self.description_columns
    }

    pub fn additional_fields(&self) -> &[AdditionalField] {
        &self.additional_fields
    }

    pub fn nested_tables(&self) -> &[NestedTable] {
        &self.nested_tables
    }

    pub fn validation_rules(&self) -> &[ValidationRule] {
        &self.validation_rules
    }

    pub fn is_searchable_key(&self, fk_column: &str) -> bool {
        !self.non_searchable_keys.iter().any(|k| k == fk_column)
    }

    pub fn non_searchable_keys(&self) -> &[String] {
        &self.non_searchable_keys
    }

    /// Key under which this table's rows are attached to a parent record.
    pub fn nested_key(&self) -> &str {
        self.table_name.strip_prefix("tbl_").unwrap_or(&self.table_name)
    }
}

pub struct ModelDescriptorBuilder {
    name: String,
    table_name: String,
    primary_key: String,
    fields: Vec<(String, String, Option<ColumnRole>)>,
    foreign_keys: Vec<ForeignKey>,
    searchable: Vec<String>,
    description: Vec<String>,
    additional: Vec<(String, String)>,
    nested: Vec<NestedTable>,
    rules: Vec<ValidationRule>,
    non_searchable: Vec<String>,
}

impl ModelDescriptorBuilder {
    pub fn field(mut self, name: impl Into<String>, type_spec: impl Into<String>) -> Self {
        self.fields.push((name.into(), type_spec.into(), None));
        self
    }

    pub fn field_with_role(mut self, name: impl Into<String>, type_spec: impl Into<String>, role: ColumnRole) -> Self {
        self.fields.push((name.into(), type_spec.into(), Some(role)));
        self
    }

    pub fn foreign_key(mut self, column: impl Into<String>, target: impl Into<String>) -> Self {
        self.foreign_keys.push(ForeignKey { column: column.into(), target: target.into() });
        self
    }

    pub fn searchable(mut self, columns: &[&str]) -> Self {
        self.searchable.extend(columns.iter().map(|c| c.to_string()));
        self
    }

    pub fn description(mut self, columns: &[&str]) -> Self {
        self.description.extend(columns.iter().map(|c| c.to_string()));
        self
    }

    pub fn additional(mut self, alias: impl Into<String>, template: impl Into<String>) -> Self {
        self.additional.push((alias.into(), template.into()));
        self
    }

    pub fn nested(mut self, target: impl Into<String>, column: impl Into<String>) -> Self {
        self.nested.push(NestedTable { target: target.into(), column: column.into() });
        self
    }

    pub fn rule(mut self, rule: ValidationRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn non_searchable(mut self, fk_column: impl Into<String>) -> Self {
        self.non_searchable.push(fk_column.into());
        self
    }

    pub fn build(self) -> Result<ModelDescriptor, DescriptorError> {
        validate_identifier(&self.table_name)?;

        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(self.fields.len());
        for (name, spec, role) in &self.fields {
            validate_identifier(name)?;
            if !seen.insert(name.as_str()) {
                return Err(DescriptorError::DuplicateField { table: self.table_name.clone(), column: name.clone() });
            }
            let role = role.unwrap_or_else(|| ColumnRole::infer(name, &self.primary_key));
            columns.push(ColumnSpec::parse(name, spec, role)?);
        }

        if !seen.contains(self.primary_key.as_str()) {
            return Err(DescriptorError::PrimaryKeyNotDeclared {
                table: self.table_name.clone(),
                primary_key: self.primary_key.clone(),
            });
        }

        let require = |column: &str, usage: &'static str| -> Result<(), DescriptorError> {
            if seen.contains(column) {
                Ok(())
            } else {
                Err(DescriptorError::UndeclaredColumn {
                    table: self.table_name.clone(),
                    column: column.to_string(),
                    usage,
                })
            }
        };

        for fk in &self.foreign_keys {
            require(&fk.column, "foreign key")?;
        }
        for column in &self.searchable {
            require(column, "searchable columns")?;
        }
        for column in &self.description {
            require(column, "description columns")?;
        }
        for nested in &self.nested {
            require(&nested.column, "nested table")?;
        }
        for column in &self.non_searchable {
            require(column, "non-searchable keys")?;
        }
        for rule in &self.rules {
            for column in rule.columns() {
                require(column, "validation rule")?;
            }
        }

        let description_columns = if self.description.is_empty() {
            let conventional = self.primary_key.replace("ID", "");
            if seen.contains(conventional.as_str()) {
                vec![conventional]
            } else {
                vec![self.primary_key.clone()]
            }
        } else {
            self.description
        };

        let mut additional_fields = Vec::with_capacity(self.additional.len());
        for (alias, template) in self.additional {
            validate_identifier(&alias)?;
            additional_fields.push(AdditionalField { alias, expr: SqlExpr::parse(&template)? });
        }

        Ok(ModelDescriptor {
            name: self.name,
            table_name: self.table_name,
            primary_key: self.primary_key,
            columns,
            foreign_keys: self.foreign_keys,
            searchable_columns: self.searchable,
            description_columns,
            additional_fields,
            nested_tables: self.nested,
            validation_rules: self.rules,
            non_searchable_keys: self.non_searchable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> ModelDescriptorBuilder {
        ModelDescriptor::builder("orders", "tbl_order", "OrderID")
            .field("OrderID", "int")
            .field("CompanyID", "int")
            .field("CustomerID", "int")
            .field("Total", "decimal(10,2)")
            .field("ArchivedDate", "datetime NULL")
    }

    #[test]
    fn builds_with_inferred_roles() {
        let d = order().foreign_key("CustomerID", "customers").build().unwrap();
        assert_eq!(d.primary_key_column().role, ColumnRole::PrimaryKey);
        assert_eq!(d.tenant_column().map(|c| c.name.as_str()), Some("CompanyID"));
        assert_eq!(d.archived_column().map(|c| c.name.as_str()), Some("ArchivedDate"));
        assert_eq!(d.nested_key(), "order");
    }

    #[test]
    fn rejects_undeclared_primary_key() {
        let err = ModelDescriptor::builder("orders", "tbl_order", "OrderID")
            .field("Total", "decimal")
            .build()
            .unwrap_err();
        assert!(matches!(err, DescriptorError::PrimaryKeyNotDeclared { .. }));
    }

    #[test]
    fn rejects_undeclared_foreign_key_column() {
        let err = order().foreign_key("SalesContactID", "contacts").build().unwrap_err();
        assert!(matches!(err, DescriptorError::UndeclaredColumn { usage: "foreign key", .. }));
    }

    #[test]
    fn description_defaults_to_conventional_name_column() {
        let customer = ModelDescriptor::builder("customers", "tbl_customer", "CustomerID")
            .field("CustomerID", "int")
            .field("Customer", "varchar(100)")
            .build()
            .unwrap();
        assert_eq!(customer.description_columns(), ["Customer".to_string()]);

        let bare = ModelDescriptor::builder("tags", "tbl_tag", "TagID").field("TagID", "int").build().unwrap();
        assert_eq!(bare.description_columns(), ["TagID".to_string()]);
    }

    #[test]
    fn explicit_role_overrides_convention() {
        let d = ModelDescriptor::builder("sites", "tbl_site", "SiteID")
            .field("SiteID", "int")
            .field_with_role("OwnerCompanyID", "int", ColumnRole::Tenant)
            .build()
            .unwrap();
        assert_eq!(d.tenant_column().map(|c| c.name.as_str()), Some("OwnerCompanyID"));
    }
}
