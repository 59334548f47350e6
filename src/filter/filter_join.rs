use std::sync::Arc;

use super::error::FilterError;
use crate::descriptor::{quote_identifier, ColumnRole, DescriptorRegistry, ModelDescriptor, SqlExpr, TableResolver};

/// Positional join alias (`t1`, `t2`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasRef(String);

impl AliasRef {
    fn numbered(position: usize) -> Self {
        Self(format!("t{}", position))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `t1."Column"`
    pub fn column(&self, column: &str) -> String {
        format!("{}.{}", self.0, quote_identifier(column))
    }
}

impl std::fmt::Display for AliasRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Table name to alias binding for one query. The primary table always
/// resolves to its real name; when two joins target the same table the
/// first alias wins.
#[derive(Debug, Clone)]
pub struct AliasMap {
    primary: String,
    aliases: Vec<(String, AliasRef)>,
}

impl AliasMap {
    pub fn new(primary: impl Into<String>) -> Self {
        Self { primary: primary.into(), aliases: vec![] }
    }

    fn bind(&mut self, table: &str, alias: AliasRef) {
        if table == self.primary || self.alias_for(table).is_some() {
            return;
        }
        self.aliases.push((table.to_string(), alias));
    }

    pub fn alias_for(&self, table: &str) -> Option<&AliasRef> {
        self.aliases.iter().find(|(t, _)| t == table).map(|(_, a)| a)
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

impl TableResolver for AliasMap {
    fn resolve_table(&self, table: &str) -> String {
        if table == self.primary {
            return quote_identifier(table);
        }
        match self.alias_for(table) {
            Some(alias) => alias.to_string(),
            None => quote_identifier(table),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JoinedTable {
    pub alias: AliasRef,
    pub fk_column: String,
    pub descriptor: Arc<ModelDescriptor>,
}

impl JoinedTable {
    pub fn clause(&self, primary_table: &str) -> String {
        format!(
            "LEFT JOIN {} AS {} ON {} = {}.{}",
            quote_identifier(self.descriptor.table_name()),
            self.alias,
            self.alias.column(self.descriptor.primary_key()),
            quote_identifier(primary_table),
            quote_identifier(&self.fk_column),
        )
    }

    /// Result column carrying the joined row's label: the foreign-key
    /// column with `ID` removed (`CustomerID` -> `Customer`).
    pub fn description_alias(&self) -> String {
        self.fk_column.replace("ID", "")
    }

    fn description_fragments(&self) -> Vec<String> {
        let alias = quote_identifier(&self.description_alias());
        let columns: Vec<String> = self
            .descriptor
            .description_columns()
            .iter()
            .map(|c| self.alias.column(c))
            .collect();

        match columns.as_slice() {
            [single] => vec![format!("{} AS {}", single, alias)],
            many => {
                let mut out = many.to_vec();
                out.push(format!("CONCAT({}) AS {}", many.join(", ' ', "), alias));
                out
            }
        }
    }
}

/// A computed field visible to the query: the primary descriptor's own
/// plus those merged in from joined descriptors.
#[derive(Debug, Clone)]
pub struct ComputedField {
    pub alias: String,
    pub expr: SqlExpr,
    pub joined: bool,
}

#[derive(Debug, Clone)]
pub struct JoinPlan {
    pub joins: Vec<JoinedTable>,
    pub aliases: AliasMap,
    /// Description and merged computed-field columns contributed by joins.
    pub select_fragments: Vec<String>,
    pub computed: Vec<ComputedField>,
}

impl JoinPlan {
    /// Plan for statements that never join, such as UPDATE and DELETE.
    pub fn unjoined(descriptor: &ModelDescriptor) -> Self {
        let computed = descriptor
            .additional_fields()
            .iter()
            .map(|f| ComputedField { alias: f.alias.clone(), expr: f.expr.clone(), joined: false })
            .collect();
        Self {
            joins: vec![],
            aliases: AliasMap::new(descriptor.table_name()),
            select_fragments: vec![],
            computed,
        }
    }

    /// `None` when there is nothing to join.
    pub fn join_clauses(&self) -> Option<Vec<String>> {
        if self.joins.is_empty() {
            return None;
        }
        Some(self.joins.iter().map(|j| j.clause(self.aliases.primary())).collect())
    }

    pub fn computed_field(&self, alias: &str) -> Option<&ComputedField> {
        self.computed.iter().find(|f| f.alias == alias)
    }

    pub fn render(&self, expr: &SqlExpr) -> String {
        expr.render(&self.aliases)
    }

    pub fn is_description_alias(&self, name: &str) -> bool {
        self.joins.iter().any(|j| j.description_alias() == name)
    }
}

pub struct JoinResolver;

impl JoinResolver {
    /// Join every declared foreign key except the tenant column and the
    /// resource's parent key, aliasing by position.
    pub fn resolve(
        registry: &DescriptorRegistry,
        descriptor: &ModelDescriptor,
        parent_key: Option<&str>,
    ) -> Result<JoinPlan, FilterError> {
        let mut aliases = AliasMap::new(descriptor.table_name());
        let mut joins = Vec::new();

        for fk in descriptor.foreign_keys() {
            let is_tenant = descriptor
                .column(&fk.column)
                .map(|c| c.role == ColumnRole::Tenant)
                .unwrap_or(false);
            if is_tenant || parent_key == Some(fk.column.as_str()) {
                continue;
            }

            let target = registry.descriptor(&fk.target)?;
            let alias = AliasRef::numbered(joins.len() + 1);
            aliases.bind(target.table_name(), alias.clone());
            joins.push(JoinedTable { alias, fk_column: fk.column.clone(), descriptor: target });
        }

        let mut known: Vec<String> = descriptor.columns().iter().map(|c| c.name.clone()).collect();
        let mut computed: Vec<ComputedField> = descriptor
            .additional_fields()
            .iter()
            .map(|f| ComputedField { alias: f.alias.clone(), expr: f.expr.clone(), joined: false })
            .collect();
        known.extend(computed.iter().map(|f| f.alias.clone()));

        let mut select_fragments = Vec::new();
        for join in &joins {
            select_fragments.extend(join.description_fragments());

            for field in join.descriptor.additional_fields() {
                if known.contains(&field.alias) {
                    continue;
                }
                known.push(field.alias.clone());
                if !field.expr.is_bare(&field.alias) {
                    select_fragments.push(format!(
                        "({}) AS {}",
                        field.expr.render(&aliases),
                        quote_identifier(&field.alias)
                    ));
                }
                computed.push(ComputedField { alias: field.alias.clone(), expr: field.expr.clone(), joined: true });
            }
        }

        Ok(JoinPlan { joins, aliases, select_fragments, computed })
    }
}
