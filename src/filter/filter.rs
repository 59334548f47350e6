use super::error::FilterError;
use super::filter_join::{JoinPlan, JoinResolver};
use super::filter_order::FilterOrder;
use super::filter_where::{FilterWhere, FilterWhereOptions, WhereCriteria};
use super::types::{Pagination, SortDirection};
use crate::database::query_builder::QueryBuilder;
use crate::descriptor::{quote_identifier, DescriptorRegistry, Resource};

/// Per-request query context: joins, select list, WHERE, sort and page for
/// one read against a resource. Consumed by `build`.
pub struct Filter<'a> {
    registry: &'a DescriptorRegistry,
    resource: &'a Resource,
    criteria: WhereCriteria,
    sort_by: Option<String>,
    sort: Option<SortDirection>,
    pagination: Pagination,
    options: FilterWhereOptions,
}

impl<'a> Filter<'a> {
    pub fn new(registry: &'a DescriptorRegistry, resource: &'a Resource) -> Self {
        Self {
            registry,
            resource,
            criteria: WhereCriteria::default(),
            sort_by: None,
            sort: None,
            pagination: Pagination::Unbounded,
            options: FilterWhereOptions::default(),
        }
    }

    pub fn criteria(mut self, criteria: WhereCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    /// Sorting applies only when both the target and the direction are given.
    pub fn order(mut self, sort_by: Option<String>, sort: Option<SortDirection>) -> Self {
        self.sort_by = sort_by;
        self.sort = sort;
        self
    }

    pub fn paginate(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn options(mut self, options: FilterWhereOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Result<QueryBuilder, FilterError> {
        let descriptor = self.resource.descriptor();
        let plan = JoinResolver::resolve(self.registry, descriptor, self.resource.parent_key())?;
        let where_clause = FilterWhere::generate(descriptor, &plan, &self.criteria, &self.options)?;

        let mut builder = QueryBuilder::new(descriptor.table_name(), descriptor.primary_key())
            .select(Self::select_list(descriptor.table_name(), &plan))
            .join(plan.join_clauses())
            .where_clause(where_clause)
            .paginate(self.pagination);

        if let (Some(sort_by), Some(sort)) = (self.sort_by.as_deref(), self.sort) {
            let info = FilterOrder::resolve(descriptor, &plan, sort_by, sort)?;
            builder = builder.order_by(info.expr).order(info.sort);
        }

        Ok(builder)
    }

    fn select_list(table: &str, plan: &JoinPlan) -> Vec<String> {
        let mut select = vec![format!("{}.*", quote_identifier(table))];
        for field in plan.computed.iter().filter(|f| !f.joined) {
            if field.expr.is_bare(&field.alias) {
                continue;
            }
            select.push(format!("({}) AS {}", plan.render(&field.expr), quote_identifier(&field.alias)));
        }
        select.extend(plan.select_fragments.iter().cloned());
        select
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::types::SqlParam;
    use crate::testing::sample_registry;

    #[test]
    fn builds_full_list_query() {
        let registry = sample_registry();
        let orders = registry.resource("orders").unwrap();
        let criteria = WhereCriteria {
            query: Some("cust".into()),
            exclude_ids: vec!["3".into(), "4".into()],
            ..WhereCriteria::for_tenant(Some(1))
        };

        let builder = Filter::new(&registry, &orders)
            .criteria(criteria)
            .order(Some("Total".into()), Some(SortDirection::Desc))
            .paginate(Pagination::Page { limit: 10, offset: 20 })
            .build()
            .unwrap();
        let sql = builder.to_sql();

        assert!(sql.query.starts_with("SELECT \"tbl_order\".*, ("));
        assert!(sql.query.contains("t1.\"Name\" AS \"Customer\""));
        assert!(sql.query.contains(" FROM \"tbl_order\" LEFT JOIN \"tbl_customer\" AS t1 ON "));
        assert!(sql.query.contains("WHERE \"tbl_order\".\"CompanyID\" = $1 AND \"tbl_order\".\"ArchivedDate\" IS NULL"));
        assert!(sql.query.contains("\"tbl_order\".\"OrderID\" NOT IN ($3, $4)"));
        assert!(sql.query.ends_with("ORDER BY \"tbl_order\".\"Total\" DESC OFFSET 20 ROWS FETCH NEXT 10 ROWS ONLY"));
        assert_eq!(sql.params, vec![
            SqlParam::Int(1),
            SqlParam::Text("%cust%".into()),
            SqlParam::Int(3),
            SqlParam::Int(4),
        ]);
    }

    #[test]
    fn sort_needs_both_target_and_direction() {
        let registry = sample_registry();
        let orders = registry.resource("orders").unwrap();
        let sql = Filter::new(&registry, &orders)
            .order(Some("Total".into()), None)
            .build()
            .unwrap()
            .to_sql();
        assert!(!sql.query.contains("ORDER BY"));
    }

    #[test]
    fn unknown_sort_target_fails_before_sql() {
        let registry = sample_registry();
        let orders = registry.resource("orders").unwrap();
        let result = Filter::new(&registry, &orders)
            .order(Some("Bogus".into()), Some(SortDirection::Asc))
            .build();
        assert!(matches!(result, Err(FilterError::UnsupportedSortField(_))));
    }
}
