use super::error::FilterError;
use super::filter_join::JoinPlan;
use super::types::SortDirection;
use crate::descriptor::{qualified, quote_identifier, ModelDescriptor};

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOrderInfo {
    pub expr: String,
    pub sort: SortDirection,
}

pub struct FilterOrder;

impl FilterOrder {
    /// Resolve `sortBy` against own columns, computed fields (rendered
    /// through the alias map) and join description aliases.
    pub fn resolve(
        descriptor: &ModelDescriptor,
        plan: &JoinPlan,
        sort_by: &str,
        sort: SortDirection,
    ) -> Result<FilterOrderInfo, FilterError> {
        let expr = if descriptor.has_column(sort_by) {
            qualified(descriptor.table_name(), sort_by)
        } else if let Some(field) = plan.computed_field(sort_by) {
            format!("({})", plan.render(&field.expr))
        } else if plan.is_description_alias(sort_by) {
            quote_identifier(sort_by)
        } else {
            return Err(FilterError::UnsupportedSortField(sort_by.to_string()));
        };
        Ok(FilterOrderInfo { expr, sort })
    }
}
