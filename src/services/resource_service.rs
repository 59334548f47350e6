use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::context::RequestContext;
use super::error::CrudError;
use super::export::ResultExporter;
use crate::config::FilterConfig;
use crate::database::record::{check_local_rules, sanitize};
use crate::database::{
    resolve_fields, DatabaseGateway, DeleteStatement, InsertStatement, QueryBuilder, RecordError, ResolveContext,
    ResolvedFields, Row, UpdateStatement,
};
use crate::descriptor::{ColumnRole, DescriptorRegistry, ModelDescriptor, Resource, ValidationRule};
use crate::filter::types::{ListInput, Pagination, SqlParam, SqlResult};
use crate::filter::{Filter, FilterWhere, FilterWhereOptions, JoinPlan, WhereCriteria};
use crate::types::{is_truthy, Operation};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListResult {
    pub list: Vec<Row>,
    pub count: i64,
}

/// How a list resolves missing paging parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    /// Falls back to the default page.
    Paged,
    /// Returns every matching row unless the caller pages.
    Internal,
    /// Never paged.
    Export,
}

/// Resolve limit/offset into a page. Only `limit` means offset 0; only
/// `offset` means the default page size. Oversized pages are capped.
pub fn pagination(config: &FilterConfig, limit: Option<i64>, offset: Option<i64>, mode: ListMode) -> Pagination {
    let (limit, offset) = match (limit, offset, mode) {
        (_, _, ListMode::Export) | (None, None, ListMode::Internal) => return Pagination::Unbounded,
        (Some(limit), offset, _) => (limit, offset.unwrap_or(0)),
        (None, offset, _) => (config.default_page_size, offset.unwrap_or(0)),
    };
    let limit = match config.max_limit {
        Some(max) if limit > max => {
            warn!(requested = limit, max, "Page size capped");
            max
        }
        _ => limit,
    };
    Pagination::Page { limit, offset }
}

/// The list query for one request, ready to run or count. Pure: nothing is
/// executed, so it also serves offline SQL rendering.
pub fn plan_list(
    registry: &DescriptorRegistry,
    config: &FilterConfig,
    resource: &Resource,
    ctx: &RequestContext,
    mode: ListMode,
) -> Result<QueryBuilder, CrudError> {
    let input = ListInput::from_input(&ctx.input)?;
    let mut criteria = WhereCriteria {
        include_archived: input.archived,
        query: input.query.clone(),
        search_fields: input.search_fields.clone(),
        exclude_ids: input.exclude_ids.clone(),
        ..WhereCriteria::for_tenant(ctx.tenant_id)
    };
    if let (Some(parent_key), Some(parent_id)) = (resource.parent_key(), input.parent_id) {
        criteria = criteria.condition(parent_key, json!(parent_id));
    }

    let builder = Filter::new(registry, resource)
        .criteria(criteria)
        .order(input.sort_by, input.sort)
        .paginate(pagination(config, input.limit, input.offset, mode))
        .options(FilterWhereOptions { case_insensitive: config.case_insensitive_search })
        .build()?;

    if config.debug_logging {
        debug!(resource = %resource.name(), sql = %builder.sql(), "List query");
    }
    Ok(builder)
}

/// Composes descriptors, the filter compositor, the field-mapping engine
/// and the gateway into resource-level CRUD. Holds no request state; one
/// instance serves every request.
pub struct ResourceService {
    registry: Arc<DescriptorRegistry>,
    db: Arc<dyn DatabaseGateway>,
    config: FilterConfig,
}

impl ResourceService {
    pub fn new(registry: Arc<DescriptorRegistry>, db: Arc<dyn DatabaseGateway>, config: FilterConfig) -> Self {
        Self { registry, db, config }
    }

    pub fn registry(&self) -> &DescriptorRegistry {
        &self.registry
    }

    fn resource(&self, name: &str) -> Result<Resource, CrudError> {
        self.registry.resource(name).map_err(|_| CrudError::UnknownResource(name.to_string()))
    }

    fn options(&self) -> FilterWhereOptions {
        FilterWhereOptions { case_insensitive: self.config.case_insensitive_search }
    }

    // ========================================
    // Reads
    // ========================================

    /// List with `{list, count}`; unspecified paging uses the default page.
    pub async fn read_list_by(&self, resource: &str, ctx: &RequestContext) -> Result<ListResult, CrudError> {
        self.read_list(resource, ctx, ListMode::Paged).await
    }

    /// List that returns every matching row unless the caller pages.
    pub async fn read_list_internal(&self, resource: &str, ctx: &RequestContext) -> Result<ListResult, CrudError> {
        self.read_list(resource, ctx, ListMode::Internal).await
    }

    async fn read_list(&self, name: &str, ctx: &RequestContext, mode: ListMode) -> Result<ListResult, CrudError> {
        let resource = self.resource(name)?;
        let builder = plan_list(&self.registry, &self.config, &resource, ctx, mode)?;

        let count = builder.count(self.db.as_ref()).await?;
        let list = builder.get_all(self.db.as_ref()).await?;
        Ok(ListResult { list, count })
    }

    /// Rows matching exact own-column conditions, unpaged.
    pub async fn read_list_where(
        &self,
        name: &str,
        ctx: &RequestContext,
        conditions: Vec<(String, Value)>,
    ) -> Result<Vec<Row>, CrudError> {
        let resource = self.resource(name)?;
        let criteria = WhereCriteria { conditions, ..WhereCriteria::for_tenant(ctx.tenant_id) };
        let builder = Filter::new(&self.registry, &resource).criteria(criteria).options(self.options()).build()?;
        Ok(builder.get_all(self.db.as_ref()).await?)
    }

    /// Filtered and sorted rows, never paged, handed to the exporter.
    pub async fn export(
        &self,
        name: &str,
        ctx: &RequestContext,
        exporter: &dyn ResultExporter,
    ) -> Result<Vec<u8>, CrudError> {
        let resource = self.resource(name)?;
        let rows = plan_list(&self.registry, &self.config, &resource, ctx, ListMode::Export)?
            .get_all(self.db.as_ref())
            .await?;
        info!(table = %resource.descriptor().table_name(), rows = rows.len(), "Export");
        exporter.export(resource.descriptor(), &rows).await
    }

    /// Single record by primary key, tenant scoped, with nested tables.
    pub async fn find_by_id(&self, name: &str, ctx: &RequestContext, id: &str) -> Result<Option<Row>, CrudError> {
        let resource = self.resource(name)?;
        let pk = resource.descriptor().primary_key().to_string();
        self.find_one(&resource, ctx, vec![(pk, Value::String(id.to_string()))], true).await
    }

    pub async fn find_by(&self, name: &str, ctx: &RequestContext, column: &str, value: Value) -> Result<Option<Row>, CrudError> {
        let resource = self.resource(name)?;
        self.find_one(&resource, ctx, vec![(column.to_string(), value)], false).await
    }

    pub async fn find_where(
        &self,
        name: &str,
        ctx: &RequestContext,
        conditions: Vec<(String, Value)>,
    ) -> Result<Option<Row>, CrudError> {
        let resource = self.resource(name)?;
        self.find_one(&resource, ctx, conditions, false).await
    }

    async fn find_one(
        &self,
        resource: &Resource,
        ctx: &RequestContext,
        conditions: Vec<(String, Value)>,
        with_nested: bool,
    ) -> Result<Option<Row>, CrudError> {
        let criteria = WhereCriteria {
            conditions,
            ..WhereCriteria::for_tenant(ctx.tenant_id).include_archived(true)
        };
        let builder = Filter::new(&self.registry, resource).criteria(criteria).options(self.options()).build()?;
        let Some(mut row) = builder.get_one(self.db.as_ref()).await? else {
            return Ok(None);
        };
        if with_nested {
            self.attach_nested(resource.descriptor(), ctx, &mut row).await?;
        }
        Ok(Some(row))
    }

    /// One child query per nested table, in declaration order.
    async fn attach_nested(&self, descriptor: &ModelDescriptor, ctx: &RequestContext, row: &mut Row) -> Result<(), CrudError> {
        for nested in descriptor.nested_tables() {
            let child = self.registry.descriptor(&nested.target)?;
            let key = child.nested_key().to_string();
            let parent_value = row.get(&nested.column).cloned().unwrap_or(Value::Null);
            if parent_value.is_null() {
                row.insert(key, Value::Array(vec![]));
                continue;
            }

            let child_resource = Resource::new(nested.target.clone(), child, Some(nested.column.clone()));
            let criteria = WhereCriteria::for_tenant(ctx.tenant_id).condition(nested.column.clone(), parent_value);
            let children = Filter::new(&self.registry, &child_resource)
                .criteria(criteria)
                .options(self.options())
                .build()?
                .get_all(self.db.as_ref())
                .await?;
            row.insert(key, Value::Array(children.into_iter().map(Value::Object).collect()));
        }
        Ok(())
    }

    // ========================================
    // Writes
    // ========================================

    /// Insert one record; returns the new primary key.
    pub async fn create(
        &self,
        name: &str,
        ctx: &RequestContext,
        data: &Map<String, Value>,
        defaults: &Map<String, Value>,
    ) -> Result<Value, CrudError> {
        let resource = self.resource(name)?;
        let descriptor = resource.descriptor();
        let fields = self.resolve(&resource, ctx, data, defaults, Operation::Create)?;
        self.check_rules(descriptor, ctx, &fields).await?;

        let sql = InsertStatement::new(descriptor.table_name(), descriptor.primary_key())
            .row(fields.into_values())
            .to_sql();
        let rows = self.db.query(&sql).await?;
        let id = rows
            .first()
            .and_then(|row| row.get(descriptor.primary_key()))
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| CrudError::NotCreated(descriptor.table_name().to_string()))?;

        info!(table = %descriptor.table_name(), operation = Operation::Create.as_str(), id = %id, "Write");
        Ok(id)
    }

    /// One multi-row INSERT. Any row failing resolution or validation
    /// aborts the whole batch before the database is touched.
    pub async fn create_bulk(
        &self,
        name: &str,
        ctx: &RequestContext,
        rows: &[Value],
    ) -> Result<Vec<Value>, CrudError> {
        let resource = self.resource(name)?;
        let descriptor = resource.descriptor();
        if rows.is_empty() {
            return Ok(vec![]);
        }

        let mut insert = InsertStatement::new(descriptor.table_name(), descriptor.primary_key());
        for (i, row) in rows.iter().enumerate() {
            let data = row
                .as_object()
                .ok_or_else(|| RecordError::InvalidPayload(format!("row {} is not an object", i)))?;
            let fields = self.resolve(&resource, ctx, data, &Map::new(), Operation::Create)?;
            self.check_rules(descriptor, ctx, &fields).await?;
            insert = insert.row(fields.into_values());
        }

        let returned = self.db.query(&insert.to_sql()).await?;
        let ids: Vec<Value> = returned
            .into_iter()
            .filter_map(|mut row| row.remove(descriptor.primary_key()))
            .collect();

        info!(table = %descriptor.table_name(), operation = "bulk_create", affected = ids.len(), "Write");
        Ok(ids)
    }

    /// Update by primary key. A truthy `ArchivedDate` in the data asks for
    /// un-archiving and takes the restore path instead.
    pub async fn update(
        &self,
        name: &str,
        ctx: &RequestContext,
        id: &str,
        data: &Map<String, Value>,
        defaults: &Map<String, Value>,
    ) -> Result<u64, CrudError> {
        let resource = self.resource(name)?;
        let descriptor = resource.descriptor();
        if let Some(archived) = descriptor.archived_column() {
            if data.get(&archived.name).map(is_truthy).unwrap_or(false) {
                return self.restore(name, ctx, id).await;
            }
        }
        let conditions = vec![(descriptor.primary_key().to_string(), Value::String(id.to_string()))];
        self.update_matching(&resource, ctx, conditions, data, defaults).await
    }

    /// Update every row matching exact own-column conditions.
    pub async fn update_where(
        &self,
        name: &str,
        ctx: &RequestContext,
        conditions: Vec<(String, Value)>,
        data: &Map<String, Value>,
    ) -> Result<u64, CrudError> {
        let resource = self.resource(name)?;
        self.update_matching(&resource, ctx, conditions, data, &Map::new()).await
    }

    async fn update_matching(
        &self,
        resource: &Resource,
        ctx: &RequestContext,
        conditions: Vec<(String, Value)>,
        data: &Map<String, Value>,
        defaults: &Map<String, Value>,
    ) -> Result<u64, CrudError> {
        let descriptor = resource.descriptor();
        let fields = self.resolve(resource, ctx, data, defaults, Operation::Update)?;
        if fields.is_empty() {
            return Ok(0);
        }
        self.check_rules(descriptor, ctx, &fields).await?;

        let where_clause = self.write_where(descriptor, ctx, conditions)?;
        let sql = UpdateStatement::new(descriptor.table_name(), where_clause)
            .set_all(fields.into_values())
            .to_sql();
        self.execute(descriptor, Operation::Update.as_str(), &sql).await
    }

    /// Apply an explicit field map to a list of ids. Bypasses field
    /// resolution except for per-kind sanitization; auditor and audit
    /// timestamp are always stamped.
    pub async fn bulk_update(
        &self,
        name: &str,
        ctx: &RequestContext,
        ids: &[Value],
        fields: &Map<String, Value>,
    ) -> Result<u64, CrudError> {
        let resource = self.resource(name)?;
        let descriptor = resource.descriptor();
        if ids.is_empty() {
            return Ok(0);
        }

        let mut values = Vec::with_capacity(fields.len() + 2);
        for (column, value) in fields {
            let spec = descriptor
                .column(column)
                .filter(|c| c.role != ColumnRole::PrimaryKey)
                .ok_or_else(|| RecordError::UnknownColumn {
                    table: descriptor.table_name().to_string(),
                    column: column.clone(),
                })?;
            values.push((spec.name.clone(), sanitize(spec.kind, value).unwrap_or(SqlParam::Null(spec.kind))));
        }
        values.extend(self.audit_stamp(descriptor, ctx));

        let pk = descriptor.primary_key().to_string();
        let where_clause = self.write_where(descriptor, ctx, vec![(pk, Value::Array(ids.to_vec()))])?;
        let sql = UpdateStatement::new(descriptor.table_name(), where_clause).set_all(values).to_sql();
        self.execute(descriptor, "bulk_update", &sql).await
    }

    /// Stamp the archive column with the current time. Repeating it moves
    /// the timestamp forward.
    pub async fn soft_delete(&self, name: &str, ctx: &RequestContext, id: &str) -> Result<u64, CrudError> {
        let resource = self.resource(name)?;
        let descriptor = resource.descriptor();
        let archived = descriptor
            .archived_column()
            .ok_or_else(|| CrudError::SoftDeleteUnsupported(descriptor.table_name().to_string()))?;
        let now = chrono::Local::now().naive_local();

        let where_clause = self.by_id(descriptor, ctx, id)?;
        let sql = UpdateStatement::new(descriptor.table_name(), where_clause)
            .set(archived.name.clone(), SqlParam::Timestamp(now))
            .set_all(self.audit_stamp(descriptor, ctx))
            .to_sql();
        self.execute(descriptor, Operation::Delete.as_str(), &sql).await
    }

    pub async fn restore(&self, name: &str, ctx: &RequestContext, id: &str) -> Result<u64, CrudError> {
        let resource = self.resource(name)?;
        let descriptor = resource.descriptor();
        let archived = descriptor
            .archived_column()
            .ok_or_else(|| CrudError::SoftDeleteUnsupported(descriptor.table_name().to_string()))?;

        let where_clause = self.by_id(descriptor, ctx, id)?;
        let sql = UpdateStatement::new(descriptor.table_name(), where_clause)
            .set(archived.name.clone(), SqlParam::Null(archived.kind))
            .set_all(self.audit_stamp(descriptor, ctx))
            .to_sql();
        self.execute(descriptor, Operation::Restore.as_str(), &sql).await
    }

    pub async fn hard_delete(&self, name: &str, ctx: &RequestContext, id: &str) -> Result<u64, CrudError> {
        let resource = self.resource(name)?;
        let descriptor = resource.descriptor();
        let sql = DeleteStatement::new(descriptor.table_name(), self.by_id(descriptor, ctx, id)?).to_sql();
        self.execute(descriptor, "hard_delete", &sql).await
    }

    /// Physically delete rows matching exact own-column conditions.
    pub async fn delete_where(
        &self,
        name: &str,
        ctx: &RequestContext,
        conditions: Vec<(String, Value)>,
    ) -> Result<u64, CrudError> {
        let resource = self.resource(name)?;
        let descriptor = resource.descriptor();
        if conditions.is_empty() {
            return Err(RecordError::InvalidPayload("delete requires at least one condition".to_string()).into());
        }
        let sql = DeleteStatement::new(descriptor.table_name(), self.write_where(descriptor, ctx, conditions)?).to_sql();
        self.execute(descriptor, "delete_where", &sql).await
    }

    // ========================================
    // Helpers
    // ========================================

    fn resolve(
        &self,
        resource: &Resource,
        ctx: &RequestContext,
        data: &Map<String, Value>,
        defaults: &Map<String, Value>,
        operation: Operation,
    ) -> Result<ResolvedFields, CrudError> {
        let resolve_ctx = ResolveContext::new(ctx.tenant_id, ctx.principal_id)
            .with_parent(resource.parent_key(), ctx.input.get_i64("id"));
        Ok(resolve_fields(resource.descriptor(), data, defaults, operation, &resolve_ctx)?)
    }

    /// Local rules first, then `exists` lookups against the target table.
    async fn check_rules(&self, descriptor: &ModelDescriptor, ctx: &RequestContext, fields: &ResolvedFields) -> Result<(), CrudError> {
        check_local_rules(descriptor, fields)?;

        for rule in descriptor.validation_rules() {
            let ValidationRule::Exists { column, target } = rule else {
                continue;
            };
            let Some(value) = fields.get(column).filter(|v| !v.is_null()) else {
                continue;
            };
            let target = self.registry.descriptor(target)?;
            let criteria = WhereCriteria::for_tenant(ctx.tenant_id)
                .include_archived(true)
                .condition(target.primary_key(), value.to_json());
            let where_clause = FilterWhere::generate(&target, &JoinPlan::unjoined(&target), &criteria, &self.options())?;
            let found = QueryBuilder::new(target.table_name(), target.primary_key())
                .select(vec!["1 AS found".to_string()])
                .where_clause(where_clause)
                .get_one(self.db.as_ref())
                .await?;

            if found.is_none() {
                return Err(RecordError::ValidationFailed {
                    table: descriptor.table_name().to_string(),
                    rule: rule.describe(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn by_id(&self, descriptor: &ModelDescriptor, ctx: &RequestContext, id: &str) -> Result<SqlResult, CrudError> {
        let pk = descriptor.primary_key().to_string();
        self.write_where(descriptor, ctx, vec![(pk, Value::String(id.to_string()))])
    }

    /// WHERE for writes: tenant plus exact conditions, archived rows included.
    fn write_where(
        &self,
        descriptor: &ModelDescriptor,
        ctx: &RequestContext,
        conditions: Vec<(String, Value)>,
    ) -> Result<SqlResult, CrudError> {
        let plan = JoinPlan::unjoined(descriptor);
        let criteria = WhereCriteria {
            conditions,
            ..WhereCriteria::for_tenant(ctx.tenant_id).include_archived(true)
        };
        Ok(FilterWhere::generate(descriptor, &plan, &criteria, &self.options())?)
    }

    fn audit_stamp(&self, descriptor: &ModelDescriptor, ctx: &RequestContext) -> Vec<(String, SqlParam)> {
        let now = chrono::Local::now().naive_local();
        let mut stamp = Vec::new();
        if let (Some(column), Some(principal)) = (descriptor.column_with_role(ColumnRole::Auditor), ctx.principal_id) {
            stamp.push((column.name.clone(), SqlParam::Int(principal)));
        }
        if let Some(column) = descriptor.column_with_role(ColumnRole::AuditTimestamp) {
            stamp.push((column.name.clone(), SqlParam::Timestamp(now)));
        }
        stamp
    }

    async fn execute(&self, descriptor: &ModelDescriptor, operation: &str, sql: &SqlResult) -> Result<u64, CrudError> {
        let affected = self.db.execute(sql).await?;
        info!(table = %descriptor.table_name(), operation, affected, "Write");
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::export::JsonLinesExporter;
    use crate::testing::{sample_registry, MockGateway};
    use crate::types::RequestInput;

    fn service() -> (ResourceService, Arc<MockGateway>) {
        let db = Arc::new(MockGateway::new());
        let service = ResourceService::new(Arc::new(sample_registry()), db.clone(), FilterConfig::default());
        (service, db)
    }

    fn ctx(query: Value) -> RequestContext {
        let input = RequestInput::from_query(query.as_object().cloned().unwrap());
        RequestContext::new(Some(1), Some(42)).with_input(input)
    }

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn list_returns_rows_and_count() {
        let (service, db) = service();
        db.push_rows(vec![json!({ "count": 2 })]);
        db.push_rows(vec![json!({ "OrderID": 1 }), json!({ "OrderID": 2 })]);

        let result = service
            .read_list_by("orders", &ctx(json!({ "query": "cust", "ExcludeIDs": "3,4" })))
            .await
            .unwrap();

        assert_eq!(result.count, 2);
        assert_eq!(result.list.len(), 2);
        let statements = db.statements();
        assert!(statements[0].query.starts_with("SELECT COUNT(\"tbl_order\".\"OrderID\") AS count"));
        assert!(statements[1].query.ends_with("OFFSET 0 ROWS FETCH NEXT 10 ROWS ONLY"));
        assert!(statements[1].query.contains("NOT IN ($3, $4)"));
    }

    #[tokio::test]
    async fn validation_errors_stop_before_sql() {
        let (service, db) = service();
        let err = service
            .read_list_by("orders", &ctx(json!({ "searchFields": { "x": ["Total", "~", "1"] } })))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_COMPARE_OPERATION");
        assert!(db.statements().is_empty());
    }

    #[tokio::test]
    async fn unknown_resource_is_reported() {
        let (service, _) = service();
        let err = service.read_list_by("widgets", &ctx(json!({}))).await.unwrap_err();
        assert!(matches!(err, CrudError::UnknownResource(name) if name == "widgets"));
    }

    #[test]
    fn pagination_defaults_and_caps() {
        let config = FilterConfig::default();
        assert_eq!(pagination(&config, None, None, ListMode::Paged), Pagination::Page { limit: 10, offset: 0 });
        assert_eq!(pagination(&config, None, None, ListMode::Internal), Pagination::Unbounded);
        assert_eq!(pagination(&config, Some(5), None, ListMode::Internal), Pagination::Page { limit: 5, offset: 0 });
        assert_eq!(pagination(&config, None, Some(30), ListMode::Paged), Pagination::Page { limit: 10, offset: 30 });
        assert_eq!(pagination(&config, Some(5000), Some(0), ListMode::Paged), Pagination::Page { limit: 1000, offset: 0 });
        assert_eq!(pagination(&config, Some(5), Some(5), ListMode::Export), Pagination::Unbounded);
    }

    #[tokio::test]
    async fn child_resource_is_scoped_to_parent() {
        let (service, db) = service();
        service.read_list_internal("order_lines", &ctx(json!({ "id": 8 }))).await.unwrap();

        let sql = db.last_statement();
        assert!(sql.query.contains("\"tbl_order_item\".\"OrderID\" = $2"));
        assert!(!sql.query.contains("LEFT JOIN \"tbl_order\""));
        assert!(!sql.query.contains("FETCH NEXT"));
        assert_eq!(sql.params[1], SqlParam::Int(8));
    }

    #[tokio::test]
    async fn find_by_id_attaches_nested_children() {
        let (service, db) = service();
        db.push_rows(vec![json!({ "OrderID": 7, "Total": 10 })]);
        db.push_rows(vec![json!({ "OrderItemID": 1 }), json!({ "OrderItemID": 2 })]);

        let row = service.find_by_id("orders", &ctx(json!({})), "7").await.unwrap().unwrap();
        assert_eq!(row["order_item"].as_array().unwrap().len(), 2);

        let statements = db.statements();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].query.contains("\"tbl_order\".\"OrderID\" = $2"));
        assert!(!statements[0].query.contains("\"tbl_order\".\"ArchivedDate\" IS NULL"));
        assert!(statements[1].query.contains("\"tbl_order_item\".\"OrderID\" = $2"));
        assert!(statements[1].query.contains("\"tbl_order_item\".\"ArchivedDate\" IS NULL"));
    }

    #[tokio::test]
    async fn find_by_id_missing_is_none() {
        let (service, _) = service();
        assert!(service.find_by_id("orders", &ctx(json!({})), "7").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_resolves_validates_and_inserts() {
        let (service, db) = service();
        db.push_rows(vec![json!({ "found": 1 })]);
        db.push_rows(vec![json!({ "OrderID": 11 })]);

        let id = service
            .create("orders", &ctx(json!({})), &obj(json!({ "CustomerID": 5, "Total": "12.50" })), &Map::new())
            .await
            .unwrap();
        assert_eq!(id, json!(11));

        let statements = db.statements();
        // exists check on the customer, tenant scoped
        assert!(statements[0].query.starts_with("SELECT 1 AS found FROM \"tbl_customer\" WHERE \"tbl_customer\".\"CompanyID\" = $1"));
        let insert = &statements[1];
        assert!(insert.query.starts_with("INSERT INTO \"tbl_order\" (\"CompanyID\", \"CustomerID\", \"Total\""));
        assert!(insert.query.ends_with("RETURNING \"OrderID\""));
        assert_eq!(insert.params[0], SqlParam::Int(1));
    }

    #[tokio::test]
    async fn create_with_missing_reference_fails_validation() {
        let (service, db) = service();
        let err = service
            .create("orders", &ctx(json!({})), &obj(json!({ "CustomerID": 5, "Total": 1 })), &Map::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_FAILED");
        assert_eq!(db.statements().len(), 1);
    }

    #[tokio::test]
    async fn create_missing_required_never_touches_database() {
        let (service, db) = service();
        let err = service
            .create("orders", &ctx(json!({})), &obj(json!({ "CustomerID": 5 })), &Map::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "MISSING_REQUIRED_FIELD");
        assert!(db.statements().is_empty());
    }

    #[tokio::test]
    async fn bulk_create_aborts_on_any_bad_row() {
        let (service, db) = service();
        let rows = vec![json!({ "Name": "A" }), json!({ "Code": "no-name" })];
        let err = service.create_bulk("customers", &ctx(json!({})), &rows).await.unwrap_err();
        assert_eq!(err.code(), "MISSING_REQUIRED_FIELD");
        assert!(db.statements().is_empty());
    }

    #[tokio::test]
    async fn bulk_create_is_one_statement() {
        let (service, db) = service();
        db.push_rows(vec![json!({ "CustomerID": 1 }), json!({ "CustomerID": 2 })]);
        let rows = vec![json!({ "Name": "A" }), json!({ "Name": "B", "Code": "b" })];

        let ids = service.create_bulk("customers", &ctx(json!({})), &rows).await.unwrap();
        assert_eq!(ids, vec![json!(1), json!(2)]);
        let sql = db.last_statement();
        assert_eq!(db.statements().len(), 1);
        assert!(sql.query.contains("), ("));
        assert!(sql.query.contains("DEFAULT"));
    }

    #[tokio::test]
    async fn update_is_tenant_scoped_by_primary_key() {
        let (service, db) = service();
        db.push_affected(1);
        let affected = service
            .update("customers", &ctx(json!({})), "4", &obj(json!({ "Name": "Renamed" })), &Map::new())
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let sql = db.last_statement();
        assert!(sql.query.starts_with("UPDATE \"tbl_customer\" SET \"CompanyID\" = $3"));
        assert!(sql.query.ends_with("WHERE \"tbl_customer\".\"CompanyID\" = $1 AND \"tbl_customer\".\"CustomerID\" = $2"));
        assert!(sql.query.contains("\"Name\" = "));
        assert!(!sql.query.contains("\"Code\" = "));
    }

    #[tokio::test]
    async fn update_with_archived_date_restores() {
        let (service, db) = service();
        db.push_affected(1);
        service
            .update("customers", &ctx(json!({})), "4", &obj(json!({ "ArchivedDate": 1, "Name": "x" })), &Map::new())
            .await
            .unwrap();

        let sql = db.last_statement();
        assert!(sql.query.contains("\"ArchivedDate\" = $3"));
        assert!(!sql.query.contains("\"Name\""));
        assert_eq!(sql.params[2], SqlParam::Null(crate::descriptor::ColumnKind::DateTime));
    }

    #[tokio::test]
    async fn soft_delete_and_restore_stamp_archive_column() {
        let (service, db) = service();
        db.push_affected(1);
        db.push_affected(1);

        assert_eq!(service.soft_delete("orders", &ctx(json!({})), "9").await.unwrap(), 1);
        let deleted = db.last_statement();
        assert!(deleted.query.starts_with("UPDATE \"tbl_order\" SET \"ArchivedDate\" = $3, \"UpdatedByContactID\" = $4, \"CreateUpdateDate\" = $5"));
        assert!(matches!(deleted.params[2], SqlParam::Timestamp(_)));

        assert_eq!(service.restore("orders", &ctx(json!({})), "9").await.unwrap(), 1);
        assert!(db.last_statement().params[2].is_null());
    }

    #[tokio::test]
    async fn repeated_soft_delete_and_restore_succeed() {
        let (service, db) = service();
        for _ in 0..4 {
            db.push_affected(1);
        }
        let c = ctx(json!({}));

        assert_eq!(service.soft_delete("orders", &c, "9").await.unwrap(), 1);
        assert_eq!(service.soft_delete("orders", &c, "9").await.unwrap(), 1);
        assert_eq!(service.restore("orders", &c, "9").await.unwrap(), 1);
        assert_eq!(service.restore("orders", &c, "9").await.unwrap(), 1);

        let statements = db.statements();
        assert_eq!(statements.len(), 4);
        assert_eq!(statements[0].query, statements[1].query);
        assert_eq!(statements[2].query, statements[3].query);
        // archived rows stay addressable, so a second call still finds the row
        assert!(!statements[1].query.contains("IS NULL"));
        assert!(statements[3].params[2].is_null());
    }

    #[tokio::test]
    async fn soft_delete_requires_archive_column() {
        let (service, _) = service();
        let err = service.soft_delete("companies", &ctx(json!({})), "1").await.unwrap_err();
        assert!(matches!(err, CrudError::SoftDeleteUnsupported(_)));
    }

    #[tokio::test]
    async fn other_tenant_mutation_affects_nothing() {
        let (service, db) = service();
        db.push_affected(0);
        assert_eq!(service.hard_delete("orders", &ctx(json!({})), "9").await.unwrap(), 0);
        assert_eq!(
            db.last_statement().query,
            "DELETE FROM \"tbl_order\" WHERE \"tbl_order\".\"CompanyID\" = $1 AND \"tbl_order\".\"OrderID\" = $2"
        );
    }

    #[tokio::test]
    async fn bulk_update_rejects_unknown_columns_and_stamps_audit() {
        let (service, db) = service();
        let err = service
            .bulk_update("orders", &ctx(json!({})), &[json!(1)], &obj(json!({ "Bogus": 1 })))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_COLUMN");

        db.push_affected(2);
        let affected = service
            .bulk_update("orders", &ctx(json!({})), &[json!(1), json!(2)], &obj(json!({ "Status": "closed" })))
            .await
            .unwrap();
        assert_eq!(affected, 2);
        let sql = db.last_statement();
        assert!(sql.query.contains("\"OrderID\" IN ($2, $3)"));
        assert!(sql.query.contains("\"Status\" = $4, \"UpdatedByContactID\" = $5, \"CreateUpdateDate\" = $6"));
    }

    #[tokio::test]
    async fn delete_where_requires_conditions() {
        let (service, db) = service();
        assert!(service.delete_where("notes", &ctx(json!({})), vec![]).await.is_err());
        db.push_affected(3);
        let affected = service
            .delete_where("notes", &ctx(json!({})), vec![("OrderID".into(), json!(4))])
            .await
            .unwrap();
        assert_eq!(affected, 3);
    }

    #[tokio::test]
    async fn export_is_never_paged() {
        let (service, db) = service();
        db.push_rows(vec![json!({ "CustomerID": 1 })]);
        let bytes = service
            .export("customers", &ctx(json!({ "limit": 5, "sortBy": "Name", "sort": "asc" })), &JsonLinesExporter)
            .await
            .unwrap();
        assert_eq!(bytes, b"{\"CustomerID\":1}\n".to_vec());
        let sql = db.last_statement();
        assert!(sql.query.ends_with("ORDER BY \"tbl_customer\".\"Name\" ASC"));
    }

    #[tokio::test]
    async fn database_errors_propagate() {
        let (service, db) = service();
        db.push_query_error("connection reset");
        let err = service.read_list_by("customers", &ctx(json!({}))).await.unwrap_err();
        assert!(matches!(err, CrudError::Database(_)));
    }
}
