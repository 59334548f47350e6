use clap::Args;
use serde_json::{json, Map, Value};

use crate::cli::utils::output_value;
use crate::cli::OutputFormat;
use crate::config::FilterConfig;
use crate::descriptor::DescriptorRegistry;
use crate::services::{plan_list, ListMode, RequestContext};
use crate::types::RequestInput;

#[derive(Args, Debug, Default)]
pub struct SqlArgs {
    #[arg(help = "Resource name")]
    pub resource: String,

    #[arg(long, help = "Free-text search terms")]
    pub query: Option<String>,

    #[arg(long = "search-fields", help = "searchFields JSON object")]
    pub search_fields: Option<String>,

    #[arg(long = "sort-by")]
    pub sort_by: Option<String>,

    #[arg(long, help = "asc or desc")]
    pub sort: Option<String>,

    #[arg(long)]
    pub limit: Option<i64>,

    #[arg(long)]
    pub offset: Option<i64>,

    #[arg(long, help = "Tenant id to scope by")]
    pub tenant: Option<i64>,

    #[arg(long = "exclude-ids", help = "Comma-separated primary keys to leave out")]
    pub exclude_ids: Option<String>,

    #[arg(long = "parent-id", help = "Parent id for child resources")]
    pub parent_id: Option<i64>,

    #[arg(long, help = "Include archived rows")]
    pub archived: bool,
}

impl SqlArgs {
    /// The same loosely typed parameters an HTTP list request carries.
    fn to_input(&self) -> RequestInput {
        let mut query = Map::new();
        let mut put = |key: &str, value: Option<Value>| {
            if let Some(value) = value {
                query.insert(key.to_string(), value);
            }
        };
        put("query", self.query.clone().map(Value::String));
        put("searchFields", self.search_fields.clone().map(Value::String));
        put("sortBy", self.sort_by.clone().map(Value::String));
        put("sort", self.sort.clone().map(Value::String));
        put("limit", self.limit.map(Value::from));
        put("offset", self.offset.map(Value::from));
        put("ExcludeIDs", self.exclude_ids.clone().map(Value::String));
        put("id", self.parent_id.map(Value::from));
        put("archived", self.archived.then_some(Value::Bool(true)));
        RequestInput::from_query(query)
    }
}

pub async fn handle(args: SqlArgs, registry: &DescriptorRegistry, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = crate::config::config().filter.clone();
    let value = render(registry, &config, &args)?;
    output_value(output_format, &value, |v| {
        let params: Vec<String> = v["params"]
            .as_array()
            .into_iter()
            .flatten()
            .enumerate()
            .map(|(i, p)| format!("  ${} = {}", i + 1, p))
            .collect();
        let mut lines = vec![
            v["sql"].as_str().unwrap_or_default().to_string(),
            String::new(),
            v["count_sql"].as_str().unwrap_or_default().to_string(),
        ];
        if !params.is_empty() {
            lines.push(String::new());
            lines.extend(params);
        }
        lines
    })
}

/// List and count SQL with bound parameters, exactly as the list endpoint
/// would issue them.
pub fn render(registry: &DescriptorRegistry, config: &FilterConfig, args: &SqlArgs) -> anyhow::Result<Value> {
    let resource = registry.resource(&args.resource)?;
    let ctx = RequestContext::new(args.tenant, None).with_input(args.to_input());
    let builder = plan_list(registry, config, &resource, &ctx, ListMode::Paged)?;

    let list = builder.to_sql();
    let count = builder.to_count_sql();
    let params: Vec<Value> = list.params.iter().map(|p| p.to_json()).collect();
    Ok(json!({
        "sql": list.query,
        "count_sql": count.query,
        "params": params,
    }))
}
