use clap::Args;
use serde_json::{json, Value};

use crate::cli::utils::{format_table, output_value};
use crate::cli::OutputFormat;
use crate::descriptor::DescriptorRegistry;
use crate::filter::JoinResolver;

#[derive(Args, Debug)]
pub struct DescribeArgs {
    #[arg(help = "Resource name; lists every resource when omitted")]
    pub resource: Option<String>,
}

pub async fn handle(args: DescribeArgs, registry: &DescriptorRegistry, output_format: OutputFormat) -> anyhow::Result<()> {
    match args.resource {
        Some(name) => {
            let value = describe_resource(registry, &name)?;
            output_value(output_format, &value, text_lines)
        }
        None => {
            let value = list_resources(registry)?;
            output_value(output_format, &value, |v| {
                let rows: Vec<Vec<String>> = v["resources"]
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .map(|r| vec![cell(&r["name"]), cell(&r["table"]), cell(&r["parent_key"])])
                            .collect()
                    })
                    .unwrap_or_default();
                format_table(&["Resource", "Table", "Parent key"], &rows)
            })
        }
    }
}

pub fn list_resources(registry: &DescriptorRegistry) -> anyhow::Result<Value> {
    let mut resources = Vec::new();
    for name in registry.resource_names() {
        let resource = registry.resource(name)?;
        resources.push(json!({
            "name": name,
            "table": resource.descriptor().table_name(),
            "parent_key": resource.parent_key(),
        }));
    }
    Ok(json!({ "resources": resources }))
}

/// Resolved view of one resource: columns with kinds and roles, joins
/// with their aliases, and every computed field visible to queries.
pub fn describe_resource(registry: &DescriptorRegistry, name: &str) -> anyhow::Result<Value> {
    let resource = registry.resource(name)?;
    let descriptor = resource.descriptor();
    let plan = JoinResolver::resolve(registry, descriptor, resource.parent_key())?;

    let joins: Vec<Value> = plan
        .joins
        .iter()
        .map(|j| {
            json!({
                "alias": j.alias.as_str(),
                "column": j.fk_column,
                "table": j.descriptor.table_name(),
                "description": j.description_alias(),
            })
        })
        .collect();
    let computed: Vec<Value> = plan
        .computed
        .iter()
        .map(|f| json!({ "alias": f.alias, "joined": f.joined }))
        .collect();
    let rules: Vec<String> = descriptor.validation_rules().iter().map(|r| r.describe()).collect();

    Ok(json!({
        "resource": resource.name(),
        "descriptor": descriptor.name(),
        "table": descriptor.table_name(),
        "primary_key": descriptor.primary_key(),
        "parent_key": resource.parent_key(),
        "columns": descriptor.columns(),
        "joins": joins,
        "computed": computed,
        "nested": descriptor.nested_tables(),
        "validate": rules,
    }))
}

fn text_lines(value: &Value) -> Vec<String> {
    let mut lines = vec![format!(
        "{} ({}), primary key {}",
        cell(&value["resource"]),
        cell(&value["table"]),
        cell(&value["primary_key"])
    )];
    if let Some(parent) = value["parent_key"].as_str() {
        lines.push(format!("scoped by parent key {}", parent));
    }
    lines.push(String::new());

    let columns: Vec<Vec<String>> = value["columns"]
        .as_array()
        .into_iter()
        .flatten()
        .map(|c| {
            vec![
                cell(&c["name"]),
                cell(&c["sql_type"]),
                cell(&c["kind"]),
                cell(&c["role"]),
                if c["nullable"].as_bool().unwrap_or(false) { "yes".into() } else { "no".into() },
                cell(&c["default_literal"]),
            ]
        })
        .collect();
    lines.extend(format_table(&["Column", "Type", "Kind", "Role", "Null", "Default"], &columns));

    let joins: Vec<Vec<String>> = value["joins"]
        .as_array()
        .into_iter()
        .flatten()
        .map(|j| vec![cell(&j["alias"]), cell(&j["column"]), cell(&j["table"]), cell(&j["description"])])
        .collect();
    if !joins.is_empty() {
        lines.push(String::new());
        lines.extend(format_table(&["Alias", "Key", "Table", "Description"], &joins));
    }

    let computed: Vec<String> = value["computed"]
        .as_array()
        .into_iter()
        .flatten()
        .map(|f| {
            let origin = if f["joined"].as_bool().unwrap_or(false) { " (joined)" } else { "" };
            format!("  {}{}", cell(&f["alias"]), origin)
        })
        .collect();
    if !computed.is_empty() {
        lines.push(String::new());
        lines.push("Computed fields:".into());
        lines.extend(computed);
    }

    if let Some(rules) = value["validate"].as_array().filter(|r| !r.is_empty()) {
        lines.push(String::new());
        lines.push("Validation:".into());
        lines.extend(rules.iter().map(|r| format!("  {}", cell(r))));
    }
    lines
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
