use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::descriptor::DescriptorRegistry;

/// Loading already parsed and cross-checked the catalog; this re-runs the
/// reference checks and reports what was found.
pub async fn handle(catalog: Option<&str>, registry: &DescriptorRegistry, output_format: OutputFormat) -> anyhow::Result<()> {
    registry.validate()?;
    let resources = registry.resource_names();
    let source = catalog.unwrap_or("built-in sample catalog");
    output_success(
        output_format,
        &format!("{} is valid: {} resources", source, resources.len()),
        Some(json!({ "catalog": source, "resources": resources })),
    )
}
