use async_trait::async_trait;

use super::error::CrudError;
use crate::database::Row;
use crate::descriptor::ModelDescriptor;

/// Turns a fully filtered and sorted, unpaginated result set into a file.
#[async_trait]
pub trait ResultExporter: Send + Sync {
    fn content_type(&self) -> &'static str;

    fn file_extension(&self) -> &'static str;

    async fn export(&self, descriptor: &ModelDescriptor, rows: &[Row]) -> Result<Vec<u8>, CrudError>;
}

/// One JSON object per line, keys in select order.
pub struct JsonLinesExporter;

#[async_trait]
impl ResultExporter for JsonLinesExporter {
    fn content_type(&self) -> &'static str {
        "application/x-ndjson"
    }

    fn file_extension(&self) -> &'static str {
        "jsonl"
    }

    async fn export(&self, _descriptor: &ModelDescriptor, rows: &[Row]) -> Result<Vec<u8>, CrudError> {
        let mut out = Vec::new();
        for row in rows {
            serde_json::to_writer(&mut out, row).map_err(|e| CrudError::Export(e.to_string()))?;
            out.push(b'\n');
        }
        Ok(out)
    }
}

/// Exporter for a `format` request parameter.
pub fn exporter_for(format: &str) -> Result<Box<dyn ResultExporter>, CrudError> {
    match format.to_ascii_lowercase().as_str() {
        "jsonl" | "ndjson" | "json" => Ok(Box::new(JsonLinesExporter)),
        other => Err(CrudError::Export(format!("unsupported format '{}'", other))),
    }
}
