//! Rendering and writing finished documents.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use weir_asyncapi::AsyncApiDocument;

use crate::error::{codes, EmitError};

/// Serialization format of an emitted document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl OutputFormat {
    /// Pick a format from a file extension (`.json`, `.yaml`, `.yml`).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(OutputFormat::Json),
            "yaml" | "yml" => Some(OutputFormat::Yaml),
            _ => None,
        }
    }

    /// Parse a format name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "yaml" | "yml" => Some(OutputFormat::Yaml),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        }
    }
}

/// Render a document as JSON or YAML text.
pub fn render(doc: &AsyncApiDocument, format: OutputFormat) -> Result<String, EmitError> {
    match format {
        OutputFormat::Json => {
            let mut out = serde_json::to_string_pretty(doc)?;
            out.push('\n');
            Ok(out)
        }
        OutputFormat::Yaml => Ok(serde_yaml::to_string(doc)?),
    }
}

/// Render and write a document, creating parent directories as needed.
pub fn write_document(
    path: &Path,
    doc: &AsyncApiDocument,
    format: OutputFormat,
) -> Result<(), EmitError> {
    let content = render(doc, format)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            EmitError::io(
                codes::IO_FAILED,
                format!("failed to create {}: {}", parent.display(), e),
            )
        })?;
    }
    std::fs::write(path, content.as_bytes()).map_err(|e| {
        EmitError::io(
            codes::IO_FAILED,
            format!("failed to write {}: {}", path.display(), e),
        )
        .with_context("path", path.display().to_string())
    })?;

    weir_telemetry::log_document_written!(
        path = %path.display(),
        format = format.extension(),
        bytes = content.len(),
        "document written"
    );
    Ok(())
}

/// Parse a JSON or YAML document into a generic value for validation.
pub fn parse_document(content: &str) -> Result<Value, EmitError> {
    serde_yaml::from_str(content).map_err(|e| {
        EmitError::validation(codes::CONTAINER_NOT_OBJECT, format!("failed to parse document: {}", e))
    })
}

/// Load a document from disk for validation.
pub fn read_document(path: &Path) -> Result<Value, EmitError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        EmitError::io(
            codes::IO_FAILED,
            format!("failed to read {}: {}", path.display(), e),
        )
        .with_context("path", path.display().to_string())
    })?;
    parse_document(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use weir_asyncapi::{Action, Channel, Info, OperationObject, Reference};

    fn sample() -> AsyncApiDocument {
        let mut doc = AsyncApiDocument::new(Info::new("Orders", "2.1.0").with_description("Order events"));
        doc.upsert_channel(
            "orders",
            Channel {
                address: Some("/orders".into()),
                ..Default::default()
            },
        );
        doc.operations.insert(
            "placeOrder".into(),
            OperationObject::new(Action::Send, Reference::channel("orders")),
        );
        doc
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(OutputFormat::from_path(Path::new("out/api.json")), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_path(Path::new("api.YML")), Some(OutputFormat::Yaml));
        assert_eq!(OutputFormat::from_path(Path::new("api.txt")), None);
        assert_eq!(OutputFormat::from_path(Path::new("api")), None);
    }

    #[test]
    fn json_then_yaml_round_trip_preserves_structure() {
        let doc = sample();

        let json = render(&doc, OutputFormat::Json).unwrap();
        let from_json: AsyncApiDocument = serde_json::from_str(&json).unwrap();
        let yaml = render(&from_json, OutputFormat::Yaml).unwrap();
        let from_yaml: AsyncApiDocument = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(from_yaml, doc);
        assert_eq!(parse_document(&yaml).unwrap(), doc.to_value().unwrap());
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/asyncapi.yaml");

        write_document(&path, &sample(), OutputFormat::Yaml).unwrap();

        let written = read_document(&path).unwrap();
        assert_eq!(written["asyncapi"], "3.0.0");
        assert_eq!(written["channels"]["orders"]["address"], "/orders");
    }

    #[test]
    fn reading_missing_file_is_io_error() {
        let err = read_document(Path::new("/nonexistent/asyncapi.yaml")).unwrap_err();
        assert_eq!(err.category, crate::error::ErrorCategory::Io);
    }
}
