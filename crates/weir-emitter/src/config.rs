//! Emitter configuration (`weir.yaml`).
//!
//! Everything is optional; a missing key falls back to its default. Document
//! `info` fields set here are overridden by `info` metadata on the program's
//! root namespace.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{codes, EmitError};
use crate::output::OutputFormat;

pub const DEFAULT_TITLE: &str = "AsyncAPI";
pub const DEFAULT_VERSION: &str = "1.0.0";
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// `info` overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InfoConfig {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// How entries in `components.securitySchemes` are keyed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecuritySchemeKey {
    /// By the scheme's declared type (`oauth2`, `apiKey`, ...).
    #[default]
    Type,
    /// By the security config's declared name.
    Name,
}

/// Emitter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmitterConfig {
    pub info: InfoConfig,
    pub output: OutputConfig,
    /// Turn a failed validation into an error instead of a report.
    pub fail_on_invalid: bool,
    pub security_scheme_key: SecuritySchemeKey,
    /// `contentType` for messages that declare none.
    pub default_content_type: String,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            info: InfoConfig::default(),
            output: OutputConfig::default(),
            fail_on_invalid: false,
            security_scheme_key: SecuritySchemeKey::default(),
            default_content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }
}

impl EmitterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self, EmitError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EmitError::configuration(
                codes::CONFIG_INVALID,
                format!("failed to read {}: {}", path.display(), e),
            )
            .with_context("path", path.display().to_string())
        })?;

        Self::from_yaml_str(&content).map_err(|e| e.with_context("path", path.display().to_string()))
    }

    /// Parse a configuration from YAML content. An empty document yields the defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self, EmitError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_yaml::from_str(content).map_err(|e| {
            EmitError::configuration(codes::CONFIG_INVALID, format!("failed to parse config: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), EmitError> {
        if self.default_content_type.trim().is_empty() {
            return Err(EmitError::configuration(
                codes::CONFIG_INVALID,
                "default_content_type must not be empty",
            ));
        }
        for (field, value) in [("title", &self.info.title), ("version", &self.info.version)] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(EmitError::configuration(
                    codes::CONFIG_INVALID,
                    format!("info.{} must not be empty", field),
                ));
            }
        }
        Ok(())
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.info.title = Some(title.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.info.version = Some(version.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.info.description = Some(description.into());
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output.format = format;
        self
    }

    pub fn with_fail_on_invalid(mut self, fail: bool) -> Self {
        self.fail_on_invalid = fail;
        self
    }

    pub fn with_security_scheme_key(mut self, key: SecuritySchemeKey) -> Self {
        self.security_scheme_key = key;
        self
    }

    pub fn with_default_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.default_content_type = content_type.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = EmitterConfig::default();
        assert!(!config.fail_on_invalid);
        assert_eq!(config.security_scheme_key, SecuritySchemeKey::Type);
        assert_eq!(config.default_content_type, "application/json");
        assert_eq!(config.output.format, OutputFormat::Yaml);
        assert!(config.info.title.is_none());
    }

    #[test]
    fn parse_full_config() {
        let config = EmitterConfig::from_yaml_str(
            r#"
info:
  title: Orders
  version: 2.0.0
  description: Order events
output:
  format: json
fail_on_invalid: true
security_scheme_key: name
default_content_type: application/avro
"#,
        )
        .unwrap();

        assert_eq!(config.info.title.as_deref(), Some("Orders"));
        assert_eq!(config.info.version.as_deref(), Some("2.0.0"));
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.fail_on_invalid);
        assert_eq!(config.security_scheme_key, SecuritySchemeKey::Name);
        assert_eq!(config.default_content_type, "application/avro");
    }

    #[test]
    fn empty_config_is_default() {
        assert_eq!(EmitterConfig::from_yaml_str("").unwrap(), EmitterConfig::default());
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = EmitterConfig::from_yaml_str("fail_on_invalidd: true").unwrap_err();
        assert_eq!(err.category, ErrorCategory::Configuration);
        assert_eq!(err.code, codes::CONFIG_INVALID);
    }

    #[test]
    fn empty_content_type_is_rejected() {
        assert!(EmitterConfig::from_yaml_str("default_content_type: ''").is_err());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "info:\n  title: From File").unwrap();

        let config = EmitterConfig::load(file.path()).unwrap();
        assert_eq!(config.info.title.as_deref(), Some("From File"));
    }

    #[test]
    fn missing_file_is_configuration_error() {
        let err = EmitterConfig::load(Path::new("/nonexistent/weir.yaml")).unwrap_err();
        assert_eq!(err.category, ErrorCategory::Configuration);
        assert!(err.context.contains_key("path"));
    }

    #[test]
    fn builder() {
        let config = EmitterConfig::new()
            .with_title("Built")
            .with_version("0.1.0")
            .with_fail_on_invalid(true)
            .with_security_scheme_key(SecuritySchemeKey::Name)
            .with_output_format(OutputFormat::Json);
        assert_eq!(config.info.title.as_deref(), Some("Built"));
        assert!(config.fail_on_invalid);
        assert_eq!(config.output.format, OutputFormat::Json);
    }
}
