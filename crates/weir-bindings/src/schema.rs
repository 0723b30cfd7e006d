//! Config schema validation for binding configuration blocks.
//!
//! Each built-in plugin declares a JSON Schema for the configuration block
//! it reads out of the host program's `bindings` metadata.

use jsonschema::Validator;
use serde_json::Value;

use crate::error::PluginError;

/// A compiled config schema.
pub struct ConfigSchema {
    validator: Validator,
}

impl ConfigSchema {
    /// Create a config schema from a parsed JSON value.
    pub fn from_value(schema: &Value) -> Result<Self, PluginError> {
        let validator = Validator::new(schema)
            .map_err(|e| PluginError::SchemaParse(format!("invalid JSON Schema: {}", e)))?;

        Ok(Self { validator })
    }

    /// Validate a config block against the schema. Every violation is
    /// listed in the error message, prefixed with its instance path.
    pub fn validate(&self, protocol: &str, config: &Value) -> Result<(), PluginError> {
        let reasons: Vec<String> = self
            .validator
            .iter_errors(config)
            .map(|e| format!("{}: {}", e.instance_path, e))
            .collect();
        if reasons.is_empty() {
            return Ok(());
        }
        Err(PluginError::InvalidConfig {
            protocol: protocol.to_string(),
            message: reasons.join("; "),
        })
    }
}

/// Compile `schema` and validate `config` against it in one step.
pub fn validate_against(protocol: &str, schema: &Value, config: &Value) -> Result<(), PluginError> {
    ConfigSchema::from_value(schema)?.validate(protocol, config)
}
