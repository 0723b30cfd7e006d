//! Error taxonomy for the emission pipeline.
//!
//! Every failure is an [`EmitError`]: one struct with a [`ErrorCategory`]
//! discriminant, a stable `E2xxx` code and a `recoverable` flag. Non-fatal
//! findings are reported as [`EmitWarning`]s.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use weir_ast::SourceError;
use weir_bindings::PluginError;

/// Stable error and warning codes.
pub mod codes {
    /// Emitter configuration could not be loaded or is invalid.
    pub const CONFIG_INVALID: &str = "E2001";
    /// The host program could not be loaded.
    pub const SOURCE_INVALID: &str = "E2002";
    /// The document skeleton could not be built.
    pub const DOCUMENT_INIT_FAILED: &str = "E2003";

    /// A node carried metadata of the wrong shape and was skipped.
    pub const MALFORMED_NODE: &str = "E2010";
    /// An operation payload names a model that is not a message.
    pub const PAYLOAD_NOT_MESSAGE: &str = "E2011";

    /// An operation could not be turned into a channel and operation entry.
    pub const OPERATION_FAILED: &str = "E2020";

    /// A model refers back to itself.
    pub const CIRCULAR_REFERENCE: &str = "E2031";
    /// A type name does not resolve to a scalar or declared model.
    pub const UNKNOWN_TYPE: &str = "E2032";

    /// A plugin failed while generating a binding.
    pub const PLUGIN_FAILED: &str = "E2040";
    /// No plugin is registered for a protocol.
    pub const PROTOCOL_UNSUPPORTED: &str = "E2041";

    /// A security scheme type was not recognized; an apiKey header scheme was used.
    pub const SECURITY_FALLBACK: &str = "E2050";
    /// Two security configs mapped to the same scheme key.
    pub const SECURITY_KEY_COLLISION: &str = "E2051";
    /// A SASL mechanism is not supported.
    pub const SASL_MECHANISM_UNSUPPORTED: &str = "E2052";

    /// The assembled document failed validation.
    pub const VALIDATION_FAILED: &str = "E2060";
    pub const ASYNCAPI_MISSING: &str = "E2061";
    pub const ASYNCAPI_VERSION_MISMATCH: &str = "E2062";
    pub const INFO_MISSING: &str = "E2063";
    pub const INFO_FIELD_MISSING: &str = "E2064";
    pub const UNRESOLVED_CHANNEL_REF: &str = "E2065";
    pub const UNRESOLVED_MESSAGE_REF: &str = "E2066";
    pub const SERVER_FIELD_MISSING: &str = "E2067";
    pub const OPERATION_FIELD_MISSING: &str = "E2068";
    pub const CONTAINER_NOT_OBJECT: &str = "E2069";
    pub const EMPTY_CHANNELS: &str = "E2070";
    pub const EMPTY_OPERATIONS: &str = "E2071";

    /// File access failed.
    pub const IO_FAILED: &str = "E2080";
    /// Unclassified failure (serialization and the like).
    pub const SYSTEM: &str = "E2090";
}

/// Error category, serialized with the `_error` suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    #[serde(rename = "validation_error")]
    Validation,
    #[serde(rename = "type_error")]
    Type,
    #[serde(rename = "compilation_error")]
    Compilation,
    #[serde(rename = "io_error")]
    Io,
    #[serde(rename = "plugin_error")]
    Plugin,
    #[serde(rename = "configuration_error")]
    Configuration,
    #[serde(rename = "system_error")]
    System,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation_error",
            ErrorCategory::Type => "type_error",
            ErrorCategory::Compilation => "compilation_error",
            ErrorCategory::Io => "io_error",
            ErrorCategory::Plugin => "plugin_error",
            ErrorCategory::Configuration => "configuration_error",
            ErrorCategory::System => "system_error",
        }
    }

    /// Compilation and system errors abort a run; the rest do not.
    pub fn recoverable_by_default(&self) -> bool {
        !matches!(self, ErrorCategory::Compilation | ErrorCategory::System)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pipeline error.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct EmitError {
    pub category: ErrorCategory,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
    pub recoverable: bool,
}

impl EmitError {
    pub fn new(category: ErrorCategory, code: &str, message: impl Into<String>) -> Self {
        Self {
            category,
            code: code.to_string(),
            message: message.into(),
            details: None,
            timestamp: Utc::now(),
            context: BTreeMap::new(),
            recoverable: category.recoverable_by_default(),
        }
    }

    pub fn validation(code: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Validation, code, message)
    }

    pub fn type_error(code: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Type, code, message)
    }

    pub fn compilation(code: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Compilation, code, message)
    }

    pub fn io(code: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Io, code, message)
    }

    pub fn plugin(code: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Plugin, code, message)
    }

    pub fn configuration(code: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Configuration, code, message)
    }

    pub fn system(code: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::System, code, message)
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Override the category's default recoverability.
    pub fn with_recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    pub fn is_fatal(&self) -> bool {
        !self.recoverable
    }
}

impl From<SourceError> for EmitError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Io(e) => EmitError::io(codes::IO_FAILED, e.to_string()),
            other => EmitError::compilation(codes::SOURCE_INVALID, other.to_string()),
        }
    }
}

impl From<PluginError> for EmitError {
    fn from(err: PluginError) -> Self {
        let mut error = EmitError::plugin(codes::PLUGIN_FAILED, err.to_string());
        if let Some(protocol) = err.protocol() {
            error = error.with_context("protocol", protocol);
        }
        error
    }
}

impl From<std::io::Error> for EmitError {
    fn from(err: std::io::Error) -> Self {
        EmitError::io(codes::IO_FAILED, err.to_string())
    }
}

impl From<serde_json::Error> for EmitError {
    fn from(err: serde_json::Error) -> Self {
        EmitError::system(codes::SYSTEM, format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for EmitError {
    fn from(err: serde_yaml::Error) -> Self {
        EmitError::system(codes::SYSTEM, format!("YAML error: {}", err))
    }
}

/// A non-fatal finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitWarning {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl EmitWarning {
    pub fn new(code: &str, message: impl Into<String>, location: Option<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            location,
        }
    }
}

impl fmt::Display for EmitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{}: {} (at {})", self.code, self.message, location),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}
