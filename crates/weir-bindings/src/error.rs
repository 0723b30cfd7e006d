//! Error types for protocol plugins.

use thiserror::Error;

use crate::plugin::BindingKind;

/// Errors a plugin invocation can produce.
///
/// All of them are isolated to the element being processed; none aborts a run.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The plugin was asked for a binding kind it does not generate.
    #[error("protocol '{protocol}' does not support {kind} bindings")]
    Unsupported {
        protocol: String,
        kind: BindingKind,
    },

    /// The binding configuration failed the plugin's schema.
    #[error("invalid {protocol} binding configuration: {message}")]
    InvalidConfig { protocol: String, message: String },

    /// Config schema could not be compiled.
    #[error("failed to compile config schema: {0}")]
    SchemaParse(String),

    /// The plugin returned an error while generating a binding.
    #[error("{protocol} plugin failed to generate {kind} binding: {message}")]
    Generation {
        protocol: String,
        kind: BindingKind,
        message: String,
    },

    /// The plugin panicked.
    #[error("{protocol} plugin panicked: {message}")]
    Panicked { protocol: String, message: String },
}

impl PluginError {
    /// The protocol this error belongs to, when known.
    pub fn protocol(&self) -> Option<&str> {
        match self {
            PluginError::Unsupported { protocol, .. }
            | PluginError::InvalidConfig { protocol, .. }
            | PluginError::Generation { protocol, .. }
            | PluginError::Panicked { protocol, .. } => Some(protocol),
            PluginError::SchemaParse(_) => None,
        }
    }
}
