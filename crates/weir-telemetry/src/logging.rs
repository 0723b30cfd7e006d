//! Structured logging with JSON or pretty output.

use crate::{LogFormat, TelemetryConfig, TelemetryError};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the logging subsystem.
///
/// Sets up tracing-subscriber with either JSON or pretty format,
/// respecting the configured log level. `RUST_LOG` takes precedence.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let writer = if config.to_stderr {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(std::io::stdout)
    };

    match config.log_format {
        LogFormat::Json => init_json_logging(filter, writer),
        LogFormat::Pretty => init_pretty_logging(filter, writer),
    }
}

fn init_json_logging(filter: EnvFilter, writer: BoxMakeWriter) -> Result<(), TelemetryError> {
    let json_layer = fmt::layer()
        .json()
        .with_writer(writer)
        .with_target(true)
        .with_current_span(true)
        .with_span_list(false)
        .with_file(false)
        .with_line_number(false)
        .flatten_event(true)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(json_layer)
        .try_init()
        .map_err(|e: tracing_subscriber::util::TryInitError| {
            TelemetryError::LoggingInit(e.to_string())
        })
}

fn init_pretty_logging(filter: EnvFilter, writer: BoxMakeWriter) -> Result<(), TelemetryError> {
    let pretty_layer = fmt::layer()
        .compact()
        .with_writer(writer)
        .with_target(false)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(pretty_layer)
        .try_init()
        .map_err(|e: tracing_subscriber::util::TryInitError| {
            TelemetryError::LoggingInit(e.to_string())
        })
}

/// Standard log event names.
pub mod events {
    /// Discovery walked the AST.
    pub const DISCOVERY_COMPLETED: &str = "discovery_completed";

    /// The document skeleton was created.
    pub const DOCUMENT_INITIALIZED: &str = "document_initialized";

    /// A processing stage finished its batch.
    pub const STAGE_COMPLETED: &str = "stage_completed";

    /// An element was dropped from a batch.
    pub const ELEMENT_SKIPPED: &str = "element_skipped";

    /// A protocol plugin was registered.
    pub const PLUGIN_REGISTERED: &str = "plugin_registered";

    /// A protocol plugin replaced an earlier registration.
    pub const PLUGIN_REPLACED: &str = "plugin_replaced";

    /// A plugin does not support the requested binding kind, or the protocol is unknown.
    pub const BINDING_UNSUPPORTED: &str = "binding_unsupported";

    /// A plugin failed while generating a binding.
    pub const PLUGIN_FAILED: &str = "plugin_failed";

    /// The assembled document failed validation.
    pub const VALIDATION_FAILURE: &str = "validation_failure";

    /// The document was written to its destination.
    pub const DOCUMENT_WRITTEN: &str = "document_written";
}

#[macro_export]
macro_rules! log_discovery_completed {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::DISCOVERY_COMPLETED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_document_initialized {
    ($($field:tt)*) => {
        tracing::debug!(
            event = $crate::logging::events::DOCUMENT_INITIALIZED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_stage_completed {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::STAGE_COMPLETED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_element_skipped {
    ($($field:tt)*) => {
        tracing::warn!(
            event = $crate::logging::events::ELEMENT_SKIPPED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_plugin_registered {
    ($($field:tt)*) => {
        tracing::debug!(
            event = $crate::logging::events::PLUGIN_REGISTERED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_plugin_replaced {
    ($($field:tt)*) => {
        tracing::warn!(
            event = $crate::logging::events::PLUGIN_REPLACED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_binding_unsupported {
    ($($field:tt)*) => {
        tracing::debug!(
            event = $crate::logging::events::BINDING_UNSUPPORTED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_plugin_failed {
    ($($field:tt)*) => {
        tracing::error!(
            event = $crate::logging::events::PLUGIN_FAILED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_validation_failure {
    ($($field:tt)*) => {
        tracing::warn!(
            event = $crate::logging::events::VALIDATION_FAILURE,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_document_written {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::DOCUMENT_WRITTEN,
            $($field)*
        )
    };
}
