//! Processing stages.
//!
//! Each service turns one discovered collection into document entries. The
//! per-element work runs concurrently; its results are applied to the
//! document one at a time, so inserts are last-write-wins per key. A failing
//! element is reported and skipped, never aborting its batch.

mod message;
mod operation;
mod security;
mod server;

pub use message::MessageProcessingService;
pub use operation::{channel_key, OperationProcessingService};
pub use security::{synthesize_scheme, SecurityProcessingService};
pub use server::ServerBindingService;

use serde::Serialize;

use weir_asyncapi::{AsyncApiDocument, Channel, OperationObject};
use weir_bindings::{BindingRequest, PluginRegistry, ProtocolBindingResult};

use crate::error::{codes, EmitError, EmitWarning};

/// Outcome of one processing stage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageReport {
    pub stage: String,
    /// Elements incorporated into the document.
    pub processed: usize,
    pub warnings: Vec<EmitWarning>,
    /// Elements that were skipped.
    pub failures: Vec<EmitError>,
}

impl StageReport {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            ..Default::default()
        }
    }

    /// Record a skipped element.
    pub(crate) fn fail(&mut self, element: &str, error: EmitError) {
        weir_telemetry::log_element_skipped!(
            stage = %self.stage,
            element = %element,
            code = %error.code,
            error = %error.message,
            "element skipped"
        );
        self.failures
            .push(error.with_context("element", element.to_string()));
    }

    pub(crate) fn warn(&mut self, warning: EmitWarning) {
        tracing::warn!(stage = %self.stage, code = %warning.code, "{}", warning.message);
        self.warnings.push(warning);
    }

    pub(crate) fn finish(self) -> Self {
        weir_telemetry::log_stage_completed!(
            stage = %self.stage,
            processed = self.processed,
            warnings = self.warnings.len(),
            failures = self.failures.len(),
            "stage completed"
        );
        self
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.failures.is_empty()
    }
}

/// Dispatch a binding request, turning "no plugin" into a warning.
pub(crate) async fn request_binding(
    registry: &PluginRegistry,
    protocol: &str,
    request: BindingRequest<'_>,
    warnings: &mut Vec<EmitWarning>,
) -> Result<Option<ProtocolBindingResult>, EmitError> {
    if !registry.is_supported(protocol) {
        warnings.push(EmitWarning::new(
            codes::PROTOCOL_UNSUPPORTED,
            format!(
                "no plugin registered for protocol '{}', {} binding skipped",
                protocol,
                request.kind()
            ),
            Some(request.subject().to_string()),
        ));
    }
    match registry.generate(protocol, request).await {
        Ok(result) => Ok(result),
        Err(err) => {
            weir_telemetry::log_plugin_failed!(
                protocol = %protocol,
                kind = %request.kind(),
                element = %request.subject(),
                error = %err,
                "binding generation failed"
            );
            Err(err.into())
        }
    }
}

/// Merge the extra channel, operation and schema fragments a plugin
/// contributed. Fragments that do not deserialize are reported as warnings.
pub(crate) fn apply_extras(
    doc: &mut AsyncApiDocument,
    result: &ProtocolBindingResult,
    warnings: &mut Vec<EmitWarning>,
) {
    for (key, fragment) in &result.channels {
        match serde_json::from_value::<Channel>(fragment.clone()) {
            Ok(channel) => doc.upsert_channel(key, channel),
            Err(e) => warnings.push(EmitWarning::new(
                codes::PLUGIN_FAILED,
                format!("plugin channel fragment '{}' is invalid: {}", key, e),
                None,
            )),
        }
    }
    for (key, fragment) in &result.operations {
        match serde_json::from_value::<OperationObject>(fragment.clone()) {
            Ok(operation) => {
                doc.operations.insert(key.clone(), operation);
            }
            Err(e) => warnings.push(EmitWarning::new(
                codes::PLUGIN_FAILED,
                format!("plugin operation fragment '{}' is invalid: {}", key, e),
                None,
            )),
        }
    }
    for (key, schema) in &result.components {
        doc.components.schemas.insert(key.clone(), schema.clone());
    }
}
