//! The emission pipeline.
//!
//! Discovery → document skeleton → operations → messages → security →
//! server bindings → validation. Only discovery input and skeleton
//! construction can abort a run; element failures are recorded in the
//! stage reports.

use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use weir_ast::AstSource;
use weir_asyncapi::AsyncApiDocument;
use weir_bindings::PluginRegistry;

use crate::builder::DocumentBuilder;
use crate::config::EmitterConfig;
use crate::discovery::DiscoveryService;
use crate::error::{codes, EmitError};
use crate::processing::{
    MessageProcessingService, OperationProcessingService, SecurityProcessingService,
    ServerBindingService, StageReport,
};
use crate::schema::{JsonSchemaConverter, SchemaConverter};
use crate::validation::{ValidationResult, ValidationService};

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct EmitOutput {
    pub run_id: String,
    pub document: AsyncApiDocument,
    pub validation: ValidationResult,
    /// One report per stage, in pipeline order.
    pub reports: Vec<StageReport>,
}

impl EmitOutput {
    pub fn report(&self, stage: &str) -> Option<&StageReport> {
        self.reports.iter().find(|r| r.stage == stage)
    }

    /// Warnings from every stage.
    pub fn warning_count(&self) -> usize {
        self.reports.iter().map(|r| r.warnings.len()).sum::<usize>() + self.validation.warnings.len()
    }

    pub fn failure_count(&self) -> usize {
        self.reports.iter().map(|r| r.failures.len()).sum()
    }
}

/// Assembles AsyncAPI documents from an annotated program.
///
/// The registry lives as long as the emitter; build one emitter per run or
/// share it across runs with the same plugins.
pub struct Emitter {
    registry: PluginRegistry,
    config: EmitterConfig,
    converter: Box<dyn SchemaConverter>,
}

impl Emitter {
    /// An emitter with the built-in plugins and the JSON Schema converter.
    pub fn new(config: EmitterConfig) -> Self {
        Self {
            registry: PluginRegistry::with_builtins(),
            config,
            converter: Box::new(JsonSchemaConverter),
        }
    }

    pub fn with_registry(mut self, registry: PluginRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_converter(mut self, converter: Box<dyn SchemaConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Run the pipeline under a fresh run id.
    pub async fn emit(&self, source: &dyn AstSource) -> Result<EmitOutput, EmitError> {
        let run_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("emit", run_id = %run_id);
        self.emit_with_run_id(source, run_id).instrument(span).await
    }

    /// Run the pipeline under a caller-provided run id.
    pub async fn emit_with_run_id(
        &self,
        source: &dyn AstSource,
        run_id: String,
    ) -> Result<EmitOutput, EmitError> {
        let discovery = DiscoveryService::new().execute_discovery(source);
        let mut discovery_report = StageReport::new("discovery");
        discovery_report.processed = discovery.operations.len()
            + discovery.message_models.len()
            + discovery.security_configs.len();
        discovery_report.warnings = discovery.warnings.clone();

        let builder = DocumentBuilder::new();
        let servers = builder.server_declarations(source)?;
        let mut document = builder.build_document(source, &self.config, &servers)?;

        let operations = OperationProcessingService::new(&self.registry)
            .process(&discovery.operations, &mut document)
            .await;
        let messages =
            MessageProcessingService::new(&self.registry, self.converter.as_ref(), &self.config)
                .process(&discovery.message_models, &discovery.types, &mut document)
                .await;
        let security = SecurityProcessingService::new(self.config.security_scheme_key)
            .process(&discovery.security_configs, &mut document);
        let server_bindings = ServerBindingService::new(&self.registry)
            .process(&servers, &mut document)
            .await;

        let validation = ValidationService::new().validate_document(&document);

        tracing::info!(
            run_id = %run_id,
            valid = validation.valid,
            channels = document.channels.len(),
            operations = document.operations.len(),
            messages = document.components.messages.len(),
            "emission finished"
        );

        if !validation.valid && self.config.fail_on_invalid {
            let details = serde_json::to_value(&validation)?;
            return Err(EmitError::validation(
                codes::VALIDATION_FAILED,
                format!(
                    "generated document is invalid: {} error(s)",
                    validation.errors.len()
                ),
            )
            .with_details(details)
            .with_context("run_id", run_id)
            .with_recoverable(false));
        }

        Ok(EmitOutput {
            run_id,
            document,
            validation,
            reports: vec![discovery_report, operations, messages, security, server_bindings],
        })
    }
}
