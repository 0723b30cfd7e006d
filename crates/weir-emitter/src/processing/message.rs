use futures_util::future::join_all;
use serde_json::Value;

use weir_asyncapi::{AsyncApiDocument, MessageObject, Reference};
use weir_bindings::{BindingRequest, MessageContext, PluginRegistry, ProtocolBindingResult};

use super::{apply_extras, request_binding, StageReport};
use crate::config::EmitterConfig;
use crate::discovery::{MessageModel, TypeIndex};
use crate::error::{EmitError, EmitWarning};
use crate::schema::SchemaConverter;

struct MessageEntry {
    message: MessageObject,
    schema: Option<(String, Value)>,
    extras: Vec<ProtocolBindingResult>,
}

/// Turns message models into `components.messages` and `components.schemas` entries.
pub struct MessageProcessingService<'a> {
    registry: &'a PluginRegistry,
    converter: &'a dyn SchemaConverter,
    config: &'a EmitterConfig,
}

impl<'a> MessageProcessingService<'a> {
    pub fn new(
        registry: &'a PluginRegistry,
        converter: &'a dyn SchemaConverter,
        config: &'a EmitterConfig,
    ) -> Self {
        Self {
            registry,
            converter,
            config,
        }
    }

    pub async fn process(
        &self,
        models: &[MessageModel],
        types: &TypeIndex,
        doc: &mut AsyncApiDocument,
    ) -> StageReport {
        let prepared = join_all(models.iter().map(|model| self.prepare(model, types))).await;

        let mut report = StageReport::new("messages");
        for (model, (warnings, result)) in models.iter().zip(prepared) {
            for warning in warnings {
                report.warn(warning);
            }
            match result {
                Ok(entry) => {
                    let mut extra_warnings = Vec::new();
                    for extra in &entry.extras {
                        apply_extras(doc, extra, &mut extra_warnings);
                    }
                    if let Some((key, schema)) = entry.schema {
                        doc.components.schemas.insert(key, schema);
                    }
                    doc.components
                        .messages
                        .insert(model.name.clone(), entry.message);
                    for warning in extra_warnings {
                        report.warn(warning);
                    }
                    report.processed += 1;
                }
                Err(err) => report.fail(&model.id, err),
            }
        }
        report.finish()
    }

    async fn prepare(
        &self,
        model: &MessageModel,
        types: &TypeIndex,
    ) -> (Vec<EmitWarning>, Result<MessageEntry, EmitError>) {
        let mut warnings = Vec::new();
        let result = self.build_entry(model, types, &mut warnings).await;
        (warnings, result)
    }

    async fn build_entry(
        &self,
        model: &MessageModel,
        types: &TypeIndex,
        warnings: &mut Vec<EmitWarning>,
    ) -> Result<MessageEntry, EmitError> {
        let body = self.converter.convert(&model.model, types).await?;
        let schema = match body {
            Value::Null => None,
            body => Some((format!("{}Schema", model.name), body)),
        };

        let content_type = model
            .content_type
            .clone()
            .unwrap_or_else(|| self.config.default_content_type.clone());

        let mut message = MessageObject {
            name: Some(model.name.clone()),
            title: model.title.clone(),
            summary: model.summary.clone(),
            description: model.description.clone(),
            content_type: Some(content_type.clone()),
            payload: schema
                .as_ref()
                .map(|(key, _)| serde_json::to_value(Reference::schema(key)))
                .transpose()?,
            correlation_id: model.correlation_id.clone(),
            examples: model.examples.clone(),
            ..Default::default()
        };

        let mut extras = Vec::new();
        for (protocol, config) in &model.bindings {
            let ctx = MessageContext {
                name: model.name.clone(),
                content_type: content_type.clone(),
                config: Some(config.clone()),
            };
            if let Some(result) =
                request_binding(self.registry, protocol, BindingRequest::Message(&ctx), warnings)
                    .await?
            {
                message.bindings.extend(result.binding_values());
                extras.push(result);
            }
        }

        Ok(MessageEntry {
            message,
            schema,
            extras,
        })
    }
}
