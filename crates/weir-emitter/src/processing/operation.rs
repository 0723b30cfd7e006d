use futures_util::future::join_all;

use weir_asyncapi::{AsyncApiDocument, Channel, ChannelParameter, OperationObject, Reference};
use weir_bindings::{
    BindingRequest, ChannelContext, OperationContext, PluginRegistry, ProtocolBindingResult,
};

use super::{apply_extras, request_binding, StageReport};
use crate::discovery::Operation;
use crate::error::{codes, EmitError, EmitWarning};

/// Sanitize a channel path into a document key.
///
/// Lowercases, maps `/` and every character outside `[a-z0-9_-]` to `_`,
/// collapses repeated underscores and trims them from both ends.
pub fn channel_key(path: &str) -> String {
    let mut key = String::with_capacity(path.len());
    for c in path.to_lowercase().chars() {
        let c = match c {
            'a'..='z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        };
        if c == '_' && key.ends_with('_') {
            continue;
        }
        key.push(c);
    }
    key.trim_matches('_').to_string()
}

/// `{name}` placeholders in a channel address.
fn address_parameters(address: &str) -> Vec<String> {
    let mut params = Vec::new();
    let mut rest = address;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start + 1..].find('}') else {
            break;
        };
        let name = &rest[start + 1..start + 1 + len];
        if !name.is_empty() && !params.iter().any(|p| p == name) {
            params.push(name.to_string());
        }
        rest = &rest[start + 1 + len + 1..];
    }
    params
}

struct OperationEntry {
    channel_key: String,
    channel: Channel,
    operation: OperationObject,
    extras: Vec<ProtocolBindingResult>,
}

/// Turns discovered operations into channel and operation entries.
pub struct OperationProcessingService<'a> {
    registry: &'a PluginRegistry,
}

impl<'a> OperationProcessingService<'a> {
    pub fn new(registry: &'a PluginRegistry) -> Self {
        Self { registry }
    }

    pub async fn process(&self, operations: &[Operation], doc: &mut AsyncApiDocument) -> StageReport {
        let prepared = join_all(operations.iter().map(|op| self.prepare(op))).await;

        let mut report = StageReport::new("operations");
        for (op, (warnings, result)) in operations.iter().zip(prepared) {
            for warning in warnings {
                report.warn(warning);
            }
            match result {
                Ok(entry) => {
                    // plugin fragments merge into the operation's own channel
                    doc.upsert_channel(&entry.channel_key, entry.channel);
                    doc.operations.insert(op.name.clone(), entry.operation);
                    let mut extra_warnings = Vec::new();
                    for extra in &entry.extras {
                        apply_extras(doc, extra, &mut extra_warnings);
                    }
                    for warning in extra_warnings {
                        report.warn(warning);
                    }
                    report.processed += 1;
                }
                Err(err) => report.fail(&op.id, err),
            }
        }
        report.finish()
    }

    async fn prepare(&self, op: &Operation) -> (Vec<EmitWarning>, Result<OperationEntry, EmitError>) {
        let mut warnings = Vec::new();
        let result = self.build_entry(op, &mut warnings).await;
        (warnings, result)
    }

    async fn build_entry(
        &self,
        op: &Operation,
        warnings: &mut Vec<EmitWarning>,
    ) -> Result<OperationEntry, EmitError> {
        let address = match &op.channel {
            Some(path) => path.clone(),
            None => format!("/{}", op.name.to_lowercase()),
        };
        let key = channel_key(&address);
        if key.is_empty() {
            return Err(EmitError::validation(
                codes::OPERATION_FAILED,
                format!("channel path '{}' yields an empty channel key", address),
            ));
        }

        let mut channel = Channel {
            address: Some(address.clone()),
            ..Default::default()
        };
        for name in address_parameters(&address) {
            let description = op
                .parameters
                .iter()
                .find(|p| p.name == name)
                .and_then(|p| p.doc.clone());
            channel.parameters.insert(
                name,
                ChannelParameter {
                    description,
                    ..Default::default()
                },
            );
        }

        let action = op.direction.action();
        let mut operation = OperationObject::new(action, Reference::channel(&key));
        operation.description = op.doc.clone();

        if let Some(message) = &op.message {
            channel
                .messages
                .insert(message.clone(), Reference::component_message(message));
            operation
                .messages
                .push(Reference::channel_message(&key, message));
        }

        let mut extras = Vec::new();
        if let Some(protocol) = &op.protocol {
            let config = op.bindings.get(protocol).cloned();

            let op_ctx = OperationContext {
                name: op.name.clone(),
                action,
                channel: key.clone(),
                config: config.clone(),
            };
            if let Some(result) =
                request_binding(self.registry, protocol, BindingRequest::Operation(&op_ctx), warnings)
                    .await?
            {
                operation.bindings.extend(result.binding_values());
                extras.push(result);
            }

            let channel_ctx = ChannelContext {
                name: key.clone(),
                address,
                operation: op.name.clone(),
                config,
            };
            if let Some(result) =
                request_binding(self.registry, protocol, BindingRequest::Channel(&channel_ctx), warnings)
                    .await?
            {
                channel.bindings.extend(result.binding_values());
                extras.push(result);
            }
        }

        Ok(OperationEntry {
            channel_key: key,
            channel,
            operation,
            extras,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::Direction;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use weir_asyncapi::{Action, Info};
    use weir_bindings::{BindingFragment, BindingKind, Capabilities, PluginError, ProtocolPlugin};

    fn operation(name: &str) -> Operation {
        Operation {
            id: format!("Acme.{}", name),
            name: name.into(),
            namespace: "Acme".into(),
            direction: Direction::Publish,
            channel: None,
            protocol: None,
            bindings: BTreeMap::new(),
            doc: None,
            parameters: Vec::new(),
            message: None,
        }
    }

    fn doc() -> AsyncApiDocument {
        AsyncApiDocument::new(Info::new("Test", "1.0.0"))
    }

    #[test]
    fn channel_key_sanitization() {
        assert_eq!(channel_key("/publishuserevent"), "publishuserevent");
        assert_eq!(channel_key("/Orders/{id}/Lines"), "orders_id_lines");
        assert_eq!(channel_key("user.events//created"), "user_events_created");
        assert_eq!(channel_key("/"), "");
    }

    #[test]
    fn address_parameter_extraction() {
        assert_eq!(address_parameters("/orders/{id}/lines/{line}"), vec!["id", "line"]);
        assert!(address_parameters("/orders/{").is_empty());
    }

    #[tokio::test]
    async fn publish_operation_without_channel() {
        let registry = PluginRegistry::with_builtins();
        let mut doc = doc();
        let report = OperationProcessingService::new(&registry)
            .process(&[operation("publishUserEvent")], &mut doc)
            .await;

        assert_eq!(report.processed, 1);
        assert!(report.is_clean());
        assert_eq!(
            doc.channels["publishuserevent"].address.as_deref(),
            Some("/publishuserevent")
        );
        let value = doc.to_value().unwrap();
        assert_eq!(
            value["operations"]["publishUserEvent"],
            json!({"action": "send", "channel": {"$ref": "#/channels/publishuserevent"}})
        );
    }

    #[tokio::test]
    async fn kafka_topic_lands_in_channel_binding() {
        let registry = PluginRegistry::with_builtins();
        let mut op = operation("placeOrder");
        op.protocol = Some("kafka".into());
        op.bindings.insert("kafka".into(), json!({"topic": "orders"}));

        let mut doc = doc();
        OperationProcessingService::new(&registry)
            .process(&[op], &mut doc)
            .await;

        let kafka = &doc.channels["placeorder"].bindings["kafka"];
        assert_eq!(kafka["bindingVersion"], "0.5.0");
        assert_eq!(kafka["topic"], "orders");
        assert_eq!(
            doc.operations["placeOrder"].bindings["kafka"]["groupId"],
            json!({"type": "string"})
        );
    }

    #[tokio::test]
    async fn processing_twice_is_idempotent() {
        let registry = PluginRegistry::with_builtins();
        let mut op = operation("onOrder");
        op.direction = Direction::Subscribe;
        op.channel = Some("/orders/{id}".into());
        op.message = Some("OrderPlaced".into());

        let service = OperationProcessingService::new(&registry);
        let mut doc = doc();
        service.process(std::slice::from_ref(&op), &mut doc).await;
        let once = doc.clone();
        service.process(&[op.clone(), op], &mut doc).await;

        assert_eq!(doc, once);
        assert_eq!(doc.channels.len(), 1);
        assert_eq!(doc.operations.len(), 1);
        let operation = &doc.operations["onOrder"];
        assert_eq!(operation.action, Action::Receive);
        assert_eq!(
            operation.messages[0].reference,
            "#/channels/orders_id/messages/OrderPlaced"
        );
        assert!(doc.channels["orders_id"].parameters.contains_key("id"));
    }

    #[tokio::test]
    async fn operations_sharing_a_channel_merge_messages() {
        let registry = PluginRegistry::with_builtins();
        let mut created = operation("created");
        created.channel = Some("/users".into());
        created.message = Some("UserCreated".into());
        let mut deleted = operation("deleted");
        deleted.channel = Some("/users".into());
        deleted.message = Some("UserDeleted".into());

        let mut doc = doc();
        let report = OperationProcessingService::new(&registry)
            .process(&[created, deleted], &mut doc)
            .await;

        assert_eq!(report.processed, 2);
        let messages = &doc.channels["users"].messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages["UserDeleted"].reference,
            "#/components/messages/UserDeleted"
        );
    }

    struct RelayPlugin;

    #[async_trait]
    impl ProtocolPlugin for RelayPlugin {
        fn name(&self) -> &str {
            "relay"
        }

        fn version(&self) -> &str {
            "0.1.0"
        }

        fn binding_version(&self) -> &str {
            "0.1.0"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::new([BindingKind::Channel])
        }

        async fn generate_channel_binding(
            &self,
            _channel: &ChannelContext,
        ) -> Result<BindingFragment, PluginError> {
            let mut fragment = BindingFragment::new();
            fragment.insert("queue".into(), json!("events"));
            Ok(fragment)
        }

        async fn generate_extras(
            &self,
            request: BindingRequest<'_>,
        ) -> Result<ProtocolBindingResult, PluginError> {
            let mut extras = ProtocolBindingResult::default();
            if let BindingRequest::Channel(ctx) = request {
                extras.channels.insert(
                    ctx.name.clone(),
                    json!({"address": "/relay/elsewhere", "title": "Relay"}),
                );
            }
            Ok(extras)
        }
    }

    #[tokio::test]
    async fn plugin_channel_fragment_keeps_operation_address() {
        let mut registry = PluginRegistry::new();
        registry.register(Arc::new(RelayPlugin));
        let mut op = operation("publishEvent");
        op.protocol = Some("relay".into());

        let mut doc = doc();
        let report = OperationProcessingService::new(&registry)
            .process(&[op], &mut doc)
            .await;

        assert!(report.is_clean(), "{:?}", report);
        let channel = &doc.channels["publishevent"];
        assert_eq!(channel.address.as_deref(), Some("/publishevent"));
        assert_eq!(channel.title.as_deref(), Some("Relay"));
        assert_eq!(channel.bindings["relay"]["queue"], "events");
        assert_eq!(channel.bindings["relay"]["bindingVersion"], "0.1.0");
    }

    #[tokio::test]
    async fn bad_elements_are_skipped_and_reported() {
        let registry = PluginRegistry::with_builtins();
        let mut slash = operation("root");
        slash.channel = Some("/".into());
        let mut invalid = operation("badConfig");
        invalid.protocol = Some("kafka".into());
        invalid.bindings.insert("kafka".into(), json!({"partitions": "many"}));
        let mut unknown = operation("mqttPublish");
        unknown.protocol = Some("mqtt".into());

        let mut doc = doc();
        let report = OperationProcessingService::new(&registry)
            .process(&[slash, invalid, unknown, operation("fine")], &mut doc)
            .await;

        assert_eq!(report.processed, 2);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].code, codes::OPERATION_FAILED);
        assert_eq!(report.failures[1].code, codes::PLUGIN_FAILED);
        assert!(report
            .warnings
            .iter()
            .any(|w| w.code == codes::PROTOCOL_UNSUPPORTED));
        assert!(doc.operations.contains_key("mqttPublish"));
        assert!(doc.channels["mqttpublish"].bindings.is_empty());
    }
}
