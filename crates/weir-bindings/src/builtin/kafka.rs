//! Kafka bindings.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::string_schema;
use crate::error::PluginError;
use crate::plugin::{
    copy_field, BindingFragment, BindingKind, Capabilities, ChannelContext, MessageContext,
    OperationContext, ProtocolPlugin, ServerContext,
};
use crate::schema::validate_against;

const BINDING_VERSION: &str = "0.5.0";

/// Kafka protocol plugin.
pub struct KafkaPlugin;

impl KafkaPlugin {
    fn config_schema(kind: BindingKind) -> Value {
        match kind {
            BindingKind::Channel | BindingKind::Operation => json!({
                "type": "object",
                "properties": {
                    "topic": { "type": "string", "minLength": 1 },
                    "partitions": { "type": "integer", "minimum": 1 },
                    "replicas": { "type": "integer", "minimum": 1 },
                    "topicConfiguration": { "type": "object" },
                    "groupId": { "type": "string" },
                    "clientId": { "type": "string" }
                }
            }),
            BindingKind::Message => json!({
                "type": "object",
                "properties": {
                    "key": { "type": "object" },
                    "schemaIdLocation": { "type": "string", "enum": ["header", "payload"] },
                    "schemaIdPayloadEncoding": { "type": "string" },
                    "schemaLookupStrategy": { "type": "string" }
                }
            }),
            BindingKind::Server => json!({
                "type": "object",
                "properties": {
                    "schemaRegistryUrl": { "type": "string" },
                    "schemaRegistryVendor": { "type": "string" }
                }
            }),
            BindingKind::ConfigValidation => json!({ "type": "object" }),
        }
    }
}

#[async_trait]
impl ProtocolPlugin for KafkaPlugin {
    fn name(&self) -> &str {
        "kafka"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn binding_version(&self) -> &str {
        BINDING_VERSION
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new([
            BindingKind::Operation,
            BindingKind::Message,
            BindingKind::Server,
            BindingKind::Channel,
            BindingKind::ConfigValidation,
        ])
    }

    async fn generate_operation_binding(
        &self,
        op: &OperationContext,
    ) -> Result<BindingFragment, PluginError> {
        let config = op.config.as_ref();
        let mut fragment = BindingFragment::new();
        fragment.insert(
            "groupId".into(),
            string_schema(config.and_then(|c| c.get("groupId"))),
        );
        fragment.insert(
            "clientId".into(),
            string_schema(config.and_then(|c| c.get("clientId"))),
        );
        Ok(fragment)
    }

    async fn generate_channel_binding(
        &self,
        channel: &ChannelContext,
    ) -> Result<BindingFragment, PluginError> {
        let config = channel.config.as_ref();
        let mut fragment = BindingFragment::new();
        let topic = config
            .and_then(|c| c.get("topic"))
            .cloned()
            .unwrap_or_else(|| Value::String(channel.name.clone()));
        fragment.insert("topic".into(), topic);
        for key in ["partitions", "replicas", "topicConfiguration"] {
            copy_field(&mut fragment, config, key);
        }
        Ok(fragment)
    }

    async fn generate_message_binding(
        &self,
        msg: &MessageContext,
    ) -> Result<BindingFragment, PluginError> {
        let config = msg.config.as_ref();
        let mut fragment = BindingFragment::new();
        let key = config
            .and_then(|c| c.get("key"))
            .cloned()
            .unwrap_or_else(|| string_schema(None));
        fragment.insert("key".into(), key);
        for key in [
            "schemaIdLocation",
            "schemaIdPayloadEncoding",
            "schemaLookupStrategy",
        ] {
            copy_field(&mut fragment, config, key);
        }
        Ok(fragment)
    }

    async fn generate_server_binding(
        &self,
        server: &ServerContext,
    ) -> Result<BindingFragment, PluginError> {
        let mut fragment = BindingFragment::new();
        for key in ["schemaRegistryUrl", "schemaRegistryVendor"] {
            copy_field(&mut fragment, server.config.as_ref(), key);
        }
        Ok(fragment)
    }

    async fn validate_config(&self, kind: BindingKind, config: &Value) -> Result<(), PluginError> {
        validate_against(self.name(), &Self::config_schema(kind), config)
    }
}
