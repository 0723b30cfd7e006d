//! WebSocket bindings.
//!
//! The WebSocket bindings define no operation-level object, so operation
//! requests always produce an empty fragment.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::PluginError;
use crate::plugin::{
    copy_field, BindingFragment, BindingKind, Capabilities, ChannelContext, MessageContext,
    OperationContext, ProtocolPlugin, ServerContext,
};
use crate::schema::validate_against;

const BINDING_VERSION: &str = "0.1.0";

/// WebSocket protocol plugin, registered as `ws`.
pub struct WebSocketPlugin;

impl WebSocketPlugin {
    fn config_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "method": { "type": "string", "enum": ["GET", "POST"] },
                "query": { "type": "object" },
                "headers": { "type": "object" },
                "subprotocol": { "type": "string" }
            }
        })
    }

    fn handshake(config: Option<&Value>) -> BindingFragment {
        let mut fragment = BindingFragment::new();
        fragment.insert(
            "method".into(),
            config
                .and_then(|c| c.get("method"))
                .cloned()
                .unwrap_or_else(|| Value::String("GET".into())),
        );
        copy_field(&mut fragment, config, "subprotocol");
        fragment
    }
}

#[async_trait]
impl ProtocolPlugin for WebSocketPlugin {
    fn name(&self) -> &str {
        "ws"
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
        _op: &OperationContext,
    ) -> Result<BindingFragment, PluginError> {
        Ok(BindingFragment::new())
    }

    async fn generate_channel_binding(
        &self,
        channel: &ChannelContext,
    ) -> Result<BindingFragment, PluginError> {
        let mut fragment = BindingFragment::new();
        for key in ["method", "query", "headers"] {
            copy_field(&mut fragment, channel.config.as_ref(), key);
        }
        Ok(fragment)
    }

    async fn generate_message_binding(
        &self,
        msg: &MessageContext,
    ) -> Result<BindingFragment, PluginError> {
        Ok(Self::handshake(msg.config.as_ref()))
    }

    async fn generate_server_binding(
        &self,
        server: &ServerContext,
    ) -> Result<BindingFragment, PluginError> {
        Ok(Self::handshake(server.config.as_ref()))
    }

    async fn validate_config(&self, _kind: BindingKind, config: &Value) -> Result<(), PluginError> {
        validate_against(self.name(), &Self::config_schema(), config)
    }
}
