//! HTTP bindings.

use async_trait::async_trait;
use serde_json::{json, Value};
use weir_asyncapi::Action;

use crate::error::PluginError;
use crate::plugin::{
    copy_field, BindingFragment, BindingKind, Capabilities, MessageContext, OperationContext,
    ProtocolPlugin,
};
use crate::schema::validate_against;

const BINDING_VERSION: &str = "0.3.0";

const METHODS: [&str; 9] = [
    "GET", "PUT", "POST", "PATCH", "DELETE", "HEAD", "OPTIONS", "CONNECT", "TRACE",
];

/// HTTP protocol plugin.
pub struct HttpPlugin;

impl HttpPlugin {
    fn config_schema(kind: BindingKind) -> Value {
        match kind {
            BindingKind::Operation => json!({
                "type": "object",
                "properties": {
                    "method": { "type": "string", "enum": METHODS },
                    "type": { "type": "string", "enum": ["request", "response"] }
                }
            }),
            BindingKind::Message => json!({
                "type": "object",
                "properties": {
                    "headers": { "type": "object" },
                    "statusCode": { "type": "integer", "minimum": 100, "maximum": 599 }
                }
            }),
            _ => json!({ "type": "object" }),
        }
    }
}

#[async_trait]
impl ProtocolPlugin for HttpPlugin {
    fn name(&self) -> &str {
        "http"
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
            BindingKind::ConfigValidation,
        ])
    }

    async fn generate_operation_binding(
        &self,
        op: &OperationContext,
    ) -> Result<BindingFragment, PluginError> {
        let config = op.config.as_ref();
        let (method, kind) = match op.action {
            Action::Send => ("POST", "request"),
            Action::Receive => ("GET", "response"),
        };

        let mut fragment = BindingFragment::new();
        fragment.insert(
            "method".into(),
            config
                .and_then(|c| c.get("method"))
                .cloned()
                .unwrap_or_else(|| Value::String(method.into())),
        );
        fragment.insert(
            "type".into(),
            config
                .and_then(|c| c.get("type"))
                .cloned()
                .unwrap_or_else(|| Value::String(kind.into())),
        );
        Ok(fragment)
    }

    async fn generate_message_binding(
        &self,
        msg: &MessageContext,
    ) -> Result<BindingFragment, PluginError> {
        let mut fragment = BindingFragment::new();
        copy_field(&mut fragment, msg.config.as_ref(), "headers");
        copy_field(&mut fragment, msg.config.as_ref(), "statusCode");
        Ok(fragment)
    }

    async fn validate_config(&self, kind: BindingKind, config: &Value) -> Result<(), PluginError> {
        validate_against(self.name(), &Self::config_schema(kind), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn method_follows_action() {
        let mut op = OperationContext {
            name: "getUser".into(),
            action: Action::Receive,
            channel: "getuser".into(),
            config: None,
        };
        let fragment = HttpPlugin.generate_operation_binding(&op).await.unwrap();
        assert_eq!(fragment["method"], "GET");
        assert_eq!(fragment["type"], "response");

        op.action = Action::Send;
        let fragment = HttpPlugin.generate_operation_binding(&op).await.unwrap();
        assert_eq!(fragment["method"], "POST");
        assert_eq!(fragment["type"], "request");
    }

    #[tokio::test]
    async fn configured_method_wins() {
        let op = OperationContext {
            name: "replaceUser".into(),
            action: Action::Send,
            channel: "replaceuser".into(),
            config: Some(json!({"method": "PUT"})),
        };
        let fragment = HttpPlugin.generate_operation_binding(&op).await.unwrap();
        assert_eq!(fragment["method"], "PUT");
    }

    #[tokio::test]
    async fn message_binding_copies_headers_and_status() {
        let msg = MessageContext {
            name: "UserCreated".into(),
            content_type: "application/json".into(),
            config: Some(json!({
                "statusCode": 201,
                "headers": {"type": "object", "properties": {"X-Trace": {"type": "string"}}}
            })),
        };
        let fragment = HttpPlugin.generate_message_binding(&msg).await.unwrap();
        assert_eq!(fragment["statusCode"], 201);
        assert!(fragment["headers"]["properties"].get("X-Trace").is_some());
    }

    #[tokio::test]
    async fn rejects_unknown_method() {
        let err = HttpPlugin
            .validate_config(BindingKind::Operation, &json!({"method": "FETCH"}))
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::InvalidConfig { .. }));
    }

    #[test]
    fn no_server_capability() {
        assert!(!HttpPlugin.capabilities().supports(BindingKind::Server));
    }
}
