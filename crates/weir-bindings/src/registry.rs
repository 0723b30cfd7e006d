//! Plugin registry.
//!
//! A name-keyed store of protocol plugins, built once per emission run and
//! passed down the pipeline. Registration never fails: re-registering a
//! name logs a warning and replaces the earlier plugin.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use serde::Serialize;
use serde_json::Value;

use crate::builtin::{HttpPlugin, KafkaPlugin, WebSocketPlugin};
use crate::error::PluginError;
use crate::plugin::{BindingKind, BindingRequest, Capabilities, ProtocolPlugin};
use crate::result::ProtocolBindingResult;

/// Summary of a registered plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    pub binding_version: String,
    pub capabilities: Capabilities,
}

/// Protocol plugins indexed by lowercase protocol name.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, Arc<dyn ProtocolPlugin>>,
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the Kafka, HTTP and WebSocket plugins registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(KafkaPlugin));
        registry.register(Arc::new(HttpPlugin));
        registry.register(Arc::new(WebSocketPlugin));
        registry
    }

    /// Register a plugin. The last registration for a name wins.
    pub fn register(&mut self, plugin: Arc<dyn ProtocolPlugin>) {
        let name = plugin.name().to_lowercase();

        if !is_valid_protocol_name(&name) {
            tracing::warn!(
                protocol = %name,
                "protocol name should be lowercase kebab-case (^[a-z][a-z0-9-]*$)"
            );
        }
        if semver::Version::parse(plugin.version()).is_err() {
            tracing::warn!(
                protocol = %name,
                version = %plugin.version(),
                "plugin version is not valid semver"
            );
        }

        let version = plugin.version().to_string();
        if let Some(previous) = self.plugins.insert(name.clone(), plugin) {
            weir_telemetry::log_plugin_replaced!(
                protocol = %name,
                previous_version = %previous.version(),
                version = %version,
                "replacing previously registered plugin"
            );
        } else {
            weir_telemetry::log_plugin_registered!(protocol = %name, version = %version);
        }
    }

    /// Look up a plugin by protocol name. Absence is an expected outcome.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ProtocolPlugin>> {
        self.plugins.get(&name.to_lowercase()).cloned()
    }

    pub fn is_supported(&self, name: &str) -> bool {
        self.plugins.contains_key(&name.to_lowercase())
    }

    /// Registered protocol names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.plugins.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registration entries, sorted by name.
    pub fn entries(&self) -> Vec<PluginInfo> {
        let mut entries: Vec<PluginInfo> = self
            .plugins
            .iter()
            .map(|(name, plugin)| PluginInfo {
                name: name.clone(),
                version: plugin.version().to_string(),
                binding_version: plugin.binding_version().to_string(),
                capabilities: plugin.capabilities(),
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Generate a binding for `protocol`.
    ///
    /// Returns `Ok(None)` when the protocol is unknown, the plugin lacks the
    /// capability, or the plugin produced neither a fragment nor extras. Errors and
    /// panics raised inside the plugin come back as [`PluginError`] and stay
    /// scoped to this one request.
    pub async fn generate(
        &self,
        protocol: &str,
        request: BindingRequest<'_>,
    ) -> Result<Option<ProtocolBindingResult>, PluginError> {
        let kind = request.kind();

        let Some(plugin) = self.get(protocol) else {
            tracing::warn!(
                event = weir_telemetry::events::BINDING_UNSUPPORTED,
                protocol = %protocol,
                kind = %kind,
                subject = %request.subject(),
                "no plugin registered for protocol"
            );
            return Ok(None);
        };
        let name = plugin.name().to_lowercase();

        let capabilities = plugin.capabilities();
        if !capabilities.supports(kind) {
            weir_telemetry::log_binding_unsupported!(
                protocol = %name,
                kind = %kind,
                subject = %request.subject(),
                "protocol has no binding of this kind"
            );
            return Ok(None);
        }

        if capabilities.supports(BindingKind::ConfigValidation) {
            if let Some(config) = request.config() {
                isolate(&name, plugin.validate_config(kind, config)).await?;
            }
        }

        let call = match request {
            BindingRequest::Operation(ctx) => plugin.generate_operation_binding(ctx),
            BindingRequest::Message(ctx) => plugin.generate_message_binding(ctx),
            BindingRequest::Server(ctx) => plugin.generate_server_binding(ctx),
            BindingRequest::Channel(ctx) => plugin.generate_channel_binding(ctx),
        };
        let mut fragment = isolate(&name, call).await?;
        let extras = isolate(&name, plugin.generate_extras(request)).await?;

        let mut result = ProtocolBindingResult {
            channels: extras.channels,
            operations: extras.operations,
            components: extras.components,
            ..Default::default()
        };
        if !fragment.is_empty() {
            fragment.insert(
                "bindingVersion".to_string(),
                Value::String(plugin.binding_version().to_string()),
            );
            result.bindings.insert(name, fragment);
        }

        if result.is_empty() {
            return Ok(None);
        }
        Ok(Some(result))
    }
}

/// Await a plugin future, converting a panic into [`PluginError::Panicked`].
async fn isolate<T, F>(protocol: &str, call: F) -> Result<T, PluginError>
where
    F: std::future::Future<Output = Result<T, PluginError>>,
{
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            weir_telemetry::log_plugin_failed!(protocol = %protocol, error = %message, "plugin panicked");
            Err(PluginError::Panicked {
                protocol: protocol.to_string(),
                message,
            })
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn is_valid_protocol_name(name: &str) -> bool {
    regex_lite::Regex::new(r"^[a-z][a-z0-9-]*$")
        .map(|re| re.is_match(name))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{BindingFragment, MessageContext, OperationContext, ServerContext};
    use async_trait::async_trait;
    use serde_json::json;
    use weir_asyncapi::Action;

    struct FlakyPlugin {
        version: &'static str,
    }

    #[async_trait]
    impl ProtocolPlugin for FlakyPlugin {
        fn name(&self) -> &str {
            "flaky"
        }

        fn version(&self) -> &str {
            self.version
        }

        fn binding_version(&self) -> &str {
            "9.9.9"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::new([BindingKind::Message, BindingKind::Operation])
        }

        async fn generate_message_binding(
            &self,
            msg: &MessageContext,
        ) -> Result<BindingFragment, PluginError> {
            if msg.name == "Boom" {
                panic!("boom");
            }
            if msg.name == "Bad" {
                return Err(PluginError::Generation {
                    protocol: "flaky".into(),
                    kind: BindingKind::Message,
                    message: "bad message".into(),
                });
            }
            let mut fragment = BindingFragment::new();
            fragment.insert("name".into(), json!(msg.name));
            fragment.insert("bindingVersion".into(), json!("not-mine"));
            Ok(fragment)
        }

        async fn generate_operation_binding(
            &self,
            _op: &OperationContext,
        ) -> Result<BindingFragment, PluginError> {
            Ok(BindingFragment::new())
        }

        async fn generate_extras(
            &self,
            request: BindingRequest<'_>,
        ) -> Result<ProtocolBindingResult, PluginError> {
            let mut extras = ProtocolBindingResult::default();
            match request {
                BindingRequest::Operation(op) if op.channel == "keyed" => {
                    extras
                        .components
                        .insert(format!("{}Key", op.name), json!({"type": "string"}));
                }
                _ => {}
            }
            Ok(extras)
        }
    }

    fn message(name: &str) -> MessageContext {
        MessageContext {
            name: name.into(),
            content_type: "application/json".into(),
            config: None,
        }
    }

    #[test]
    fn builtins_are_registered() {
        let registry = PluginRegistry::with_builtins();
        assert_eq!(registry.names(), vec!["http", "kafka", "ws"]);
        assert!(registry.is_supported("kafka"));
        assert!(registry.is_supported("KAFKA"));
        assert!(!registry.is_supported("mqtt"));
        assert!(registry.get("mqtt").is_none());
    }

    #[test]
    fn reregistering_replaces_plugin() {
        let mut registry = PluginRegistry::new();
        registry.register(Arc::new(FlakyPlugin { version: "1.0.0" }));
        registry.register(Arc::new(FlakyPlugin { version: "2.0.0" }));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("flaky").unwrap().version(), "2.0.0");
        assert_eq!(registry.entries()[0].binding_version, "9.9.9");
    }

    #[tokio::test]
    async fn unknown_protocol_yields_none() {
        let registry = PluginRegistry::with_builtins();
        let msg = message("UserEvent");
        let result = registry
            .generate("mqtt", BindingRequest::Message(&msg))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn missing_capability_yields_none() {
        let mut registry = PluginRegistry::new();
        registry.register(Arc::new(FlakyPlugin { version: "1.0.0" }));
        let server = ServerContext {
            name: "prod".into(),
            host: "localhost".into(),
            protocol: "flaky".into(),
            config: None,
        };
        let result = registry
            .generate("flaky", BindingRequest::Server(&server))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn fragments_are_stamped_with_binding_version() {
        let mut registry = PluginRegistry::new();
        registry.register(Arc::new(FlakyPlugin { version: "1.0.0" }));
        let msg = message("UserEvent");
        let result = registry
            .generate("flaky", BindingRequest::Message(&msg))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.bindings["flaky"]["bindingVersion"], "9.9.9");
        assert_eq!(result.bindings["flaky"]["name"], "UserEvent");
    }

    #[tokio::test]
    async fn empty_fragment_yields_none() {
        let mut registry = PluginRegistry::new();
        registry.register(Arc::new(FlakyPlugin { version: "1.0.0" }));
        let op = OperationContext {
            name: "send".into(),
            action: Action::Send,
            channel: "events".into(),
            config: None,
        };
        let result = registry
            .generate("flaky", BindingRequest::Operation(&op))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn extras_come_back_without_a_fragment() {
        let mut registry = PluginRegistry::new();
        registry.register(Arc::new(FlakyPlugin { version: "1.0.0" }));
        let op = OperationContext {
            name: "send".into(),
            action: Action::Send,
            channel: "keyed".into(),
            config: None,
        };
        let result = registry
            .generate("flaky", BindingRequest::Operation(&op))
            .await
            .unwrap()
            .unwrap();
        assert!(result.bindings.is_empty());
        assert_eq!(result.components["sendKey"], json!({"type": "string"}));
    }

    #[tokio::test]
    async fn plugin_errors_and_panics_are_isolated() {
        let mut registry = PluginRegistry::new();
        registry.register(Arc::new(FlakyPlugin { version: "1.0.0" }));

        let bad = message("Bad");
        let err = registry
            .generate("flaky", BindingRequest::Message(&bad))
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::Generation { .. }));

        let boom = message("Boom");
        let err = registry
            .generate("flaky", BindingRequest::Message(&boom))
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::Panicked { ref message, .. } if message == "boom"));

        // The registry is still usable after a panic.
        let ok = message("Fine");
        assert!(registry
            .generate("flaky", BindingRequest::Message(&ok))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_generation() {
        let registry = PluginRegistry::with_builtins();
        let op = OperationContext {
            name: "placeOrder".into(),
            action: Action::Send,
            channel: "orders".into(),
            config: Some(json!({"groupId": 42})),
        };
        let err = registry
            .generate("kafka", BindingRequest::Operation(&op))
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::InvalidConfig { .. }));
    }

    #[test]
    fn protocol_name_check() {
        assert!(is_valid_protocol_name("kafka"));
        assert!(is_valid_protocol_name("secure-mqtt"));
        assert!(!is_valid_protocol_name("Kafka"));
        assert!(!is_valid_protocol_name("9p"));
    }
}
