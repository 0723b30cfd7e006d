//! The protocol plugin contract.
//!
//! A plugin advertises the binding kinds it can generate through an explicit
//! [`Capabilities`] set. Callers check the set before dispatch; a missing
//! capability means "this protocol has no such binding", never an error.

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use weir_asyncapi::Action;

use crate::error::PluginError;
use crate::result::ProtocolBindingResult;

/// A protocol-specific binding object, before version stamping.
pub type BindingFragment = serde_json::Map<String, Value>;

/// The kinds of work a plugin may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    Operation,
    Message,
    Server,
    Channel,
    ConfigValidation,
}

impl BindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingKind::Operation => "operation",
            BindingKind::Message => "message",
            BindingKind::Server => "server",
            BindingKind::Channel => "channel",
            BindingKind::ConfigValidation => "config_validation",
        }
    }
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of binding kinds a plugin supports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities(BTreeSet<BindingKind>);

impl Capabilities {
    pub fn new(kinds: impl IntoIterator<Item = BindingKind>) -> Self {
        Self(kinds.into_iter().collect())
    }

    pub fn supports(&self, kind: BindingKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = BindingKind> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Input for operation bindings.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub name: String,
    pub action: Action,
    /// Key of the channel the operation is bound to.
    pub channel: String,
    /// The protocol's configuration block for this operation, if any.
    pub config: Option<Value>,
}

/// Input for channel bindings.
#[derive(Debug, Clone)]
pub struct ChannelContext {
    pub name: String,
    pub address: String,
    /// The operation that caused the channel to be created.
    pub operation: String,
    pub config: Option<Value>,
}

/// Input for message bindings.
#[derive(Debug, Clone)]
pub struct MessageContext {
    pub name: String,
    pub content_type: String,
    pub config: Option<Value>,
}

/// Input for server bindings.
#[derive(Debug, Clone)]
pub struct ServerContext {
    pub name: String,
    pub host: String,
    pub protocol: String,
    pub config: Option<Value>,
}

/// A binding request routed through the registry.
#[derive(Debug, Clone, Copy)]
pub enum BindingRequest<'a> {
    Operation(&'a OperationContext),
    Message(&'a MessageContext),
    Server(&'a ServerContext),
    Channel(&'a ChannelContext),
}

impl BindingRequest<'_> {
    pub fn kind(&self) -> BindingKind {
        match self {
            BindingRequest::Operation(_) => BindingKind::Operation,
            BindingRequest::Message(_) => BindingKind::Message,
            BindingRequest::Server(_) => BindingKind::Server,
            BindingRequest::Channel(_) => BindingKind::Channel,
        }
    }

    /// Name of the element the binding is for.
    pub fn subject(&self) -> &str {
        match self {
            BindingRequest::Operation(ctx) => &ctx.name,
            BindingRequest::Message(ctx) => &ctx.name,
            BindingRequest::Server(ctx) => &ctx.name,
            BindingRequest::Channel(ctx) => &ctx.name,
        }
    }

    pub fn config(&self) -> Option<&Value> {
        match self {
            BindingRequest::Operation(ctx) => ctx.config.as_ref(),
            BindingRequest::Message(ctx) => ctx.config.as_ref(),
            BindingRequest::Server(ctx) => ctx.config.as_ref(),
            BindingRequest::Channel(ctx) => ctx.config.as_ref(),
        }
    }
}

/// A protocol plugin.
///
/// Every generator has a default body that reports [`PluginError::Unsupported`];
/// the registry never calls a generator whose kind is missing from
/// [`ProtocolPlugin::capabilities`], so plugins only override what they advertise.
#[async_trait]
pub trait ProtocolPlugin: Send + Sync {
    /// Protocol name, used as the registry key and the binding map key.
    fn name(&self) -> &str;

    /// Plugin version (semver).
    fn version(&self) -> &str;

    /// The AsyncAPI bindings-spec version stamped on every fragment.
    fn binding_version(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    async fn generate_operation_binding(
        &self,
        _op: &OperationContext,
    ) -> Result<BindingFragment, PluginError> {
        Err(self.unsupported(BindingKind::Operation))
    }

    async fn generate_message_binding(
        &self,
        _msg: &MessageContext,
    ) -> Result<BindingFragment, PluginError> {
        Err(self.unsupported(BindingKind::Message))
    }

    async fn generate_server_binding(
        &self,
        _server: &ServerContext,
    ) -> Result<BindingFragment, PluginError> {
        Err(self.unsupported(BindingKind::Server))
    }

    async fn generate_channel_binding(
        &self,
        _channel: &ChannelContext,
    ) -> Result<BindingFragment, PluginError> {
        Err(self.unsupported(BindingKind::Channel))
    }

    /// Extra channel, operation and schema fragments for a request the
    /// plugin supports. Bindings in the returned result are ignored.
    async fn generate_extras(
        &self,
        _request: BindingRequest<'_>,
    ) -> Result<ProtocolBindingResult, PluginError> {
        Ok(ProtocolBindingResult::default())
    }

    /// Check a configuration block before it is used for `kind`.
    async fn validate_config(&self, _kind: BindingKind, _config: &Value) -> Result<(), PluginError> {
        Ok(())
    }

    fn unsupported(&self, kind: BindingKind) -> PluginError {
        PluginError::Unsupported {
            protocol: self.name().to_string(),
            kind,
        }
    }
}

/// Copy `key` from a config block into a fragment when present.
pub(crate) fn copy_field(fragment: &mut BindingFragment, config: Option<&Value>, key: &str) {
    if let Some(value) = config.and_then(|c| c.get(key)) {
        fragment.insert(key.to_string(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_are_an_explicit_set() {
        let caps = Capabilities::new([BindingKind::Message, BindingKind::Operation]);
        assert!(caps.supports(BindingKind::Operation));
        assert!(!caps.supports(BindingKind::Server));
        let kinds: Vec<_> = caps.iter().collect();
        assert_eq!(kinds, vec![BindingKind::Operation, BindingKind::Message]);
    }

    #[test]
    fn request_exposes_kind_and_config() {
        let ctx = MessageContext {
            name: "UserEvent".into(),
            content_type: "application/json".into(),
            config: Some(serde_json::json!({"statusCode": 200})),
        };
        let request = BindingRequest::Message(&ctx);
        assert_eq!(request.kind(), BindingKind::Message);
        assert_eq!(request.subject(), "UserEvent");
        assert_eq!(request.config().unwrap()["statusCode"], 200);
    }
}
