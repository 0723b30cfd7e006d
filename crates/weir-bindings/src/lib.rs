//! Protocol binding plugins for the Weir AsyncAPI emitter.
//!
//! A [`ProtocolPlugin`] turns per-protocol configuration into AsyncAPI
//! binding objects. Plugins live in a [`PluginRegistry`] that the pipeline
//! constructs once per run; [`PluginRegistry::generate`] is the only
//! dispatch path and enforces capability checks, config validation, panic
//! isolation and `bindingVersion` stamping.

pub mod builtin;
pub mod error;
pub mod plugin;
pub mod registry;
pub mod result;
pub mod schema;

pub use builtin::{HttpPlugin, KafkaPlugin, WebSocketPlugin};
pub use error::PluginError;
pub use plugin::{
    BindingFragment, BindingKind, BindingRequest, Capabilities, ChannelContext, MessageContext,
    OperationContext, ProtocolPlugin, ServerContext,
};
pub use registry::{PluginInfo, PluginRegistry};
pub use result::ProtocolBindingResult;
pub use schema::ConfigSchema;
