//! AsyncAPI 3.0.0 document model.
//!
//! Typed building blocks for the document the emitter assembles. Everything
//! serializes with `serde` to the JSON/YAML shape defined by the AsyncAPI
//! 3.0.0 specification.

pub mod document;
pub mod reference;

pub use document::{
    Action, AsyncApiDocument, Bindings, Channel, ChannelParameter, Components, CorrelationId,
    Info, MessageExample, MessageObject, OperationObject, SecuritySchemeObject, Server,
    ServerVariable, ASYNCAPI_VERSION,
};
pub use reference::{escape_pointer_segment, unescape_pointer_segment, Reference};
