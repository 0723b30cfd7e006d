//! Built-in protocol plugins.

mod http;
mod kafka;
mod websocket;

pub use http::HttpPlugin;
pub use kafka::KafkaPlugin;
pub use websocket::WebSocketPlugin;

use serde_json::Value;

/// `{"type": "string"}`, optionally pinned to a single value.
pub(crate) fn string_schema(pinned: Option<&Value>) -> Value {
    match pinned {
        Some(value) => serde_json::json!({ "type": "string", "enum": [value] }),
        None => serde_json::json!({ "type": "string" }),
    }
}
