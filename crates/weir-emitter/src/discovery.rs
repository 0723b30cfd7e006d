//! Discovery of annotated elements in the host program.
//!
//! One pass over the AST produces three disjoint collections (operations,
//! message models, security configurations) plus a [`TypeIndex`] of every
//! declared model. Discovery never fails: a node with metadata of the wrong
//! shape is skipped with an `E2010` warning.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use weir_ast::{
    list_annotated_models, list_models, list_namespaces, list_operations, AstSource, ModelNode,
    ParameterNode,
};
use weir_asyncapi::{Action, CorrelationId, MessageExample};

use crate::error::{codes, EmitWarning};

/// Metadata keys written by the decorator front-end.
pub mod keys {
    pub const CHANNEL: &str = "channel";
    pub const PROTOCOL: &str = "protocol";
    pub const PUBLISH: &str = "publish";
    pub const SUBSCRIBE: &str = "subscribe";
    pub const BINDINGS: &str = "bindings";
    pub const MESSAGE: &str = "message";
    pub const SECURITY: &str = "security";
    pub const SERVER: &str = "server";
    pub const INFO: &str = "info";
}

/// Declared direction of an operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Publish,
    Subscribe,
}

impl Direction {
    pub fn action(&self) -> Action {
        match self {
            Direction::Publish => Action::Send,
            Direction::Subscribe => Action::Receive,
        }
    }
}

/// A discovered operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Dot-qualified node id.
    pub id: String,
    pub name: String,
    pub namespace: String,
    pub direction: Direction,
    /// Explicit channel path.
    pub channel: Option<String>,
    pub protocol: Option<String>,
    /// Per-protocol binding configuration.
    pub bindings: BTreeMap<String, Value>,
    pub doc: Option<String>,
    pub parameters: Vec<ParameterNode>,
    /// Final name of the message carried by this operation.
    pub message: Option<String>,
}

/// A model annotated as a message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageModel {
    pub id: String,
    /// Final message name, used as the `components.messages` key.
    pub name: String,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub content_type: Option<String>,
    pub examples: Vec<MessageExample>,
    pub correlation_id: Option<CorrelationId>,
    pub bindings: BTreeMap<String, Value>,
    pub model: ModelNode,
}

/// The scheme of a security configuration, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum SecurityScheme {
    #[serde(rename = "oauth2")]
    OAuth2 {
        #[serde(default)]
        flows: Option<Value>,
    },
    #[serde(rename = "apiKey")]
    ApiKey {
        #[serde(default)]
        name: Option<String>,
        #[serde(default, rename = "in")]
        location: Option<String>,
    },
    #[serde(rename = "http")]
    Http {
        #[serde(default)]
        scheme: Option<String>,
        #[serde(default, rename = "bearerFormat")]
        bearer_format: Option<String>,
    },
    #[serde(rename = "openIdConnect")]
    OpenIdConnect {
        #[serde(rename = "openIdConnectUrl")]
        url: String,
    },
    #[serde(rename = "sasl")]
    Sasl { mechanism: String },
    #[serde(rename = "x509", alias = "X509")]
    X509,
    #[serde(rename = "symmetricEncryption")]
    SymmetricEncryption,
    #[serde(rename = "asymmetricEncryption")]
    AsymmetricEncryption,
    /// A type the synthesizer does not know.
    #[serde(skip)]
    Unrecognized { scheme_type: String },
}

const KNOWN_SCHEME_TYPES: [&str; 9] = [
    "oauth2",
    "apiKey",
    "http",
    "openIdConnect",
    "sasl",
    "x509",
    "X509",
    "symmetricEncryption",
    "asymmetricEncryption",
];

impl SecurityScheme {
    /// Parse a scheme object. Unknown `type` strings become [`SecurityScheme::Unrecognized`].
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let scheme_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| "security scheme requires a string 'type'".to_string())?;

        if !KNOWN_SCHEME_TYPES.contains(&scheme_type) {
            return Ok(SecurityScheme::Unrecognized {
                scheme_type: scheme_type.to_string(),
            });
        }
        serde_json::from_value(value.clone()).map_err(|e| format!("invalid {} scheme: {}", scheme_type, e))
    }

    /// The declared type string.
    pub fn scheme_type(&self) -> &str {
        match self {
            SecurityScheme::OAuth2 { .. } => "oauth2",
            SecurityScheme::ApiKey { .. } => "apiKey",
            SecurityScheme::Http { .. } => "http",
            SecurityScheme::OpenIdConnect { .. } => "openIdConnect",
            SecurityScheme::Sasl { .. } => "sasl",
            SecurityScheme::X509 => "x509",
            SecurityScheme::SymmetricEncryption => "symmetricEncryption",
            SecurityScheme::AsymmetricEncryption => "asymmetricEncryption",
            SecurityScheme::Unrecognized { scheme_type } => scheme_type,
        }
    }
}

/// A discovered security configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityConfig {
    pub id: String,
    pub name: String,
    pub scheme: SecurityScheme,
    pub scopes: Vec<String>,
    pub description: Option<String>,
    pub metadata: Option<Value>,
}

/// Every declared model, by qualified id and by short name.
#[derive(Debug, Clone, Default)]
pub struct TypeIndex {
    models: BTreeMap<String, ModelNode>,
    short_names: BTreeMap<String, String>,
}

impl TypeIndex {
    pub fn insert(&mut self, id: String, model: ModelNode) {
        self.short_names
            .entry(model.name.clone())
            .or_insert_with(|| id.clone());
        self.models.insert(id, model);
    }

    /// Resolve a model by qualified id, falling back to its short name.
    pub fn get(&self, name: &str) -> Option<(&str, &ModelNode)> {
        if let Some((id, model)) = self.models.get_key_value(name) {
            return Some((id.as_str(), model));
        }
        let id = self.short_names.get(name)?;
        self.models.get(id).map(|model| (id.as_str(), model))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Output of one discovery pass.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryResult {
    pub operations: Vec<Operation>,
    pub message_models: Vec<MessageModel>,
    pub security_configs: Vec<SecurityConfig>,
    pub types: TypeIndex,
    pub warnings: Vec<EmitWarning>,
}

/// Message name: explicit name, else the model name, else `<type>Message`.
pub fn message_name(explicit: Option<&str>, model_name: &str, type_label: &str) -> String {
    match explicit.filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None if !model_name.is_empty() => model_name.to_string(),
        None => format!("{}Message", type_label),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
struct MessageMetadata {
    name: Option<String>,
    title: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    content_type: Option<String>,
    examples: Vec<MessageExample>,
    correlation_id: Option<CorrelationIdMetadata>,
    bindings: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CorrelationIdMetadata {
    Location(String),
    Full(CorrelationId),
}

impl From<CorrelationIdMetadata> for CorrelationId {
    fn from(value: CorrelationIdMetadata) -> Self {
        match value {
            CorrelationIdMetadata::Location(location) => CorrelationId {
                description: None,
                location,
            },
            CorrelationIdMetadata::Full(id) => id,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SecurityMetadata {
    #[serde(default)]
    name: Option<String>,
    scheme: Value,
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    metadata: Option<Value>,
}

/// Walks the AST and extracts annotated elements.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscoveryService;

impl DiscoveryService {
    pub fn new() -> Self {
        Self
    }

    pub fn execute_discovery(&self, source: &dyn AstSource) -> DiscoveryResult {
        let mut result = DiscoveryResult::default();

        for model in list_models(source.root()) {
            result.types.insert(model.id, model.node.clone());
        }

        let mut message_index: BTreeMap<String, String> = BTreeMap::new();
        for located in list_annotated_models(source, keys::MESSAGE) {
            match discover_message(source, &located.id, &located.namespace, located.node) {
                Ok(Some(message)) => {
                    message_index.insert(located.id.clone(), message.name.clone());
                    message_index
                        .entry(located.node.name.clone())
                        .or_insert_with(|| message.name.clone());
                    result.message_models.push(message);
                }
                Ok(None) => {}
                Err(reason) => skip(&mut result.warnings, codes::MALFORMED_NODE, reason, &located.id),
            }
        }

        let security_nodes = list_namespaces(source.root())
            .into_iter()
            .map(|ns| (ns.id, ns.node.name.clone(), ns.node.doc.clone()))
            .chain(
                list_models(source.root())
                    .into_iter()
                    .map(|m| (m.id, m.node.name.clone(), m.node.doc.clone())),
            );
        for (id, node_name, doc) in security_nodes {
            let Some(value) = source.stored_metadata(&id, keys::SECURITY) else {
                continue;
            };
            match discover_security(value, &id, &node_name, doc) {
                Ok(configs) => result.security_configs.extend(configs),
                Err(reason) => skip(&mut result.warnings, codes::MALFORMED_NODE, reason, &id),
            }
        }

        for located in list_operations(source.root()) {
            match discover_operation(source, &located, &result.types, &message_index) {
                Ok((operation, warning)) => {
                    if let Some(warning) = warning {
                        result.warnings.push(warning);
                    }
                    result.operations.push(operation);
                }
                Err(reason) => skip(&mut result.warnings, codes::MALFORMED_NODE, reason, &located.id),
            }
        }

        weir_telemetry::log_discovery_completed!(
            operations = result.operations.len(),
            messages = result.message_models.len(),
            security = result.security_configs.len(),
            models = result.types.len(),
            warnings = result.warnings.len(),
            "discovery completed"
        );

        result
    }
}

fn skip(warnings: &mut Vec<EmitWarning>, code: &str, reason: String, id: &str) {
    weir_telemetry::log_element_skipped!(element = %id, code = code, reason = %reason, "skipping node");
    warnings.push(EmitWarning::new(code, reason, Some(id.to_string())));
}

/// `true` and `{}` both mark a node; `false` does not.
fn marker_object(value: &Value, key: &str) -> Result<Option<Value>, String> {
    match value {
        Value::Bool(true) | Value::Null => Ok(Some(Value::Object(Default::default()))),
        Value::Bool(false) => Ok(None),
        Value::Object(_) => Ok(Some(value.clone())),
        other => Err(format!("'{}' metadata must be an object or boolean, got {}", key, other)),
    }
}

fn is_marked(source: &dyn AstSource, id: &str, key: &str) -> Result<bool, String> {
    match source.stored_metadata(id, key) {
        None => Ok(false),
        Some(value) => marker_object(value, key).map(|v| v.is_some()),
    }
}

fn string_metadata(source: &dyn AstSource, id: &str, key: &str) -> Result<Option<String>, String> {
    match source.stored_metadata(id, key) {
        None => Ok(None),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(Some(s.clone())),
        Some(other) => Err(format!("'{}' metadata must be a non-empty string, got {}", key, other)),
    }
}

fn binding_configs(value: Option<&Value>) -> Result<BTreeMap<String, Value>, String> {
    let Some(value) = value else {
        return Ok(BTreeMap::new());
    };
    let map = value
        .as_object()
        .ok_or_else(|| "'bindings' metadata must be an object keyed by protocol".to_string())?;
    map.iter()
        .map(|(protocol, config)| {
            if config.is_object() {
                Ok((protocol.to_lowercase(), config.clone()))
            } else {
                Err(format!("binding config for '{}' must be an object", protocol))
            }
        })
        .collect()
}

fn short_name(id: &str) -> &str {
    id.rsplit('.').next().unwrap_or(id)
}

fn discover_message(
    source: &dyn AstSource,
    id: &str,
    namespace: &str,
    model: &ModelNode,
) -> Result<Option<MessageModel>, String> {
    let Some(raw) = source.stored_metadata(id, keys::MESSAGE) else {
        return Ok(None);
    };
    let Some(value) = marker_object(raw, keys::MESSAGE)? else {
        return Ok(None);
    };
    let meta: MessageMetadata =
        serde_json::from_value(value).map_err(|e| format!("invalid message metadata: {}", e))?;

    let bindings = meta
        .bindings
        .into_iter()
        .map(|(protocol, config)| {
            if config.is_object() {
                Ok((protocol.to_lowercase(), config))
            } else {
                Err(format!("message binding config for '{}' must be an object", protocol))
            }
        })
        .collect::<Result<BTreeMap<_, _>, String>>()?;

    Ok(Some(MessageModel {
        id: id.to_string(),
        name: message_name(meta.name.as_deref(), &model.name, short_name(namespace)),
        title: meta.title,
        summary: meta.summary,
        description: meta
            .description
            .or_else(|| source.doc(id).map(str::to_string)),
        content_type: meta.content_type,
        examples: meta.examples,
        correlation_id: meta.correlation_id.map(Into::into),
        bindings,
        model: model.clone(),
    }))
}

fn discover_security(
    value: &Value,
    id: &str,
    node_name: &str,
    doc: Option<String>,
) -> Result<Vec<SecurityConfig>, String> {
    let entries: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![value],
        other => return Err(format!("'security' metadata must be an object or list, got {}", other)),
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let meta: SecurityMetadata = serde_json::from_value(entry.clone())
                .map_err(|e| format!("invalid security metadata: {}", e))?;
            let scheme = SecurityScheme::from_value(&meta.scheme)?;
            let name = match meta.name.filter(|n| !n.trim().is_empty()) {
                Some(name) => name,
                None if index == 0 && !node_name.is_empty() => node_name.to_string(),
                None if !node_name.is_empty() => format!("{}{}", node_name, index),
                None => return Err("security config has no name".to_string()),
            };
            let description = meta
                .description
                .or_else(|| meta.scheme.get("description").and_then(Value::as_str).map(str::to_string))
                .or_else(|| doc.clone());

            Ok(SecurityConfig {
                id: id.to_string(),
                name,
                scheme,
                scopes: meta.scopes,
                description,
                metadata: meta.metadata,
            })
        })
        .collect()
}

fn discover_operation(
    source: &dyn AstSource,
    located: &weir_ast::Located<'_, weir_ast::OperationNode>,
    types: &TypeIndex,
    message_index: &BTreeMap<String, String>,
) -> Result<(Operation, Option<EmitWarning>), String> {
    let id = located.id.as_str();
    let node = located.node;
    if node.name.trim().is_empty() {
        return Err("operation has an empty name".to_string());
    }

    let direction = if is_marked(source, id, keys::SUBSCRIBE)? {
        Direction::Subscribe
    } else {
        // Validates the shape even though publish is the default.
        is_marked(source, id, keys::PUBLISH)?;
        Direction::Publish
    };

    let channel = string_metadata(source, id, keys::CHANNEL)?;
    let protocol = string_metadata(source, id, keys::PROTOCOL)?.map(|p| p.to_lowercase());
    let bindings = binding_configs(source.stored_metadata(id, keys::BINDINGS))?;

    let candidates = node
        .parameters
        .iter()
        .filter_map(|p| p.type_ref.model_name())
        .chain(node.returns.as_ref().and_then(|r| r.model_name()));

    let mut message = None;
    let mut unmatched = None;
    for candidate in candidates {
        let resolved = types
            .get(candidate)
            .and_then(|(model_id, _)| message_index.get(model_id))
            .or_else(|| message_index.get(candidate));
        match resolved {
            Some(name) => {
                message = Some(name.clone());
                break;
            }
            None => {
                unmatched.get_or_insert(candidate);
            }
        }
    }

    let warning = match (&message, unmatched) {
        (None, Some(model)) => Some(EmitWarning::new(
            codes::PAYLOAD_NOT_MESSAGE,
            format!("payload type '{}' is not a message model", model),
            Some(id.to_string()),
        )),
        _ => None,
    };

    let operation = Operation {
        id: id.to_string(),
        name: node.name.clone(),
        namespace: located.namespace.clone(),
        direction,
        channel,
        protocol,
        bindings,
        doc: source.doc(id).map(str::to_string),
        parameters: node.parameters.clone(),
        message,
    };
    Ok((operation, warning))
}

#[cfg(test)]
mod tests {
    use super::*;
    use weir_ast::parse_program;

    const PROGRAM: &str = r#"
root:
  name: Acme
  metadata:
    security:
      name: corporate
      scheme:
        type: oauth2
        flows:
          clientCredentials:
            tokenUrl: https://auth.acme.test/token
      scopes: ["events:read"]
  namespaces:
    - name: Events
      operations:
        - name: publishUserEvent
          doc: Publishes a user event
          parameters:
            - name: event
              type: UserEvent
          metadata:
            publish: true
            protocol: Kafka
            bindings:
              kafka:
                topic: users
        - name: onOrder
          returns: OrderPlaced
          metadata:
            subscribe: true
            channel: /orders/{id}
        - name: audit
          parameters:
            - name: entry
              type: AuditEntry
        - name: broken
          metadata:
            channel: 42
      models:
        - name: UserEvent
          doc: A user changed
          properties:
            - name: id
              type: string
          metadata:
            message: true
        - name: OrderPlaced
          properties: []
          metadata:
            message:
              name: OrderPlacedEvent
              contentType: application/avro
              correlationId: $message.header#/correlationId
              bindings:
                kafka:
                  schemaIdLocation: header
        - name: AuditEntry
          properties: []
        - name: Disabled
          properties: []
          metadata:
            message: false
        - name: BadMessage
          properties: []
          metadata:
            message: 12
        - name: TokenAuth
          properties: []
          metadata:
            security:
              scheme:
                type: magicLink
"#;

    fn discover() -> DiscoveryResult {
        let program = parse_program(PROGRAM).unwrap();
        DiscoveryService::new().execute_discovery(&program)
    }

    #[test]
    fn discovers_operations_with_direction_and_overrides() {
        let result = discover();
        let names: Vec<_> = result.operations.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["publishUserEvent", "onOrder", "audit"]);

        let publish = &result.operations[0];
        assert_eq!(publish.id, "Acme.Events.publishUserEvent");
        assert_eq!(publish.direction, Direction::Publish);
        assert_eq!(publish.protocol.as_deref(), Some("kafka"));
        assert_eq!(publish.bindings["kafka"]["topic"], "users");
        assert_eq!(publish.message.as_deref(), Some("UserEvent"));
        assert_eq!(publish.doc.as_deref(), Some("Publishes a user event"));

        let subscribe = &result.operations[1];
        assert_eq!(subscribe.direction.action(), Action::Receive);
        assert_eq!(subscribe.channel.as_deref(), Some("/orders/{id}"));
        assert_eq!(subscribe.message.as_deref(), Some("OrderPlacedEvent"));
    }

    #[test]
    fn discovers_message_models() {
        let result = discover();
        let names: Vec<_> = result.message_models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["UserEvent", "OrderPlacedEvent"]);

        let user = &result.message_models[0];
        assert_eq!(user.description.as_deref(), Some("A user changed"));
        assert!(user.content_type.is_none());

        let order = &result.message_models[1];
        assert_eq!(order.content_type.as_deref(), Some("application/avro"));
        assert_eq!(
            order.correlation_id.as_ref().map(|c| c.location.as_str()),
            Some("$message.header#/correlationId")
        );
        assert_eq!(order.bindings["kafka"]["schemaIdLocation"], "header");
    }

    #[test]
    fn discovers_security_on_namespaces_and_models() {
        let result = discover();
        assert_eq!(result.security_configs.len(), 2);

        let corporate = &result.security_configs[0];
        assert_eq!(corporate.name, "corporate");
        assert_eq!(corporate.scheme.scheme_type(), "oauth2");
        assert_eq!(corporate.scopes, vec!["events:read"]);

        let token = &result.security_configs[1];
        assert_eq!(token.name, "TokenAuth");
        assert_eq!(
            token.scheme,
            SecurityScheme::Unrecognized {
                scheme_type: "magicLink".into()
            }
        );
    }

    #[test]
    fn malformed_nodes_become_warnings() {
        let result = discover();
        let malformed: Vec<_> = result
            .warnings
            .iter()
            .filter(|w| w.code == codes::MALFORMED_NODE)
            .filter_map(|w| w.location.as_deref())
            .collect();
        assert!(malformed.contains(&"Acme.Events.broken"));
        assert!(malformed.contains(&"Acme.Events.BadMessage"));

        let payload = result
            .warnings
            .iter()
            .find(|w| w.code == codes::PAYLOAD_NOT_MESSAGE)
            .unwrap();
        assert_eq!(payload.location.as_deref(), Some("Acme.Events.audit"));
    }

    #[test]
    fn type_index_resolves_short_and_qualified_names() {
        let result = discover();
        assert!(result.types.get("Acme.Events.UserEvent").is_some());
        let (id, model) = result.types.get("AuditEntry").unwrap();
        assert_eq!(id, "Acme.Events.AuditEntry");
        assert_eq!(model.name, "AuditEntry");
        assert!(result.types.get("Missing").is_none());
    }

    #[test]
    fn message_name_fallbacks() {
        assert_eq!(message_name(Some("Explicit"), "Model", "Events"), "Explicit");
        assert_eq!(message_name(Some(""), "Model", "Events"), "Model");
        assert_eq!(message_name(None, "", "Events"), "EventsMessage");
    }

    #[test]
    fn known_scheme_with_bad_fields_is_an_error() {
        let err = SecurityScheme::from_value(&serde_json::json!({"type": "sasl"})).unwrap_err();
        assert!(err.contains("sasl"));
        assert!(SecurityScheme::from_value(&serde_json::json!({"scheme": "x"})).is_err());
    }
}
