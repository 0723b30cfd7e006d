//! Structural and cross-reference validation of assembled documents.
//!
//! Validation runs on the serialized form so documents from any source can
//! be checked. It never fails: every problem becomes a [`ValidationIssue`],
//! and both stages always run so one pass reports everything.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use weir_asyncapi::{escape_pointer_segment, unescape_pointer_segment, AsyncApiDocument, ASYNCAPI_VERSION};

use crate::error::codes;

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: String,
    pub message: String,
    /// JSON pointer to the offending node.
    pub path: String,
}

impl ValidationIssue {
    fn new(code: &str, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            path: path.into(),
        }
    }
}

/// Counts of what was inspected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub channels: usize,
    pub operations: usize,
    pub messages: usize,
    pub schemas: usize,
    pub security_schemes: usize,
    pub servers: usize,
    pub references_checked: usize,
}

/// Result of validating one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub summary: String,
    pub metrics: ValidationMetrics,
}

#[derive(Default)]
struct Collector {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
    metrics: ValidationMetrics,
}

impl Collector {
    fn error(&mut self, code: &str, message: impl Into<String>, path: impl Into<String>) {
        self.errors.push(ValidationIssue::new(code, message, path));
    }

    fn warning(&mut self, code: &str, message: impl Into<String>, path: impl Into<String>) {
        self.warnings.push(ValidationIssue::new(code, message, path));
    }
}

/// Validates AsyncAPI 3.0.0 documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct ValidationService;

impl ValidationService {
    pub fn new() -> Self {
        Self
    }

    /// Validate a typed document.
    pub fn validate_document(&self, doc: &AsyncApiDocument) -> ValidationResult {
        match doc.to_value() {
            Ok(value) => self.validate(&value),
            Err(e) => {
                let mut collector = Collector::default();
                collector.error(codes::SYSTEM, format!("document could not be serialized: {}", e), "");
                finish(collector)
            }
        }
    }

    /// Validate an untyped document.
    pub fn validate(&self, doc: &Value) -> ValidationResult {
        let mut c = Collector::default();

        let Some(root) = doc.as_object() else {
            c.error(codes::CONTAINER_NOT_OBJECT, "document must be an object", "");
            return finish(c);
        };

        check_structure(root, &mut c);
        check_references(doc, root, &mut c);

        finish(c)
    }
}

fn finish(c: Collector) -> ValidationResult {
    let valid = c.errors.is_empty();
    let summary = format!(
        "{}: {} error(s), {} warning(s); {} channel(s), {} operation(s), {} message(s)",
        if valid { "valid" } else { "invalid" },
        c.errors.len(),
        c.warnings.len(),
        c.metrics.channels,
        c.metrics.operations,
        c.metrics.messages,
    );
    if !valid {
        weir_telemetry::log_validation_failure!(
            errors = c.errors.len(),
            warnings = c.warnings.len(),
            "document failed validation"
        );
    }
    ValidationResult {
        valid,
        errors: c.errors,
        warnings: c.warnings,
        summary,
        metrics: c.metrics,
    }
}

fn non_empty_string(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty())
}

/// An optional top-level map. Present but not an object is an error.
fn object_at<'a>(
    parent: &'a Map<String, Value>,
    key: &str,
    path: &str,
    c: &mut Collector,
) -> Option<&'a Map<String, Value>> {
    match parent.get(key) {
        None => None,
        Some(Value::Object(map)) => Some(map),
        Some(_) => {
            c.error(
                codes::CONTAINER_NOT_OBJECT,
                format!("'{}' must be an object", key),
                format!("{}/{}", path, key),
            );
            None
        }
    }
}

fn check_structure(root: &Map<String, Value>, c: &mut Collector) {
    match root.get("asyncapi") {
        None => c.error(codes::ASYNCAPI_MISSING, "missing required field 'asyncapi'", "/asyncapi"),
        Some(Value::String(v)) if v == ASYNCAPI_VERSION => {}
        Some(other) => c.error(
            codes::ASYNCAPI_VERSION_MISMATCH,
            format!("'asyncapi' must be \"{}\", found {}", ASYNCAPI_VERSION, other),
            "/asyncapi",
        ),
    }

    match root.get("info") {
        Some(Value::Object(info)) => {
            for field in ["title", "version"] {
                if !non_empty_string(info.get(field)) {
                    c.error(
                        codes::INFO_FIELD_MISSING,
                        format!("'info.{}' must be a non-empty string", field),
                        format!("/info/{}", field),
                    );
                }
            }
        }
        Some(_) => c.error(codes::INFO_MISSING, "'info' must be an object", "/info"),
        None => c.error(codes::INFO_MISSING, "missing required field 'info'", "/info"),
    }

    if let Some(servers) = object_at(root, "servers", "", c) {
        c.metrics.servers = servers.len();
        for (name, server) in servers {
            let path = format!("/servers/{}", escape_pointer_segment(name));
            for field in ["host", "protocol"] {
                if !non_empty_string(server.get(field)) {
                    c.error(
                        codes::SERVER_FIELD_MISSING,
                        format!("server '{}' is missing '{}'", name, field),
                        format!("{}/{}", path, field),
                    );
                }
            }
        }
    }

    match object_at(root, "channels", "", c) {
        Some(channels) if !channels.is_empty() => c.metrics.channels = channels.len(),
        _ => c.warning(codes::EMPTY_CHANNELS, "document defines no channels", "/channels"),
    }

    match object_at(root, "operations", "", c) {
        Some(operations) if !operations.is_empty() => {
            c.metrics.operations = operations.len();
            for (name, op) in operations {
                let path = format!("/operations/{}", escape_pointer_segment(name));
                match op.get("action").and_then(Value::as_str) {
                    Some("send") | Some("receive") => {}
                    _ => c.error(
                        codes::OPERATION_FIELD_MISSING,
                        format!("operation '{}' must have an action of 'send' or 'receive'", name),
                        format!("{}/action", path),
                    ),
                }
                if op.get("channel").is_none() {
                    c.error(
                        codes::OPERATION_FIELD_MISSING,
                        format!("operation '{}' is missing 'channel'", name),
                        format!("{}/channel", path),
                    );
                }
            }
        }
        _ => c.warning(codes::EMPTY_OPERATIONS, "document defines no operations", "/operations"),
    }

    if let Some(components) = object_at(root, "components", "", c) {
        if let Some(messages) = object_at(components, "messages", "/components", c) {
            c.metrics.messages = messages.len();
        }
        if let Some(schemas) = object_at(components, "schemas", "/components", c) {
            c.metrics.schemas = schemas.len();
        }
        if let Some(schemes) = object_at(components, "securitySchemes", "/components", c) {
            c.metrics.security_schemes = schemes.len();
        }
    }
}

/// Resolve a local `$ref` one hop. Returns the unescaped segments when the
/// target exists.
fn resolve_ref(doc: &Value, reference: &str) -> Option<Vec<String>> {
    let path = reference.strip_prefix("#/")?;
    let segments: Vec<String> = path.split('/').map(unescape_pointer_segment).collect();
    let mut current = doc;
    for segment in &segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(segments)
}

/// The `$ref` member of a reference object, if it has one.
fn ref_of(value: &Value) -> Option<&Value> {
    value.get("$ref")
}

/// Check one `$ref`: it must be a local string, resolve, and sit under
/// `expected`. Anything else leaves the reference unresolved.
fn check_ref(
    doc: &Value,
    reference: &Value,
    expected: &[&str],
    code: &str,
    owner: &str,
    path: String,
    c: &mut Collector,
) {
    c.metrics.references_checked += 1;
    let Some(reference) = reference.as_str() else {
        c.error(
            code,
            format!("{} has a non-string reference {}", owner, reference),
            path,
        );
        return;
    };
    if !reference.starts_with('#') {
        c.error(
            code,
            format!(
                "{} uses non-local reference '{}', expected one into #/{}",
                owner,
                reference,
                expected.join("/")
            ),
            path,
        );
        return;
    }
    match resolve_ref(doc, reference) {
        Some(segments)
            if expected.is_empty()
                || (segments.len() == expected.len() + 1
                    && segments.iter().zip(expected).all(|(s, e)| s == e)) => {}
        Some(_) => c.error(
            code,
            format!(
                "{} reference '{}' must point into #/{}",
                owner,
                reference,
                expected.join("/")
            ),
            path,
        ),
        None => {
            let target = reference.rsplit('/').next().map(unescape_pointer_segment);
            c.error(
                code,
                format!(
                    "{} references '{}' which does not exist ({})",
                    owner,
                    target.unwrap_or_default(),
                    reference
                ),
                path,
            )
        }
    }
}

fn check_references(doc: &Value, root: &Map<String, Value>, c: &mut Collector) {
    if let Some(Value::Object(operations)) = root.get("operations") {
        for (name, op) in operations {
            let path = format!("/operations/{}", escape_pointer_segment(name));
            let owner = format!("operation '{}'", name);

            if let Some(reference) = op.get("channel").and_then(ref_of) {
                check_ref(
                    doc,
                    reference,
                    &["channels"],
                    codes::UNRESOLVED_CHANNEL_REF,
                    &owner,
                    format!("{}/channel", path),
                    c,
                );
            }

            if let Some(Value::Array(messages)) = op.get("messages") {
                for (i, msg) in messages.iter().enumerate() {
                    let Some(reference) = ref_of(msg) else {
                        continue;
                    };
                    // any local target: channel messages or components
                    check_ref(
                        doc,
                        reference,
                        &[],
                        codes::UNRESOLVED_MESSAGE_REF,
                        &owner,
                        format!("{}/messages/{}", path, i),
                        c,
                    );
                }
            }
        }
    }

    if let Some(Value::Object(channels)) = root.get("channels") {
        for (name, channel) in channels {
            let Some(Value::Object(messages)) = channel.get("messages") else {
                continue;
            };
            let owner = format!("channel '{}'", name);
            for (msg_name, msg) in messages {
                let Some(reference) = ref_of(msg) else {
                    continue;
                };
                check_ref(
                    doc,
                    reference,
                    &["components", "messages"],
                    codes::UNRESOLVED_MESSAGE_REF,
                    &owner,
                    format!(
                        "/channels/{}/messages/{}",
                        escape_pointer_segment(name),
                        escape_pointer_segment(msg_name)
                    ),
                    c,
                );
            }
        }
    }
}
