//! Document skeleton construction.
//!
//! The builder produces a document whose every container (`channels`,
//! `operations`, `components.schemas`, `components.messages`,
//! `components.securitySchemes`) already exists, seeded with servers declared
//! on namespaces. Failures here are fatal for the run.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use weir_ast::{list_namespaces, AstSource};
use weir_asyncapi::{AsyncApiDocument, Info, Server, ServerVariable, ASYNCAPI_VERSION};

use crate::config::{EmitterConfig, DEFAULT_TITLE, DEFAULT_VERSION};
use crate::discovery::keys;
use crate::error::{codes, EmitError};

/// A server declared in namespace metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerDeclaration {
    /// Key under `servers`.
    pub name: String,
    /// Id of the declaring namespace.
    pub namespace: String,
    pub url: String,
    pub host: String,
    pub protocol: String,
    pub pathname: Option<String>,
    pub protocol_version: Option<String>,
    pub description: Option<String>,
    pub variables: BTreeMap<String, ServerVariable>,
    /// Per-protocol binding configuration.
    pub bindings: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ServerMetadata {
    #[serde(default)]
    name: Option<String>,
    url: String,
    #[serde(default)]
    protocol: Option<String>,
    #[serde(default)]
    protocol_version: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    variables: BTreeMap<String, ServerVariable>,
    #[serde(default)]
    bindings: BTreeMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct InfoMetadata {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Builds the initial document.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentBuilder;

impl DocumentBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the skeleton: info, servers and empty containers.
    pub fn create_initial_document(
        &self,
        source: &dyn AstSource,
        config: &EmitterConfig,
    ) -> Result<AsyncApiDocument, EmitError> {
        let servers = self.server_declarations(source)?;
        self.build_document(source, config, &servers)
    }

    /// Build the skeleton from already collected server declarations.
    pub fn build_document(
        &self,
        source: &dyn AstSource,
        config: &EmitterConfig,
        servers: &[ServerDeclaration],
    ) -> Result<AsyncApiDocument, EmitError> {
        let info = resolve_info(source, config)?;
        let mut doc = AsyncApiDocument::new(info);

        for decl in servers {
            let server = Server {
                host: decl.host.clone(),
                protocol: decl.protocol.clone(),
                protocol_version: decl.protocol_version.clone(),
                pathname: decl.pathname.clone(),
                description: decl.description.clone(),
                variables: decl.variables.clone(),
                security: Vec::new(),
                bindings: BTreeMap::new(),
            };
            if doc.servers.insert(decl.name.clone(), server).is_some() {
                tracing::warn!(server = %decl.name, namespace = %decl.namespace, "duplicate server name, last declaration wins");
            }
        }

        weir_telemetry::log_document_initialized!(
            title = %doc.info.title,
            version = %doc.info.version,
            servers = doc.servers.len(),
            "document skeleton created"
        );
        Ok(doc)
    }

    /// Collect `server` declarations from every namespace.
    pub fn server_declarations(
        &self,
        source: &dyn AstSource,
    ) -> Result<Vec<ServerDeclaration>, EmitError> {
        let mut out = Vec::new();
        for ns in list_namespaces(source.root()) {
            let Some(value) = source.stored_metadata(&ns.id, keys::SERVER) else {
                continue;
            };
            let entries: Vec<&Value> = match value {
                Value::Array(items) => items.iter().collect(),
                other => vec![other],
            };
            for (index, entry) in entries.into_iter().enumerate() {
                let decl = parse_server(entry, &ns.id, &ns.node.name, index).map_err(|reason| {
                    EmitError::compilation(
                        codes::DOCUMENT_INIT_FAILED,
                        format!("invalid server declaration: {}", reason),
                    )
                    .with_context("namespace", ns.id.clone())
                })?;
                out.push(decl);
            }
        }
        Ok(out)
    }
}

fn resolve_info(source: &dyn AstSource, config: &EmitterConfig) -> Result<Info, EmitError> {
    let root_id = source.root().name.clone();
    let meta: InfoMetadata = match source.stored_metadata(&root_id, keys::INFO) {
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            EmitError::compilation(
                codes::DOCUMENT_INIT_FAILED,
                format!("invalid info metadata: {}", e),
            )
            .with_context("namespace", root_id.clone())
        })?,
        None => InfoMetadata::default(),
    };

    let pick = |ast: Option<String>, cfg: &Option<String>| {
        ast.filter(|v| !v.trim().is_empty())
            .or_else(|| cfg.clone().filter(|v| !v.trim().is_empty()))
    };

    let title = pick(meta.title, &config.info.title).unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let version =
        pick(meta.version, &config.info.version).unwrap_or_else(|| DEFAULT_VERSION.to_string());
    let description = pick(meta.description, &config.info.description)
        .or_else(|| source.doc(&root_id).map(str::to_string));

    let mut info = Info::new(title, version);
    info.description = description;
    Ok(info)
}

fn parse_server(
    value: &Value,
    namespace: &str,
    namespace_name: &str,
    index: usize,
) -> Result<ServerDeclaration, String> {
    let meta: ServerMetadata = serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
    if meta.url.trim().is_empty() {
        return Err("url must not be empty".into());
    }

    let (scheme, rest) = match meta.url.split_once("://") {
        Some((scheme, rest)) => (Some(scheme.to_lowercase()), rest),
        None => (None, meta.url.as_str()),
    };
    let (host, pathname) = match rest.find('/') {
        Some(pos) => (&rest[..pos], Some(rest[pos..].to_string())),
        None => (rest, None),
    };
    if host.is_empty() {
        return Err(format!("url '{}' has no host", meta.url));
    }

    let protocol = meta
        .protocol
        .map(|p| p.to_lowercase())
        .or(scheme)
        .ok_or_else(|| format!("server '{}' needs a protocol or a url scheme", meta.url))?;

    let name = match meta.name.filter(|n| !n.trim().is_empty()) {
        Some(name) => name,
        None if index == 0 => namespace_name.to_lowercase(),
        None => format!("{}-{}", namespace_name.to_lowercase(), index),
    };

    let bindings = meta
        .bindings
        .into_iter()
        .map(|(protocol, config)| (protocol.to_lowercase(), config))
        .collect();

    Ok(ServerDeclaration {
        name,
        namespace: namespace.to_string(),
        host: host.to_string(),
        pathname: pathname.filter(|p| p != "/"),
        url: meta.url,
        protocol,
        protocol_version: meta.protocol_version,
        description: meta.description,
        variables: meta.variables,
        bindings,
    })
}

/// Ensure `components` and its three maps exist on an untyped document.
///
/// Idempotent; existing entries are left untouched.
pub fn initialize_components(doc: &mut Value) {
    let Some(root) = doc.as_object_mut() else {
        return;
    };
    let components = root
        .entry("components")
        .or_insert_with(|| Value::Object(Map::new()));
    if !components.is_object() {
        *components = Value::Object(Map::new());
    }
    if let Some(components) = components.as_object_mut() {
        for key in ["schemas", "messages", "securitySchemes"] {
            let entry = components
                .entry(key)
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
        }
    }
}

/// Ensure the full top-level structure exists on an untyped document.
///
/// Fills in `asyncapi`, `info.title`, `info.version`, `channels`,
/// `operations` and the component maps where missing. Idempotent.
pub fn initialize_document_structure(doc: &mut Value) {
    if !doc.is_object() {
        *doc = Value::Object(Map::new());
    }
    let Some(root) = doc.as_object_mut() else {
        return;
    };

    root.entry("asyncapi")
        .or_insert_with(|| Value::String(ASYNCAPI_VERSION.to_string()));

    let info = root
        .entry("info")
        .or_insert_with(|| Value::Object(Map::new()));
    if !info.is_object() {
        *info = Value::Object(Map::new());
    }
    if let Some(info) = info.as_object_mut() {
        info.entry("title")
            .or_insert_with(|| Value::String(DEFAULT_TITLE.to_string()));
        info.entry("version")
            .or_insert_with(|| Value::String(DEFAULT_VERSION.to_string()));
    }

    for key in ["channels", "operations"] {
        let entry = root.entry(key).or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
    }

    initialize_components(doc);
}
