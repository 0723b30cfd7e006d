use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::SourceError;

/// Decorator state: node id -> metadata key -> value.
pub type StateMap = BTreeMap<String, BTreeMap<String, Value>>;

/// A loaded host program: the namespace tree plus its decorator state table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// The root namespace.
    pub root: Namespace,
    /// Metadata attached to nodes, keyed by dot-qualified node id.
    #[serde(default)]
    pub state: StateMap,
}

/// A namespace node. Namespaces nest and own operations and models.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub namespaces: Vec<Namespace>,
    #[serde(default)]
    pub operations: Vec<OperationNode>,
    #[serde(default)]
    pub models: Vec<ModelNode>,
    /// Inline decorator metadata, folded into [`Program::state`] on load.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

/// An operation declared in a namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationNode {
    pub name: String,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterNode>,
    #[serde(default)]
    pub returns: Option<TypeRef>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

/// An operation parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterNode {
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub doc: Option<String>,
}

/// A model (record type) declared in a namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelNode {
    pub name: String,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyNode>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

/// A model property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyNode {
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub doc: Option<String>,
}

/// Built-in scalar types of the host language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    String,
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Integer,
    Float32,
    Float64,
    Numeric,
    UtcDateTime,
    PlainDate,
    PlainTime,
    Duration,
    Bytes,
    Url,
    Null,
    Unknown,
}

impl Scalar {
    /// Look up a scalar by its host-language name.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "string" => Self::String,
            "boolean" => Self::Boolean,
            "int8" | "uint8" => Self::Int8,
            "int16" | "uint16" => Self::Int16,
            "int32" | "uint32" | "safeint" => Self::Int32,
            "int64" | "uint64" => Self::Int64,
            "integer" => Self::Integer,
            "float32" => Self::Float32,
            "float64" | "float" => Self::Float64,
            "numeric" | "decimal" | "decimal128" => Self::Numeric,
            "utcDateTime" | "offsetDateTime" => Self::UtcDateTime,
            "plainDate" => Self::PlainDate,
            "plainTime" => Self::PlainTime,
            "duration" => Self::Duration,
            "bytes" => Self::Bytes,
            "url" => Self::Url,
            "null" | "void" => Self::Null,
            "unknown" => Self::Unknown,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Integer => "integer",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Numeric => "numeric",
            Self::UtcDateTime => "utcDateTime",
            Self::PlainDate => "plainDate",
            Self::PlainTime => "plainTime",
            Self::Duration => "duration",
            Self::Bytes => "bytes",
            Self::Url => "url",
            Self::Null => "null",
            Self::Unknown => "unknown",
        }
    }
}

/// A reference to a type, written in source form (`string`, `User[]`, `Record<int32>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeRef {
    Scalar(Scalar),
    Array(Box<TypeRef>),
    Record(Box<TypeRef>),
    Union(Vec<TypeRef>),
    /// A named model, possibly namespace-qualified.
    Model(String),
}

impl TypeRef {
    /// Parse a type reference from its source form.
    pub fn parse(input: &str) -> Result<Self, SourceError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(SourceError::InvalidTypeRef(input.to_string()));
        }

        let parts = split_union(s);
        if parts.len() > 1 {
            let variants = parts
                .into_iter()
                .map(TypeRef::parse)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(TypeRef::Union(variants));
        }

        if let Some(inner) = s.strip_suffix("[]") {
            return Ok(TypeRef::Array(Box::new(TypeRef::parse(inner)?)));
        }

        if let Some(inner) = s.strip_prefix("Record<").and_then(|r| r.strip_suffix('>')) {
            return Ok(TypeRef::Record(Box::new(TypeRef::parse(inner)?)));
        }

        if let Some(scalar) = Scalar::from_name(s) {
            return Ok(TypeRef::Scalar(scalar));
        }

        let valid_ident = s
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        if valid_ident {
            Ok(TypeRef::Model(s.to_string()))
        } else {
            Err(SourceError::InvalidTypeRef(input.to_string()))
        }
    }

    /// The model name, if this is a direct model reference.
    pub fn model_name(&self) -> Option<&str> {
        match self {
            TypeRef::Model(name) => Some(name),
            _ => None,
        }
    }
}

/// Split on `|` outside angle brackets.
fn split_union(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            '|' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Scalar(s) => f.write_str(s.name()),
            TypeRef::Array(inner) => write!(f, "{}[]", inner),
            TypeRef::Record(inner) => write!(f, "Record<{}>", inner),
            TypeRef::Union(variants) => {
                for (i, v) in variants.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{}", v)?;
                }
                Ok(())
            }
            TypeRef::Model(name) => f.write_str(name),
        }
    }
}

impl TryFrom<String> for TypeRef {
    type Error = SourceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TypeRef::parse(&value)
    }
}

impl From<TypeRef> for String {
    fn from(value: TypeRef) -> Self {
        value.to_string()
    }
}

/// Join a parent node id and a child name into a dot-qualified id.
pub fn qualify(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}
