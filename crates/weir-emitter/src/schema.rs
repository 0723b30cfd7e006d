//! Model to JSON Schema conversion.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use weir_ast::{ModelNode, Scalar, TypeRef};

use crate::discovery::TypeIndex;
use crate::error::{codes, EmitError};

/// Converts a model's data shape into a JSON Schema body.
#[async_trait]
pub trait SchemaConverter: Send + Sync {
    async fn convert(&self, model: &ModelNode, types: &TypeIndex) -> Result<Value, EmitError>;
}

/// Default converter. Nested models are inlined.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSchemaConverter;

#[async_trait]
impl SchemaConverter for JsonSchemaConverter {
    async fn convert(&self, model: &ModelNode, types: &TypeIndex) -> Result<Value, EmitError> {
        let mut stack = vec![model.name.clone()];
        object_schema(model, types, &mut stack)
    }
}

fn object_schema(
    model: &ModelNode,
    types: &TypeIndex,
    stack: &mut Vec<String>,
) -> Result<Value, EmitError> {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for prop in &model.properties {
        let mut schema = type_schema(&prop.type_ref, types, stack)?;
        if let (Some(doc), Value::Object(obj)) = (&prop.doc, &mut schema) {
            obj.insert("description".into(), Value::String(doc.clone()));
        }
        properties.insert(prop.name.clone(), schema);
        if !prop.optional {
            required.push(Value::String(prop.name.clone()));
        }
    }

    let mut schema = Map::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".into(), Value::Array(required));
    }
    if let Some(doc) = &model.doc {
        schema.insert("description".into(), Value::String(doc.clone()));
    }
    Ok(Value::Object(schema))
}

fn type_schema(
    type_ref: &TypeRef,
    types: &TypeIndex,
    stack: &mut Vec<String>,
) -> Result<Value, EmitError> {
    match type_ref {
        TypeRef::Scalar(scalar) => Ok(scalar_schema(*scalar)),
        TypeRef::Array(inner) => Ok(json!({
            "type": "array",
            "items": type_schema(inner, types, stack)?,
        })),
        TypeRef::Record(inner) => Ok(json!({
            "type": "object",
            "additionalProperties": type_schema(inner, types, stack)?,
        })),
        TypeRef::Union(variants) => {
            let schemas = variants
                .iter()
                .map(|v| type_schema(v, types, stack))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(json!({ "oneOf": schemas }))
        }
        TypeRef::Model(name) => {
            let (id, model) = types.get(name).ok_or_else(|| {
                EmitError::type_error(codes::UNKNOWN_TYPE, format!("unknown type '{}'", name))
                    .with_context("type", name.clone())
            })?;
            if stack.iter().any(|seen| seen == id || seen == &model.name) {
                return Err(EmitError::type_error(
                    codes::CIRCULAR_REFERENCE,
                    format!(
                        "circular model reference: {} -> {}",
                        stack.join(" -> "),
                        model.name
                    ),
                )
                .with_context("type", name.clone()));
            }

            stack.push(id.to_string());
            let schema = object_schema(model, types, stack);
            stack.pop();
            schema
        }
    }
}

fn scalar_schema(scalar: Scalar) -> Value {
    match scalar {
        Scalar::String => json!({ "type": "string" }),
        Scalar::Boolean => json!({ "type": "boolean" }),
        Scalar::Int8 | Scalar::Int16 | Scalar::Int32 => json!({ "type": "integer", "format": "int32" }),
        Scalar::Int64 => json!({ "type": "integer", "format": "int64" }),
        Scalar::Integer => json!({ "type": "integer" }),
        Scalar::Float32 => json!({ "type": "number", "format": "float" }),
        Scalar::Float64 => json!({ "type": "number", "format": "double" }),
        Scalar::Numeric => json!({ "type": "number" }),
        Scalar::UtcDateTime => json!({ "type": "string", "format": "date-time" }),
        Scalar::PlainDate => json!({ "type": "string", "format": "date" }),
        Scalar::PlainTime => json!({ "type": "string", "format": "time" }),
        Scalar::Duration => json!({ "type": "string", "format": "duration" }),
        Scalar::Bytes => json!({ "type": "string", "contentEncoding": "base64" }),
        Scalar::Url => json!({ "type": "string", "format": "uri" }),
        Scalar::Null => json!({ "type": "null" }),
        Scalar::Unknown => json!({}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::DiscoveryService;
    use crate::error::ErrorCategory;
    use weir_ast::parse_program;

    const PROGRAM: &str = r#"
root:
  name: Shop
  models:
    - name: Order
      doc: A placed order
      properties:
        - name: id
          type: string
          doc: Order id
        - name: placedAt
          type: utcDateTime
        - name: lines
          type: Line[]
        - name: tags
          type: Record<string>
        - name: note
          type: string | null
          optional: true
    - name: Line
      properties:
        - name: sku
          type: string
        - name: quantity
          type: int32
    - name: Node
      properties:
        - name: next
          type: Node
          optional: true
    - name: Dangling
      properties:
        - name: ghost
          type: Ghost
"#;

    fn model<'a>(types: &'a TypeIndex, name: &str) -> &'a ModelNode {
        types.get(name).unwrap().1
    }

    fn types() -> TypeIndex {
        let program = parse_program(PROGRAM).unwrap();
        DiscoveryService::new().execute_discovery(&program).types
    }

    #[tokio::test]
    async fn converts_nested_models_inline() {
        let types = types();
        let schema = JsonSchemaConverter
            .convert(model(&types, "Order"), &types)
            .await
            .unwrap();

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["description"], "A placed order");
        assert_eq!(schema["required"], json!(["id", "placedAt", "lines", "tags"]));
        assert_eq!(schema["properties"]["id"]["description"], "Order id");
        assert_eq!(schema["properties"]["placedAt"]["format"], "date-time");
        assert_eq!(
            schema["properties"]["lines"]["items"]["properties"]["quantity"],
            json!({"type": "integer", "format": "int32"})
        );
        assert_eq!(
            schema["properties"]["tags"]["additionalProperties"],
            json!({"type": "string"})
        );
        assert_eq!(
            schema["properties"]["note"]["oneOf"],
            json!([{"type": "string"}, {"type": "null"}])
        );
    }

    #[tokio::test]
    async fn circular_reference_is_a_type_error() {
        let types = types();
        let err = JsonSchemaConverter
            .convert(model(&types, "Node"), &types)
            .await
            .unwrap_err();
        assert_eq!(err.category, ErrorCategory::Type);
        assert_eq!(err.code, codes::CIRCULAR_REFERENCE);
    }

    #[tokio::test]
    async fn unknown_type_is_a_type_error() {
        let types = types();
        let err = JsonSchemaConverter
            .convert(model(&types, "Dangling"), &types)
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::UNKNOWN_TYPE);
        assert_eq!(err.context["type"], "Ghost");
    }
}
