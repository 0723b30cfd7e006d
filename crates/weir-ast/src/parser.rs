use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::SourceError;
use crate::model::{qualify, Namespace, Program, StateMap};

/// Parse a host program from a YAML/JSON string.
///
/// Inline `metadata` blocks on nodes are folded into the program's state
/// table. Entries already present in the explicit `state` table win.
pub fn parse_program(input: &str) -> Result<Program, SourceError> {
    // JSON is valid YAML, so one parser handles both.
    let root: Value = serde_yaml::from_str(input).map_err(|e| SourceError::Parse(e.to_string()))?;

    let root_obj = root
        .as_object()
        .ok_or_else(|| SourceError::NotAProgram("document root must be an object".into()))?;

    if !root_obj.get("root").is_some_and(Value::is_object) {
        return Err(SourceError::NotAProgram(
            "missing 'root' namespace object".into(),
        ));
    }

    let mut program: Program =
        serde_json::from_value(root).map_err(|e| SourceError::Schema(e.to_string()))?;

    let root_id = program.root.name.clone();
    fold_metadata(&mut program.root, &root_id, &mut program.state);

    Ok(program)
}

/// Parse a program from a file path.
pub fn parse_program_file(path: &std::path::Path) -> Result<Program, SourceError> {
    let content = std::fs::read_to_string(path)?;
    parse_program(&content)
}

fn fold_metadata(ns: &mut Namespace, ns_id: &str, state: &mut StateMap) {
    merge_into_state(state, ns_id, std::mem::take(&mut ns.metadata));

    for op in &mut ns.operations {
        let id = qualify(ns_id, &op.name);
        merge_into_state(state, &id, std::mem::take(&mut op.metadata));
    }
    for model in &mut ns.models {
        let id = qualify(ns_id, &model.name);
        merge_into_state(state, &id, std::mem::take(&mut model.metadata));
    }
    for child in &mut ns.namespaces {
        let id = qualify(ns_id, &child.name);
        fold_metadata(child, &id, state);
    }
}

fn merge_into_state(state: &mut StateMap, id: &str, metadata: BTreeMap<String, Value>) {
    if metadata.is_empty() {
        return;
    }
    let entry = state.entry(id.to_string()).or_default();
    for (key, value) in metadata {
        entry.entry(key).or_insert(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Scalar, TypeRef};
    use crate::AstSource;
    use std::io::Write;

    #[test]
    fn parse_minimal_program() {
        let yaml = r#"
root:
  name: Acme
  operations:
    - name: publishUserEvent
      parameters:
        - name: event
          type: UserEvent
  models:
    - name: UserEvent
      properties:
        - name: id
          type: string
        - name: tags
          type: string[]
          optional: true
"#;
        let program = parse_program(yaml).unwrap();
        assert_eq!(program.root.name, "Acme");
        assert_eq!(program.root.operations.len(), 1);

        let model = &program.root.models[0];
        assert_eq!(model.properties[0].type_ref, TypeRef::Scalar(Scalar::String));
        assert_eq!(
            model.properties[1].type_ref,
            TypeRef::Array(Box::new(TypeRef::Scalar(Scalar::String)))
        );
        assert!(model.properties[1].optional);
    }

    #[test]
    fn parse_json_program() {
        let json = r#"{"root": {"name": "Acme", "models": [{"name": "Ping"}]}}"#;
        let program = parse_program(json).unwrap();
        assert_eq!(program.root.models[0].name, "Ping");
    }

    #[test]
    fn reject_non_program() {
        let result = parse_program("asyncapi: 3.0.0\n");
        assert!(matches!(result, Err(SourceError::NotAProgram(_))));

        let result = parse_program("- just\n- a list\n");
        assert!(matches!(result, Err(SourceError::NotAProgram(_))));
    }

    #[test]
    fn reject_bad_type_reference() {
        let yaml = r#"
root:
  models:
    - name: Broken
      properties:
        - name: x
          type: "12abc"
"#;
        let err = parse_program(yaml).unwrap_err();
        assert!(matches!(err, SourceError::Schema(_)));
        assert!(err.to_string().contains("E1004"));
    }

    #[test]
    fn explicit_state_wins_over_inline_metadata() {
        let yaml = r#"
root:
  name: Acme
  operations:
    - name: send
      metadata:
        channel: inline/path
        protocol: kafka
state:
  Acme.send:
    channel: explicit/path
"#;
        let program = parse_program(yaml).unwrap();
        assert_eq!(
            program.stored_metadata("Acme.send", "channel"),
            Some(&serde_json::json!("explicit/path"))
        );
        assert_eq!(
            program.stored_metadata("Acme.send", "protocol"),
            Some(&serde_json::json!("kafka"))
        );
    }

    #[test]
    fn parse_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"root:\n  name: FromFile\n").unwrap();
        let program = parse_program_file(file.path()).unwrap();
        assert_eq!(program.root.name, "FromFile");
    }

    #[test]
    fn type_ref_forms() {
        assert_eq!(
            TypeRef::parse("Record<int32>").unwrap(),
            TypeRef::Record(Box::new(TypeRef::Scalar(Scalar::Int32)))
        );
        assert_eq!(
            TypeRef::parse("Acme.User[]").unwrap(),
            TypeRef::Array(Box::new(TypeRef::Model("Acme.User".into())))
        );
        assert_eq!(
            TypeRef::parse("string | null").unwrap(),
            TypeRef::Union(vec![
                TypeRef::Scalar(Scalar::String),
                TypeRef::Scalar(Scalar::Null)
            ])
        );
        assert_eq!(TypeRef::parse("User[]").unwrap().to_string(), "User[]");
        assert!(TypeRef::parse("").is_err());
        assert!(TypeRef::parse("a-b").is_err());
    }

    #[test]
    fn unions_nest_inside_records() {
        let nullable = TypeRef::Union(vec![
            TypeRef::Scalar(Scalar::String),
            TypeRef::Scalar(Scalar::Null),
        ]);
        let record = TypeRef::parse("Record<string | null>").unwrap();
        assert_eq!(record, TypeRef::Record(Box::new(nullable.clone())));
        assert_eq!(record.to_string(), "Record<string | null>");

        assert_eq!(
            TypeRef::parse("Record<string | null> | User").unwrap(),
            TypeRef::Union(vec![
                TypeRef::Record(Box::new(nullable)),
                TypeRef::Model("User".into())
            ])
        );
        assert!(TypeRef::parse("Record<string | null").is_err());
    }
}
