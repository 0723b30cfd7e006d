//! Read access to a host program.
//!
//! The emitter only ever sees the host through [`AstSource`]: the namespace
//! tree, plus a decorator side table looked up by node id and key.

use serde_json::Value;

use crate::model::{qualify, ModelNode, Namespace, OperationNode, Program};

/// Read-only view of a host program.
pub trait AstSource: Send + Sync {
    /// The root namespace.
    fn root(&self) -> &Namespace;

    /// Decorator metadata stored for `node_id` under `key`.
    fn stored_metadata(&self, node_id: &str, key: &str) -> Option<&Value>;

    /// Documentation comment attached to a node.
    fn doc(&self, node_id: &str) -> Option<&str>;
}

/// A node paired with its qualified id and the id of its enclosing namespace.
#[derive(Debug, Clone)]
pub struct Located<'a, T> {
    pub id: String,
    pub namespace: String,
    pub node: &'a T,
}

impl AstSource for Program {
    fn root(&self) -> &Namespace {
        &self.root
    }

    fn stored_metadata(&self, node_id: &str, key: &str) -> Option<&Value> {
        self.state.get(node_id)?.get(key)
    }

    fn doc(&self, node_id: &str) -> Option<&str> {
        find_doc(&self.root, &self.root.name, node_id)
    }
}

fn find_doc<'a>(ns: &'a Namespace, ns_id: &str, target: &str) -> Option<&'a str> {
    if ns_id == target {
        return ns.doc.as_deref();
    }
    for op in &ns.operations {
        if qualify(ns_id, &op.name) == target {
            return op.doc.as_deref();
        }
    }
    for model in &ns.models {
        if qualify(ns_id, &model.name) == target {
            return model.doc.as_deref();
        }
    }
    ns.namespaces
        .iter()
        .find_map(|child| find_doc(child, &qualify(ns_id, &child.name), target))
}

/// Every namespace in the tree, root first (pre-order).
pub fn list_namespaces(root: &Namespace) -> Vec<Located<'_, Namespace>> {
    let mut out = Vec::new();
    walk_namespaces(root, root.name.clone(), String::new(), &mut out);
    out
}

fn walk_namespaces<'a>(
    ns: &'a Namespace,
    id: String,
    parent: String,
    out: &mut Vec<Located<'a, Namespace>>,
) {
    let children: Vec<(String, &Namespace)> = ns
        .namespaces
        .iter()
        .map(|child| (qualify(&id, &child.name), child))
        .collect();
    out.push(Located {
        id: id.clone(),
        namespace: parent,
        node: ns,
    });
    for (child_id, child) in children {
        walk_namespaces(child, child_id, id.clone(), out);
    }
}

/// Every operation in the tree, collected by one recursive namespace walk.
pub fn list_operations(root: &Namespace) -> Vec<Located<'_, OperationNode>> {
    list_namespaces(root)
        .into_iter()
        .flat_map(|ns| {
            let Located { id, node, .. } = ns;
            node.operations.iter().map(move |op| Located {
                id: qualify(&id, &op.name),
                namespace: id.clone(),
                node: op,
            })
        })
        .collect()
}

/// Every model in the tree.
pub fn list_models(root: &Namespace) -> Vec<Located<'_, ModelNode>> {
    list_namespaces(root)
        .into_iter()
        .flat_map(|ns| {
            let Located { id, node, .. } = ns;
            node.models.iter().map(move |model| Located {
                id: qualify(&id, &model.name),
                namespace: id.clone(),
                node: model,
            })
        })
        .collect()
}

/// Models carrying metadata under `key`.
pub fn list_annotated_models<'a>(
    source: &'a dyn AstSource,
    key: &str,
) -> Vec<Located<'a, ModelNode>> {
    list_models(source.root())
        .into_iter()
        .filter(|m| source.stored_metadata(&m.id, key).is_some())
        .collect()
}
