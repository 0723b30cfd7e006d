use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::plugin::BindingFragment;

/// What one or more plugin invocations contribute to a document.
///
/// Merging is additive: later merges never remove keys, and a key present
/// on both sides takes the later value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtocolBindingResult {
    /// Protocol name -> binding object.
    #[serde(default)]
    pub bindings: BTreeMap<String, BindingFragment>,
    /// Extra channel fragments keyed by channel name.
    #[serde(default)]
    pub channels: BTreeMap<String, Value>,
    /// Extra operation fragments keyed by operation name.
    #[serde(default)]
    pub operations: BTreeMap<String, Value>,
    /// Extra component schemas keyed by schema name.
    #[serde(default)]
    pub components: BTreeMap<String, Value>,
}

impl ProtocolBindingResult {
    /// A result holding a single protocol binding.
    pub fn single(protocol: impl Into<String>, fragment: BindingFragment) -> Self {
        let mut bindings = BTreeMap::new();
        bindings.insert(protocol.into(), fragment);
        Self {
            bindings,
            ..Default::default()
        }
    }

    /// Merge `other` into `self`.
    ///
    /// Binding fragments for the same protocol are merged field by field.
    pub fn merge(&mut self, other: ProtocolBindingResult) {
        for (protocol, fragment) in other.bindings {
            self.bindings.entry(protocol).or_default().extend(fragment);
        }
        self.channels.extend(other.channels);
        self.operations.extend(other.operations);
        self.components.extend(other.components);
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
            && self.channels.is_empty()
            && self.operations.is_empty()
            && self.components.is_empty()
    }

    /// The bindings as a protocol -> object map, ready to drop into a document.
    pub fn binding_values(&self) -> BTreeMap<String, Value> {
        self.bindings
            .iter()
            .map(|(protocol, fragment)| (protocol.clone(), Value::Object(fragment.clone())))
            .collect()
    }
}
