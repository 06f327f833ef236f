use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;

use super::Soul;

/// A node accepted by [`GraphStore::put`].
#[derive(Debug, Clone, PartialEq)]
pub struct Stored {
    pub soul: Soul,
    pub value: Value,
}

/// Append-only mapping from souls to JSON nodes.
///
/// Every put mints a fresh soul, so entries are never overwritten. The set of
/// known souls is the key set of the map.
#[derive(Debug, Default)]
pub struct GraphStore {
    graph: RwLock<HashMap<Soul, Value>>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a structured value (object or array) under a new soul.
    ///
    /// Primitives and null are not stored and yield `None`.
    pub fn put(&self, value: Value) -> Option<Stored> {
        if !is_structured(&value) {
            return None;
        }

        let mut graph = self.graph.write();
        let mut soul = Soul::mint();
        while graph.contains_key(&soul) {
            soul = Soul::mint();
        }
        graph.insert(soul.clone(), value.clone());

        Some(Stored { soul, value })
    }

    pub fn get(&self, soul: &str) -> Option<Value> {
        self.graph.read().get(soul).cloned()
    }

    pub fn contains(&self, soul: &str) -> bool {
        self.graph.read().contains_key(soul)
    }

    pub fn len(&self) -> usize {
        self.graph.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.read().is_empty()
    }

    /// Snapshot of every known soul, in no particular order.
    pub fn souls(&self) -> Vec<Soul> {
        self.graph.read().keys().cloned().collect()
    }
}

/// Whether a value is accepted as a node.
pub fn is_structured(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

/// Short name of a JSON value's kind, for log lines and rejection frames.
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
