use crate::definition::Channel;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

/// One item record inside an envelope. The payload lives under the `json`
/// key; other keys carry optional metadata.
pub type Item = serde_json::Map<String, Value>;

/// Per-channel node output: one slot per output index.
pub type ChannelOutputs = HashMap<Channel, Vec<Option<NodeExecutionData>>>;

/// The data envelope passed between nodes.
///
/// Always holds at least one item; where a node has nothing to say it emits
/// the empty sentinel `[{"json": {}}]` so downstream code can read the first
/// item without checking. Envelopes are copy-on-write: a step that wants to
/// mutate its input must clone it first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeExecutionData {
    pub items: Vec<Item>,
}

impl NodeExecutionData {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }

    /// Envelope carrying a single payload under the `json` key.
    pub fn from_single(data: Value) -> Self {
        let mut item = Item::new();
        item.insert("json".to_string(), data);
        Self { items: vec![item] }
    }

    /// The empty sentinel: one item with an empty payload.
    pub fn empty() -> Self {
        Self::from_single(json!({}))
    }

    /// Payload of the first item, or an empty object.
    pub fn first_item(&self) -> Value {
        self.items
            .first()
            .and_then(|item| item.get("json"))
            .cloned()
            .unwrap_or_else(|| json!({}))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Short human-readable description of the envelope contents, used in
    /// `node:finished` events and run reports.
    pub fn summary(&self) -> String {
        if self.items.is_empty() {
            return "empty".to_string();
        }
        let first = self.items[0].get("json");
        if let Some(skills) = first.and_then(|j| j.get("skills")).and_then(Value::as_array) {
            return format!("{} skills", skills.len());
        }
        if let Some(chunks) = first.and_then(|j| j.get("chunks")).and_then(Value::as_array) {
            return format!("{} chunks", chunks.len());
        }
        format!("{} items", self.items.len())
    }
}

impl From<Value> for NodeExecutionData {
    fn from(data: Value) -> Self {
        Self::from_single(data)
    }
}
