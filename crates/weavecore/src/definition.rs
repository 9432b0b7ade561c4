use crate::envelope::Item;
use crate::error::DefinitionError;
use chrono::Utc;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Output/input category of a connection.
///
/// Definitions come from untrusted, user-editable JSON, so an unrecognized
/// channel string degrades to `Main` instead of failing the parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Channel {
    #[default]
    Main,
    Error,
    AiTool,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Main => "main",
            Channel::Error => "error",
            Channel::AiTool => "ai_tool",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "error" => Channel::Error,
            "ai_tool" => Channel::AiTool,
            _ => Channel::Main,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Channel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Channel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Channel::parse(&s))
    }
}

/// A node as persisted in a workflow definition. Everything except `id` is
/// optional; `label`, `icon`, `desc`, and `position` are display-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub id: String,
    #[serde(default = "default_node_type", rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default, deserialize_with = "lenient_position")]
    pub position: (f64, f64),
    #[serde(default, alias = "config")]
    pub parameters: serde_json::Map<String, Value>,
    #[serde(default)]
    pub disabled: bool,
}

fn default_node_type() -> String {
    "unknown".to_string()
}

/// Accepts `[x, y]` or an editor-style `{"x": .., "y": ..}` object; anything
/// else falls back to the origin.
fn lenient_position<'de, D: Deserializer<'de>>(deserializer: D) -> Result<(f64, f64), D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(parts) => {
            let x = parts.first().and_then(Value::as_f64).unwrap_or(0.0);
            let y = parts.get(1).and_then(Value::as_f64).unwrap_or(0.0);
            (x, y)
        }
        Value::Object(map) => {
            let mut coords = map.values().filter_map(Value::as_f64);
            (coords.next().unwrap_or(0.0), coords.next().unwrap_or(0.0))
        }
        _ => (0.0, 0.0),
    })
}

impl NodeDefinition {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            label: String::new(),
            icon: String::new(),
            desc: String::new(),
            position: (0.0, 0.0),
            parameters: serde_json::Map::new(),
            disabled: false,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = (x, y);
        self
    }
}

/// A directed, channel-typed, indexed edge between two node slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDefinition {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub target: String,
    #[serde(default, rename = "sourceOutputType")]
    pub source_output_type: Channel,
    #[serde(default, rename = "sourceOutputIndex")]
    pub source_output_index: usize,
    #[serde(default, rename = "targetInputType")]
    pub target_input_type: Channel,
    #[serde(default, rename = "targetInputIndex")]
    pub target_input_index: usize,
}

impl ConnectionDefinition {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            source_output_type: Channel::Main,
            source_output_index: 0,
            target_input_type: Channel::Main,
            target_input_index: 0,
        }
    }

    pub fn on_channel(mut self, channel: Channel) -> Self {
        self.source_output_type = channel;
        self
    }

    pub fn into_channel(mut self, channel: Channel) -> Self {
        self.target_input_type = channel;
        self
    }

    pub fn into_index(mut self, target_input_index: usize) -> Self {
        self.target_input_index = target_input_index;
        self
    }
}

/// Legacy edge form: a plain source -> target pair, normalized at parse time
/// to a single-channel index-0 connection.
#[derive(Debug, Clone, Deserialize)]
struct EdgeDefinition {
    #[serde(default)]
    source: String,
    #[serde(default)]
    target: String,
}

/// The persisted form of a workflow: raw nodes, typed connections, settings,
/// and pinned outputs. No referential-integrity checks happen here; the
/// graph builder drops dangling connections silently.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkflowDefinition {
    pub id: String,
    pub name: String,
    pub nodes: Vec<NodeDefinition>,
    pub connections: Vec<ConnectionDefinition>,
    pub settings: serde_json::Map<String, Value>,
    #[serde(rename = "pinData")]
    pub pin_data: HashMap<String, Vec<Item>>,
}

#[derive(Deserialize)]
struct RawDefinition {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    nodes: Vec<NodeDefinition>,
    #[serde(default)]
    connections: Vec<ConnectionDefinition>,
    #[serde(default)]
    edges: Vec<EdgeDefinition>,
    #[serde(default)]
    settings: serde_json::Map<String, Value>,
    #[serde(default, alias = "pinData")]
    pin_data: HashMap<String, Vec<Item>>,
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: generated_id(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parse a definition from raw JSON, accepting the modern `connections`
    /// list or the legacy `edges` list, and `pinData` under either spelling.
    pub fn parse(raw: Value) -> Result<Self, DefinitionError> {
        let raw: RawDefinition = serde_json::from_value(raw)?;

        let connections = if raw.connections.is_empty() && !raw.edges.is_empty() {
            raw.edges
                .into_iter()
                .map(|e| ConnectionDefinition::new(e.source, e.target))
                .collect()
        } else {
            raw.connections
        };

        Ok(Self {
            id: if raw.id.is_empty() { generated_id() } else { raw.id },
            name: raw.name,
            nodes: raw.nodes,
            connections,
            settings: raw.settings,
            pin_data: raw.pin_data,
        })
    }

    pub fn from_str(s: &str) -> Result<Self, DefinitionError> {
        Self::parse(serde_json::from_str(s)?)
    }

    pub fn add_node(&mut self, node: NodeDefinition) {
        self.nodes.push(node);
    }

    pub fn connect(&mut self, source: impl Into<String>, target: impl Into<String>) {
        self.connections.push(ConnectionDefinition::new(source, target));
    }
}

impl<'de> Deserialize<'de> for WorkflowDefinition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        WorkflowDefinition::parse(raw).map_err(de::Error::custom)
    }
}

fn generated_id() -> String {
    format!("wf-{}", Utc::now().timestamp_millis())
}
