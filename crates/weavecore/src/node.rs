use crate::envelope::ChannelOutputs;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Node-level status. Transitions are monotonic within one invocation:
/// `Idle -> Running -> {Success | Error | Skipped}`, with `Skipped` also
/// reachable straight from `Idle` (disabled node or unregistered type).
/// `Waiting` is reserved; a node waits simply by not being queued yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Idle,
    Running,
    Success,
    Error,
    Skipped,
    Waiting,
}

/// A node's static definition plus the runtime fields the engine fills in
/// during a run. The runtime fields are only ever mutated by the engine.
#[derive(Debug, Clone)]
pub struct WorkflowNode {
    pub id: String,
    pub node_type: String,
    pub label: String,
    pub icon: String,
    pub desc: String,
    pub position: (f64, f64),
    pub parameters: serde_json::Map<String, Value>,
    pub disabled: bool,

    // Runtime state, reset by each build.
    pub status: NodeStatus,
    pub output_data: ChannelOutputs,
    pub error: Option<String>,
    pub elapsed_s: f64,
}

impl WorkflowNode {
    /// Parameter lookup as a string, for steps with simple text config.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }

    /// Summary of the last `main` output, if the node produced one.
    pub fn output_summary(&self) -> Option<String> {
        self.output_data
            .get(&crate::definition::Channel::Main)
            .and_then(|slots| slots.first())
            .and_then(|slot| slot.as_ref())
            .map(|data| data.summary())
    }
}
