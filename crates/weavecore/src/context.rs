use crate::definition::Channel;
use crate::envelope::{ChannelOutputs, Item, NodeExecutionData};
use crate::node::NodeStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Run-level status. Only `New -> Running -> Success` is reached today;
/// `Error`, `Cancelled`, and `Waiting` are reserved for a cancellation
/// feature that is not wired up yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    #[default]
    New,
    Running,
    Success,
    Error,
    Cancelled,
    Waiting,
}

/// One execution-queue entry: the target node, its assembled input payload
/// (one slot per `main` input index), and the provenance of each slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteData {
    pub node_id: String,
    pub input: ChannelOutputs,
    pub source: HashMap<Channel, Vec<Option<String>>>,
}

impl ExecuteData {
    pub fn new(node_id: impl Into<String>, input: ChannelOutputs, previous: Option<&str>) -> Self {
        let mut source = HashMap::new();
        source.insert(Channel::Main, vec![previous.map(str::to_string)]);
        Self {
            node_id: node_id.into(),
            input,
            source,
        }
    }

    /// The first `main` input slot, or the empty sentinel.
    pub fn main_input(&self) -> NodeExecutionData {
        self.input
            .get(&Channel::Main)
            .and_then(|slots| slots.first())
            .and_then(|slot| slot.clone())
            .unwrap_or_else(NodeExecutionData::empty)
    }

    /// All `main` input slots, one per input index.
    pub fn main_slots(&self) -> &[Option<NodeExecutionData>] {
        self.input
            .get(&Channel::Main)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Partially filled join buffer for a node still waiting on upstream data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitingInputs {
    pub main: Vec<Option<NodeExecutionData>>,
    pub needed: usize,
    pub received: usize,
}

/// One per-invocation result summary, appended to the run log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRunRecord {
    pub status: NodeStatus,
    pub elapsed_s: f64,
    pub error: Option<String>,
    pub summary: Option<String>,
}

/// Per-run mutable state: the FIFO execution queue, the join-wait table, and
/// the run log. Exclusively owned by the run that created it; safe to read
/// once `execute()` returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub run_id: String,
    pub status: ExecutionStatus,
    pub execution_queue: VecDeque<ExecuteData>,
    pub waiting_execution: HashMap<String, WaitingInputs>,
    pub run_data: HashMap<String, Vec<NodeRunRecord>>,
    pub started_at: DateTime<Utc>,
    pub elapsed_s: f64,
    pub pin_data: HashMap<String, Vec<Item>>,
}

impl ExecutionContext {
    pub fn new(pin_data: HashMap<String, Vec<Item>>) -> Self {
        let started_at = Utc::now();
        Self {
            run_id: format!("run-{}", started_at.timestamp_millis()),
            status: ExecutionStatus::New,
            execution_queue: VecDeque::new(),
            waiting_execution: HashMap::new(),
            run_data: HashMap::new(),
            started_at,
            elapsed_s: 0.0,
            pin_data,
        }
    }
}
