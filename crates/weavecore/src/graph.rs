use crate::definition::{Channel, WorkflowDefinition};
use crate::envelope::{ChannelOutputs, Item};
use crate::node::{NodeStatus, WorkflowNode};
use serde_json::Value;
use std::collections::HashMap;

type ConnectionIndex = HashMap<String, HashMap<Channel, Vec<(String, usize)>>>;

/// The built, queryable runtime graph: a node map plus bidirectional
/// connection indices derived once per run.
///
/// Connections whose source or target does not exist are dropped silently at
/// build time; definitions are untrusted JSON and must degrade, never error.
/// One `Workflow` may be driven by at most one `execute()` call at a time —
/// concurrent runs of the same definition must each build their own graph.
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub settings: serde_json::Map<String, Value>,
    pub pin_data: HashMap<String, Vec<Item>>,
    pub nodes: HashMap<String, WorkflowNode>,

    /// Node ids in definition order; keeps seeding and reports deterministic.
    order: Vec<String>,
    /// `[source][channel] -> [(target, target input index)]`
    connections_by_source: ConnectionIndex,
    /// `[target][channel] -> [(source, source output index)]`
    connections_by_dest: ConnectionIndex,
}

impl Workflow {
    pub fn build(definition: WorkflowDefinition) -> Self {
        let mut nodes = HashMap::new();
        let mut order = Vec::with_capacity(definition.nodes.len());

        for nd in definition.nodes {
            let label = if nd.label.is_empty() { nd.id.clone() } else { nd.label };
            let node = WorkflowNode {
                id: nd.id.clone(),
                node_type: nd.node_type,
                label,
                icon: nd.icon,
                desc: nd.desc,
                position: nd.position,
                parameters: nd.parameters,
                disabled: nd.disabled,
                status: NodeStatus::Idle,
                output_data: ChannelOutputs::new(),
                error: None,
                elapsed_s: 0.0,
            };
            if !order.contains(&nd.id) {
                order.push(nd.id.clone());
            }
            nodes.insert(nd.id, node);
        }

        let mut connections_by_source: ConnectionIndex = HashMap::new();
        let mut connections_by_dest: ConnectionIndex = HashMap::new();

        for conn in definition.connections {
            if conn.source.is_empty() || conn.target.is_empty() {
                continue;
            }
            if !nodes.contains_key(&conn.source) || !nodes.contains_key(&conn.target) {
                tracing::debug!(
                    source = %conn.source,
                    target = %conn.target,
                    "dropping connection with missing endpoint"
                );
                continue;
            }
            connections_by_source
                .entry(conn.source.clone())
                .or_default()
                .entry(conn.source_output_type)
                .or_default()
                .push((conn.target.clone(), conn.target_input_index));
            connections_by_dest
                .entry(conn.target)
                .or_default()
                .entry(conn.target_input_type)
                .or_default()
                .push((conn.source, conn.source_output_index));
        }

        Self {
            id: definition.id,
            name: definition.name,
            settings: definition.settings,
            pin_data: definition.pin_data,
            nodes,
            order,
            connections_by_source,
            connections_by_dest,
        }
    }

    /// Node ids in definition order.
    pub fn node_order(&self) -> &[String] {
        &self.order
    }

    /// Nodes with no incoming `main` connection. Incoming `error` or
    /// `ai_tool` connections do not disqualify a start node.
    pub fn start_nodes(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| self.upstream_count(id, Channel::Main) == 0)
            .cloned()
            .collect()
    }

    /// Downstream `(target, target input index)` pairs for one output channel.
    pub fn downstream(&self, node_id: &str, channel: Channel) -> &[(String, usize)] {
        self.connections_by_source
            .get(node_id)
            .and_then(|by_channel| by_channel.get(&channel))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of connections landing on `(node, channel)`. Counts
    /// connections, not distinct upstream nodes: two connections from the
    /// same source into two input indices both count, and size the join
    /// buffer accordingly.
    pub fn upstream_count(&self, node_id: &str, channel: Channel) -> usize {
        self.connections_by_dest
            .get(node_id)
            .and_then(|by_channel| by_channel.get(&channel))
            .map(Vec::len)
            .unwrap_or(0)
    }
}
