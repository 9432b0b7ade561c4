use crate::context::{ExecutionContext, ExecutionStatus};
use crate::graph::Workflow;
use crate::node::NodeStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-node slice of a run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeReport {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub label: String,
    pub status: NodeStatus,
    pub elapsed_s: f64,
    pub error: Option<String>,
    pub summary: Option<String>,
}

/// Serializable result of one `execute()` call: run id, run status, elapsed
/// time, and one entry per node in the built graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub status: ExecutionStatus,
    pub elapsed_s: f64,
    pub nodes: BTreeMap<String, NodeReport>,
}

impl RunReport {
    pub fn from_run(exec: &ExecutionContext, workflow: &Workflow) -> Self {
        let nodes = workflow
            .nodes
            .iter()
            .map(|(id, node)| {
                (
                    id.clone(),
                    NodeReport {
                        id: id.clone(),
                        node_type: node.node_type.clone(),
                        label: node.label.clone(),
                        status: node.status,
                        elapsed_s: node.elapsed_s,
                        error: node.error.clone(),
                        summary: node.output_summary(),
                    },
                )
            })
            .collect();

        Self {
            run_id: exec.run_id.clone(),
            status: exec.status,
            elapsed_s: exec.elapsed_s,
            nodes,
        }
    }
}
