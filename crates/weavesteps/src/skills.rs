use async_trait::async_trait;
use serde_json::json;
use weavecore::{NodeExecutionData, RunContext, StepError, WorkflowNode};
use weaveruntime::{Step, StepOutput};

/// A pipeline phase driven by a different API surface.
///
/// Covers the LLM-backed phases (extract, validate, reduce, classify,
/// package): running them inside the graph would duplicate the batch
/// machinery behind the execute API, so the node just reports where the
/// work actually happens.
pub struct DelegatedStep {
    step_type: &'static str,
    reason: &'static str,
}

impl DelegatedStep {
    pub const fn new(step_type: &'static str, reason: &'static str) -> Self {
        Self { step_type, reason }
    }
}

#[async_trait]
impl Step for DelegatedStep {
    fn step_type(&self) -> &str {
        self.step_type
    }

    async fn run(
        &self,
        _node: &WorkflowNode,
        _context: &RunContext,
        _input: NodeExecutionData,
    ) -> Result<StepOutput, StepError> {
        Ok(NodeExecutionData::from_single(json!({
            "status": "delegated",
            "reason": self.reason,
        }))
        .into())
    }
}
