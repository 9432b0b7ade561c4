use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use weavecore::{Channel, ChannelOutputs, NodeExecutionData, RunContext, StepError, WorkflowNode};

/// A step's produced output: either a bare envelope, which the engine wraps
/// as `{main: [data]}`, or an explicit per-channel map so a step can route
/// conditionally (e.g. `main` vs `error`) without the engine interpreting
/// business logic.
#[derive(Debug, Clone)]
pub enum StepOutput {
    Single(NodeExecutionData),
    Routed(ChannelOutputs),
}

impl StepOutput {
    /// A routed output with one envelope on one channel.
    pub fn on_channel(channel: Channel, data: NodeExecutionData) -> Self {
        let mut channels = ChannelOutputs::new();
        channels.insert(channel, vec![Some(data)]);
        StepOutput::Routed(channels)
    }

    /// Normalize to the per-channel form used by propagation.
    pub fn into_channels(self) -> ChannelOutputs {
        match self {
            StepOutput::Single(data) => {
                let mut channels = ChannelOutputs::new();
                channels.insert(Channel::Main, vec![Some(data)]);
                channels
            }
            StepOutput::Routed(channels) => channels,
        }
    }
}

impl From<NodeExecutionData> for StepOutput {
    fn from(data: NodeExecutionData) -> Self {
        StepOutput::Single(data)
    }
}

/// An executable unit of work, selected by a node's `type` string.
#[async_trait]
pub trait Step: Send + Sync {
    /// Registry key (e.g. "chunker", "extractor").
    fn step_type(&self) -> &str;

    /// Run against one input envelope. Errors are caught by the engine and
    /// routed to the node's `error` channel; they never abort the run.
    async fn run(
        &self,
        node: &WorkflowNode,
        context: &RunContext,
        input: NodeExecutionData,
    ) -> Result<StepOutput, StepError>;
}

/// Maps node `type` strings to step implementations.
///
/// An owned instance, injected into the engine, so multiple engines with
/// different step sets can coexist. An unregistered type is not fatal: the
/// engine marks the node skipped and propagates an empty envelope so
/// downstream joins still complete.
#[derive(Default)]
pub struct StepRegistry {
    steps: HashMap<String, Arc<dyn Step>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, step: Arc<dyn Step>) {
        let step_type = step.step_type().to_string();
        tracing::info!("registering step type: {}", step_type);
        self.steps.insert(step_type, step);
    }

    pub fn get(&self, step_type: &str) -> Option<Arc<dyn Step>> {
        self.steps.get(step_type).cloned()
    }

    pub fn list_step_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.steps.keys().cloned().collect();
        types.sort();
        types
    }
}
