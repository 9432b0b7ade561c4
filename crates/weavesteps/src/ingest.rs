use async_trait::async_trait;
use serde_json::json;
use weavecore::{NodeExecutionData, RunContext, StepError, WorkflowNode};
use weaveruntime::{Step, StepOutput};

/// Surfaces the document metadata recorded at upload time.
pub struct DocumentLoaderStep;

#[async_trait]
impl Step for DocumentLoaderStep {
    fn step_type(&self) -> &str {
        "document_loader"
    }

    async fn run(
        &self,
        _node: &WorkflowNode,
        context: &RunContext,
        _input: NodeExecutionData,
    ) -> Result<StepOutput, StepError> {
        if let Some(store) = context.store() {
            if let Some(meta) = store.load("meta")? {
                return Ok(NodeExecutionData::from_single(meta).into());
            }
        }
        Ok(NodeExecutionData::from_single(json!({
            "status": "skipped",
            "reason": "completed during upload",
        }))
        .into())
    }
}

/// Surfaces the chunk list produced by the markdown chunker.
pub struct ChunkerStep;

#[async_trait]
impl Step for ChunkerStep {
    fn step_type(&self) -> &str {
        "chunker"
    }

    async fn run(
        &self,
        _node: &WorkflowNode,
        context: &RunContext,
        _input: NodeExecutionData,
    ) -> Result<StepOutput, StepError> {
        if let Some(store) = context.store() {
            if let Some(chunks) = store.load("chunks")? {
                let count = chunks.as_array().map(Vec::len).unwrap_or(0);
                return Ok(NodeExecutionData::from_single(json!({
                    "chunks": chunks,
                    "count": count,
                }))
                .into());
            }
        }
        Ok(NodeExecutionData::from_single(json!({"status": "skipped"})).into())
    }
}

/// Density filtering already happens at upload; this node only reports it.
pub struct SemanticFilterStep;

#[async_trait]
impl Step for SemanticFilterStep {
    fn step_type(&self) -> &str {
        "semantic_filter"
    }

    async fn run(
        &self,
        _node: &WorkflowNode,
        _context: &RunContext,
        _input: NodeExecutionData,
    ) -> Result<StepOutput, StepError> {
        Ok(NodeExecutionData::from_single(json!({
            "status": "done",
            "reason": "applied during upload",
        }))
        .into())
    }
}
