use async_trait::async_trait;
use serde_json::json;
use weavecore::{NodeExecutionData, RunContext, StepError, WorkflowNode};
use weaveruntime::{Step, StepOutput};

/// Persists the schema-generation system prompt from the node parameters
/// into the notebook metadata, where the extraction API picks it up.
pub struct SchemaGenStep;

#[async_trait]
impl Step for SchemaGenStep {
    fn step_type(&self) -> &str {
        "schema_gen"
    }

    async fn run(
        &self,
        node: &WorkflowNode,
        context: &RunContext,
        _input: NodeExecutionData,
    ) -> Result<StepOutput, StepError> {
        let prompt = node.param_str("system_prompt").unwrap_or("");
        let mut saved = false;

        if let (Some(store), false) = (context.store(), prompt.is_empty()) {
            let mut meta = store.load("meta")?.unwrap_or_else(|| json!({}));
            if let Some(obj) = meta.as_object_mut() {
                obj.insert("system_prompt".to_string(), json!(prompt));
                store.save("meta", &meta)?;
                saved = true;
            }
        }

        Ok(NodeExecutionData::from_single(json!({"system_prompt_saved": saved})).into())
    }
}
