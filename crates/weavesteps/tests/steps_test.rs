use serde_json::json;
use std::sync::Arc;
use weavecore::{
    ChannelOutputs, NodeExecutionData, NodeStatus, RunContext, StateStore, WorkflowNode,
};
use weaveruntime::{Step, StepRegistry};
use weavesteps::{ChunkerStep, DocumentLoaderStep, FileNotebook, SchemaGenStep};

fn test_node(id: &str, step_type: &str) -> WorkflowNode {
    WorkflowNode {
        id: id.to_string(),
        node_type: step_type.to_string(),
        label: id.to_string(),
        icon: String::new(),
        desc: String::new(),
        position: (0.0, 0.0),
        parameters: serde_json::Map::new(),
        disabled: false,
        status: NodeStatus::Idle,
        output_data: ChannelOutputs::new(),
        error: None,
        elapsed_s: 0.0,
    }
}

fn notebook_context(dir: &std::path::Path) -> (RunContext, Arc<FileNotebook>) {
    let store = Arc::new(FileNotebook::open(dir).unwrap());
    (
        RunContext::with_store(store.clone(), "test-notebook"),
        store,
    )
}

#[test]
fn test_file_notebook_layout() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileNotebook::open(dir.path()).unwrap();

    store.save("meta", &json!({"title": "doc"})).unwrap();
    store.save("chunks", &json!(["one", "two"])).unwrap();

    assert!(dir.path().join("meta.json").exists());
    assert!(dir.path().join("text").join("chunks.json").exists());

    assert_eq!(store.load("meta").unwrap(), Some(json!({"title": "doc"})));
    assert_eq!(store.load("chunks").unwrap(), Some(json!(["one", "two"])));
    assert_eq!(store.load("schema").unwrap(), None);
}

#[tokio::test]
async fn test_document_loader_surfaces_meta() {
    let dir = tempfile::tempdir().unwrap();
    let (context, store) = notebook_context(dir.path());
    store
        .save("meta", &json!({"title": "intro", "pages": 3}))
        .unwrap();

    let step = DocumentLoaderStep;
    let output = step
        .run(
            &test_node("load", "document_loader"),
            &context,
            NodeExecutionData::empty(),
        )
        .await
        .unwrap();

    let data = output.into_channels();
    let main = data[&weavecore::Channel::Main][0].as_ref().unwrap();
    assert_eq!(main.first_item(), json!({"title": "intro", "pages": 3}));
}

#[tokio::test]
async fn test_document_loader_without_store_reports_skipped() {
    let step = DocumentLoaderStep;
    let output = step
        .run(
            &test_node("load", "document_loader"),
            &RunContext::new(),
            NodeExecutionData::empty(),
        )
        .await
        .unwrap();

    let data = output.into_channels();
    let main = data[&weavecore::Channel::Main][0].as_ref().unwrap();
    assert_eq!(main.first_item()["status"], json!("skipped"));
}

#[tokio::test]
async fn test_chunker_reports_chunk_count() {
    let dir = tempfile::tempdir().unwrap();
    let (context, store) = notebook_context(dir.path());
    store
        .save("chunks", &json!(["alpha", "beta", "gamma"]))
        .unwrap();

    let step = ChunkerStep;
    let output = step
        .run(
            &test_node("chunk", "chunker"),
            &context,
            NodeExecutionData::empty(),
        )
        .await
        .unwrap();

    let data = output.into_channels();
    let main = data[&weavecore::Channel::Main][0].as_ref().unwrap();
    let payload = main.first_item();
    assert_eq!(payload["count"], json!(3));
    assert_eq!(main.summary(), "3 chunks");
}

#[tokio::test]
async fn test_schema_gen_persists_system_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let (context, store) = notebook_context(dir.path());
    store.save("meta", &json!({"title": "doc"})).unwrap();

    let mut node = test_node("schema", "schema_gen");
    node.parameters.insert(
        "system_prompt".to_string(),
        json!("Extract teachable skills."),
    );

    let step = SchemaGenStep;
    let output = step
        .run(&node, &context, NodeExecutionData::empty())
        .await
        .unwrap();

    let data = output.into_channels();
    let main = data[&weavecore::Channel::Main][0].as_ref().unwrap();
    assert_eq!(main.first_item()["system_prompt_saved"], json!(true));

    let meta = store.load("meta").unwrap().unwrap();
    assert_eq!(meta["system_prompt"], json!("Extract teachable skills."));
    assert_eq!(meta["title"], json!("doc"));
}

#[tokio::test]
async fn test_schema_gen_without_prompt_saves_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (context, store) = notebook_context(dir.path());

    let step = SchemaGenStep;
    let output = step
        .run(
            &test_node("schema", "schema_gen"),
            &context,
            NodeExecutionData::empty(),
        )
        .await
        .unwrap();

    let data = output.into_channels();
    let main = data[&weavecore::Channel::Main][0].as_ref().unwrap();
    assert_eq!(main.first_item()["system_prompt_saved"], json!(false));
    assert_eq!(store.load("meta").unwrap(), None);
}

#[test]
fn test_register_all_covers_the_pipeline() {
    let mut registry = StepRegistry::new();
    weavesteps::register_all(&mut registry);

    for step_type in [
        "document_loader",
        "chunker",
        "semantic_filter",
        "schema_gen",
        "extractor",
        "validator",
        "reducer",
        "classifier",
        "packager",
    ] {
        assert!(
            registry.get(step_type).is_some(),
            "missing step type {step_type}"
        );
    }
}

#[tokio::test]
async fn test_delegated_steps_report_their_reason() {
    let mut registry = StepRegistry::new();
    weavesteps::register_all(&mut registry);

    let step = registry.get("extractor").unwrap();
    let output = step
        .run(
            &test_node("extract", "extractor"),
            &RunContext::new(),
            NodeExecutionData::empty(),
        )
        .await
        .unwrap();

    let data = output.into_channels();
    let main = data[&weavecore::Channel::Main][0].as_ref().unwrap();
    let payload = main.first_item();
    assert_eq!(payload["status"], json!("delegated"));
    assert!(payload["reason"].is_string());
}
