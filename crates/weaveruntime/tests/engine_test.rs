use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use weavecore::{
    Channel, ConnectionDefinition, EngineEvent, EventError, EventSink, ExecutionStatus,
    NodeDefinition, NodeExecutionData, NodeStatus, RunContext, StepError, WorkflowDefinition,
    WorkflowNode,
};
use weaveruntime::{Step, StepOutput, StepRegistry, WorkflowEngine};

/// Records every (node id, input payload) invocation it sees, then emits a
/// payload tagged with the node id.
struct RecorderStep {
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

#[async_trait]
impl Step for RecorderStep {
    fn step_type(&self) -> &str {
        "record"
    }

    async fn run(
        &self,
        node: &WorkflowNode,
        _context: &RunContext,
        input: NodeExecutionData,
    ) -> Result<StepOutput, StepError> {
        self.calls
            .lock()
            .unwrap()
            .push((node.id.clone(), input.first_item()));
        Ok(NodeExecutionData::from_single(json!({"from": node.id})).into())
    }
}

/// Always fails with a fixed message.
struct FailingStep;

#[async_trait]
impl Step for FailingStep {
    fn step_type(&self) -> &str {
        "fail"
    }

    async fn run(
        &self,
        _node: &WorkflowNode,
        _context: &RunContext,
        _input: NodeExecutionData,
    ) -> Result<StepOutput, StepError> {
        Err(StepError::failed("boom"))
    }
}

/// Collects every event the engine emits, in order.
#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingSink {
    fn kinds(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| format!("{}:{}", e.kind(), e.node_id()))
            .collect()
    }

    fn count_kind(&self, kind: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind() == kind)
            .count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &EngineEvent) -> Result<(), EventError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Rejects every event, to prove sink failures stay out of the run.
struct RejectingSink;

impl EventSink for RejectingSink {
    fn emit(&self, _event: &EngineEvent) -> Result<(), EventError> {
        Err(EventError::Rejected("full".to_string()))
    }
}

fn test_engine() -> (WorkflowEngine, Arc<Mutex<Vec<(String, Value)>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut registry = StepRegistry::new();
    registry.register(Arc::new(RecorderStep {
        calls: calls.clone(),
    }));
    registry.register(Arc::new(FailingStep));
    (WorkflowEngine::new(Arc::new(registry)), calls)
}

fn node(id: &str, step_type: &str) -> NodeDefinition {
    NodeDefinition::new(id, step_type)
}

#[tokio::test]
async fn test_linear_pipeline_runs_in_order() {
    let (engine, calls) = test_engine();

    let mut definition = WorkflowDefinition::new("linear");
    definition.add_node(node("a", "record"));
    definition.add_node(node("b", "record"));
    definition.add_node(node("c", "record"));
    definition.connect("a", "b");
    definition.connect("b", "c");

    let mut workflow = engine.build(definition);
    let sink = RecordingSink::default();
    let exec = engine
        .execute(&mut workflow, &RunContext::new(), Some(&sink))
        .await;

    assert_eq!(exec.status, ExecutionStatus::Success);
    for id in ["a", "b", "c"] {
        assert_eq!(workflow.nodes[id].status, NodeStatus::Success, "node {id}");
    }

    let invoked: Vec<String> = calls
        .lock()
        .unwrap()
        .iter()
        .map(|(id, _)| id.clone())
        .collect();
    assert_eq!(invoked, vec!["a", "b", "c"]);

    assert_eq!(
        sink.kinds(),
        vec![
            "workflow:started:",
            "node:started:a",
            "node:finished:a",
            "node:started:b",
            "node:finished:b",
            "node:started:c",
            "node:finished:c",
            "workflow:finished:",
        ]
    );
}

#[tokio::test]
async fn test_fan_in_waits_for_all_upstreams() {
    let (engine, calls) = test_engine();

    let mut definition = WorkflowDefinition::new("fan-in");
    definition.add_node(node("a", "record"));
    definition.add_node(node("b", "record"));
    definition.add_node(node("d", "record"));
    definition
        .connections
        .push(ConnectionDefinition::new("a", "d").into_index(0));
    definition
        .connections
        .push(ConnectionDefinition::new("b", "d").into_index(1));

    let mut workflow = engine.build(definition);
    let sink = RecordingSink::default();
    engine
        .execute(&mut workflow, &RunContext::new(), Some(&sink))
        .await;

    let calls = calls.lock().unwrap();
    let d_calls: Vec<&Value> = calls
        .iter()
        .filter(|(id, _)| id == "d")
        .map(|(_, input)| input)
        .collect();
    assert_eq!(d_calls.len(), 1, "join node must fire exactly once");
    // The primary input is whatever landed in slot 0
    assert_eq!(*d_calls[0], json!({"from": "a"}));

    // d starts only after both upstreams finished
    let kinds = sink.kinds();
    let d_start = kinds.iter().position(|k| k == "node:started:d").unwrap();
    let a_done = kinds.iter().position(|k| k == "node:finished:a").unwrap();
    let b_done = kinds.iter().position(|k| k == "node:finished:b").unwrap();
    assert!(d_start > a_done && d_start > b_done);
}

#[tokio::test]
async fn test_diamond_fan_out_then_join() {
    let (engine, calls) = test_engine();

    let mut definition = WorkflowDefinition::new("diamond");
    definition.add_node(node("a", "record"));
    definition.add_node(node("b", "record"));
    definition.add_node(node("c", "record"));
    definition.add_node(node("d", "record"));
    definition.connect("a", "b");
    definition.connect("a", "c");
    definition
        .connections
        .push(ConnectionDefinition::new("b", "d").into_index(0));
    definition
        .connections
        .push(ConnectionDefinition::new("c", "d").into_index(1));

    let mut workflow = engine.build(definition);
    let sink = RecordingSink::default();
    engine
        .execute(&mut workflow, &RunContext::new(), Some(&sink))
        .await;

    assert_eq!(
        sink.kinds(),
        vec![
            "workflow:started:",
            "node:started:a",
            "node:finished:a",
            "node:started:b",
            "node:finished:b",
            "node:started:c",
            "node:finished:c",
            "node:started:d",
            "node:finished:d",
            "workflow:finished:",
        ]
    );

    let calls = calls.lock().unwrap();
    let d_calls: Vec<&Value> = calls
        .iter()
        .filter(|(id, _)| id == "d")
        .map(|(_, input)| input)
        .collect();
    assert_eq!(d_calls.len(), 1);
    assert_eq!(*d_calls[0], json!({"from": "b"}));
}

#[tokio::test]
async fn test_failure_routes_to_error_channel_only() {
    let (engine, calls) = test_engine();

    let mut definition = WorkflowDefinition::new("error-routing");
    definition.add_node(node("a", "record"));
    definition.add_node(node("b", "fail"));
    definition.add_node(node("c", "record"));
    definition.add_node(node("handler", "record"));
    definition.connect("a", "b");
    definition.connect("b", "c");
    definition
        .connections
        .push(ConnectionDefinition::new("b", "handler").on_channel(Channel::Error));

    let mut workflow = engine.build(definition);
    let sink = RecordingSink::default();
    let exec = engine
        .execute(&mut workflow, &RunContext::new(), Some(&sink))
        .await;

    // The run itself still finishes clean
    assert_eq!(exec.status, ExecutionStatus::Success);

    assert_eq!(workflow.nodes["b"].status, NodeStatus::Error);
    assert_eq!(workflow.nodes["b"].error.as_deref(), Some("boom"));
    // The happy path downstream of the failure never runs
    assert_eq!(workflow.nodes["c"].status, NodeStatus::Idle);

    let calls = calls.lock().unwrap();
    let handler_input = calls
        .iter()
        .find(|(id, _)| id == "handler")
        .map(|(_, input)| input.clone())
        .expect("error handler must run");
    assert_eq!(handler_input, json!({"error": "boom", "node": "b"}));

    assert_eq!(sink.count_kind("node:error"), 1);
}

#[tokio::test]
async fn test_pinned_output_bypasses_execution() {
    let (engine, calls) = test_engine();

    let mut definition = WorkflowDefinition::new("pinned");
    // a would fail if it actually ran
    definition.add_node(node("a", "fail"));
    definition.add_node(node("b", "record"));
    definition.connect("a", "b");
    definition.pin_data.insert(
        "a".to_string(),
        NodeExecutionData::from_single(json!({"pinned": "payload"})).items,
    );

    let mut workflow = engine.build(definition);
    let sink = RecordingSink::default();
    engine
        .execute(&mut workflow, &RunContext::new(), Some(&sink))
        .await;

    assert_eq!(workflow.nodes["a"].status, NodeStatus::Success);
    assert_eq!(sink.count_kind("node:error"), 0);

    let pinned_finish = sink
        .events
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, EngineEvent::NodeFinished { node_id, pinned: true, .. } if node_id == "a"));
    assert!(pinned_finish, "a must finish as pinned");

    let calls = calls.lock().unwrap();
    let b_input = calls
        .iter()
        .find(|(id, _)| id == "b")
        .map(|(_, input)| input.clone())
        .expect("b must run on the pinned payload");
    assert_eq!(b_input, json!({"pinned": "payload"}));
}

#[tokio::test]
async fn test_disabled_node_passes_input_through() {
    let (engine, calls) = test_engine();

    let mut definition = WorkflowDefinition::new("disabled");
    definition.add_node(node("a", "record"));
    definition.add_node(NodeDefinition::new("b", "record").with_label("off"));
    definition.add_node(node("c", "record"));
    definition.nodes[1].disabled = true;
    definition.connect("a", "b");
    definition.connect("b", "c");

    let mut workflow = engine.build(definition);
    let sink = RecordingSink::default();
    engine
        .execute(&mut workflow, &RunContext::new(), Some(&sink))
        .await;

    // b never executes, c sees a's output untouched
    let calls = calls.lock().unwrap();
    assert!(calls.iter().all(|(id, _)| id != "b"));
    let c_input = calls
        .iter()
        .find(|(id, _)| id == "c")
        .map(|(_, input)| input.clone())
        .unwrap();
    assert_eq!(c_input, json!({"from": "a"}));

    let skipped = sink
        .events
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, EngineEvent::NodeSkipped { node_id, reason, .. }
            if node_id == "b" && reason == "disabled"));
    assert!(skipped);
}

#[tokio::test]
async fn test_disabled_fan_in_forwards_each_delivery() {
    let (engine, calls) = test_engine();

    // Two upstreams feed a disabled node; it forwards per delivery instead
    // of joining, so the downstream fires twice.
    let mut definition = WorkflowDefinition::new("disabled-fan-in");
    definition.add_node(node("a", "record"));
    definition.add_node(node("b", "record"));
    definition.add_node(node("d", "record"));
    definition.add_node(node("c", "record"));
    definition.nodes[2].disabled = true;
    definition.connect("a", "d");
    definition.connect("b", "d");
    definition.connect("d", "c");

    let mut workflow = engine.build(definition);
    engine.execute(&mut workflow, &RunContext::new(), None).await;

    let calls = calls.lock().unwrap();
    let c_count = calls.iter().filter(|(id, _)| id == "c").count();
    assert_eq!(c_count, 2, "each forwarded delivery triggers c");
}

#[tokio::test]
async fn test_unregistered_type_skips_but_unblocks_join() {
    let (engine, calls) = test_engine();

    let mut definition = WorkflowDefinition::new("unregistered");
    definition.add_node(node("a", "record"));
    definition.add_node(node("b", "mystery"));
    definition.add_node(node("c", "record"));
    definition
        .connections
        .push(ConnectionDefinition::new("a", "c").into_index(0));
    definition
        .connections
        .push(ConnectionDefinition::new("b", "c").into_index(1));

    let mut workflow = engine.build(definition);
    let sink = RecordingSink::default();
    engine
        .execute(&mut workflow, &RunContext::new(), Some(&sink))
        .await;

    assert_eq!(workflow.nodes["b"].status, NodeStatus::Skipped);
    assert_eq!(workflow.nodes["c"].status, NodeStatus::Success);

    let calls = calls.lock().unwrap();
    let c_count = calls.iter().filter(|(id, _)| id == "c").count();
    assert_eq!(c_count, 1, "skipped upstream still satisfies the join");
}

#[tokio::test]
async fn test_disabled_start_node_is_not_seeded() {
    let (engine, calls) = test_engine();

    let mut definition = WorkflowDefinition::new("disabled-start");
    definition.add_node(node("a", "record"));
    definition.nodes[0].disabled = true;

    let mut workflow = engine.build(definition);
    let sink = RecordingSink::default();
    let exec = engine
        .execute(&mut workflow, &RunContext::new(), Some(&sink))
        .await;

    assert_eq!(exec.status, ExecutionStatus::Success);
    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(workflow.nodes["a"].status, NodeStatus::Idle);
    // Only the workflow-level pair fires
    assert_eq!(sink.kinds(), vec!["workflow:started:", "workflow:finished:"]);
}

#[tokio::test]
async fn test_empty_workflow_finishes_clean() {
    let (engine, _) = test_engine();

    let mut workflow = engine.build(WorkflowDefinition::new("empty"));
    let exec = engine.execute(&mut workflow, &RunContext::new(), None).await;

    assert_eq!(exec.status, ExecutionStatus::Success);
    assert!(exec.run_data.is_empty());
}

#[tokio::test]
async fn test_dangling_connection_is_ignored_at_runtime() {
    let (engine, calls) = test_engine();

    let mut definition = WorkflowDefinition::new("dangling");
    definition.add_node(node("a", "record"));
    definition.connect("a", "ghost");

    let mut workflow = engine.build(definition);
    let exec = engine.execute(&mut workflow, &RunContext::new(), None).await;

    assert_eq!(exec.status, ExecutionStatus::Success);
    assert_eq!(calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_legacy_edges_run_end_to_end() {
    let (engine, calls) = test_engine();

    let definition = WorkflowDefinition::parse(json!({
        "name": "legacy",
        "nodes": [
            {"id": "a", "type": "record"},
            {"id": "b", "type": "record"}
        ],
        "edges": [{"source": "a", "target": "b"}]
    }))
    .unwrap();

    let mut workflow = engine.build(definition);
    engine.execute(&mut workflow, &RunContext::new(), None).await;

    let calls = calls.lock().unwrap();
    let invoked: Vec<&str> = calls.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(invoked, vec!["a", "b"]);
}

#[tokio::test]
async fn test_sink_failures_never_abort_the_run() {
    let (engine, calls) = test_engine();

    let mut definition = WorkflowDefinition::new("bad-sink");
    definition.add_node(node("a", "record"));
    definition.add_node(node("b", "record"));
    definition.connect("a", "b");

    let mut workflow = engine.build(definition);
    let exec = engine
        .execute(&mut workflow, &RunContext::new(), Some(&RejectingSink))
        .await;

    assert_eq!(exec.status, ExecutionStatus::Success);
    assert_eq!(calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_error_node_leaves_no_run_record() {
    let (engine, _) = test_engine();

    let mut definition = WorkflowDefinition::new("records");
    definition.add_node(node("a", "record"));
    definition.add_node(node("b", "fail"));
    definition.connect("a", "b");

    let mut workflow = engine.build(definition);
    let exec = engine.execute(&mut workflow, &RunContext::new(), None).await;

    assert!(exec.run_data.contains_key("a"));
    // Failures are visible on node state and events, not the run log
    assert!(!exec.run_data.contains_key("b"));
}
