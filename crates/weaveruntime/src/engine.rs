use crate::registry::StepRegistry;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use weavecore::{
    Channel, ChannelOutputs, EngineEvent, EventSink, ExecuteData, ExecutionContext,
    ExecutionStatus, NodeExecutionData, NodeRunRecord, NodeStatus, RunContext, WaitingInputs,
    Workflow, WorkflowDefinition,
};

/// Breadth-first workflow executor.
///
/// Pops queue entries FIFO, awaits each step to completion, and propagates
/// produced outputs downstream, joining multi-input nodes once every
/// required `main` slot has a value. Failures stay local to their node: the
/// run always drains the queue and finishes `success`.
pub struct WorkflowEngine {
    registry: Arc<StepRegistry>,
}

impl WorkflowEngine {
    pub fn new(registry: Arc<StepRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<StepRegistry> {
        &self.registry
    }

    /// Build the runtime graph for a definition. Each concurrent run needs
    /// its own graph; node runtime state lives on the `Workflow`.
    pub fn build(&self, definition: WorkflowDefinition) -> Workflow {
        Workflow::build(definition)
    }

    /// Run a workflow to completion, emitting events through `sink` as each
    /// transition happens. Sink failures are logged and never re-raised.
    pub async fn execute(
        &self,
        workflow: &mut Workflow,
        context: &RunContext,
        sink: Option<&dyn EventSink>,
    ) -> ExecutionContext {
        let mut exec = ExecutionContext::new(workflow.pin_data.clone());
        exec.status = ExecutionStatus::Running;
        let run_id = exec.run_id.clone();
        let run_start = Instant::now();

        emit(
            sink,
            EngineEvent::WorkflowStarted {
                run_id: run_id.clone(),
                timestamp: Utc::now(),
            },
        );

        // Seed the queue with every node lacking a main upstream. Disabled
        // start nodes are dropped here rather than queued.
        let start_nodes = workflow.start_nodes();
        for node_id in &start_nodes {
            let disabled = workflow
                .nodes
                .get(node_id)
                .map(|n| n.disabled)
                .unwrap_or(false);
            if disabled {
                continue;
            }
            exec.execution_queue.push_back(ExecuteData::new(
                node_id.clone(),
                single_main(NodeExecutionData::empty()),
                None,
            ));
        }
        tracing::info!(run_id = %run_id, start_nodes = ?start_nodes, "workflow run started");

        while let Some(execute_data) = exec.execution_queue.pop_front() {
            let node_id = execute_data.node_id.clone();
            let Some(node) = workflow.nodes.get(&node_id) else {
                tracing::warn!(run_id = %run_id, node_id = %node_id, "queued node does not exist, skipping");
                continue;
            };

            if node.disabled {
                // Transparent passthrough: the unmodified input goes out on main.
                emit(
                    sink,
                    EngineEvent::NodeSkipped {
                        node_id: node_id.clone(),
                        reason: "disabled".to_string(),
                        timestamp: Utc::now(),
                    },
                );
                let output = single_main(execute_data.main_input());
                self.propagate(workflow, &mut exec, &node_id, &output);
                continue;
            }

            // Pinned output replaces real execution entirely.
            if let Some(pin_items) = exec.pin_data.get(&node_id).cloned() {
                let pinned = NodeExecutionData::new(pin_items);
                let output = single_main(pinned.clone());
                if let Some(node) = workflow.nodes.get_mut(&node_id) {
                    node.status = NodeStatus::Success;
                    node.output_data = output.clone();
                }
                emit(
                    sink,
                    EngineEvent::NodeFinished {
                        node_id: node_id.clone(),
                        elapsed_s: 0.0,
                        summary: pinned.summary(),
                        pinned: true,
                        timestamp: Utc::now(),
                    },
                );
                record_run(&mut exec, workflow, &node_id);
                self.propagate(workflow, &mut exec, &node_id, &output);
                continue;
            }

            let (node_type, label) = match workflow.nodes.get_mut(&node_id) {
                Some(node) => {
                    node.status = NodeStatus::Running;
                    (node.node_type.clone(), node.label.clone())
                }
                None => continue,
            };
            emit(
                sink,
                EngineEvent::NodeStarted {
                    node_id: node_id.clone(),
                    node_type: node_type.clone(),
                    label,
                    timestamp: Utc::now(),
                },
            );

            let started = Instant::now();
            let Some(step) = self.registry.get(&node_type) else {
                // Unregistered type: skip, but still unblock downstream joins.
                if let Some(node) = workflow.nodes.get_mut(&node_id) {
                    node.status = NodeStatus::Skipped;
                    node.elapsed_s = round2(started.elapsed().as_secs_f64());
                }
                emit(
                    sink,
                    EngineEvent::NodeSkipped {
                        node_id: node_id.clone(),
                        reason: format!("unregistered type: {node_type}"),
                        timestamp: Utc::now(),
                    },
                );
                let output = single_main(NodeExecutionData::empty());
                self.propagate(workflow, &mut exec, &node_id, &output);
                continue;
            };

            let input = execute_data.main_input();
            let snapshot = match workflow.nodes.get(&node_id) {
                Some(node) => node.clone(),
                None => continue,
            };

            match step.run(&snapshot, context, input).await {
                Ok(result) => {
                    let output = result.into_channels();
                    let elapsed = round2(started.elapsed().as_secs_f64());
                    if let Some(node) = workflow.nodes.get_mut(&node_id) {
                        node.status = NodeStatus::Success;
                        node.output_data = output.clone();
                        node.elapsed_s = elapsed;
                    }
                    let summary = output
                        .get(&Channel::Main)
                        .and_then(|slots| slots.first())
                        .and_then(|slot| slot.as_ref())
                        .map(|data| data.summary())
                        .unwrap_or_else(|| "done".to_string());
                    emit(
                        sink,
                        EngineEvent::NodeFinished {
                            node_id: node_id.clone(),
                            elapsed_s: elapsed,
                            summary,
                            pinned: false,
                            timestamp: Utc::now(),
                        },
                    );
                    record_run(&mut exec, workflow, &node_id);
                    self.propagate(workflow, &mut exec, &node_id, &output);
                    tracing::info!(run_id = %run_id, node_id = %node_id, elapsed_s = elapsed, "node finished");
                }
                Err(err) => {
                    let elapsed = round2(started.elapsed().as_secs_f64());
                    let message = err.to_string();
                    if let Some(node) = workflow.nodes.get_mut(&node_id) {
                        node.status = NodeStatus::Error;
                        node.error = Some(message.clone());
                        node.elapsed_s = elapsed;
                    }
                    emit(
                        sink,
                        EngineEvent::NodeError {
                            node_id: node_id.clone(),
                            error: message.clone(),
                            elapsed_s: elapsed,
                            timestamp: Utc::now(),
                        },
                    );
                    tracing::error!(run_id = %run_id, node_id = %node_id, error = %message, "node failed");

                    // Failures go out on the error channel only; the happy
                    // path for this branch stops here.
                    let mut output = ChannelOutputs::new();
                    output.insert(
                        Channel::Error,
                        vec![Some(NodeExecutionData::from_single(json!({
                            "error": message,
                            "node": node_id,
                        })))],
                    );
                    self.propagate(workflow, &mut exec, &node_id, &output);
                }
            }
        }

        // Queue drained. Per-node failures do not surface here; callers
        // inspect node status in the report.
        exec.status = ExecutionStatus::Success;
        exec.elapsed_s = round2(run_start.elapsed().as_secs_f64());
        emit(
            sink,
            EngineEvent::WorkflowFinished {
                run_id: run_id.clone(),
                status: exec.status,
                elapsed_s: exec.elapsed_s,
                timestamp: Utc::now(),
            },
        );
        tracing::info!(run_id = %run_id, elapsed_s = exec.elapsed_s, "workflow run finished");

        exec
    }

    /// Push a node's produced outputs to its downstream targets, joining
    /// fan-ins through the waiting table.
    fn propagate(
        &self,
        workflow: &Workflow,
        exec: &mut ExecutionContext,
        node_id: &str,
        output: &ChannelOutputs,
    ) {
        // Fixed channel order keeps fan-out visitation deterministic.
        for channel in [Channel::Main, Channel::Error, Channel::AiTool] {
            let Some(produced) = output.get(&channel) else {
                continue;
            };

            for (target_id, target_input_idx) in workflow.downstream(node_id, channel) {
                let Some(target) = workflow.nodes.get(target_id) else {
                    continue;
                };

                // Disabled targets bypass join logic: one queue entry per
                // delivery, handled as passthrough by the main loop.
                if target.disabled {
                    let mut input = ChannelOutputs::new();
                    input.insert(Channel::Main, produced.clone());
                    exec.execution_queue.push_back(ExecuteData::new(
                        target_id.clone(),
                        input,
                        Some(node_id),
                    ));
                    continue;
                }

                let waiting = exec
                    .waiting_execution
                    .entry(target_id.clone())
                    .or_insert_with(|| {
                        let needed = workflow.upstream_count(target_id, Channel::Main);
                        WaitingInputs {
                            main: vec![None; needed.max(1)],
                            needed,
                            received: 0,
                        }
                    });

                if let Some(first) = produced.first() {
                    let idx = (*target_input_idx).min(waiting.main.len() - 1);
                    waiting.main[idx] = first.clone();
                    waiting.received += 1;
                }

                if waiting.received >= waiting.needed {
                    let main = std::mem::take(&mut waiting.main);
                    let mut input = ChannelOutputs::new();
                    input.insert(Channel::Main, main);
                    exec.execution_queue.push_back(ExecuteData::new(
                        target_id.clone(),
                        input,
                        Some(node_id),
                    ));
                    exec.waiting_execution.remove(target_id);
                }
            }
        }
    }
}

/// Wrap one envelope as a `{main: [data]}` output map.
fn single_main(data: NodeExecutionData) -> ChannelOutputs {
    let mut output = ChannelOutputs::new();
    output.insert(Channel::Main, vec![Some(data)]);
    output
}

fn record_run(exec: &mut ExecutionContext, workflow: &Workflow, node_id: &str) {
    let Some(node) = workflow.nodes.get(node_id) else {
        return;
    };
    exec.run_data
        .entry(node_id.to_string())
        .or_default()
        .push(NodeRunRecord {
            status: node.status,
            elapsed_s: node.elapsed_s,
            error: node.error.clone(),
            summary: node.output_summary(),
        });
}

fn emit(sink: Option<&dyn EventSink>, event: EngineEvent) {
    if let Some(sink) = sink {
        if let Err(err) = sink.emit(&event) {
            tracing::warn!(error = %err, kind = event.kind(), "event sink failure");
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
