use crate::engine::WorkflowEngine;
use crate::registry::StepRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use weavecore::{EngineEvent, EventBus, RunContext, RunReport, Workflow, WorkflowDefinition};

/// Ties registry, engine, and event bus together and keeps finished run
/// reports addressable by run id.
///
/// Two call shapes hang off this: `execute_definition` awaits the full run
/// and returns the report, while `subscribe_events` hands out a live
/// receiver that sees every engine event as it happens.
pub struct WeaveRuntime {
    registry: Arc<StepRegistry>,
    engine: WorkflowEngine,
    event_bus: Arc<EventBus>,
    runs: RwLock<HashMap<String, RunReport>>,
}

impl WeaveRuntime {
    /// Runtime with an empty registry and default settings.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(StepRegistry::new()), RuntimeConfig::default())
    }

    pub fn with_registry(registry: Arc<StepRegistry>, config: RuntimeConfig) -> Self {
        Self {
            engine: WorkflowEngine::new(registry.clone()),
            registry,
            event_bus: Arc::new(EventBus::new(config.event_buffer_size)),
            runs: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<StepRegistry> {
        &self.registry
    }

    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<EngineEvent> {
        self.event_bus.subscribe()
    }

    /// Build and run a definition to completion, returning the run report.
    /// Events stream through the bus while the run progresses.
    pub async fn execute_definition(
        &self,
        definition: WorkflowDefinition,
        context: &RunContext,
    ) -> RunReport {
        let mut workflow = self.engine.build(definition);
        self.execute_workflow(&mut workflow, context).await
    }

    /// Run an already-built graph. The graph must not be shared with any
    /// other concurrent run.
    pub async fn execute_workflow(
        &self,
        workflow: &mut Workflow,
        context: &RunContext,
    ) -> RunReport {
        let exec = self
            .engine
            .execute(workflow, context, Some(self.event_bus.as_ref()))
            .await;
        let report = RunReport::from_run(&exec, workflow);
        self.runs
            .write()
            .await
            .insert(report.run_id.clone(), report.clone());
        report
    }

    /// Report of a finished run, if this runtime executed it.
    pub async fn run_report(&self, run_id: &str) -> Option<RunReport> {
        self.runs.read().await.get(run_id).cloned()
    }
}

impl Default for WeaveRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub event_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 1000,
        }
    }
}
