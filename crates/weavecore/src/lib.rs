//! Core types for the weave workflow engine
//!
//! This crate provides the data model shared by the runtime, the step
//! library, and the outer surfaces: the item envelope passed between nodes,
//! the serializable workflow definition, the built graph with its connection
//! indices, per-run execution state, and the engine event types.

mod context;
mod definition;
mod envelope;
mod error;
mod events;
mod graph;
mod node;
mod report;
mod run;

pub use context::{ExecuteData, ExecutionContext, ExecutionStatus, NodeRunRecord, WaitingInputs};
pub use definition::{Channel, ConnectionDefinition, NodeDefinition, WorkflowDefinition};
pub use envelope::{ChannelOutputs, Item, NodeExecutionData};
pub use error::{DefinitionError, EventError, StepError, StoreError};
pub use events::{EngineEvent, EventBus, EventSink};
pub use graph::Workflow;
pub use node::{NodeStatus, WorkflowNode};
pub use report::{NodeReport, RunReport};
pub use run::{RunContext, StateStore};
