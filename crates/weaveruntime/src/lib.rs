//! Workflow execution runtime
//!
//! This crate provides the breadth-first execution engine, the step
//! registry that maps node `type` strings to step implementations, and the
//! `WeaveRuntime` facade that ties registry, engine, and event bus together.

mod engine;
mod registry;
mod runtime;

pub use engine::WorkflowEngine;
pub use registry::{Step, StepOutput, StepRegistry};
pub use runtime::{RuntimeConfig, WeaveRuntime};
