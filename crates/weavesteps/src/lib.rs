//! Standard step library for the skill-extraction pipeline
//!
//! These steps are thin adapters around the surrounding document pipeline:
//! they read already-materialized state from the notebook store or return a
//! `delegated` marker meaning the phase is driven by a different API
//! surface. The engine treats them like any other step.

mod ingest;
mod schema;
mod skills;
mod store;

pub use ingest::{ChunkerStep, DocumentLoaderStep, SemanticFilterStep};
pub use schema::SchemaGenStep;
pub use skills::DelegatedStep;
pub use store::FileNotebook;

use std::sync::Arc;
use weaveruntime::StepRegistry;

/// Register the full pipeline step set with a registry.
pub fn register_all(registry: &mut StepRegistry) {
    registry.register(Arc::new(ingest::DocumentLoaderStep));
    registry.register(Arc::new(ingest::ChunkerStep));
    registry.register(Arc::new(ingest::SemanticFilterStep));
    registry.register(Arc::new(schema::SchemaGenStep));
    registry.register(Arc::new(DelegatedStep::new(
        "extractor",
        "driven by the execute API",
    )));
    registry.register(Arc::new(DelegatedStep::new(
        "validator",
        "driven by the sample-check API",
    )));
    registry.register(Arc::new(DelegatedStep::new(
        "reducer",
        "triggered during the full extraction pass",
    )));
    registry.register(Arc::new(DelegatedStep::new(
        "classifier",
        "triggered during the full extraction pass",
    )));
    registry.register(Arc::new(DelegatedStep::new(
        "packager",
        "triggered during the full extraction pass",
    )));
}
