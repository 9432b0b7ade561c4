use thiserror::Error;

/// Failures while parsing a workflow definition. Shape errors only —
/// referential integrity is never checked; the graph builder drops dangling
/// connections instead.
#[derive(Error, Debug)]
pub enum DefinitionError {
    #[error("malformed workflow definition: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Failures raised by a step implementation. The engine catches these per
/// node, routes them to the node's `error` channel, and keeps running.
#[derive(Error, Debug)]
pub enum StepError {
    #[error("{0}")]
    Failed(String),

    #[error("missing parameter: {0}")]
    MissingParameter(String),

    #[error("run context has no state store attached")]
    MissingStore,

    #[error("state store error: {0}")]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StepError {
    pub fn failed(msg: impl Into<String>) -> Self {
        StepError::Failed(msg.into())
    }
}

/// Failures from a `StateStore` backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid stored document: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure reported by an event sink. Logged by the engine, never
/// propagated back into the execution loop.
#[derive(Error, Debug)]
pub enum EventError {
    #[error("event sink rejected event: {0}")]
    Rejected(String),
}
