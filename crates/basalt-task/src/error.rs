//! Error types for the worker pool and task graph.

use std::any::Any;

use thiserror::Error;

/// Errors produced by task work callables and the worker boundary.
///
/// Every entry point into user code converts arbitrary failures into one of
/// these variants; no panic escapes a worker thread.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    /// The work callable returned an error.
    #[error("task failed: {0}")]
    Failed(String),
    /// The work callable panicked; the payload message is captured.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// The task was cancelled before it could run.
    #[error("task cancelled")]
    Cancelled,
}

/// Errors that can occur while constructing or executing a [`TaskGraph`](crate::TaskGraph).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    /// A task with the same name already exists in the graph.
    #[error("duplicate task name: {0}")]
    DuplicateTask(String),
    /// A dependency referenced a task name that was never added.
    #[error("unknown task name: {0}")]
    UnknownTask(String),
    /// Adding the edge would close a dependency cycle.
    #[error("dependency from '{successor}' on '{predecessor}' would create a cycle")]
    WouldCycle {
        /// The task that would wait on the predecessor.
        successor: String,
        /// The task that would have to finish first.
        predecessor: String,
    },
    /// Sealing found one or more cycles; the named tasks still carried
    /// incoming edges after the topological sort.
    #[error("task graph contains a cycle through: {0:?}")]
    CycleDetected(Vec<String>),
    /// The graph was already sealed; structure is immutable.
    #[error("task graph is sealed")]
    Sealed,
    /// The operation requires a sealed graph.
    #[error("task graph has not been sealed")]
    NotSealed,
}

/// Best-effort extraction of a human-readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
