//! Priority worker pool and dependency-ordered task graph execution.
//!
//! [`WorkerPool`] runs opaque jobs on a fixed set of named OS threads,
//! preferring higher-priority work while keeping low-priority work from
//! starving. [`TaskGraph`] layers a DAG of named tasks on top of the pool:
//! dependencies are declared edge-by-edge, the graph is sealed once, and
//! each execution drives every task to a terminal state with failure and
//! cancellation propagated along the edges.

mod error;
mod graph;
mod pool;

pub use error::{GraphError, TaskError};
pub use graph::{
    CancelToken, ExecutionOutcome, TaskContext, TaskGraph, TaskId, TaskState, TaskWork,
};
pub use pool::{PoolHandle, TaskPriority, Ticket, WorkerPool};
