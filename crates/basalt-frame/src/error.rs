//! Orchestrator error types.

use thiserror::Error;

use basalt_sched::ScheduleError;
use basalt_task::GraphError;

use crate::phase::FramePhase;

/// Errors from orchestrator construction and per-frame graph building.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The system schedule could not be built; the orchestrator cannot run
    /// without a valid plan.
    #[error("system schedule build failed: {0}")]
    Schedule(#[from] ScheduleError),

    /// A phase's task graph could not be constructed or sealed.
    #[error("task graph for phase {phase} is invalid: {source}")]
    Graph {
        /// The phase whose graph is broken.
        phase: FramePhase,
        /// The underlying graph error.
        #[source]
        source: GraphError,
    },
}
