//! Scheduler error types.

use thiserror::Error;

use crate::metadata::SystemStage;

/// Errors from system registration and graph construction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScheduleError {
    /// A system with the same name is already registered.
    #[error("duplicate system name: {0}")]
    DuplicateSystem(String),
    /// Registration attempted after the graph was built.
    #[error("system scheduler is frozen after build")]
    Frozen,
    /// A plan or visualization was requested before [`build`] ran.
    ///
    /// [`build`]: crate::SystemScheduler::build
    #[error("execution graph has not been built")]
    NotBuilt,
    /// The declared relations close a cycle; the named systems need an
    /// explicit relation (or a priority change) to break it.
    #[error("dependency cycle in stage {stage} through: {systems:?}")]
    CycleDetected {
        /// Stage whose sub-graph is cyclic.
        stage: SystemStage,
        /// Systems still carrying incoming edges after the topological sort.
        systems: Vec<String>,
    },
}
