//! System scheduling: per-system metadata in, conflict-safe execution DAGs out.
//!
//! Systems declare a lifecycle stage, the component types they read and
//! write, a priority, and explicit ordering relations. [`SystemScheduler`]
//! resolves the explicit relations, infers ordering edges wherever two
//! systems in the same stage touch overlapping components, verifies the
//! result is acyclic, and hands out a deterministic execution plan per
//! stage. A DOT rendering of the frozen graph and per-system runtime
//! statistics support offline inspection.

mod dot;
mod error;
mod mask;
mod metadata;
mod scheduler;
mod world;

pub use error::ScheduleError;
pub use mask::{ComponentId, ComponentMask, ComponentRegistry, MAX_COMPONENT_TYPES, RegistryError};
pub use metadata::{DepKind, SystemDep, SystemMetadata, SystemStage};
pub use scheduler::{EdgeKind, StatsSink, SystemId, SystemScheduler};
pub use world::{System, World};
