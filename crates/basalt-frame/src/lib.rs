//! Frame orchestration: phases, timing, and per-frame task graph execution.
//!
//! [`FrameOrchestrator`] drives one frame as a fixed sequence of phases
//! (PreFrame, Input, Update, Render, PostFrame). Systems registered with
//! the scheduler become tasks in the phase their stage maps to; user tasks
//! slot in alongside them with declared dependencies. Each phase executes
//! as one task graph over the shared worker pool, with failures contained
//! to the tasks they poison.

mod clock;
mod error;
mod orchestrator;
mod phase;
mod stats;

pub use clock::{FrameClock, FrameData, FrameLimiter};
pub use error::FrameError;
pub use orchestrator::{FrameCallback, FrameCallbacks, FrameOrchestrator};
pub use phase::{FramePhase, phase_of, stages_of};
pub use stats::{FrameStats, PhaseStats};
