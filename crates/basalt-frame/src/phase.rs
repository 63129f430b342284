//! Frame phases and the stage-to-phase mapping.

use std::fmt;

use basalt_sched::SystemStage;

/// Orchestrator-level grouping under which one or more stages execute as a
/// single task graph. Phases run in the order listed, every frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FramePhase {
    /// User bookkeeping before anything touches the world.
    PreFrame,
    /// Input event pump and user input handling.
    Input,
    /// Simulation: the PreUpdate, Update, and PostUpdate stages.
    Update,
    /// Presentation: the PreRender and Render stages. PreRender sits at the
    /// head so it observes all Update-stage writes but precedes draw work.
    Render,
    /// Cleanup: the PostRender stage plus user teardown tasks.
    PostFrame,
}

impl FramePhase {
    /// All phases in execution order.
    pub const ALL: [FramePhase; 5] = [
        FramePhase::PreFrame,
        FramePhase::Input,
        FramePhase::Update,
        FramePhase::Render,
        FramePhase::PostFrame,
    ];

    /// Position in the per-frame phase order.
    pub fn index(self) -> usize {
        match self {
            FramePhase::PreFrame => 0,
            FramePhase::Input => 1,
            FramePhase::Update => 2,
            FramePhase::Render => 3,
            FramePhase::PostFrame => 4,
        }
    }

    /// Stable display name.
    pub fn name(self) -> &'static str {
        match self {
            FramePhase::PreFrame => "PreFrame",
            FramePhase::Input => "Input",
            FramePhase::Update => "Update",
            FramePhase::Render => "Render",
            FramePhase::PostFrame => "PostFrame",
        }
    }
}

impl fmt::Display for FramePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The phase a system stage executes under.
pub fn phase_of(stage: SystemStage) -> FramePhase {
    match stage {
        SystemStage::PreUpdate | SystemStage::Update | SystemStage::PostUpdate => FramePhase::Update,
        SystemStage::PreRender | SystemStage::Render => FramePhase::Render,
        SystemStage::PostRender => FramePhase::PostFrame,
    }
}

/// The stages a phase executes, in barrier order.
pub fn stages_of(phase: FramePhase) -> &'static [SystemStage] {
    match phase {
        FramePhase::PreFrame | FramePhase::Input => &[],
        FramePhase::Update => &[
            SystemStage::PreUpdate,
            SystemStage::Update,
            SystemStage::PostUpdate,
        ],
        FramePhase::Render => &[SystemStage::PreRender, SystemStage::Render],
        FramePhase::PostFrame => &[SystemStage::PostRender],
    }
}
