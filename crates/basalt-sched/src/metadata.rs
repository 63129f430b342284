//! System registration metadata: stage, access masks, priority, relations.

use std::fmt;

use crate::mask::ComponentMask;

/// Lifecycle bucket a system runs in. Stages compose linearly in the order
/// listed; no ordering edge ever crosses a stage boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SystemStage {
    /// Input snapshotting, time bookkeeping.
    PreUpdate,
    /// Gameplay simulation.
    Update,
    /// Transform propagation, spatial index maintenance.
    PostUpdate,
    /// Culling, batching, buffer uploads.
    PreRender,
    /// Draw submission.
    Render,
    /// Readbacks, frame statistics.
    PostRender,
}

impl SystemStage {
    /// All stages in execution order.
    pub const ALL: [SystemStage; 6] = [
        SystemStage::PreUpdate,
        SystemStage::Update,
        SystemStage::PostUpdate,
        SystemStage::PreRender,
        SystemStage::Render,
        SystemStage::PostRender,
    ];

    /// Position in the linear stage order.
    pub fn index(self) -> usize {
        match self {
            SystemStage::PreUpdate => 0,
            SystemStage::Update => 1,
            SystemStage::PostUpdate => 2,
            SystemStage::PreRender => 3,
            SystemStage::Render => 4,
            SystemStage::PostRender => 5,
        }
    }

    /// Stable display name.
    pub fn name(self) -> &'static str {
        match self {
            SystemStage::PreUpdate => "PreUpdate",
            SystemStage::Update => "Update",
            SystemStage::PostUpdate => "PostUpdate",
            SystemStage::PreRender => "PreRender",
            SystemStage::Render => "Render",
            SystemStage::PostRender => "PostRender",
        }
    }
}

impl fmt::Display for SystemStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How an explicit relation orders this system against its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepKind {
    /// This system must finish before the target starts.
    Before,
    /// This system must start after the target finishes.
    After,
    /// The pair is exempt from conflict inference and may overlap freely.
    With,
}

/// One explicit relation against another system, by name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemDep {
    /// Name of the target system.
    pub target: String,
    /// Relation kind.
    pub kind: DepKind,
}

/// Immutable description of a system, supplied at registration.
#[derive(Clone, Debug)]
pub struct SystemMetadata {
    /// Unique name within one scheduler.
    pub name: String,
    /// Stage the system runs in.
    pub stage: SystemStage,
    /// Component types the system reads.
    pub reads: ComponentMask,
    /// Component types the system writes.
    pub writes: ComponentMask,
    /// Higher priority runs earlier when an inferred conflict needs a
    /// direction.
    pub priority: i32,
    /// Explicit relations against other systems.
    pub deps: Vec<SystemDep>,
    /// Whether the system may overlap with others in its stage when no
    /// conflict forbids it.
    pub parallel_eligible: bool,
}

impl SystemMetadata {
    /// Metadata with empty access, priority 0, no relations, parallel.
    pub fn new(name: impl Into<String>, stage: SystemStage) -> Self {
        Self {
            name: name.into(),
            stage,
            reads: ComponentMask::EMPTY,
            writes: ComponentMask::EMPTY,
            priority: 0,
            deps: Vec::new(),
            parallel_eligible: true,
        }
    }

    /// Sets the read mask.
    pub fn reads(mut self, mask: ComponentMask) -> Self {
        self.reads = mask;
        self
    }

    /// Sets the write mask.
    pub fn writes(mut self, mask: ComponentMask) -> Self {
        self.writes = mask;
        self
    }

    /// Sets the conflict-ordering priority.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Adds a `Before` relation: this system finishes before `target` starts.
    pub fn before(mut self, target: impl Into<String>) -> Self {
        self.deps.push(SystemDep {
            target: target.into(),
            kind: DepKind::Before,
        });
        self
    }

    /// Adds an `After` relation: this system starts after `target` finishes.
    pub fn after(mut self, target: impl Into<String>) -> Self {
        self.deps.push(SystemDep {
            target: target.into(),
            kind: DepKind::After,
        });
        self
    }

    /// Declares that this system and `target` may overlap despite any
    /// component conflict between them.
    pub fn with(mut self, target: impl Into<String>) -> Self {
        self.deps.push(SystemDep {
            target: target.into(),
            kind: DepKind::With,
        });
        self
    }

    /// Marks the system non-parallel: nothing else in its stage overlaps it.
    pub fn serial(mut self) -> Self {
        self.parallel_eligible = false;
        self
    }
}
