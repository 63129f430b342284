//! The frame orchestrator: drives phases as task-graph executions.
//!
//! Each frame walks the five phases in order. A phase's graph holds one task
//! per system the scheduler assigned to it plus any user-added tasks, wired
//! with the scheduler's ordering edges, barriers between the stages sharing
//! the phase, and serialization edges around non-parallel systems. Graphs
//! are cached between frames and reset rather than rebuilt while their
//! membership is unchanged.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use tracing::{debug, warn};

use basalt_config::Config;
use basalt_sched::{SystemId, SystemScheduler, World};
use basalt_task::{
    ExecutionOutcome, GraphError, TaskContext, TaskError, TaskGraph, TaskPriority, TaskWork,
    WorkerPool,
};

use crate::clock::{FrameClock, FrameData, FrameLimiter};
use crate::error::FrameError;
use crate::phase::{FramePhase, stages_of};
use crate::stats::FrameStats;

/// A user callback invoked at a fixed point in every frame.
pub type FrameCallback = Box<dyn FnMut(&FrameData) + Send>;

/// Optional callables invoked at fixed points each frame, in phase order.
#[derive(Default)]
pub struct FrameCallbacks {
    /// Start of the PreFrame phase.
    pub pre_frame: Option<FrameCallback>,
    /// Start of the Input phase; poll devices and window events here.
    pub user_input: Option<FrameCallback>,
    /// Start of the Update phase.
    pub update: Option<FrameCallback>,
    /// Start of the Render phase.
    pub render: Option<FrameCallback>,
    /// Start of the PostFrame phase.
    pub post_frame: Option<FrameCallback>,
}

struct UserTask {
    name: String,
    priority: TaskPriority,
    work: TaskWork,
}

#[derive(Default)]
struct PhaseTasks {
    tasks: Vec<UserTask>,
    deps: Vec<(String, String)>,
}

struct PhaseGraph {
    graph: TaskGraph,
    executed: bool,
}

/// Frame delta shared with system task closures, updated once per frame
/// before any phase runs.
struct DtCell(AtomicU32);

impl DtCell {
    fn new() -> Self {
        Self(AtomicU32::new(0.0f32.to_bits()))
    }

    fn store(&self, dt: f32) {
        self.0.store(dt.to_bits(), Ordering::Relaxed);
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Drives frames over a built [`SystemScheduler`] and a [`WorkerPool`].
pub struct FrameOrchestrator {
    scheduler: SystemScheduler,
    world: Arc<World>,
    pool: WorkerPool,
    clock: FrameClock,
    limiter: FrameLimiter,
    callbacks: FrameCallbacks,
    user_tasks: [PhaseTasks; 5],
    graphs: [Option<PhaseGraph>; 5],
    stats: FrameStats,
    profiling: bool,
    current_dt: Arc<DtCell>,
}

impl FrameOrchestrator {
    /// Builds the scheduler's execution graph and sizes the worker pool from
    /// `config`. A schedule build failure is fatal: there is no valid plan
    /// to run frames against.
    pub fn new(
        mut scheduler: SystemScheduler,
        world: Arc<World>,
        config: &Config,
    ) -> Result<Self, FrameError> {
        scheduler.build()?;

        let pool = if config.scheduler.worker_count == 0 {
            WorkerPool::with_defaults()
        } else {
            WorkerPool::new(config.scheduler.worker_count)
        };
        debug!(
            workers = pool.worker_count(),
            systems = scheduler.len(),
            "frame orchestrator ready"
        );

        Ok(Self {
            scheduler,
            world,
            pool,
            clock: FrameClock::new(config.frame.max_delta_seconds),
            limiter: FrameLimiter::new(config.frame.frame_limit_hz),
            callbacks: FrameCallbacks::default(),
            user_tasks: Default::default(),
            graphs: Default::default(),
            stats: FrameStats::default(),
            profiling: config.debug.profiling_enabled,
            current_dt: Arc::new(DtCell::new()),
        })
    }

    /// Installs the per-frame callbacks, replacing any previous set.
    pub fn set_callbacks(&mut self, callbacks: FrameCallbacks) {
        self.callbacks = callbacks;
    }

    /// The scheduler this orchestrator runs (for stats and visualization).
    pub fn scheduler(&self) -> &SystemScheduler {
        &self.scheduler
    }

    /// The shared world handle.
    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    /// Worker threads backing the phase executions.
    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    /// Frame statistics collected so far.
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Adds a user task to `phase`. The name must not collide with a system
    /// or another user task; the phase graph is rebuilt on the next frame.
    pub fn add_task_to_phase<F>(
        &mut self,
        phase: FramePhase,
        name: impl Into<String>,
        priority: TaskPriority,
        work: F,
    ) -> Result<(), FrameError>
    where
        F: Fn(&TaskContext) -> Result<(), TaskError> + Send + Sync + 'static,
    {
        let name = name.into();
        let taken = self.scheduler.system_id(&name).is_some()
            || self.user_tasks[phase.index()]
                .tasks
                .iter()
                .any(|task| task.name == name);
        if taken {
            return Err(FrameError::Graph {
                phase,
                source: GraphError::DuplicateTask(name),
            });
        }
        self.user_tasks[phase.index()].tasks.push(UserTask {
            name,
            priority,
            work: Arc::new(work),
        });
        self.graphs[phase.index()] = None;
        Ok(())
    }

    /// Orders `successor` after `predecessor` within `phase`. Either side
    /// may be a system task or a user task; names resolve when the phase
    /// graph is next built.
    pub fn add_task_dependency(
        &mut self,
        phase: FramePhase,
        successor: impl Into<String>,
        predecessor: impl Into<String>,
    ) {
        self.user_tasks[phase.index()]
            .deps
            .push((successor.into(), predecessor.into()));
        self.graphs[phase.index()] = None;
    }

    /// Runs one frame: ticks the clock, walks every phase in order, then
    /// paces to the frame limit. A phase finishing with failed tasks is
    /// logged and counted but never aborts the frame; a broken phase graph
    /// is an error.
    pub fn run_frame(&mut self) -> Result<FrameData, FrameError> {
        let frame = self.clock.tick();
        self.current_dt.store(frame.delta_time);

        for phase in FramePhase::ALL {
            self.invoke_callback(phase, &frame);

            let started = Instant::now();
            let outcome = self.execute_phase(phase)?;
            let elapsed = started.elapsed();

            if outcome == ExecutionOutcome::PartialFailure {
                warn!(phase = %phase, frame = frame.frame_number, "phase completed with failed tasks");
            }
            if self.profiling
                && let Some(budget) = self.limiter.period()
                && elapsed > budget
            {
                warn!(
                    phase = %phase,
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    budget_ms = budget.as_secs_f64() * 1000.0,
                    "phase exceeded the frame budget"
                );
            }
            self.stats
                .record_phase(phase, elapsed.as_micros() as u64, outcome);
        }

        self.stats.complete_frame();
        self.limiter.wait();
        Ok(frame)
    }

    fn invoke_callback(&mut self, phase: FramePhase, frame: &FrameData) {
        let callback = match phase {
            FramePhase::PreFrame => &mut self.callbacks.pre_frame,
            FramePhase::Input => &mut self.callbacks.user_input,
            FramePhase::Update => &mut self.callbacks.update,
            FramePhase::Render => &mut self.callbacks.render,
            FramePhase::PostFrame => &mut self.callbacks.post_frame,
        };
        if let Some(callback) = callback {
            callback(frame);
        }
    }

    fn execute_phase(&mut self, phase: FramePhase) -> Result<ExecutionOutcome, FrameError> {
        if self.graphs[phase.index()].is_none() {
            let graph = self.build_phase_graph(phase)?;
            self.graphs[phase.index()] = Some(PhaseGraph {
                graph,
                executed: false,
            });
        }
        let Some(entry) = self.graphs[phase.index()].as_mut() else {
            return Ok(ExecutionOutcome::Completed);
        };

        if entry.executed {
            entry
                .graph
                .reset()
                .map_err(|source| FrameError::Graph { phase, source })?;
        }
        let outcome = entry
            .graph
            .execute(&self.pool)
            .map_err(|source| FrameError::Graph { phase, source })?;
        entry.executed = true;
        Ok(outcome)
    }

    /// Assembles a phase's task graph: system tasks in stage plan order,
    /// the scheduler's edges, serialization around non-parallel systems,
    /// barriers between consecutive stages, then user tasks and their
    /// declared dependencies.
    fn build_phase_graph(&self, phase: FramePhase) -> Result<TaskGraph, FrameError> {
        let mut graph = TaskGraph::new();
        let mut previous_stage: Vec<String> = Vec::new();

        for stage in stages_of(phase) {
            let plan = self.scheduler.stage_plan(*stage)?;
            let plan_names: Vec<String> = plan
                .iter()
                .map(|id| self.scheduler.metadata(*id).name.clone())
                .collect();

            for (id, name) in plan.iter().zip(&plan_names) {
                graph
                    .add_task_work(name.clone(), TaskPriority::Normal, self.system_work(*id))
                    .map_err(|source| FrameError::Graph { phase, source })?;
            }

            for (id, name) in plan.iter().zip(&plan_names) {
                for (target, _) in self.scheduler.edges(*id) {
                    let target_name = &self.scheduler.metadata(target).name;
                    graph
                        .add_dependency(target_name, name)
                        .map_err(|source| FrameError::Graph { phase, source })?;
                }
            }

            // A non-parallel system must not overlap anything in its stage:
            // everything earlier in plan order becomes a predecessor and
            // everything later a successor. Plan order already respects the
            // scheduler's edges, so these edges cannot form a cycle.
            for (position, id) in plan.iter().enumerate() {
                if self.scheduler.metadata(*id).parallel_eligible {
                    continue;
                }
                let name = &plan_names[position];
                for (other_position, other_name) in plan_names.iter().enumerate() {
                    let result = match other_position.cmp(&position) {
                        std::cmp::Ordering::Less => graph.add_dependency(name, other_name),
                        std::cmp::Ordering::Greater => graph.add_dependency(other_name, name),
                        std::cmp::Ordering::Equal => Ok(()),
                    };
                    result.map_err(|source| FrameError::Graph { phase, source })?;
                }
            }

            // Barrier: this stage starts only after the previous one is done.
            for name in &plan_names {
                for earlier in &previous_stage {
                    graph
                        .add_dependency(name, earlier)
                        .map_err(|source| FrameError::Graph { phase, source })?;
                }
            }
            previous_stage = plan_names;
        }

        let phase_tasks = &self.user_tasks[phase.index()];
        for task in &phase_tasks.tasks {
            graph
                .add_task_work(task.name.clone(), task.priority, Arc::clone(&task.work))
                .map_err(|source| FrameError::Graph { phase, source })?;
        }
        for (successor, predecessor) in &phase_tasks.deps {
            graph
                .add_dependency(successor, predecessor)
                .map_err(|source| FrameError::Graph { phase, source })?;
        }

        graph
            .seal()
            .map_err(|source| FrameError::Graph { phase, source })?;
        Ok(graph)
    }

    /// Wraps a system invocation as task work: runs it against the shared
    /// world with the current frame delta and records its runtime.
    fn system_work(&self, id: SystemId) -> TaskWork {
        let system = self.scheduler.system(id);
        let world = Arc::clone(&self.world);
        let dt = Arc::clone(&self.current_dt);
        let stats = self.scheduler.stats_sink();
        Arc::new(move |_: &TaskContext| {
            let started = Instant::now();
            system.run(&world, dt.load());
            stats.record(id, started.elapsed().as_micros() as u64);
            Ok(())
        })
    }
}
