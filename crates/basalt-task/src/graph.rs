//! Mutable DAG of named tasks, sealed once and executed over the pool.
//!
//! Construction is main-thread only: tasks and edges go in, [`TaskGraph::seal`]
//! validates acyclicity and marks the initially-ready set, and
//! [`TaskGraph::execute`] drives every task to a terminal state. A task runs
//! strictly after all of its predecessors have completed; a failed or
//! cancelled predecessor poisons its transitive successors to `Cancelled`.
//! After a terminal execution the graph can be [`reset`](TaskGraph::reset)
//! and executed again without rebuilding its structure.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rustc_hash::FxHashMap;
use tracing::warn;

use crate::error::{GraphError, TaskError, panic_message};
use crate::pool::{PoolHandle, TaskPriority, WorkerPool};

/// Dense task index, assigned in insertion order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskId(u32);

impl TaskId {
    /// Index into the graph's task arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Lifecycle state of one task within one execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting on one or more predecessors.
    Pending,
    /// All predecessors completed; queued for a worker.
    Ready,
    /// A worker is executing the work callable.
    Running,
    /// The work callable returned without error.
    Completed,
    /// The work callable returned an error or panicked.
    Failed,
    /// Cancelled before running, directly or via a poisoned predecessor.
    Cancelled,
}

impl TaskState {
    fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }
}

/// Aggregate result of one [`TaskGraph::execute`] run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Every task completed.
    Completed,
    /// At least one task failed; unaffected tasks still completed.
    PartialFailure,
    /// The graph was cancelled; no task failed.
    Cancelled,
}

/// Shared work callable. Graphs are re-executed across frames, so work is
/// `Fn` rather than `FnOnce` and captures its own inputs.
pub type TaskWork = Arc<dyn Fn(&TaskContext) -> Result<(), TaskError> + Send + Sync + 'static>;

/// Cooperative cancellation flag shared by a graph and its running tasks.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Pending and ready tasks of the owning graph
    /// become `Cancelled`; in-flight tasks run to completion.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Per-invocation context handed to work callables.
///
/// Long-running work should poll [`is_cancelled`](Self::is_cancelled) and
/// bail out early; nothing enforces it.
pub struct TaskContext {
    cancel: CancelToken,
}

impl TaskContext {
    /// Whether the owning graph has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

struct TaskRecord {
    name: String,
    priority: TaskPriority,
    work: TaskWork,
    preds: Vec<u32>,
    succs: Vec<u32>,
}

/// See the module docs.
pub struct TaskGraph {
    tasks: Vec<TaskRecord>,
    by_name: FxHashMap<String, u32>,
    sealed: bool,
    states: Vec<TaskState>,
    remaining: Vec<u32>,
    cancel: CancelToken,
}

impl TaskGraph {
    /// An empty, unsealed graph.
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            by_name: FxHashMap::default(),
            sealed: false,
            states: Vec::new(),
            remaining: Vec::new(),
            cancel: CancelToken::new(),
        }
    }

    /// Number of tasks in the graph.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the graph holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Whether [`seal`](Self::seal) has run.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Adds a task. Fails if the graph is sealed or the name is taken.
    pub fn add_task<F>(
        &mut self,
        name: impl Into<String>,
        priority: TaskPriority,
        work: F,
    ) -> Result<TaskId, GraphError>
    where
        F: Fn(&TaskContext) -> Result<(), TaskError> + Send + Sync + 'static,
    {
        self.add_task_work(name.into(), priority, Arc::new(work))
    }

    /// [`add_task`](Self::add_task) for an already-shared work callable.
    pub fn add_task_work(
        &mut self,
        name: String,
        priority: TaskPriority,
        work: TaskWork,
    ) -> Result<TaskId, GraphError> {
        if self.sealed {
            return Err(GraphError::Sealed);
        }
        if self.by_name.contains_key(&name) {
            return Err(GraphError::DuplicateTask(name));
        }
        let id = self.tasks.len() as u32;
        self.by_name.insert(name.clone(), id);
        self.tasks.push(TaskRecord {
            name,
            priority,
            work,
            preds: Vec::new(),
            succs: Vec::new(),
        });
        Ok(TaskId(id))
    }

    /// Records that `successor` must not start before `predecessor` has
    /// completed. Re-adding an existing edge is a no-op; an edge that would
    /// close a cycle is rejected.
    pub fn add_dependency(&mut self, successor: &str, predecessor: &str) -> Result<(), GraphError> {
        if self.sealed {
            return Err(GraphError::Sealed);
        }
        let succ = self.lookup(successor)?;
        let pred = self.lookup(predecessor)?;
        if succ == pred || self.reaches(succ, pred) {
            return Err(GraphError::WouldCycle {
                successor: successor.to_string(),
                predecessor: predecessor.to_string(),
            });
        }
        if let Err(slot) = self.tasks[pred as usize].succs.binary_search(&succ) {
            self.tasks[pred as usize].succs.insert(slot, succ);
        }
        if let Err(slot) = self.tasks[succ as usize].preds.binary_search(&pred) {
            self.tasks[succ as usize].preds.insert(slot, pred);
        }
        Ok(())
    }

    /// Freezes the structure: validates acyclicity with a topological sort,
    /// computes dependency counters, and marks zero-dependency tasks `Ready`.
    /// One-time; sealing twice is an error.
    pub fn seal(&mut self) -> Result<(), GraphError> {
        if self.sealed {
            return Err(GraphError::Sealed);
        }

        let mut indegree: Vec<usize> = self.tasks.iter().map(|task| task.preds.len()).collect();
        let mut queue: VecDeque<u32> = indegree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(index, _)| index as u32)
            .collect();
        let mut emitted = 0usize;
        while let Some(id) = queue.pop_front() {
            emitted += 1;
            for &succ in &self.tasks[id as usize].succs {
                indegree[succ as usize] -= 1;
                if indegree[succ as usize] == 0 {
                    queue.push_back(succ);
                }
            }
        }
        if emitted < self.tasks.len() {
            let stuck = indegree
                .iter()
                .enumerate()
                .filter(|(_, degree)| **degree > 0)
                .map(|(index, _)| self.tasks[index].name.clone())
                .collect();
            return Err(GraphError::CycleDetected(stuck));
        }

        let (states, remaining) = self.initial_states();
        self.states = states;
        self.remaining = remaining;
        self.sealed = true;
        Ok(())
    }

    /// Restores the post-seal state after a terminal execution: counters
    /// recomputed, zero-dependency tasks `Ready`, everything else `Pending`,
    /// cancellation cleared. Structure is preserved.
    pub fn reset(&mut self) -> Result<(), GraphError> {
        if !self.sealed {
            return Err(GraphError::NotSealed);
        }
        let (states, remaining) = self.initial_states();
        self.states = states;
        self.remaining = remaining;
        self.cancel = CancelToken::new();
        Ok(())
    }

    /// Cancels the graph: every `Pending`/`Ready` task becomes `Cancelled`.
    /// During an execution, in-flight tasks run to completion and the
    /// executor sweeps the rest; see [`cancel_token`](Self::cancel_token)
    /// for cancelling from another thread or from inside a task.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        for state in &mut self.states {
            if matches!(*state, TaskState::Pending | TaskState::Ready) {
                *state = TaskState::Cancelled;
            }
        }
    }

    /// The token observed by the current (or next) execution.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Dense id for a task name.
    pub fn task_id(&self, name: &str) -> Option<TaskId> {
        self.by_name.get(name).map(|id| TaskId(*id))
    }

    /// Current state of a named task.
    pub fn task_state(&self, name: &str) -> Option<TaskState> {
        let id = self.by_name.get(name)?;
        self.states.get(*id as usize).copied()
    }

    /// Iterates `(name, state)` pairs in insertion order. Empty before seal.
    pub fn states(&self) -> impl Iterator<Item = (&str, TaskState)> {
        self.tasks
            .iter()
            .zip(self.states.iter())
            .map(|(task, state)| (task.name.as_str(), *state))
    }

    /// Runs the graph to completion over `pool`, returning once every task
    /// is terminal. The calling thread helps drain the pool while waiting.
    pub fn execute(&mut self, pool: &WorkerPool) -> Result<ExecutionOutcome, GraphError> {
        if !self.sealed {
            return Err(GraphError::NotSealed);
        }
        let total = self.tasks.len();
        if total == 0 {
            return Ok(ExecutionOutcome::Completed);
        }

        let exec_tasks: Vec<ExecTask> = self
            .tasks
            .iter()
            .map(|task| ExecTask {
                priority: task.priority,
                work: Arc::clone(&task.work),
                succs: task.succs.clone(),
            })
            .collect();
        let terminal = self
            .states
            .iter()
            .filter(|state| state.is_terminal())
            .count();
        let shared = Arc::new(ExecShared {
            tasks: exec_tasks,
            inner: Mutex::new(ExecInner {
                states: self.states.clone(),
                remaining: self.remaining.clone(),
                terminal,
            }),
            cv: Condvar::new(),
            cancel: self.cancel.clone(),
            handle: pool.handle(),
        });

        let ready: Vec<u32> = {
            let mut inner = lock_inner(&shared);
            if shared.cancel.is_cancelled() {
                sweep_cancelled(&mut inner);
            }
            inner
                .states
                .iter()
                .enumerate()
                .filter(|(_, state)| **state == TaskState::Ready)
                .map(|(index, _)| index as u32)
                .collect()
        };
        for id in ready {
            spawn_task(&shared, id);
        }

        loop {
            {
                let mut inner = lock_inner(&shared);
                if shared.cancel.is_cancelled() {
                    sweep_cancelled(&mut inner);
                }
                if inner.terminal == total {
                    break;
                }
            }
            if !pool.try_run_one() {
                let inner = lock_inner(&shared);
                if inner.terminal < total {
                    let _ = shared
                        .cv
                        .wait_timeout(inner, EXEC_PARK_TIMEOUT)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }

        let inner = lock_inner(&shared);
        self.states.clone_from(&inner.states);
        self.remaining.clone_from(&inner.remaining);

        let outcome = if inner.states.contains(&TaskState::Failed) {
            ExecutionOutcome::PartialFailure
        } else if inner.states.contains(&TaskState::Cancelled) {
            ExecutionOutcome::Cancelled
        } else {
            ExecutionOutcome::Completed
        };
        Ok(outcome)
    }

    fn lookup(&self, name: &str) -> Result<u32, GraphError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::UnknownTask(name.to_string()))
    }

    /// Whether `to` is reachable from `from` along existing edges.
    fn reaches(&self, from: u32, to: u32) -> bool {
        let mut visited = vec![false; self.tasks.len()];
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if std::mem::replace(&mut visited[id as usize], true) {
                continue;
            }
            stack.extend_from_slice(&self.tasks[id as usize].succs);
        }
        false
    }

    fn initial_states(&self) -> (Vec<TaskState>, Vec<u32>) {
        let remaining: Vec<u32> = self
            .tasks
            .iter()
            .map(|task| task.preds.len() as u32)
            .collect();
        let states = remaining
            .iter()
            .map(|count| {
                if *count == 0 {
                    TaskState::Ready
                } else {
                    TaskState::Pending
                }
            })
            .collect();
        (states, remaining)
    }
}

impl Default for TaskGraph {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Execution internals
// ---------------------------------------------------------------------------

const EXEC_PARK_TIMEOUT: Duration = Duration::from_millis(2);

struct ExecTask {
    priority: TaskPriority,
    work: TaskWork,
    succs: Vec<u32>,
}

struct ExecInner {
    states: Vec<TaskState>,
    remaining: Vec<u32>,
    terminal: usize,
}

struct ExecShared {
    tasks: Vec<ExecTask>,
    inner: Mutex<ExecInner>,
    cv: Condvar,
    cancel: CancelToken,
    handle: PoolHandle,
}

fn lock_inner(shared: &ExecShared) -> MutexGuard<'_, ExecInner> {
    shared.inner.lock().unwrap_or_else(PoisonError::into_inner)
}

fn spawn_task(shared: &Arc<ExecShared>, id: u32) {
    let cloned = Arc::clone(shared);
    let priority = shared.tasks[id as usize].priority;
    shared.handle.submit(priority, move || run_task(&cloned, id));
}

fn run_task(shared: &Arc<ExecShared>, id: u32) -> Result<(), TaskError> {
    {
        let mut inner = lock_inner(shared);
        if shared.cancel.is_cancelled() {
            sweep_cancelled(&mut inner);
            drop(inner);
            shared.cv.notify_all();
            return Ok(());
        }
        // A poisoned predecessor may have cancelled this task after it was
        // queued; the queued job then runs against a non-Ready state.
        if inner.states[id as usize] != TaskState::Ready {
            return Ok(());
        }
        inner.states[id as usize] = TaskState::Running;
    }

    let context = TaskContext {
        cancel: shared.cancel.clone(),
    };
    let work = Arc::clone(&shared.tasks[id as usize].work);
    let result = catch_unwind(AssertUnwindSafe(|| work(&context)))
        .unwrap_or_else(|payload| Err(TaskError::Panicked(panic_message(payload.as_ref()))));

    let mut newly_ready: Vec<u32> = Vec::new();
    {
        let mut inner = lock_inner(shared);
        match &result {
            Ok(()) => {
                inner.states[id as usize] = TaskState::Completed;
                inner.terminal += 1;
                for &succ in &shared.tasks[id as usize].succs {
                    if inner.states[succ as usize] == TaskState::Pending {
                        inner.remaining[succ as usize] -= 1;
                        if inner.remaining[succ as usize] == 0 {
                            inner.states[succ as usize] = TaskState::Ready;
                            newly_ready.push(succ);
                        }
                    }
                }
            }
            Err(error) => {
                warn!("task failed, cancelling its successors: {error}");
                inner.states[id as usize] = TaskState::Failed;
                inner.terminal += 1;
                poison_successors(&mut inner, &shared.tasks, id);
            }
        }
    }
    shared.cv.notify_all();
    for succ in newly_ready {
        spawn_task(shared, succ);
    }
    result
}

/// Marks every not-yet-running transitive successor of `from` as `Cancelled`.
fn poison_successors(inner: &mut ExecInner, tasks: &[ExecTask], from: u32) {
    let mut stack: Vec<u32> = tasks[from as usize].succs.clone();
    while let Some(id) = stack.pop() {
        if matches!(
            inner.states[id as usize],
            TaskState::Pending | TaskState::Ready
        ) {
            inner.states[id as usize] = TaskState::Cancelled;
            inner.terminal += 1;
            stack.extend_from_slice(&tasks[id as usize].succs);
        }
    }
}

/// Graph-wide cancellation: every `Pending`/`Ready` task becomes terminal.
fn sweep_cancelled(inner: &mut ExecInner) {
    for state in &mut inner.states {
        if matches!(*state, TaskState::Pending | TaskState::Ready) {
            *state = TaskState::Cancelled;
            inner.terminal += 1;
        }
    }
}
