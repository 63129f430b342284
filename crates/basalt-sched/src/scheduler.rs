//! Execution-graph construction from system metadata.
//!
//! Nodes live in an arena indexed by dense ids; edges are sorted id lists
//! tagged explicit or implicit. Building resolves explicit relations first,
//! then infers an ordering edge for every unordered same-stage pair whose
//! component access conflicts, directed by `(priority desc, id asc)` so the
//! result is identical across runs.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::Arc;

use dashmap::DashMap;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use crate::dot;
use crate::error::ScheduleError;
use crate::metadata::{DepKind, SystemMetadata, SystemStage};
use crate::world::System;

/// Dense system index, assigned at registration in insertion order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SystemId(pub(crate) u32);

impl SystemId {
    /// Index into the scheduler's node arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Provenance of an ordering edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeKind {
    /// Declared by the system author via `Before`/`After`.
    Explicit,
    /// Inferred from overlapping component access.
    Implicit,
}

pub(crate) struct SystemNode {
    pub(crate) metadata: SystemMetadata,
    system: Arc<dyn System>,
    /// Outgoing edges `(target, kind)`, sorted by target id.
    pub(crate) out_edges: Vec<(u32, EdgeKind)>,
    /// Incoming edge sources, sorted.
    pub(crate) in_edges: Vec<u32>,
}

/// Cloneable sink for per-system runtime samples, written by whichever
/// thread finishes running a system.
#[derive(Clone, Default)]
pub struct StatsSink {
    samples: Arc<DashMap<u32, u64>>,
}

impl StatsSink {
    /// Records the latest runtime of `id` in microseconds.
    pub fn record(&self, id: SystemId, micros: u64) {
        self.samples.insert(id.0, micros);
    }

    fn get(&self, id: u32) -> Option<u64> {
        self.samples.get(&id).map(|entry| *entry)
    }
}

/// Builds and freezes the per-stage execution DAG. See the module docs.
pub struct SystemScheduler {
    pub(crate) nodes: Vec<SystemNode>,
    by_name: FxHashMap<String, u32>,
    pub(crate) stage_nodes: [Vec<u32>; 6],
    built: bool,
    stats: StatsSink,
}

impl SystemScheduler {
    /// An empty scheduler.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            by_name: FxHashMap::default(),
            stage_nodes: Default::default(),
            built: false,
            stats: StatsSink::default(),
        }
    }

    /// Registers a system. Fails on duplicate names and after [`build`].
    ///
    /// [`build`]: Self::build
    pub fn register(
        &mut self,
        metadata: SystemMetadata,
        system: Arc<dyn System>,
    ) -> Result<SystemId, ScheduleError> {
        if self.built {
            return Err(ScheduleError::Frozen);
        }
        if self.by_name.contains_key(&metadata.name) {
            return Err(ScheduleError::DuplicateSystem(metadata.name));
        }
        let id = self.nodes.len() as u32;
        self.by_name.insert(metadata.name.clone(), id);
        self.stage_nodes[metadata.stage.index()].push(id);
        self.nodes.push(SystemNode {
            metadata,
            system,
            out_edges: Vec::new(),
            in_edges: Vec::new(),
        });
        Ok(SystemId(id))
    }

    /// Resolves explicit relations, infers conflict edges, and verifies each
    /// stage's sub-graph is acyclic. A no-op once it has succeeded; on a
    /// cycle error the scheduler is unusable until the metadata changes.
    pub fn build(&mut self) -> Result<(), ScheduleError> {
        if self.built {
            return Ok(());
        }
        let exemptions = self.resolve_explicit();
        self.infer_conflicts(&exemptions);
        self.check_cycles()?;
        self.built = true;
        debug!(systems = self.nodes.len(), "built system execution graph");
        Ok(())
    }

    /// Whether [`build`](Self::build) has succeeded.
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Number of registered systems.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no system is registered.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Id of a registered system.
    pub fn system_id(&self, name: &str) -> Option<SystemId> {
        self.by_name.get(name).map(|id| SystemId(*id))
    }

    /// Metadata of a registered system.
    pub fn metadata(&self, id: SystemId) -> &SystemMetadata {
        &self.nodes[id.index()].metadata
    }

    /// The system handle behind an id.
    pub fn system(&self, id: SystemId) -> Arc<dyn System> {
        Arc::clone(&self.nodes[id.index()].system)
    }

    /// Outgoing ordering edges of `id`.
    pub fn edges(&self, id: SystemId) -> impl Iterator<Item = (SystemId, EdgeKind)> + '_ {
        self.nodes[id.index()]
            .out_edges
            .iter()
            .map(|(target, kind)| (SystemId(*target), *kind))
    }

    /// Systems registered into `stage`, in registration order.
    pub fn stage_members(&self, stage: SystemStage) -> impl Iterator<Item = SystemId> + '_ {
        self.stage_nodes[stage.index()].iter().map(|id| SystemId(*id))
    }

    /// Topologically sorted execution order for `stage`, ties broken by
    /// `(priority desc, id asc)`. Requires a successful [`build`](Self::build).
    pub fn stage_plan(&self, stage: SystemStage) -> Result<Vec<SystemId>, ScheduleError> {
        if !self.built {
            return Err(ScheduleError::NotBuilt);
        }
        let members = &self.stage_nodes[stage.index()];
        let mut indegree: FxHashMap<u32, usize> = members
            .iter()
            .map(|id| (*id, self.nodes[*id as usize].in_edges.len()))
            .collect();

        let mut heap: BinaryHeap<PlanKey> = members
            .iter()
            .filter(|id| indegree[*id] == 0)
            .map(|id| self.plan_key(*id))
            .collect();

        let mut plan = Vec::with_capacity(members.len());
        while let Some(key) = heap.pop() {
            plan.push(SystemId(key.id));
            for (target, _) in &self.nodes[key.id as usize].out_edges {
                if let Some(degree) = indegree.get_mut(target) {
                    *degree -= 1;
                    if *degree == 0 {
                        heap.push(self.plan_key(*target));
                    }
                }
            }
        }
        Ok(plan)
    }

    /// A sink for runtime samples, cloneable into worker-side closures.
    pub fn stats_sink(&self) -> StatsSink {
        self.stats.clone()
    }

    /// Records the latest runtime of `id` in microseconds.
    pub fn record_runtime(&self, id: SystemId, micros: u64) {
        self.stats.record(id, micros);
    }

    /// `(name, last runtime in us)` for every system that has run, slowest
    /// first; equal runtimes order by name for stable output.
    pub fn execution_stats(&self) -> Vec<(String, u64)> {
        let mut stats: Vec<(String, u64)> = self
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(id, node)| {
                self.stats
                    .get(id as u32)
                    .map(|micros| (node.metadata.name.clone(), micros))
            })
            .collect();
        stats.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        stats
    }

    /// Renders the frozen graph as DOT text, grouped by stage, explicit
    /// edges solid and implicit edges dashed.
    pub fn generate_visualization(&self) -> Result<String, ScheduleError> {
        if !self.built {
            return Err(ScheduleError::NotBuilt);
        }
        Ok(dot::render(self))
    }

    fn plan_key(&self, id: u32) -> PlanKey {
        PlanKey {
            priority: self.nodes[id as usize].metadata.priority,
            id,
        }
    }

    /// Turns `Before`/`After` relations into edges and collects `With`
    /// exemption pairs. Unknown and cross-stage targets are skipped with a
    /// warning; they never fail the build.
    fn resolve_explicit(&mut self) -> FxHashSet<(u32, u32)> {
        let mut exemptions = FxHashSet::default();
        for id in 0..self.nodes.len() as u32 {
            let deps = self.nodes[id as usize].metadata.deps.clone();
            for dep in deps {
                let Some(&target) = self.by_name.get(&dep.target) else {
                    warn!(
                        system = %self.nodes[id as usize].metadata.name,
                        target = %dep.target,
                        "explicit dependency targets an unknown system, skipping"
                    );
                    continue;
                };
                let own_stage = self.nodes[id as usize].metadata.stage;
                let target_stage = self.nodes[target as usize].metadata.stage;
                if own_stage != target_stage {
                    warn!(
                        system = %self.nodes[id as usize].metadata.name,
                        target = %dep.target,
                        "explicit dependency crosses stages, skipping; stage order already applies"
                    );
                    continue;
                }
                match dep.kind {
                    DepKind::Before => self.add_edge(id, target, EdgeKind::Explicit),
                    DepKind::After => self.add_edge(target, id, EdgeKind::Explicit),
                    DepKind::With => {
                        exemptions.insert(pair_key(id, target));
                    }
                }
            }
        }
        exemptions
    }

    /// Adds a directed edge for every unordered same-stage pair with
    /// conflicting component access, unless a `With` exemption or an
    /// explicit path already covers the pair.
    fn infer_conflicts(&mut self, exemptions: &FxHashSet<(u32, u32)>) {
        for stage in SystemStage::ALL {
            let members = self.stage_nodes[stage.index()].clone();
            let reachable = self.explicit_reachability(&members);

            for i in 0..members.len() {
                for j in (i + 1)..members.len() {
                    let (a, b) = (members[i], members[j]);
                    if !self.rw_conflict(a, b) {
                        continue;
                    }
                    if exemptions.contains(&pair_key(a, b)) {
                        continue;
                    }
                    // An explicit path in either direction already orders
                    // the pair; direct explicit edges are paths of length 1.
                    if reachable[&a].contains(&b) || reachable[&b].contains(&a) {
                        continue;
                    }

                    let (pa, pb) = (
                        self.nodes[a as usize].metadata.priority,
                        self.nodes[b as usize].metadata.priority,
                    );
                    let (from, to) = match pa.cmp(&pb) {
                        Ordering::Greater => (a, b),
                        Ordering::Less => (b, a),
                        Ordering::Equal => (a.min(b), a.max(b)),
                    };
                    self.add_edge(from, to, EdgeKind::Implicit);
                    debug!(
                        from = %self.nodes[from as usize].metadata.name,
                        to = %self.nodes[to as usize].metadata.name,
                        "inferred ordering edge from component conflict"
                    );
                }
            }
        }
    }

    /// Whether the two systems' access masks can observe inconsistent state.
    fn rw_conflict(&self, a: u32, b: u32) -> bool {
        let ma = &self.nodes[a as usize].metadata;
        let mb = &self.nodes[b as usize].metadata;
        ma.writes.intersects(mb.writes)
            || ma.reads.intersects(mb.writes)
            || ma.writes.intersects(mb.reads)
    }

    /// Per-member transitive closure over the explicit edges only.
    fn explicit_reachability(&self, members: &[u32]) -> FxHashMap<u32, FxHashSet<u32>> {
        let mut closure = FxHashMap::default();
        for &start in members {
            let mut seen = FxHashSet::default();
            let mut stack: Vec<u32> = self.explicit_targets(start).collect();
            while let Some(id) = stack.pop() {
                if seen.insert(id) {
                    stack.extend(self.explicit_targets(id));
                }
            }
            closure.insert(start, seen);
        }
        closure
    }

    fn explicit_targets(&self, id: u32) -> impl Iterator<Item = u32> + '_ {
        self.nodes[id as usize]
            .out_edges
            .iter()
            .filter(|(_, kind)| *kind == EdgeKind::Explicit)
            .map(|(target, _)| *target)
    }

    fn add_edge(&mut self, from: u32, to: u32, kind: EdgeKind) {
        let out = &mut self.nodes[from as usize].out_edges;
        if let Err(slot) = out.binary_search_by_key(&to, |(target, _)| *target) {
            out.insert(slot, (to, kind));
            let ins = &mut self.nodes[to as usize].in_edges;
            if let Err(slot) = ins.binary_search(&from) {
                ins.insert(slot, from);
            }
        }
    }

    /// Kahn's algorithm per stage; any stuck node is part of a cycle.
    fn check_cycles(&self) -> Result<(), ScheduleError> {
        for stage in SystemStage::ALL {
            let members = &self.stage_nodes[stage.index()];
            let mut indegree: FxHashMap<u32, usize> = members
                .iter()
                .map(|id| (*id, self.nodes[*id as usize].in_edges.len()))
                .collect();
            let mut queue: VecDeque<u32> = members
                .iter()
                .filter(|id| indegree[*id] == 0)
                .copied()
                .collect();
            let mut emitted = 0usize;
            while let Some(id) = queue.pop_front() {
                emitted += 1;
                for (target, _) in &self.nodes[id as usize].out_edges {
                    if let Some(degree) = indegree.get_mut(target) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(*target);
                        }
                    }
                }
            }
            if emitted < members.len() {
                let mut systems: Vec<String> = members
                    .iter()
                    .filter(|id| indegree[*id] > 0)
                    .map(|id| self.nodes[*id as usize].metadata.name.clone())
                    .collect();
                systems.sort();
                return Err(ScheduleError::CycleDetected { stage, systems });
            }
        }
        Ok(())
    }
}

impl Default for SystemScheduler {
    fn default() -> Self {
        Self::new()
    }
}

fn pair_key(a: u32, b: u32) -> (u32, u32) {
    (a.min(b), a.max(b))
}

/// Max-heap key: higher priority first, then lower id.
#[derive(PartialEq, Eq)]
struct PlanKey {
    priority: i32,
    id: u32,
}

impl Ord for PlanKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for PlanKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::{ComponentMask, ComponentRegistry};
    use crate::world::World;

    struct NoopSystem;

    impl System for NoopSystem {
        fn run(&self, _world: &World, _dt: f32) {}
    }

    fn noop() -> Arc<dyn System> {
        Arc::new(NoopSystem)
    }

    /// Registry with Position, Velocity, Mesh bits, in that order.
    fn test_registry() -> ComponentRegistry {
        let mut registry = ComponentRegistry::new();
        for name in ["Position", "Velocity", "Mesh"] {
            registry.register(name).unwrap();
        }
        registry
    }

    fn mask(registry: &ComponentRegistry, names: &[&str]) -> ComponentMask {
        registry.mask_of(names).unwrap()
    }

    fn plan_names(scheduler: &SystemScheduler, stage: SystemStage) -> Vec<String> {
        scheduler
            .stage_plan(stage)
            .unwrap()
            .iter()
            .map(|id| scheduler.metadata(*id).name.clone())
            .collect()
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut scheduler = SystemScheduler::new();
        scheduler
            .register(SystemMetadata::new("move", SystemStage::Update), noop())
            .unwrap();
        let result = scheduler.register(SystemMetadata::new("move", SystemStage::Update), noop());
        assert_eq!(
            result.unwrap_err(),
            ScheduleError::DuplicateSystem("move".into())
        );
    }

    #[test]
    fn test_conflict_inferred_by_priority() {
        let registry = test_registry();
        let mut scheduler = SystemScheduler::new();
        let mover = scheduler
            .register(
                SystemMetadata::new("move", SystemStage::Update)
                    .reads(mask(&registry, &["Velocity"]))
                    .writes(mask(&registry, &["Position"]))
                    .priority(10),
                noop(),
            )
            .unwrap();
        let render = scheduler
            .register(
                SystemMetadata::new("render_extract", SystemStage::Update)
                    .reads(mask(&registry, &["Position", "Velocity"]))
                    .priority(5),
                noop(),
            )
            .unwrap();
        scheduler.build().unwrap();

        let edges: Vec<_> = scheduler.edges(mover).collect();
        assert_eq!(edges, vec![(render, EdgeKind::Implicit)]);
        assert_eq!(scheduler.edges(render).count(), 0);
        assert_eq!(
            plan_names(&scheduler, SystemStage::Update),
            vec!["move", "render_extract"]
        );
    }

    #[test]
    fn test_explicit_relation_overrides_inference() {
        let registry = test_registry();
        let mut scheduler = SystemScheduler::new();
        let mover = scheduler
            .register(
                SystemMetadata::new("move", SystemStage::Update)
                    .reads(mask(&registry, &["Velocity"]))
                    .writes(mask(&registry, &["Position"]))
                    .priority(10),
                noop(),
            )
            .unwrap();
        let render = scheduler
            .register(
                SystemMetadata::new("render_extract", SystemStage::Update)
                    .reads(mask(&registry, &["Position", "Velocity"]))
                    .priority(5)
                    .before("move"),
                noop(),
            )
            .unwrap();
        scheduler.build().unwrap();

        // The explicit edge wins; no implicit edge joins the pair.
        let edges: Vec<_> = scheduler.edges(render).collect();
        assert_eq!(edges, vec![(mover, EdgeKind::Explicit)]);
        assert_eq!(scheduler.edges(mover).count(), 0);
        assert_eq!(
            plan_names(&scheduler, SystemStage::Update),
            vec!["render_extract", "move"]
        );
    }

    #[test]
    fn test_with_exemption_suppresses_inference() {
        let registry = test_registry();
        let shared = mask(&registry, &["Position"]);
        let mut scheduler = SystemScheduler::new();
        let a = scheduler
            .register(
                SystemMetadata::new("a", SystemStage::Update)
                    .writes(shared)
                    .priority(1)
                    .with("b"),
                noop(),
            )
            .unwrap();
        let b = scheduler
            .register(
                SystemMetadata::new("b", SystemStage::Update)
                    .writes(shared)
                    .priority(1),
                noop(),
            )
            .unwrap();
        scheduler.build().unwrap();

        assert_eq!(scheduler.edges(a).count(), 0);
        assert_eq!(scheduler.edges(b).count(), 0);
        assert_eq!(scheduler.stage_plan(SystemStage::Update).unwrap().len(), 2);
    }

    #[test]
    fn test_mutual_before_is_a_cycle() {
        let mut scheduler = SystemScheduler::new();
        scheduler
            .register(
                SystemMetadata::new("a", SystemStage::Update).before("b"),
                noop(),
            )
            .unwrap();
        scheduler
            .register(
                SystemMetadata::new("b", SystemStage::Update).before("a"),
                noop(),
            )
            .unwrap();

        match scheduler.build() {
            Err(ScheduleError::CycleDetected { stage, systems }) => {
                assert_eq!(stage, SystemStage::Update);
                assert_eq!(systems, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
        assert!(!scheduler.is_built());
    }

    #[test]
    fn test_transitive_explicit_path_suppresses_inference() {
        let registry = test_registry();
        let shared = mask(&registry, &["Position"]);
        let mut scheduler = SystemScheduler::new();
        let a = scheduler
            .register(
                SystemMetadata::new("a", SystemStage::Update)
                    .writes(shared)
                    .before("b"),
                noop(),
            )
            .unwrap();
        let c = {
            scheduler
                .register(
                    SystemMetadata::new("b", SystemStage::Update).before("c"),
                    noop(),
                )
                .unwrap();
            scheduler
                .register(
                    SystemMetadata::new("c", SystemStage::Update).writes(shared),
                    noop(),
                )
                .unwrap()
        };
        scheduler.build().unwrap();

        // a and c conflict on Position, but a -> b -> c already orders them.
        let a_edges: Vec<_> = scheduler.edges(a).collect();
        assert!(
            !a_edges.iter().any(|(target, _)| *target == c),
            "no direct edge a -> c expected, got {a_edges:?}"
        );
        let names = plan_names(&scheduler, SystemStage::Update);
        let pos = |name: &str| names.iter().position(|n| n == name).unwrap();
        assert!(pos("a") < pos("c"));
    }

    #[test]
    fn test_priority_tie_breaks_toward_lower_id() {
        let registry = test_registry();
        let shared = mask(&registry, &["Velocity"]);
        let mut scheduler = SystemScheduler::new();
        let first = scheduler
            .register(
                SystemMetadata::new("first", SystemStage::Update).writes(shared),
                noop(),
            )
            .unwrap();
        let second = scheduler
            .register(
                SystemMetadata::new("second", SystemStage::Update).writes(shared),
                noop(),
            )
            .unwrap();
        scheduler.build().unwrap();

        let edges: Vec<_> = scheduler.edges(first).collect();
        assert_eq!(edges, vec![(second, EdgeKind::Implicit)]);
    }

    #[test]
    fn test_repeated_builds_are_deterministic() {
        let registry = test_registry();
        let build = || {
            let mut scheduler = SystemScheduler::new();
            for (name, priority) in [("a", 3), ("b", 3), ("c", 7), ("d", 1)] {
                scheduler
                    .register(
                        SystemMetadata::new(name, SystemStage::Update)
                            .writes(mask(&registry, &["Position"]))
                            .priority(priority),
                        noop(),
                    )
                    .unwrap();
            }
            scheduler.build().unwrap();
            let edges: Vec<Vec<(SystemId, EdgeKind)>> = (0..scheduler.len())
                .map(|id| scheduler.edges(SystemId(id as u32)).collect())
                .collect();
            (edges, plan_names(&scheduler, SystemStage::Update))
        };

        assert_eq!(build(), build());
    }

    #[test]
    fn test_conflicting_pairs_end_up_ordered() {
        // Every conflicting pair without an exemption must be joined by a
        // directed path after build.
        let registry = test_registry();
        let mut scheduler = SystemScheduler::new();
        for (name, reads, writes, priority) in [
            ("physics", vec!["Velocity"], vec!["Position"], 10),
            ("ai", vec!["Position"], vec!["Velocity"], 8),
            ("meshing", vec!["Position"], vec!["Mesh"], 5),
            ("audio", vec!["Position"], vec![], 2),
        ] {
            scheduler
                .register(
                    SystemMetadata::new(name, SystemStage::Update)
                        .reads(mask(&registry, &reads))
                        .writes(mask(&registry, &writes))
                        .priority(priority),
                    noop(),
                )
                .unwrap();
        }
        scheduler.build().unwrap();

        let plan = plan_names(&scheduler, SystemStage::Update);
        let pos = |name: &str| plan.iter().position(|n| n == name).unwrap();
        // physics writes Position which everyone else reads.
        assert!(pos("physics") < pos("ai"));
        assert!(pos("physics") < pos("meshing"));
        assert!(pos("physics") < pos("audio"));
        // ai writes Velocity which physics reads; ordered by priority.
        assert!(pos("physics") < pos("ai"));
    }

    #[test]
    fn test_unknown_dependency_target_skipped() {
        let mut scheduler = SystemScheduler::new();
        let lone = scheduler
            .register(
                SystemMetadata::new("lone", SystemStage::Update).after("missing"),
                noop(),
            )
            .unwrap();
        scheduler.build().unwrap();
        assert_eq!(scheduler.edges(lone).count(), 0);
    }

    #[test]
    fn test_cross_stage_dependency_skipped() {
        let mut scheduler = SystemScheduler::new();
        let update = scheduler
            .register(
                SystemMetadata::new("update", SystemStage::Update).before("draw"),
                noop(),
            )
            .unwrap();
        let draw = scheduler
            .register(SystemMetadata::new("draw", SystemStage::Render), noop())
            .unwrap();
        scheduler.build().unwrap();

        // Stage order alone separates them; no edge crosses the boundary.
        assert_eq!(scheduler.edges(update).count(), 0);
        assert_eq!(scheduler.edges(draw).count(), 0);
    }

    #[test]
    fn test_registration_frozen_after_build() {
        let mut scheduler = SystemScheduler::new();
        scheduler
            .register(SystemMetadata::new("a", SystemStage::Update), noop())
            .unwrap();
        scheduler.build().unwrap();
        assert_eq!(
            scheduler
                .register(SystemMetadata::new("b", SystemStage::Update), noop())
                .unwrap_err(),
            ScheduleError::Frozen
        );
        // And building again stays a no-op.
        scheduler.build().unwrap();
    }

    #[test]
    fn test_plan_requires_build() {
        let scheduler = SystemScheduler::new();
        assert_eq!(
            scheduler.stage_plan(SystemStage::Update).unwrap_err(),
            ScheduleError::NotBuilt
        );
    }

    #[test]
    fn test_plan_orders_independent_systems_by_priority_then_id() {
        let mut scheduler = SystemScheduler::new();
        for (name, priority) in [("low", 1), ("high", 9), ("mid_a", 5), ("mid_b", 5)] {
            scheduler
                .register(
                    SystemMetadata::new(name, SystemStage::PostRender).priority(priority),
                    noop(),
                )
                .unwrap();
        }
        scheduler.build().unwrap();
        assert_eq!(
            plan_names(&scheduler, SystemStage::PostRender),
            vec!["high", "mid_a", "mid_b", "low"]
        );
    }

    #[test]
    fn test_execution_stats_sorted_descending() {
        let mut scheduler = SystemScheduler::new();
        let a = scheduler
            .register(SystemMetadata::new("fast", SystemStage::Update), noop())
            .unwrap();
        let b = scheduler
            .register(SystemMetadata::new("slow", SystemStage::Update), noop())
            .unwrap();
        let c = scheduler
            .register(SystemMetadata::new("never_ran", SystemStage::Update), noop())
            .unwrap();
        scheduler.build().unwrap();

        scheduler.record_runtime(a, 120);
        scheduler.record_runtime(b, 4_500);
        let _ = c;

        assert_eq!(
            scheduler.execution_stats(),
            vec![("slow".to_string(), 4_500), ("fast".to_string(), 120)]
        );
    }
}
