//! Sleeping and Island Management
//!
//! Puts resting islands to sleep by migrating them out of the active set.
//!
//! # Islands
//!
//! Bodies connected through constraints form islands. An island may sleep
//! only when every body in it is a sleep candidate: one moving body keeps
//! the whole component awake.
//!
//! # Incremental detection
//!
//! Scanning the entire constraint graph every timestep would dwarf the cost
//! of simulating it. Instead, each update seeds a bounded number of
//! traversals at rotating start indices, so every body is examined within a
//! bounded number of frames while any single frame touches only a small
//! fraction of the active set.
//!
//! # Pipeline
//!
//! 1. *Target selection*: uniformly spaced seed indices, rotated each
//!    frame; in deterministic mode remapped through a handle-sorted
//!    permutation.
//! 2. *Parallel traversal*: workers claim seeds off an atomic counter and
//!    depth-first walk the constraint graph, bounded by per-worker quotas.
//! 3. *Deduplication*: two workers can find the same component; the lowest
//!    worker index wins.
//! 4. *Parallel gather*: each surviving island gets a fresh set id and its
//!    body and constraint data is copied into the new sleeping set by
//!    chunked jobs claimed off a second atomic counter.
//!
//! The sleeper never removes bodies from the active set; the caller does
//! that afterwards using the returned island descriptors.

use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::bodies::{
    Bodies, BodyActivity, BodyConstraintReference, BodyInertia, BodySet, BodyVelocity,
    Collidable, RigidPose,
};
use crate::dispatcher::{SequentialDispatcher, ThreadDispatcher};
use crate::error::PhysicsError;
use crate::handles::{BodyHandle, BodyLocation, ConstraintHandle, ConstraintLocation};
use crate::id_pool::IdPool;
use crate::index_set::IndexSet;
use crate::islands::IslandScaffold;
use crate::solver::{ConstraintBatch, ConstraintSet, Solver, TypeBatch, TypeBatchRange};

/// Bodies per gather job range.
const GATHER_JOB_GRANULARITY: usize = 32;

// ============================================================================
// Results and statistics
// ============================================================================

/// Descriptor of one island put to sleep by an update.
///
/// `body_indices` are the island's *active set* indices in traversal order;
/// they stay valid until the caller removes the bodies from the active set.
#[derive(Clone, Debug, PartialEq)]
pub struct SleptIsland {
    /// Id of the sleeping set now holding the island
    pub set_id: usize,
    /// Active-set indices of the island's bodies, in traversal order
    pub body_indices: Vec<usize>,
}

/// Counters describing the most recent sleeper update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SleepStats {
    /// Seeds consumed from the traversal schedule
    pub seeds_examined: usize,
    /// Bodies visited across all workers, successful or not
    pub bodies_traversed: usize,
    /// Islands produced by traversals, before deduplication
    pub islands_found: usize,
    /// Islands that survived deduplication
    pub islands_accepted: usize,
    /// Bodies moved into sleeping sets
    pub bodies_slept: usize,
    /// Constraints moved into sleeping sets
    pub constraints_slept: usize,
}

// ============================================================================
// Sleep predicates
// ============================================================================

/// Decides whether a traversal may include a body. The traversal aborts the
/// moment any visited body is rejected.
trait SleepCandidacy {
    fn allows(&self, body_index: usize, bodies: &Bodies) -> bool;
}

/// Normal ticks: only bodies flagged as sleep candidates may sleep.
struct CandidateFilter;

impl SleepCandidacy for CandidateFilter {
    #[inline]
    fn allows(&self, body_index: usize, bodies: &Bodies) -> bool {
        bodies.active_set().activity[body_index].sleep_candidate
    }
}

/// Forced sleep: candidacy is ignored.
struct ForcedSleep;

impl SleepCandidacy for ForcedSleep {
    #[inline]
    fn allows(&self, _body_index: usize, _bodies: &Bodies) -> bool {
        true
    }
}

// ============================================================================
// Traversal
// ============================================================================

/// Per-traversal working state, reused across a worker's traversals.
struct TraversalScratch {
    considered_bodies: IndexSet,
    considered_constraints: IndexSet,
    visitation_stack: Vec<usize>,
    body_indices: Vec<usize>,
    constraint_handles: Vec<ConstraintHandle>,
    connected: Vec<usize>,
}

impl TraversalScratch {
    fn new(body_capacity: usize, constraint_capacity: usize, constraint_space: usize) -> Self {
        Self {
            considered_bodies: IndexSet::new(),
            considered_constraints: IndexSet::with_capacity(constraint_space),
            visitation_stack: Vec::with_capacity(body_capacity),
            body_indices: Vec::with_capacity(body_capacity),
            constraint_handles: Vec::with_capacity(constraint_capacity),
            connected: Vec::with_capacity(4),
        }
    }

    fn reset(&mut self) {
        self.considered_bodies.clear();
        self.considered_constraints.clear();
        self.visitation_stack.clear();
        self.body_indices.clear();
        self.constraint_handles.clear();
        self.connected.clear();
    }
}

/// A traversal that succeeded: the island's bodies in discovery order plus
/// the pre-gather constraint arrangement.
struct IslandCandidate {
    body_indices: Vec<usize>,
    scaffold: IslandScaffold,
}

/// Everything one worker produced during the traversal phase.
struct WorkerTraversalResults {
    /// Union of bodies this worker visited, whether or not the containing
    /// traversal succeeded. Read by later workers' deduplication only after
    /// the dispatch join.
    traversed_bodies: IndexSet,
    islands: Vec<IslandCandidate>,
}

/// Visit one body: record it as traversed, test candidacy, and push it onto
/// the island and the stack. Returns false when the traversal must abort.
///
/// Recording into `traversed_bodies` happens before the candidacy check, so
/// a rejected body still blocks this worker's later seeds from re-walking
/// the same component.
fn try_visit<P: SleepCandidacy>(
    body_index: usize,
    bodies: &Bodies,
    predicate: &P,
    traversed_bodies: &mut IndexSet,
    considered_bodies: &mut IndexSet,
    body_indices: &mut Vec<usize>,
    visitation_stack: &mut Vec<usize>,
) -> bool {
    if considered_bodies.contains(body_index) {
        return true;
    }
    if traversed_bodies.contains(body_index) {
        return false;
    }
    traversed_bodies.insert(body_index);
    if !predicate.allows(body_index, bodies) {
        return false;
    }
    considered_bodies.insert(body_index);
    body_indices.push(body_index);
    visitation_stack.push(body_index);
    true
}

/// Depth-first walk of the constraint graph from `seed`, collecting bodies
/// and constraints into the scratch lists. Returns true when the whole
/// component passed the predicate.
fn collect_island<P: SleepCandidacy>(
    bodies: &Bodies,
    solver: &Solver,
    seed: usize,
    predicate: &P,
    traversed_bodies: &mut IndexSet,
    scratch: &mut TraversalScratch,
) -> bool {
    let TraversalScratch {
        considered_bodies,
        considered_constraints,
        visitation_stack,
        body_indices,
        constraint_handles,
        connected,
    } = scratch;

    if !try_visit(
        seed,
        bodies,
        predicate,
        traversed_bodies,
        considered_bodies,
        body_indices,
        visitation_stack,
    ) {
        return false;
    }

    while let Some(body) = visitation_stack.pop() {
        for reference in &bodies.active_set().constraints[body] {
            let handle = reference.connecting_constraint_handle;
            if considered_constraints.contains(handle.0) {
                continue;
            }
            considered_constraints.insert(handle.0);
            constraint_handles.push(handle);

            connected.clear();
            solver.enumerate_connected_bodies(handle, |other| {
                if other != body {
                    connected.push(other);
                }
            });
            for i in 0..connected.len() {
                if !try_visit(
                    connected[i],
                    bodies,
                    predicate,
                    traversed_bodies,
                    considered_bodies,
                    body_indices,
                    visitation_stack,
                ) {
                    return false;
                }
            }
        }
    }
    true
}

// ============================================================================
// Gather jobs
// ============================================================================

/// Mutable view over one contiguous body range of a sleeping set.
struct BodyRangeTargets<'a> {
    index_to_handle: &'a mut [BodyHandle],
    activity: &'a mut [BodyActivity],
    collidables: &'a mut [Collidable],
    constraints: &'a mut [Vec<BodyConstraintReference>],
    local_inertias: &'a mut [BodyInertia],
    poses: &'a mut [RigidPose],
    velocities: &'a mut [BodyVelocity],
}

enum GatherJob<'a> {
    Body {
        source_indices: &'a [usize],
        targets: BodyRangeTargets<'a>,
    },
    Constraints {
        type_id: usize,
        source_handles: &'a [ConstraintHandle],
        target: TypeBatchRange<'a>,
    },
}

impl GatherJob<'_> {
    fn execute(self, bodies: &Bodies, solver: &Solver) {
        match self {
            Self::Body {
                source_indices,
                targets,
            } => {
                let active = bodies.active_set();
                for (row, &source) in source_indices.iter().enumerate() {
                    targets.index_to_handle[row] = active.index_to_handle[source];
                    targets.activity[row] = active.activity[source];
                    targets.collidables[row] = active.collidables[source];
                    targets.constraints[row] = active.constraints[source].clone();
                    targets.local_inertias[row] = active.local_inertias[source];
                    targets.poses[row] = active.poses[source];
                    targets.velocities[row] = active.velocities[source];
                }
            }
            Self::Constraints {
                type_id,
                source_handles,
                mut target,
            } => {
                solver.type_processor(type_id).gather_active_constraints(
                    bodies,
                    solver,
                    source_handles,
                    &mut target,
                );
            }
        }
    }
}

/// Chunk sizes for a gather partition: `max(1, total / 32)` contiguous
/// ranges, the first `total % chunk_count` ranges one element longer.
fn chunk_sizes(total: usize) -> Vec<usize> {
    let chunk_count = (total / GATHER_JOB_GRANULARITY).max(1);
    let base = total / chunk_count;
    let remainder = total % chunk_count;
    (0..chunk_count)
        .map(|i| base + usize::from(i < remainder))
        .collect()
}

/// A sleeping set under construction, not yet installed.
struct PreparedIsland {
    set_id: usize,
    body_set: BodySet,
    constraint_set: ConstraintSet,
    candidate: IslandCandidate,
}

// ============================================================================
// IslandSleeper
// ============================================================================

/// Finds sleep-ready islands in the active constraint graph and migrates
/// them into sleeping sets.
pub struct IslandSleeper {
    set_id_pool: IdPool,
    schedule_offset: usize,
    stats: SleepStats,

    /// Initial capacity for island body lists during traversal.
    pub initial_island_body_capacity: usize,
    /// Initial capacity for island constraint lists during traversal.
    pub initial_island_constraint_capacity: usize,
    /// Fraction of the active set seeded for traversal each update.
    pub tested_fraction_per_frame: f32,
    /// Fraction of the active set targeted for sleeping each update.
    pub target_slept_fraction: f32,
    /// Fraction of the active set targeted for traversal each update.
    pub target_traversed_fraction: f32,
}

impl Default for IslandSleeper {
    fn default() -> Self {
        Self::new()
    }
}

impl IslandSleeper {
    /// Create a sleeper. Set id 0 is reserved for the active set.
    #[must_use]
    pub fn new() -> Self {
        let mut set_id_pool = IdPool::new();
        let active_set_id = set_id_pool.take();
        debug_assert_eq!(active_set_id, 0);
        Self {
            set_id_pool,
            schedule_offset: 0,
            stats: SleepStats::default(),
            initial_island_body_capacity: 1024,
            initial_island_constraint_capacity: 1024,
            tested_fraction_per_frame: 0.01,
            target_slept_fraction: 0.005,
            target_traversed_fraction: 0.02,
        }
    }

    /// Counters from the most recent update.
    #[inline]
    #[must_use]
    pub fn last_update_stats(&self) -> SleepStats {
        self.stats
    }

    /// Hand a sleeping set id back for reuse, after the caller has emptied
    /// and deallocated the set.
    pub fn return_set_id(&mut self, set_id: usize) {
        debug_assert_ne!(set_id, 0, "the active set id is never returned");
        self.set_id_pool.return_id(set_id);
    }

    /// Grow body and constraint set arrays to hold at least `capacity` sets.
    pub fn ensure_sets_capacity(
        &self,
        bodies: &mut Bodies,
        solver: &mut Solver,
        capacity: usize,
    ) {
        bodies.ensure_sets_capacity(capacity);
        solver.ensure_sets_capacity(capacity);
    }

    /// Resize set arrays to `capacity`, never below what claimed set ids
    /// may still reference.
    pub fn resize_sets_capacity(
        &self,
        bodies: &mut Bodies,
        solver: &mut Solver,
        capacity: usize,
    ) {
        let minimum = self
            .set_id_pool
            .highest_possibly_claimed_id()
            .map_or(1, |id| id + 1);
        let target = capacity.max(minimum);
        bodies.resize_sets_capacity(target);
        solver.resize_sets_capacity(target);
    }

    /// Forget all claimed set ids. Set id 0 stays reserved.
    pub fn clear(&mut self) {
        self.set_id_pool.clear();
        let active_set_id = self.set_id_pool.take();
        debug_assert_eq!(active_set_id, 0);
    }

    // ------------------------------------------------------------------
    // Target selection
    // ------------------------------------------------------------------

    /// Emit this update's traversal seeds: `candidate_count` indices spaced
    /// evenly over the active set, starting at the rotating offset. The
    /// rotation guarantees every index is eventually seeded even when
    /// `candidate_count * spacing` does not cover the set.
    fn collect_traversal_targets(&mut self, bodies: &Bodies, deterministic: bool) -> Vec<usize> {
        let active_count = bodies.active_set().count();
        let candidate_count =
            ((active_count as f32 * self.tested_fraction_per_frame) as usize).max(1);
        let spacing = active_count / candidate_count;

        // A shrinking active set can strand the offset out of range; it is
        // reset rather than wrapped.
        if self.schedule_offset > active_count {
            self.schedule_offset = 0;
        }

        let mut seeds = Vec::with_capacity(candidate_count);
        let mut index = self.schedule_offset;
        for _ in 0..candidate_count {
            // The > comparison admits one seed equal to the active count;
            // the worker loop rejects it before use.
            if index > active_count {
                index -= active_count;
            }
            seeds.push(index);
            index += spacing;
        }
        self.schedule_offset += 1;

        if deterministic {
            // Seed identity becomes a function of handles, not memory
            // layout: remap each seed through the handle-sorted permutation.
            let handles = &bodies.active_set().index_to_handle;
            let mut permutation: Vec<usize> = (0..active_count).collect();
            permutation.sort_by_key(|&body| handles[body]);
            for seed in &mut seeds {
                if *seed < active_count {
                    *seed = permutation[*seed];
                }
            }
        }
        seeds
    }

    // ------------------------------------------------------------------
    // Update entry points
    // ------------------------------------------------------------------

    /// Run one incremental sleep update.
    ///
    /// Returns a descriptor per island put to sleep. The active set is not
    /// modified; the caller removes the listed bodies afterwards.
    pub fn update<D: ThreadDispatcher>(
        &mut self,
        bodies: &mut Bodies,
        solver: &mut Solver,
        dispatcher: &D,
        deterministic: bool,
    ) -> Vec<SleptIsland> {
        self.stats = SleepStats::default();
        let active_count = bodies.active_set().count();
        if active_count == 0 {
            return Vec::new();
        }
        let seeds = self.collect_traversal_targets(bodies, deterministic);
        let target_slept = (active_count as f32 * self.target_slept_fraction).ceil() as usize;
        let target_traversed =
            (active_count as f32 * self.target_traversed_fraction).ceil() as usize;
        self.sleep(
            bodies,
            solver,
            dispatcher,
            &seeds,
            target_slept,
            target_traversed,
            false,
        )
    }

    /// Forcefully sleep the given bodies and everything reachable from them
    /// through the constraint graph, ignoring sleep candidacy and quotas.
    pub fn sleep_bodies<D: ThreadDispatcher>(
        &mut self,
        bodies: &mut Bodies,
        solver: &mut Solver,
        dispatcher: &D,
        body_indices: &[usize],
        deterministic: bool,
    ) -> Vec<SleptIsland> {
        self.stats = SleepStats::default();
        let mut seeds = body_indices.to_vec();
        if deterministic {
            let handles = &bodies.active_set().index_to_handle;
            seeds.sort_by_key(|&body| handles[body]);
        }
        self.sleep(
            bodies,
            solver,
            dispatcher,
            &seeds,
            usize::MAX,
            usize::MAX,
            true,
        )
    }

    /// Forcefully sleep a single body and its island.
    pub fn sleep_body(
        &mut self,
        bodies: &mut Bodies,
        solver: &mut Solver,
        body_index: usize,
    ) -> Result<Vec<SleptIsland>, PhysicsError> {
        let count = bodies.active_set().count();
        if body_index >= count {
            return Err(PhysicsError::InvalidBodyIndex {
                index: body_index,
                count,
            });
        }
        Ok(self.sleep_bodies(
            bodies,
            solver,
            &SequentialDispatcher::new(1),
            &[body_index],
            false,
        ))
    }

    // ------------------------------------------------------------------
    // The pipeline
    // ------------------------------------------------------------------

    fn sleep<D: ThreadDispatcher>(
        &mut self,
        bodies: &mut Bodies,
        solver: &mut Solver,
        dispatcher: &D,
        seeds: &[usize],
        target_slept_total: usize,
        target_traversed_total: usize,
        force_sleep: bool,
    ) -> Vec<SleptIsland> {
        let active_count = bodies.active_set().count();
        if active_count == 0 || seeds.is_empty() {
            return Vec::new();
        }

        // Phase 1: parallel traversal.
        let worker_count = dispatcher.thread_count();
        let target_slept_per_thread = (target_slept_total / worker_count).max(1);
        let target_traversed_per_thread = (target_traversed_total / worker_count).max(1);
        let body_capacity = self.initial_island_body_capacity.min(active_count);
        let constraint_space = solver
            .handle_pool
            .highest_possibly_claimed_id()
            .map_or(0, |id| id + 1);
        let constraint_capacity = self
            .initial_island_constraint_capacity
            .min(constraint_space.max(8));

        let traversal_job_index = AtomicUsize::new(0);
        let bodies_ref: &Bodies = bodies;
        let solver_ref: &Solver = solver;
        let mut worker_results: Vec<WorkerTraversalResults> =
            dispatcher.dispatch_workers(|_worker_index| {
                let mut results = WorkerTraversalResults {
                    traversed_bodies: IndexSet::with_capacity(active_count),
                    islands: Vec::new(),
                };
                let mut scratch =
                    TraversalScratch::new(body_capacity, constraint_capacity, constraint_space);
                let mut slept_on_this_worker = 0usize;
                let mut traversed_on_this_worker = 0usize;

                while slept_on_this_worker < target_slept_per_thread
                    && traversed_on_this_worker < target_traversed_per_thread
                {
                    let job = traversal_job_index.fetch_add(1, Ordering::Relaxed);
                    if job >= seeds.len() {
                        break;
                    }
                    let seed = seeds[job];
                    if seed >= active_count {
                        // The schedule can emit one index past the end.
                        continue;
                    }
                    scratch.reset();
                    let success = if force_sleep {
                        collect_island(
                            bodies_ref,
                            solver_ref,
                            seed,
                            &ForcedSleep,
                            &mut results.traversed_bodies,
                            &mut scratch,
                        )
                    } else {
                        collect_island(
                            bodies_ref,
                            solver_ref,
                            seed,
                            &CandidateFilter,
                            &mut results.traversed_bodies,
                            &mut scratch,
                        )
                    };
                    traversed_on_this_worker += scratch.body_indices.len();
                    if success && !scratch.body_indices.is_empty() {
                        slept_on_this_worker += scratch.body_indices.len();
                        let scaffold =
                            IslandScaffold::new(&scratch.constraint_handles, solver_ref);
                        results.islands.push(IslandCandidate {
                            body_indices: scratch.body_indices.clone(),
                            scaffold,
                        });
                    }
                }
                results
            });

        self.stats.seeds_examined = traversal_job_index
            .load(Ordering::Relaxed)
            .min(seeds.len());
        self.stats.bodies_traversed = worker_results
            .iter()
            .map(|results| results.traversed_bodies.count())
            .sum();

        // Phase 2: deduplication. Two workers can independently discover the
        // same component; both must then have visited every body in it, so
        // testing the identity body against earlier workers suffices.
        let mut accepted: Vec<IslandCandidate> = Vec::new();
        for worker_index in 0..worker_results.len() {
            let (earlier, rest) = worker_results.split_at_mut(worker_index);
            let islands = core::mem::take(&mut rest[0].islands);
            for island in islands {
                self.stats.islands_found += 1;
                let identity = island.body_indices[0];
                let duplicate = earlier
                    .iter()
                    .any(|results| results.traversed_bodies.contains(identity));
                if !duplicate {
                    accepted.push(island);
                }
            }
        }
        if accepted.is_empty() {
            return Vec::new();
        }
        self.stats.islands_accepted = accepted.len();

        // Phase 3: allocate ids and shape the sleeping sets.
        let mut prepared: Vec<PreparedIsland> = Vec::with_capacity(accepted.len());
        let mut highest_set_id = 0;
        for candidate in accepted {
            let set_id = self.set_id_pool.take();
            highest_set_id = highest_set_id.max(set_id);
            let body_set = BodySet::with_len(candidate.body_indices.len());
            let mut constraint_set = ConstraintSet::default();
            for scaffold_batch in &candidate.scaffold.batches {
                let mut batch = ConstraintBatch::default();
                for scaffold_type_batch in &scaffold_batch.type_batches {
                    let processor = solver.type_processor(scaffold_type_batch.type_id);
                    batch.type_batches.push(TypeBatch::with_len(
                        scaffold_type_batch.type_id,
                        scaffold_type_batch.handles.len(),
                        processor.bodies_per_constraint(),
                        processor.payload_stride(),
                    ));
                }
                constraint_set.batches.push(batch);
            }
            self.stats.bodies_slept += candidate.body_indices.len();
            self.stats.constraints_slept += candidate.scaffold.constraint_count();
            prepared.push(PreparedIsland {
                set_id,
                body_set,
                constraint_set,
                candidate,
            });
        }

        // Ids name slots in the set arrays; grow before first write.
        self.ensure_sets_capacity(bodies, solver, highest_set_id + 1);

        // Phase 4: parallel gather over chunked jobs.
        let mut jobs: Vec<Mutex<Option<GatherJob<'_>>>> = Vec::new();
        for island in &mut prepared {
            let body_count = island.candidate.body_indices.len();
            let mut source = island.candidate.body_indices.as_slice();
            let mut index_to_handle = island.body_set.index_to_handle.as_mut_slice();
            let mut activity = island.body_set.activity.as_mut_slice();
            let mut collidables = island.body_set.collidables.as_mut_slice();
            let mut constraints = island.body_set.constraints.as_mut_slice();
            let mut local_inertias = island.body_set.local_inertias.as_mut_slice();
            let mut poses = island.body_set.poses.as_mut_slice();
            let mut velocities = island.body_set.velocities.as_mut_slice();
            for size in chunk_sizes(body_count) {
                let (source_head, source_tail) = source.split_at(size);
                source = source_tail;
                let (handle_head, handle_tail) = index_to_handle.split_at_mut(size);
                index_to_handle = handle_tail;
                let (activity_head, activity_tail) = activity.split_at_mut(size);
                activity = activity_tail;
                let (collidable_head, collidable_tail) = collidables.split_at_mut(size);
                collidables = collidable_tail;
                let (constraint_head, constraint_tail) = constraints.split_at_mut(size);
                constraints = constraint_tail;
                let (inertia_head, inertia_tail) = local_inertias.split_at_mut(size);
                local_inertias = inertia_tail;
                let (pose_head, pose_tail) = poses.split_at_mut(size);
                poses = pose_tail;
                let (velocity_head, velocity_tail) = velocities.split_at_mut(size);
                velocities = velocity_tail;
                jobs.push(Mutex::new(Some(GatherJob::Body {
                    source_indices: source_head,
                    targets: BodyRangeTargets {
                        index_to_handle: handle_head,
                        activity: activity_head,
                        collidables: collidable_head,
                        constraints: constraint_head,
                        local_inertias: inertia_head,
                        poses: pose_head,
                        velocities: velocity_head,
                    },
                })));
            }

            for (scaffold_batch, target_batch) in island
                .candidate
                .scaffold
                .batches
                .iter()
                .zip(island.constraint_set.batches.iter_mut())
            {
                for (scaffold_type_batch, target_type_batch) in scaffold_batch
                    .type_batches
                    .iter()
                    .zip(target_batch.type_batches.iter_mut())
                {
                    let processor = solver.type_processor(scaffold_type_batch.type_id);
                    let bodies_per = processor.bodies_per_constraint();
                    let stride = processor.payload_stride();
                    let mut source_handles = scaffold_type_batch.handles.as_slice();
                    let mut handles = target_type_batch.handles.as_mut_slice();
                    let mut references = target_type_batch.body_references.as_mut_slice();
                    let mut payload = target_type_batch.payload.as_mut_slice();
                    for size in chunk_sizes(scaffold_type_batch.handles.len()) {
                        let (source_head, source_tail) = source_handles.split_at(size);
                        source_handles = source_tail;
                        let (handle_head, handle_tail) = handles.split_at_mut(size);
                        handles = handle_tail;
                        let (reference_head, reference_tail) =
                            references.split_at_mut(size * bodies_per);
                        references = reference_tail;
                        let (payload_head, payload_tail) = payload.split_at_mut(size * stride);
                        payload = payload_tail;
                        jobs.push(Mutex::new(Some(GatherJob::Constraints {
                            type_id: scaffold_type_batch.type_id,
                            source_handles: source_head,
                            target: TypeBatchRange {
                                handles: handle_head,
                                body_references: reference_head,
                                payload: payload_head,
                            },
                        })));
                    }
                }
            }
        }

        let gather_job_index = AtomicUsize::new(0);
        let bodies_ref: &Bodies = bodies;
        let solver_ref: &Solver = solver;
        let jobs_ref = &jobs;
        dispatcher.dispatch_workers(|_worker_index| loop {
            let job = gather_job_index.fetch_add(1, Ordering::Relaxed);
            if job >= jobs_ref.len() {
                break;
            }
            // Each slot is claimed exactly once through the counter.
            let claimed = jobs_ref[job].lock().ok().and_then(|mut slot| slot.take());
            if let Some(claimed) = claimed {
                claimed.execute(bodies_ref, solver_ref);
            }
        });
        drop(jobs);

        // Phase 5: install the sets and repoint handles.
        let mut slept = Vec::with_capacity(prepared.len());
        for island in prepared {
            let PreparedIsland {
                set_id,
                body_set,
                constraint_set,
                candidate,
            } = island;
            for (index, handle) in body_set.index_to_handle.iter().enumerate() {
                bodies.handle_to_location[handle.0] = Some(BodyLocation {
                    set_index: set_id,
                    index,
                });
            }
            for (batch_index, batch) in constraint_set.batches.iter().enumerate() {
                for (type_batch_index, type_batch) in batch.type_batches.iter().enumerate() {
                    for (row, handle) in type_batch.handles.iter().enumerate() {
                        solver.handle_to_constraint[handle.0] = Some(ConstraintLocation {
                            set_index: set_id,
                            batch_index,
                            type_batch_index,
                            index_in_type_batch: row,
                        });
                    }
                }
            }
            bodies.sets[set_id] = Some(body_set);
            solver.sets[set_id] = constraint_set;
            slept.push(SleptIsland {
                set_id,
                body_indices: candidate.body_indices,
            });
        }
        slept
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bodies::BodyDescription;
    use crate::solver::DistanceTypeProcessor;

    /// Chain of `count` bodies linked by distance constraints, all sleep
    /// candidates unless listed in `awake`.
    fn chain_world(count: usize, awake: &[usize]) -> (Bodies, Solver) {
        let mut bodies = Bodies::new();
        let mut solver = Solver::new();
        for i in 0..count {
            let mut description = BodyDescription {
                activity: BodyActivity::candidate(),
                ..Default::default()
            };
            if awake.contains(&i) {
                description.activity.sleep_candidate = false;
            }
            bodies.add_body(&description);
        }
        for i in 0..count.saturating_sub(1) {
            solver.add_constraint(
                &mut bodies,
                DistanceTypeProcessor::TYPE_ID,
                &[i, i + 1],
                &[1.0, 0.0],
            );
        }
        (bodies, solver)
    }

    fn eager_sleeper() -> IslandSleeper {
        let mut sleeper = IslandSleeper::new();
        // Examine and sleep everything reachable in a single update.
        sleeper.tested_fraction_per_frame = 1.0;
        sleeper.target_slept_fraction = 1.0;
        sleeper.target_traversed_fraction = 1.0;
        sleeper
    }

    #[test]
    fn test_chunk_sizes_partition() {
        assert_eq!(chunk_sizes(1), vec![1]);
        assert_eq!(chunk_sizes(31), vec![31]);
        assert_eq!(chunk_sizes(64), vec![32, 32]);
        let sizes = chunk_sizes(100);
        assert_eq!(sizes.len(), 3);
        assert_eq!(sizes.iter().sum::<usize>(), 100);
        assert_eq!(sizes, vec![34, 33, 33]);
    }

    #[test]
    fn test_sleeps_whole_candidate_chain() {
        let (mut bodies, mut solver) = chain_world(5, &[]);
        let mut sleeper = eager_sleeper();
        let dispatcher = SequentialDispatcher::new(1);
        let slept = sleeper.update(&mut bodies, &mut solver, &dispatcher, false);

        assert_eq!(slept.len(), 1);
        assert_eq!(slept[0].set_id, 1);
        assert_eq!(slept[0].body_indices.len(), 5);
        let stats = sleeper.last_update_stats();
        assert_eq!(stats.islands_accepted, 1);
        assert_eq!(stats.bodies_slept, 5);
        assert_eq!(stats.constraints_slept, 4);

        let sleeping = bodies.set(1).expect("sleeping set installed");
        assert_eq!(sleeping.count(), 5);
        assert_eq!(solver.sets[1].constraint_count(), 4);
        // The active set itself is untouched.
        assert_eq!(bodies.active_set().count(), 5);
    }

    #[test]
    fn test_non_candidate_blocks_island() {
        let (mut bodies, mut solver) = chain_world(5, &[2]);
        let mut sleeper = eager_sleeper();
        let dispatcher = SequentialDispatcher::new(1);
        let slept = sleeper.update(&mut bodies, &mut solver, &dispatcher, false);

        assert!(slept.is_empty());
        assert_eq!(sleeper.last_update_stats().islands_accepted, 0);
        assert!(bodies.set(1).is_none());
    }

    #[test]
    fn test_handles_repointed_to_sleeping_set() {
        let (mut bodies, mut solver) = chain_world(3, &[]);
        let handle = bodies.active_set().index_to_handle[1];
        let mut sleeper = eager_sleeper();
        let dispatcher = SequentialDispatcher::new(1);
        let slept = sleeper.update(&mut bodies, &mut solver, &dispatcher, false);

        assert_eq!(slept.len(), 1);
        let location = bodies.location(handle).expect("handle stays live");
        assert_eq!(location.set_index, slept[0].set_id);
        let sleeping = bodies.set(location.set_index).expect("set exists");
        assert_eq!(sleeping.index_to_handle[location.index], handle);
    }

    #[test]
    fn test_sleeping_constraints_store_handles() {
        let (mut bodies, mut solver) = chain_world(3, &[]);
        let mut sleeper = eager_sleeper();
        let dispatcher = SequentialDispatcher::new(1);
        let slept = sleeper.update(&mut bodies, &mut solver, &dispatcher, false);
        let set_id = slept[0].set_id;

        for batch in &solver.sets[set_id].batches {
            for type_batch in &batch.type_batches {
                for &reference in &type_batch.body_references {
                    let location = bodies
                        .location(BodyHandle(reference))
                        .expect("references resolve as handles");
                    assert_eq!(location.set_index, set_id);
                }
            }
        }
    }

    #[test]
    fn test_forced_sleep_ignores_candidacy() {
        let (mut bodies, mut solver) = chain_world(4, &[0, 1, 2, 3]);
        let mut sleeper = IslandSleeper::new();
        let dispatcher = SequentialDispatcher::new(1);
        let slept = sleeper.sleep_bodies(&mut bodies, &mut solver, &dispatcher, &[0], false);

        assert_eq!(slept.len(), 1);
        assert_eq!(slept[0].body_indices.len(), 4);
    }

    #[test]
    fn test_sleep_body_validates_index() {
        let (mut bodies, mut solver) = chain_world(2, &[]);
        let mut sleeper = IslandSleeper::new();
        let result = sleeper.sleep_body(&mut bodies, &mut solver, 7);
        assert_eq!(
            result,
            Err(PhysicsError::InvalidBodyIndex { index: 7, count: 2 })
        );
        assert!(sleeper.sleep_body(&mut bodies, &mut solver, 0).is_ok());
    }

    #[test]
    fn test_two_sequential_workers_dedup_shared_component() {
        // One component reachable from both seeds; the sequential dispatcher
        // keeps worker identities while running serially.
        let (mut bodies, mut solver) = chain_world(6, &[]);
        let mut sleeper = eager_sleeper();
        let dispatcher = SequentialDispatcher::new(2);
        let slept = sleeper.update(&mut bodies, &mut solver, &dispatcher, false);

        assert_eq!(slept.len(), 1, "duplicate island must be dropped");
        let stats = sleeper.last_update_stats();
        assert_eq!(stats.islands_accepted, 1);
        assert_eq!(stats.bodies_slept, 6);
    }

    #[test]
    fn test_separate_islands_get_separate_sets() {
        // Two disjoint pairs.
        let mut bodies = Bodies::new();
        let mut solver = Solver::new();
        for _ in 0..4 {
            bodies.add_body(&BodyDescription {
                activity: BodyActivity::candidate(),
                ..Default::default()
            });
        }
        solver.add_constraint(
            &mut bodies,
            DistanceTypeProcessor::TYPE_ID,
            &[0, 1],
            &[1.0, 0.0],
        );
        solver.add_constraint(
            &mut bodies,
            DistanceTypeProcessor::TYPE_ID,
            &[2, 3],
            &[1.0, 0.0],
        );

        let mut sleeper = eager_sleeper();
        let dispatcher = SequentialDispatcher::new(1);
        let slept = sleeper.update(&mut bodies, &mut solver, &dispatcher, false);

        assert_eq!(slept.len(), 2);
        assert_ne!(slept[0].set_id, slept[1].set_id);
        let total: usize = slept.iter().map(|island| island.body_indices.len()).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn test_returned_set_id_is_reused() {
        let (mut bodies, mut solver) = chain_world(2, &[]);
        let mut sleeper = eager_sleeper();
        let dispatcher = SequentialDispatcher::new(1);
        let slept = sleeper.update(&mut bodies, &mut solver, &dispatcher, false);
        let set_id = slept[0].set_id;

        // Caller empties the set, then returns the id.
        bodies.sets[set_id] = None;
        solver.sets[set_id] = ConstraintSet::default();
        sleeper.return_set_id(set_id);

        let (mut bodies2, mut solver2) = chain_world(2, &[]);
        let slept2 = sleeper.update(&mut bodies2, &mut solver2, &dispatcher, false);
        assert_eq!(slept2[0].set_id, set_id);
    }

    #[test]
    fn test_empty_active_set_is_a_noop() {
        let mut bodies = Bodies::new();
        let mut solver = Solver::new();
        let mut sleeper = IslandSleeper::new();
        let dispatcher = SequentialDispatcher::new(1);
        let slept = sleeper.update(&mut bodies, &mut solver, &dispatcher, false);
        assert!(slept.is_empty());
        assert_eq!(sleeper.last_update_stats(), SleepStats::default());
    }

    #[test]
    fn test_quota_bounds_traversal() {
        // 64 isolated candidate bodies, tiny traversal quota: the update
        // must stop early rather than sleep everything.
        let mut bodies = Bodies::new();
        let mut solver = Solver::new();
        for _ in 0..64 {
            bodies.add_body(&BodyDescription {
                activity: BodyActivity::candidate(),
                ..Default::default()
            });
        }
        let mut sleeper = IslandSleeper::new();
        sleeper.tested_fraction_per_frame = 1.0;
        sleeper.target_slept_fraction = 0.05;
        sleeper.target_traversed_fraction = 0.05;
        let dispatcher = SequentialDispatcher::new(1);
        let slept = sleeper.update(&mut bodies, &mut solver, &dispatcher, false);

        let slept_bodies: usize = slept.iter().map(|island| island.body_indices.len()).sum();
        assert!(slept_bodies > 0);
        assert!(
            slept_bodies < 64,
            "quotas must bound per-update progress, slept {slept_bodies}"
        );
    }

    #[test]
    fn test_deterministic_updates_are_identical() {
        let build = || chain_world(8, &[]);
        let run = |bodies: &mut Bodies, solver: &mut Solver| {
            let mut sleeper = eager_sleeper();
            let dispatcher = SequentialDispatcher::new(1);
            sleeper.update(bodies, solver, &dispatcher, true)
        };
        let (mut bodies_a, mut solver_a) = build();
        let (mut bodies_b, mut solver_b) = build();
        let slept_a = run(&mut bodies_a, &mut solver_a);
        let slept_b = run(&mut bodies_b, &mut solver_b);

        assert_eq!(slept_a.len(), slept_b.len());
        for (a, b) in slept_a.iter().zip(&slept_b) {
            assert_eq!(a.set_id, b.set_id);
            assert_eq!(a.body_indices, b.body_indices);
        }
    }
}
