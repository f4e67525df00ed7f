//! Constraint Storage - Batched Edition
//!
//! Constraints live in numbered sets mirroring the body sets: set 0 is
//! active, sets 1.. belong to sleeping islands. Within a set, constraints
//! are grouped into *batches* where no two constraints of a batch share a
//! body (the property parallel solvers rely on), and within a batch into
//! *type batches* holding all constraints of one concrete type in parallel
//! rows.
//!
//! # Batching Strategy
//!
//! Insertion is speculative: a new constraint lands in the first batch that
//! references none of its bodies, or opens a new batch. Sleeping sets are
//! shaped by the island scaffold instead and skip the conflict bookkeeping.
//!
//! # Body references
//!
//! Active type batches store *active body indices* so the solver can walk
//! straight into the active arrays. Sleeping type batches store *body
//! handles*: indices go stale the moment the caller compacts the active
//! set, handles never do.

use crate::bodies::{Bodies, BodyConstraintReference};
use crate::handles::{ConstraintHandle, ConstraintLocation};
use crate::id_pool::IdPool;
use crate::index_set::IndexSet;

#[cfg(not(feature = "std"))]
use alloc::boxed::Box;
#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Message for lookups of handles that islands or callers must keep live.
const LIVE_HANDLE: &str = "constraint handle must refer to a live constraint";

// ============================================================================
// Type batches
// ============================================================================

/// All constraints of one type within a batch, stored as parallel rows.
#[derive(Clone, Debug, Default)]
pub struct TypeBatch {
    /// Type id shared by every row
    pub type_id: usize,
    /// Constraint handle per row
    pub handles: Vec<ConstraintHandle>,
    /// Flattened body references, `bodies_per_constraint` per row. Active
    /// sets store body indices; sleeping sets store body handle values.
    pub body_references: Vec<usize>,
    /// Flattened per-type payload, `payload_stride` floats per row
    pub payload: Vec<f32>,
}

impl TypeBatch {
    /// Create an empty type batch for `type_id`.
    #[must_use]
    pub fn new(type_id: usize) -> Self {
        Self {
            type_id,
            ..Self::default()
        }
    }

    /// Create a type batch pre-sized to `constraint_count` zeroed rows,
    /// ready to be filled by gather jobs.
    #[must_use]
    pub fn with_len(
        type_id: usize,
        constraint_count: usize,
        bodies_per_constraint: usize,
        payload_stride: usize,
    ) -> Self {
        Self {
            type_id,
            handles: vec![ConstraintHandle::default(); constraint_count],
            body_references: vec![0; constraint_count * bodies_per_constraint],
            payload: vec![0.0; constraint_count * payload_stride],
        }
    }

    /// Number of constraints in the batch.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether the batch holds no constraints.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Mutable view over a contiguous row range of a type batch. Gather jobs
/// receive disjoint ranges so whole-batch writes can proceed in parallel.
#[derive(Debug)]
pub struct TypeBatchRange<'a> {
    /// Handle slots for the range
    pub handles: &'a mut [ConstraintHandle],
    /// Body reference slots for the range
    pub body_references: &'a mut [usize],
    /// Payload slots for the range
    pub payload: &'a mut [f32],
}

// ============================================================================
// Batches and sets
// ============================================================================

/// A group of constraints sharing no bodies.
#[derive(Clone, Debug, Default)]
pub struct ConstraintBatch {
    /// Type batches of the batch, in first-seen type order
    pub type_batches: Vec<TypeBatch>,
    /// Active body indices referenced by this batch. Only maintained for the
    /// active set; sleeping batches leave it empty.
    pub referenced_bodies: IndexSet,
}

impl ConstraintBatch {
    /// Index of the type batch holding `type_id`, if present.
    #[must_use]
    pub fn type_batch_index(&self, type_id: usize) -> Option<usize> {
        self.type_batches.iter().position(|tb| tb.type_id == type_id)
    }

    fn get_or_create_type_batch(&mut self, type_id: usize) -> usize {
        match self.type_batch_index(type_id) {
            Some(index) => index,
            None => {
                self.type_batches.push(TypeBatch::new(type_id));
                self.type_batches.len() - 1
            }
        }
    }
}

/// All constraint storage of one set.
#[derive(Clone, Debug, Default)]
pub struct ConstraintSet {
    /// Batches of the set
    pub batches: Vec<ConstraintBatch>,
}

impl ConstraintSet {
    /// Total number of constraints across all batches.
    #[must_use]
    pub fn constraint_count(&self) -> usize {
        self.batches
            .iter()
            .flat_map(|batch| batch.type_batches.iter())
            .map(TypeBatch::len)
            .sum()
    }
}

// ============================================================================
// Type processors
// ============================================================================

/// Behavior attached to one concrete constraint type: row shape plus the
/// range-wise gather used when an island falls asleep.
pub trait TypeProcessor: Send + Sync {
    /// Type id this processor handles.
    fn type_id(&self) -> usize;

    /// Number of bodies per constraint of this type.
    fn bodies_per_constraint(&self) -> usize;

    /// Number of payload floats per constraint of this type.
    fn payload_stride(&self) -> usize;

    /// Copy the rows for `source_handles` out of the active set into a
    /// sleeping type batch range, converting body indices to handles. One
    /// call handles a whole gather-job range.
    fn gather_active_constraints(
        &self,
        bodies: &Bodies,
        solver: &Solver,
        source_handles: &[ConstraintHandle],
        target: &mut TypeBatchRange<'_>,
    ) {
        let bodies_per = self.bodies_per_constraint();
        let stride = self.payload_stride();
        let active = bodies.active_set();
        for (row, &handle) in source_handles.iter().enumerate() {
            let location = solver.constraint_location(handle).expect(LIVE_HANDLE);
            debug_assert_eq!(location.set_index, 0, "gather sources must be active");
            let source = &solver.sets[location.set_index].batches[location.batch_index]
                .type_batches[location.type_batch_index];
            debug_assert_eq!(source.type_id, self.type_id());

            target.handles[row] = handle;
            let source_base = location.index_in_type_batch * bodies_per;
            let target_base = row * bodies_per;
            for slot in 0..bodies_per {
                let body_index = source.body_references[source_base + slot];
                target.body_references[target_base + slot] =
                    active.index_to_handle[body_index].0;
            }
            let source_payload = location.index_in_type_batch * stride;
            let target_payload = row * stride;
            target.payload[target_payload..target_payload + stride]
                .copy_from_slice(&source.payload[source_payload..source_payload + stride]);
        }
    }
}

/// Two-body distance constraint. Payload rows: `[rest_length, compliance]`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DistanceTypeProcessor;

impl DistanceTypeProcessor {
    /// Registered type id.
    pub const TYPE_ID: usize = 0;
    /// Payload floats per row.
    pub const PAYLOAD_STRIDE: usize = 2;
}

impl TypeProcessor for DistanceTypeProcessor {
    fn type_id(&self) -> usize {
        Self::TYPE_ID
    }

    fn bodies_per_constraint(&self) -> usize {
        2
    }

    fn payload_stride(&self) -> usize {
        Self::PAYLOAD_STRIDE
    }
}

/// Two-body contact constraint. Payload rows:
/// `[normal_x, normal_y, normal_z, depth, friction]`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContactTypeProcessor;

impl ContactTypeProcessor {
    /// Registered type id.
    pub const TYPE_ID: usize = 1;
    /// Payload floats per row.
    pub const PAYLOAD_STRIDE: usize = 5;
}

impl TypeProcessor for ContactTypeProcessor {
    fn type_id(&self) -> usize {
        Self::TYPE_ID
    }

    fn bodies_per_constraint(&self) -> usize {
        2
    }

    fn payload_stride(&self) -> usize {
        Self::PAYLOAD_STRIDE
    }
}

// ============================================================================
// Solver
// ============================================================================

/// Owner of all constraint sets and the type processor registry.
pub struct Solver {
    /// Constraint sets; slot 0 is the active set
    pub sets: Vec<ConstraintSet>,
    /// Maps a handle's value to the constraint's current location
    pub handle_to_constraint: Vec<Option<ConstraintLocation>>,
    /// Pool from which constraint handles are claimed
    pub handle_pool: IdPool,
    type_processors: Vec<Option<Box<dyn TypeProcessor>>>,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver {
    /// Create a solver with the built-in distance and contact processors
    /// registered.
    #[must_use]
    pub fn new() -> Self {
        let mut solver = Self {
            sets: vec![ConstraintSet::default()],
            handle_to_constraint: Vec::new(),
            handle_pool: IdPool::new(),
            type_processors: Vec::new(),
        };
        solver.register_type_processor(Box::new(DistanceTypeProcessor));
        solver.register_type_processor(Box::new(ContactTypeProcessor));
        solver
    }

    /// Register a processor at its type id, replacing any previous one.
    pub fn register_type_processor(&mut self, processor: Box<dyn TypeProcessor>) {
        let type_id = processor.type_id();
        if type_id >= self.type_processors.len() {
            self.type_processors.resize_with(type_id + 1, || None);
        }
        self.type_processors[type_id] = Some(processor);
    }

    /// The processor registered for `type_id`.
    ///
    /// # Panics
    ///
    /// Panics if no processor is registered for the type.
    #[must_use]
    pub fn type_processor(&self, type_id: usize) -> &dyn TypeProcessor {
        self.type_processors
            .get(type_id)
            .and_then(Option::as_deref)
            .expect("no type processor registered for type id")
    }

    /// The active constraint set.
    #[inline]
    #[must_use]
    pub fn active_set(&self) -> &ConstraintSet {
        &self.sets[0]
    }

    /// Current location of the constraint with the given handle.
    #[inline]
    #[must_use]
    pub fn constraint_location(&self, handle: ConstraintHandle) -> Option<ConstraintLocation> {
        self.handle_to_constraint.get(handle.0).copied().flatten()
    }

    /// Type id of a live constraint.
    #[must_use]
    pub fn constraint_type_id(&self, handle: ConstraintHandle) -> usize {
        let location = self.constraint_location(handle).expect(LIVE_HANDLE);
        self.sets[location.set_index].batches[location.batch_index].type_batches
            [location.type_batch_index]
            .type_id
    }

    /// Add a constraint to the active set.
    ///
    /// `body_indices` are active body indices, one per body slot of the
    /// type; `payload` must match the type's stride. The constraint is also
    /// registered in each body's constraint list.
    pub fn add_constraint(
        &mut self,
        bodies: &mut Bodies,
        type_id: usize,
        body_indices: &[usize],
        payload: &[f32],
    ) -> ConstraintHandle {
        let processor = self.type_processor(type_id);
        assert_eq!(
            body_indices.len(),
            processor.bodies_per_constraint(),
            "body count does not match constraint type"
        );
        assert_eq!(
            payload.len(),
            processor.payload_stride(),
            "payload length does not match constraint type"
        );

        let handle = ConstraintHandle(self.handle_pool.take());
        let set = &mut self.sets[0];
        let batch_index = set
            .batches
            .iter()
            .position(|batch| {
                body_indices
                    .iter()
                    .all(|&body| !batch.referenced_bodies.contains(body))
            })
            .unwrap_or_else(|| {
                set.batches.push(ConstraintBatch::default());
                set.batches.len() - 1
            });
        let batch = &mut set.batches[batch_index];
        for &body in body_indices {
            batch.referenced_bodies.insert(body);
        }
        let type_batch_index = batch.get_or_create_type_batch(type_id);
        let type_batch = &mut batch.type_batches[type_batch_index];
        let row = type_batch.len();
        type_batch.handles.push(handle);
        type_batch.body_references.extend_from_slice(body_indices);
        type_batch.payload.extend_from_slice(payload);

        if handle.0 >= self.handle_to_constraint.len() {
            self.handle_to_constraint.resize(handle.0 + 1, None);
        }
        self.handle_to_constraint[handle.0] = Some(ConstraintLocation {
            set_index: 0,
            batch_index,
            type_batch_index,
            index_in_type_batch: row,
        });

        for (slot, &body) in body_indices.iter().enumerate() {
            bodies.active_set_mut().constraints[body].push(BodyConstraintReference {
                connecting_constraint_handle: handle,
                index_in_constraint: slot,
            });
        }
        handle
    }

    /// Invoke `visit` once per body connected by an active constraint, in
    /// body slot order. Yields active body indices.
    pub fn enumerate_connected_bodies(
        &self,
        handle: ConstraintHandle,
        mut visit: impl FnMut(usize),
    ) {
        let location = self.constraint_location(handle).expect(LIVE_HANDLE);
        debug_assert_eq!(location.set_index, 0, "enumeration targets the active set");
        let type_batch = &self.sets[location.set_index].batches[location.batch_index]
            .type_batches[location.type_batch_index];
        let bodies_per = self.type_processor(type_batch.type_id).bodies_per_constraint();
        let base = location.index_in_type_batch * bodies_per;
        for slot in 0..bodies_per {
            visit(type_batch.body_references[base + slot]);
        }
    }

    /// Rewrite one body slot of an active constraint after a body moved to a
    /// different active index.
    pub(crate) fn update_body_reference(
        &mut self,
        handle: ConstraintHandle,
        index_in_constraint: usize,
        new_body_index: usize,
    ) {
        let location = self.constraint_location(handle).expect(LIVE_HANDLE);
        debug_assert_eq!(location.set_index, 0);
        let type_id = self.sets[location.set_index].batches[location.batch_index].type_batches
            [location.type_batch_index]
            .type_id;
        let bodies_per = self.type_processor(type_id).bodies_per_constraint();
        let type_batch = &mut self.sets[location.set_index].batches[location.batch_index]
            .type_batches[location.type_batch_index];
        type_batch.body_references
            [location.index_in_type_batch * bodies_per + index_in_constraint] = new_body_index;
    }

    /// Grow the set array so it can hold at least `capacity` sets.
    pub fn ensure_sets_capacity(&mut self, capacity: usize) {
        if capacity > self.sets.len() {
            self.sets.resize_with(capacity, ConstraintSet::default);
        }
    }

    /// Resize the set array to exactly `capacity` slots (never below one).
    /// Vacated slots must be empty.
    pub fn resize_sets_capacity(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        debug_assert!(
            self.sets[capacity.min(self.sets.len())..]
                .iter()
                .all(|set| set.batches.is_empty()),
            "shrinking over allocated constraint sets"
        );
        self.sets.resize_with(capacity, ConstraintSet::default);
    }
}
