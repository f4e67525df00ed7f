//! Body Storage
//!
//! Bodies live in numbered *sets*: set 0 is the active set containing
//! everything currently simulated, sets 1.. hold sleeping islands. Each set
//! stores its bodies in parallel arrays indexed by the body's position in
//! the set; the stable [`BodyHandle`] maps to a `(set, index)` location that
//! is updated whenever a body moves between sets or slots.
//!
//! The sleeper reads the active set and writes freshly allocated sleeping
//! sets; it never mutates active-set storage. Removal of slept bodies from
//! the active set is the caller's job.

use glam::{Mat3, Quat, Vec3};

use crate::handles::{BodyHandle, BodyLocation, ConstraintHandle};
use crate::id_pool::IdPool;
use crate::solver::Solver;

#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Message for the structural invariant that slot 0 always holds the active set.
const ACTIVE_SET_PRESENT: &str = "set 0 is always allocated";

// ============================================================================
// Per-body state
// ============================================================================

/// Position and orientation of a body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RigidPose {
    /// World-space position of the center of mass
    pub position: Vec3,
    /// World-space orientation
    pub orientation: Quat,
}

impl Default for RigidPose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
        }
    }
}

impl RigidPose {
    /// Pose at `position` with identity orientation.
    #[must_use]
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            orientation: Quat::IDENTITY,
        }
    }
}

/// Linear and angular velocity of a body.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BodyVelocity {
    /// Linear velocity
    pub linear: Vec3,
    /// Angular velocity
    pub angular: Vec3,
}

/// Inverse inertia of a body in local space. Zero inverse mass means the
/// body is kinematic or static.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BodyInertia {
    /// Inverse inertia tensor
    pub inverse_inertia_tensor: Mat3,
    /// Inverse mass
    pub inverse_mass: f32,
}

impl BodyInertia {
    /// Inertia of a solid unit-radius sphere of the given mass.
    #[must_use]
    pub fn sphere(mass: f32) -> Self {
        if mass <= 0.0 {
            return Self::default();
        }
        let inverse_mass = 1.0 / mass;
        let inverse_inertia = 1.0 / (0.4 * mass);
        Self {
            inverse_inertia_tensor: Mat3::from_diagonal(Vec3::splat(inverse_inertia)),
            inverse_mass,
        }
    }
}

/// Sleep bookkeeping for a body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyActivity {
    /// Squared velocity magnitude below which the body counts as resting
    pub sleep_threshold: f32,
    /// Timesteps the body must rest before it becomes a sleep candidate
    pub minimum_timesteps_under_threshold: u8,
    /// Whether the body may currently be included in a sleeping island
    pub sleep_candidate: bool,
    /// Consecutive timesteps spent under the threshold so far
    pub timesteps_under_threshold: u8,
}

impl Default for BodyActivity {
    fn default() -> Self {
        Self {
            sleep_threshold: 0.01,
            minimum_timesteps_under_threshold: 32,
            sleep_candidate: false,
            timesteps_under_threshold: 0,
        }
    }
}

impl BodyActivity {
    /// Activity state that immediately allows sleeping.
    #[must_use]
    pub fn candidate() -> Self {
        Self {
            sleep_candidate: true,
            ..Self::default()
        }
    }
}

/// Broad-phase entry of a body.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Collidable {
    /// Index of the body's shape in the external shape registry, if any
    pub shape_index: Option<usize>,
    /// Margin used for speculative contact generation
    pub speculative_margin: f32,
}

/// One entry of a body's constraint list: the constraint attached to the
/// body and which of the constraint's body slots the body occupies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BodyConstraintReference {
    /// Handle of the attached constraint
    pub connecting_constraint_handle: ConstraintHandle,
    /// The body's slot within that constraint
    pub index_in_constraint: usize,
}

/// Everything needed to add a body.
#[derive(Clone, Copy, Debug, Default)]
pub struct BodyDescription {
    /// Initial pose
    pub pose: RigidPose,
    /// Initial velocity
    pub velocity: BodyVelocity,
    /// Local inertia
    pub local_inertia: BodyInertia,
    /// Broad-phase state
    pub collidable: Collidable,
    /// Sleep bookkeeping
    pub activity: BodyActivity,
}

// ============================================================================
// BodySet
// ============================================================================

/// Parallel-array storage for the bodies of one set.
#[derive(Clone, Debug, Default)]
pub struct BodySet {
    /// Handle of the body at each index
    pub index_to_handle: Vec<BodyHandle>,
    /// Sleep bookkeeping per body
    pub activity: Vec<BodyActivity>,
    /// Broad-phase state per body
    pub collidables: Vec<Collidable>,
    /// Ordered constraint list per body
    pub constraints: Vec<Vec<BodyConstraintReference>>,
    /// Local inertia per body
    pub local_inertias: Vec<BodyInertia>,
    /// Pose per body
    pub poses: Vec<RigidPose>,
    /// Velocity per body
    pub velocities: Vec<BodyVelocity>,
}

impl BodySet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set pre-sized to `count` default-valued slots, ready to be
    /// filled by gather jobs.
    #[must_use]
    pub fn with_len(count: usize) -> Self {
        Self {
            index_to_handle: vec![BodyHandle::default(); count],
            activity: vec![BodyActivity::default(); count],
            collidables: vec![Collidable::default(); count],
            constraints: vec![Vec::new(); count],
            local_inertias: vec![BodyInertia::default(); count],
            poses: vec![RigidPose::default(); count],
            velocities: vec![BodyVelocity::default(); count],
        }
    }

    /// Number of bodies in the set.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.index_to_handle.len()
    }

    /// Whether the set holds no bodies.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index_to_handle.is_empty()
    }

    fn push(&mut self, handle: BodyHandle, description: &BodyDescription) {
        self.index_to_handle.push(handle);
        self.activity.push(description.activity);
        self.collidables.push(description.collidable);
        self.constraints.push(Vec::new());
        self.local_inertias.push(description.local_inertia);
        self.poses.push(description.pose);
        self.velocities.push(description.velocity);
    }
}

// ============================================================================
// Bodies
// ============================================================================

/// Collection of all allocated bodies, partitioned into sets.
#[derive(Debug)]
pub struct Bodies {
    /// The sets. Slot 0 is the active set and is always present; higher
    /// slots hold sleeping islands and may be vacant.
    pub sets: Vec<Option<BodySet>>,
    /// Maps a handle's value to the body's current location.
    pub handle_to_location: Vec<Option<BodyLocation>>,
    /// Pool from which body handles are claimed.
    pub handle_pool: IdPool,
}

impl Default for Bodies {
    fn default() -> Self {
        Self::new()
    }
}

impl Bodies {
    /// Create an empty collection with an allocated active set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sets: vec![Some(BodySet::new())],
            handle_to_location: Vec::new(),
            handle_pool: IdPool::new(),
        }
    }

    /// The active set.
    #[inline]
    #[must_use]
    pub fn active_set(&self) -> &BodySet {
        self.sets[0].as_ref().expect(ACTIVE_SET_PRESENT)
    }

    /// The active set, mutably.
    #[inline]
    pub fn active_set_mut(&mut self) -> &mut BodySet {
        self.sets[0].as_mut().expect(ACTIVE_SET_PRESENT)
    }

    /// The set with the given index, if allocated.
    #[inline]
    #[must_use]
    pub fn set(&self, set_index: usize) -> Option<&BodySet> {
        self.sets.get(set_index).and_then(Option::as_ref)
    }

    /// Current location of the body with the given handle.
    #[inline]
    #[must_use]
    pub fn location(&self, handle: BodyHandle) -> Option<BodyLocation> {
        self.handle_to_location.get(handle.0).copied().flatten()
    }

    /// Add a body to the active set, returning its handle.
    pub fn add_body(&mut self, description: &BodyDescription) -> BodyHandle {
        let handle = BodyHandle(self.handle_pool.take());
        let active = self.sets[0].as_mut().expect(ACTIVE_SET_PRESENT);
        let index = active.count();
        active.push(handle, description);
        if handle.0 >= self.handle_to_location.len() {
            self.handle_to_location.resize(handle.0 + 1, None);
        }
        self.handle_to_location[handle.0] = Some(BodyLocation {
            set_index: 0,
            index,
        });
        handle
    }

    /// Grow the set array so it can hold at least `capacity` sets.
    pub fn ensure_sets_capacity(&mut self, capacity: usize) {
        if capacity > self.sets.len() {
            self.sets.resize_with(capacity, || None);
        }
    }

    /// Resize the set array to exactly `capacity` slots (never below one,
    /// since the active set must survive). Vacated slots must be empty.
    pub fn resize_sets_capacity(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        debug_assert!(
            self.sets[capacity.min(self.sets.len())..]
                .iter()
                .all(Option::is_none),
            "shrinking over allocated sets"
        );
        self.sets.resize_with(capacity, || None);
    }

    /// Swap the storage slots of two active bodies, repairing the handle map
    /// and the solver's stored body references. Constraint lists move with
    /// their bodies.
    pub fn swap_active_bodies(&mut self, solver: &mut Solver, a: usize, b: usize) {
        if a == b {
            return;
        }
        let active = self.sets[0].as_mut().expect(ACTIVE_SET_PRESENT);
        assert!(
            a < active.count() && b < active.count(),
            "swap indices out of range"
        );
        active.index_to_handle.swap(a, b);
        active.activity.swap(a, b);
        active.collidables.swap(a, b);
        active.constraints.swap(a, b);
        active.local_inertias.swap(a, b);
        active.poses.swap(a, b);
        active.velocities.swap(a, b);

        for index in [a, b] {
            let handle = active.index_to_handle[index];
            self.handle_to_location[handle.0] = Some(BodyLocation {
                set_index: 0,
                index,
            });
            for reference in &active.constraints[index] {
                solver.update_body_reference(
                    reference.connecting_constraint_handle,
                    reference.index_in_constraint,
                    index,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_body_assigns_location() {
        let mut bodies = Bodies::new();
        let a = bodies.add_body(&BodyDescription::default());
        let b = bodies.add_body(&BodyDescription {
            pose: RigidPose::at(Vec3::new(1.0, 0.0, 0.0)),
            ..Default::default()
        });
        assert_eq!(bodies.active_set().count(), 2);
        assert_eq!(
            bodies.location(a),
            Some(BodyLocation {
                set_index: 0,
                index: 0
            })
        );
        assert_eq!(
            bodies.location(b),
            Some(BodyLocation {
                set_index: 0,
                index: 1
            })
        );
    }

    #[test]
    fn test_ensure_sets_capacity_grows_only() {
        let mut bodies = Bodies::new();
        bodies.ensure_sets_capacity(4);
        assert_eq!(bodies.sets.len(), 4);
        bodies.ensure_sets_capacity(2);
        assert_eq!(bodies.sets.len(), 4);
        assert!(bodies.set(3).is_none());
    }

    #[test]
    fn test_resize_preserves_active_set() {
        let mut bodies = Bodies::new();
        bodies.add_body(&BodyDescription::default());
        bodies.ensure_sets_capacity(8);
        bodies.resize_sets_capacity(0);
        assert_eq!(bodies.sets.len(), 1);
        assert_eq!(bodies.active_set().count(), 1);
    }

    #[test]
    fn test_swap_active_bodies_repoints_handles() {
        let mut bodies = Bodies::new();
        let mut solver = Solver::new();
        let a = bodies.add_body(&BodyDescription::default());
        let b = bodies.add_body(&BodyDescription::default());

        bodies.swap_active_bodies(&mut solver, 0, 1);

        assert_eq!(bodies.active_set().index_to_handle[0], b);
        assert_eq!(bodies.active_set().index_to_handle[1], a);
        assert_eq!(bodies.location(a).map(|l| l.index), Some(1));
        assert_eq!(bodies.location(b).map(|l| l.index), Some(0));
    }

    #[test]
    fn test_swap_updates_solver_references() {
        let mut bodies = Bodies::new();
        let mut solver = Solver::new();
        bodies.add_body(&BodyDescription::default());
        bodies.add_body(&BodyDescription::default());
        bodies.add_body(&BodyDescription::default());
        let handle = solver.add_constraint(
            &mut bodies,
            crate::solver::DistanceTypeProcessor::TYPE_ID,
            &[0, 2],
            &[1.0, 0.0],
        );

        bodies.swap_active_bodies(&mut solver, 0, 1);

        let mut connected = Vec::new();
        solver.enumerate_connected_bodies(handle, |index| connected.push(index));
        assert_eq!(connected, vec![1, 2]);
    }

    #[test]
    fn test_with_len_is_default_filled() {
        let set = BodySet::with_len(3);
        assert_eq!(set.count(), 3);
        assert_eq!(set.poses[2], RigidPose::default());
        assert!(set.constraints[1].is_empty());
    }
}
