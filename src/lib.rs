//! SOMA-Physics: Island Sleeping and Convex Geometry for Rigid-Body Simulation
//!
//! The two subsystems a rigid-body engine leans on hardest outside its
//! solve loop: incremental detection and migration of sleep-ready islands,
//! and convex hull construction for static collision geometry.
//!
//! # Features
//!
//! - **Island sleeper**: parallel constraint-graph traversal with rotating
//!   seed schedules, per-worker quotas, duplicate-island reconciliation,
//!   and chunked parallel gather into numbered sleeping sets
//! - **Deterministic mode**: seed selection keyed on stable body handles,
//!   so identical simulations sleep identical islands
//! - **Convex hull builder**: vectorized gift-wrapping over edges with 2D
//!   face reduction, coplanar face merging, and dense vertex remapping
//! - **Runtime hull shape**: wide-bundled points with per-face bounding
//!   planes, ready for support-function queries
//! - **`no_std` data model**: body/constraint storage and the utility
//!   types build without `std` (the sleeper and hull pipeline need `std`)
//!
//! # Example
//!
//! ```rust
//! use soma_physics::{
//!     Bodies, BodyActivity, BodyDescription, DistanceTypeProcessor, IslandSleeper,
//!     SequentialDispatcher, Solver,
//! };
//!
//! let mut bodies = Bodies::new();
//! let mut solver = Solver::new();
//! for _ in 0..2 {
//!     bodies.add_body(&BodyDescription {
//!         activity: BodyActivity::candidate(),
//!         ..Default::default()
//!     });
//! }
//! solver.add_constraint(
//!     &mut bodies,
//!     DistanceTypeProcessor::TYPE_ID,
//!     &[0, 1],
//!     &[1.0, 0.0],
//! );
//!
//! let mut sleeper = IslandSleeper::new();
//! sleeper.tested_fraction_per_frame = 1.0;
//! sleeper.target_slept_fraction = 1.0;
//! sleeper.target_traversed_fraction = 1.0;
//! let slept = sleeper.update(&mut bodies, &mut solver, &SequentialDispatcher::new(1), false);
//! assert_eq!(slept.len(), 1);
//! assert_eq!(slept[0].body_indices, vec![0, 1]);
//! ```
//!
//! # Modules
//!
//! - [`bodies`]: body storage partitioned into active and sleeping sets
//! - [`solver`]: batched constraint storage and type processors
//! - [`islands`]: pre-gather island scaffolds
//! - [`sleeping`]: the island sleeper
//! - [`dispatcher`]: worker fan-out (sequential and rayon-backed)
//! - [`convex_hull_builder`]: point cloud to indexed face-vertex hull
//! - [`convex_hull`]: runtime hull shape with bounding planes
//! - [`math`]: wide f32 bundles and basis helpers
//! - [`index_set`], [`id_pool`], [`handles`]: the small load-bearing tools
//! - [`rng`]: deterministic PCG generator for tests and benches
//!
//! # Determinism
//!
//! With `deterministic = true` and a single worker, the sleeper's output is
//! a pure function of body handles, activity flags, and graph topology:
//! seeds are remapped through a handle-sorted permutation, so the result
//! does not depend on where bodies happen to sit in memory. Multi-worker
//! runs keep correctness (disjoint, candidate-closed islands) but not
//! bit-for-bit reproducibility.

#![warn(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod bodies;
#[cfg(feature = "std")]
pub mod convex_hull;
#[cfg(feature = "std")]
pub mod convex_hull_builder;
#[cfg(feature = "std")]
pub mod dispatcher;
pub mod error;
pub mod handles;
pub mod id_pool;
pub mod index_set;
pub mod islands;
pub mod math;
pub mod rng;
#[cfg(feature = "std")]
pub mod sleeping;
pub mod solver;

// Re-export commonly used types
pub use bodies::{
    Bodies, BodyActivity, BodyConstraintReference, BodyDescription, BodyInertia, BodySet,
    BodyVelocity, Collidable, RigidPose,
};
#[cfg(feature = "std")]
pub use convex_hull::{process_hull, BundleVertexIndex, ConvexHull, HullBoundingPlane};
#[cfg(feature = "std")]
pub use convex_hull_builder::{compute_hull, EdgeEndpoints, HullData};
#[cfg(feature = "parallel")]
pub use dispatcher::RayonDispatcher;
#[cfg(feature = "std")]
pub use dispatcher::{SequentialDispatcher, ThreadDispatcher};
pub use error::PhysicsError;
pub use handles::{BodyHandle, BodyLocation, ConstraintHandle, ConstraintLocation};
pub use id_pool::IdPool;
pub use index_set::IndexSet;
pub use islands::{IslandScaffold, IslandScaffoldBatch, IslandScaffoldTypeBatch};
pub use math::{bundle_count, bundle_indices, simd_width, Vec3Wide, SIMD_WIDTH};
pub use rng::DeterministicRng;
#[cfg(feature = "std")]
pub use sleeping::{IslandSleeper, SleepStats, SleptIsland};
pub use solver::{
    ConstraintBatch, ConstraintSet, ContactTypeProcessor, DistanceTypeProcessor, Solver,
    TypeBatch, TypeBatchRange, TypeProcessor,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bodies::{
        Bodies, BodyActivity, BodyConstraintReference, BodyDescription, BodyInertia, BodySet,
        BodyVelocity, Collidable, RigidPose,
    };
    #[cfg(feature = "std")]
    pub use crate::convex_hull::{process_hull, BundleVertexIndex, ConvexHull, HullBoundingPlane};
    #[cfg(feature = "std")]
    pub use crate::convex_hull_builder::{compute_hull, EdgeEndpoints, HullData};
    #[cfg(feature = "parallel")]
    pub use crate::dispatcher::RayonDispatcher;
    #[cfg(feature = "std")]
    pub use crate::dispatcher::{SequentialDispatcher, ThreadDispatcher};
    pub use crate::error::PhysicsError;
    pub use crate::handles::{BodyHandle, BodyLocation, ConstraintHandle, ConstraintLocation};
    pub use crate::id_pool::IdPool;
    pub use crate::index_set::IndexSet;
    pub use crate::islands::{IslandScaffold, IslandScaffoldBatch, IslandScaffoldTypeBatch};
    pub use crate::math::{bundle_count, bundle_indices, simd_width, Vec3Wide, SIMD_WIDTH};
    pub use crate::rng::DeterministicRng;
    #[cfg(feature = "std")]
    pub use crate::sleeping::{IslandSleeper, SleepStats, SleptIsland};
    pub use crate::solver::{
        ConstraintBatch, ConstraintSet, ContactTypeProcessor, DistanceTypeProcessor, Solver,
        TypeBatch, TypeBatchRange, TypeProcessor,
    };
}
