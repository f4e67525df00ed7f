//! Island Scaffolds
//!
//! A traversal that succeeds hands back its bodies in discovery order and a
//! flat list of constraint handles. Before anything can be gathered into a
//! sleeping set, those constraints must be arranged into the batch shape the
//! solver stores: batches in which no two constraints share a body, each
//! split into per-type batches. The *scaffold* is that arrangement, still
//! expressed in handles — the pre-gather skeleton of the sleeping
//! constraint set.

use crate::handles::ConstraintHandle;
use crate::index_set::IndexSet;
use crate::solver::Solver;

#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Ordered constraint handles of one type within a scaffold batch.
#[derive(Clone, Debug)]
pub struct IslandScaffoldTypeBatch {
    /// Constraint type id
    pub type_id: usize,
    /// Handles in traversal order
    pub handles: Vec<ConstraintHandle>,
}

/// One scaffold batch: constraints that share no bodies.
#[derive(Clone, Debug, Default)]
pub struct IslandScaffoldBatch {
    /// Type batches in first-seen type order
    pub type_batches: Vec<IslandScaffoldTypeBatch>,
    referenced_bodies: IndexSet,
}

impl IslandScaffoldBatch {
    fn accepts(&self, connected_bodies: &[usize]) -> bool {
        connected_bodies
            .iter()
            .all(|&body| !self.referenced_bodies.contains(body))
    }

    fn add(&mut self, type_id: usize, handle: ConstraintHandle, connected_bodies: &[usize]) {
        for &body in connected_bodies {
            self.referenced_bodies.insert(body);
        }
        match self
            .type_batches
            .iter()
            .position(|type_batch| type_batch.type_id == type_id)
        {
            Some(index) => self.type_batches[index].handles.push(handle),
            None => self.type_batches.push(IslandScaffoldTypeBatch {
                type_id,
                handles: vec![handle],
            }),
        }
    }
}

/// Pre-gather shape of a sleeping island's constraint set.
#[derive(Clone, Debug, Default)]
pub struct IslandScaffold {
    /// Batches in assignment order
    pub batches: Vec<IslandScaffoldBatch>,
}

impl IslandScaffold {
    /// Arrange a traversal's constraint handles into batches. Each
    /// constraint goes to the first batch referencing none of its bodies,
    /// preserving traversal order within every type batch.
    #[must_use]
    pub fn new(constraint_handles: &[ConstraintHandle], solver: &Solver) -> Self {
        let mut scaffold = Self::default();
        let mut connected = Vec::new();
        for &handle in constraint_handles {
            connected.clear();
            solver.enumerate_connected_bodies(handle, |body| connected.push(body));
            let type_id = solver.constraint_type_id(handle);

            let batch_index = scaffold
                .batches
                .iter()
                .position(|batch| batch.accepts(&connected))
                .unwrap_or_else(|| {
                    scaffold.batches.push(IslandScaffoldBatch::default());
                    scaffold.batches.len() - 1
                });
            scaffold.batches[batch_index].add(type_id, handle, &connected);
        }
        scaffold
    }

    /// Total number of constraints in the scaffold.
    #[must_use]
    pub fn constraint_count(&self) -> usize {
        self.batches
            .iter()
            .flat_map(|batch| batch.type_batches.iter())
            .map(|type_batch| type_batch.handles.len())
            .sum()
    }
}
