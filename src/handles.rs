//! Body and Constraint Handles
//!
//! Stable identifiers for bodies and constraints, independent of where the
//! referenced object currently lives in memory. A *handle* never changes for
//! the lifetime of the object; an *index* is its current position within a
//! set and moves as sets are compacted or islands fall asleep.

use core::fmt;

/// Stable identifier of a body, valid until the body is removed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub usize);

/// Stable identifier of a constraint, valid until the constraint is removed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintHandle(pub usize);

impl fmt::Display for BodyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "body#{}", self.0)
    }
}

impl fmt::Display for ConstraintHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "constraint#{}", self.0)
    }
}

/// Location of a body in memory: which set owns it, and where inside that set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BodyLocation {
    /// Index of the set owning the body. 0 is the active set; higher indices
    /// are sleeping islands.
    pub set_index: usize,
    /// Index of the body within its owning set.
    pub index: usize,
}

impl BodyLocation {
    /// Whether the body currently lives in the active set.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.set_index == 0
    }
}

/// Location of a constraint in memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConstraintLocation {
    /// Index of the constraint set owning the constraint. 0 is the active set.
    pub set_index: usize,
    /// Index of the batch within the set.
    pub batch_index: usize,
    /// Index of the type batch within the batch.
    pub type_batch_index: usize,
    /// Row of the constraint within the type batch.
    pub index_in_type_batch: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_ordering_follows_value() {
        assert!(BodyHandle(1) < BodyHandle(2));
        assert!(ConstraintHandle(0) < ConstraintHandle(10));
    }

    #[test]
    fn test_body_location_active() {
        let active = BodyLocation {
            set_index: 0,
            index: 4,
        };
        let sleeping = BodyLocation {
            set_index: 3,
            index: 0,
        };
        assert!(active.is_active());
        assert!(!sleeping.is_active());
    }
}
