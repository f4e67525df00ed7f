//! Physics Error Types
//!
//! Unified error type for the SOMA-Physics crate. Functions that can fail
//! (body lookup, dispatcher construction, hull shape processing) return
//! `Result<T, PhysicsError>` instead of raw booleans or panicking.
//! Internal contract violations are asserted, not reported.

use core::fmt;

/// Unified error type for physics operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PhysicsError {
    /// Body index is out of range for the set it was looked up in.
    InvalidBodyIndex {
        /// The invalid index that was provided
        index: usize,
        /// Current number of bodies in the set
        count: usize,
    },
    /// Invalid configuration parameter.
    InvalidConfiguration {
        /// Description of the invalid configuration
        reason: &'static str,
    },
    /// Geometry too degenerate to process (no faces, zero-length normal).
    DegenerateGeometry {
        /// Context describing where the degeneracy was encountered
        context: &'static str,
    },
}

impl fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBodyIndex { index, count } => {
                write!(f, "body index {index} out of range (count={count})")
            }
            Self::InvalidConfiguration { reason } => {
                write!(f, "invalid configuration: {reason}")
            }
            Self::DegenerateGeometry { context } => {
                write!(f, "degenerate geometry in {context}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PhysicsError {}

// ============================================================================
// Tests
// ============================================================================
