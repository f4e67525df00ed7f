//! Id Pool
//!
//! Monotonic integer id allocator with reuse. `take` prefers previously
//! returned ids, so id spaces stay dense even under churn. Used for body and
//! constraint handles and for sleeping set ids.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Allocates small integer ids, reusing returned ones before claiming new.
#[derive(Clone, Debug, Default)]
pub struct IdPool {
    next_id: usize,
    free_ids: Vec<usize>,
}

impl IdPool {
    /// Create an empty pool.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_id: 0,
            free_ids: Vec::new(),
        }
    }

    /// Claim an id. Returned ids are reused in LIFO order before the
    /// monotonic counter advances.
    pub fn take(&mut self) -> usize {
        if let Some(id) = self.free_ids.pop() {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Return an id to the pool for later reuse.
    ///
    /// The id must have been previously claimed and not already returned.
    pub fn return_id(&mut self, id: usize) {
        debug_assert!(id < self.next_id, "returned id was never claimed");
        debug_assert!(
            !self.free_ids.contains(&id),
            "id returned twice: {id}"
        );
        self.free_ids.push(id);
    }

    /// Highest id that may currently be claimed, or `None` if nothing was
    /// ever taken. Use this to size arrays indexed by id.
    #[inline]
    #[must_use]
    pub fn highest_possibly_claimed_id(&self) -> Option<usize> {
        self.next_id.checked_sub(1)
    }

    /// Number of ids sitting in the free list.
    #[inline]
    #[must_use]
    pub fn available_id_count(&self) -> usize {
        self.free_ids.len()
    }

    /// Forget all claims and returns.
    pub fn clear(&mut self) {
        self.next_id = 0;
        self.free_ids.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_is_monotonic_without_returns() {
        let mut pool = IdPool::new();
        assert_eq!(pool.take(), 0);
        assert_eq!(pool.take(), 1);
        assert_eq!(pool.take(), 2);
        assert_eq!(pool.highest_possibly_claimed_id(), Some(2));
    }

    #[test]
    fn test_take_prefers_free_list() {
        let mut pool = IdPool::new();
        let a = pool.take();
        let b = pool.take();
        assert_eq!((a, b), (0, 1));
        pool.return_id(a);
        assert_eq!(pool.take(), a, "returned id should be reused");
        assert_eq!(pool.take(), 2, "then the counter advances");
    }

    #[test]
    fn test_highest_claim_survives_return() {
        let mut pool = IdPool::new();
        pool.take();
        pool.take();
        pool.return_id(1);
        // 1 is free but may be claimed again; arrays must still cover it.
        assert_eq!(pool.highest_possibly_claimed_id(), Some(1));
    }

    #[test]
    fn test_empty_pool_has_no_claims() {
        let pool = IdPool::new();
        assert_eq!(pool.highest_possibly_claimed_id(), None);
        assert_eq!(pool.available_id_count(), 0);
    }

    #[test]
    fn test_clear_resets_counter() {
        let mut pool = IdPool::new();
        pool.take();
        pool.take();
        pool.return_id(0);
        pool.clear();
        assert_eq!(pool.take(), 0);
    }
}
