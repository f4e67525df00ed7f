//! Deterministic Random Number Generator
//!
//! PCG-XSH-RR generator with float and vector output helpers. Produces
//! identical sequences on all platforms given the same seed, which keeps
//! randomized tests, benches and fuzz corpora reproducible.
//!
//! # Example
//!
//! ```
//! use soma_physics::rng::DeterministicRng;
//!
//! let mut rng = DeterministicRng::new(42);
//! let val = rng.next_f32(); // [0, 1), same on every platform
//! assert!(val >= 0.0 && val < 1.0);
//! ```

#[cfg(feature = "std")]
use glam::{Quat, Vec3};

/// Deterministic RNG using PCG-XSH-RR (32-bit output).
#[derive(Clone, Debug)]
pub struct DeterministicRng {
    state: u64,
    inc: u64,
}

impl DeterministicRng {
    /// PCG multiplier
    const MULTIPLIER: u64 = 6364136223846793005;

    /// Create RNG with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::new_with_stream(seed, seed)
    }

    /// Create RNG with seed and stream; distinct streams never collide.
    #[must_use]
    pub fn new_with_stream(seed: u64, stream: u64) -> Self {
        let mut rng = Self {
            state: 0,
            inc: (stream << 1) | 1, // Must be odd
        };
        rng.next_u32();
        rng.state = rng.state.wrapping_add(seed);
        rng.next_u32();
        rng
    }

    /// Generate the next u32 value.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        let old_state = self.state;
        self.state = old_state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(self.inc);
        // XSH-RR output function
        let xorshifted = (((old_state >> 18) ^ old_state) >> 27) as u32;
        let rot = (old_state >> 59) as u32;
        xorshifted.rotate_right(rot)
    }

    /// Generate a value in `[0, max)`.
    #[inline]
    pub fn next_bounded(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        // Rejection sampling for uniform distribution
        let threshold = max.wrapping_neg() % max;
        loop {
            let r = self.next_u32();
            if r >= threshold {
                return r % max;
            }
        }
    }

    /// Generate an f32 in `[0, 1)` with 24 bits of precision.
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 * (1.0 / (1u32 << 24) as f32)
    }

    /// Generate an f32 in `[lo, hi)`.
    #[inline]
    pub fn next_f32_range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.next_f32()
    }

    /// Generate a point uniformly inside the axis-aligned cube
    /// `[-half_extent, half_extent)^3`.
    #[cfg(feature = "std")]
    pub fn next_point_in_cube(&mut self, half_extent: f32) -> Vec3 {
        Vec3::new(
            self.next_f32_range(-half_extent, half_extent),
            self.next_f32_range(-half_extent, half_extent),
            self.next_f32_range(-half_extent, half_extent),
        )
    }

    /// Generate a random unit direction (Marsaglia's method).
    #[cfg(feature = "std")]
    pub fn next_direction(&mut self) -> Vec3 {
        for _ in 0..64 {
            let u = self.next_f32_range(-1.0, 1.0);
            let v = self.next_f32_range(-1.0, 1.0);
            let s = u * u + v * v;
            if s >= 1.0 || s == 0.0 {
                continue;
            }
            let factor = (1.0 - s).sqrt();
            return Vec3::new(2.0 * u * factor, 2.0 * v * factor, 1.0 - 2.0 * s);
        }
        Vec3::Y
    }

    /// Generate a uniformly random rotation.
    #[cfg(feature = "std")]
    pub fn next_rotation(&mut self) -> Quat {
        let axis = self.next_direction();
        let angle = self.next_f32_range(0.0, core::f32::consts::TAU);
        Quat::from_axis_angle(axis, angle)
    }
}
