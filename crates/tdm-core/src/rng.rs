//! Deterministic random streams keyed by entity and decision point.
//!
//! # Determinism strategy
//!
//! Every stochastic decision draws from a `RandomStream` seeded by:
//!
//!   mix(s, k) = splitmix_finalize(s XOR (k + 1) * MIXING_CONSTANT)
//!   seed      = mix(mix(global_seed, entity), offset)
//!
//! The mixing constant is the 64-bit fractional part of the golden ratio and
//! the finalizer is the SplitMix64 output function, so consecutive entity ids
//! and offsets land far apart in seed space.  Consequences:
//!
//! - Requesting the same `(entity, offset)` twice yields the same sequence,
//!   which is what makes estimation replays reproducible.
//! - Results never depend on which worker processed an entity or in what
//!   order, so parallel runs match sequential ones bit for bit.
//! - Streams are never shared; no synchronisation is needed.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::EntityId;

/// 64-bit fractional golden-ratio constant for seed mixing.
const MIXING_CONSTANT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Values below this are rejected by the ratio-of-uniforms normal sampler.
const TINY: f64 = 1e-12;

#[inline]
fn finalize(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[inline]
fn mix(seed: u64, key: u64) -> u64 {
    finalize(seed ^ key.wrapping_add(1).wrapping_mul(MIXING_CONSTANT))
}

// ── RandomStream ──────────────────────────────────────────────────────────────

/// Per-decision deterministic RNG.
///
/// Cheap to construct; callers build one at the point of use rather than
/// storing it.
pub struct RandomStream {
    seed: u64,
    rng:  SmallRng,
}

impl RandomStream {
    /// Seed from the run's global seed, the deciding entity and the decision
    /// point offset.
    pub fn new(global_seed: u64, entity: EntityId, offset: u32) -> Self {
        let seed = mix(mix(global_seed, entity.0 as u64), offset as u64);
        Self::from_seed(seed)
    }

    /// Seed directly, e.g. from one of [`seed_values`][Self::seed_values].
    pub fn from_seed(seed: u64) -> Self {
        Self { seed, rng: SmallRng::seed_from_u64(seed) }
    }

    /// The seed this stream was created from.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Derive an independent stream from this stream's *seed* (not its
    /// current position), so `substream(i)` is stable however many draws
    /// have already been taken.
    pub fn substream(&self, index: u64) -> RandomStream {
        RandomStream::from_seed(mix(self.seed, index))
    }

    /// Expose the inner `SmallRng` for use with `rand` distribution types.
    #[inline]
    pub fn inner(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    /// Uniform draw in the open interval (0, 1).
    #[inline]
    pub fn uniform01(&mut self) -> f64 {
        loop {
            let u: f64 = self.rng.r#gen();
            if u > 0.0 {
                return u;
            }
        }
    }

    /// Generate a value uniformly in `range`.
    #[inline]
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.rng.gen_range(range)
    }

    /// `n` seeds for per-draw streams.  The sampler seeds draw `i` from
    /// `seed_values(n)[i]` so one rejected draw never shifts the others.
    pub fn seed_values(&mut self, n: usize) -> Vec<u64> {
        (0..n).map(|_| self.rng.r#gen::<u64>()).collect()
    }

    /// Normal variate (Kinderman–Monahan ratio of uniforms with quadratic
    /// bounding curves).
    pub fn normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        const S: f64 = 0.449_871;
        const T: f64 = -0.386_595;
        const A: f64 = 0.196_00;
        const B: f64 = 0.254_72;
        const R1: f64 = 0.275_97;
        const R2: f64 = 0.278_46;
        const V_MULT: f64 = 1.7156;

        loop {
            let mut u = self.uniform01();
            while u < TINY {
                u = self.uniform01();
            }
            let v = V_MULT * (self.uniform01() - 0.5);

            let x = u - S;
            let y = v.abs() - T;
            let q = x * x + y * (A * y - B * x);

            if q < R1 || (q <= R2 && v * v < -4.0 * u.ln() * u * u) {
                return mean + std_dev * (v / u);
            }
        }
    }

    /// Log-normal variate parameterised by the mean and standard deviation
    /// of the resulting distribution.  Returns `0.0` when either is not
    /// strictly positive.
    pub fn log_normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        if mean <= TINY || std_dev <= TINY {
            log::warn!("log_normal called with mean {mean} and std_dev {std_dev}; returning 0");
            return 0.0;
        }
        let c_sqr = (std_dev / mean).powi(2);
        let m = mean.ln() - 0.5 * (c_sqr + 1.0).ln();
        let s = (c_sqr + 1.0).ln().sqrt();
        self.normal(m, s).exp()
    }
}
