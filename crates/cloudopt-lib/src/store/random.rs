//! Utilization sources for the busy transition

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

/// Default lower bound of a busy utilization draw
pub const DEFAULT_BUSY_MIN: u32 = 20;

/// Default upper bound of a busy utilization draw
pub const DEFAULT_BUSY_MAX: u32 = 90;

/// Inclusive utilization range for `make_busy`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyRange {
    pub min: u32,
    pub max: u32,
}

impl BusyRange {
    /// Bounds are reordered if given backwards
    pub fn new(min: u32, max: u32) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min as f64 && value <= self.max as f64
    }
}

impl Default for BusyRange {
    fn default() -> Self {
        Self::new(DEFAULT_BUSY_MIN, DEFAULT_BUSY_MAX)
    }
}

/// Source of utilization values for the busy transition
pub trait UtilizationSource: Send + Sync + fmt::Debug {
    /// Draw a value within `range`
    fn next_utilization(&self, range: BusyRange) -> f64;
}

/// Integer draws from a seedable RNG
pub struct SeededUtilization {
    rng: Mutex<StdRng>,
}

impl SeededUtilization {
    /// Deterministic source for tests and reproducible demos
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Source seeded from OS entropy
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl fmt::Debug for SeededUtilization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeededUtilization").finish_non_exhaustive()
    }
}

impl UtilizationSource for SeededUtilization {
    fn next_utilization(&self, range: BusyRange) -> f64 {
        // A poisoned lock still holds a usable RNG
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen_range(range.min..=range.max) as f64
    }
}

/// Always returns the same value, clamped into the range
#[derive(Debug, Clone, Copy)]
pub struct FixedUtilization(pub f64);

impl UtilizationSource for FixedUtilization {
    fn next_utilization(&self, range: BusyRange) -> f64 {
        self.0.clamp(range.min as f64, range.max as f64)
    }
}
