//! Waste policies
//!
//! A policy decides whether a validated sample is wasteful and what the
//! resulting recommendation says.

use crate::models::RecordId;
use std::fmt;

/// Default idle threshold (CPU percent)
pub const DEFAULT_IDLE_THRESHOLD: f64 = 5.0;

/// Recommendation text for idle compute
pub const SHUTDOWN_IDLE: &str = "Shutdown idle server";

/// A record that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct Sample<'a> {
    pub id: RecordId,
    pub name: Option<&'a str>,
    pub utilization: f64,
    pub cost: f64,
}

/// Decides which samples are wasteful
pub trait WastePolicy: Send + Sync + fmt::Debug {
    /// Whether the sample should produce a recommendation
    fn is_wasteful(&self, sample: &Sample<'_>) -> bool;

    /// Human-readable recommendation
    fn recommendation(&self, _sample: &Sample<'_>) -> String {
        SHUTDOWN_IDLE.to_string()
    }

    /// Estimated saving if the recommendation is applied
    fn estimated_saving(&self, sample: &Sample<'_>) -> f64 {
        sample.cost
    }
}

/// Flags samples whose utilization is strictly below a threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    pub threshold: f64,
}

impl ThresholdPolicy {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_THRESHOLD)
    }
}

impl WastePolicy for ThresholdPolicy {
    fn is_wasteful(&self, sample: &Sample<'_>) -> bool {
        sample.utilization < self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(utilization: f64) -> Sample<'static> {
        Sample {
            id: RecordId::Int(1),
            name: None,
            utilization,
            cost: 10.0,
        }
    }

    #[test]
    fn test_threshold_is_strict() {
        let policy = ThresholdPolicy::default();
        assert!(policy.is_wasteful(&sample(4.99)));
        assert!(!policy.is_wasteful(&sample(5.0)));
        assert!(!policy.is_wasteful(&sample(65.0)));
    }

    #[test]
    fn test_default_saving_is_cost() {
        let policy = ThresholdPolicy::new(10.0);
        assert_eq!(policy.estimated_saving(&sample(1.0)), 10.0);
        assert_eq!(policy.recommendation(&sample(1.0)), SHUTDOWN_IDLE);
    }
}
