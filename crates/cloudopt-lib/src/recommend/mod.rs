//! Recommendation engine
//!
//! Evaluates a snapshot of cost records against a [`WastePolicy`] and
//! returns savings recommendations. Evaluation is pure: the engine holds no
//! mutable state and never touches storage, so callers take their own
//! snapshot before invoking it.

mod policy;
mod record;

#[cfg(test)]
mod tests;

pub use policy::{Sample, ThresholdPolicy, WastePolicy, DEFAULT_IDLE_THRESHOLD, SHUTDOWN_IDLE};
pub use record::{CostRecord, RawRecord};

use crate::error::CoreError;
use crate::models::Recommendation;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Name reported when a record has none
pub const UNKNOWN_NAME: &str = "unknown";

/// How malformed records are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvaluationMode {
    /// Skip malformed records
    #[default]
    Lenient,
    /// Fail on the first malformed record
    Strict,
}

/// Engine errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("Invalid record at index {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },
}

impl From<EvaluationError> for CoreError {
    fn from(err: EvaluationError) -> Self {
        match err {
            EvaluationError::InvalidRecord { index, reason } => {
                CoreError::InvalidRecord { index, reason }
            }
        }
    }
}

/// Savings recommendation engine
#[derive(Debug, Clone)]
pub struct RecommendationEngine {
    policy: Arc<dyn WastePolicy>,
    mode: EvaluationMode,
}

impl Default for RecommendationEngine {
    fn default() -> Self {
        Self::new(ThresholdPolicy::default())
    }
}

impl RecommendationEngine {
    /// Create a lenient engine with the given policy
    pub fn new(policy: impl WastePolicy + 'static) -> Self {
        Self {
            policy: Arc::new(policy),
            mode: EvaluationMode::Lenient,
        }
    }

    /// Lenient engine using the threshold policy
    pub fn with_threshold(threshold: f64) -> Self {
        Self::new(ThresholdPolicy::new(threshold))
    }

    /// Set the evaluation mode
    pub fn with_mode(mut self, mode: EvaluationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Shorthand for strict mode
    pub fn strict(self) -> Self {
        self.with_mode(EvaluationMode::Strict)
    }

    pub fn mode(&self) -> EvaluationMode {
        self.mode
    }

    pub fn policy(&self) -> &dyn WastePolicy {
        self.policy.as_ref()
    }

    /// Evaluate records in input order
    pub fn evaluate<R: CostRecord>(
        &self,
        records: &[R],
    ) -> Result<Vec<Recommendation>, EvaluationError> {
        let mut recommendations = Vec::new();

        for (index, record) in records.iter().enumerate() {
            let sample = match validate(record) {
                Ok(sample) => sample,
                Err(reason) => match self.mode {
                    EvaluationMode::Strict => {
                        return Err(EvaluationError::InvalidRecord { index, reason })
                    }
                    EvaluationMode::Lenient => {
                        debug!(index = index, reason = %reason, "Skipping malformed record");
                        continue;
                    }
                },
            };

            if self.policy.is_wasteful(&sample) {
                recommendations.push(Recommendation {
                    name: sample.name.unwrap_or(UNKNOWN_NAME).to_string(),
                    recommendation: self.policy.recommendation(&sample),
                    saving: self.policy.estimated_saving(&sample),
                    resource_id: sample.id,
                });
            }
        }

        Ok(recommendations)
    }
}

/// Total estimated saving over a recommendation list
pub fn total_saving(recommendations: &[Recommendation]) -> f64 {
    recommendations.iter().map(|r| r.saving).sum()
}

fn validate<R: CostRecord>(record: &R) -> Result<Sample<'_>, String> {
    let id = record
        .identity()
        .ok_or_else(|| "missing identity".to_string())?;
    let utilization = non_negative(record.utilization(), "utilization")?;
    let cost = non_negative(record.cost(), "cost")?;

    Ok(Sample {
        id,
        name: record.name(),
        utilization,
        cost,
    })
}

fn non_negative(value: Option<f64>, field: &str) -> Result<f64, String> {
    match value {
        None => Err(format!("missing {}", field)),
        Some(v) if !v.is_finite() => Err(format!("non-finite {}", field)),
        Some(v) if v < 0.0 => Err(format!("negative {}: {}", field, v)),
        Some(v) => Ok(v),
    }
}
