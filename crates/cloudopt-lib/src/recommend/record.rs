//! Record capability abstraction shared by live resources and ledger rows
//!
//! The engine never touches concrete source types. Each source implements
//! [`CostRecord`] and reports missing fields as `None`.

use crate::models::{RecordId, Resource, UsageRecord};
use serde_json::{Map, Value};

/// Capability set the recommendation engine evaluates
pub trait CostRecord {
    /// Stable identity of the record
    fn identity(&self) -> Option<RecordId>;

    /// Utilization-like metric (CPU percent, usage amount)
    fn utilization(&self) -> Option<f64>;

    /// Recurring cost estimate
    fn cost(&self) -> Option<f64>;

    /// Display name, if the source carries one
    fn name(&self) -> Option<&str> {
        None
    }
}

impl<T: CostRecord + ?Sized> CostRecord for &T {
    fn identity(&self) -> Option<RecordId> {
        (**self).identity()
    }

    fn utilization(&self) -> Option<f64> {
        (**self).utilization()
    }

    fn cost(&self) -> Option<f64> {
        (**self).cost()
    }

    fn name(&self) -> Option<&str> {
        (**self).name()
    }
}

impl<T: CostRecord + ?Sized> CostRecord for Box<T> {
    fn identity(&self) -> Option<RecordId> {
        (**self).identity()
    }

    fn utilization(&self) -> Option<f64> {
        (**self).utilization()
    }

    fn cost(&self) -> Option<f64> {
        (**self).cost()
    }

    fn name(&self) -> Option<&str> {
        (**self).name()
    }
}

impl CostRecord for Resource {
    fn identity(&self) -> Option<RecordId> {
        Some(RecordId::Int(self.id))
    }

    fn utilization(&self) -> Option<f64> {
        Some(self.utilization)
    }

    fn cost(&self) -> Option<f64> {
        Some(self.cost)
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }
}

/// Ledger rows have no display name; usage amount stands in for utilization
impl CostRecord for UsageRecord {
    fn identity(&self) -> Option<RecordId> {
        i64::try_from(self.id).ok().map(RecordId::Int)
    }

    fn utilization(&self) -> Option<f64> {
        Some(self.usage_amount)
    }

    fn cost(&self) -> Option<f64> {
        Some(self.cost)
    }
}

const IDENTITY_KEYS: &[&str] = &["id", "resource_id", "instance_id"];
const UTILIZATION_KEYS: &[&str] = &["utilization", "cpu", "usage_amount"];
const NAME_KEYS: &[&str] = &["name", "instance_name"];

/// Loosely-typed record from an imported ledger (JSON object)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: Map<String, Value>,
}

impl RawRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Wrap any JSON value; non-objects become an empty (malformed) record
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self { fields },
            _ => Self::default(),
        }
    }

    fn first(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter()
            .find_map(|k| self.fields.get(*k).filter(|v| !v.is_null()))
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}

impl CostRecord for RawRecord {
    fn identity(&self) -> Option<RecordId> {
        match self.first(IDENTITY_KEYS)? {
            Value::Number(n) => n.as_i64().map(RecordId::Int),
            Value::String(s) if !s.is_empty() => Some(RecordId::Text(s.clone())),
            _ => None,
        }
    }

    fn utilization(&self) -> Option<f64> {
        self.first(UTILIZATION_KEYS)?.as_f64()
    }

    fn cost(&self) -> Option<f64> {
        self.first(&["cost"])?.as_f64()
    }

    fn name(&self) -> Option<&str> {
        self.first(NAME_KEYS)?.as_str()
    }
}
