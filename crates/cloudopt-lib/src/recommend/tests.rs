//! Engine behavior tests
//!
//! These tests verify:
//! - Threshold selection and input-order preservation
//! - Lenient vs strict handling of malformed records
//! - Heterogeneous sources evaluated through one call

use super::*;
use crate::models::{RecordId, Resource, ResourceStatus, UsageRecord};
use chrono::Utc;
use proptest::prelude::*;
use serde_json::json;

fn resource(id: i64, name: &str, utilization: f64, cost: f64) -> Resource {
    Resource {
        id,
        name: name.to_string(),
        utilization,
        status: if utilization == 0.0 {
            ResourceStatus::Idle
        } else {
            ResourceStatus::Running
        },
        cost,
    }
}

#[test]
fn test_dev_server_below_threshold() {
    let engine = RecommendationEngine::with_threshold(5.0);
    let resources = vec![resource(1, "dev-server", 3.0, 25.0)];

    let recs = engine.evaluate(&resources).unwrap();

    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].resource_id, RecordId::Int(1));
    assert_eq!(recs[0].name, "dev-server");
    assert_eq!(recs[0].recommendation, SHUTDOWN_IDLE);
    assert_eq!(recs[0].saving, 25.0);
}

#[test]
fn test_demo_seed_yields_two_idle_servers() {
    let engine = RecommendationEngine::default();
    let resources = vec![
        resource(1, "dev-server", 3.0, 25.0),
        resource(2, "test-server", 0.0, 15.0),
        resource(3, "burst-server", 65.0, 60.0),
    ];

    let recs = engine.evaluate(&resources).unwrap();

    let names: Vec<_> = recs.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["dev-server", "test-server"]);
    assert_eq!(total_saving(&recs), 40.0);
}

#[test]
fn test_threshold_is_injectable() {
    let resources = vec![
        resource(1, "a", 3.0, 1.0),
        resource(2, "b", 30.0, 1.0),
        resource(3, "c", 70.0, 1.0),
    ];

    assert_eq!(RecommendationEngine::with_threshold(0.0).evaluate(&resources).unwrap().len(), 0);
    assert_eq!(RecommendationEngine::with_threshold(50.0).evaluate(&resources).unwrap().len(), 2);
    assert_eq!(RecommendationEngine::with_threshold(100.0).evaluate(&resources).unwrap().len(), 3);
}

#[test]
fn test_lenient_skips_record_missing_cost() {
    let records = vec![
        RawRecord::from_value(json!({"id": 1, "name": "dev-server", "cpu": 3, "cost": 25})),
        RawRecord::from_value(json!({"id": 2, "name": "no-cost", "cpu": 1})),
        RawRecord::from_value(json!({"id": 3, "name": "scratch", "cpu": 0, "cost": 5})),
    ];

    let recs = RecommendationEngine::default().evaluate(&records).unwrap();

    let ids: Vec<_> = recs.iter().map(|r| r.resource_id.clone()).collect();
    assert_eq!(ids, vec![RecordId::Int(1), RecordId::Int(3)]);
}

#[test]
fn test_strict_rejects_record_missing_cost() {
    let records = vec![
        RawRecord::from_value(json!({"id": 1, "cpu": 3, "cost": 25})),
        RawRecord::from_value(json!({"id": 2, "cpu": 1})),
    ];

    let err = RecommendationEngine::default()
        .strict()
        .evaluate(&records)
        .unwrap_err();

    match err {
        EvaluationError::InvalidRecord { index, reason } => {
            assert_eq!(index, 1);
            assert!(reason.contains("cost"));
        }
    }
}

#[test]
fn test_strict_rejects_negative_and_non_finite() {
    let engine = RecommendationEngine::default().strict();

    let negative = vec![resource(1, "neg", -1.0, 3.0)];
    assert!(engine.evaluate(&negative).is_err());

    let nan_cost = vec![resource(1, "nan", 1.0, f64::NAN)];
    assert!(engine.evaluate(&nan_cost).is_err());
}

#[test]
fn test_strict_error_converts_to_core_error() {
    let records = vec![RawRecord::from_value(json!({"cpu": 1, "cost": 1}))];
    let err: CoreError = RecommendationEngine::default()
        .strict()
        .evaluate(&records)
        .unwrap_err()
        .into();

    assert!(matches!(err, CoreError::InvalidRecord { index: 0, .. }));
}

#[test]
fn test_usage_records_report_unknown_name() {
    let usage = vec![UsageRecord {
        id: 9,
        cloud_provider: "GCP".to_string(),
        service_name: "Compute Engine".to_string(),
        resource_id: "vm-1".to_string(),
        usage_amount: 0.5,
        cost: 40.0,
        timestamp: Utc::now(),
    }];

    let recs = RecommendationEngine::default().evaluate(&usage).unwrap();

    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].name, UNKNOWN_NAME);
    assert_eq!(recs[0].saving, 40.0);
}

#[test]
fn test_heterogeneous_sources_in_one_call() {
    let live = resource(1, "dev-server", 3.0, 25.0);
    let raw = RawRecord::from_value(json!({"resource_id": "i-9", "usage_amount": 2, "cost": 8}));
    let records: Vec<&dyn CostRecord> = vec![&live, &raw];

    let recs = RecommendationEngine::default().evaluate(&records).unwrap();

    assert_eq!(recs.len(), 2);
    assert_eq!(recs[1].resource_id, RecordId::Text("i-9".to_string()));
    assert_eq!(recs[1].name, UNKNOWN_NAME);
}

#[test]
fn test_custom_policy_is_pluggable() {
    #[derive(Debug)]
    struct CostlyPolicy;

    impl WastePolicy for CostlyPolicy {
        fn is_wasteful(&self, sample: &Sample<'_>) -> bool {
            sample.cost > 50.0
        }

        fn recommendation(&self, _sample: &Sample<'_>) -> String {
            "Downsize instance".to_string()
        }

        fn estimated_saving(&self, sample: &Sample<'_>) -> f64 {
            sample.cost / 2.0
        }
    }

    let resources = vec![resource(1, "small", 1.0, 10.0), resource(2, "big", 80.0, 60.0)];
    let recs = RecommendationEngine::new(CostlyPolicy)
        .evaluate(&resources)
        .unwrap();

    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].recommendation, "Downsize instance");
    assert_eq!(recs[0].saving, 30.0);
}

prop_compose! {
    fn arbitrary_resources()(rows in prop::collection::vec((0.0f64..100.0, 0.0f64..500.0), 0..40)) -> Vec<Resource> {
        rows.into_iter()
            .enumerate()
            .map(|(i, (utilization, cost))| resource(i as i64 + 1, &format!("r-{}", i), utilization, cost))
            .collect()
    }
}

proptest! {
    #[test]
    fn evaluate_selects_exactly_below_threshold_in_order(
        resources in arbitrary_resources(),
        threshold in 0.0f64..100.0,
    ) {
        let recs = RecommendationEngine::with_threshold(threshold).evaluate(&resources).unwrap();

        let expected: Vec<RecordId> = resources
            .iter()
            .filter(|r| r.utilization < threshold)
            .map(|r| RecordId::Int(r.id))
            .collect();
        let actual: Vec<RecordId> = recs.iter().map(|r| r.resource_id.clone()).collect();

        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn evaluate_is_deterministic(resources in arbitrary_resources(), threshold in 0.0f64..100.0) {
        let engine = RecommendationEngine::with_threshold(threshold);
        let first = engine.evaluate(&resources).unwrap();
        let second = engine.evaluate(&resources).unwrap();
        prop_assert_eq!(first, second);
    }
}
