//! Property-based tests for drain ordering

use std::sync::Arc;

use chrono::{Duration, Utc};
use floatplan::local_db::LocalDatabase;
use floatplan::offline::{Operation, OperationLog};
use floatplan::shared::FloatPlan;
use proptest::prelude::*;
use uuid::Uuid;

fn operation_for(kind: u8) -> Operation {
    // A fresh plan per operation keeps Update supersession out of the picture.
    let plan = FloatPlan::new("Sea Otter", Utc::now() + Duration::hours(2));
    match kind % 4 {
        0 => Operation::create(&plan),
        1 => Operation::update(&plan),
        2 => Operation::delete(plan.id),
        _ => Operation::check_in(&plan),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_check_ins_first_then_creation_order(kinds in prop::collection::vec(0u8..4, 0..20)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (enqueued, ordered) = runtime.block_on(async {
            let db = Arc::new(LocalDatabase::in_memory().await.unwrap());
            let log = OperationLog::open(db).await.unwrap();
            let mut enqueued = Vec::new();
            for kind in &kinds {
                let op = operation_for(*kind);
                enqueued.push(op.clone());
                log.enqueue(op).await.unwrap();
            }
            (enqueued, log.drain_order().await)
        });

        prop_assert_eq!(ordered.len(), enqueued.len());

        let expected: Vec<Uuid> = enqueued
            .iter()
            .filter(|op| op.is_priority())
            .chain(enqueued.iter().filter(|op| !op.is_priority()))
            .map(|op| op.id)
            .collect();
        let actual: Vec<Uuid> = ordered.iter().map(|op| op.id).collect();
        prop_assert_eq!(actual, expected);

        // No non-check-in ever precedes a check-in.
        if let Some(first_other) = ordered.iter().position(|op| !op.is_priority()) {
            prop_assert!(ordered[first_other..].iter().all(|op| !op.is_priority()));
        }
    }
}
