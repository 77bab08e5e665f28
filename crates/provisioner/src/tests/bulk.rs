use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

use super::helpers::InMemoryFacade;
use crate::bulk::{self, next_stamp, partition, ProvisionPlan};
use crate::error::ProvisionError;
use crate::facade::ProviderFacade;

fn plan(total: usize, workers: usize, attribute_count: usize) -> ProvisionPlan {
    ProvisionPlan {
        realm: "demo-many-users".to_string(),
        total,
        workers,
        attribute_count,
        username_prefix: "user-".to_string(),
    }
}

proptest! {
    #[test]
    fn partition_always_sums_to_total(total in 0usize..5_000, workers in 1usize..64) {
        let batches = partition(total, workers).unwrap();
        prop_assert_eq!(batches.len(), workers);
        prop_assert_eq!(batches.iter().sum::<usize>(), total);

        let max = *batches.iter().max().unwrap();
        let min = *batches.iter().min().unwrap();
        prop_assert!(max - min <= 1);
    }
}

#[test]
fn test_partition_spreads_remainder_over_first_workers() {
    assert_eq!(partition(10, 4).unwrap(), vec![3, 3, 2, 2]);
    assert_eq!(partition(8, 4).unwrap(), vec![2, 2, 2, 2]);
    assert_eq!(partition(3, 5).unwrap(), vec![1, 1, 1, 0, 0]);
    assert_eq!(partition(0, 3).unwrap(), vec![0, 0, 0]);
}

#[test]
fn test_partition_rejects_zero_workers() {
    match partition(10, 0) {
        Err(ProvisionError::InvalidConfiguration(_)) => {}
        other => panic!("Expected InvalidConfiguration, got: {:?}", other),
    }
}

#[test]
fn test_stamps_are_unique_across_threads() {
    let handles: Vec<_> = (0..8)
        .map(|_| std::thread::spawn(|| (0..1_000).map(|_| next_stamp()).collect::<Vec<_>>()))
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        let stamps = handle.join().unwrap();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]), "stamps must increase per thread");
        for stamp in stamps {
            assert!(seen.insert(stamp), "duplicate stamp {}", stamp);
        }
    }
}

#[test]
fn test_stamps_track_the_wall_clock() {
    let before = chrono::Utc::now().timestamp_nanos_opt().unwrap() as u64;
    let stamp = next_stamp();
    let after = chrono::Utc::now().timestamp_nanos_opt().unwrap() as u64;

    // Monotonic and wall clocks may drift apart a little within a test run.
    let slack = 5_000_000_000;
    assert!(stamp + slack >= before, "stamp {} far behind {}", stamp, before);
    assert!(stamp <= after + slack, "stamp {} far ahead of {}", stamp, after);
}

#[tracing_test::traced_test]
#[tokio::test]
async fn test_provision_ten_accounts_with_four_workers() {
    let facade = Arc::new(InMemoryFacade::with_accounts("existing-", 3));

    let report = bulk::provision(facade.clone(), &plan(10, 4, 0)).await.unwrap();

    assert_eq!(report.batches, vec![3, 3, 2, 2]);
    assert_eq!(report.attempted(), 10);
    assert_eq!(report.created.len(), 10);
    assert_eq!(report.unresolved, 0);
    assert_eq!(facade.creates(), 10, "exactly N create calls");
    assert_eq!(facade.count("demo-many-users").await.unwrap(), 13);

    let unique: HashSet<_> = report.created.iter().collect();
    assert_eq!(unique.len(), 10);
}

#[tokio::test]
async fn test_provision_fewer_accounts_than_workers() {
    let facade = Arc::new(InMemoryFacade::new());

    let report = bulk::provision(facade.clone(), &plan(2, 8, 0)).await.unwrap();

    assert_eq!(report.batches.iter().filter(|&&b| b > 0).count(), 2);
    assert_eq!(facade.creates(), 2);
    assert_eq!(facade.len(), 2);
}

#[tokio::test]
async fn test_provision_nothing() {
    let facade = Arc::new(InMemoryFacade::new());

    let report = bulk::provision(facade.clone(), &plan(0, 4, 2)).await.unwrap();

    assert_eq!(report.attempted(), 0);
    assert_eq!(facade.creates(), 0);
}

#[tokio::test]
async fn test_attributes_round_trip_through_backend() {
    let facade = Arc::new(InMemoryFacade::new());

    bulk::provision(facade.clone(), &plan(3, 2, 2)).await.unwrap();

    let listed = facade.list_all("demo-many-users").await.unwrap();
    assert_eq!(listed.len(), 3);
    for record in listed {
        assert!(record.reference.is_resolved());
        assert_eq!(record.attributes.len(), 2);
        assert_eq!(record.attributes["attr0"], vec!["value0".to_string()]);
        assert_eq!(record.attributes["attr1"], vec!["value1".to_string()]);
    }
}

#[tokio::test]
async fn test_rejected_creations_do_not_stop_the_batch() {
    let facade = Arc::new(InMemoryFacade {
        reject_marker: Some("user-".to_string()),
        ..Default::default()
    });

    let report = bulk::provision(facade.clone(), &plan(6, 2, 0)).await.unwrap();

    assert_eq!(facade.creates(), 6, "every creation is still attempted");
    assert_eq!(report.unresolved, 6);
    assert!(report.created.is_empty());
}

#[tokio::test]
async fn test_backend_error_surfaces_after_all_workers_finish() {
    let facade = Arc::new(InMemoryFacade {
        transport_failure_after: Some(4),
        ..Default::default()
    });

    // Workers need 5 each, so every worker runs into the failure.
    let result = bulk::provision(facade.clone(), &plan(15, 3, 0)).await;

    match result {
        Err(ProvisionError::BackendUnavailable(msg)) => assert!(msg.contains("connection reset")),
        other => panic!("Expected BackendUnavailable, got: {:?}", other),
    }
    // Each of the 3 workers stops on its first failing call; 4 succeeded before.
    assert_eq!(facade.len(), 4);
    assert_eq!(facade.creates(), 4 + 3);
}

#[tokio::test]
async fn test_panicking_worker_becomes_worker_fault() {
    let facade = Arc::new(InMemoryFacade {
        panic_on_create: true,
        ..Default::default()
    });

    let result = bulk::provision(facade.clone(), &plan(4, 2, 0)).await;

    match result {
        Err(ProvisionError::WorkerFault { worker, message }) => {
            assert_eq!(worker, 0);
            assert!(message.contains("panic"), "unexpected message: {}", message);
        }
        other => panic!("Expected WorkerFault, got: {:?}", other),
    }
    // Both workers ran until their own panic; no sibling was cancelled.
    assert_eq!(facade.creates(), 2);
}

#[tokio::test]
async fn test_zero_workers_fails_before_any_backend_call() {
    let facade = Arc::new(InMemoryFacade::new());

    let result = bulk::provision(facade.clone(), &plan(5, 0, 0)).await;

    assert!(matches!(result, Err(ProvisionError::InvalidConfiguration(_))));
    assert_eq!(facade.creates(), 0);
}
