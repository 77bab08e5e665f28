use chrono::Utc;
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::{info, warn};

use crate::error::{ProvisionError, ProvisionResult};
use crate::facade::ProviderFacade;
use crate::model::{AccountRecord, IdentityReference};

/// What to create and how many workers share the load.
#[derive(Clone, Debug)]
pub struct ProvisionPlan {
    /// Realm the accounts are created in.
    pub realm: String,
    /// Total number of accounts across all workers.
    pub total: usize,
    /// Number of concurrent workers. Must be at least 1.
    pub workers: usize,
    /// Synthetic attributes per account; 0 disables attributes.
    pub attribute_count: usize,
    /// Username prefix; the sweep searches for the same prefix.
    pub username_prefix: String,
}

/// Outcome of one worker's batch.
#[derive(Clone, Debug, Default)]
pub struct WorkerReport {
    pub worker: usize,
    pub created: Vec<IdentityReference>,
    pub unresolved: usize,
}

/// Outcome of a full provisioning run.
#[derive(Clone, Debug, Default)]
pub struct ProvisionReport {
    /// Batch size assigned to each worker, in worker order.
    pub batches: Vec<usize>,
    /// Resolved references of the created accounts.
    pub created: Vec<IdentityReference>,
    /// Creations the backend rejected.
    pub unresolved: usize,
}

impl ProvisionReport {
    pub fn attempted(&self) -> usize {
        self.batches.iter().sum()
    }
}

/// Splits `total` over `workers`: everyone gets `total / workers` and the
/// first `total % workers` workers take one extra account.
pub fn partition(total: usize, workers: usize) -> ProvisionResult<Vec<usize>> {
    if workers == 0 {
        return Err(ProvisionError::InvalidConfiguration(
            "worker count must be at least 1".to_string(),
        ));
    }

    let base = total / workers;
    let remainder = total % workers;
    Ok((0..workers)
        .map(|worker| base + usize::from(worker < remainder))
        .collect())
}

/// Nanosecond stamp for usernames. Anchored on the wall clock once, then
/// driven by the monotonic clock; strictly increasing within the process so
/// concurrent workers never hand out the same stamp.
pub fn next_stamp() -> u64 {
    static ANCHOR: OnceLock<(Instant, u64)> = OnceLock::new();
    static LAST: AtomicU64 = AtomicU64::new(0);

    let (start, wall_nanos) = ANCHOR.get_or_init(|| {
        let wall = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        (Instant::now(), u64::try_from(wall).unwrap_or_default())
    });
    let elapsed = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
    let now = wall_nanos.saturating_add(elapsed);

    let mut prev = LAST.load(Ordering::Relaxed);
    loop {
        let next = now.max(prev.saturating_add(1));
        match LAST.compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => prev = actual,
        }
    }
}

/// Creates `plan.total` accounts with `plan.workers` concurrent tasks.
///
/// Every task is awaited before this returns, even when one of them fails.
/// The first failure in worker order is then returned: a panicking task
/// becomes [`ProvisionError::WorkerFault`], a facade error is passed through.
pub async fn provision<F>(facade: Arc<F>, plan: &ProvisionPlan) -> ProvisionResult<ProvisionReport>
where
    F: ProviderFacade + ?Sized + 'static,
{
    let batches = partition(plan.total, plan.workers)?;
    info!(
        "Provisioning {} accounts in realm {} with {} workers: {:?}",
        plan.total, plan.realm, plan.workers, batches
    );

    let handles: Vec<_> = batches
        .iter()
        .enumerate()
        .map(|(worker, &batch)| {
            let facade = facade.clone();
            let realm = plan.realm.clone();
            let prefix = plan.username_prefix.clone();
            let attribute_count = plan.attribute_count;
            tokio::spawn(async move {
                create_batch(facade.as_ref(), worker, &realm, &prefix, batch, attribute_count).await
            })
        })
        .collect();

    let results = join_all(handles).await;

    let mut report = ProvisionReport {
        batches,
        ..Default::default()
    };
    let mut first_error = None;

    for (worker, result) in results.into_iter().enumerate() {
        match result {
            Ok(Ok(worker_report)) => {
                report.unresolved += worker_report.unresolved;
                report.created.extend(worker_report.created);
            }
            Ok(Err(e)) => {
                warn!("Worker {} stopped: {}", worker, e);
                first_error.get_or_insert(e);
            }
            Err(join_error) => {
                warn!("Worker {} faulted: {}", worker, join_error);
                first_error.get_or_insert(ProvisionError::WorkerFault {
                    worker,
                    message: join_error.to_string(),
                });
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }

    info!(
        "Provisioning finished: {} created, {} unresolved",
        report.created.len(),
        report.unresolved
    );
    Ok(report)
}

/// One worker's sequential batch. Rejected creations are counted, not
/// escalated; facade errors end the batch.
async fn create_batch<F>(
    facade: &F,
    worker: usize,
    realm: &str,
    prefix: &str,
    batch: usize,
    attribute_count: usize,
) -> ProvisionResult<WorkerReport>
where
    F: ProviderFacade + ?Sized,
{
    let mut report = WorkerReport {
        worker,
        ..Default::default()
    };

    for _ in 0..batch {
        let record = AccountRecord::synthetic(prefix, next_stamp(), attribute_count);
        match facade.create_account(realm, &record).await? {
            IdentityReference::Unknown => {
                warn!("Worker {}: creation of {} left no reference", worker, record.username);
                report.unresolved += 1;
            }
            reference => {
                info!("Worker {}: created {} as {}", worker, record.username, reference);
                report.created.push(reference);
            }
        }
    }

    Ok(report)
}
