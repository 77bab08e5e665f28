use async_trait::async_trait;
use serde::Deserialize;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tracing::{info, warn};

use crate::bulk::{self, ProvisionPlan, ProvisionReport};
use crate::error::{ProvisionError, ProvisionResult};
use crate::facade::ProviderFacade;
use crate::model::IdentityReference;
use crate::sweep;

/// What to do when some creations yielded no reference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedPolicy {
    /// Log them and report the number in the summary.
    #[default]
    Tolerate,
    /// Abort the run once every worker has finished.
    Fail,
}

/// Blocks the run between provisioning and cleanup until an operator agrees.
#[async_trait]
pub trait ConfirmationGate: Send {
    async fn wait(&mut self, prompt: &str) -> ProvisionResult<()>;
}

/// Prints the prompt and waits for one line from `reader`. EOF also proceeds.
pub struct LineGate<R> {
    reader: R,
}

impl LineGate<BufReader<Stdin>> {
    /// Gate reading from the process's stdin.
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R> LineGate<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl<R> ConfirmationGate for LineGate<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn wait(&mut self, prompt: &str) -> ProvisionResult<()> {
        print!("{} ", prompt);
        std::io::stdout().flush()?;

        let mut line = String::new();
        self.reader.read_line(&mut line).await?;
        Ok(())
    }
}

/// Proceeds immediately.
pub struct AutoConfirm;

#[async_trait]
impl ConfirmationGate for AutoConfirm {
    async fn wait(&mut self, prompt: &str) -> ProvisionResult<()> {
        info!("{} (confirmed automatically)", prompt);
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct RunOptions {
    pub plan: ProvisionPlan,
    /// Search term used to find the accounts to delete.
    pub search_prefix: String,
    pub sweep_batch_size: usize,
    pub unresolved_policy: UnresolvedPolicy,
    /// When false the run stops after reporting the count.
    pub cleanup: bool,
}

#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    pub provisioned: ProvisionReport,
    pub count_after_provisioning: u64,
    /// Accounts the sweep recorded for deletion.
    pub matched: usize,
    pub deleted: usize,
}

pub const CONFIRM_PROMPT: &str = "Press enter key to delete the users again";

/// Provision, count, wait for confirmation, sweep, delete.
pub async fn run<F, G>(
    facade: Arc<F>,
    options: &RunOptions,
    gate: &mut G,
) -> ProvisionResult<RunSummary>
where
    F: ProviderFacade + ?Sized + 'static,
    G: ConfirmationGate + ?Sized,
{
    let realm = options.plan.realm.as_str();

    // --- 1. Provision ---
    let provisioned = bulk::provision(facade.clone(), &options.plan).await?;
    if provisioned.unresolved > 0 {
        match options.unresolved_policy {
            UnresolvedPolicy::Tolerate => warn!(
                "{} account(s) could not be created in realm {}",
                provisioned.unresolved, realm
            ),
            UnresolvedPolicy::Fail => {
                return Err(ProvisionError::UnresolvedAccounts {
                    realm: realm.to_string(),
                    count: provisioned.unresolved,
                })
            }
        }
    }

    // --- 2. Report ---
    let count = facade.count(realm).await?;
    info!("Found users: {}", count);

    let mut summary = RunSummary {
        provisioned,
        count_after_provisioning: count,
        ..Default::default()
    };

    if !options.cleanup {
        info!("Cleanup disabled, leaving accounts in realm {}", realm);
        return Ok(summary);
    }

    // --- 3. Confirm ---
    gate.wait(CONFIRM_PROMPT).await?;

    // --- 4. Identify ---
    let references = sweep::collect_references(
        facade.as_ref(),
        realm,
        &options.search_prefix,
        options.sweep_batch_size,
    )
    .await?;
    summary.matched = references.len();

    // --- 5. Delete ---
    summary.deleted = delete_all(facade.as_ref(), realm, &references).await?;

    info!(
        "Run finished: {} created, {} matched, {} deleted",
        summary.provisioned.created.len(),
        summary.matched,
        summary.deleted
    );
    Ok(summary)
}

/// Deletes the references in order and stops at the first failure.
/// Returns how many accounts were deleted.
pub async fn delete_all<F>(
    facade: &F,
    realm: &str,
    references: &[IdentityReference],
) -> ProvisionResult<usize>
where
    F: ProviderFacade + ?Sized,
{
    for (deleted, reference) in references.iter().enumerate() {
        info!("Deleting user: {}", reference);
        if let Err(e) = facade.delete_account(realm, reference).await {
            warn!(
                "Cleanup aborted after {} of {} deletions: {}",
                deleted,
                references.len(),
                e
            );
            return Err(e);
        }
    }
    Ok(references.len())
}
