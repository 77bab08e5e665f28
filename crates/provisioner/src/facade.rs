use async_trait::async_trait;

use crate::error::ProvisionResult;
use crate::model::{AccountRecord, IdentityReference};

/// Account operations against one identity backend.
///
/// Every call names the realm it operates on. Implementations hold no
/// per-account state, so one instance can be shared by all provisioning
/// workers.
#[async_trait]
pub trait ProviderFacade: Send + Sync {
    /// Total number of accounts in `realm`.
    async fn count(&self, realm: &str) -> ProvisionResult<u64>;

    /// Every account in `realm`. Only meant for small realms; use
    /// [`crate::sweep::sweep`] otherwise.
    async fn list_all(&self, realm: &str) -> ProvisionResult<Vec<AccountRecord>>;

    /// At most `limit` accounts whose username matches `search`, starting at
    /// `offset` in the backend's native order. An empty page means nothing
    /// matches from `offset` onward.
    async fn search_page(
        &self,
        realm: &str,
        search: &str,
        offset: usize,
        limit: usize,
    ) -> ProvisionResult<Vec<AccountRecord>>;

    /// Creates the account. A rejected creation is not an error: it yields
    /// [`IdentityReference::Unknown`] so a batch can carry on.
    async fn create_account(
        &self,
        realm: &str,
        record: &AccountRecord,
    ) -> ProvisionResult<IdentityReference>;

    /// Deletes the account. Anything other than a confirmed deletion is an
    /// error.
    async fn delete_account(&self, realm: &str, reference: &IdentityReference)
        -> ProvisionResult<()>;
}
