use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::{ProvisionError, ProvisionResult};
use crate::facade::ProviderFacade;
use crate::model::{AccountRecord, IdentityReference};

/// Test backend keeping accounts in insertion order, with switches to make
/// individual calls fail.
#[derive(Default)]
pub struct InMemoryFacade {
    pub accounts: Mutex<Vec<AccountRecord>>,
    /// Usernames containing this marker are rejected on create.
    pub reject_marker: Option<String>,
    /// Every create after this many successful ones fails with a transport error.
    pub transport_failure_after: Option<usize>,
    /// Ids whose deletion is answered with 500.
    pub failing_deletes: HashSet<String>,
    /// Panic inside `create_account`.
    pub panic_on_create: bool,
    pub create_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub count_calls: AtomicUsize,
}

impl InMemoryFacade {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend pre-populated with `n` accounts named `<prefix><i>`.
    pub fn with_accounts(prefix: &str, n: usize) -> Self {
        let facade = Self::new();
        {
            let mut accounts = facade.accounts.lock().unwrap();
            for i in 0..n {
                let mut record = AccountRecord::new(format!("{}{:05}", prefix, i));
                record.reference = IdentityReference::from_id(uuid::Uuid::new_v4().to_string());
                accounts.push(record);
            }
        }
        facade
    }

    pub fn accounts(&self) -> Vec<AccountRecord> {
        self.accounts.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.accounts.lock().unwrap().len()
    }

    pub fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderFacade for InMemoryFacade {
    async fn count(&self, _realm: &str) -> ProvisionResult<u64> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.len() as u64)
    }

    async fn list_all(&self, _realm: &str) -> ProvisionResult<Vec<AccountRecord>> {
        Ok(self.accounts())
    }

    async fn search_page(
        &self,
        _realm: &str,
        search: &str,
        offset: usize,
        limit: usize,
    ) -> ProvisionResult<Vec<AccountRecord>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .filter(|record| record.username.contains(search))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn create_account(
        &self,
        _realm: &str,
        record: &AccountRecord,
    ) -> ProvisionResult<IdentityReference> {
        let previous = self.create_calls.fetch_add(1, Ordering::SeqCst);

        if self.panic_on_create {
            panic!("backend exploded");
        }
        if let Some(limit) = self.transport_failure_after {
            if previous >= limit {
                return Err(ProvisionError::BackendUnavailable(
                    "connection reset".to_string(),
                ));
            }
        }
        if let Some(marker) = &self.reject_marker {
            if record.username.contains(marker.as_str()) {
                return Ok(IdentityReference::Unknown);
            }
        }

        let mut accounts = self.accounts.lock().unwrap();
        if accounts.iter().any(|a| a.username == record.username) {
            return Ok(IdentityReference::Unknown);
        }

        let reference = IdentityReference::from_id(uuid::Uuid::new_v4().to_string());
        let mut stored = record.clone();
        stored.reference = reference.clone();
        stored.password = None;
        accounts.push(stored);
        Ok(reference)
    }

    async fn delete_account(
        &self,
        realm: &str,
        reference: &IdentityReference,
    ) -> ProvisionResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        let id = reference
            .id()
            .ok_or_else(|| ProvisionError::UnresolvedReference {
                realm: realm.to_string(),
            })?;

        if self.failing_deletes.contains(id) {
            return Err(ProvisionError::AccountDeletionFailed {
                realm: realm.to_string(),
                id: id.to_string(),
                status: 500,
            });
        }

        let mut accounts = self.accounts.lock().unwrap();
        match accounts.iter().position(|a| &a.reference == reference) {
            Some(index) => {
                accounts.remove(index);
                Ok(())
            }
            None => Err(ProvisionError::AccountDeletionFailed {
                realm: realm.to_string(),
                id: id.to_string(),
                status: 404,
            }),
        }
    }
}
