use tracing::{debug, info};

use crate::error::{ProvisionError, ProvisionResult};
use crate::facade::ProviderFacade;
use crate::model::{AccountRecord, IdentityReference};

/// Counters of a finished sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub pages: usize,
    pub records: usize,
}

/// Walks every account matching `search`, page by page, calling `handler`
/// once per record in the order the backend returns them.
///
/// Stops on an empty page or on a page shorter than `batch_size`. The offset
/// only moves forward, so deleting matches while a sweep is running can make
/// it skip or repeat records. Collect first, delete afterwards.
pub async fn sweep<F, H>(
    facade: &F,
    realm: &str,
    search: &str,
    batch_size: usize,
    mut handler: H,
) -> ProvisionResult<SweepStats>
where
    F: ProviderFacade + ?Sized,
    H: FnMut(AccountRecord),
{
    if batch_size == 0 {
        return Err(ProvisionError::InvalidConfiguration(
            "sweep batch size must be at least 1".to_string(),
        ));
    }

    let mut stats = SweepStats::default();
    let mut offset = 0;

    loop {
        let page = facade.search_page(realm, search, offset, batch_size).await?;
        stats.pages += 1;
        debug!(
            "Sweep page {} at offset {}: {} records",
            stats.pages,
            offset,
            page.len()
        );

        if page.is_empty() {
            break;
        }

        let page_len = page.len();
        for record in page {
            stats.records += 1;
            handler(record);
        }

        if page_len < batch_size {
            break;
        }
        offset += batch_size;
    }

    Ok(stats)
}

/// Sweeps and keeps only the references of the matched accounts.
pub async fn collect_references<F>(
    facade: &F,
    realm: &str,
    search: &str,
    batch_size: usize,
) -> ProvisionResult<Vec<IdentityReference>>
where
    F: ProviderFacade + ?Sized,
{
    let mut references = Vec::new();
    sweep(facade, realm, search, batch_size, |record| {
        info!("Recording user for deletion: {}", record);
        references.push(record.reference);
    })
    .await?;
    Ok(references)
}
