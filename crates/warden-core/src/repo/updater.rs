use crate::repo::client::CatalogClient;
use crate::repo::store::RepoStore;
use crate::repo::types::RemoteModule;
use anyhow::Result;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;

const DEFAULT_SYNC_CONCURRENCY: usize = 8;

/// Counters describing what a sync pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Descriptors fetched and written to the cache.
    pub updated: usize,
    /// Index entries whose cached fingerprint was already current.
    pub skipped: usize,
    /// Descriptors that failed to fetch or parse; their cache entries were
    /// left untouched.
    pub failed: usize,
    /// Cached modules no longer published and deleted.
    pub swept: usize,
}

/// Reconciles the remote catalog into the local cache.
pub struct RepoUpdater {
    client: Arc<CatalogClient>,
    store: Arc<dyn RepoStore>,
    concurrency: usize,
}

impl RepoUpdater {
    pub fn new(client: Arc<CatalogClient>, store: Arc<dyn RepoStore>) -> Self {
        Self {
            client,
            store,
            concurrency: DEFAULT_SYNC_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Run one reconciliation pass.
    ///
    /// An index fetch failure makes the whole pass a no-op: the cache is
    /// left exactly as it was. Per-module descriptor failures are isolated;
    /// the stale cache entry stays in place. Cached modules absent from the
    /// fetched index are swept once all per-module work has completed, so a
    /// successful pass leaves the cache holding exactly the index's id set.
    pub async fn run(&self, forced: bool) -> Result<SyncSummary> {
        let mut cached: HashMap<String, i64> = self
            .store
            .stubs()
            .await?
            .into_iter()
            .map(|stub| (stub.id, stub.last_update))
            .collect();

        let index = match self.client.fetch_index().await {
            Ok(index) => index,
            Err(e) => {
                log::warn!("Catalog index fetch failed, keeping cache as-is: {:#}", e);
                return Ok(SyncSummary::default());
            }
        };

        let mut summary = SyncSummary::default();
        let mut stale = Vec::new();
        for stub in index.modules {
            let cached_ts = cached.remove(&stub.id);
            // Equal timestamps count as current; only strictly newer remote
            // entries are refetched.
            if forced || cached_ts.map_or(true, |ts| ts < stub.last_update) {
                stale.push(stub);
            } else {
                summary.skipped += 1;
            }
        }

        let results: Vec<bool> = futures::stream::iter(stale.into_iter().map(|stub| {
            let client = Arc::clone(&self.client);
            let store = Arc::clone(&self.store);
            async move {
                let mut module = RemoteModule::from_stub(stub);
                if let Err(e) = module.load(&client).await {
                    log::error!("{}", e);
                    return false;
                }
                match store.upsert(module).await {
                    Ok(()) => true,
                    Err(e) => {
                        log::error!("Failed to cache module: {:#}", e);
                        false
                    }
                }
            }
        }))
        .buffer_unordered(self.concurrency)
        .collect()
        .await;

        summary.updated = results.iter().filter(|ok| **ok).count();
        summary.failed = results.len() - summary.updated;

        let leftover: Vec<String> = cached.into_keys().collect();
        if !leftover.is_empty() {
            summary.swept = self.store.remove(&leftover).await?;
        }

        log::info!(
            "Repo sync complete: {} updated, {} skipped, {} failed, {} swept",
            summary.updated,
            summary.skipped,
            summary.failed,
            summary.swept
        );
        Ok(summary)
    }
}
