use crate::repo::types::RemoteModule;
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

/// (id, last_update) pair as remembered by the cache; the reconciliation
/// pass only needs the fingerprint, not the full record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedStub {
    pub id: String,
    pub last_update: i64,
}

/// Keyed persistent cache of remote modules.
pub trait RepoStore: Send + Sync {
    fn stubs<'a>(&'a self) -> BoxFuture<'a, Result<Vec<CachedStub>>>;
    fn upsert<'a>(&'a self, module: RemoteModule) -> BoxFuture<'a, Result<()>>;
    fn remove<'a>(&'a self, ids: &'a [String]) -> BoxFuture<'a, Result<usize>>;
    fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<RemoteModule>>>;
    fn all<'a>(&'a self) -> BoxFuture<'a, Result<Vec<RemoteModule>>>;
}

/// [`RepoStore`] persisted as a single JSON file.
///
/// The full map lives in memory; every mutation rewrites the file. Catalog
/// sizes are small (hundreds of entries), so a whole-file rewrite is cheaper
/// than being clever.
pub struct JsonRepoStore {
    path: PathBuf,
    modules: RwLock<HashMap<String, RemoteModule>>,
}

impl JsonRepoStore {
    /// Open a store, loading any existing cache file. A corrupt file is
    /// logged and treated as an empty cache; the next sync pass rebuilds it.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let modules = match fs::read_to_string(&path).await {
            Ok(contents) => match serde_json::from_str::<Vec<RemoteModule>>(&contents) {
                Ok(list) => list.into_iter().map(|m| (m.id.clone(), m)).collect(),
                Err(e) => {
                    log::warn!("Discarding corrupt repo cache {:?}: {}", path, e);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        Self {
            path,
            modules: RwLock::new(modules),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, modules: &HashMap<String, RemoteModule>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create repo cache directory")?;
        }

        let mut list: Vec<&RemoteModule> = modules.values().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));

        let json =
            serde_json::to_string_pretty(&list).context("Failed to serialize repo cache")?;
        fs::write(&self.path, json)
            .await
            .context("Failed to write repo cache file")?;

        log::debug!("Saved repo cache ({} modules) to {:?}", list.len(), self.path);
        Ok(())
    }
}

impl RepoStore for JsonRepoStore {
    fn stubs<'a>(&'a self) -> BoxFuture<'a, Result<Vec<CachedStub>>> {
        Box::pin(async move {
            let modules = self.modules.read().await;
            Ok(modules
                .values()
                .map(|m| CachedStub {
                    id: m.id.clone(),
                    last_update: m.last_update,
                })
                .collect())
        })
    }

    fn upsert<'a>(&'a self, module: RemoteModule) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut modules = self.modules.write().await;
            modules.insert(module.id.clone(), module);
            self.persist(&modules).await
        })
    }

    fn remove<'a>(&'a self, ids: &'a [String]) -> BoxFuture<'a, Result<usize>> {
        Box::pin(async move {
            let mut modules = self.modules.write().await;
            let mut removed = 0;
            for id in ids {
                if modules.remove(id).is_some() {
                    removed += 1;
                }
            }
            if removed > 0 {
                self.persist(&modules).await?;
            }
            Ok(removed)
        })
    }

    fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<RemoteModule>>> {
        Box::pin(async move {
            let modules = self.modules.read().await;
            Ok(modules.get(id).cloned())
        })
    }

    fn all<'a>(&'a self) -> BoxFuture<'a, Result<Vec<RemoteModule>>> {
        Box::pin(async move {
            let modules = self.modules.read().await;
            let mut list: Vec<RemoteModule> = modules.values().cloned().collect();
            list.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(list)
        })
    }
}
