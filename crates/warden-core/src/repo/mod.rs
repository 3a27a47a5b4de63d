pub mod client;
pub mod download;
pub mod store;
pub mod types;
pub mod updater;

pub use client::CatalogClient;
pub use store::{CachedStub, JsonRepoStore, RepoStore};
pub use types::{IllegalRepoError, ModuleUpdateInfo, RemoteModule, RepoIndex, RepoModuleStub};
pub use updater::{RepoUpdater, SyncSummary};
