//! Core orchestration library for a root-management framework: installed
//! module discovery and state mutation, remote repository reconciliation,
//! and WebUI companion-process session management.

pub mod config;
pub mod module;
pub mod repo;
pub mod shell;
pub mod webui;

// Re-export commonly used types
pub use config::Config;
pub use module::{LocalModule, MarkerChange, ModuleRoot};
pub use repo::{
    CatalogClient, IllegalRepoError, JsonRepoStore, RemoteModule, RepoStore, RepoUpdater,
    SyncSummary,
};
pub use shell::{CommandOutput, RootExecutor, ShellExecutor};
pub use webui::{BridgeHost, CallbackSink, WebUiBridge, WebUiSessionManager};
