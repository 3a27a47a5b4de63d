use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Default location of the installed-module tree on device.
pub const DEFAULT_MODULE_ROOT: &str = "/data/adb/modules";

/// Default remote catalog index.
pub const DEFAULT_REPO_INDEX_URL: &str =
    "https://magisk-modules-alt-repo.github.io/json/modules.json";

const DEFAULT_SYNC_CONCURRENCY: usize = 8;
const DEFAULT_MAX_WEBUI_SESSIONS: usize = 10;

/// Process-lifetime configuration.
///
/// Every component that used to reach for ambient global state takes its
/// knobs from here instead, so tests and embedders can rebase the whole
/// library onto a scratch directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root directory holding one subdirectory per installed module.
    pub module_root: PathBuf,
    /// URL of the remote catalog index JSON.
    pub repo_index_url: String,
    /// Where the reconciled remote-module cache is persisted.
    pub repo_cache_file: PathBuf,
    /// Maximum concurrent descriptor fetches during a sync pass.
    pub sync_concurrency: usize,
    /// Maximum simultaneously active WebUI sessions.
    pub max_webui_sessions: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            module_root: PathBuf::from(DEFAULT_MODULE_ROOT),
            repo_index_url: DEFAULT_REPO_INDEX_URL.to_string(),
            repo_cache_file: PathBuf::from("/data/adb/warden/repo-cache.json"),
            sync_concurrency: DEFAULT_SYNC_CONCURRENCY,
            max_webui_sessions: DEFAULT_MAX_WEBUI_SESSIONS,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults when the
    /// file does not exist yet.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;
        let config = serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, json)
            .await
            .context("Failed to write config file")?;

        log::debug!("Saved config to {:?}", path);
        Ok(())
    }
}
