use crate::module::markers::{
    self, MarkerChange, ACTION_SCRIPT, DISABLE_MARKER, MODULE_PROP, REMOVE_MARKER, RIRU_DIR,
    UPDATE_MARKER, ZYGISK_DIR, ZYGISK_UNLOADED,
};
use crate::module::props::{parse_prop_lines, prop_bool};
use crate::repo::client::CatalogClient;
use crate::repo::types::ModuleUpdateInfo;
use crate::shell::RootExecutor;
use crate::webui::types::{DEFAULT_WEBUI_PORT, WEBUI_SCRIPT};
use anyhow::Result;
use std::num::ParseIntError;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Handle to the fixed directory holding one subdirectory per installed
/// module.
#[derive(Debug, Clone)]
pub struct ModuleRoot {
    path: PathBuf,
}

impl ModuleRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the module tree is mounted at all; false means the framework
    /// core never came up on this boot.
    pub fn loaded(&self) -> bool {
        self.path.exists()
    }

    /// Scan the module tree and load every installed module, sorted by
    /// case-insensitive display name.
    ///
    /// Plain files and hidden entries are skipped. A missing or unreadable
    /// root yields an empty list rather than an error.
    pub async fn installed(&self) -> Vec<LocalModule> {
        let mut dir = match fs::read_dir(&self.path).await {
            Ok(dir) => dir,
            Err(e) => {
                log::warn!("Module root {:?} is not readable: {}", self.path, e);
                return Vec::new();
            }
        };

        let mut modules = Vec::new();
        while let Ok(Some(entry)) = dir.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            match entry.file_type().await {
                Ok(file_type) if file_type.is_dir() => {}
                _ => continue,
            }
            modules.push(LocalModule::load(entry.path()).await);
        }

        modules.sort_by_key(|m| m.name.to_lowercase());
        modules
    }
}

/// One installed module directory.
///
/// Descriptive metadata comes from `module.prop`; capability and state flags
/// are read directly off the filesystem each time so they track external
/// mutations (another manager process, the daemon itself).
#[derive(Debug, Clone)]
pub struct LocalModule {
    dir: PathBuf,
    pub id: String,
    pub name: String,
    pub version: String,
    pub version_code: i64,
    pub author: String,
    pub description: String,
    update_url: String,
    pub update_info: Option<ModuleUpdateInfo>,
    pub outdated: bool,
    // WebUI declaration carried inside module.prop
    pub webui_port: u16,
    pub webui_path: String,
    pub webui_enabled: bool,
}

impl LocalModule {
    fn empty(dir: PathBuf) -> Self {
        Self {
            dir,
            id: String::new(),
            name: String::new(),
            version: String::new(),
            version_code: -1,
            author: String::new(),
            description: String::new(),
            update_url: String::new(),
            update_info: None,
            outdated: false,
            webui_port: DEFAULT_WEBUI_PORT,
            webui_path: "/".to_string(),
            webui_enabled: true,
        }
    }

    /// Load a module from its directory.
    ///
    /// A missing or wholly unparseable `module.prop` (e.g. a non-numeric
    /// `versionCode`) leaves defaults in place; identity then derives from
    /// the directory name. `id` falls back to the directory name and `name`
    /// falls back to `id`, so neither is ever empty.
    pub async fn load(dir: PathBuf) -> Self {
        let mut module = Self::empty(dir);

        match fs::read_to_string(module.dir.join(MODULE_PROP)).await {
            Ok(text) => {
                if let Err(e) = module.apply_props(&text) {
                    log::debug!("Discarding properties of {:?}: {}", module.dir, e);
                    let dir = module.dir.clone();
                    module = Self::empty(dir);
                }
            }
            Err(e) => {
                log::debug!("No readable module.prop in {:?}: {}", module.dir, e);
            }
        }

        if module.id.is_empty() {
            module.id = module
                .dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
        }
        if module.name.is_empty() {
            module.name = module.id.clone();
        }

        module
    }

    fn apply_props(&mut self, text: &str) -> Result<(), ParseIntError> {
        for (key, value) in parse_prop_lines(text) {
            match key.as_str() {
                "id" => self.id = value,
                "name" => self.name = value,
                "version" => self.version = value,
                "versionCode" => self.version_code = value.parse()?,
                "author" => self.author = value,
                "description" => self.description = value,
                "updateJson" => self.update_url = value,
                "webui_port" => {
                    self.webui_port = value.parse().unwrap_or(DEFAULT_WEBUI_PORT);
                }
                "webui_path" => self.webui_path = value,
                "webui_enabled" => self.webui_enabled = prop_bool(&value),
                _ => {}
            }
        }
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn enabled(&self) -> bool {
        !self.dir.join(DISABLE_MARKER).exists()
    }

    pub fn marked_for_removal(&self) -> bool {
        self.dir.join(REMOVE_MARKER).exists()
    }

    /// An update has been staged and takes effect on the next boot.
    pub fn updated(&self) -> bool {
        self.dir.join(UPDATE_MARKER).exists()
    }

    pub fn is_zygisk(&self) -> bool {
        self.dir.join(ZYGISK_DIR).exists()
    }

    pub fn zygisk_unloaded(&self) -> bool {
        self.dir.join(ZYGISK_DIR).join(ZYGISK_UNLOADED).exists()
    }

    pub fn is_riru(&self) -> bool {
        self.id == "riru-core" || self.dir.join(RIRU_DIR).exists()
    }

    pub fn has_action(&self) -> bool {
        self.dir.join(ACTION_SCRIPT).exists()
    }

    pub fn has_webui(&self) -> bool {
        self.webui_enabled && self.dir.join(WEBUI_SCRIPT).exists()
    }

    pub fn webui_script(&self) -> PathBuf {
        self.dir.join(WEBUI_SCRIPT)
    }

    /// Enable or disable the module via the `disable` marker.
    ///
    /// The preinit refresh side effect is awaited; IO failures and a
    /// non-zero refresh exit surface as errors instead of being dropped.
    pub async fn set_enabled(
        &self,
        exec: &dyn RootExecutor,
        enabled: bool,
    ) -> Result<MarkerChange> {
        let marker = self.dir.join(DISABLE_MARKER);
        if enabled {
            markers::clear(&marker).await?;
        } else {
            markers::set(&marker).await?;
        }
        markers::refresh_preinit(exec).await?;
        Ok(MarkerChange::Applied)
    }

    /// Mark or unmark the module for removal on next boot.
    ///
    /// Removal is rejected while an update is staged: the pending update
    /// owns the directory until it lands.
    pub async fn set_remove(&self, exec: &dyn RootExecutor, remove: bool) -> Result<MarkerChange> {
        let marker = self.dir.join(REMOVE_MARKER);
        if remove {
            if self.updated() {
                log::info!("Not marking {} for removal: update pending", self.id);
                return Ok(MarkerChange::Rejected);
            }
            markers::set(&marker).await?;
        } else {
            markers::clear(&marker).await?;
        }
        markers::refresh_preinit(exec).await?;
        Ok(MarkerChange::Applied)
    }

    /// Check the module's declared update URL for a newer release.
    ///
    /// Returns false when no URL is declared or the fetch/parse fails;
    /// failures are logged, never propagated.
    pub async fn fetch_update(&mut self, client: &CatalogClient) -> bool {
        if self.update_url.is_empty() {
            return false;
        }

        match client.fetch_update_info(&self.update_url).await {
            Ok(info) => {
                self.outdated = info.version_code > self.version_code;
                self.update_info = Some(info);
                true
            }
            Err(e) => {
                log::warn!("Update check for {} failed: {:#}", self.id, e);
                false
            }
        }
    }
}
