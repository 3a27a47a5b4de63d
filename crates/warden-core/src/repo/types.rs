use crate::module::props::parse_prop_lines;
use crate::repo::client::CatalogClient;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Remote catalog index: the list of currently published modules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoIndex {
    pub modules: Vec<RepoModuleStub>,
}

/// Lightweight per-module entry of the catalog index.
///
/// `last_update` (epoch milliseconds) is the staleness fingerprint; the full
/// descriptor lives behind `prop_url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoModuleStub {
    pub id: String,
    pub last_update: i64,
    pub prop_url: String,
    pub zip_url: String,
    pub notes_url: String,
}

/// A published module as persisted in the local cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteModule {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub version: String,
    #[serde(default = "default_version_code")]
    pub version_code: i64,
    #[serde(default)]
    pub description: String,
    pub last_update: i64,
    pub prop_url: String,
    pub zip_url: String,
    pub notes_url: String,
}

fn default_version_code() -> i64 {
    -1
}

/// A module descriptor that cannot enter the cache.
#[derive(Debug, Error)]
pub enum IllegalRepoError {
    #[error("Repo [{id}] fetch error")]
    Fetch {
        id: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Repo [{id}] parse error")]
    Parse {
        id: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Repo [{id}] does not contain a versionCode")]
    MissingVersionCode { id: String },
}

impl RemoteModule {
    pub fn from_stub(stub: RepoModuleStub) -> Self {
        Self {
            id: stub.id,
            name: String::new(),
            author: String::new(),
            version: String::new(),
            version_code: -1,
            description: String::new(),
            last_update: stub.last_update,
            prop_url: stub.prop_url,
            zip_url: stub.zip_url,
            notes_url: stub.notes_url,
        }
    }

    /// Hydrate descriptive fields from the descriptor behind `prop_url`.
    ///
    /// The catalog index stays authoritative for `id`; a stray `id` key in
    /// the descriptor is ignored. A descriptor without a usable
    /// `versionCode` fails hydration.
    pub async fn load(&mut self, client: &CatalogClient) -> Result<(), IllegalRepoError> {
        let raw = client
            .fetch_string(&self.prop_url)
            .await
            .map_err(|source| IllegalRepoError::Fetch {
                id: self.id.clone(),
                source,
            })?;

        self.apply_props(&raw).map_err(|source| IllegalRepoError::Parse {
            id: self.id.clone(),
            source,
        })?;

        if self.version_code < 0 {
            return Err(IllegalRepoError::MissingVersionCode {
                id: self.id.clone(),
            });
        }

        Ok(())
    }

    fn apply_props(&mut self, text: &str) -> Result<(), std::num::ParseIntError> {
        for (key, value) in parse_prop_lines(text) {
            match key.as_str() {
                "name" => self.name = value,
                "author" => self.author = value,
                "version" => self.version = value,
                "versionCode" => self.version_code = value.parse()?,
                "description" => self.description = value,
                _ => {}
            }
        }
        Ok(())
    }

    /// Fetch the changelog behind `notes_url`; failures degrade to an empty
    /// string.
    pub async fn notes(&self, client: &CatalogClient) -> String {
        match client.fetch_string(&self.notes_url).await {
            Ok(text) => text,
            Err(e) => {
                log::debug!("Failed to fetch notes for {}: {:#}", self.id, e);
                String::new()
            }
        }
    }

    pub fn last_update_time(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.last_update)
            .single()
            .unwrap_or_else(Utc::now)
    }

    /// Filename the module zip is saved under, with characters hostile to
    /// shells and filesystems replaced or dropped.
    pub fn download_filename(&self) -> String {
        let raw = format!("{}-{}({}).zip", self.name, self.version, self.version_code);
        raw.chars()
            .filter_map(|c| match c {
                ' ' | '/' | '\\' => Some('_'),
                '\'' | '"' | '$' | '`' | '*' | '#' | '@' => None,
                other => Some(other),
            })
            .collect()
    }
}

/// Self-update descriptor a module may publish via its `updateJson` URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleUpdateInfo {
    pub version: String,
    pub version_code: i64,
    pub zip_url: String,
    #[serde(default)]
    pub changelog: String,
}
