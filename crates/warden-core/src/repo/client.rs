use crate::repo::types::{ModuleUpdateInfo, RepoIndex};
use anyhow::{Context, Result};
use url::Url;

/// HTTP client for the remote module catalog and everything it links to.
pub struct CatalogClient {
    http: reqwest::Client,
    index_url: Url,
}

impl CatalogClient {
    pub fn new(index_url: &str) -> Result<Self> {
        let index_url = Url::parse(index_url).context("Invalid catalog index URL")?;

        // Timeout keeps a dead mirror from hanging a whole sync pass.
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { http, index_url })
    }

    pub fn index_url(&self) -> &Url {
        &self.index_url
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Fetch and parse the catalog index.
    pub async fn fetch_index(&self) -> Result<RepoIndex> {
        let response = self
            .http
            .get(self.index_url.clone())
            .send()
            .await
            .context("Failed to GET catalog index")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {} from catalog index", status);
        }

        response
            .json::<RepoIndex>()
            .await
            .context("Failed to parse catalog index JSON")
    }

    /// Fetch a URL as raw text (module descriptors, changelogs).
    pub async fn fetch_string(&self, url: &str) -> Result<String> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to GET {}", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {} from {}", status, url);
        }

        response
            .text()
            .await
            .with_context(|| format!("Failed to read body of {}", url))
    }

    /// Fetch and parse a module's self-update descriptor.
    pub async fn fetch_update_info(&self, url: &str) -> Result<ModuleUpdateInfo> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to GET {}", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {} from {}", status, url);
        }

        response
            .json::<ModuleUpdateInfo>()
            .await
            .with_context(|| format!("Failed to parse update JSON from {}", url))
    }
}
