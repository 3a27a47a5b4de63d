/// Streaming module zip download with integrity check
use crate::repo::client::CatalogClient;
use anyhow::{Context, Result};
use futures::StreamExt;
use sha1::{Digest, Sha1};
use std::path::Path;
use tokio::io::AsyncWriteExt;

impl CatalogClient {
    /// Download a module zip to `dest`, streaming chunks through a temp file
    /// that is only renamed into place once the body (and, when given, the
    /// SHA-1 checksum) checks out. A partial download never shadows an
    /// existing good file.
    pub async fn download_zip(
        &self,
        url: &str,
        dest: &Path,
        expected_sha1: Option<&str>,
    ) -> Result<()> {
        let parent = dest
            .parent()
            .context("Download destination has no parent directory")?;
        tokio::fs::create_dir_all(parent)
            .await
            .context("Failed to create download directory")?;

        let response = self
            .http()
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to GET {}", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {} from {}", status, url);
        }

        let tmp = tempfile::Builder::new()
            .prefix(".download-")
            .tempfile_in(parent)
            .context("Failed to create temp file for download")?;

        let mut file = tokio::fs::File::create(tmp.path())
            .await
            .context("Failed to open temp file for download")?;

        let mut hasher = Sha1::new();
        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.with_context(|| format!("Failed while streaming {}", url))?;
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .context("Failed to write download chunk")?;
            written += chunk.len() as u64;
        }
        file.flush().await.context("Failed to flush download")?;
        drop(file);

        if let Some(expected) = expected_sha1 {
            let actual = format!("{:x}", hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected) {
                anyhow::bail!(
                    "SHA-1 mismatch for {}: expected {}, got {}",
                    url,
                    expected,
                    actual
                );
            }
        }

        tmp.persist(dest).map_err(|e| {
            anyhow::anyhow!("Failed to move download into place at {:?}: {}", dest, e.error)
        })?;

        log::info!("Downloaded {} ({} bytes) to {:?}", url, written, dest);
        Ok(())
    }
}
