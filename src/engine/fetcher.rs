// Artifact acquisition: cache probe, download-URL resolution, blob fetch,
// and persistence, strictly in that order.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::Result;
use crate::model::FileUrl;
use crate::remote::traits::{BlobClient, CatalogClient};

use super::resolver::interpret_payload;
use super::store::ArtifactStore;

/// Outcome of materializing one artifact. `NoMesh` is a silent skip, not
/// an error; the item simply has nothing to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Already present in the store; no network call was made.
    CacheHit(PathBuf),
    /// Freshly downloaded and persisted.
    Fetched(PathBuf),
    /// Blank mesh reference and nothing cached.
    NoMesh,
}

pub struct ArtifactFetcher {
    catalog: Arc<dyn CatalogClient>,
    blob: Arc<dyn BlobClient>,
    store: Arc<ArtifactStore>,
}

impl ArtifactFetcher {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        blob: Arc<dyn BlobClient>,
        store: Arc<ArtifactStore>,
    ) -> Self {
        Self {
            catalog,
            blob,
            store,
        }
    }

    /// Materialize the artifact for `mesh_link` at its canonical `path`.
    ///
    /// A store hit short-circuits the network entirely. No automatic retry:
    /// a failed fetch or write needs a fresh caller-initiated request.
    pub async fn materialize(&self, mesh_link: &str, path: &Path) -> Result<FetchOutcome> {
        if self.store.exists(path) {
            debug!("cache hit for {}", path.display());
            return Ok(FetchOutcome::CacheHit(path.to_path_buf()));
        }

        if mesh_link.trim().is_empty() {
            debug!("no mesh link for {}; nothing to fetch", path.display());
            return Ok(FetchOutcome::NoMesh);
        }

        let url = self.resolve_download_url(mesh_link).await?;
        let data = self.blob.download(&url).await?;

        self.store.write(path, &data)?;
        self.store.refresh();

        info!("materialized {} ({} bytes)", path.display(), data.len());
        Ok(FetchOutcome::Fetched(path.to_path_buf()))
    }

    /// Exchange a mesh reference for a transient download URL.
    async fn resolve_download_url(&self, mesh_link: &str) -> Result<String> {
        let resp = self.catalog.download_url(mesh_link).await?;
        let body = interpret_payload(resp)?;
        let file_url: FileUrl = serde_json::from_str(&body)?;
        Ok(file_url.url)
    }
}
