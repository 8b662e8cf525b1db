// Local filesystem BlobStore
// Objects land under a root directory with a JSON sidecar describing them

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use smarthvac_core::error::{AppError, Result};
use smarthvac_core::port::BlobStore;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

const META_SUFFIX: &str = ".meta.json";

/// Sidecar written next to every stored object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMetadata {
    pub content_type: String,
    pub size_bytes: u64,
    pub uploaded_at: String, // RFC 3339
}

/// Stores `<root>/<path>` and returns `<path>` as the reference
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a storage path, refusing anything that escapes the root
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let well_formed = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !well_formed {
            return Err(AppError::Validation(format!(
                "invalid storage path '{}'",
                path
            )));
        }
        Ok(self.root.join(relative))
    }

    pub async fn metadata(&self, path: &str) -> Result<Option<BlobMetadata>> {
        let meta_path = sidecar_path(&self.resolve(path)?);
        match tokio::fs::read(&meta_path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn sidecar_path(object: &Path) -> PathBuf {
    let mut name = object.as_os_str().to_os_string();
    name.push(META_SUFFIX);
    PathBuf::from(name)
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let metadata = BlobMetadata {
            content_type: content_type.to_string(),
            size_bytes: bytes.len() as u64,
            uploaded_at: chrono::Utc::now().to_rfc3339(),
        };

        tokio::fs::write(&target, &bytes).await?;
        tokio::fs::write(sidecar_path(&target), serde_json::to_vec_pretty(&metadata)?).await?;

        debug!(path = %path, target = %target.display(), size_bytes = bytes.len(), "Blob stored");
        Ok(path.to_string())
    }
}
