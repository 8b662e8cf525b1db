// Result Publisher - uploads job artifacts under `<category>/<job_id>/<filename>`

use crate::error::{AppError, Result};
use crate::port::BlobStore;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const TEXT_CONTENT_TYPE: &str = "text/plain";

/// Top-level storage folder for an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactCategory {
    /// Generated simulation inputs
    GeneratedInput,
    /// Simulation outputs
    Results,
}

impl ArtifactCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactCategory::GeneratedInput => "idf",
            ArtifactCategory::Results => "results",
        }
    }
}

/// Deterministic storage path of an artifact
pub fn storage_path(category: ArtifactCategory, job_id: &str, filename: &str) -> String {
    format!("{}/{}/{}", category.as_str(), job_id, filename)
}

/// Content type inferred from the file extension
pub fn content_type_for(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("png") => "image/png",
        Some("html") | Some("htm") => "text/html",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("sql") => "application/vnd.sqlite3",
        Some("idf") | Some("epw") | Some("err") | Some("txt") => TEXT_CONTENT_TYPE,
        _ => DEFAULT_CONTENT_TYPE,
    }
}

pub struct ResultPublisher {
    store: Arc<dyn BlobStore>,
}

impl ResultPublisher {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Upload a local file; a missing file is an error, never a silent skip
    pub async fn publish_file(
        &self,
        job_id: &str,
        local_path: &Path,
        category: ArtifactCategory,
    ) -> Result<String> {
        if !tokio::fs::try_exists(local_path).await.unwrap_or(false) {
            return Err(AppError::NotFound(format!(
                "artifact {} does not exist",
                local_path.display()
            )));
        }
        let filename = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                AppError::Validation(format!("artifact path {} has no file name", local_path.display()))
            })?;

        let bytes = tokio::fs::read(local_path).await?;
        let size = bytes.len();
        let path = storage_path(category, job_id, filename);
        let reference = self
            .store
            .upload(&path, bytes, content_type_for(filename))
            .await?;

        info!(job_id = %job_id, path = %path, size_bytes = size, "Uploaded artifact");
        Ok(reference)
    }

    /// Upload in-memory text as a file
    pub async fn publish_text(
        &self,
        job_id: &str,
        content: &str,
        filename: &str,
        category: ArtifactCategory,
    ) -> Result<String> {
        if filename.is_empty() || filename.contains('/') {
            return Err(AppError::Validation(format!(
                "invalid artifact file name '{}'",
                filename
            )));
        }
        let path = storage_path(category, job_id, filename);
        let reference = self
            .store
            .upload(&path, content.as_bytes().to_vec(), TEXT_CONTENT_TYPE)
            .await?;

        info!(job_id = %job_id, path = %path, size_bytes = content.len(), "Uploaded text artifact");
        Ok(reference)
    }
}
