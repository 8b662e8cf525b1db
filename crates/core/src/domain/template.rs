// Base Template - loaded once at startup, shared read-only by every job

use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct BaseTemplate {
    content: Arc<str>,
    source: Option<PathBuf>,
}

impl BaseTemplate {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: Arc::from(content.into()),
            source: None,
        }
    }

    /// Read the template file. A missing or unreadable file is a configuration error.
    pub fn load(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::AppError::Configuration(format!(
                "base template {} unreadable: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self {
            content: Arc::from(content),
            source: Some(path.to_path_buf()),
        })
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}
