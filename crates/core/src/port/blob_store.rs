// Blob Storage Port

use crate::error::Result;
use async_trait::async_trait;

/// Durable blob storage
///
/// `upload` returns a stable reference a separate consumer (the requester UI)
/// can use to fetch the object later.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `path` with the given content type
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Object kept by the in-memory store
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct StoredObject {
        pub bytes: Vec<u8>,
        pub content_type: String,
    }

    /// In-memory blob store returning the path itself as reference
    #[derive(Default)]
    pub struct MemoryBlobStore {
        objects: Mutex<BTreeMap<String, StoredObject>>,
        fail_after: Mutex<Option<usize>>,
    }

    impl MemoryBlobStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn get(&self, path: &str) -> Option<StoredObject> {
            self.objects.lock().unwrap().get(path).cloned()
        }

        pub fn paths(&self) -> Vec<String> {
            self.objects.lock().unwrap().keys().cloned().collect()
        }

        pub fn upload_count(&self) -> usize {
            self.objects.lock().unwrap().len()
        }

        /// Reject every upload once `stored` objects are kept
        pub fn set_fail_after(&self, stored: usize) {
            *self.fail_after.lock().unwrap() = Some(stored);
        }
    }

    #[async_trait]
    impl BlobStore for MemoryBlobStore {
        async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
            let limit = *self.fail_after.lock().unwrap();
            let mut objects = self.objects.lock().unwrap();
            if limit.is_some_and(|n| objects.len() >= n) {
                return Err(AppError::Io(std::io::Error::other(format!(
                    "bucket rejected {}",
                    path
                ))));
            }
            objects.insert(
                path.to_string(),
                StoredObject {
                    bytes,
                    content_type: content_type.to_string(),
                },
            );
            Ok(path.to_string())
        }
    }
}
