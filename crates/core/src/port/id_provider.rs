// ID Provider Port (for deterministic testing)

use crate::port::TimeProvider;
use std::sync::Arc;

/// ID provider interface (allows deterministic IDs in tests)
pub trait IdProvider: Send + Sync {
    /// Generate a new unique job ID
    fn generate_id(&self) -> String;
}

/// `job_YYYYMMDD_HHMMSS_<8 hex>` IDs (production)
///
/// The timestamp prefix keeps IDs readable in the storage bucket; the random
/// suffix keeps two submissions within the same second apart.
pub struct JobIdProvider {
    time_provider: Arc<dyn TimeProvider>,
}

impl JobIdProvider {
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self { time_provider }
    }
}

impl IdProvider for JobIdProvider {
    fn generate_id(&self) -> String {
        let now = chrono::DateTime::from_timestamp_millis(self.time_provider.now_millis())
            .unwrap_or_default();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("job_{}_{}", now.format("%Y%m%d_%H%M%S"), &suffix[..8])
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// `<prefix>-1`, `<prefix>-2`, ...
    pub struct SequentialIdProvider {
        prefix: String,
        next: AtomicU64,
    }

    impl SequentialIdProvider {
        pub fn new(prefix: impl Into<String>) -> Self {
            Self {
                prefix: prefix.into(),
                next: AtomicU64::new(1),
            }
        }
    }

    impl IdProvider for SequentialIdProvider {
        fn generate_id(&self) -> String {
            format!("{}-{}", self.prefix, self.next.fetch_add(1, Ordering::SeqCst))
        }
    }
}
