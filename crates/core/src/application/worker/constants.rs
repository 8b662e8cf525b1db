// Worker constants (ADR: No magic values)
use std::time::Duration;

/// Sleep duration when no jobs are claimable
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Sleep duration after a store error before polling again (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Upper bound for one generation backend call
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(180);

/// Upper bound for one simulation run
pub const DEFAULT_SIMULATION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Upper bound for uploading all artifacts of one job
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(120);

/// Upper bound for one backend connectivity probe
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(20);

/// `processing` jobs untouched for this long are treated as orphaned (30 minutes)
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(30 * 60);

/// How often a running job's `updated_at` is refreshed (1 minute)
///
/// Must stay well below the stale threshold of every process sharing the store.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// File name of the generated input inside the job work dir and in storage
pub const GENERATED_IDF_FILE_NAME: &str = "in.idf";
