// Schema migrations for the job queue

use smarthvac_core::error::{AppError, Result};
use sqlx::SqlitePool;
use tracing::info;

/// Ordered schema steps; a version is applied once and recorded in `schema_version`
const MIGRATIONS: &[(i64, &str, &str)] = &[(
    1,
    "jobs queue",
    include_str!("../migrations/001_initial_schema.sql"),
)];

/// Bring the database up to the latest schema version
///
/// Safe to call on every startup, from the daemon and the CLI alike.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await
    .map_err(migration_error)?;

    for &(version, name, sql) in MIGRATIONS {
        let mut tx = pool.begin().await.map_err(migration_error)?;

        let current: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
            .fetch_one(&mut *tx)
            .await
            .map_err(migration_error)?;
        if current >= version {
            continue;
        }

        info!(version, name, "Applying schema migration");
        sqlx::raw_sql(sql)
            .execute(&mut *tx)
            .await
            .map_err(migration_error)?;
        sqlx::query(
            "INSERT INTO schema_version (version, applied_at)
             VALUES (?, CAST(strftime('%s', 'now') AS INTEGER) * 1000)",
        )
        .bind(version)
        .execute(&mut *tx)
        .await
        .map_err(migration_error)?;

        tx.commit().await.map_err(migration_error)?;
    }

    Ok(())
}

fn migration_error(err: sqlx::Error) -> AppError {
    AppError::Database(format!("schema migration failed: {}", err))
}
