//! Database initialization
//!
//! Creates the SQLite database on first run and applies the schema
//! idempotently on every start.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Busy timeout applied to every connection
const BUSY_TIMEOUT_MS: i64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    // WAL lets readers proceed while the single writer appends
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query(&format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT_MS))
        .execute(&pool)
        .await?;

    create_schema_version_table(&pool).await?;
    create_settings_table(&pool).await?;
    create_score_records_table(&pool).await?;
    create_score_audit_table(&pool).await?;
    create_write_once_triggers(&pool).await?;

    Ok(pool)
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (1)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores application key-value pairs (e.g. `api_shared_secret`).
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// One row per recorded pitch; `pitch_id` is the write-once key
async fn create_score_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS score_records (
            pitch_id TEXT PRIMARY KEY,
            overall_score INTEGER NOT NULL CHECK (overall_score > 0),
            clarity_score INTEGER NOT NULL,
            originality_score INTEGER NOT NULL,
            team_strength_score INTEGER NOT NULL,
            market_fit_score INTEGER NOT NULL,
            proof_reference TEXT NOT NULL,
            recorded_at TEXT NOT NULL,
            recorded_by TEXT NOT NULL,
            sequence INTEGER NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Hash-chained notification log, one entry per successful write
async fn create_score_audit_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS score_audit (
            sequence INTEGER PRIMARY KEY,
            pitch_id TEXT NOT NULL UNIQUE REFERENCES score_records(pitch_id),
            payload TEXT NOT NULL,
            record_digest TEXT NOT NULL,
            prev_hash TEXT,
            entry_hash TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Reject UPDATE and DELETE on the record and audit tables
async fn create_write_once_triggers(pool: &SqlitePool) -> Result<()> {
    for table in ["score_records", "score_audit"] {
        for action in ["UPDATE", "DELETE"] {
            let sql = format!(
                r#"
                CREATE TRIGGER IF NOT EXISTS {table}_no_{lower}
                BEFORE {action} ON {table}
                BEGIN
                    SELECT RAISE(ABORT, '{table} is write-once');
                END
                "#,
                table = table,
                action = action,
                lower = action.to_lowercase(),
            );
            sqlx::query(&sql).execute(pool).await?;
        }
    }

    Ok(())
}
