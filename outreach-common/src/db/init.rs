//! Store initialization
//!
//! Creates the database file and schema on first run. All CREATE
//! statements are idempotent, so init is safe to call on every start.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open the lead store, creating the file and schema if needed
pub async fn init_store(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new lead store: {}", db_path.display());
    } else {
        info!("Opened lead store: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL lets the dispatch executor hold long sleeps while operator
    // commands read concurrently
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_leads_table(&pool).await?;
    create_dispatch_schedule_table(&pool).await?;
    create_keywords_table(&pool).await?;
    create_daily_quota_table(&pool).await?;

    Ok(pool)
}

async fn create_leads_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS leads (
            channel_id TEXT PRIMARY KEY,
            channel_name TEXT NOT NULL,
            creator_name TEXT,
            email TEXT,
            channel_url TEXT,
            channel_description TEXT,
            source_video TEXT,
            keyword_source TEXT,
            metrics TEXT NOT NULL DEFAULT '{}',
            score INTEGER,
            score_breakdown TEXT NOT NULL DEFAULT '[]',
            classification TEXT,
            disqualify_reason TEXT,
            needs_review INTEGER NOT NULL DEFAULT 0,
            candidates TEXT NOT NULL DEFAULT '[]',
            player_url TEXT,
            hosted_url TEXT,
            draft_email TEXT,
            sent_email TEXT,
            reached_out_at TEXT,
            next_followup_at TEXT,
            followup_count INTEGER NOT NULL DEFAULT 0,
            followup_thread TEXT NOT NULL DEFAULT '[]',
            conversation_history TEXT NOT NULL DEFAULT '[]',
            notes TEXT NOT NULL DEFAULT '',
            last_error TEXT,
            status TEXT NOT NULL DEFAULT 'harvested',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (followup_count >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_leads_status ON leads(status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_leads_next_followup ON leads(next_followup_at)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_dispatch_schedule_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dispatch_schedule (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            batch_id TEXT NOT NULL,
            channel_id TEXT NOT NULL REFERENCES leads(channel_id) ON DELETE CASCADE,
            scheduled_at TEXT NOT NULL,
            sent_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_dispatch_pending ON dispatch_schedule(sent_at, scheduled_at)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_dispatch_batch ON dispatch_schedule(batch_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_keywords_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS keywords (
            keyword TEXT PRIMARY KEY,
            added_at TEXT NOT NULL,
            last_harvested_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_daily_quota_table(pool: &SqlitePool) -> Result<()> {
    // Keyed by UTC calendar day, so quotas reset at midnight with no
    // cleanup job
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daily_quota (
            scope TEXT NOT NULL CHECK (scope IN ('sender', 'upload')),
            identity TEXT NOT NULL,
            day TEXT NOT NULL,
            used INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (scope, identity, day),
            CHECK (used >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
