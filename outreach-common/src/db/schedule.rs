//! Persisted dispatch schedule
//!
//! The dispatch stage writes the full batch schedule BEFORE sending the
//! first email, then marks entries as they go out. A resumed run reads
//! the pending entries back and never recomputes timestamps, so a crash
//! mid-batch cannot double-send or reshuffle the plan.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::{Error, Result};

/// One scheduled send
#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    pub id: i64,
    pub batch_id: String,
    pub channel_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

fn entry_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ScheduleEntry> {
    let scheduled_at: String = row.get("scheduled_at");
    let sent_at: Option<String> = row.get("sent_at");

    let parse = |raw: &str| {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Error::Internal(format!("Failed to parse schedule timestamp: {}", e)))
    };

    Ok(ScheduleEntry {
        id: row.get("id"),
        batch_id: row.get("batch_id"),
        channel_id: row.get("channel_id"),
        scheduled_at: parse(&scheduled_at)?,
        sent_at: sent_at.as_deref().map(parse).transpose()?,
    })
}

/// Persist a new batch. All entries are written in one transaction so a
/// partially stored schedule can never exist.
pub async fn insert_batch(
    pool: &SqlitePool,
    batch_id: &str,
    entries: &[(String, DateTime<Utc>)],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    for (channel_id, scheduled_at) in entries {
        sqlx::query(
            "INSERT INTO dispatch_schedule (batch_id, channel_id, scheduled_at) VALUES (?, ?, ?)",
        )
        .bind(batch_id)
        .bind(channel_id)
        .bind(scheduled_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// All entries not yet sent, in scheduled order
pub async fn pending(pool: &SqlitePool) -> Result<Vec<ScheduleEntry>> {
    let rows = sqlx::query(
        "SELECT id, batch_id, channel_id, scheduled_at, sent_at \
         FROM dispatch_schedule WHERE sent_at IS NULL ORDER BY scheduled_at ASC",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(entry_from_row).collect()
}

/// All entries of the most recent batch, for `dispatch --show`
pub async fn latest_batch(pool: &SqlitePool) -> Result<Vec<ScheduleEntry>> {
    let rows = sqlx::query(
        "SELECT id, batch_id, channel_id, scheduled_at, sent_at \
         FROM dispatch_schedule \
         WHERE batch_id = (SELECT batch_id FROM dispatch_schedule \
                           ORDER BY created_at DESC, id DESC LIMIT 1) \
         ORDER BY scheduled_at ASC",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(entry_from_row).collect()
}

/// Mark one entry as sent
pub async fn mark_sent(pool: &SqlitePool, entry_id: i64, sent_at: DateTime<Utc>) -> Result<()> {
    let result = sqlx::query("UPDATE dispatch_schedule SET sent_at = ? WHERE id = ?")
        .bind(sent_at.to_rfc3339())
        .bind(entry_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("schedule entry {}", entry_id)));
    }

    Ok(())
}

/// Drop pending entries for a lead that is no longer dispatchable
/// (replied, unsubscribed, deleted by the operator)
pub async fn cancel_pending_for(pool: &SqlitePool, channel_id: &str) -> Result<u64> {
    let result =
        sqlx::query("DELETE FROM dispatch_schedule WHERE channel_id = ? AND sent_at IS NULL")
            .bind(channel_id)
            .execute(pool)
            .await?;

    Ok(result.rows_affected())
}
