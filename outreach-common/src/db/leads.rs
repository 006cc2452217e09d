//! Lead persistence
//!
//! Nested structures (metrics, score breakdown, classification, render
//! candidates, email thread) live as JSON in TEXT columns. Status changes
//! go through [`update_status`] which validates against the transition
//! table; `force` exists for operator overrides only.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::models::{Lead, LeadStatus};
use crate::{Error, Result};

fn to_json<T: Serialize>(value: &T, what: &str) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| Error::Internal(format!("Failed to serialize {}: {}", what, e)))
}

fn from_json<T: DeserializeOwned>(raw: &str, what: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| Error::Internal(format!("Failed to deserialize {}: {}", what, e)))
}

fn opt_json<T: DeserializeOwned>(raw: Option<String>, what: &str) -> Result<Option<T>> {
    raw.map(|s| from_json(&s, what)).transpose()
}

fn parse_timestamp(raw: &str, what: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", what, e)))
}

fn lead_from_row(row: &SqliteRow) -> Result<Lead> {
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");
    let reached_out_at: Option<String> = row.get("reached_out_at");
    let next_followup_at: Option<String> = row.get("next_followup_at");

    Ok(Lead {
        channel_id: row.get("channel_id"),
        channel_name: row.get("channel_name"),
        creator_name: row.get("creator_name"),
        email: row.get("email"),
        channel_url: row.get("channel_url"),
        channel_description: row.get("channel_description"),
        source_video: opt_json(row.get("source_video"), "source_video")?,
        keyword_source: row.get("keyword_source"),
        metrics: from_json(&row.get::<String, _>("metrics"), "metrics")?,
        score: row.get("score"),
        score_breakdown: from_json(&row.get::<String, _>("score_breakdown"), "score_breakdown")?,
        classification: opt_json(row.get("classification"), "classification")?,
        disqualify_reason: row.get("disqualify_reason"),
        needs_review: row.get::<i64, _>("needs_review") != 0,
        candidates: from_json(&row.get::<String, _>("candidates"), "candidates")?,
        player_url: row.get("player_url"),
        hosted_url: row.get("hosted_url"),
        draft_email: opt_json(row.get("draft_email"), "draft_email")?,
        sent_email: opt_json(row.get("sent_email"), "sent_email")?,
        reached_out_at: reached_out_at
            .map(|s| parse_timestamp(&s, "reached_out_at"))
            .transpose()?,
        next_followup_at: next_followup_at
            .map(|s| parse_timestamp(&s, "next_followup_at"))
            .transpose()?,
        followup_count: row.get::<i64, _>("followup_count") as u32,
        followup_thread: from_json(&row.get::<String, _>("followup_thread"), "followup_thread")?,
        conversation_history: from_json(
            &row.get::<String, _>("conversation_history"),
            "conversation_history",
        )?,
        notes: row.get("notes"),
        last_error: row.get("last_error"),
        status: LeadStatus::parse(&status)?,
        created_at: parse_timestamp(&created_at, "created_at")?,
        updated_at: parse_timestamp(&updated_at, "updated_at")?,
    })
}

const LEAD_COLUMNS: &str = "channel_id, channel_name, creator_name, email, channel_url, \
     channel_description, source_video, keyword_source, metrics, score, score_breakdown, \
     classification, disqualify_reason, needs_review, candidates, player_url, hosted_url, \
     draft_email, sent_email, reached_out_at, next_followup_at, followup_count, \
     followup_thread, conversation_history, notes, last_error, status, created_at, updated_at";

/// Insert a freshly harvested lead.
///
/// Returns false when the channel is already known; an existing lead is
/// never touched, so re-harvesting a keyword cannot regress a lead that
/// has moved past `harvested`.
pub async fn insert_harvested(pool: &SqlitePool, lead: &Lead) -> Result<bool> {
    let source_video = lead
        .source_video
        .as_ref()
        .map(|v| to_json(v, "source_video"))
        .transpose()?;
    let metrics = to_json(&lead.metrics, "metrics")?;

    let result = sqlx::query(
        r#"
        INSERT INTO leads (
            channel_id, channel_name, channel_url, channel_description,
            source_video, keyword_source, metrics, email,
            status, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(channel_id) DO NOTHING
        "#,
    )
    .bind(&lead.channel_id)
    .bind(&lead.channel_name)
    .bind(&lead.channel_url)
    .bind(&lead.channel_description)
    .bind(&source_video)
    .bind(&lead.keyword_source)
    .bind(&metrics)
    .bind(&lead.email)
    .bind(lead.status.as_str())
    .bind(lead.created_at.to_rfc3339())
    .bind(lead.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Load a lead by channel identifier
pub async fn get(pool: &SqlitePool, channel_id: &str) -> Result<Option<Lead>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM leads WHERE channel_id = ?",
        LEAD_COLUMNS
    ))
    .bind(channel_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(lead_from_row).transpose()
}

/// Load a lead, erroring when the channel is unknown
pub async fn get_required(pool: &SqlitePool, channel_id: &str) -> Result<Lead> {
    get(pool, channel_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("lead {}", channel_id)))
}

/// Load all leads in a status, oldest first
pub async fn get_by_status(
    pool: &SqlitePool,
    status: LeadStatus,
    limit: Option<i64>,
) -> Result<Vec<Lead>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM leads WHERE status = ? ORDER BY created_at ASC LIMIT ?",
        LEAD_COLUMNS
    ))
    .bind(status.as_str())
    .bind(limit.unwrap_or(-1))
    .fetch_all(pool)
    .await?;

    rows.iter().map(lead_from_row).collect()
}

/// Leads the refine stage should process: harvested and not flagged for
/// manual review
pub async fn get_refinable(pool: &SqlitePool, limit: Option<i64>) -> Result<Vec<Lead>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM leads WHERE status = 'harvested' AND needs_review = 0 \
         ORDER BY created_at ASC LIMIT ?",
        LEAD_COLUMNS
    ))
    .bind(limit.unwrap_or(-1))
    .fetch_all(pool)
    .await?;

    rows.iter().map(lead_from_row).collect()
}

/// Leads the follow-up engine should examine: contacted, not terminal
pub async fn get_contacted(pool: &SqlitePool) -> Result<Vec<Lead>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM leads \
         WHERE status IN ('sent', 'followup_1', 'followup_2', 'followup_3', 'followup_4') \
         ORDER BY reached_out_at ASC",
        LEAD_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(lead_from_row).collect()
}

/// Persist every mutable column of a loaded lead.
///
/// The status column is written as-is; callers changing status must have
/// validated the transition (or gone through [`update_status`]).
pub async fn save(pool: &SqlitePool, lead: &Lead) -> Result<()> {
    let source_video = lead
        .source_video
        .as_ref()
        .map(|v| to_json(v, "source_video"))
        .transpose()?;
    let metrics = to_json(&lead.metrics, "metrics")?;
    let score_breakdown = to_json(&lead.score_breakdown, "score_breakdown")?;
    let classification = lead
        .classification
        .as_ref()
        .map(|c| to_json(c, "classification"))
        .transpose()?;
    let candidates = to_json(&lead.candidates, "candidates")?;
    let draft_email = lead
        .draft_email
        .as_ref()
        .map(|d| to_json(d, "draft_email"))
        .transpose()?;
    let sent_email = lead
        .sent_email
        .as_ref()
        .map(|s| to_json(s, "sent_email"))
        .transpose()?;
    let followup_thread = to_json(&lead.followup_thread, "followup_thread")?;
    let conversation_history = to_json(&lead.conversation_history, "conversation_history")?;

    let result = sqlx::query(
        r#"
        UPDATE leads SET
            channel_name = ?, creator_name = ?, email = ?, channel_url = ?,
            channel_description = ?, source_video = ?, keyword_source = ?,
            metrics = ?, score = ?, score_breakdown = ?, classification = ?,
            disqualify_reason = ?, needs_review = ?, candidates = ?,
            player_url = ?, hosted_url = ?, draft_email = ?, sent_email = ?,
            reached_out_at = ?, next_followup_at = ?, followup_count = ?,
            followup_thread = ?, conversation_history = ?, notes = ?,
            last_error = ?, status = ?, updated_at = ?
        WHERE channel_id = ?
        "#,
    )
    .bind(&lead.channel_name)
    .bind(&lead.creator_name)
    .bind(&lead.email)
    .bind(&lead.channel_url)
    .bind(&lead.channel_description)
    .bind(&source_video)
    .bind(&lead.keyword_source)
    .bind(&metrics)
    .bind(lead.score)
    .bind(&score_breakdown)
    .bind(&classification)
    .bind(&lead.disqualify_reason)
    .bind(lead.needs_review as i64)
    .bind(&candidates)
    .bind(&lead.player_url)
    .bind(&lead.hosted_url)
    .bind(&draft_email)
    .bind(&sent_email)
    .bind(lead.reached_out_at.map(|dt| dt.to_rfc3339()))
    .bind(lead.next_followup_at.map(|dt| dt.to_rfc3339()))
    .bind(lead.followup_count as i64)
    .bind(&followup_thread)
    .bind(&conversation_history)
    .bind(&lead.notes)
    .bind(&lead.last_error)
    .bind(lead.status.as_str())
    .bind(Utc::now().to_rfc3339())
    .bind(&lead.channel_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("lead {}", lead.channel_id)));
    }

    Ok(())
}

/// Change a lead's status, validating against the transition table.
///
/// `force` bypasses validation for operator overrides.
pub async fn update_status(
    pool: &SqlitePool,
    channel_id: &str,
    to: LeadStatus,
    force: bool,
) -> Result<()> {
    let lead = get_required(pool, channel_id).await?;

    if !force {
        lead.status.validate_transition(to)?;
    }

    sqlx::query("UPDATE leads SET status = ?, updated_at = ? WHERE channel_id = ?")
        .bind(to.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(channel_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Record a per-lead stage failure without changing status
pub async fn record_error(pool: &SqlitePool, channel_id: &str, message: &str) -> Result<()> {
    sqlx::query("UPDATE leads SET last_error = ?, updated_at = ? WHERE channel_id = ?")
        .bind(message)
        .bind(Utc::now().to_rfc3339())
        .bind(channel_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Append a timestamped operator note
pub async fn add_note(pool: &SqlitePool, channel_id: &str, note: &str) -> Result<()> {
    let mut lead = get_required(pool, channel_id).await?;

    if !lead.notes.is_empty() {
        lead.notes.push('\n');
    }
    lead.notes
        .push_str(&format!("[{}] {}", Utc::now().format("%Y-%m-%d %H:%M"), note));

    save(pool, &lead).await
}

/// Delete a lead (schedule entries cascade)
pub async fn delete(pool: &SqlitePool, channel_id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM leads WHERE channel_id = ?")
        .bind(channel_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("lead {}", channel_id)));
    }

    Ok(())
}

/// Lead counts per status, in stage order
pub async fn status_counts(pool: &SqlitePool) -> Result<Vec<(LeadStatus, i64)>> {
    let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM leads GROUP BY status")
        .fetch_all(pool)
        .await?;

    let mut counts = Vec::new();
    for status in LeadStatus::ALL {
        if let Some(row) = rows
            .iter()
            .find(|r| r.get::<String, _>("status") == status.as_str())
        {
            counts.push((status, row.get::<i64, _>("n")));
        }
    }

    Ok(counts)
}

/// Case-insensitive substring search over name, email, and description
pub async fn search(pool: &SqlitePool, query: &str) -> Result<Vec<Lead>> {
    let pattern = format!("%{}%", query);
    let rows = sqlx::query(&format!(
        "SELECT {} FROM leads \
         WHERE channel_name LIKE ? COLLATE NOCASE \
            OR email LIKE ? COLLATE NOCASE \
            OR channel_description LIKE ? COLLATE NOCASE \
         ORDER BY created_at ASC",
        LEAD_COLUMNS
    ))
    .bind(&pattern)
    .bind(&pattern)
    .bind(&pattern)
    .fetch_all(pool)
    .await?;

    rows.iter().map(lead_from_row).collect()
}
