//! Operator commands
//!
//! Everything the human in the loop does between stage runs: inspect
//! leads, approve them forward, pick a render candidate, fix an email
//! address, record replies, and maintain the keyword list.

use chrono::Utc;
use outreach_common::db::{keywords, leads, schedule};
use outreach_common::models::{ConversationEntry, Lead, LeadStatus};
use outreach_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::info;

fn print_row(lead: &Lead) {
    let review = if lead.needs_review { " [review]" } else { "" };
    println!(
        "{:<26} {:<22} {:<6} {}{}",
        lead.channel_id,
        lead.status,
        lead.score.map(|s| s.to_string()).unwrap_or_default(),
        lead.channel_name,
        review
    );
}

/// List leads, optionally filtered to one status
pub async fn list(pool: &SqlitePool, status: Option<LeadStatus>) -> Result<()> {
    let rows = match status {
        Some(status) => leads::get_by_status(pool, status, None).await?,
        None => {
            let mut all = Vec::new();
            for status in LeadStatus::ALL {
                all.extend(leads::get_by_status(pool, status, None).await?);
            }
            all
        }
    };

    for lead in &rows {
        print_row(lead);
    }
    println!("{} lead(s)", rows.len());
    Ok(())
}

/// Full dump of one lead
pub async fn show(pool: &SqlitePool, channel_id: &str) -> Result<()> {
    let lead = leads::get_required(pool, channel_id).await?;

    println!("channel:    {} ({})", lead.channel_name, lead.channel_id);
    println!("status:     {}", lead.status);
    if let Some(name) = &lead.creator_name {
        println!("creator:    {}", name);
    }
    if let Some(email) = &lead.email {
        println!("email:      {}", email);
    }
    if let Some(url) = &lead.channel_url {
        println!("url:        {}", url);
    }
    if let Some(keyword) = &lead.keyword_source {
        println!("keyword:    {}", keyword);
    }
    if let Some(score) = lead.score {
        println!("score:      {}", score);
        for delta in &lead.score_breakdown {
            match &delta.disqualify {
                Some(reason) => println!("  {:<18} DISQUALIFY: {}", delta.signal, reason),
                None => println!("  {:<18} {:+}", delta.signal, delta.points),
            }
        }
    }
    if let Some(reason) = &lead.disqualify_reason {
        println!("disqualified: {}", reason);
    }
    if lead.needs_review {
        println!("flagged for manual review");
    }
    for candidate in &lead.candidates {
        println!(
            "candidate {}: {} ({})",
            candidate.label,
            candidate.player_url.as_deref().unwrap_or("rendering..."),
            candidate.render_id
        );
    }
    if let Some(url) = &lead.player_url {
        println!("selected:   {}", url);
    }
    if let Some(url) = &lead.hosted_url {
        println!("hosted:     {}", url);
    }
    if let Some(draft) = &lead.draft_email {
        println!("--- draft ---\nSubject: {}\n{}", draft.subject, draft.body);
    }
    for entry in &lead.followup_thread {
        println!(
            "--- {} ({}) ---\nSubject: {}\n{}",
            entry.kind,
            entry.date.format("%Y-%m-%d"),
            entry.subject,
            entry.body
        );
    }
    for entry in &lead.conversation_history {
        println!(
            "[{} {}] {}",
            entry.date.format("%Y-%m-%d"),
            entry.direction,
            entry.content
        );
    }
    if !lead.notes.is_empty() {
        println!("notes:\n{}", lead.notes);
    }
    if let Some(error) = &lead.last_error {
        println!("last error: {}", error);
    }
    Ok(())
}

/// Pipeline funnel: lead counts per status
pub async fn stats(pool: &SqlitePool) -> Result<()> {
    let counts = leads::status_counts(pool).await?;
    let total: i64 = counts.iter().map(|(_, n)| n).sum();

    for (status, count) in &counts {
        println!("{:<22} {}", status.to_string(), count);
    }
    println!("{:<22} {}", "total", total);
    Ok(())
}

/// Substring search over names, emails, and descriptions
pub async fn search(pool: &SqlitePool, query: &str) -> Result<()> {
    let rows = leads::search(pool, query).await?;
    for lead in &rows {
        print_row(lead);
    }
    println!("{} match(es)", rows.len());
    Ok(())
}

/// Advance a lead past its current review gate: qualified leads to
/// approved, drafted leads to ready_to_send
pub async fn approve(pool: &SqlitePool, channel_id: &str) -> Result<()> {
    let lead = leads::get_required(pool, channel_id).await?;

    let next = match lead.status {
        LeadStatus::Qualified => LeadStatus::Approved,
        LeadStatus::Drafted => LeadStatus::ReadyToSend,
        LeadStatus::AssetPendingReview => {
            return Err(Error::InvalidInput(
                "pick a render first: `outreach manage select-asset <channel> <label>`".into(),
            ))
        }
        other => {
            return Err(Error::InvalidInput(format!(
                "nothing to approve from status {}",
                other
            )))
        }
    };

    leads::update_status(pool, channel_id, next, false).await?;
    info!(channel_id = %channel_id, to = %next, "Lead approved");
    Ok(())
}

/// Approve every lead currently sitting at the given review gate
pub async fn approve_all(pool: &SqlitePool, status: LeadStatus) -> Result<usize> {
    if !matches!(status, LeadStatus::Qualified | LeadStatus::Drafted) {
        return Err(Error::InvalidInput(format!(
            "bulk approval only applies to qualified or drafted, not {}",
            status
        )));
    }

    let batch = leads::get_by_status(pool, status, None).await?;
    for lead in &batch {
        approve(pool, &lead.channel_id).await?;
    }
    println!("approved {} lead(s)", batch.len());
    Ok(batch.len())
}

/// Select one of the candidate renders by label
pub async fn select_asset(pool: &SqlitePool, channel_id: &str, label: &str) -> Result<()> {
    let mut lead = leads::get_required(pool, channel_id).await?;

    if lead.status != LeadStatus::AssetPendingReview {
        return Err(Error::InvalidInput(format!(
            "lead is {}, not asset_pending_review",
            lead.status
        )));
    }

    let player_url = lead
        .candidates
        .iter()
        .find(|c| c.label.eq_ignore_ascii_case(label))
        .ok_or_else(|| Error::NotFound(format!("candidate {}", label)))?
        .player_url
        .clone()
        .ok_or_else(|| Error::InvalidInput(format!("candidate {} has no player URL yet", label)))?;

    lead.player_url = Some(player_url);
    lead.status.validate_transition(LeadStatus::AssetApproved)?;
    lead.status = LeadStatus::AssetApproved;
    leads::save(pool, &lead).await?;

    info!(channel_id = %channel_id, label = %label, "Render selected");
    Ok(())
}

/// Set or correct a lead's contact address
pub async fn set_email(pool: &SqlitePool, channel_id: &str, email: &str) -> Result<()> {
    if !email.contains('@') {
        return Err(Error::InvalidInput(format!("{} is not an email address", email)));
    }

    let mut lead = leads::get_required(pool, channel_id).await?;
    lead.email = Some(email.to_lowercase());
    leads::save(pool, &lead).await
}

/// Record an inbound reply: the lead leaves the follow-up rotation and
/// any still-pending scheduled sends are cancelled
pub async fn record_reply(pool: &SqlitePool, channel_id: &str, content: &str) -> Result<()> {
    let mut lead = leads::get_required(pool, channel_id).await?;

    lead.status.validate_transition(LeadStatus::Replied)?;
    lead.status = LeadStatus::Replied;
    lead.next_followup_at = None;
    lead.conversation_history.push(ConversationEntry {
        date: Utc::now(),
        direction: "inbound".to_string(),
        content: content.to_string(),
    });
    if let Some(last) = lead.followup_thread.last_mut() {
        last.response = Some(content.to_string());
    }
    leads::save(pool, &lead).await?;

    let cancelled = schedule::cancel_pending_for(pool, channel_id).await?;
    if cancelled > 0 {
        info!(channel_id = %channel_id, cancelled, "Pending sends cancelled");
    }
    info!(channel_id = %channel_id, "Reply recorded");
    Ok(())
}

/// Keyword list maintenance
pub async fn keyword_add(pool: &SqlitePool, keyword: &str) -> Result<()> {
    if keywords::add(pool, keyword).await? {
        println!("added: {}", keyword.trim().to_lowercase());
    } else {
        println!("already present: {}", keyword.trim().to_lowercase());
    }
    Ok(())
}

/// Print the stored keywords, stalest first
pub async fn keyword_list(pool: &SqlitePool) -> Result<()> {
    for keyword in keywords::list(pool).await? {
        let harvested = keyword
            .last_harvested_at
            .map(|at| at.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!("{:<40} last harvested: {}", keyword.keyword, harvested);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use outreach_common::db::init_store;
    use outreach_common::models::RenderCandidate;
    use tempfile::TempDir;

    async fn store_with_lead(status: LeadStatus) -> (TempDir, SqlitePool) {
        let dir = TempDir::new().unwrap();
        let pool = init_store(&dir.path().join("test.db")).await.unwrap();

        let mut lead = Lead::harvested("UC001", "Math Channel", Utc::now());
        leads::insert_harvested(&pool, &lead).await.unwrap();
        lead.status = status;
        leads::save(&pool, &lead).await.unwrap();
        (dir, pool)
    }

    #[tokio::test]
    async fn test_approve_respects_review_gates() {
        let (_dir, pool) = store_with_lead(LeadStatus::Qualified).await;
        approve(&pool, "UC001").await.unwrap();
        assert_eq!(
            leads::get(&pool, "UC001").await.unwrap().unwrap().status,
            LeadStatus::Approved
        );

        // Approved has no review gate
        assert!(approve(&pool, "UC001").await.is_err());
    }

    #[tokio::test]
    async fn test_select_asset_sets_player_url_and_advances() {
        let (_dir, pool) = store_with_lead(LeadStatus::AssetPendingReview).await;

        let mut lead = leads::get(&pool, "UC001").await.unwrap().unwrap();
        lead.candidates = vec![
            RenderCandidate {
                label: "A".into(),
                render_id: "r1".into(),
                raw_url: Some("https://cdn.example/r1.mp4".into()),
                player_url: Some("https://player.example/v/r1".into()),
                account: "acct1".into(),
            },
            RenderCandidate {
                label: "B".into(),
                render_id: "r2".into(),
                raw_url: Some("https://cdn.example/r2.mp4".into()),
                player_url: Some("https://player.example/v/r2".into()),
                account: "acct2".into(),
            },
        ];
        leads::save(&pool, &lead).await.unwrap();

        select_asset(&pool, "UC001", "b").await.unwrap();

        let lead = leads::get(&pool, "UC001").await.unwrap().unwrap();
        assert_eq!(lead.status, LeadStatus::AssetApproved);
        assert_eq!(lead.player_url.as_deref(), Some("https://player.example/v/r2"));

        assert!(select_asset(&pool, "UC001", "C").await.is_err());
    }

    #[tokio::test]
    async fn test_record_reply_cancels_pending_sends() {
        let (_dir, pool) = store_with_lead(LeadStatus::Sent).await;
        schedule::insert_batch(&pool, "b1", &[("UC001".to_string(), Utc::now())])
            .await
            .unwrap();

        record_reply(&pool, "UC001", "Love it, let's talk").await.unwrap();

        let lead = leads::get(&pool, "UC001").await.unwrap().unwrap();
        assert_eq!(lead.status, LeadStatus::Replied);
        assert!(lead.next_followup_at.is_none());
        assert_eq!(lead.conversation_history.len(), 1);
        assert!(schedule::pending(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reply_from_harvested_rejected() {
        let (_dir, pool) = store_with_lead(LeadStatus::Harvested).await;
        assert!(record_reply(&pool, "UC001", "hi").await.is_err());
    }
}
