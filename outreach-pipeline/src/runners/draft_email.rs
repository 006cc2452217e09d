//! Draft stage
//!
//! Writes the personalized initial email for every lead with an approved
//! asset. Drafts land in `drafted` for operator review; nothing is sent
//! from here.

use outreach_common::config::OutreachConfig;
use outreach_common::db::leads;
use outreach_common::models::LeadStatus;
use outreach_common::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::services::drafter::{self, Drafter};

/// Draft run totals
#[derive(Debug, Default)]
pub struct DraftSummary {
    pub drafted: usize,
    pub fallbacks: usize,
    pub skipped: usize,
}

/// Run the draft stage over asset-approved and uploaded leads
pub async fn run<D: Drafter>(
    pool: &SqlitePool,
    _config: &OutreachConfig,
    drafter: &D,
) -> Result<DraftSummary> {
    let mut summary = DraftSummary::default();

    let mut batch = leads::get_by_status(pool, LeadStatus::AssetApproved, None).await?;
    batch.extend(leads::get_by_status(pool, LeadStatus::Uploaded, None).await?);

    for mut lead in batch {
        if lead.player_url.is_none() && lead.hosted_url.is_none() {
            warn!(channel_id = %lead.channel_id, "No shareable asset URL; skipping draft");
            leads::record_error(pool, &lead.channel_id, "no asset URL to link in the email")
                .await?;
            summary.skipped += 1;
            continue;
        }

        let draft = match drafter.draft(&lead).await {
            Ok(draft) => {
                lead.last_error = None;
                draft
            }
            Err(e) => {
                // The template keeps the batch moving; the error note tells
                // the reviewer this draft was not personalized
                warn!(channel_id = %lead.channel_id, error = %e, "Drafting failed; using template");
                lead.last_error = Some(format!("draft fell back to template: {}", e));
                summary.fallbacks += 1;
                drafter::fallback_draft(&lead)
            }
        };

        lead.draft_email = Some(draft);
        lead.status.validate_transition(LeadStatus::Drafted)?;
        lead.status = LeadStatus::Drafted;
        leads::save(pool, &lead).await?;
        info!(channel_id = %lead.channel_id, "Draft ready for review");
        summary.drafted += 1;
    }

    info!(
        drafted = summary.drafted,
        fallbacks = summary.fallbacks,
        skipped = summary.skipped,
        "Draft stage complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::drafter::mock::MockDrafter;
    use chrono::Utc;
    use outreach_common::db::init_store;
    use outreach_common::models::Lead;
    use tempfile::TempDir;

    async fn seeded(player_url: Option<&str>) -> (TempDir, SqlitePool) {
        let dir = TempDir::new().unwrap();
        let pool = init_store(&dir.path().join("test.db")).await.unwrap();

        let mut lead = Lead::harvested("UC001", "Math Channel", Utc::now());
        leads::insert_harvested(&pool, &lead).await.unwrap();
        lead.player_url = player_url.map(|s| s.to_string());
        lead.status = LeadStatus::AssetApproved;
        leads::save(&pool, &lead).await.unwrap();

        (dir, pool)
    }

    #[tokio::test]
    async fn test_draft_moves_lead_to_drafted() {
        let (_dir, pool) = seeded(Some("https://player.example/v/abc")).await;

        let summary = run(&pool, &OutreachConfig::default(), &MockDrafter)
            .await
            .unwrap();
        assert_eq!(summary.drafted, 1);

        let lead = leads::get(&pool, "UC001").await.unwrap().unwrap();
        assert_eq!(lead.status, LeadStatus::Drafted);
        let draft = lead.draft_email.unwrap();
        assert!(draft.body.contains("https://player.example/v/abc"));
    }

    struct FailingDrafter;

    impl Drafter for FailingDrafter {
        async fn draft(
            &self,
            _lead: &outreach_common::models::Lead,
        ) -> std::result::Result<
            outreach_common::models::DraftEmail,
            crate::services::llm_client::LlmError,
        > {
            Err(crate::services::llm_client::LlmError::NetworkError(
                "connection refused".into(),
            ))
        }
    }

    #[tokio::test]
    async fn test_drafting_failure_falls_back_to_template() {
        let (_dir, pool) = seeded(Some("https://player.example/v/abc")).await;

        let summary = run(&pool, &OutreachConfig::default(), &FailingDrafter)
            .await
            .unwrap();
        assert_eq!(summary.drafted, 1);
        assert_eq!(summary.fallbacks, 1);

        let lead = leads::get(&pool, "UC001").await.unwrap().unwrap();
        assert_eq!(lead.status, LeadStatus::Drafted);
        let draft = lead.draft_email.unwrap();
        assert!(draft.body.contains("https://player.example/v/abc"));
        assert!(lead.last_error.unwrap().contains("template"));
    }

    #[tokio::test]
    async fn test_lead_without_asset_url_is_skipped() {
        let (_dir, pool) = seeded(None).await;

        let summary = run(&pool, &OutreachConfig::default(), &MockDrafter)
            .await
            .unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.drafted, 0);

        let lead = leads::get(&pool, "UC001").await.unwrap().unwrap();
        assert_eq!(lead.status, LeadStatus::AssetApproved);
        assert!(lead.last_error.is_some());
    }
}
