//! Upload stage (optional)
//!
//! Publishes the operator-selected render to a hosting channel so the
//! outreach email can link a branded page instead of raw storage. Leads
//! skip this stage entirely when no upload endpoint is configured; the
//! draft stage accepts either URL.

use chrono::Utc;
use outreach_common::config::OutreachConfig;
use outreach_common::db::leads;
use outreach_common::models::LeadStatus;
use outreach_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::services::upload_client::{UploadClient, UploadError};

/// Upload run totals
#[derive(Debug, Default)]
pub struct UploadSummary {
    pub uploaded: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Run the upload stage over asset-approved leads
pub async fn run(pool: &SqlitePool, config: &OutreachConfig) -> Result<UploadSummary> {
    config.require_upload()?;
    let client = UploadClient::new(
        config.upload.endpoint.clone().unwrap_or_default(),
        config.upload.channels.clone(),
        config.upload.daily_limit,
    )
    .map_err(|e| Error::External(e.to_string()))?;

    let mut summary = UploadSummary::default();

    for mut lead in leads::get_by_status(pool, LeadStatus::AssetApproved, None).await? {
        // The selected candidate is the one whose player URL the operator
        // picked
        let raw_url = lead
            .candidates
            .iter()
            .find(|c| c.player_url.is_some() && c.player_url == lead.player_url)
            .and_then(|c| c.raw_url.clone());

        let Some(raw_url) = raw_url else {
            warn!(channel_id = %lead.channel_id, "No selected render to upload; skipping");
            summary.skipped += 1;
            continue;
        };

        let now = Utc::now();
        let channel = match client.next_channel(pool, now).await {
            Ok(channel) => channel,
            Err(UploadError::AllChannelsExhausted) => {
                info!("Daily upload allowance spent; stopping");
                break;
            }
            Err(e) => return Err(Error::External(e.to_string())),
        };

        let title = format!("A custom animation for {}", lead.channel_name);
        let description = lead
            .source_video
            .as_ref()
            .map(|v| format!("Based on \"{}\"", v.title))
            .unwrap_or_default();

        match client
            .publish(pool, channel, &raw_url, &title, &description, now)
            .await
        {
            Ok(hosted_url) => {
                lead.hosted_url = Some(hosted_url);
                lead.status.validate_transition(LeadStatus::Uploaded)?;
                lead.status = LeadStatus::Uploaded;
                lead.last_error = None;
                leads::save(pool, &lead).await?;
                summary.uploaded += 1;
            }
            Err(e) => {
                warn!(channel_id = %lead.channel_id, error = %e, "Upload failed");
                leads::record_error(pool, &lead.channel_id, &e.to_string()).await?;
                summary.errors += 1;
            }
        }
    }

    info!(
        uploaded = summary.uploaded,
        skipped = summary.skipped,
        errors = summary.errors,
        "Upload stage complete"
    );
    Ok(summary)
}
