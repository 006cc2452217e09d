//! Asset generation stage
//!
//! For each approved lead: pull the source video's audio, trim it, and
//! submit two render jobs under different accounts so the operator gets
//! two candidates to choose between. Job ids are persisted BEFORE
//! polling starts, so an interrupted run resumes the same jobs instead
//! of paying for new renders.

use std::path::PathBuf;
use std::time::Duration;

use outreach_common::config::{OutreachConfig, RenderAccount};
use outreach_common::db::leads;
use outreach_common::models::{Lead, LeadStatus, RenderCandidate};
use outreach_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::services::audio;
use crate::services::render_client::RenderClient;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30 * 60;
const DEFAULT_TRIM_SECS: u64 = 90;
const CANDIDATE_LABELS: [&str; 2] = ["A", "B"];

/// Asset stage totals
#[derive(Debug, Default)]
pub struct AssetSummary {
    pub submitted: usize,
    pub resumed: usize,
    pub completed: usize,
    pub errors: usize,
}

fn poll_interval(config: &OutreachConfig) -> Duration {
    Duration::from_secs(
        config
            .render
            .poll_interval_secs
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
    )
}

fn poll_timeout(config: &OutreachConfig) -> Duration {
    Duration::from_secs(
        config
            .render
            .poll_timeout_secs
            .unwrap_or(DEFAULT_POLL_TIMEOUT_SECS),
    )
}

fn account_for<'a>(config: &'a OutreachConfig, identity: &str) -> Result<&'a RenderAccount> {
    config
        .render
        .accounts
        .iter()
        .find(|a| a.identity == identity)
        .ok_or_else(|| Error::Config(format!("render account {} no longer configured", identity)))
}

/// Poll every unfinished candidate of a lead to completion and register
/// the player URLs. Moves the lead to asset_pending_review once all
/// candidates carry a player URL.
async fn complete_candidates(
    pool: &SqlitePool,
    config: &OutreachConfig,
    client: &RenderClient,
    lead: &mut Lead,
) -> Result<()> {
    let interval = poll_interval(config);
    let timeout = poll_timeout(config);

    for i in 0..lead.candidates.len() {
        if lead.candidates[i].raw_url.is_none() {
            let account = account_for(config, &lead.candidates[i].account)?;
            let raw_url = client
                .wait_for_job(account, &lead.candidates[i].render_id, interval, timeout)
                .await
                .map_err(|e| Error::External(e.to_string()))?;
            lead.candidates[i].raw_url = Some(raw_url);
            // Persist each completion so a crash between jobs loses nothing
            leads::save(pool, lead).await?;
        }

        if lead.candidates[i].player_url.is_none() {
            let title = format!(
                "Candidate {} for {}",
                lead.candidates[i].label, lead.channel_name
            );
            let player_url = client
                .register_player(&lead.candidates[i].render_id, &title)
                .await
                .map_err(|e| Error::External(e.to_string()))?;
            lead.candidates[i].player_url = Some(player_url);
            leads::save(pool, lead).await?;
        }
    }

    lead.status.validate_transition(LeadStatus::AssetPendingReview)?;
    lead.status = LeadStatus::AssetPendingReview;
    lead.last_error = None;
    leads::save(pool, lead).await?;

    info!(channel_id = %lead.channel_id, "Candidates ready for review");
    Ok(())
}

async fn submit_for(
    pool: &SqlitePool,
    config: &OutreachConfig,
    client: &RenderClient,
    lead: &mut Lead,
    audio_dir: &PathBuf,
) -> Result<()> {
    let video = lead
        .source_video
        .as_ref()
        .ok_or_else(|| Error::InvalidInput(format!("lead {} has no source video", lead.channel_id)))?
        .clone();

    let raw_audio = audio::fetch_audio(&video.url, &video.video_id, audio_dir)
        .await
        .map_err(|e| Error::External(e.to_string()))?;
    let trim_secs = config.render.trim_seconds.unwrap_or(DEFAULT_TRIM_SECS);
    let trimmed = audio::trim_audio(&raw_audio, Duration::from_secs(trim_secs))
        .await
        .map_err(|e| Error::External(e.to_string()))?;

    // Two candidates under two accounts; a single configured account
    // carries both jobs
    let accounts = &config.render.accounts;
    for (i, label) in CANDIDATE_LABELS.iter().enumerate() {
        let account = &accounts[i % accounts.len()];
        let render_id = client
            .submit_job(account, &video.url, &trimmed)
            .await
            .map_err(|e| Error::External(e.to_string()))?;

        lead.candidates.push(RenderCandidate {
            label: label.to_string(),
            render_id,
            raw_url: None,
            player_url: None,
            account: account.identity.clone(),
        });
    }

    lead.status.validate_transition(LeadStatus::AssetGenerating)?;
    lead.status = LeadStatus::AssetGenerating;
    leads::save(pool, lead).await?;

    Ok(())
}

/// Run the asset stage: resume in-flight leads first, then submit new
/// ones, processing each lead to completion before the next
pub async fn run(pool: &SqlitePool, config: &OutreachConfig) -> Result<AssetSummary> {
    config.require_render()?;
    let client = RenderClient::new(
        config.render.api_base.clone().unwrap_or_default(),
        config.render.player_base.clone(),
    )
    .map_err(|e| Error::External(e.to_string()))?;

    let audio_dir = config
        .render
        .audio_dir
        .clone()
        .unwrap_or_else(std::env::temp_dir);
    std::fs::create_dir_all(&audio_dir)?;

    let mut summary = AssetSummary::default();

    // Jobs submitted by an interrupted run
    for mut lead in leads::get_by_status(pool, LeadStatus::AssetGenerating, None).await? {
        info!(channel_id = %lead.channel_id, "Resuming in-flight render jobs");
        summary.resumed += 1;
        match complete_candidates(pool, config, &client, &mut lead).await {
            Ok(()) => summary.completed += 1,
            Err(e) => {
                warn!(channel_id = %lead.channel_id, error = %e, "Resume failed");
                leads::record_error(pool, &lead.channel_id, &e.to_string()).await?;
                summary.errors += 1;
            }
        }
    }

    for mut lead in leads::get_by_status(pool, LeadStatus::Approved, None).await? {
        match submit_for(pool, config, &client, &mut lead, &audio_dir).await {
            Ok(()) => {
                summary.submitted += 1;
                match complete_candidates(pool, config, &client, &mut lead).await {
                    Ok(()) => summary.completed += 1,
                    Err(e) => {
                        warn!(channel_id = %lead.channel_id, error = %e, "Render polling failed");
                        leads::record_error(pool, &lead.channel_id, &e.to_string()).await?;
                        summary.errors += 1;
                    }
                }
            }
            Err(e) => {
                warn!(channel_id = %lead.channel_id, error = %e, "Render submission failed");
                leads::record_error(pool, &lead.channel_id, &e.to_string()).await?;
                summary.errors += 1;
            }
        }
    }

    info!(
        submitted = summary.submitted,
        resumed = summary.resumed,
        completed = summary.completed,
        errors = summary.errors,
        "Asset stage complete"
    );
    Ok(summary)
}
