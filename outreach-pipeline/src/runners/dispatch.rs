//! Dispatch stage
//!
//! Turns ready-to-send leads into a persisted, paced send schedule and
//! executes it. The schedule is written before the first email goes out;
//! `--resume` picks up the pending remainder of an interrupted run
//! without recomputing a single timestamp.

use chrono::{Duration as ChronoDuration, Utc};
use outreach_common::config::OutreachConfig;
use outreach_common::db::{leads, schedule};
use outreach_common::models::{FollowupEntry, Lead, LeadStatus, SentEmail};
use outreach_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::scheduler;
use crate::services::email::{RelayClient, SenderPool, SmtpMailer};

/// Dispatch invocation mode
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOptions {
    pub resume: bool,
    pub show: bool,
    pub dry_run: bool,
}

/// Dispatch run totals
#[derive(Debug, Default)]
pub struct DispatchSummary {
    pub scheduled: usize,
    pub sent: usize,
    pub cancelled: usize,
    pub errors: usize,
}

/// Record the initial send on the lead: status, thread, and the
/// timestamps the follow-up engine keys off
async fn finalize_sent(
    pool: &SqlitePool,
    mut lead: Lead,
    via: &str,
    sent_at: chrono::DateTime<Utc>,
    first_offset_days: Option<i64>,
) -> Result<()> {
    let draft = lead
        .draft_email
        .clone()
        .ok_or_else(|| Error::Internal(format!("lead {} lost its draft", lead.channel_id)))?;

    lead.status.validate_transition(LeadStatus::Sent)?;
    lead.status = LeadStatus::Sent;
    lead.sent_email = Some(SentEmail {
        subject: draft.subject.clone(),
        body: draft.body.clone(),
        sent_at,
        sent_via: via.to_string(),
    });
    lead.reached_out_at = Some(sent_at);
    lead.followup_count = 0;
    lead.next_followup_at = first_offset_days.map(|d| sent_at + ChronoDuration::days(d));
    lead.followup_thread.push(FollowupEntry {
        date: sent_at,
        kind: "initial_outreach".to_string(),
        subject: draft.subject,
        body: draft.body,
        response: None,
    });
    lead.last_error = None;

    leads::save(pool, &lead).await
}

fn print_entries(entries: &[schedule::ScheduleEntry]) {
    for entry in entries {
        let state = match entry.sent_at {
            Some(at) => format!("sent {}", at.format("%Y-%m-%d %H:%M")),
            None => "pending".to_string(),
        };
        println!(
            "{}  {}  {}  [{}]",
            entry.scheduled_at.format("%Y-%m-%d %H:%M"),
            entry.channel_id,
            entry.batch_id,
            state
        );
    }
}

/// Run the dispatch stage
pub async fn run(
    pool: &SqlitePool,
    config: &OutreachConfig,
    opts: DispatchOptions,
) -> Result<DispatchSummary> {
    let mut summary = DispatchSummary::default();

    if opts.show {
        print_entries(&schedule::latest_batch(pool).await?);
        return Ok(summary);
    }

    let entries = if opts.resume {
        let pending = schedule::pending(pool).await?;
        if pending.is_empty() {
            info!("No pending schedule entries to resume");
            return Ok(summary);
        }
        pending
    } else {
        let pending = schedule::pending(pool).await?;
        if !pending.is_empty() {
            return Err(Error::InvalidInput(format!(
                "{} schedule entries still pending; run `outreach dispatch --resume` first",
                pending.len()
            )));
        }

        let ready: Vec<Lead> = leads::get_by_status(pool, LeadStatus::ReadyToSend, None)
            .await?
            .into_iter()
            .filter(|l| l.dispatchable())
            .collect();
        if ready.is_empty() {
            info!("No dispatchable leads");
            return Ok(summary);
        }

        let channel_ids: Vec<String> = ready.iter().map(|l| l.channel_id.clone()).collect();
        let plan =
            scheduler::build_schedule(&channel_ids, Utc::now(), config.dispatch.interval_minutes);
        schedule::insert_batch(pool, &scheduler::new_batch_id(), &plan).await?;
        summary.scheduled = plan.len();
        info!(count = plan.len(), "Schedule persisted");

        schedule::pending(pool).await?
    };

    if opts.dry_run {
        print_entries(&entries);
        return Ok(summary);
    }

    config.require_smtp()?;
    let sender_pool = SenderPool::new(
        config.email.senders.clone(),
        config.email.max_per_sender_per_day,
    );
    let mailer = SmtpMailer::new(
        &config.email,
        config.email.smtp_host.clone().unwrap_or_default(),
    );
    let relay = config
        .email
        .relay_endpoint
        .as_deref()
        .map(RelayClient::new)
        .transpose()
        .map_err(|e| Error::External(e.to_string()))?;

    let first_offset = config.followup.offsets_days.first().copied();

    for entry in entries {
        // The lead may have replied, unsubscribed, or been deleted since
        // the schedule was written
        let lead = match leads::get(pool, &entry.channel_id).await? {
            Some(lead) if lead.dispatchable() => lead,
            _ => {
                warn!(channel_id = %entry.channel_id, "No longer dispatchable; cancelling entry");
                schedule::cancel_pending_for(pool, &entry.channel_id).await?;
                summary.cancelled += 1;
                continue;
            }
        };

        // dispatchable() guarantees both
        let to = lead.email.clone().unwrap_or_default();
        let Some(draft) = lead.draft_email.clone() else {
            continue;
        };

        let sender = match sender_pool.next_available(pool, Utc::now()).await {
            Ok(sender) => sender.clone(),
            Err(e) => {
                warn!(error = %e, "Stopping dispatch run");
                break;
            }
        };

        let send_result = if let Some(relay) = &relay {
            // The relay queues future-dated sends server-side; no local
            // sleeping needed
            relay
                .schedule(&sender.email, &to, &draft.subject, &draft.body, entry.scheduled_at)
                .await
                .map(|task_id| {
                    info!(task_id = %task_id, to = %to, "Send queued on relay");
                })
        } else {
            let now = Utc::now();
            if entry.scheduled_at > now {
                let wait = (entry.scheduled_at - now)
                    .to_std()
                    .unwrap_or_default();
                info!(
                    channel_id = %entry.channel_id,
                    at = %entry.scheduled_at,
                    "Sleeping until scheduled send"
                );
                tokio::time::sleep(wait).await;
            }
            mailer.send(&sender, &to, &draft.subject, &draft.body).await
        };

        match send_result {
            Ok(()) => {
                let sent_at = if relay.is_some() {
                    entry.scheduled_at
                } else {
                    Utc::now()
                };
                sender_pool
                    .record_send(pool, &sender, sent_at)
                    .await
                    .map_err(|e| Error::External(e.to_string()))?;
                schedule::mark_sent(pool, entry.id, sent_at).await?;
                finalize_sent(pool, lead, &sender.email, sent_at, first_offset).await?;
                summary.sent += 1;
            }
            Err(e) => {
                // Entry stays pending for --resume
                warn!(channel_id = %entry.channel_id, error = %e, "Send failed");
                leads::record_error(pool, &entry.channel_id, &e.to_string()).await?;
                summary.errors += 1;
            }
        }
    }

    info!(
        sent = summary.sent,
        cancelled = summary.cancelled,
        errors = summary.errors,
        "Dispatch complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use outreach_common::db::init_store;
    use outreach_common::models::DraftEmail;
    use tempfile::TempDir;

    async fn ready_lead(pool: &SqlitePool, channel_id: &str) {
        let mut lead = Lead::harvested(channel_id, "Math Channel", Utc::now());
        leads::insert_harvested(pool, &lead).await.unwrap();
        lead.email = Some("creator@example.com".into());
        lead.draft_email = Some(DraftEmail {
            subject: "Hi".into(),
            body: "Body".into(),
            drafted_at: Utc::now(),
        });
        lead.status = LeadStatus::ReadyToSend;
        leads::save(pool, &lead).await.unwrap();
    }

    #[tokio::test]
    async fn test_dry_run_persists_schedule_without_sending() {
        let dir = TempDir::new().unwrap();
        let pool = init_store(&dir.path().join("test.db")).await.unwrap();
        ready_lead(&pool, "UC001").await;
        ready_lead(&pool, "UC002").await;

        let summary = run(
            &pool,
            &OutreachConfig::default(),
            DispatchOptions {
                dry_run: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(summary.scheduled, 2);
        assert_eq!(summary.sent, 0);

        // Schedule is on disk and strictly increasing
        let pending = schedule::pending(&pool).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending[0].scheduled_at < pending[1].scheduled_at);

        // Leads untouched
        let lead = leads::get(&pool, "UC001").await.unwrap().unwrap();
        assert_eq!(lead.status, LeadStatus::ReadyToSend);
    }

    #[tokio::test]
    async fn test_new_batch_refused_while_entries_pending() {
        let dir = TempDir::new().unwrap();
        let pool = init_store(&dir.path().join("test.db")).await.unwrap();
        ready_lead(&pool, "UC001").await;

        run(
            &pool,
            &OutreachConfig::default(),
            DispatchOptions {
                dry_run: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

        // A second non-resume invocation must not reschedule
        let err = run(&pool, &OutreachConfig::default(), DispatchOptions::default()).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_finalize_sent_sets_followup_bookkeeping() {
        let dir = TempDir::new().unwrap();
        let pool = init_store(&dir.path().join("test.db")).await.unwrap();
        ready_lead(&pool, "UC001").await;

        let lead = leads::get(&pool, "UC001").await.unwrap().unwrap();
        let sent_at = Utc::now();
        finalize_sent(&pool, lead, "a@x.com", sent_at, Some(3))
            .await
            .unwrap();

        let lead = leads::get(&pool, "UC001").await.unwrap().unwrap();
        assert_eq!(lead.status, LeadStatus::Sent);
        assert_eq!(lead.followup_count, 0);
        assert_eq!(lead.reached_out_at.unwrap(), lead.sent_email.as_ref().unwrap().sent_at);
        assert_eq!(
            lead.next_followup_at.unwrap() - lead.reached_out_at.unwrap(),
            ChronoDuration::days(3)
        );
        assert_eq!(lead.followup_thread.len(), 1);
        assert_eq!(lead.followup_thread[0].kind, "initial_outreach");
    }
}
