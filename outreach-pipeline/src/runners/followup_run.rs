//! Follow-up stage
//!
//! Walks every contacted lead through the rule engine. Without `--send`
//! it only reports what is due; with it, due follow-ups go out through
//! the sender pool and exhausted leads are closed as dead.

use chrono::Utc;
use outreach_common::config::OutreachConfig;
use outreach_common::db::leads;
use outreach_common::models::{FollowupEntry, Lead, LeadStatus};
use outreach_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::followup::{evaluate, FollowupAction};
use crate::services::email::{SenderPool, SmtpMailer};

/// Follow-up invocation mode
#[derive(Debug, Clone, Copy, Default)]
pub struct FollowupOptions {
    pub send: bool,
}

/// Follow-up run totals
#[derive(Debug, Default)]
pub struct FollowupSummary {
    pub examined: usize,
    pub due: usize,
    pub sent: usize,
    pub marked_dead: usize,
    pub errors: usize,
}

/// Follow-up number to the status recording it
fn status_for(number: u32) -> Option<LeadStatus> {
    match number {
        1 => Some(LeadStatus::Followup1),
        2 => Some(LeadStatus::Followup2),
        3 => Some(LeadStatus::Followup3),
        4 => Some(LeadStatus::Followup4),
        _ => None,
    }
}

/// Follow-up copy. Templated rather than generated: these are short
/// nudges, and deterministic text keeps the thread reviewable.
fn followup_email(lead: &Lead, number: u32) -> (String, String) {
    let original_subject = lead
        .sent_email
        .as_ref()
        .map(|s| s.subject.clone())
        .unwrap_or_else(|| format!("An animation for {}", lead.channel_name));
    let subject = format!("Re: {}", original_subject);

    let link = lead
        .hosted_url
        .as_deref()
        .or(lead.player_url.as_deref())
        .unwrap_or("(link unavailable)");

    let body = match number {
        1 => format!(
            "Hi {},\n\nJust floating this back up in case it got buried. The animation \
             is still here: {}\n\nNo rush either way.",
            lead.display_name(),
            link
        ),
        2 => format!(
            "Hi {},\n\nWanted to check once more whether the animation was useful: {}\n\n\
             Happy to tweak it if the style isn't right for your channel.",
            lead.display_name(),
            link
        ),
        3 => format!(
            "Hi {},\n\nLast nudge on this, promise. If animations like this one ({}) \
             would help your videos, I'd love to hear what you think.",
            lead.display_name(),
            link
        ),
        _ => format!(
            "Hi {},\n\nClosing the loop on my earlier emails about the animation ({}). \
             If now isn't the time, no worries at all; the link will keep working.",
            lead.display_name(),
            link
        ),
    };

    (subject, body)
}

async fn send_followup(
    pool: &SqlitePool,
    config: &OutreachConfig,
    sender_pool: &SenderPool,
    mailer: &SmtpMailer,
    mut lead: Lead,
    number: u32,
) -> Result<()> {
    let to = lead
        .email
        .clone()
        .ok_or_else(|| Error::Internal(format!("contacted lead {} has no email", lead.channel_id)))?;
    let next_status = status_for(number)
        .ok_or_else(|| Error::Internal(format!("follow-up {} out of range", number)))?;
    lead.status.validate_transition(next_status)?;

    let (subject, body) = followup_email(&lead, number);
    let now = Utc::now();

    let sender = sender_pool
        .next_available(pool, now)
        .await
        .map_err(|e| Error::External(e.to_string()))?
        .clone();
    mailer
        .send(&sender, &to, &subject, &body)
        .await
        .map_err(|e| Error::External(e.to_string()))?;
    sender_pool
        .record_send(pool, &sender, now)
        .await
        .map_err(|e| Error::External(e.to_string()))?;

    lead.status = next_status;
    lead.followup_count = number;
    lead.next_followup_at = config
        .followup
        .offsets_days
        .get(number as usize)
        .and_then(|d| lead.reached_out_at.map(|r| r + chrono::Duration::days(*d)));
    lead.followup_thread.push(FollowupEntry {
        date: now,
        kind: format!("followup_{}", number),
        subject,
        body,
        response: None,
    });
    lead.last_error = None;

    leads::save(pool, &lead).await?;
    info!(channel_id = %lead.channel_id, number, "Follow-up sent");
    Ok(())
}

/// Run the follow-up stage
pub async fn run(
    pool: &SqlitePool,
    config: &OutreachConfig,
    opts: FollowupOptions,
) -> Result<FollowupSummary> {
    let contacted = leads::get_contacted(pool).await?;
    let mut summary = FollowupSummary {
        examined: contacted.len(),
        ..Default::default()
    };

    let (sender_pool, mailer) = if opts.send {
        config.require_smtp()?;
        (
            Some(SenderPool::new(
                config.email.senders.clone(),
                config.email.max_per_sender_per_day,
            )),
            Some(SmtpMailer::new(
                &config.email,
                config.email.smtp_host.clone().unwrap_or_default(),
            )),
        )
    } else {
        (None, None)
    };

    let now = Utc::now();
    for lead in contacted {
        let action = evaluate(
            lead.status,
            lead.reached_out_at,
            lead.followup_count,
            now,
            &config.followup.offsets_days,
        );

        match action {
            FollowupAction::SendFollowup { number, due } => {
                summary.due += 1;
                if !opts.send {
                    info!(
                        channel_id = %lead.channel_id,
                        number,
                        due = %due,
                        "Follow-up due (dry run)"
                    );
                    continue;
                }
                let (Some(sender_pool), Some(mailer)) = (&sender_pool, &mailer) else {
                    continue;
                };
                let channel_id = lead.channel_id.clone();
                match send_followup(pool, config, sender_pool, mailer, lead, number).await {
                    Ok(()) => summary.sent += 1,
                    Err(e) => {
                        warn!(channel_id = %channel_id, error = %e, "Follow-up send failed");
                        leads::record_error(pool, &channel_id, &e.to_string()).await?;
                        summary.errors += 1;
                    }
                }
            }
            FollowupAction::MarkDead => {
                if opts.send {
                    leads::update_status(pool, &lead.channel_id, LeadStatus::Dead, false).await?;
                    info!(channel_id = %lead.channel_id, "No response; lead closed");
                }
                summary.marked_dead += 1;
            }
            FollowupAction::NotDue { .. } | FollowupAction::NotEligible => {}
        }
    }

    info!(
        examined = summary.examined,
        due = summary.due,
        sent = summary.sent,
        dead = summary.marked_dead,
        "Follow-up pass complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_followup_email_prefers_hosted_url() {
        let mut lead = Lead::harvested("UC1", "Math Channel", Utc::now());
        lead.player_url = Some("https://player.example/v/abc".into());
        lead.hosted_url = Some("https://host.example/w/xyz".into());
        lead.sent_email = Some(outreach_common::models::SentEmail {
            subject: "An animation for Math Channel".into(),
            body: String::new(),
            sent_at: Utc::now(),
            sent_via: "a@x.com".into(),
        });

        let (subject, body) = followup_email(&lead, 1);
        assert_eq!(subject, "Re: An animation for Math Channel");
        assert!(body.contains("https://host.example/w/xyz"));
    }

    #[test]
    fn test_each_followup_number_has_distinct_copy() {
        let lead = Lead::harvested("UC1", "Math Channel", Utc::now());
        let bodies: Vec<String> = (1..=4).map(|n| followup_email(&lead, n).1).collect();
        for pair in bodies.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn test_status_for_range() {
        assert_eq!(status_for(1), Some(LeadStatus::Followup1));
        assert_eq!(status_for(4), Some(LeadStatus::Followup4));
        assert_eq!(status_for(5), None);
    }
}
