//! Follow-up rule engine
//!
//! Pure decision function over a contacted lead. Offsets are measured in
//! days from the INITIAL contact, not from the previous follow-up: with
//! offsets [3, 7, 10, 15], follow-up 3 goes out on day 10 after the
//! first email regardless of when follow-up 2 actually went out.

use chrono::{DateTime, Duration, Utc};
use outreach_common::models::LeadStatus;

/// Days after the final offset before a silent lead is closed out
const FINAL_GRACE_DAYS: i64 = 7;

/// What the engine wants done with one lead
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowupAction {
    /// Not a contacted lead, or contact timestamp missing
    NotEligible,
    /// Next follow-up exists but its offset has not elapsed
    NotDue { due: DateTime<Utc> },
    /// Send follow-up `number` (1-based)
    SendFollowup { number: u32, due: DateTime<Utc> },
    /// All offsets spent and the grace window elapsed with no reply
    MarkDead,
}

/// Decide the next action for a lead.
///
/// `followup_count` is the number of follow-ups already sent (0 right
/// after the initial email). Terminal and pre-send statuses are never
/// eligible, so a reply or unsubscribe recorded between runs removes the
/// lead from consideration with no extra bookkeeping.
pub fn evaluate(
    status: LeadStatus,
    reached_out_at: Option<DateTime<Utc>>,
    followup_count: u32,
    now: DateTime<Utc>,
    offsets_days: &[i64],
) -> FollowupAction {
    if status.followup_stage().is_none() {
        return FollowupAction::NotEligible;
    }
    let Some(contacted) = reached_out_at else {
        return FollowupAction::NotEligible;
    };

    let next = followup_count as usize;
    if next >= offsets_days.len() {
        let closed_after = contacted
            + Duration::days(offsets_days.last().copied().unwrap_or(0) + FINAL_GRACE_DAYS);
        if now >= closed_after {
            return FollowupAction::MarkDead;
        }
        return FollowupAction::NotDue { due: closed_after };
    }

    let due = contacted + Duration::days(offsets_days[next]);
    if now >= due {
        FollowupAction::SendFollowup {
            number: followup_count + 1,
            due,
        }
    } else {
        FollowupAction::NotDue { due }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFSETS: [i64; 4] = [3, 7, 10, 15];

    // All timestamps derive from one pinned instant; a second Utc::now()
    // call would land nanoseconds later and break the inclusive boundary
    fn days_before(now: DateTime<Utc>, n: i64) -> DateTime<Utc> {
        now - Duration::days(n)
    }

    #[test]
    fn test_first_followup_due_exactly_at_offset() {
        let now = Utc::now();

        // Day 2: not due
        assert!(matches!(
            evaluate(LeadStatus::Sent, Some(days_before(now, 2)), 0, now, &OFFSETS),
            FollowupAction::NotDue { .. }
        ));

        // Day 3: due, boundary inclusive
        let contacted = days_before(now, 3);
        assert_eq!(
            evaluate(LeadStatus::Sent, Some(contacted), 0, now, &OFFSETS),
            FollowupAction::SendFollowup {
                number: 1,
                due: contacted + Duration::days(3)
            }
        );
    }

    #[test]
    fn test_third_followup_at_day_ten_from_initial_contact() {
        // Sent 10 days ago, two follow-ups already out (days 3 and 7):
        // follow-up 3 is due exactly now, at day 10
        let now = Utc::now();
        let contacted = days_before(now, 10);

        assert_eq!(
            evaluate(LeadStatus::Followup2, Some(contacted), 2, now, &OFFSETS),
            FollowupAction::SendFollowup {
                number: 3,
                due: contacted + Duration::days(10)
            }
        );

        // A day earlier it was not due
        assert!(matches!(
            evaluate(
                LeadStatus::Followup2,
                Some(days_before(now, 9)),
                2,
                now,
                &OFFSETS
            ),
            FollowupAction::NotDue { .. }
        ));
    }

    #[test]
    fn test_exhausted_offsets_lead_to_dead_after_grace() {
        let now = Utc::now();

        // All four sent, day 18: inside the grace window
        assert!(matches!(
            evaluate(
                LeadStatus::Followup4,
                Some(days_before(now, 18)),
                4,
                now,
                &OFFSETS
            ),
            FollowupAction::NotDue { .. }
        ));

        // Day 22: 15 + 7 grace elapsed, boundary inclusive
        assert_eq!(
            evaluate(
                LeadStatus::Followup4,
                Some(days_before(now, 22)),
                4,
                now,
                &OFFSETS
            ),
            FollowupAction::MarkDead
        );
    }

    #[test]
    fn test_terminal_and_pre_send_statuses_not_eligible() {
        let now = Utc::now();
        for status in [
            LeadStatus::Replied,
            LeadStatus::Unsubscribed,
            LeadStatus::Dead,
            LeadStatus::ReadyToSend,
            LeadStatus::Harvested,
        ] {
            assert_eq!(
                evaluate(status, Some(days_before(now, 30)), 1, now, &OFFSETS),
                FollowupAction::NotEligible,
                "{} must not be eligible",
                status
            );
        }
    }

    #[test]
    fn test_missing_contact_timestamp_not_eligible() {
        assert_eq!(
            evaluate(LeadStatus::Sent, None, 0, Utc::now(), &OFFSETS),
            FollowupAction::NotEligible
        );
    }
}
