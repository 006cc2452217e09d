//! Lead lifecycle state machine
//!
//! A lead progresses through the pipeline stages:
//! harvested → qualified → approved → asset_generating → asset_pending_review
//! → asset_approved → (uploaded) → drafted → ready_to_send → sent
//! → followup_1..4 → replied/converted or dead.
//!
//! Transitions are validated against an explicit table so an invalid
//! transition is an error, never a silent data inconsistency. Operator
//! commands may force any status (manual override).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Pipeline status of a lead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    /// Discovered by the harvest stage, not yet scored
    Harvested,
    /// Passed scoring and classification
    Qualified,
    /// Rejected by scoring, classification, or operator
    Disqualified,
    /// Operator approved for asset generation
    Approved,
    /// Render jobs submitted, awaiting completion
    AssetGenerating,
    /// Candidate renders ready for operator selection
    AssetPendingReview,
    /// Operator selected a candidate render
    AssetApproved,
    /// Selected render published to the video host
    Uploaded,
    /// Outreach email drafted, pending review
    Drafted,
    /// Draft approved for dispatch
    ReadyToSend,
    /// Initial outreach sent
    Sent,
    Followup1,
    Followup2,
    Followup3,
    Followup4,
    /// Creator responded (terminal for the follow-up engine)
    Replied,
    /// Closed deal
    Converted,
    /// Requested no further contact
    Unsubscribed,
    /// No response after all follow-ups
    Dead,
}

impl LeadStatus {
    /// All statuses in stage order (terminals last)
    pub const ALL: [LeadStatus; 19] = [
        LeadStatus::Harvested,
        LeadStatus::Qualified,
        LeadStatus::Disqualified,
        LeadStatus::Approved,
        LeadStatus::AssetGenerating,
        LeadStatus::AssetPendingReview,
        LeadStatus::AssetApproved,
        LeadStatus::Uploaded,
        LeadStatus::Drafted,
        LeadStatus::ReadyToSend,
        LeadStatus::Sent,
        LeadStatus::Followup1,
        LeadStatus::Followup2,
        LeadStatus::Followup3,
        LeadStatus::Followup4,
        LeadStatus::Replied,
        LeadStatus::Converted,
        LeadStatus::Unsubscribed,
        LeadStatus::Dead,
    ];

    /// Database/string representation (snake_case, matches serde)
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Harvested => "harvested",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Disqualified => "disqualified",
            LeadStatus::Approved => "approved",
            LeadStatus::AssetGenerating => "asset_generating",
            LeadStatus::AssetPendingReview => "asset_pending_review",
            LeadStatus::AssetApproved => "asset_approved",
            LeadStatus::Uploaded => "uploaded",
            LeadStatus::Drafted => "drafted",
            LeadStatus::ReadyToSend => "ready_to_send",
            LeadStatus::Sent => "sent",
            LeadStatus::Followup1 => "followup_1",
            LeadStatus::Followup2 => "followup_2",
            LeadStatus::Followup3 => "followup_3",
            LeadStatus::Followup4 => "followup_4",
            LeadStatus::Replied => "replied",
            LeadStatus::Converted => "converted",
            LeadStatus::Unsubscribed => "unsubscribed",
            LeadStatus::Dead => "dead",
        }
    }

    /// Parse a database/CLI string into a status
    pub fn parse(s: &str) -> Result<LeadStatus> {
        Self::ALL
            .iter()
            .copied()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown lead status: {}", s)))
    }

    /// True for statuses before the initial email has gone out
    pub fn is_pre_send(&self) -> bool {
        matches!(
            self,
            LeadStatus::Harvested
                | LeadStatus::Qualified
                | LeadStatus::Approved
                | LeadStatus::AssetGenerating
                | LeadStatus::AssetPendingReview
                | LeadStatus::AssetApproved
                | LeadStatus::Uploaded
                | LeadStatus::Drafted
                | LeadStatus::ReadyToSend
        )
    }

    /// True for statuses the follow-up engine must never touch again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LeadStatus::Replied
                | LeadStatus::Converted
                | LeadStatus::Unsubscribed
                | LeadStatus::Dead
                | LeadStatus::Disqualified
        )
    }

    /// Follow-up stage number (sent = 0, followup_k = k), None otherwise
    pub fn followup_stage(&self) -> Option<u32> {
        match self {
            LeadStatus::Sent => Some(0),
            LeadStatus::Followup1 => Some(1),
            LeadStatus::Followup2 => Some(2),
            LeadStatus::Followup3 => Some(3),
            LeadStatus::Followup4 => Some(4),
            _ => None,
        }
    }

    /// Allowed next statuses from the current one.
    ///
    /// Monotonic along the stage order; `disqualified` is reachable from
    /// every pre-send status; `replied`/`unsubscribed` from any contacted
    /// status. Terminal statuses except `replied` allow nothing further.
    pub fn allowed_next(&self) -> &'static [LeadStatus] {
        use LeadStatus::*;
        match self {
            Harvested => &[Qualified, Disqualified],
            Qualified => &[Approved, Disqualified],
            Approved => &[AssetGenerating, Disqualified],
            AssetGenerating => &[AssetPendingReview, Disqualified],
            AssetPendingReview => &[AssetApproved, Disqualified],
            AssetApproved => &[Uploaded, Drafted, Disqualified],
            Uploaded => &[Drafted, Disqualified],
            Drafted => &[ReadyToSend, Disqualified],
            ReadyToSend => &[Sent, Disqualified],
            Sent => &[Followup1, Replied, Unsubscribed, Dead],
            Followup1 => &[Followup2, Replied, Unsubscribed, Dead],
            Followup2 => &[Followup3, Replied, Unsubscribed, Dead],
            Followup3 => &[Followup4, Replied, Unsubscribed, Dead],
            Followup4 => &[Replied, Unsubscribed, Dead],
            Replied => &[Converted, Unsubscribed, Dead],
            Disqualified | Converted | Unsubscribed | Dead => &[],
        }
    }

    /// Check whether `to` is a legal next status
    pub fn can_transition(&self, to: LeadStatus) -> bool {
        self.allowed_next().contains(&to)
    }

    /// Validate a transition, returning `Error::InvalidTransition` if the
    /// table forbids it
    pub fn validate_transition(&self, to: LeadStatus) -> Result<()> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                from: self.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_all_statuses() {
        for status in LeadStatus::ALL {
            assert_eq!(LeadStatus::parse(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn test_linear_progression_allowed() {
        assert!(LeadStatus::Harvested.can_transition(LeadStatus::Qualified));
        assert!(LeadStatus::Qualified.can_transition(LeadStatus::Approved));
        assert!(LeadStatus::ReadyToSend.can_transition(LeadStatus::Sent));
        assert!(LeadStatus::Sent.can_transition(LeadStatus::Followup1));
        assert!(LeadStatus::Followup3.can_transition(LeadStatus::Followup4));
    }

    #[test]
    fn test_skipping_stages_rejected() {
        assert!(!LeadStatus::Harvested.can_transition(LeadStatus::Sent));
        assert!(!LeadStatus::Qualified.can_transition(LeadStatus::Drafted));
        assert!(!LeadStatus::Sent.can_transition(LeadStatus::Followup2));
        assert!(LeadStatus::Harvested
            .validate_transition(LeadStatus::ReadyToSend)
            .is_err());
    }

    #[test]
    fn test_disqualify_reachable_from_all_pre_send() {
        for status in LeadStatus::ALL {
            if status.is_pre_send() {
                assert!(
                    status.can_transition(LeadStatus::Disqualified),
                    "{} should allow disqualification",
                    status
                );
            }
        }
    }

    #[test]
    fn test_replied_removes_followup_eligibility() {
        assert!(LeadStatus::Sent.can_transition(LeadStatus::Replied));
        assert!(LeadStatus::Followup4.can_transition(LeadStatus::Replied));
        assert!(!LeadStatus::Replied.can_transition(LeadStatus::Followup1));
        assert!(LeadStatus::Replied.is_terminal());
    }

    #[test]
    fn test_dead_is_terminal() {
        assert!(LeadStatus::Dead.allowed_next().is_empty());
        assert!(LeadStatus::Followup4.can_transition(LeadStatus::Dead));
    }
}
