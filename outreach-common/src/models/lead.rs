//! Lead record — the sole persistent entity of the pipeline
//!
//! A lead is a candidate content creator keyed by channel identifier,
//! mutated by every stage as it advances through [`LeadStatus`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::classification::Classification;
use super::status::LeadStatus;

/// Programmatic channel/video metrics gathered at harvest time.
///
/// All fields are optional: the platform does not always expose them, and
/// an unknown metric contributes zero to the score rather than blocking
/// the lead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelMetrics {
    pub subscriber_count: Option<i64>,
    pub view_count: Option<i64>,
    pub video_count: Option<i64>,
    pub channel_published_at: Option<DateTime<Utc>>,
    pub uploads_per_month: Option<f64>,
    pub engagement_rate: Option<f64>,
    pub comments_enabled: Option<bool>,
    /// Channel's declared country, lowercase region code
    pub country: Option<String>,
}

impl ChannelMetrics {
    /// Channel age in fractional years as of `now`, if the publish date is known
    pub fn age_years(&self, now: DateTime<Utc>) -> Option<f64> {
        self.channel_published_at
            .map(|published| (now - published).num_days() as f64 / 365.25)
    }
}

/// The video that surfaced this lead during keyword search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceVideo {
    pub video_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
}

/// One named score contribution from the metric scorer or classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreDelta {
    /// Signal name ("subscriber_tier", "language", ...)
    pub signal: String,
    pub points: i32,
    /// Set when this signal alone disqualifies the lead
    #[serde(default)]
    pub disqualify: Option<String>,
}

impl ScoreDelta {
    pub fn new(signal: impl Into<String>, points: i32) -> Self {
        Self {
            signal: signal.into(),
            points,
            disqualify: None,
        }
    }

    pub fn disqualify(signal: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            signal: signal.into(),
            points: 0,
            disqualify: Some(reason.into()),
        }
    }
}

/// One candidate render produced by the asset stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderCandidate {
    /// Label shown to the operator ("A", "B")
    pub label: String,
    /// Render-service job/video identifier
    pub render_id: String,
    /// Raw storage URL of the finished render, None while the job runs
    #[serde(default)]
    pub raw_url: Option<String>,
    /// Branded player URL, None until registration
    #[serde(default)]
    pub player_url: Option<String>,
    /// Render account identity the job was submitted under
    pub account: String,
}

/// Draft outreach email pending review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftEmail {
    pub subject: String,
    pub body: String,
    pub drafted_at: DateTime<Utc>,
}

/// The outreach email actually dispatched
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentEmail {
    pub subject: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    /// Sending identity (sender email address)
    pub sent_via: String,
}

/// One entry in the follow-up thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowupEntry {
    pub date: DateTime<Utc>,
    /// "initial_outreach" or "followup_N"
    pub kind: String,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub response: Option<String>,
}

/// One entry in the free-form conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub date: DateTime<Utc>,
    /// "inbound" or "outbound"
    pub direction: String,
    pub content: String,
}

/// Full lead record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    // Identity
    pub channel_id: String,
    pub channel_name: String,
    #[serde(default)]
    pub creator_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub channel_url: Option<String>,
    #[serde(default)]
    pub channel_description: Option<String>,

    // Source context
    #[serde(default)]
    pub source_video: Option<SourceVideo>,
    #[serde(default)]
    pub keyword_source: Option<String>,

    // Metrics
    #[serde(default)]
    pub metrics: ChannelMetrics,

    // Qualification
    #[serde(default)]
    pub score: Option<i32>,
    #[serde(default)]
    pub score_breakdown: Vec<ScoreDelta>,
    #[serde(default)]
    pub classification: Option<Classification>,
    #[serde(default)]
    pub disqualify_reason: Option<String>,
    /// Set when the aggregator returned manual-review or the classifier
    /// produced output the stage refused to guess from
    #[serde(default)]
    pub needs_review: bool,

    // Assets
    #[serde(default)]
    pub candidates: Vec<RenderCandidate>,
    /// Selected branded player URL
    #[serde(default)]
    pub player_url: Option<String>,
    /// URL on the video host after the optional upload stage
    #[serde(default)]
    pub hosted_url: Option<String>,

    // Outreach
    #[serde(default)]
    pub draft_email: Option<DraftEmail>,
    #[serde(default)]
    pub sent_email: Option<SentEmail>,
    #[serde(default)]
    pub reached_out_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_followup_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub followup_count: u32,
    #[serde(default)]
    pub followup_thread: Vec<FollowupEntry>,
    #[serde(default)]
    pub conversation_history: Vec<ConversationEntry>,
    #[serde(default)]
    pub notes: String,
    /// Most recent per-lead failure, cleared on the next successful stage
    #[serde(default)]
    pub last_error: Option<String>,

    // Lifecycle
    pub status: LeadStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Create a freshly harvested lead
    pub fn harvested(
        channel_id: impl Into<String>,
        channel_name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            channel_name: channel_name.into(),
            creator_name: None,
            email: None,
            channel_url: None,
            channel_description: None,
            source_video: None,
            keyword_source: None,
            metrics: ChannelMetrics::default(),
            score: None,
            score_breakdown: Vec::new(),
            classification: None,
            disqualify_reason: None,
            needs_review: false,
            candidates: Vec::new(),
            player_url: None,
            hosted_url: None,
            draft_email: None,
            sent_email: None,
            reached_out_at: None,
            next_followup_at: None,
            followup_count: 0,
            followup_thread: Vec::new(),
            conversation_history: Vec::new(),
            notes: String::new(),
            last_error: None,
            status: LeadStatus::Harvested,
            created_at: now,
            updated_at: now,
        }
    }

    /// Display name preferring the creator's first name over the channel name
    pub fn display_name(&self) -> &str {
        self.creator_name.as_deref().unwrap_or(&self.channel_name)
    }

    /// Whether the lead can be dispatched: approved draft plus an address
    pub fn dispatchable(&self) -> bool {
        self.status == LeadStatus::ReadyToSend
            && self.email.is_some()
            && self.draft_email.is_some()
    }
}
