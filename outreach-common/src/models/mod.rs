//! Domain models shared by the store and the stage runners

pub mod classification;
pub mod lead;
pub mod status;

pub use classification::{
    Classification, CompatibilityTier, ContentAssessment, DisqualifyAssessment,
    LanguageAssessment,
};
pub use lead::{
    ChannelMetrics, ConversationEntry, DraftEmail, FollowupEntry, Lead, RenderCandidate,
    ScoreDelta, SentEmail, SourceVideo,
};
pub use status::LeadStatus;
