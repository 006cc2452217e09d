//! Structured output of the content classifier
//!
//! The text-generation service returns this shape as strict JSON; the
//! classifier adapter parses it and the refine stage turns it into score
//! deltas. Malformed responses are errors at the adapter boundary, never a
//! defaulted classification.

use serde::{Deserialize, Serialize};

/// How well the channel's content fits the product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityTier {
    /// Math/physics content built around equations and derivations
    Perfect,
    /// Science content that clearly benefits from visualization
    Good,
    /// Might benefit, unclear from the sample
    Possible,
    /// Content does not benefit from animation
    Poor,
}

impl CompatibilityTier {
    /// Score contribution of this tier
    pub fn points(&self) -> i32 {
        match self {
            CompatibilityTier::Perfect => 3,
            CompatibilityTier::Good => 2,
            CompatibilityTier::Possible => 1,
            CompatibilityTier::Poor => 0,
        }
    }
}

/// Language assessment of the channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageAssessment {
    /// Primary language, lowercase ("english", "spanish", ...)
    pub primary_language: String,
    pub is_english: bool,
}

/// Content assessment of the source video / channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentAssessment {
    pub is_educational: bool,
    /// Subject area ("math", "physics", "cs", ...)
    pub subject_area: String,
    /// "deep_conceptual", "tutorial", or "surface"
    pub content_depth: String,
    /// Whether the content would benefit from generated animation
    pub needs_visual_animation: bool,
    pub compatibility: CompatibilityTier,
}

/// Classifier-side disqualification verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisqualifyAssessment {
    pub should_disqualify: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Full classification of a lead
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    #[serde(default)]
    pub creator_first_name: Option<String>,
    pub language: LanguageAssessment,
    pub content: ContentAssessment,
    /// Creator location as an ISO-ish region code ("us", "uk", "de", ...)
    #[serde(default)]
    pub location: Option<String>,
    pub disqualify: DisqualifyAssessment,
    #[serde(default)]
    pub overall_assessment: Option<String>,
}
