//! Score aggregator
//!
//! Folds metric deltas and classifier deltas into one verdict. Any
//! disqualifying delta is absolute: the numeric total never overrides it.

use outreach_common::config::ScoringConfig;
use outreach_common::models::{Classification, ScoreDelta};

/// Non-English languages we still consider, at a penalty
const TOLERATED_LANGUAGES: [&str; 10] = [
    "german",
    "french",
    "spanish",
    "italian",
    "dutch",
    "portuguese",
    "polish",
    "swedish",
    "norwegian",
    "danish",
];

/// Regions where outreach in English lands well
const ENGLISH_REGIONS: [&str; 7] = ["us", "uk", "gb", "ca", "au", "nz", "ie"];

/// Aggregated qualification verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Qualify(i32),
    ManualReview(i32),
    Disqualify(String),
}

/// Deltas contributed by the classifier output
pub fn classification_deltas(
    classification: &Classification,
    english_only: bool,
) -> Vec<ScoreDelta> {
    let mut deltas = Vec::new();

    if classification.disqualify.should_disqualify {
        deltas.push(ScoreDelta::disqualify(
            "classifier_verdict",
            classification
                .disqualify
                .reason
                .clone()
                .unwrap_or_else(|| "classifier disqualified".to_string()),
        ));
    }

    let compatibility = classification.content.compatibility;
    deltas.push(ScoreDelta::new("compatibility", compatibility.points()));

    let language = classification.language.primary_language.to_lowercase();
    if classification.language.is_english {
        deltas.push(ScoreDelta::new("language", 2));
    } else if TOLERATED_LANGUAGES.contains(&language.as_str()) {
        deltas.push(ScoreDelta::new("language", -1));
    } else if english_only {
        deltas.push(ScoreDelta::disqualify(
            "language",
            format!("primary language {}", language),
        ));
    }

    if let Some(location) = &classification.location {
        if ENGLISH_REGIONS.contains(&location.to_lowercase().as_str()) {
            deltas.push(ScoreDelta::new("location", 2));
        }
    }

    deltas
}

/// Fold all deltas into a verdict.
///
/// Total is base plus the sum of every delta. At or above the qualify
/// threshold the lead qualifies; below the review floor it is
/// disqualified; between the two it goes to manual review.
pub fn aggregate(deltas: &[ScoreDelta], config: &ScoringConfig) -> Verdict {
    if let Some(delta) = deltas.iter().find(|d| d.disqualify.is_some()) {
        let reason = delta.disqualify.clone().unwrap_or_default();
        return Verdict::Disqualify(format!("{}: {}", delta.signal, reason));
    }

    let total = config.base_score + deltas.iter().map(|d| d.points).sum::<i32>();

    if total >= config.qualify_threshold {
        Verdict::Qualify(total)
    } else if total < config.review_floor {
        Verdict::Disqualify(format!(
            "score {} below review floor {}",
            total, config.review_floor
        ))
    } else {
        Verdict::ManualReview(total)
    }
}
