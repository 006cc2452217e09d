//! Refine stage
//!
//! Scores every unreviewed harvested lead: metric deltas first, then the
//! classifier, then the aggregator verdict. A classifier response the
//! adapter cannot parse flags the lead for manual review instead of
//! guessing; a network failure records the error and leaves the lead for
//! the next run.

use futures::stream::{self, StreamExt};
use outreach_common::config::OutreachConfig;
use outreach_common::db::leads;
use outreach_common::models::{Lead, LeadStatus};
use outreach_common::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::scoring::{aggregate, classification_deltas, score_metrics, Verdict};
use crate::services::classifier::{Classifier, ClassifyInput};
use crate::services::llm_client::LlmError;

/// Refine run totals
#[derive(Debug, Default)]
pub struct RefineSummary {
    pub processed: usize,
    pub qualified: usize,
    pub disqualified: usize,
    pub flagged_for_review: usize,
    pub errors: usize,
}

#[derive(Debug)]
enum Outcome {
    Qualified,
    Disqualified,
    FlaggedForReview,
    Errored,
}

fn classify_input(lead: &Lead) -> ClassifyInput {
    ClassifyInput {
        channel_name: lead.channel_name.clone(),
        channel_description: lead.channel_description.clone().unwrap_or_default(),
        video_title: lead.source_video.as_ref().map(|v| v.title.clone()),
        video_description: lead.source_video.as_ref().map(|v| v.description.clone()),
        country: lead.metrics.country.clone(),
        subscriber_count: lead.metrics.subscriber_count,
    }
}

async fn refine_one<C: Classifier>(
    pool: &SqlitePool,
    config: &OutreachConfig,
    classifier: &C,
    mut lead: Lead,
) -> Result<Outcome> {
    let scoring = &config.scoring;
    let mut deltas = score_metrics(
        &lead.metrics,
        lead.email.is_some(),
        scoring.min_subscribers,
        scoring.max_video_count,
        chrono::Utc::now(),
    );

    // Only call the classifier when the metrics alone have not already
    // settled the verdict
    if !deltas.iter().any(|d| d.disqualify.is_some()) {
        match classifier.classify(&classify_input(&lead)).await {
            Ok(classification) => {
                deltas.extend(classification_deltas(&classification, scoring.english_only));
                if lead.creator_name.is_none() {
                    lead.creator_name = classification.creator_first_name.clone();
                }
                lead.classification = Some(classification);
            }
            Err(LlmError::MalformedCompletion(detail)) => {
                // The model broke the contract; a human decides this one
                warn!(channel_id = %lead.channel_id, detail = %detail, "Unparseable classification");
                lead.needs_review = true;
                lead.last_error = Some(format!("classifier returned malformed JSON: {}", detail));
                leads::save(pool, &lead).await?;
                return Ok(Outcome::FlaggedForReview);
            }
            Err(e) => {
                leads::record_error(pool, &lead.channel_id, &e.to_string()).await?;
                return Ok(Outcome::Errored);
            }
        }
    }

    lead.score_breakdown = deltas.clone();
    lead.last_error = None;

    let outcome = match aggregate(&deltas, scoring) {
        Verdict::Qualify(total) => {
            lead.score = Some(total);
            lead.status.validate_transition(LeadStatus::Qualified)?;
            lead.status = LeadStatus::Qualified;
            info!(channel_id = %lead.channel_id, score = total, "Lead qualified");
            Outcome::Qualified
        }
        Verdict::Disqualify(reason) => {
            lead.status.validate_transition(LeadStatus::Disqualified)?;
            lead.status = LeadStatus::Disqualified;
            lead.disqualify_reason = Some(reason.clone());
            info!(channel_id = %lead.channel_id, reason = %reason, "Lead disqualified");
            Outcome::Disqualified
        }
        Verdict::ManualReview(total) => {
            // Stays harvested, flagged out of the refine query
            lead.score = Some(total);
            lead.needs_review = true;
            info!(channel_id = %lead.channel_id, score = total, "Lead flagged for review");
            Outcome::FlaggedForReview
        }
    };

    leads::save(pool, &lead).await?;
    Ok(outcome)
}

/// Run the refine stage
pub async fn run<C: Classifier>(
    pool: &SqlitePool,
    config: &OutreachConfig,
    classifier: &C,
    limit: Option<i64>,
) -> Result<RefineSummary> {
    let batch = leads::get_refinable(pool, limit).await?;
    let mut summary = RefineSummary {
        processed: batch.len(),
        ..Default::default()
    };

    if batch.is_empty() {
        info!("No harvested leads to refine");
        return Ok(summary);
    }

    let results: Vec<_> = stream::iter(batch)
        .map(|lead| refine_one(pool, config, classifier, lead))
        .buffer_unordered(config.harvest.workers)
        .collect()
        .await;

    for result in results {
        match result {
            Ok(Outcome::Qualified) => summary.qualified += 1,
            Ok(Outcome::Disqualified) => summary.disqualified += 1,
            Ok(Outcome::FlaggedForReview) => summary.flagged_for_review += 1,
            Ok(Outcome::Errored) => summary.errors += 1,
            Err(e) => {
                warn!(error = %e, "Refine worker failed");
                summary.errors += 1;
            }
        }
    }

    info!(
        qualified = summary.qualified,
        disqualified = summary.disqualified,
        review = summary.flagged_for_review,
        errors = summary.errors,
        "Refine complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::classifier::mock::MockClassifier;
    use chrono::{Duration, Utc};
    use outreach_common::db::init_store;
    use outreach_common::models::{
        Classification, CompatibilityTier, ContentAssessment, DisqualifyAssessment,
        LanguageAssessment,
    };
    use tempfile::TempDir;

    fn good_classification() -> Classification {
        Classification {
            creator_first_name: Some("Grant".into()),
            language: LanguageAssessment {
                primary_language: "english".into(),
                is_english: true,
            },
            content: ContentAssessment {
                is_educational: true,
                subject_area: "math".into(),
                content_depth: "deep_conceptual".into(),
                needs_visual_animation: true,
                compatibility: CompatibilityTier::Good,
            },
            location: Some("us".into()),
            disqualify: DisqualifyAssessment {
                should_disqualify: false,
                reason: None,
            },
            overall_assessment: None,
        }
    }

    async fn seeded_store(subscriber_count: i64) -> (TempDir, SqlitePool) {
        let dir = TempDir::new().unwrap();
        let pool = init_store(&dir.path().join("test.db")).await.unwrap();

        let mut lead = Lead::harvested("UC001", "Math Channel", Utc::now());
        lead.email = Some("creator@example.com".into());
        lead.metrics.subscriber_count = Some(subscriber_count);
        lead.metrics.channel_published_at = Some(Utc::now() - Duration::days(365));
        lead.metrics.uploads_per_month = Some(5.0);
        leads::insert_harvested(&pool, &lead).await.unwrap();

        (dir, pool)
    }

    #[tokio::test]
    async fn test_reference_lead_qualifies_with_score_eighteen() {
        let (_dir, pool) = seeded_store(200_000).await;
        let classifier = MockClassifier::new(vec![Ok(good_classification())]);

        let summary = run(&pool, &OutreachConfig::default(), &classifier, None)
            .await
            .unwrap();
        assert_eq!(summary.qualified, 1);

        let lead = leads::get(&pool, "UC001").await.unwrap().unwrap();
        assert_eq!(lead.status, LeadStatus::Qualified);
        assert_eq!(lead.score, Some(18));
        assert_eq!(lead.creator_name.as_deref(), Some("Grant"));
        assert!(!lead.score_breakdown.is_empty());
    }

    #[tokio::test]
    async fn test_subscriber_gate_skips_classifier_entirely() {
        let (_dir, pool) = seeded_store(3_000).await;
        // No responses queued: a classifier call would error the lead
        let classifier = MockClassifier::new(vec![]);

        let summary = run(&pool, &OutreachConfig::default(), &classifier, None)
            .await
            .unwrap();
        assert_eq!(summary.disqualified, 1);
        assert_eq!(summary.errors, 0);

        let lead = leads::get(&pool, "UC001").await.unwrap().unwrap();
        assert_eq!(lead.status, LeadStatus::Disqualified);
        assert!(lead
            .disqualify_reason
            .as_deref()
            .unwrap()
            .contains("subscriber_tier"));
    }

    #[tokio::test]
    async fn test_malformed_classifier_output_flags_for_review() {
        let (_dir, pool) = seeded_store(200_000).await;
        let classifier = MockClassifier::new(vec![Err(LlmError::MalformedCompletion(
            "expected value".into(),
        ))]);

        let summary = run(&pool, &OutreachConfig::default(), &classifier, None)
            .await
            .unwrap();
        assert_eq!(summary.flagged_for_review, 1);

        let lead = leads::get(&pool, "UC001").await.unwrap().unwrap();
        assert_eq!(lead.status, LeadStatus::Harvested);
        assert!(lead.needs_review);
        assert!(lead.last_error.as_deref().unwrap().contains("malformed"));

        // A second run no longer picks it up
        let classifier = MockClassifier::new(vec![]);
        let summary = run(&pool, &OutreachConfig::default(), &classifier, None)
            .await
            .unwrap();
        assert_eq!(summary.processed, 0);
    }

    #[tokio::test]
    async fn test_network_error_leaves_lead_for_next_run() {
        let (_dir, pool) = seeded_store(200_000).await;
        let classifier =
            MockClassifier::new(vec![Err(LlmError::NetworkError("timeout".into()))]);

        let summary = run(&pool, &OutreachConfig::default(), &classifier, None)
            .await
            .unwrap();
        assert_eq!(summary.errors, 1);

        let lead = leads::get(&pool, "UC001").await.unwrap().unwrap();
        assert_eq!(lead.status, LeadStatus::Harvested);
        assert!(!lead.needs_review);
        assert!(lead.last_error.is_some());
    }
}
