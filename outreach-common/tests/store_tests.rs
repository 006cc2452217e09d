//! Integration tests for the lead store

use chrono::{Duration, Utc};
use outreach_common::db::quota::{self, QuotaScope};
use outreach_common::db::{init_store, keywords, leads, schedule};
use outreach_common::models::{Lead, LeadStatus};
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn test_store() -> (TempDir, SqlitePool) {
    let dir = TempDir::new().unwrap();
    let pool = init_store(&dir.path().join("test.db")).await.unwrap();
    (dir, pool)
}

fn sample_lead(channel_id: &str) -> Lead {
    let mut lead = Lead::harvested(channel_id, format!("Channel {}", channel_id), Utc::now());
    lead.keyword_source = Some("calculus explained".to_string());
    lead.metrics.subscriber_count = Some(42_000);
    lead
}

#[tokio::test]
async fn test_store_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("store.db");

    let result = init_store(&db_path).await;
    assert!(result.is_ok(), "store init failed: {:?}", result.err());
    assert!(db_path.exists());

    // Reopening is idempotent
    drop(result);
    assert!(init_store(&db_path).await.is_ok());
}

#[tokio::test]
async fn test_insert_and_load_roundtrip() {
    let (_dir, pool) = test_store().await;

    let lead = sample_lead("UC001");
    assert!(leads::insert_harvested(&pool, &lead).await.unwrap());

    let loaded = leads::get(&pool, "UC001").await.unwrap().unwrap();
    assert_eq!(loaded.channel_name, "Channel UC001");
    assert_eq!(loaded.status, LeadStatus::Harvested);
    assert_eq!(loaded.metrics.subscriber_count, Some(42_000));
    assert_eq!(loaded.keyword_source.as_deref(), Some("calculus explained"));
}

#[tokio::test]
async fn test_reharvest_does_not_regress_existing_lead() {
    let (_dir, pool) = test_store().await;

    leads::insert_harvested(&pool, &sample_lead("UC001"))
        .await
        .unwrap();
    leads::update_status(&pool, "UC001", LeadStatus::Qualified, false)
        .await
        .unwrap();

    // Same channel surfaces again in a later harvest
    let inserted = leads::insert_harvested(&pool, &sample_lead("UC001"))
        .await
        .unwrap();
    assert!(!inserted);

    let loaded = leads::get(&pool, "UC001").await.unwrap().unwrap();
    assert_eq!(loaded.status, LeadStatus::Qualified);
}

#[tokio::test]
async fn test_invalid_transition_rejected_unless_forced() {
    let (_dir, pool) = test_store().await;
    leads::insert_harvested(&pool, &sample_lead("UC001"))
        .await
        .unwrap();

    let err = leads::update_status(&pool, "UC001", LeadStatus::Sent, false).await;
    assert!(err.is_err(), "harvested -> sent must be rejected");

    // Operator override
    leads::update_status(&pool, "UC001", LeadStatus::Sent, true)
        .await
        .unwrap();
    let loaded = leads::get(&pool, "UC001").await.unwrap().unwrap();
    assert_eq!(loaded.status, LeadStatus::Sent);
}

#[tokio::test]
async fn test_save_persists_nested_structures() {
    let (_dir, pool) = test_store().await;
    leads::insert_harvested(&pool, &sample_lead("UC001"))
        .await
        .unwrap();

    let mut lead = leads::get(&pool, "UC001").await.unwrap().unwrap();
    lead.score = Some(12);
    lead.score_breakdown
        .push(outreach_common::models::ScoreDelta::new("subscriber_tier", 1));
    lead.email = Some("creator@example.com".to_string());
    lead.needs_review = true;
    leads::save(&pool, &lead).await.unwrap();

    let loaded = leads::get(&pool, "UC001").await.unwrap().unwrap();
    assert_eq!(loaded.score, Some(12));
    assert_eq!(loaded.score_breakdown.len(), 1);
    assert_eq!(loaded.score_breakdown[0].signal, "subscriber_tier");
    assert!(loaded.needs_review);
}

#[tokio::test]
async fn test_refinable_excludes_flagged_leads() {
    let (_dir, pool) = test_store().await;

    leads::insert_harvested(&pool, &sample_lead("UC001"))
        .await
        .unwrap();
    leads::insert_harvested(&pool, &sample_lead("UC002"))
        .await
        .unwrap();

    let mut flagged = leads::get(&pool, "UC002").await.unwrap().unwrap();
    flagged.needs_review = true;
    leads::save(&pool, &flagged).await.unwrap();

    let refinable = leads::get_refinable(&pool, None).await.unwrap();
    assert_eq!(refinable.len(), 1);
    assert_eq!(refinable[0].channel_id, "UC001");
}

#[tokio::test]
async fn test_status_counts_in_stage_order() {
    let (_dir, pool) = test_store().await;

    for id in ["UC001", "UC002", "UC003"] {
        leads::insert_harvested(&pool, &sample_lead(id)).await.unwrap();
    }
    leads::update_status(&pool, "UC003", LeadStatus::Qualified, false)
        .await
        .unwrap();

    let counts = leads::status_counts(&pool).await.unwrap();
    assert_eq!(
        counts,
        vec![(LeadStatus::Harvested, 2), (LeadStatus::Qualified, 1)]
    );
}

#[tokio::test]
async fn test_schedule_batch_persists_before_send() {
    let (_dir, pool) = test_store().await;

    for id in ["UC001", "UC002"] {
        leads::insert_harvested(&pool, &sample_lead(id)).await.unwrap();
    }

    let base = Utc::now();
    schedule::insert_batch(
        &pool,
        "batch-1",
        &[
            ("UC001".to_string(), base),
            ("UC002".to_string(), base + Duration::minutes(60)),
        ],
    )
    .await
    .unwrap();

    let pending = schedule::pending(&pool).await.unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending[0].scheduled_at < pending[1].scheduled_at);

    // Marking one sent removes it from the pending set only
    schedule::mark_sent(&pool, pending[0].id, Utc::now())
        .await
        .unwrap();
    let remaining = schedule::pending(&pool).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].channel_id, "UC002");

    // The full batch is still visible with its original timestamps
    let batch = schedule::latest_batch(&pool).await.unwrap();
    assert_eq!(batch.len(), 2);
    assert!(batch[0].sent_at.is_some());
    assert!(batch[1].sent_at.is_none());
}

#[tokio::test]
async fn test_cancel_pending_for_replied_lead() {
    let (_dir, pool) = test_store().await;
    leads::insert_harvested(&pool, &sample_lead("UC001"))
        .await
        .unwrap();

    schedule::insert_batch(&pool, "batch-1", &[("UC001".to_string(), Utc::now())])
        .await
        .unwrap();

    let cancelled = schedule::cancel_pending_for(&pool, "UC001").await.unwrap();
    assert_eq!(cancelled, 1);
    assert!(schedule::pending(&pool).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_keyword_dedup_and_ordering() {
    let (_dir, pool) = test_store().await;

    assert!(keywords::add(&pool, "Linear Algebra").await.unwrap());
    assert!(!keywords::add(&pool, "linear algebra").await.unwrap());
    assert!(keywords::add(&pool, "group theory").await.unwrap());

    keywords::mark_harvested(&pool, "linear algebra").await.unwrap();

    // Never-harvested keywords come first
    let list = keywords::list(&pool).await.unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].keyword, "group theory");
    assert!(list[0].last_harvested_at.is_none());
}

#[tokio::test]
async fn test_quota_resets_on_calendar_day() {
    let (_dir, pool) = test_store().await;

    let today = Utc::now();
    quota::increment(&pool, QuotaScope::Sender, "a@x.com", today)
        .await
        .unwrap();
    quota::increment(&pool, QuotaScope::Sender, "a@x.com", today)
        .await
        .unwrap();

    assert_eq!(
        quota::used_today(&pool, QuotaScope::Sender, "a@x.com", today)
            .await
            .unwrap(),
        2
    );

    // Other identities and scopes are independent
    assert_eq!(
        quota::used_today(&pool, QuotaScope::Sender, "b@x.com", today)
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        quota::used_today(&pool, QuotaScope::Upload, "a@x.com", today)
            .await
            .unwrap(),
        0
    );

    // The next calendar day starts from zero
    let tomorrow = today + Duration::days(1);
    assert_eq!(
        quota::used_today(&pool, QuotaScope::Sender, "a@x.com", tomorrow)
            .await
            .unwrap(),
        0
    );
}
