//! Dispatch scheduler
//!
//! Pure schedule construction: one timestamp per lead, strictly
//! increasing, separated by exactly the configured interval. The runner
//! persists the result before the first send; this module never touches
//! the store or the clock.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Fresh batch identifier
pub fn new_batch_id() -> String {
    Uuid::new_v4().to_string()
}

/// Assign send timestamps to leads: the first at `start`, each
/// subsequent one `interval_minutes` later. A non-positive interval is
/// clamped to one minute so the timestamps stay strictly increasing.
pub fn build_schedule(
    channel_ids: &[String],
    start: DateTime<Utc>,
    interval_minutes: i64,
) -> Vec<(String, DateTime<Utc>)> {
    let interval_minutes = interval_minutes.max(1);
    channel_ids
        .iter()
        .enumerate()
        .map(|(i, channel_id)| {
            (
                channel_id.clone(),
                start + Duration::minutes(interval_minutes * i as i64),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_strictly_increasing_by_interval() {
        let ids: Vec<String> = (0..5).map(|i| format!("UC{:03}", i)).collect();
        let start = Utc::now();

        let schedule = build_schedule(&ids, start, 60);

        assert_eq!(schedule.len(), 5);
        assert_eq!(schedule[0].1, start);
        for pair in schedule.windows(2) {
            assert_eq!(pair[1].1 - pair[0].1, Duration::minutes(60));
            assert!(pair[1].1 > pair[0].1);
        }
    }

    #[test]
    fn test_empty_input_yields_empty_schedule() {
        assert!(build_schedule(&[], Utc::now(), 60).is_empty());
    }

    #[test]
    fn test_non_positive_interval_clamped_to_one_minute() {
        let ids: Vec<String> = (0..3).map(|i| format!("UC{:03}", i)).collect();
        let start = Utc::now();

        for interval in [0, -5] {
            let schedule = build_schedule(&ids, start, interval);
            for pair in schedule.windows(2) {
                assert_eq!(pair[1].1 - pair[0].1, Duration::minutes(1));
            }
        }
    }

    #[test]
    fn test_order_matches_input_order() {
        let ids = vec!["UC_b".to_string(), "UC_a".to_string()];
        let schedule = build_schedule(&ids, Utc::now(), 30);
        assert_eq!(schedule[0].0, "UC_b");
        assert_eq!(schedule[1].0, "UC_a");
    }
}
