//! Metric scorer
//!
//! Pure bucket functions over harvested channel metrics. Unknown metrics
//! contribute nothing; the two hard gates (subscriber floor, content-farm
//! video count) emit disqualifying deltas that the aggregator treats as
//! absolute.

use chrono::{DateTime, Utc};
use outreach_common::models::{ChannelMetrics, ScoreDelta};

/// Hard gate: channels below this many subscribers are too small to
/// convert
pub const MIN_SUBSCRIBERS: i64 = 5_000;

/// Hard gate: more videos than this means a content farm, not a creator
pub const MAX_VIDEO_COUNT: i64 = 2_500;

fn subscriber_delta(count: i64, min_subscribers: i64) -> ScoreDelta {
    if count < min_subscribers {
        return ScoreDelta::disqualify(
            "subscriber_tier",
            format!("{} subscribers, below the {} floor", count, min_subscribers),
        );
    }

    // Mid-size channels convert best; very large ones rarely answer cold
    // email, so the top bucket scores below the middle one
    let points = if count < 100_000 {
        1
    } else if count < 1_000_000 {
        3
    } else {
        2
    };
    ScoreDelta::new("subscriber_tier", points)
}

fn view_delta(count: i64) -> Option<ScoreDelta> {
    let points = if count >= 1_000_000 {
        2
    } else if count >= 100_000 {
        1
    } else {
        return None;
    };
    Some(ScoreDelta::new("view_tier", points))
}

fn age_delta(age_years: f64) -> Option<ScoreDelta> {
    let points = if age_years >= 2.0 {
        2
    } else if age_years >= 0.5 {
        1
    } else {
        return None;
    };
    Some(ScoreDelta::new("channel_age", points))
}

fn cadence_delta(uploads_per_month: f64) -> Option<ScoreDelta> {
    let points = if uploads_per_month >= 4.0 {
        2
    } else if uploads_per_month >= 1.0 {
        1
    } else {
        return None;
    };
    Some(ScoreDelta::new("upload_cadence", points))
}

/// Score the programmatic metrics of a lead
pub fn score_metrics(
    metrics: &ChannelMetrics,
    email_present: bool,
    min_subscribers: i64,
    max_video_count: i64,
    now: DateTime<Utc>,
) -> Vec<ScoreDelta> {
    let mut deltas = Vec::new();

    if let Some(count) = metrics.video_count {
        if count > max_video_count {
            deltas.push(ScoreDelta::disqualify(
                "content_farm",
                format!("{} videos, above the {} ceiling", count, max_video_count),
            ));
        }
    }

    if let Some(count) = metrics.subscriber_count {
        deltas.push(subscriber_delta(count, min_subscribers));
    }

    if let Some(count) = metrics.view_count {
        deltas.extend(view_delta(count));
    }

    if let Some(age) = metrics.age_years(now) {
        deltas.extend(age_delta(age));
    }

    if let Some(cadence) = metrics.uploads_per_month {
        deltas.extend(cadence_delta(cadence));
    }

    if email_present {
        deltas.push(ScoreDelta::new("email_present", 1));
    }

    if let Some(rate) = metrics.engagement_rate {
        if rate >= 5.0 {
            deltas.push(ScoreDelta::new("engagement", 1));
        }
    }

    deltas
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn score(metrics: &ChannelMetrics, email: bool) -> Vec<ScoreDelta> {
        score_metrics(metrics, email, MIN_SUBSCRIBERS, MAX_VIDEO_COUNT, Utc::now())
    }

    fn points_of(deltas: &[ScoreDelta], signal: &str) -> Option<i32> {
        deltas.iter().find(|d| d.signal == signal).map(|d| d.points)
    }

    #[test]
    fn test_subscriber_buckets() {
        assert_eq!(subscriber_delta(5_000, MIN_SUBSCRIBERS).points, 1);
        assert_eq!(subscriber_delta(200_000, MIN_SUBSCRIBERS).points, 3);
        assert_eq!(subscriber_delta(2_000_000, MIN_SUBSCRIBERS).points, 2);
    }

    #[test]
    fn test_subscriber_floor_disqualifies() {
        let delta = subscriber_delta(3_000, MIN_SUBSCRIBERS);
        assert!(delta.disqualify.is_some());
        assert_eq!(delta.points, 0);
    }

    #[test]
    fn test_unknown_metrics_contribute_nothing() {
        let deltas = score(&ChannelMetrics::default(), false);
        assert!(deltas.is_empty());
    }

    #[test]
    fn test_content_farm_gate() {
        let metrics = ChannelMetrics {
            video_count: Some(9_000),
            subscriber_count: Some(500_000),
            ..Default::default()
        };
        let deltas = score(&metrics, false);
        assert!(deltas
            .iter()
            .any(|d| d.signal == "content_farm" && d.disqualify.is_some()));
    }

    #[test]
    fn test_age_and_cadence_buckets() {
        let metrics = ChannelMetrics {
            channel_published_at: Some(Utc::now() - Duration::days(365)),
            uploads_per_month: Some(5.0),
            ..Default::default()
        };
        let deltas = score(&metrics, false);
        assert_eq!(points_of(&deltas, "channel_age"), Some(1));
        assert_eq!(points_of(&deltas, "upload_cadence"), Some(2));
    }

    #[test]
    fn test_engagement_threshold() {
        let hot = ChannelMetrics {
            engagement_rate: Some(6.2),
            ..Default::default()
        };
        let cold = ChannelMetrics {
            engagement_rate: Some(4.9),
            ..Default::default()
        };
        assert_eq!(points_of(&score(&hot, false), "engagement"), Some(1));
        assert_eq!(points_of(&score(&cold, false), "engagement"), None);
    }

    #[test]
    fn test_deterministic_for_identical_input() {
        let metrics = ChannelMetrics {
            subscriber_count: Some(42_000),
            view_count: Some(3_000_000),
            uploads_per_month: Some(2.0),
            ..Default::default()
        };
        // age_years depends on now, so pin it
        let now = Utc::now();
        let a = score_metrics(&metrics, true, MIN_SUBSCRIBERS, MAX_VIDEO_COUNT, now);
        let b = score_metrics(&metrics, true, MIN_SUBSCRIBERS, MAX_VIDEO_COUNT, now);
        assert_eq!(a, b);
    }
}
