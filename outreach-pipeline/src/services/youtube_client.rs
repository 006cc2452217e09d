//! YouTube Data API client
//!
//! Covers the three calls the pipeline needs: keyword search, channel
//! statistics, and recent-video statistics for engagement. All requests
//! go through a shared rate limiter so parallel workers cannot burn the
//! daily API quota in a burst.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

const API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
const DEFAULT_RATE_LIMIT_MS: u64 = 200;
const PAGE_SIZE: u32 = 50;

/// YouTube client errors
#[derive(Debug, Error)]
pub enum YtError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    #[error("API quota exhausted")]
    QuotaExhausted,

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// One video surfaced by keyword search
#[derive(Debug, Clone)]
pub struct VideoHit {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub channel_id: String,
    pub channel_title: String,
}

impl VideoHit {
    pub fn url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }
}

/// Channel snippet + statistics
#[derive(Debug, Clone)]
pub struct ChannelDetail {
    pub channel_id: String,
    pub title: String,
    pub description: String,
    pub custom_url: Option<String>,
    pub country: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub subscriber_count: Option<i64>,
    pub view_count: Option<i64>,
    pub video_count: Option<i64>,
}

impl ChannelDetail {
    pub fn url(&self) -> String {
        match &self.custom_url {
            Some(handle) => format!("https://www.youtube.com/{}", handle),
            None => format!("https://www.youtube.com/channel/{}", self.channel_id),
        }
    }
}

/// Like/comment/view counts of one video
#[derive(Debug, Clone, Default)]
pub struct VideoStats {
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
}

// Wire types. The API returns statistics counters as JSON strings.

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: SearchSnippet,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchSnippet {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "channelId")]
    channel_id: String,
    #[serde(rename = "channelTitle")]
    channel_title: String,
}

#[derive(Debug, Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    id: String,
    snippet: ChannelSnippet,
    statistics: ChannelStatistics,
}

#[derive(Debug, Deserialize)]
struct ChannelSnippet {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "customUrl")]
    custom_url: Option<String>,
    country: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ChannelStatistics {
    #[serde(rename = "subscriberCount")]
    subscriber_count: Option<String>,
    #[serde(rename = "hiddenSubscriberCount", default)]
    hidden_subscriber_count: bool,
    #[serde(rename = "viewCount")]
    view_count: Option<String>,
    #[serde(rename = "videoCount")]
    video_count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    statistics: VideoStatistics,
}

#[derive(Debug, Deserialize)]
struct VideoStatistics {
    #[serde(rename = "viewCount")]
    view_count: Option<String>,
    #[serde(rename = "likeCount")]
    like_count: Option<String>,
    #[serde(rename = "commentCount")]
    comment_count: Option<String>,
}

fn parse_count(raw: &Option<String>) -> Option<i64> {
    raw.as_deref().and_then(|s| s.parse().ok())
}

/// Spaces API calls out to at least one per `min_interval`. Every search
/// call costs 100 quota units, so pacing here is what keeps a long
/// harvest run inside the daily quota.
struct RateLimiter {
    last_call: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_call: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Sleep out the remainder of the interval, then claim the slot.
    /// Holding the lock across the sleep serializes concurrent callers.
    async fn wait(&self) {
        let mut last_call = self.last_call.lock().await;

        if let Some(last) = *last_call {
            let remaining = self.min_interval.saturating_sub(last.elapsed());
            if !remaining.is_zero() {
                tracing::debug!(wait = ?remaining, "Pacing API call");
                tokio::time::sleep(remaining).await;
            }
        }

        *last_call = Some(Instant::now());
    }
}

/// YouTube Data API client
pub struct YouTubeClient {
    http_client: reqwest::Client,
    api_key: String,
    rate_limiter: Arc<RateLimiter>,
}

impl YouTubeClient {
    pub fn new(api_key: impl Into<String>, rate_limit_ms: Option<u64>) -> Result<Self, YtError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| YtError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key: api_key.into(),
            rate_limiter: Arc::new(RateLimiter::new(
                rate_limit_ms.unwrap_or(DEFAULT_RATE_LIMIT_MS),
            )),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<T, YtError> {
        self.rate_limiter.wait().await;

        let response = self
            .http_client
            .get(url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| YtError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status == 403 {
            // Quota exhaustion and key problems both arrive as 403
            return Err(YtError::QuotaExhausted);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(YtError::ApiError(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| YtError::ParseError(e.to_string()))
    }

    /// Search videos by keyword, paging until `max_results`
    pub async fn search_videos(
        &self,
        keyword: &str,
        max_results: u32,
    ) -> Result<Vec<VideoHit>, YtError> {
        let url = format!("{}/search", API_BASE_URL);
        let mut hits = Vec::new();
        let mut page_token: Option<String> = None;

        while (hits.len() as u32) < max_results {
            let page_size = PAGE_SIZE.min(max_results - hits.len() as u32).to_string();
            let mut params = vec![
                ("part", "snippet"),
                ("type", "video"),
                ("q", keyword),
                ("maxResults", page_size.as_str()),
            ];
            if let Some(token) = &page_token {
                params.push(("pageToken", token.as_str()));
            }

            let page: SearchResponse = self.get_json(&url, &params).await?;

            for item in page.items {
                if let Some(video_id) = item.id.video_id {
                    hits.push(VideoHit {
                        video_id,
                        title: item.snippet.title,
                        description: item.snippet.description,
                        channel_id: item.snippet.channel_id,
                        channel_title: item.snippet.channel_title,
                    });
                }
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::info!(keyword = %keyword, hits = hits.len(), "Keyword search complete");
        Ok(hits)
    }

    /// Fetch channel snippet and statistics
    pub async fn channel_detail(&self, channel_id: &str) -> Result<ChannelDetail, YtError> {
        let url = format!("{}/channels", API_BASE_URL);
        let response: ChannelListResponse = self
            .get_json(&url, &[("part", "snippet,statistics"), ("id", channel_id)])
            .await?;

        let item = response
            .items
            .into_iter()
            .next()
            .ok_or_else(|| YtError::ChannelNotFound(channel_id.to_string()))?;

        let subscriber_count = if item.statistics.hidden_subscriber_count {
            None
        } else {
            parse_count(&item.statistics.subscriber_count)
        };

        Ok(ChannelDetail {
            channel_id: item.id,
            title: item.snippet.title,
            description: item.snippet.description,
            custom_url: item.snippet.custom_url,
            country: item.snippet.country.map(|c| c.to_lowercase()),
            published_at: item.snippet.published_at,
            subscriber_count,
            view_count: parse_count(&item.statistics.view_count),
            video_count: parse_count(&item.statistics.video_count),
        })
    }

    /// Most recent video ids of a channel, newest first
    pub async fn recent_video_ids(
        &self,
        channel_id: &str,
        max_results: u32,
    ) -> Result<Vec<String>, YtError> {
        let url = format!("{}/search", API_BASE_URL);
        let page_size = PAGE_SIZE.min(max_results).to_string();
        let response: SearchResponse = self
            .get_json(
                &url,
                &[
                    ("part", "snippet"),
                    ("type", "video"),
                    ("channelId", channel_id),
                    ("order", "date"),
                    ("maxResults", page_size.as_str()),
                ],
            )
            .await?;

        Ok(response
            .items
            .into_iter()
            .filter_map(|item| item.id.video_id)
            .collect())
    }

    /// Statistics for a batch of videos (up to one API page)
    pub async fn video_stats(&self, video_ids: &[String]) -> Result<Vec<VideoStats>, YtError> {
        if video_ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/videos", API_BASE_URL);
        let ids = video_ids.join(",");
        let response: VideoListResponse = self
            .get_json(&url, &[("part", "statistics"), ("id", ids.as_str())])
            .await?;

        Ok(response
            .items
            .into_iter()
            .map(|item| VideoStats {
                view_count: parse_count(&item.statistics.view_count).unwrap_or(0),
                like_count: parse_count(&item.statistics.like_count).unwrap_or(0),
                comment_count: parse_count(&item.statistics.comment_count).unwrap_or(0),
            })
            .collect())
    }
}

/// Average (likes + comments) / views over a sample of recent videos,
/// as a percentage. None when no video had views.
pub fn engagement_rate(stats: &[VideoStats]) -> Option<f64> {
    let rates: Vec<f64> = stats
        .iter()
        .filter(|s| s.view_count > 0)
        .map(|s| (s.like_count + s.comment_count) as f64 / s.view_count as f64 * 100.0)
        .collect();

    if rates.is_empty() {
        None
    } else {
        Some(rates.iter().sum::<f64>() / rates.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = YouTubeClient::new("test-key", None);
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_rate_limiter_timing() {
        let limiter = RateLimiter::new(200);

        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        limiter.wait().await;

        assert!(start.elapsed() >= Duration::from_millis(350));
    }

    #[test]
    fn test_engagement_rate_skips_zero_view_videos() {
        let stats = vec![
            VideoStats {
                view_count: 1000,
                like_count: 40,
                comment_count: 10,
            },
            VideoStats {
                view_count: 0,
                like_count: 0,
                comment_count: 0,
            },
        ];

        // 50 interactions / 1000 views = 5%
        assert_eq!(engagement_rate(&stats), Some(5.0));
        assert_eq!(engagement_rate(&[]), None);
    }

    #[test]
    fn test_statistics_counters_parse_from_strings() {
        let raw = r#"{
            "items": [{
                "id": "UC123",
                "snippet": {
                    "title": "Math Channel",
                    "description": "Lectures",
                    "customUrl": "@mathchannel",
                    "country": "US",
                    "publishedAt": "2020-01-15T00:00:00Z"
                },
                "statistics": {
                    "subscriberCount": "42000",
                    "hiddenSubscriberCount": false,
                    "viewCount": "1500000",
                    "videoCount": "120"
                }
            }]
        }"#;

        let response: ChannelListResponse = serde_json::from_str(raw).unwrap();
        let item = &response.items[0];
        assert_eq!(parse_count(&item.statistics.subscriber_count), Some(42000));
        assert_eq!(parse_count(&item.statistics.video_count), Some(120));
        assert_eq!(item.snippet.custom_url.as_deref(), Some("@mathchannel"));
    }
}
