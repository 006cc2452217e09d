//! Video-host upload client
//!
//! Publishes an approved render to a hosting channel. Channels carry a
//! small daily upload allowance, tracked in the store and rotated the
//! same way sender accounts are.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::time::Duration;
use thiserror::Error;

use outreach_common::config::UploadChannel;
use outreach_common::db::quota::{self, QuotaScope};

const DEFAULT_DAILY_LIMIT: u32 = 5;

/// Upload client errors
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("All upload channels at daily limit")]
    AllChannelsExhausted,

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Store error: {0}")]
    Store(#[from] outreach_common::Error),
}

#[derive(Debug, Serialize)]
struct UploadRequest<'a> {
    source_url: &'a str,
    title: &'a str,
    description: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

/// Video-host upload client
pub struct UploadClient {
    http_client: reqwest::Client,
    endpoint: String,
    channels: Vec<UploadChannel>,
    daily_limit: u32,
}

impl UploadClient {
    pub fn new(
        endpoint: impl Into<String>,
        channels: Vec<UploadChannel>,
        daily_limit: Option<u32>,
    ) -> Result<Self, UploadError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| UploadError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
            channels,
            daily_limit: daily_limit.unwrap_or(DEFAULT_DAILY_LIMIT),
        })
    }

    /// First channel with remaining daily allowance
    pub async fn next_channel(
        &self,
        pool: &SqlitePool,
        now: DateTime<Utc>,
    ) -> Result<&UploadChannel, UploadError> {
        for channel in &self.channels {
            let used = quota::used_today(pool, QuotaScope::Upload, &channel.name, now).await?;
            if used < self.daily_limit as i64 {
                return Ok(channel);
            }
        }

        Err(UploadError::AllChannelsExhausted)
    }

    /// Publish a finished render by its raw URL, returning the hosted URL
    pub async fn publish(
        &self,
        pool: &SqlitePool,
        channel: &UploadChannel,
        raw_url: &str,
        title: &str,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<String, UploadError> {
        let response = self
            .http_client
            .post(format!("{}/uploads", self.endpoint))
            .bearer_auth(&channel.token)
            .json(&UploadRequest {
                source_url: raw_url,
                title,
                description,
            })
            .send()
            .await
            .map_err(|e| UploadError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(UploadError::ApiError(status.as_u16(), error_text));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| UploadError::ParseError(e.to_string()))?;

        quota::increment(pool, QuotaScope::Upload, &channel.name, now).await?;

        tracing::info!(channel = %channel.name, url = %body.url, "Render published");
        Ok(body.url)
    }
}
