//! Render-service client
//!
//! Submits animation jobs and polls them to completion. Sessions are
//! token-based per account; tokens are cached and refreshed once on a
//! 401 so two parallel jobs under different accounts never re-login on
//! every poll.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

use outreach_common::config::RenderAccount;

/// Render client errors
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Authentication failed for {0}")]
    AuthFailed(String),

    #[error("Render job failed: {0}")]
    JobFailed(String),

    #[error("Render job timed out after {0:?}")]
    JobTimedOut(Duration),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Observed state of a render job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Rendering,
    Done { raw_url: String },
    Failed { message: String },
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    identity: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    render_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    render_id: &'a str,
    title: &'a str,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    slug: String,
}

/// Render-service client
pub struct RenderClient {
    http_client: reqwest::Client,
    api_base: String,
    player_base: Option<String>,
    tokens: Mutex<HashMap<String, String>>,
}

impl RenderClient {
    pub fn new(
        api_base: impl Into<String>,
        player_base: Option<String>,
    ) -> Result<Self, RenderError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| RenderError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            api_base: api_base.into(),
            player_base,
            tokens: Mutex::new(HashMap::new()),
        })
    }

    async fn login(&self, account: &RenderAccount) -> Result<String, RenderError> {
        let response = self
            .http_client
            .post(format!("{}/auth/login", self.api_base))
            .json(&LoginRequest {
                identity: &account.identity,
                password: &account.password,
            })
            .send()
            .await
            .map_err(|e| RenderError::NetworkError(e.to_string()))?;

        if response.status() == 401 || response.status() == 403 {
            return Err(RenderError::AuthFailed(account.identity.clone()));
        }
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RenderError::ApiError(status.as_u16(), error_text));
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| RenderError::ParseError(e.to_string()))?;

        tracing::debug!(account = %account.identity, "Render login ok");
        Ok(body.token)
    }

    /// Cached token for an account, logging in on first use
    async fn token(&self, account: &RenderAccount) -> Result<String, RenderError> {
        {
            let tokens = self.tokens.lock().await;
            if let Some(token) = tokens.get(&account.identity) {
                return Ok(token.clone());
            }
        }

        let token = self.login(account).await?;
        self.tokens
            .lock()
            .await
            .insert(account.identity.clone(), token.clone());
        Ok(token)
    }

    async fn invalidate_token(&self, account: &RenderAccount) {
        self.tokens.lock().await.remove(&account.identity);
    }

    /// Submit a render job: the source video plus the trimmed audio track.
    /// Returns the render id to poll.
    pub async fn submit_job(
        &self,
        account: &RenderAccount,
        source_video_url: &str,
        audio_path: &Path,
    ) -> Result<String, RenderError> {
        let token = self.token(account).await?;

        let audio = tokio::fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.mp3".to_string());

        let form = reqwest::multipart::Form::new()
            .text("source_url", source_video_url.to_string())
            .part(
                "audio",
                reqwest::multipart::Part::bytes(audio).file_name(file_name),
            );

        let response = self
            .http_client
            .post(format!("{}/renders", self.api_base))
            .bearer_auth(&token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| RenderError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status == 401 {
            // Stale token; the caller retries the whole submit
            self.invalidate_token(account).await;
            return Err(RenderError::AuthFailed(account.identity.clone()));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RenderError::ApiError(status.as_u16(), error_text));
        }

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| RenderError::ParseError(e.to_string()))?;

        tracing::info!(
            account = %account.identity,
            render_id = %body.render_id,
            "Render job submitted"
        );
        Ok(body.render_id)
    }

    /// One status poll
    pub async fn job_state(
        &self,
        account: &RenderAccount,
        render_id: &str,
    ) -> Result<JobState, RenderError> {
        let token = self.token(account).await?;

        let response = self
            .http_client
            .get(format!("{}/renders/{}", self.api_base, render_id))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| RenderError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status == 401 {
            self.invalidate_token(account).await;
            return Err(RenderError::AuthFailed(account.identity.clone()));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RenderError::ApiError(status.as_u16(), error_text));
        }

        let body: StatusResponse = response
            .json()
            .await
            .map_err(|e| RenderError::ParseError(e.to_string()))?;

        Ok(match body.status.as_str() {
            "queued" | "pending" => JobState::Queued,
            "rendering" | "processing" => JobState::Rendering,
            "done" | "completed" => JobState::Done {
                raw_url: body.video_url.ok_or_else(|| {
                    RenderError::ParseError("completed job without video_url".into())
                })?,
            },
            other => JobState::Failed {
                message: body.error.unwrap_or_else(|| other.to_string()),
            },
        })
    }

    /// Poll a job until it finishes, erroring at `timeout`
    pub async fn wait_for_job(
        &self,
        account: &RenderAccount,
        render_id: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<String, RenderError> {
        let started = tokio::time::Instant::now();

        loop {
            match self.job_state(account, render_id).await? {
                JobState::Done { raw_url } => return Ok(raw_url),
                JobState::Failed { message } => return Err(RenderError::JobFailed(message)),
                JobState::Queued | JobState::Rendering => {
                    if started.elapsed() >= timeout {
                        return Err(RenderError::JobTimedOut(timeout));
                    }
                    tracing::debug!(render_id = %render_id, "Render still running");
                    tokio::time::sleep(poll_interval).await;
                }
            }
        }
    }

    /// Register a finished render with the branded player, returning the
    /// shareable player URL
    pub async fn register_player(
        &self,
        render_id: &str,
        title: &str,
    ) -> Result<String, RenderError> {
        let player_base = self
            .player_base
            .as_deref()
            .ok_or_else(|| RenderError::ParseError("player_base not configured".into()))?;

        let response = self
            .http_client
            .post(format!("{}/register", player_base))
            .json(&RegisterRequest { render_id, title })
            .send()
            .await
            .map_err(|e| RenderError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RenderError::ApiError(status.as_u16(), error_text));
        }

        let body: RegisterResponse = response
            .json()
            .await
            .map_err(|e| RenderError::ParseError(e.to_string()))?;

        Ok(format!("{}/v/{}", player_base, body.slug))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_string_mapping() {
        let raw = r#"{"status": "completed", "video_url": "https://cdn.example/r1.mp4"}"#;
        let parsed: StatusResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.status, "completed");
        assert_eq!(parsed.video_url.as_deref(), Some("https://cdn.example/r1.mp4"));

        let raw = r#"{"status": "error", "error": "out of credits"}"#;
        let parsed: StatusResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.error.as_deref(), Some("out of credits"));
    }
}
