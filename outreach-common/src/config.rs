//! Configuration loading
//!
//! The config file is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. `OUTREACH_CONFIG` environment variable
//! 3. Platform config directory (`~/.config/outreach/outreach.toml`)
//!
//! Missing credentials for a stage are fatal at process start (a
//! configuration error is never recorded per-lead).

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Lead store settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let db_path = dirs::data_local_dir()
            .map(|d| d.join("outreach").join("outreach.db"))
            .unwrap_or_else(|| PathBuf::from("./outreach.db"));
        Self { db_path }
    }
}

/// Video-platform search/metadata source
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct YouTubeConfig {
    pub api_key: Option<String>,
    /// Videos fetched per keyword search
    pub max_videos_per_keyword: Option<u32>,
    /// Minimum milliseconds between API requests
    pub request_interval_ms: Option<u64>,
}

/// Text-generation service
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// One render-service account
#[derive(Debug, Clone, Deserialize)]
pub struct RenderAccount {
    pub identity: String,
    pub password: String,
}

/// Video-rendering service
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub api_base: Option<String>,
    pub player_base: Option<String>,
    pub accounts: Vec<RenderAccount>,
    /// Seconds between job status polls
    pub poll_interval_secs: Option<u64>,
    /// Hard bound on total poll time per job
    pub poll_timeout_secs: Option<u64>,
    /// Source audio is trimmed to this many seconds before rendering
    pub trim_seconds: Option<u64>,
    /// Directory for downloaded/trimmed audio
    pub audio_dir: Option<PathBuf>,
}

/// One SMTP sender account
#[derive(Debug, Clone, Deserialize)]
pub struct SenderAccount {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// Transactional email relay
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub senders: Vec<SenderAccount>,
    /// Display name used in the From header
    pub from_name: Option<String>,
    /// Optional hosted scheduling endpoint (accepts send_at, returns task id)
    pub relay_endpoint: Option<String>,
    /// Per-sender daily cap, reset on the calendar-day boundary
    pub max_per_sender_per_day: Option<u32>,
}

/// One upload channel credential
#[derive(Debug, Clone, Deserialize)]
pub struct UploadChannel {
    pub name: String,
    pub token: String,
}

/// Video-hosting upload API
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub endpoint: Option<String>,
    pub channels: Vec<UploadChannel>,
    /// Per-channel uploads allowed per calendar day
    pub daily_limit: Option<u32>,
}

/// Scoring thresholds (tunable constants, not derived)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub base_score: i32,
    /// Total at or above this qualifies
    pub qualify_threshold: i32,
    /// Total below this disqualifies; between the two is manual review
    pub review_floor: i32,
    /// Hard gate: known subscriber counts below this disqualify outright
    pub min_subscribers: i64,
    /// Channels with more videos are treated as content farms
    pub max_video_count: i64,
    /// Disqualify non-English channels outside the tolerated set
    pub english_only: bool,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_score: 5,
            qualify_threshold: 7,
            review_floor: 5,
            min_subscribers: 5_000,
            max_video_count: 2_500,
            english_only: true,
        }
    }
}

/// Follow-up cadence
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FollowupConfig {
    /// Days after initial contact at which each follow-up is due
    pub offsets_days: Vec<i64>,
}

impl Default for FollowupConfig {
    fn default() -> Self {
        Self {
            offsets_days: vec![3, 7, 10, 15],
        }
    }
}

/// Dispatch pacing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Minutes between scheduled sends
    pub interval_minutes: i64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 60,
        }
    }
}

/// Harvest stage tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Bounded fan-out for channel-stat fetches and refine batches
    pub workers: usize,
    /// Fast keyword-based disqualification list (obvious non-fits)
    pub disqualify_keywords: Vec<String>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        let disqualify_keywords = [
            "vlog", "reaction", "unboxing", "gaming", "gameplay", "let's play",
            "mukbang", "asmr", "podcast", "news", "politics", "cooking", "recipe",
            "travel", "fashion", "makeup", "beauty", "fitness", "workout", "sports",
            "movie review", "music video", "song", "cover", "remix", "trailer",
            "prank",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        Self {
            workers: 4,
            disqualify_keywords,
        }
    }
}

/// Top-level pipeline configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutreachConfig {
    pub store: StoreConfig,
    pub youtube: YouTubeConfig,
    pub llm: LlmConfig,
    pub render: RenderConfig,
    pub email: EmailConfig,
    pub upload: UploadConfig,
    pub scoring: ScoringConfig,
    pub followup: FollowupConfig,
    pub dispatch: DispatchConfig,
    pub harvest: HarvestConfig,
}

impl OutreachConfig {
    /// Load configuration following the priority order above.
    ///
    /// A missing file is not an error when no explicit path was given:
    /// every section has workable defaults and credentials are validated
    /// per stage.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_path {
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var("OUTREACH_CONFIG") {
            return Self::from_file(Path::new(&path));
        }

        let default_path = dirs::config_dir().map(|d| d.join("outreach").join("outreach.toml"));
        if let Some(path) = default_path {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Parse a specific config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Validate credentials the harvest stage needs
    pub fn require_youtube(&self) -> Result<&str> {
        self.youtube
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("youtube.api_key is not set".into()))
    }

    /// Validate credentials the refine/draft stages need
    pub fn require_llm(&self) -> Result<(&str, &str)> {
        let endpoint = self
            .llm
            .endpoint
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Config("llm.endpoint is not set".into()))?;
        let api_key = self
            .llm
            .api_key
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Config("llm.api_key is not set".into()))?;
        Ok((endpoint, api_key))
    }

    /// Validate credentials the asset stage needs
    pub fn require_render(&self) -> Result<()> {
        if self.render.api_base.as_deref().unwrap_or("").is_empty() {
            return Err(Error::Config("render.api_base is not set".into()));
        }
        if self.render.accounts.is_empty() {
            return Err(Error::Config("render.accounts is empty".into()));
        }
        Ok(())
    }

    /// Validate credentials the dispatch/follow-up stages need
    pub fn require_smtp(&self) -> Result<()> {
        if self.email.smtp_host.as_deref().unwrap_or("").is_empty() {
            return Err(Error::Config("email.smtp_host is not set".into()));
        }
        if self.email.senders.is_empty() {
            return Err(Error::Config("email.senders is empty".into()));
        }
        Ok(())
    }

    /// Validate credentials the upload stage needs
    pub fn require_upload(&self) -> Result<()> {
        if self.upload.endpoint.as_deref().unwrap_or("").is_empty() {
            return Err(Error::Config("upload.endpoint is not set".into()));
        }
        if self.upload.channels.is_empty() {
            return Err(Error::Config("upload.channels is empty".into()));
        }
        Ok(())
    }
}
