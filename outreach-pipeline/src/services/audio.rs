//! Source audio extraction
//!
//! Shells out to yt-dlp for the audio track and ffmpeg for trimming.
//! Both binaries must be on PATH; a missing binary surfaces as a spawn
//! error with the command name in the message.

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Audio extraction errors
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Failed to spawn {0}: {1}")]
    SpawnFailed(&'static str, std::io::Error),

    #[error("{0} exited with {1}: {2}")]
    CommandFailed(&'static str, i32, String),

    #[error("Expected output file missing: {0}")]
    OutputMissing(PathBuf),
}

fn check_output(
    name: &'static str,
    output: &std::process::Output,
) -> Result<(), AudioError> {
    if output.status.success() {
        return Ok(());
    }

    let code = output.status.code().unwrap_or(-1);
    let stderr = String::from_utf8_lossy(&output.stderr);
    // Keep the tail; yt-dlp progress spam can run to megabytes
    let tail: String = stderr
        .lines()
        .rev()
        .take(5)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n");

    Err(AudioError::CommandFailed(name, code, tail))
}

/// Download the audio track of a video as mp3
pub async fn fetch_audio(
    video_url: &str,
    video_id: &str,
    out_dir: &Path,
) -> Result<PathBuf, AudioError> {
    let out_path = out_dir.join(format!("{}.mp3", video_id));

    tracing::info!(video_url = %video_url, "Fetching source audio");

    let output = Command::new("yt-dlp")
        .arg("--extract-audio")
        .arg("--audio-format")
        .arg("mp3")
        .arg("--no-playlist")
        .arg("-o")
        .arg(out_dir.join(format!("{}.%(ext)s", video_id)))
        .arg(video_url)
        .output()
        .await
        .map_err(|e| AudioError::SpawnFailed("yt-dlp", e))?;

    check_output("yt-dlp", &output)?;

    if !out_path.exists() {
        return Err(AudioError::OutputMissing(out_path));
    }

    Ok(out_path)
}

/// Trim audio to the leading `duration`, re-encoded as mp3
pub async fn trim_audio(
    input: &Path,
    duration: Duration,
) -> Result<PathBuf, AudioError> {
    let out_path = input.with_extension("trimmed.mp3");

    let output = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(input)
        .arg("-t")
        .arg(duration.as_secs().to_string())
        .arg("-acodec")
        .arg("libmp3lame")
        .arg(&out_path)
        .output()
        .await
        .map_err(|e| AudioError::SpawnFailed("ffmpeg", e))?;

    check_output("ffmpeg", &output)?;

    if !out_path.exists() {
        return Err(AudioError::OutputMissing(out_path));
    }

    Ok(out_path)
}
