//! Duration probing via ffprobe.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// The subset of `ffprobe -of json` the sampler reads.
#[derive(Debug, Deserialize)]
struct DurationReport {
    #[serde(default)]
    streams: Vec<serde_json::Value>,
    format: Option<DurationFormat>,
}

#[derive(Debug, Deserialize)]
struct DurationFormat {
    duration: Option<String>,
}

/// Length of a video in seconds.
///
/// Fails when the container has no video stream or reports no usable
/// duration, since keyframe timestamps cannot be placed without one.
pub async fn probe_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=index:format=duration",
            "-of",
            "json",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("could not read duration of {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_duration(&output.stdout)
}

fn parse_duration(stdout: &[u8]) -> MediaResult<f64> {
    let report: DurationReport = serde_json::from_slice(stdout)?;
    if report.streams.is_empty() {
        return Err(MediaError::invalid_video("no video stream"));
    }

    report
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| MediaError::invalid_video("container reports no duration"))
}
