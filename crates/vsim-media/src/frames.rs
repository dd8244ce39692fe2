//! Keyframe sampling and whole-video ingestion.

use std::path::Path;

use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_duration;

/// Width sampled frames are scaled to (height keeps aspect ratio).
pub const FRAME_SCALE_WIDTH: u32 = 480;

/// FFmpeg JPEG qscale for sampled frames.
pub const FRAME_JPEG_QUALITY: u8 = 4;

/// Default number of sampled keyframes.
pub const DEFAULT_FRAME_COUNT: usize = 10;

/// Per-frame FFmpeg timeout.
const FRAME_TIMEOUT_SECS: u64 = 30;

/// An inline media blob with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl MediaPayload {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// A JPEG still.
    pub fn jpeg(data: Vec<u8>) -> Self {
        Self::new("image/jpeg", data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Timestamps for `count` evenly spaced samples.
///
/// The timeline is split into `count + 1` steps and the samples land on the
/// inner boundaries, so the very first and last instants (often black) are
/// never sampled.
pub fn sample_timestamps(duration: f64, count: usize) -> Vec<f64> {
    if count == 0 || !duration.is_finite() || duration <= 0.0 {
        return Vec::new();
    }
    let step = duration / (count as f64 + 1.0);
    (1..=count).map(|i| step * i as f64).collect()
}

/// Sample `count` JPEG keyframes from a video, in timeline order.
pub async fn extract_frames(
    video: impl AsRef<Path>,
    count: usize,
) -> MediaResult<Vec<MediaPayload>> {
    let video = video.as_ref();
    let duration = probe_duration(video).await?;

    let timestamps = sample_timestamps(duration, count);
    if timestamps.is_empty() {
        return Err(MediaError::invalid_video(format!(
            "cannot sample {} frames from a {:.2}s video",
            count, duration
        )));
    }

    let workdir = tempfile::tempdir()?;
    let runner = FfmpegRunner::new().with_timeout(FRAME_TIMEOUT_SECS);
    let filter = format!("scale={}:-2", FRAME_SCALE_WIDTH);
    let mut frames = Vec::with_capacity(timestamps.len());

    for (i, ts) in timestamps.iter().enumerate() {
        let output = workdir.path().join(format!("frame_{:02}.jpg", i + 1));
        let cmd = FfmpegCommand::new(video, &output)
            .seek(*ts)
            .single_frame()
            .video_filter(&filter)
            .jpeg_quality(FRAME_JPEG_QUALITY);

        runner.run(&cmd).await?;

        let data = tokio::fs::read(&output).await?;
        debug!(frame = i + 1, at = ts, bytes = data.len(), "Sampled keyframe");
        frames.push(MediaPayload::jpeg(data));
    }

    info!(
        "Extracted {} keyframes from {} ({:.2}s)",
        frames.len(),
        video.display(),
        duration
    );
    Ok(frames)
}

/// Read a whole video file as a single inline payload.
pub async fn read_full_video(video: impl AsRef<Path>) -> MediaResult<MediaPayload> {
    let video = video.as_ref();
    if !video.exists() {
        return Err(MediaError::FileNotFound(video.to_path_buf()));
    }
    let mime = video_mime_type(video)?;
    let data = tokio::fs::read(video).await?;
    if data.is_empty() {
        return Err(MediaError::invalid_video("video file is empty"));
    }
    Ok(MediaPayload::new(mime, data))
}

/// Read a still image as a single inline payload.
pub async fn read_image(image: impl AsRef<Path>) -> MediaResult<MediaPayload> {
    let image = image.as_ref();
    if !image.exists() {
        return Err(MediaError::FileNotFound(image.to_path_buf()));
    }
    let mime = image_mime_type(image)?;
    let data = tokio::fs::read(image).await?;
    Ok(MediaPayload::new(mime, data))
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase()
}

/// MIME type for a video file, by extension. Unknown extensions are treated as MP4.
pub fn video_mime_type(path: &Path) -> MediaResult<&'static str> {
    Ok(match extension(path).as_str() {
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "mpeg" | "mpg" => "video/mpeg",
        "jpg" | "jpeg" | "png" | "webp" => {
            return Err(MediaError::UnsupportedFormat(format!(
                "{} is an image, not a video",
                path.display()
            )))
        }
        _ => "video/mp4",
    })
}

/// MIME type for a still image, by extension.
pub fn image_mime_type(path: &Path) -> MediaResult<&'static str> {
    match extension(path).as_str() {
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "png" => Ok("image/png"),
        "webp" => Ok("image/webp"),
        other => Err(MediaError::UnsupportedFormat(format!(
            "unsupported image extension: {other:?}"
        ))),
    }
}
