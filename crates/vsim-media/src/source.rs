//! Media source abstraction consumed by the analysis stage.

use std::path::Path;

use async_trait::async_trait;

use crate::error::MediaResult;
use crate::frames::{self, MediaPayload};

/// Where visual input comes from.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Sample `count` keyframes in timeline order.
    async fn extract_frames(&self, video: &Path, count: usize) -> MediaResult<Vec<MediaPayload>>;

    /// Read the whole video as one payload.
    async fn read_full_video(&self, video: &Path) -> MediaResult<MediaPayload>;

    /// Read a single still image.
    async fn read_image(&self, image: &Path) -> MediaResult<MediaPayload>;
}

/// [`MediaSource`] backed by the local FFmpeg/FFprobe binaries.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegMediaSource;

impl FfmpegMediaSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaSource for FfmpegMediaSource {
    async fn extract_frames(&self, video: &Path, count: usize) -> MediaResult<Vec<MediaPayload>> {
        frames::extract_frames(video, count).await
    }

    async fn read_full_video(&self, video: &Path) -> MediaResult<MediaPayload> {
        frames::read_full_video(video).await
    }

    async fn read_image(&self, image: &Path) -> MediaResult<MediaPayload> {
        frames::read_image(image).await
    }
}
