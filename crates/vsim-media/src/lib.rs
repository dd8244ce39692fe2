//! FFmpeg CLI wrapper for video ingestion.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - FFprobe duration probing
//! - Keyframe sampling that skips the black edges of the timeline
//! - Whole-video and still-image ingestion as inline payloads
//! - A `MediaSource` trait so callers can swap in fakes

pub mod command;
pub mod error;
pub mod frames;
pub mod probe;
pub mod source;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use frames::{
    extract_frames, read_full_video, read_image, sample_timestamps, MediaPayload,
    DEFAULT_FRAME_COUNT,
};
pub use probe::probe_duration;
pub use source::{FfmpegMediaSource, MediaSource};
