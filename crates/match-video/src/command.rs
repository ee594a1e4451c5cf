//! FFmpeg/FFprobe availability checks shared by the stream and sink adapters.

use std::path::PathBuf;

use crate::error::{MediaError, MediaResult};

/// Check if FFmpeg is available, returning its resolved path.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available, returning its resolved path.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}
