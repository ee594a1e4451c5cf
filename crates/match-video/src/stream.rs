//! FFmpeg-backed [`FrameStream`] adapter.
//!
//! Decodes one camera's source to raw RGB24 frames over a pipe rather than
//! linking a decoding library directly, matching this crate's existing
//! FFmpeg-CLI-wrapper approach. `read_next` blocks on the pipe; `seek_to`
//! kills and respawns the decoder at the target frame, since `ffmpeg`'s own
//! seek is already frame-accurate only via re-open for arbitrary backward
//! seeks.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, Stdio};

use match_models::{CameraId, Frame, FramePixels, FrameStream, StreamError};

use crate::command::check_ffmpeg;
use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_video, VideoInfo};

/// One camera's FFmpeg decode process, yielding RGB24 frames in source order.
pub struct FfmpegFrameStream {
    camera_id: CameraId,
    source: PathBuf,
    info: VideoInfo,
    frame_bytes: usize,
    child: Child,
    stdout: ChildStdout,
    position: u64,
}

impl FfmpegFrameStream {
    /// Probe `source` and open a decode pipe starting at frame 0.
    pub fn open(camera_id: CameraId, source: impl Into<PathBuf>) -> MediaResult<Self> {
        let source = source.into();
        let info = probe_video(&source)?;
        Self::open_at(camera_id, source, info, 0)
    }

    fn open_at(camera_id: CameraId, source: PathBuf, info: VideoInfo, start_frame: u64) -> MediaResult<Self> {
        check_ffmpeg()?;
        let frame_bytes = info.width as usize * info.height as usize * 3;

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-v", "error"]);
        if start_frame > 0 {
            let seek_secs = start_frame as f64 / info.fps;
            cmd.args(["-ss", &format!("{seek_secs:.6}")]);
        }
        cmd.arg("-i").arg(&source);
        cmd.args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-vsync", "0", "pipe:1"]);

        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(MediaError::from)?;
        let stdout = child.stdout.take().expect("stdout not captured");

        Ok(Self {
            camera_id,
            source,
            info,
            frame_bytes,
            child,
            stdout,
            position: start_frame,
        })
    }

    pub fn width(&self) -> u32 {
        self.info.width
    }

    pub fn height(&self) -> u32 {
        self.info.height
    }
}

impl Drop for FfmpegFrameStream {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl FrameStream for FfmpegFrameStream {
    fn camera_id(&self) -> CameraId {
        self.camera_id
    }

    fn fps(&self) -> f64 {
        self.info.fps
    }

    fn read_next(&mut self) -> Result<Frame, StreamError> {
        let mut buf = vec![0u8; self.frame_bytes];
        match self.stdout.read_exact(&mut buf) {
            Ok(()) => {
                let pixels = FramePixels::new(self.info.width, self.info.height, buf);
                let frame = Frame::new(self.camera_id, self.position, pixels);
                self.position += 1;
                Ok(frame)
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(StreamError::EndOfStream),
            Err(e) => Err(StreamError::ReadFailed(e.to_string())),
        }
    }

    fn seek_to(&mut self, index: u64) -> Result<(), StreamError> {
        let _ = self.child.kill();
        let _ = self.child.wait();
        match Self::open_at(self.camera_id, self.source.clone(), self.info.clone(), index) {
            Ok(reopened) => {
                *self = reopened;
                Ok(())
            }
            Err(e) => Err(StreamError::SeekFailed {
                index,
                message: e.to_string(),
            }),
        }
    }

    fn true_position(&self) -> u64 {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_bytes_matches_rgb24_layout() {
        let info = VideoInfo {
            duration: 1.0,
            width: 4,
            height: 2,
            fps: 30.0,
            codec: "h264".to_string(),
        };
        assert_eq!(info.width as usize * info.height as usize * 3, 24);
    }
}
