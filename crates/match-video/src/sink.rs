//! FFmpeg-backed [`FrameSink`] adapter.
//!
//! Pipes raw RGB24 frames to an `ffmpeg` encoder process over stdin,
//! mirroring the decode side in `stream.rs`. Initialization is lazy so the
//! sink can take its resolution and frame rate from the first frame it is
//! handed, as the Writer component requires.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};

use match_models::{Frame, FrameSink, SinkError};

use crate::command::check_ffmpeg;

/// Encodes written frames to an H.264/MP4 file via an `ffmpeg` child process.
pub struct FfmpegFrameSink {
    destination: PathBuf,
    crf: u8,
    preset: String,
    state: SinkState,
}

enum SinkState {
    Pending,
    Open { child: Child, stdin: ChildStdin, frame_bytes: usize },
    Finalized,
}

impl FfmpegFrameSink {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            crf: 20,
            preset: "veryfast".to_string(),
            state: SinkState::Pending,
        }
    }

    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf;
        self
    }

    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }
}

impl FrameSink for FfmpegFrameSink {
    fn init(&mut self, width: u32, height: u32, fps: f64) -> Result<(), SinkError> {
        if matches!(self.state, SinkState::Open { .. }) {
            return Ok(());
        }
        check_ffmpeg().map_err(|e| SinkError::WriteFailed(e.to_string()))?;

        if let Some(parent) = self.destination.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| SinkError::WriteFailed(e.to_string()))?;
            }
        }

        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-y"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
            .args(["-s", &format!("{width}x{height}")])
            .args(["-r", &format!("{fps}")])
            .args(["-i", "pipe:0"])
            .args(["-c:v", "libx264", "-pix_fmt", "yuv420p"])
            .args(["-preset", &self.preset])
            .args(["-crf", &self.crf.to_string()])
            .arg(&self.destination)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SinkError::WriteFailed(e.to_string()))?;

        let stdin = child.stdin.take().expect("stdin not captured");
        let frame_bytes = width as usize * height as usize * 3;
        self.state = SinkState::Open { child, stdin, frame_bytes };
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), SinkError> {
        match &mut self.state {
            SinkState::Open { stdin, frame_bytes, .. } => {
                let pixels = &frame.pixels.rgb;
                if pixels.len() != *frame_bytes {
                    return Err(SinkError::WriteFailed(format!(
                        "frame buffer size {} does not match sink frame size {frame_bytes}",
                        pixels.len()
                    )));
                }
                stdin.write_all(pixels).map_err(|e| SinkError::WriteFailed(e.to_string()))
            }
            SinkState::Pending | SinkState::Finalized => Err(SinkError::NotInitialized),
        }
    }

    fn finalize(mut self: Box<Self>) -> Result<(), SinkError> {
        let prior = std::mem::replace(&mut self.state, SinkState::Finalized);
        match prior {
            SinkState::Open { mut child, stdin, .. } => {
                drop(stdin);
                let output = child
                    .wait_with_output()
                    .map_err(|e| SinkError::FinalizeFailed(e.to_string()))?;
                if output.status.success() {
                    Ok(())
                } else {
                    Err(SinkError::FinalizeFailed(format!(
                        "ffmpeg encoder exited with {}: {}",
                        output.status,
                        String::from_utf8_lossy(&output.stderr)
                    )))
                }
            }
            SinkState::Pending => Err(SinkError::NotInitialized),
            SinkState::Finalized => Ok(()),
        }
    }
}
