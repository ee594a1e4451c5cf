//! Port traits at the external-collaborator boundary (§4.6 expansion).
//!
//! The director core depends only on these traits, never on ONNX Runtime or
//! an FFmpeg crate directly — concrete adapters live in a separate IO crate.
//! Each port method is a blocking, synchronous call, by design for the
//! detection model; callers that need cancellation wrap the call in
//! `spawn_blocking` and race it against a cancellation signal.

use crate::camera::CameraId;
use crate::detection::RawCandidate;
use crate::frame::{Frame, FramePixels};
use thiserror::Error;

/// Errors from the detection-model port.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model invocation failed: {0}")]
    InferenceFailed(String),
    #[error("model not loaded: {0}")]
    NotLoaded(String),
}

/// The underlying object detector, treated as a black box (§6.1).
pub trait DetectionModel: Send + Sync {
    /// Run inference on one frame and return raw candidates after class
    /// filtering and the model's own confidence gate.
    fn detect(&self, pixels: &FramePixels) -> Result<Vec<RawCandidate>, ModelError>;
}

/// Errors from stream read/seek.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("end of stream")]
    EndOfStream,
    #[error("read failed: {0}")]
    ReadFailed(String),
    #[error("seek failed to index {index}: {message}")]
    SeekFailed { index: u64, message: String },
}

/// One camera's frame-stream handle (§6.1, §4.4).
///
/// `true_position` must reflect the stream's actual decode position, never
/// an internal counter — the reference timeline is defined in terms of it.
pub trait FrameStream: Send {
    fn camera_id(&self) -> CameraId;
    fn fps(&self) -> f64;
    fn read_next(&mut self) -> Result<Frame, StreamError>;
    fn seek_to(&mut self, index: u64) -> Result<(), StreamError>;
    fn true_position(&self) -> u64;
}

/// Errors from the output sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink not initialized")]
    NotInitialized,
    #[error("write failed: {0}")]
    WriteFailed(String),
    #[error("finalize failed: {0}")]
    FinalizeFailed(String),
}

/// The Writer's output sink (§4.5, §6.3).
pub trait FrameSink: Send {
    /// Lazily initialize on the first frame so resolution/format match the source.
    fn init(&mut self, width: u32, height: u32, fps: f64) -> Result<(), SinkError>;
    fn write(&mut self, frame: &Frame) -> Result<(), SinkError>;
    fn finalize(self: Box<Self>) -> Result<(), SinkError>;
}
