#![deny(unreachable_patterns)]
//! FFmpeg/ONNX adapters for the director pipeline's ports.
//!
//! This crate provides the concrete IO implementations the director core
//! depends on only through traits:
//! - [`stream::FfmpegFrameStream`] / [`sink::FfmpegFrameSink`] pipe raw RGB24
//!   frames to and from `ffmpeg` child processes.
//! - [`model::OnnxBallDetector`] runs a YOLOv8 ONNX model and filters to the
//!   ball class.
//!
//! None of this crate's types are referenced by `match-director` directly;
//! callers wire them in through `match_models::{DetectionModel, FrameStream,
//! FrameSink}`.

pub mod command;
pub mod error;
pub mod model;
pub mod probe;
pub mod sink;
pub mod stream;

pub use command::{check_ffmpeg, check_ffprobe};
pub use error::{MediaError, MediaResult};
pub use model::{BallDetectorConfig, OnnxBallDetector};
pub use probe::{probe_video, VideoInfo};
pub use sink::FfmpegFrameSink;
pub use stream::FfmpegFrameStream;
