#![deny(unreachable_patterns)]
//! The director pipeline core: Ball Detector, Sticky Tracker, Switcher,
//! Orchestrator, and Writer (§4).
//!
//! This crate depends only on the port traits in `match-models`
//! (`DetectionModel`, `FrameStream`, `FrameSink`) — it never links FFmpeg or
//! an ML runtime directly. Concrete adapters live in `match-video`.

pub mod detector;
pub mod error;
pub mod orchestrator;
pub mod sticky;
pub mod switcher;
pub mod writer;

pub use detector::BallDetector;
pub use error::DirectorError;
pub use orchestrator::{CancellationToken, Orchestrator, RunOutcome};
pub use sticky::StickyTracker;
pub use switcher::Switcher;
pub use writer::Writer;
