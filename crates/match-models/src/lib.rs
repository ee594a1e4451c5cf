//! Shared data model and port traits for the multi-camera director pipeline.
//!
//! This crate provides the plain, serde-serializable value types that cross
//! component boundaries in the director pipeline (`Camera`, `Frame`,
//! `Detection`, `StickyOutcome`, `Zone`/`ZoneSet`/`RoutingTable`,
//! `Decision`, `SwitchEvent`, `DirectorConfig`, `RunReport`), plus the three
//! port traits (`DetectionModel`, `FrameStream`, `FrameSink`) the director
//! core depends on so it never links an ML or video-decoding framework
//! directly.

pub mod camera;
pub mod config;
pub mod detection;
pub mod frame;
pub mod ports;
pub mod rect;
pub mod report;
pub mod switch;
pub mod zone;

pub use camera::{Camera, CameraId, CameraRole, CameraSetError, validate_cameras};
pub use config::{ConfigError, DirectorConfig, FrameThresholds, default_zone_set};
pub use detection::{BBox, Detection, DetectionMeta, RawCandidate, StickyOrigin, StickyOutcome};
pub use frame::{Frame, FramePixels};
pub use ports::{DetectionModel, FrameSink, FrameStream, ModelError, SinkError, StreamError};
pub use rect::NormalizedRect;
pub use report::{DominanceWarning, Phase0Report, RunCounters, RunReport};
pub use switch::{Decision, Reason, StreamPositions, SwitchEvent};
pub use zone::{RoutingBuildError, RoutingTable, ZoneLabel, ZoneSet};
