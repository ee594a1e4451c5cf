//! Director-level error type (§7).
//!
//! Leaf components raise typed port errors (`StreamError`, `SinkError`,
//! `ModelError`); the orchestrator decides policy. `DetectorFailure` never
//! reaches here — the Ball Detector swallows model errors into an empty,
//! `meta.error`-flagged `Detection` (§4.1) so a flaky model never poisons a
//! run. What *does* propagate is persistent IO failure past the retry/
//! failover policy, a fatal startup `ConfigError`, and an `InvariantViolation`
//! that must stop the run immediately.

use match_models::{ConfigError, RoutingBuildError, SinkError, StreamError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectorError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("routing table could not be built: {0}")]
    Routing(#[from] RoutingBuildError),

    #[error("stream IO failed on camera {camera}: {source}")]
    Stream { camera: u32, #[source] source: StreamError },

    #[error("sink IO failed: {0}")]
    Sink(#[from] SinkError),

    #[error("no stream produced a frame at startup")]
    NoStreamsAvailable,

    #[error("camera {0} has no matching stream")]
    MissingStream(u32),

    #[error("invariant violated: {detail} (t_ref={t_ref})")]
    InvariantViolation { detail: String, t_ref: u64 },
}
