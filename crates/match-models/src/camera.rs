//! Camera identity and role assignment.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Stable identifier for a configured camera stream.
pub type CameraId = u32;

/// Explicit role of a camera in the pitch layout.
///
/// Role is **configuration**, never inferred from the stream name or its
/// content — it drives zone geometry and routing (see [`crate::zone`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum CameraRole {
    Left,
    Right,
    Middle,
}

impl fmt::Display for CameraRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraRole::Left => write!(f, "LEFT"),
            CameraRole::Right => write!(f, "RIGHT"),
            CameraRole::Middle => write!(f, "MIDDLE"),
        }
    }
}

/// Immutable per-run record describing one configured camera.
///
/// The stream handle itself is not part of this record — it is owned and
/// opened by the orchestrator from `source`, keeping `Camera` a plain,
/// cloneable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Camera {
    pub id: CameraId,
    pub role: CameraRole,
    /// File path or URL of the pre-aligned stream.
    pub source: String,
    /// Nominal FPS; re-observed and may be refined once the stream is opened.
    pub fps: f64,
}

impl Camera {
    pub fn new(id: CameraId, role: CameraRole, source: impl Into<String>, fps: f64) -> Self {
        Self {
            id,
            role,
            source: source.into(),
            fps,
        }
    }
}

/// Error returned when a camera set fails role-uniqueness validation.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CameraSetError {
    #[error("role {0} is assigned to more than one camera")]
    DuplicateRole(String),
    #[error("no cameras configured")]
    Empty,
    #[error("{0} cameras configured, but only 2 or 3 are supported")]
    WrongCount(usize),
}

/// Validate a camera set against the invariants in the data model:
/// each role appears at most once, and there are 2 or 3 streams total.
pub fn validate_cameras(cameras: &[Camera]) -> Result<(), CameraSetError> {
    if cameras.is_empty() {
        return Err(CameraSetError::Empty);
    }
    if cameras.len() < 2 || cameras.len() > 3 {
        return Err(CameraSetError::WrongCount(cameras.len()));
    }
    let mut seen = HashSet::new();
    for cam in cameras {
        if !seen.insert(cam.role) {
            return Err(CameraSetError::DuplicateRole(cam.role.to_string()));
        }
    }
    Ok(())
}
