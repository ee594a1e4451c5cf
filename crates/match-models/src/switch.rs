//! Switcher decisions and the persisted switch audit log (§3, §4.3).

use crate::camera::CameraId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why the Switcher held instead of switching, or why a switch was applied.
/// A closed enum rather than a free-form string so exhaustive handling is
/// checked by the compiler (§9 design note).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    Cooldown,
    MinHold,
    NoZone,
    UnstableZone,
    Unarmed,
    TrajectoryAway,
    LowExitProb,
    NoRoute,
    TargetUnavailable,
    TargetNoBall,
    BallInExitZone,
    MissStreakRecovery,
    FallbackConfirmed,
    ActiveStreamEnded,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// The Switcher's verdict for the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Hold {
        reason: Reason,
    },
    Switch {
        from: CameraId,
        to: CameraId,
        reason: Reason,
        ref_index: u64,
        exit_prob: f32,
    },
}

impl Decision {
    pub fn is_switch(&self) -> bool {
        matches!(self, Decision::Switch { .. })
    }

    pub fn reason(&self) -> Reason {
        match self {
            Decision::Hold { reason } => *reason,
            Decision::Switch { reason, .. } => *reason,
        }
    }
}

/// Position of every configured stream at the moment a switch was applied,
/// kept for audit even though only the active stream drives the timeline.
pub type StreamPositions = Vec<(CameraId, u64)>;

/// Persisted record of an applied switch (Decision plus wall-clock/position
/// context for all streams).
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SwitchEvent {
    pub from: CameraId,
    pub to: CameraId,
    pub reason: Reason,
    pub ref_index: u64,
    pub exit_prob: f32,
    #[schemars(with = "String")]
    pub at: DateTime<Utc>,
    pub stream_positions: StreamPositions,
}

impl SwitchEvent {
    pub fn from_decision(decision: &Decision, at: DateTime<Utc>, stream_positions: StreamPositions) -> Option<Self> {
        match decision {
            Decision::Switch {
                from,
                to,
                reason,
                ref_index,
                exit_prob,
            } => Some(Self {
                from: *from,
                to: *to,
                reason: *reason,
                ref_index: *ref_index,
                exit_prob: *exit_prob,
                at,
                stream_positions,
            }),
            Decision::Hold { .. } => None,
        }
    }
}
