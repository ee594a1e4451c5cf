//! Structured run report (§6.3).

use crate::camera::CameraId;
use crate::switch::{Reason, SwitchEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome of the orchestrator's Phase 0 initial-camera scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase0Report {
    pub frames_scanned: u32,
    pub chosen_camera: CameraId,
    pub valid_detections_by_camera: HashMap<CameraId, u32>,
    pub mean_confidence_by_camera: HashMap<CameraId, f64>,
}

/// A camera that wrote more than 90% of output frames in a multi-camera run
/// (§6.5) — informational, not a failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DominanceWarning {
    pub camera_id: CameraId,
    pub percent: f64,
}

/// Aggregate frame-level counters for the run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunCounters {
    pub frames_processed: u64,
    pub frames_written: u64,
    pub miss_streak_p95: u32,
    pub fallback_attempts: u32,
    pub fallback_confirmations: u32,
}

/// Full JSON run report written after a run completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub phase0: Phase0Report,
    pub camera_usage: HashMap<CameraId, u64>,
    pub switches: Vec<SwitchEvent>,
    pub reasons_histogram: HashMap<Reason, u64>,
    pub counters: RunCounters,
    pub warnings: Vec<DominanceWarning>,
    pub written: u64,
    pub n_target: u64,
    pub duration_written_secs: f64,
    pub processing_time_secs: f64,
}

impl RunReport {
    /// Compute dominance warnings: any camera with more than 90% of written
    /// frames in a multi-camera run.
    pub fn dominance_warnings(camera_usage: &HashMap<CameraId, u64>, total_written: u64) -> Vec<DominanceWarning> {
        if camera_usage.len() < 2 || total_written == 0 {
            return Vec::new();
        }
        camera_usage
            .iter()
            .filter_map(|(id, count)| {
                let pct = (*count as f64 / total_written as f64) * 100.0;
                if pct > 90.0 {
                    Some(DominanceWarning {
                        camera_id: *id,
                        percent: pct,
                    })
                } else {
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dominance_warning_fires_above_ninety_percent() {
        let mut usage = HashMap::new();
        usage.insert(0u32, 95u64);
        usage.insert(1u32, 5u64);
        let warnings = RunReport::dominance_warnings(&usage, 100);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].camera_id, 0);
    }

    #[test]
    fn no_dominance_warning_when_balanced() {
        let mut usage = HashMap::new();
        usage.insert(0u32, 55u64);
        usage.insert(1u32, 45u64);
        let warnings = RunReport::dominance_warnings(&usage, 100);
        assert!(warnings.is_empty());
    }

    #[test]
    fn no_dominance_warning_single_camera_run() {
        let mut usage = HashMap::new();
        usage.insert(0u32, 100u64);
        let warnings = RunReport::dominance_warnings(&usage, 100);
        assert!(warnings.is_empty());
    }
}
