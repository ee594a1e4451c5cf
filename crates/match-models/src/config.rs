//! Director pipeline configuration (§6.4).
//!
//! All time-like thresholds are stored in seconds here and converted to
//! frame counts once FPS is known — see [`FrameThresholds`].

use crate::camera::{Camera, CameraSetError, validate_cameras};
use crate::camera::CameraId;
use crate::rect::NormalizedRect;
use crate::zone::ZoneLabel;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Full recognized configuration surface for a director run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorConfig {
    pub cameras: Vec<Camera>,

    // === Ball Detector ===
    pub tau_conf: f32,
    pub tau_high: f32,
    pub delta_max: f32,
    pub pitch_mask_enabled: bool,

    // === Sticky Tracker ===
    pub tau_gate: f32,
    pub tau_exclude_override: f32,
    pub tau_stat_low: f32,
    pub delta_jump: f32,
    pub delta_stat: f32,
    pub iota_min: f32,
    pub n_stat_secs: f64,
    pub h_max_secs: f64,
    pub suspect_confirm_frames: u32,
    pub ema_alpha: f64,
    pub exclusion_zones: HashMap<CameraId, Vec<NormalizedRect>>,

    // === Switcher ===
    pub tau_found: f32,
    pub tau_exit: f32,
    pub t_cooldown_secs: f64,
    pub t_min_hold_secs: f64,
    pub t_arm_secs: f64,
    pub t_stable_secs: f64,
    pub t_disarm_secs: f64,
    pub t_miss_secs: f64,
    pub v_away: f64,
    pub middle_opposite: bool,

    // === Orchestrator / fallback ===
    pub t_fb_secs: f64,
    pub d_prox: f64,
    pub k_same: u32,
    pub k_alt: u32,
    pub rho: f64,
    pub time_window_fb_secs: f64,
    pub a_max: u32,
    pub p_secs: f64,
    pub c_max: u32,
    pub fallback_one_per_tick: bool,
    pub pre_switch_require_ball: bool,
    pub phase0_n_scan: u32,
    pub phase0_time_cap_secs: f64,

    // === Writer ===
    pub duration_secs: f64,
    pub f_out_fallback: f64,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            cameras: Vec::new(),

            tau_conf: 0.25,
            tau_high: 0.70,
            delta_max: 150.0,
            pitch_mask_enabled: true,

            tau_gate: 0.35,
            tau_exclude_override: 0.85,
            tau_stat_low: 0.40,
            delta_jump: 120.0,
            delta_stat: 8.0,
            iota_min: 0.2,
            n_stat_secs: 3.0,
            h_max_secs: 1.0,
            suspect_confirm_frames: 1,
            ema_alpha: 0.35,
            exclusion_zones: HashMap::new(),

            tau_found: 0.5,
            tau_exit: 0.50,
            t_cooldown_secs: 2.0,
            t_min_hold_secs: 1.5,
            t_arm_secs: 0.2,
            t_stable_secs: 0.1,
            t_disarm_secs: 0.3,
            t_miss_secs: 0.6,
            v_away: 0.002,
            middle_opposite: false,

            t_fb_secs: 2.0,
            d_prox: 0.15,
            k_same: 3,
            k_alt: 4,
            rho: 0.5,
            time_window_fb_secs: 2.0,
            a_max: 5,
            p_secs: 10.0,
            c_max: 3,
            fallback_one_per_tick: true,
            pre_switch_require_ball: false,
            phase0_n_scan: 300,
            phase0_time_cap_secs: 10.0,

            duration_secs: 60.0,
            f_out_fallback: 30.0,
        }
    }
}

/// Fatal startup configuration errors.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("camera configuration invalid: {0}")]
    Cameras(#[from] CameraSetError),
    #[error("threshold {name} must be in [{min}, {max}], got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("exclusion zone for camera {camera} is invalid: {rect:?}")]
    InvalidZone { camera: CameraId, rect: NormalizedRect },
}

impl DirectorConfig {
    /// Validate all invariants required before any stream is opened:
    /// role uniqueness, 2-3 camera count, threshold ranges, zone rectangles.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_cameras(&self.cameras)?;

        let fraction_fields: &[(&'static str, f32)] = &[
            ("tau_conf", self.tau_conf),
            ("tau_high", self.tau_high),
            ("tau_gate", self.tau_gate),
            ("tau_exclude_override", self.tau_exclude_override),
            ("tau_stat_low", self.tau_stat_low),
            ("tau_found", self.tau_found),
            ("tau_exit", self.tau_exit),
        ];
        for (name, value) in fraction_fields {
            if !(0.0..=1.0).contains(value) {
                return Err(ConfigError::OutOfRange {
                    name,
                    value: *value as f64,
                    min: 0.0,
                    max: 1.0,
                });
            }
        }

        for (camera, rects) in &self.exclusion_zones {
            for rect in rects {
                if !rect.is_valid() {
                    return Err(ConfigError::InvalidZone {
                        camera: *camera,
                        rect: *rect,
                    });
                }
            }
        }

        Ok(())
    }
}

/// Every time-like threshold converted to frame counts for a given FPS,
/// computed once at startup (and recomputed on FPS change) so the hot loop
/// stays integer-only (§9 design note).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameThresholds {
    pub n_stat: u32,
    pub h_max: u32,
    pub t_cooldown: u32,
    pub t_min_hold: u32,
    pub t_arm: u32,
    pub t_stable: u32,
    pub t_disarm: u32,
    pub t_miss: u32,
    pub t_fb: u32,
    pub time_window_fb: u32,
    /// Fallback adaptive-stopping pause duration (`P`, §4.4), in frames.
    pub p: u32,
}

fn secs_to_frames(secs: f64, fps: f64) -> u32 {
    (secs * fps).ceil().max(0.0) as u32
}

impl FrameThresholds {
    pub fn compute(cfg: &DirectorConfig, fps: f64) -> Self {
        Self {
            n_stat: secs_to_frames(cfg.n_stat_secs, fps),
            h_max: secs_to_frames(cfg.h_max_secs, fps),
            t_cooldown: secs_to_frames(cfg.t_cooldown_secs, fps),
            t_min_hold: secs_to_frames(cfg.t_min_hold_secs, fps),
            t_arm: secs_to_frames(cfg.t_arm_secs, fps),
            t_stable: secs_to_frames(cfg.t_stable_secs, fps),
            t_disarm: secs_to_frames(cfg.t_disarm_secs, fps),
            t_miss: secs_to_frames(cfg.t_miss_secs, fps),
            t_fb: secs_to_frames(cfg.t_fb_secs, fps),
            time_window_fb: secs_to_frames(cfg.time_window_fb_secs, fps),
            p: secs_to_frames(cfg.p_secs, fps),
        }
    }
}

/// Resolve which label within a camera's zone set an owning zone maps to,
/// for building a [`crate::zone::ZoneSet`] — a convenience the orchestrator
/// uses when turning `exclusion_zones`/well-known layouts into geometry.
pub const DEFAULT_EXIT_ZONE_FRACTION: f64 = 0.18;

/// Build the default symmetric exit-zone layout for a camera given its role,
/// used when no explicit zone geometry is supplied in config. Matches the
/// zone labels referenced by `RoutingTable` in §4.3.
pub fn default_zone_set(role: crate::camera::CameraRole) -> crate::zone::ZoneSet {
    use crate::camera::CameraRole::*;
    let f = DEFAULT_EXIT_ZONE_FRACTION;
    let mut zones = HashMap::new();
    match role {
        Left => {
            zones.insert(ZoneLabel::Right, NormalizedRect::from_corners(1.0 - f, 0.0, 1.0, 1.0));
            zones.insert(ZoneLabel::RightTop, NormalizedRect::from_corners(1.0 - f, 0.0, 1.0, f));
            zones.insert(ZoneLabel::RightBottom, NormalizedRect::from_corners(1.0 - f, 1.0 - f, 1.0, 1.0));
            zones.insert(ZoneLabel::Top, NormalizedRect::from_corners(0.0, 0.0, 1.0, f));
            zones.insert(ZoneLabel::Bottom, NormalizedRect::from_corners(0.0, 1.0 - f, 1.0, 1.0));
            zones.insert(ZoneLabel::Left, NormalizedRect::from_corners(0.0, 0.0, f, 1.0));
        }
        Right => {
            zones.insert(ZoneLabel::Left, NormalizedRect::from_corners(0.0, 0.0, f, 1.0));
            zones.insert(ZoneLabel::LeftTop, NormalizedRect::from_corners(0.0, 0.0, f, f));
            zones.insert(ZoneLabel::LeftBottom, NormalizedRect::from_corners(0.0, 1.0 - f, f, 1.0));
            zones.insert(ZoneLabel::Top, NormalizedRect::from_corners(0.0, 0.0, 1.0, f));
            zones.insert(ZoneLabel::Bottom, NormalizedRect::from_corners(0.0, 1.0 - f, 1.0, 1.0));
            zones.insert(ZoneLabel::Right, NormalizedRect::from_corners(1.0 - f, 0.0, 1.0, 1.0));
        }
        Middle => {
            zones.insert(ZoneLabel::Left, NormalizedRect::from_corners(0.0, 0.0, f, 1.0));
            zones.insert(ZoneLabel::Right, NormalizedRect::from_corners(1.0 - f, 0.0, 1.0, 1.0));
            zones.insert(ZoneLabel::Top, NormalizedRect::from_corners(0.0, 0.0, 1.0, f));
            zones.insert(ZoneLabel::Bottom, NormalizedRect::from_corners(0.0, 1.0 - f, 1.0, 1.0));
            zones.insert(
                ZoneLabel::Equal,
                NormalizedRect::from_corners(0.5 - f / 2.0, f, 0.5 + f / 2.0, 1.0 - f),
            );
        }
    }
    crate::zone::ZoneSet { zones }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Camera, CameraRole};

    fn cam(id: CameraId, role: CameraRole) -> Camera {
        Camera::new(id, role, format!("cam{id}.mp4"), 30.0)
    }

    #[test]
    fn default_config_with_two_cameras_validates() {
        let mut cfg = DirectorConfig::default();
        cfg.cameras = vec![cam(0, crate::camera::CameraRole::Left), cam(1, crate::camera::CameraRole::Right)];
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let mut cfg = DirectorConfig::default();
        cfg.cameras = vec![cam(0, crate::camera::CameraRole::Left), cam(1, crate::camera::CameraRole::Right)];
        cfg.tau_exit = 1.5;
        assert!(matches!(cfg.validate(), Err(ConfigError::OutOfRange { name: "tau_exit", .. })));
    }

    #[test]
    fn frame_thresholds_convert_seconds_to_frames_at_30fps() {
        let cfg = DirectorConfig::default();
        let th = FrameThresholds::compute(&cfg, 30.0);
        assert_eq!(th.t_arm, (cfg.t_arm_secs * 30.0).ceil() as u32);
        assert_eq!(th.t_cooldown, (cfg.t_cooldown_secs * 30.0).ceil() as u32);
    }

    #[test]
    fn default_zone_set_left_has_right_side_zones() {
        let zs = default_zone_set(crate::camera::CameraRole::Left);
        assert!(zs.zones.contains_key(&ZoneLabel::Right));
        assert!(zs.zones.contains_key(&ZoneLabel::Left));
    }
}
