//! Sticky Tracker (§4.2): temporal stabilizer with exclusion zones,
//! stationary-detection filtering, and a jump gate with candidate confirmation.

use std::collections::{HashMap, VecDeque};

use match_models::{CameraId, Detection, DirectorConfig, FrameThresholds, NormalizedRect, StickyOrigin, StickyOutcome};

/// A detection flagged as a suspiciously large jump from the last accepted
/// center, pending confirmation on the following frame (§4.2 rule 3).
#[derive(Debug, Clone, Copy)]
struct Suspect {
    center: (f32, f32),
    /// Consecutive frames observed near this suspect center, including the
    /// one that raised it.
    streak: u32,
}

/// Temporal stabilizer owning the accepted-detection history for one camera
/// at a time. Reset wholesale on camera switch (§4.2 "Camera change").
pub struct StickyTracker {
    tau_gate: f32,
    tau_exclude_override: f32,
    tau_stat_low: f32,
    delta_jump: f32,
    delta_stat: f32,
    iota_min: f32,
    ema_alpha: f64,
    exclusion_zones: HashMap<CameraId, Vec<NormalizedRect>>,

    n_stat: usize,
    h_max: u32,
    suspect_confirm_frames: u32,

    current_camera: Option<CameraId>,
    last_accepted: Option<Detection>,
    hold_age: u32,
    miss_streak: u32,
    suspect: Option<Suspect>,
    accepted_history: VecDeque<((f32, f32), f32)>,
    smoothed_center: Option<(f32, f32)>,
}

impl StickyTracker {
    pub fn new(cfg: &DirectorConfig, thresholds: &FrameThresholds) -> Self {
        Self {
            tau_gate: cfg.tau_gate,
            tau_exclude_override: cfg.tau_exclude_override,
            tau_stat_low: cfg.tau_stat_low,
            delta_jump: cfg.delta_jump,
            delta_stat: cfg.delta_stat,
            iota_min: cfg.iota_min,
            ema_alpha: cfg.ema_alpha,
            exclusion_zones: cfg.exclusion_zones.clone(),
            n_stat: thresholds.n_stat.max(1) as usize,
            h_max: thresholds.h_max,
            suspect_confirm_frames: cfg.suspect_confirm_frames.max(1),
            current_camera: None,
            last_accepted: None,
            hold_age: 0,
            miss_streak: 0,
            suspect: None,
            accepted_history: VecDeque::new(),
            smoothed_center: None,
        }
    }

    /// Recompute frame-count thresholds after an FPS change (§4.2 "Thresholds
    /// are time-based").
    pub fn set_thresholds(&mut self, thresholds: &FrameThresholds) {
        self.n_stat = thresholds.n_stat.max(1) as usize;
        self.h_max = thresholds.h_max;
    }

    /// Reset all state for a new active camera. Cross-camera coordinate
    /// comparison is meaningless, so nothing carries over.
    pub fn reset(&mut self, camera_id: CameraId) {
        self.current_camera = Some(camera_id);
        self.last_accepted = None;
        self.hold_age = 0;
        self.miss_streak = 0;
        self.suspect = None;
        self.accepted_history.clear();
        self.smoothed_center = None;
    }

    pub fn update(&mut self, detection: &Detection, width: u32, height: u32, _timeline_index: u64) -> StickyOutcome {
        let origin = self.classify(detection, width, height);
        self.emit(origin, detection)
    }

    fn classify(&mut self, detection: &Detection, width: u32, height: u32) -> StickyOrigin {
        let Some(center) = detection.center else {
            return StickyOrigin::None;
        };
        let bbox = detection.bbox.expect("center implies bbox");

        let normalized = (center.0 / width.max(1) as f32, center.1 / height.max(1) as f32);

        if self.in_exclusion_zone(normalized) && detection.confidence < self.tau_exclude_override {
            return StickyOrigin::RejectedExclusion;
        }

        if self.is_stationary_cluster(center) {
            return StickyOrigin::RejectedStationary;
        }

        if let Some(last) = &self.last_accepted {
            let last_center = last.center.expect("accepted detection always has a center");
            let last_bbox = last.bbox.expect("accepted detection always has a bbox");
            let jumped = distance(center, last_center) > self.delta_jump && bbox.iou(&last_bbox) < self.iota_min;
            if jumped {
                return self.handle_suspect(center);
            }
        }

        if let Some(suspect) = self.suspect {
            return self.handle_suspect_given(center, suspect);
        }

        if detection.confidence < self.tau_gate {
            return StickyOrigin::None; // resolved to Held/None by emit() via hold budget
        }

        StickyOrigin::Accepted
    }

    fn handle_suspect(&mut self, center: (f32, f32)) -> StickyOrigin {
        match self.suspect {
            Some(suspect) => self.handle_suspect_given(center, suspect),
            None => {
                self.suspect = Some(Suspect { center, streak: 1 });
                StickyOrigin::Confirming
            }
        }
    }

    /// A frame landed within `delta_jump` of the standing suspect center;
    /// bump its streak and accept once `suspect_confirm_frames` consecutive
    /// frames have corroborated it (§4.2 rule 3). Otherwise the suspect
    /// relocates to the new center and the streak restarts.
    fn handle_suspect_given(&mut self, center: (f32, f32), suspect: Suspect) -> StickyOrigin {
        if distance(center, suspect.center) > self.delta_jump {
            self.suspect = Some(Suspect { center, streak: 1 });
            return StickyOrigin::Confirming;
        }
        let streak = suspect.streak + 1;
        if streak >= self.suspect_confirm_frames {
            self.suspect = None;
            StickyOrigin::Accepted
        } else {
            self.suspect = Some(Suspect { center, streak });
            StickyOrigin::Confirming
        }
    }

    fn in_exclusion_zone(&self, normalized: (f32, f32)) -> bool {
        let Some(camera) = self.current_camera else { return false };
        self.exclusion_zones
            .get(&camera)
            .map(|zones| zones.iter().any(|z| z.contains(normalized.0 as f64, normalized.1 as f64)))
            .unwrap_or(false)
    }

    /// §4.2 rule 2. Requires the new detection to itself lie near the
    /// stationary cluster — otherwise an unrelated, well-tracked detection
    /// elsewhere in frame would be rejected purely because of *prior*
    /// history, defeating the goal of distinguishing a stuck artifact from
    /// a legitimate new play.
    fn is_stationary_cluster(&self, new_center: (f32, f32)) -> bool {
        if self.accepted_history.len() < self.n_stat {
            return false;
        }
        let recent: Vec<_> = self.accepted_history.iter().rev().take(self.n_stat).collect();
        let mean_x = recent.iter().map(|(c, _)| c.0).sum::<f32>() / recent.len() as f32;
        let mean_y = recent.iter().map(|(c, _)| c.1).sum::<f32>() / recent.len() as f32;
        let spread_ok = recent.iter().all(|(c, _)| distance(*c, (mean_x, mean_y)) <= self.delta_stat);
        if !spread_ok {
            return false;
        }
        if distance(new_center, (mean_x, mean_y)) > self.delta_stat {
            return false;
        }
        let mean_conf = recent.iter().map(|(_, conf)| *conf).sum::<f32>() / recent.len() as f32;
        let low_confidence = mean_conf < self.tau_stat_low;
        let in_exclusion = self.in_exclusion_zone((mean_x, mean_y));
        low_confidence || in_exclusion
    }

    fn emit(&mut self, origin: StickyOrigin, detection: &Detection) -> StickyOutcome {
        match origin {
            StickyOrigin::Accepted => {
                self.last_accepted = Some(*detection);
                self.hold_age = 0;
                self.miss_streak = 0;
                let center = detection.center.expect("accepted detection has a center");
                self.accepted_history.push_back((center, detection.confidence));
                while self.accepted_history.len() > self.n_stat {
                    self.accepted_history.pop_front();
                }
                self.update_smoothed(center);
                StickyOutcome {
                    bbox: detection.bbox,
                    center: detection.center,
                    confidence: detection.confidence,
                    origin,
                    hold_age: 0,
                    miss_streak: 0,
                    smoothed_center: self.smoothed_center,
                    meta: detection.meta,
                }
            }
            StickyOrigin::RejectedExclusion | StickyOrigin::RejectedStationary | StickyOrigin::Confirming | StickyOrigin::None => {
                self.decline()
            }
            StickyOrigin::Held | StickyOrigin::RejectedJump => {
                unreachable!("classify() never returns Held/RejectedJump directly")
            }
        }
    }

    /// Shared path for every non-acceptance outcome: emit the held last-known
    /// bbox if the hold budget allows it, otherwise emit nothing and bump
    /// `miss_streak`. Whatever rule declined the new detection, what is
    /// actually handed downstream is the previously accepted bbox, so the
    /// outcome is tagged `Held` (§3: `origin = held` implies `bbox` equals
    /// the last accepted bbox) — otherwise it degrades to `None` once the
    /// hold budget is exhausted, since there is nothing left to show.
    fn decline(&mut self) -> StickyOutcome {
        if let Some(last) = self.last_accepted {
            if self.hold_age < self.h_max {
                self.hold_age += 1;
                self.update_smoothed_from_last(last);
                return StickyOutcome {
                    bbox: last.bbox,
                    center: last.center,
                    confidence: last.confidence,
                    origin: StickyOrigin::Held,
                    hold_age: self.hold_age,
                    miss_streak: self.miss_streak,
                    smoothed_center: self.smoothed_center,
                    meta: last.meta,
                };
            }
        }
        self.miss_streak += 1;
        StickyOutcome::none(self.miss_streak)
    }

    fn update_smoothed(&mut self, raw: (f32, f32)) {
        self.smoothed_center = Some(match self.smoothed_center {
            None => raw,
            Some(prev) => {
                let a = self.ema_alpha as f32;
                (a * raw.0 + (1.0 - a) * prev.0, a * raw.1 + (1.0 - a) * prev.1)
            }
        });
    }

    fn update_smoothed_from_last(&mut self, last: Detection) {
        if let Some(c) = last.center {
            self.update_smoothed(c);
        }
    }

    pub fn miss_streak(&self) -> u32 {
        self.miss_streak
    }

    /// Last accepted ball center, used by the orchestrator's fallback-scan
    /// proximity check (§4.4) — distinct from `smoothed_center`, which is
    /// cleared on decline; this stays until the next camera reset.
    pub fn last_known_center(&self) -> Option<(f32, f32)> {
        self.last_accepted.and_then(|d| d.center)
    }
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}
