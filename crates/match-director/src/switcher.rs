//! Switcher (§4.3): the exit-zone state machine with arming, stability,
//! hysteresis, and cooldown that decides HOLD vs SWITCH.
//!
//! Purely reactive — it never advances the timeline and never touches a
//! stream. It owns exactly one `SwitcherState`-shaped set of counters, reset
//! wholesale only when the orchestrator confirms an applied switch via
//! [`Switcher::commit_switch`].

use std::collections::{HashMap, VecDeque};

use match_models::{
    default_zone_set, Camera, CameraId, Decision, DirectorConfig, FrameThresholds, NormalizedRect, Reason,
    RoutingBuildError, RoutingTable, StickyOutcome, StickyOrigin, ZoneLabel, ZoneSet,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetectionState {
    Found,
    Held,
    Lost,
}

/// Which side of the frame a zone's exit boundary sits on, used both for the
/// trajectory guard and the exit-probability proximity term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundarySide {
    Left,
    Right,
    Top,
    Bottom,
    /// MIDDLE's central `EQUAL` zone: no single horizontal side, resolved by
    /// velocity sign at routing time instead of position.
    Center,
}

fn boundary_side(label: ZoneLabel) -> BoundarySide {
    match label {
        ZoneLabel::Left | ZoneLabel::LeftTop | ZoneLabel::LeftBottom => BoundarySide::Left,
        ZoneLabel::Right | ZoneLabel::RightTop | ZoneLabel::RightBottom => BoundarySide::Right,
        ZoneLabel::Top => BoundarySide::Top,
        ZoneLabel::Bottom => BoundarySide::Bottom,
        ZoneLabel::Equal => BoundarySide::Center,
    }
}

/// The zone/velocity state recorded the last time the ball was seen inside a
/// zone, used to drive miss-streak recovery (§4.3 switch predicate, rule 2b)
/// after the ball has since gone missing.
#[derive(Debug, Clone, Copy)]
struct LastInZone {
    zone: ZoneLabel,
    vx: f64,
}

/// Exit-zone state machine (§3 `SwitcherState`, §4.3).
pub struct Switcher {
    tau_found: f32,
    tau_exit: f32,
    v_away: f64,
    t_cooldown: u32,
    t_min_hold: u32,
    t_arm: u32,
    t_stable: u32,
    t_disarm: u32,
    t_miss: u32,

    zone_sets: HashMap<CameraId, ZoneSet>,
    routing: RoutingTable,

    active_cam: CameraId,
    since_last_switch: u32,
    current_zone: Option<ZoneLabel>,
    zone_frames: u32,
    out_of_zone_frames: u32,
    last_in_zone: Option<LastInZone>,
    pos_history: VecDeque<(f64, f64)>,
}

const POS_HISTORY_LEN: usize = 5;

impl Switcher {
    pub fn new(cfg: &DirectorConfig, thresholds: &FrameThresholds, initial_active: CameraId) -> Result<Self, RoutingBuildError> {
        let routing = RoutingTable::build(&cfg.cameras, cfg.middle_opposite)?;
        let zone_sets = build_zone_sets(&cfg.cameras);
        Ok(Self {
            tau_found: cfg.tau_found,
            tau_exit: cfg.tau_exit,
            v_away: cfg.v_away,
            t_cooldown: thresholds.t_cooldown,
            t_min_hold: thresholds.t_min_hold,
            t_arm: thresholds.t_arm,
            t_stable: thresholds.t_stable,
            t_disarm: thresholds.t_disarm,
            t_miss: thresholds.t_miss,
            zone_sets,
            routing,
            active_cam: initial_active,
            since_last_switch: 0,
            current_zone: None,
            zone_frames: 0,
            out_of_zone_frames: 0,
            last_in_zone: None,
            pos_history: VecDeque::with_capacity(POS_HISTORY_LEN),
        })
    }

    /// Recompute frame-count thresholds after an FPS change (§4.3 "Time-based
    /// thresholds").
    pub fn set_thresholds(&mut self, thresholds: &FrameThresholds) {
        self.t_cooldown = thresholds.t_cooldown;
        self.t_min_hold = thresholds.t_min_hold;
        self.t_arm = thresholds.t_arm;
        self.t_stable = thresholds.t_stable;
        self.t_disarm = thresholds.t_disarm;
        self.t_miss = thresholds.t_miss;
    }

    pub fn active_camera(&self) -> CameraId {
        self.active_cam
    }

    /// Whether a switch is currently blocked by cooldown — used by the
    /// orchestrator to gate fallback scanning (§4.4 "triggered ... when not
    /// in cooldown").
    pub fn is_in_cooldown(&self) -> bool {
        self.since_last_switch < self.t_cooldown
    }

    /// The active camera's exit-zone geometry, exposed read-only so the
    /// orchestrator's fallback-proximity check (§4.4) can reuse the same
    /// zone rectangles without rebuilding them.
    pub fn zone_set_for_active(&self) -> Option<&ZoneSet> {
        self.zone_sets.get(&self.active_cam)
    }

    /// Apply the post-switch reset (§4.3 "After applied SWITCH"). Called by
    /// the orchestrator only once a switch has cleared pre-flight — a
    /// `Decision::Switch` returned by `step` is a proposal, not yet state.
    pub fn commit_switch(&mut self, to: CameraId) {
        self.active_cam = to;
        self.since_last_switch = 0;
        self.current_zone = None;
        self.zone_frames = 0;
        self.out_of_zone_frames = 0;
        self.last_in_zone = None;
        self.pos_history.clear();
    }

    /// Evaluate one frame and return a HOLD or (proposed) SWITCH decision.
    pub fn step(&mut self, outcome: &StickyOutcome, width: u32, height: u32, ref_index: u64) -> Decision {
        self.since_last_switch = self.since_last_switch.saturating_add(1);

        let normalized = outcome
            .smoothed_center
            .or(outcome.center)
            .map(|(x, y)| (x as f64 / width.max(1) as f64, y as f64 / height.max(1) as f64));

        let vx = self.update_velocity_and_zone(normalized);
        let state = detection_state(outcome, self.tau_found);

        if self.since_last_switch < self.t_cooldown {
            return Decision::Hold { reason: Reason::Cooldown };
        }
        if self.since_last_switch < self.t_min_hold {
            return Decision::Hold { reason: Reason::MinHold };
        }

        if state == DetectionState::Found {
            if let Some(zone) = self.current_zone {
                match self.evaluate_armed_zone(zone, normalized.expect("found implies center"), vx, outcome.confidence, ref_index) {
                    Ok(decision) => return decision,
                    Err(reason) => return Decision::Hold { reason },
                }
            }
        }

        if outcome.miss_streak >= self.t_miss {
            if let Some(last) = self.last_in_zone {
                if toward_boundary(boundary_side(last.zone), last.vx) {
                    return self.propose_switch(last.zone, 0.5 + 0.5 * (self.t_miss as f32 / (outcome.miss_streak + 1) as f32).min(1.0), Reason::MissStreakRecovery);
                }
            }
        }

        match self.current_zone {
            None => Decision::Hold { reason: Reason::NoZone },
            Some(_) if self.zone_frames < self.t_stable => Decision::Hold { reason: Reason::UnstableZone },
            Some(_) if self.zone_frames < self.t_arm => Decision::Hold { reason: Reason::Unarmed },
            // Zone is armed and stable but the current frame isn't a FOUND
            // detection (rule 2a requires FOUND) and the miss-streak
            // recovery path (2b) above didn't fire either; reusing `Unarmed`
            // here since `Reason` has no "not currently found" variant and
            // this bucket means "not eligible to switch yet".
            Some(_) => Decision::Hold { reason: Reason::Unarmed },
        }
    }

    /// Rules 2(a)/3/4/5 for a zone that currently holds FOUND + is at least
    /// stable: stability/arming gates, trajectory guard, exit probability,
    /// and route resolution, in HOLD-reason priority order (§4.3).
    fn evaluate_armed_zone(
        &self,
        zone: ZoneLabel,
        normalized: (f64, f64),
        vx: f64,
        confidence: f32,
        ref_index: u64,
    ) -> Result<Decision, Reason> {
        if self.zone_frames < self.t_stable {
            return Err(Reason::UnstableZone);
        }
        if self.zone_frames < self.t_arm {
            return Err(Reason::Unarmed);
        }

        let side = boundary_side(zone);
        if strongly_away(side, vx, self.v_away) {
            return Err(Reason::TrajectoryAway);
        }

        let rect = self
            .zone_sets
            .get(&self.active_cam)
            .and_then(|zs| zs.zones.get(&zone))
            .copied();
        let exit_prob = exit_probability(side, rect, normalized, confidence, self.zone_frames, self.t_arm);
        if exit_prob < self.tau_exit {
            return Err(Reason::LowExitProb);
        }

        let target = self.resolve_route(zone, vx);
        match target {
            Some(to) if to != self.active_cam => Ok(Decision::Switch {
                from: self.active_cam,
                to,
                reason: Reason::BallInExitZone,
                ref_index,
                exit_prob,
            }),
            _ => Err(Reason::NoRoute),
        }
    }

    fn propose_switch(&self, zone: ZoneLabel, exit_prob: f32, reason: Reason) -> Decision {
        match self.resolve_route(zone, self.last_in_zone.map(|l| l.vx).unwrap_or(0.0)) {
            Some(to) if to != self.active_cam => Decision::Switch {
                from: self.active_cam,
                to,
                reason,
                ref_index: 0,
                exit_prob,
            },
            _ => Decision::Hold { reason: Reason::NoRoute },
        }
    }

    fn resolve_route(&self, zone: ZoneLabel, vx: f64) -> Option<CameraId> {
        if zone == ZoneLabel::Equal || zone == ZoneLabel::Top || zone == ZoneLabel::Bottom {
            if let Some(direct) = self.routing.route(self.active_cam, zone) {
                return Some(direct);
            }
            return self.routing.resolve_equal(vx);
        }
        self.routing.route(self.active_cam, zone)
    }

    /// Update the zone-dwell counters per the disarm-grace rule and return
    /// the per-frame horizontal velocity estimate (0 if no history yet).
    fn update_velocity_and_zone(&mut self, normalized: Option<(f64, f64)>) -> f64 {
        let vx = match (normalized, self.pos_history.back()) {
            (Some((nx, _)), Some((px, _))) => nx - px,
            _ => 0.0,
        };

        if let Some(point) = normalized {
            self.pos_history.push_back(point);
            while self.pos_history.len() > POS_HISTORY_LEN {
                self.pos_history.pop_front();
            }
        }

        let raw_zone = normalized.and_then(|(nx, ny)| {
            self.zone_sets.get(&self.active_cam).and_then(|zs| zs.containing(nx, ny))
        });

        match (raw_zone, self.current_zone) {
            (Some(z), Some(cur)) if z == cur => {
                self.zone_frames = self.zone_frames.saturating_add(1);
                self.out_of_zone_frames = 0;
            }
            (Some(z), _) => {
                self.current_zone = Some(z);
                self.zone_frames = 1;
                self.out_of_zone_frames = 0;
            }
            (None, Some(_)) => {
                self.out_of_zone_frames = self.out_of_zone_frames.saturating_add(1);
                if self.out_of_zone_frames > self.t_disarm {
                    self.current_zone = None;
                    self.zone_frames = 0;
                    self.out_of_zone_frames = 0;
                }
            }
            (None, None) => {}
        }

        if let Some(zone) = raw_zone {
            self.last_in_zone = Some(LastInZone { zone, vx });
        }

        vx
    }
}

fn detection_state(outcome: &StickyOutcome, tau_found: f32) -> DetectionState {
    match outcome.origin {
        StickyOrigin::Accepted if outcome.confidence >= tau_found => DetectionState::Found,
        StickyOrigin::None => DetectionState::Lost,
        _ => DetectionState::Held,
    }
}

/// §4.3 trajectory guard: block only *strong* motion away from the zone's
/// side. Zones without a horizontal side (Top/Bottom/Equal) are never
/// blocked, since the guard only speaks to horizontal velocity.
fn strongly_away(side: BoundarySide, vx: f64, v_away: f64) -> bool {
    match side {
        BoundarySide::Left => vx > v_away,
        BoundarySide::Right => vx < -v_away,
        BoundarySide::Top | BoundarySide::Bottom | BoundarySide::Center => false,
    }
}

/// §4.3 rule 2(b): whether the last-in-zone velocity pointed *toward* the
/// zone's boundary (the mirror of `strongly_away`, without a magnitude
/// threshold since this is a positive trigger, not a guard).
fn toward_boundary(side: BoundarySide, vx: f64) -> bool {
    match side {
        BoundarySide::Left => vx < 0.0,
        BoundarySide::Right => vx > 0.0,
        BoundarySide::Top | BoundarySide::Bottom | BoundarySide::Center => true,
    }
}

/// §4.3 rule 4: a scalar in `[0,1]` combining normalized distance to the
/// zone boundary, confidence, and consecutive-in-zone frames. The spec
/// leaves the exact curve unspecified (§9 open question, by analogy to the
/// fallback decay curve) — this implementation picks a fixed weighted blend
/// and is deterministic given the same inputs.
fn exit_probability(
    side: BoundarySide,
    rect: Option<NormalizedRect>,
    normalized: (f64, f64),
    confidence: f32,
    zone_frames: u32,
    t_arm: u32,
) -> f32 {
    let proximity = match (side, rect) {
        (BoundarySide::Left, Some(r)) if r.width > 0.0 => (1.0 - (normalized.0 - r.x1()) / r.width).clamp(0.0, 1.0),
        (BoundarySide::Right, Some(r)) if r.width > 0.0 => (1.0 - (r.x2() - normalized.0) / r.width).clamp(0.0, 1.0),
        (BoundarySide::Top, Some(r)) if r.height > 0.0 => (1.0 - (normalized.1 - r.y1()) / r.height).clamp(0.0, 1.0),
        (BoundarySide::Bottom, Some(r)) if r.height > 0.0 => (1.0 - (r.y2() - normalized.1) / r.height).clamp(0.0, 1.0),
        _ => 0.5,
    } as f32;

    let time_factor = (zone_frames as f32 / t_arm.max(1) as f32).min(1.0);

    (0.4 * proximity + 0.3 * confidence + 0.3 * time_factor).clamp(0.0, 1.0)
}

fn build_zone_sets(cameras: &[Camera]) -> HashMap<CameraId, ZoneSet> {
    cameras.iter().map(|c| (c.id, default_zone_set(c.role))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use match_models::{BBox, CameraRole, Detection, StickyOrigin};

    fn two_cam_cfg() -> DirectorConfig {
        let mut c = DirectorConfig::default();
        c.cameras = vec![Camera::new(0, CameraRole::Left, "a.mp4", 30.0), Camera::new(1, CameraRole::Right, "b.mp4", 30.0)];
        c.t_cooldown_secs = 0.1;
        c.t_min_hold_secs = 0.0;
        c.t_arm_secs = 0.2;
        c.t_stable_secs = 0.1;
        c.t_disarm_secs = 0.2;
        c.t_miss_secs = 0.5;
        c
    }

    fn outcome_at(x: f32, y: f32, conf: f32, origin: StickyOrigin) -> StickyOutcome {
        let bbox = BBox::new(x - 2.0, y - 2.0, x + 2.0, y + 2.0);
        StickyOutcome {
            bbox: Some(bbox),
            center: Some((x, y)),
            confidence: conf,
            origin,
            hold_age: 0,
            miss_streak: 0,
            smoothed_center: Some((x, y)),
            meta: Detection::present(bbox, conf).meta,
        }
    }

    #[test]
    fn holds_during_cooldown_even_in_armed_zone() {
        let cfg = two_cam_cfg();
        let th = FrameThresholds::compute(&cfg, 30.0);
        let mut sw = Switcher::new(&cfg, &th, 0).unwrap();
        let out = outcome_at(950.0, 500.0, 0.9, StickyOrigin::Accepted);
        let decision = sw.step(&out, 1000, 1000, 0);
        assert_eq!(decision, Decision::Hold { reason: Reason::Cooldown });
    }

    #[test]
    fn switches_after_zone_arms_past_cooldown() {
        let cfg = two_cam_cfg();
        let th = FrameThresholds::compute(&cfg, 30.0);
        let mut sw = Switcher::new(&cfg, &th, 0).unwrap();
        let out = outcome_at(950.0, 500.0, 0.9, StickyOrigin::Accepted);
        let mut last = Decision::Hold { reason: Reason::Cooldown };
        for i in 0..20u64 {
            last = sw.step(&out, 1000, 1000, i);
        }
        assert!(matches!(last, Decision::Switch { to: 1, reason: Reason::BallInExitZone, .. }), "{last:?}");
    }

    #[test]
    fn no_zone_holds_with_no_zone_reason() {
        let cfg = two_cam_cfg();
        let th = FrameThresholds::compute(&cfg, 30.0);
        let mut sw = Switcher::new(&cfg, &th, 0).unwrap();
        let out = outcome_at(500.0, 500.0, 0.9, StickyOrigin::Accepted);
        let mut last = Decision::Hold { reason: Reason::Cooldown };
        for i in 0..10u64 {
            last = sw.step(&out, 1000, 1000, i);
        }
        assert_eq!(last, Decision::Hold { reason: Reason::NoZone });
    }

    #[test]
    fn commit_switch_resets_zone_state() {
        let cfg = two_cam_cfg();
        let th = FrameThresholds::compute(&cfg, 30.0);
        let mut sw = Switcher::new(&cfg, &th, 0).unwrap();
        let out = outcome_at(950.0, 500.0, 0.9, StickyOrigin::Accepted);
        for i in 0..20u64 {
            sw.step(&out, 1000, 1000, i);
        }
        sw.commit_switch(1);
        assert_eq!(sw.active_camera(), 1);
        assert_eq!(sw.current_zone, None);
        let decision = sw.step(&out, 1000, 1000, 21);
        assert_eq!(decision, Decision::Hold { reason: Reason::Cooldown });
    }

    #[test]
    fn trajectory_strongly_away_blocks_switch() {
        let cfg = two_cam_cfg();
        let th = FrameThresholds::compute(&cfg, 30.0);
        let mut sw = Switcher::new(&cfg, &th, 0).unwrap();
        // Ball sits in the right-exit zone the whole time but keeps drifting
        // left (away from the x=1 boundary) by more than v_away every frame.
        let mut last = Decision::Hold { reason: Reason::Cooldown };
        for i in 0..20u64 {
            let x = 995.0 - i as f32 * 5.0;
            let out = outcome_at(x, 500.0, 0.9, StickyOrigin::Accepted);
            last = sw.step(&out, 1000, 1000, i);
        }
        assert_eq!(last, Decision::Hold { reason: Reason::TrajectoryAway });
    }
}
