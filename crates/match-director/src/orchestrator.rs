//! Orchestrator (§4.4): owns the reference timeline, drives the per-tick
//! pipeline (read → detect → track → decide → maybe switch → write), and
//! runs the Phase 0 startup scan and fallback recovery scan.
//!
//! Every other component is purely reactive; the Orchestrator is the only
//! piece that touches streams directly; it is also the only piece that knows
//! about more than one camera at a time.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use match_models::{
    BBox, Camera, CameraId, Decision, DetectionModel, DirectorConfig, Frame, FramePixels, FrameSink, FrameStream,
    FrameThresholds, NormalizedRect, Phase0Report, Reason, RunCounters, RunReport, StreamError, StreamPositions,
    SwitchEvent,
};

use crate::detector::BallDetector;
use crate::error::DirectorError;
use crate::sticky::StickyTracker;
use crate::switcher::Switcher;
use crate::writer::{WriteOutcome, Writer};

/// Cooperative cancellation signal, checked at every tick boundary and
/// before/after each blocking IO call (§5). Cheap to clone and share with a
/// caller-side `tokio::select!`/ctrl-c handler — the orchestrator itself
/// never touches a runtime.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a completed (or cleanly cancelled) run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: RunReport,
}

/// Owns the configured streams, the detection model, and the output sink for
/// one run, and drives them through Phase 0 and the main tick loop.
pub struct Orchestrator {
    cfg: DirectorConfig,
    cameras: Vec<Camera>,
    streams: HashMap<CameraId, Box<dyn FrameStream>>,
    model: Arc<dyn DetectionModel>,
    sink: Box<dyn FrameSink>,
}

impl Orchestrator {
    pub fn new(
        cfg: DirectorConfig,
        streams: Vec<Box<dyn FrameStream>>,
        model: Arc<dyn DetectionModel>,
        sink: Box<dyn FrameSink>,
    ) -> Result<Self, DirectorError> {
        cfg.validate()?;

        let mut stream_map: HashMap<CameraId, Box<dyn FrameStream>> = HashMap::new();
        for stream in streams {
            stream_map.insert(stream.camera_id(), stream);
        }
        for camera in &cfg.cameras {
            if !stream_map.contains_key(&camera.id) {
                return Err(DirectorError::MissingStream(camera.id));
            }
        }

        let cameras = cfg.cameras.clone();
        Ok(Self {
            cfg,
            cameras,
            streams: stream_map,
            model,
            sink,
        })
    }

    /// Run to completion: Phase 0, the tick loop, and report assembly. Not
    /// re-entrant — consumes the orchestrator since streams and the sink are
    /// one-shot resources.
    pub fn run(mut self, cancel: CancellationToken) -> Result<RunOutcome, DirectorError> {
        let run_started = Instant::now();

        let (mut active_cam, mut t_ref, phase0_report, mut detector) =
            run_phase0(&self.cfg, &self.cameras, &mut self.streams, self.model.as_ref());

        let fps = self
            .streams
            .get(&active_cam)
            .map(|s| s.fps())
            .filter(|f| *f > 0.0)
            .unwrap_or(self.cfg.f_out_fallback);
        let mut thresholds = FrameThresholds::compute(&self.cfg, fps);

        let mut sticky = StickyTracker::new(&self.cfg, &thresholds);
        sticky.reset(active_cam);
        let mut switcher = Switcher::new(&self.cfg, &thresholds, active_cam)?;
        let mut writer = Writer::new(self.sink, self.cfg.duration_secs, fps);
        let mut fallback = FallbackScanner::new(&self.cfg, &thresholds);

        let mut switch_log: Vec<SwitchEvent> = Vec::new();
        let mut reasons_histogram: HashMap<Reason, u64> = HashMap::new();
        let mut camera_usage: HashMap<CameraId, u64> = HashMap::new();
        let mut counters = RunCounters::default();
        let mut miss_streak_samples: Vec<u32> = Vec::new();
        let mut last_dims: (u32, u32) = (0, 0);

        'tick: loop {
            if cancel.is_cancelled() {
                break 'tick;
            }

            let frame = match read_with_retry(
                self.streams
                    .get_mut(&active_cam)
                    .expect("active camera always has a backing stream"),
            ) {
                Ok(frame) => frame,
                Err(_) => match failover(&self.cameras, &mut self.streams, active_cam, t_ref) {
                    Some((new_active, frame)) => {
                        let positions = stream_positions(&self.cameras, &self.streams);
                        switch_log.push(SwitchEvent {
                            from: active_cam,
                            to: new_active,
                            reason: Reason::ActiveStreamEnded,
                            ref_index: t_ref,
                            exit_prob: 0.0,
                            at: Utc::now(),
                            stream_positions: positions,
                        });
                        active_cam = new_active;
                        switcher.commit_switch(new_active);
                        sticky.reset(new_active);
                        detector.reset();
                        frame
                    }
                    None => break 'tick,
                },
            };

            if cancel.is_cancelled() {
                break 'tick;
            }

            t_ref = frame.timeline_index;
            last_dims = (frame.pixels.width, frame.pixels.height);
            counters.frames_processed += 1;

            let raw_detection = detector.detect(self.model.as_ref(), &frame.pixels, t_ref);
            let outcome = sticky.update(&raw_detection, last_dims.0, last_dims.1, t_ref);
            miss_streak_samples.push(outcome.miss_streak);

            let decision = switcher.step(&outcome, last_dims.0, last_dims.1, t_ref);
            let mut frame_to_write = frame;

            match decision {
                Decision::Switch { to, reason, exit_prob, .. } => {
                    match try_apply_switch(&self.cfg, self.model.as_ref(), &mut self.streams, to, t_ref) {
                        Ok(target_frame) => {
                            check_hard_sync(&target_frame, t_ref)?;
                            let positions = stream_positions(&self.cameras, &self.streams);
                            switch_log.push(SwitchEvent {
                                from: active_cam,
                                to,
                                reason,
                                ref_index: t_ref,
                                exit_prob,
                                at: Utc::now(),
                                stream_positions: positions,
                            });
                            active_cam = to;
                            switcher.commit_switch(to);
                            sticky.reset(to);
                            detector.reset();
                            frame_to_write = target_frame;
                        }
                        Err(abort_reason) => {
                            *reasons_histogram.entry(abort_reason).or_insert(0) += 1;
                        }
                    }
                }
                Decision::Hold { reason } => {
                    *reasons_histogram.entry(reason).or_insert(0) += 1;

                    if !switcher.is_in_cooldown() && outcome.miss_streak >= thresholds.t_fb {
                        if let Some(Decision::Switch { to, reason, exit_prob, .. }) = maybe_fallback_scan(
                            &self.cfg,
                            self.model.as_ref(),
                            &mut self.streams,
                            &self.cameras,
                            &switcher,
                            &sticky,
                            active_cam,
                            t_ref,
                            last_dims,
                            &mut fallback,
                            &mut counters,
                        ) {
                            match try_apply_switch(&self.cfg, self.model.as_ref(), &mut self.streams, to, t_ref) {
                                Ok(target_frame) => {
                                    check_hard_sync(&target_frame, t_ref)?;
                                    let positions = stream_positions(&self.cameras, &self.streams);
                                    switch_log.push(SwitchEvent {
                                        from: active_cam,
                                        to,
                                        reason,
                                        ref_index: t_ref,
                                        exit_prob,
                                        at: Utc::now(),
                                        stream_positions: positions,
                                    });
                                    active_cam = to;
                                    switcher.commit_switch(to);
                                    sticky.reset(to);
                                    detector.reset();
                                    frame_to_write = target_frame;
                                }
                                Err(abort_reason) => {
                                    *reasons_histogram.entry(abort_reason).or_insert(0) += 1;
                                }
                            }
                        }
                    }
                }
            }

            if cancel.is_cancelled() {
                break 'tick;
            }

            *camera_usage.entry(frame_to_write.camera_id).or_insert(0) += 1;
            match writer.accept(&frame_to_write) {
                Ok(WriteOutcome::Continue) => {}
                Ok(WriteOutcome::Done) => break 'tick,
                Err(e) => return Err(DirectorError::Sink(e)),
            }

            // A switched-to camera may run at a different FPS; thresholds
            // are recomputed so the hot loop stays integer-only against the
            // *current* active stream (§4.3 "Time-based thresholds").
            if let Some(stream) = self.streams.get(&active_cam) {
                let active_fps = stream.fps();
                if active_fps > 0.0 && (active_fps - fps).abs() > f64::EPSILON {
                    thresholds = FrameThresholds::compute(&self.cfg, active_fps);
                    sticky.set_thresholds(&thresholds);
                    switcher.set_thresholds(&thresholds);
                }
            }
        }

        let (written, n_target, duration_written) = writer.finalize()?;
        counters.frames_written = written;
        counters.miss_streak_p95 = percentile_95(&miss_streak_samples);

        let warnings = RunReport::dominance_warnings(&camera_usage, written);

        let report = RunReport {
            phase0: phase0_report,
            camera_usage,
            switches: switch_log,
            reasons_histogram,
            counters,
            warnings,
            written,
            n_target,
            duration_written_secs: duration_written,
            processing_time_secs: run_started.elapsed().as_secs_f64(),
        };

        Ok(RunOutcome { report })
    }
}

fn check_hard_sync(frame: &Frame, t_ref: u64) -> Result<(), DirectorError> {
    if frame.timeline_index != t_ref {
        return Err(DirectorError::InvariantViolation {
            detail: format!("hard-sync produced timeline_index {} but t_ref is {t_ref}", frame.timeline_index),
            t_ref,
        });
    }
    Ok(())
}

/// §4.4 Phase 0: scan every stream for up to `phase0_n_scan` frames (time
/// capped by `phase0_time_cap_secs`), pick the camera with the most valid
/// detections (ties broken by mean confidence, then lowest camera id), and
/// re-sync every other stream to the chosen camera's resulting position. The
/// chosen camera's detector is reused as the main-loop detector so its
/// motion prior carries over instead of starting cold.
fn run_phase0(
    cfg: &DirectorConfig,
    cameras: &[Camera],
    streams: &mut HashMap<CameraId, Box<dyn FrameStream>>,
    model: &dyn DetectionModel,
) -> (CameraId, u64, Phase0Report, BallDetector) {
    let started = Instant::now();
    let cap = Duration::from_secs_f64(cfg.phase0_time_cap_secs.max(0.0));

    let mut detectors: HashMap<CameraId, BallDetector> = cameras.iter().map(|c| (c.id, BallDetector::new(cfg))).collect();
    let mut valid_counts: HashMap<CameraId, u32> = cameras.iter().map(|c| (c.id, 0)).collect();
    let mut conf_sums: HashMap<CameraId, f64> = cameras.iter().map(|c| (c.id, 0.0)).collect();
    let mut frames_scanned = 0u32;

    for _ in 0..cfg.phase0_n_scan {
        if started.elapsed() >= cap {
            break;
        }
        frames_scanned += 1;
        for camera in cameras {
            let Some(stream) = streams.get_mut(&camera.id) else { continue };
            let Ok(frame) = stream.read_next() else { continue };
            let Some(det) = detectors.get_mut(&camera.id) else { continue };
            let detection = det.detect(model, &frame.pixels, frame.timeline_index);
            if detection.is_present() {
                *valid_counts.get_mut(&camera.id).unwrap() += 1;
                *conf_sums.get_mut(&camera.id).unwrap() += detection.confidence as f64;
            }
        }
    }

    let mean_confidence: HashMap<CameraId, f64> = valid_counts
        .iter()
        .map(|(&id, &count)| {
            let mean = if count > 0 { conf_sums[&id] / count as f64 } else { 0.0 };
            (id, mean)
        })
        .collect();

    let chosen = cameras
        .iter()
        .map(|c| c.id)
        .max_by(|&a, &b| {
            valid_counts[&a]
                .cmp(&valid_counts[&b])
                .then_with(|| mean_confidence[&a].partial_cmp(&mean_confidence[&b]).unwrap())
                .then_with(|| b.cmp(&a))
        })
        .expect("validate() guarantees at least one configured camera");

    let t_ref = streams.get(&chosen).map(|s| s.true_position()).unwrap_or(0);
    for camera in cameras {
        if camera.id == chosen {
            continue;
        }
        if let Some(stream) = streams.get_mut(&camera.id) {
            if let Err(err) = stream.seek_to(t_ref) {
                tracing::warn!(camera_id = camera.id, t_ref, error = %err, "phase0 post-scan resync failed");
            }
        }
    }

    let report = Phase0Report {
        frames_scanned,
        chosen_camera: chosen,
        valid_detections_by_camera: valid_counts,
        mean_confidence_by_camera: mean_confidence,
    };

    let detector = detectors.remove(&chosen).expect("chosen camera has a detector");
    (chosen, t_ref, report, detector)
}

/// Retry once at the call site before surfacing the failure to the caller's
/// failover policy (§7 `IoFailure`).
fn read_with_retry(stream: &mut Box<dyn FrameStream>) -> Result<Frame, StreamError> {
    match stream.read_next() {
        Ok(frame) => Ok(frame),
        Err(_) => stream.read_next(),
    }
}

/// §4.4 "active stream ended": hard-sync each sibling to `t_ref` in camera-id
/// order and take the first one that produces a frame.
fn failover(
    cameras: &[Camera],
    streams: &mut HashMap<CameraId, Box<dyn FrameStream>>,
    failed: CameraId,
    t_ref: u64,
) -> Option<(CameraId, Frame)> {
    for camera in cameras {
        if camera.id == failed {
            continue;
        }
        let stream = streams.get_mut(&camera.id)?;
        if stream.seek_to(t_ref).is_err() {
            continue;
        }
        if let Ok(frame) = stream.read_next() {
            return Some((camera.id, frame));
        }
    }
    None
}

fn stream_positions(cameras: &[Camera], streams: &HashMap<CameraId, Box<dyn FrameStream>>) -> StreamPositions {
    cameras
        .iter()
        .map(|c| (c.id, streams.get(&c.id).map(|s| s.true_position()).unwrap_or(0)))
        .collect()
}

/// §4.4 switch pre-flight: hard-sync the target to `t_ref`, read exactly one
/// frame, and — if configured — require that frame to carry a ball before
/// committing. Returns the abort reason rather than the propagated IO error,
/// since a failed pre-flight is a HOLD, not a fatal condition.
fn try_apply_switch(
    cfg: &DirectorConfig,
    model: &dyn DetectionModel,
    streams: &mut HashMap<CameraId, Box<dyn FrameStream>>,
    to: CameraId,
    t_ref: u64,
) -> Result<Frame, Reason> {
    let stream = streams.get_mut(&to).ok_or(Reason::TargetUnavailable)?;
    stream.seek_to(t_ref).map_err(|_| Reason::TargetUnavailable)?;
    let frame = stream.read_next().map_err(|_| Reason::TargetUnavailable)?;

    if cfg.pre_switch_require_ball {
        let mut verifier = BallDetector::new(cfg);
        let detection = verifier.detect(model, &frame.pixels, t_ref);
        if !detection.is_present() {
            return Err(Reason::TargetNoBall);
        }
    }

    Ok(frame)
}

/// §4.4 fallback scan gating: only run it when not in cooldown, the ball has
/// been missing at least `t_fb`, there's a last-known position to anchor on,
/// and that position sits within `d_prox` of one of the active camera's exit
/// zones (so a ball lost center-field doesn't churn the fallback scanner).
#[allow(clippy::too_many_arguments)]
fn maybe_fallback_scan(
    cfg: &DirectorConfig,
    model: &dyn DetectionModel,
    streams: &mut HashMap<CameraId, Box<dyn FrameStream>>,
    cameras: &[Camera],
    switcher: &Switcher,
    sticky: &StickyTracker,
    active: CameraId,
    t_ref: u64,
    dims: (u32, u32),
    fallback: &mut FallbackScanner,
    counters: &mut RunCounters,
) -> Option<Decision> {
    if fallback.suppressed {
        return None;
    }
    let (w, h) = dims;
    if w == 0 || h == 0 {
        return None;
    }

    let last_center = sticky.last_known_center()?;
    let normalized = (last_center.0 as f64 / w as f64, last_center.1 as f64 / h as f64);
    let zone_set = switcher.zone_set_for_active()?;
    let min_dist = zone_set
        .zones
        .values()
        .map(|rect| rect_min_distance(rect, normalized.0, normalized.1))
        .fold(f64::INFINITY, f64::min);
    if min_dist > cfg.d_prox {
        return None;
    }

    let candidates: Vec<CameraId> = cameras.iter().map(|c| c.id).filter(|&id| id != active).collect();
    counters.fallback_attempts += 1;

    fallback.scan(t_ref, &candidates, streams, model).map(|(to, exit_prob)| {
        counters.fallback_confirmations += 1;
        Decision::Switch {
            from: active,
            to,
            reason: Reason::FallbackConfirmed,
            ref_index: t_ref,
            exit_prob,
        }
    })
}

fn rect_min_distance(rect: &NormalizedRect, x: f64, y: f64) -> f64 {
    let dx = if x < rect.x1() {
        rect.x1() - x
    } else if x > rect.x2() {
        x - rect.x2()
    } else {
        0.0
    };
    let dy = if y < rect.y1() {
        rect.y1() - y
    } else if y > rect.y2() {
        y - rect.y2()
    } else {
        0.0
    };
    (dx * dx + dy * dy).sqrt()
}

/// §6.2 fallback-candidate sanity bounds: bbox side, area, aspect ratio, and
/// relative size against the frame. A candidate failing any of these is
/// never treated as a plausible ball, no matter its confidence.
fn sanity_check(bbox: BBox, frame_w: u32, frame_h: u32) -> bool {
    let w = bbox.width();
    let h = bbox.height();
    if !(8.0..=150.0).contains(&w) || !(8.0..=150.0).contains(&h) {
        return false;
    }
    let area = bbox.area();
    if !(64.0..=22_500.0).contains(&area) {
        return false;
    }
    let ratio = w / h;
    if !(0.5..=2.0).contains(&ratio) {
        return false;
    }
    let frame_area = frame_w as f32 * frame_h as f32;
    if frame_area <= 0.0 || area / frame_area > 0.15 {
        return false;
    }
    true
}

fn detect_raw_best(model: &dyn DetectionModel, pixels: &FramePixels) -> Option<(BBox, f32)> {
    let candidates = model.detect(pixels).ok()?;
    candidates
        .into_iter()
        .filter(|c| sanity_check(c.bbox, pixels.width, pixels.height))
        .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap())
        .map(|c| (c.bbox, c.confidence))
}

struct CandidateRecord {
    frame_index: u64,
    confidence: f32,
}

/// Adaptive fallback scanner (§4.4): hard-syncs candidate streams one at a
/// time (or all at once, per `fallback_one_per_tick`), accumulates a
/// decayed-weight confirmation window, and backs off after `a_max` fruitless
/// attempts for `p` frames, up to `c_max` cycles before giving up for the
/// rest of the run.
struct FallbackScanner {
    k_same: f64,
    k_alt: f64,
    rho: f64,
    window_frames: u32,
    a_max: u32,
    p_frames: u32,
    c_max: u32,
    one_per_tick: bool,

    history: HashMap<CameraId, VecDeque<CandidateRecord>>,
    attempts_this_cycle: u32,
    cycles_completed: u32,
    paused_until: Option<u64>,
    suppressed: bool,
    round_robin_cursor: usize,
}

impl FallbackScanner {
    fn new(cfg: &DirectorConfig, thresholds: &FrameThresholds) -> Self {
        Self {
            k_same: cfg.k_same as f64,
            k_alt: cfg.k_alt as f64,
            rho: cfg.rho,
            window_frames: thresholds.time_window_fb.max(1),
            a_max: cfg.a_max.max(1),
            p_frames: thresholds.p,
            c_max: cfg.c_max.max(1),
            one_per_tick: cfg.fallback_one_per_tick,
            history: HashMap::new(),
            attempts_this_cycle: 0,
            cycles_completed: 0,
            paused_until: None,
            suppressed: false,
            round_robin_cursor: 0,
        }
    }

    fn scan(
        &mut self,
        t_ref: u64,
        candidates: &[CameraId],
        streams: &mut HashMap<CameraId, Box<dyn FrameStream>>,
        model: &dyn DetectionModel,
    ) -> Option<(CameraId, f32)> {
        if self.suppressed || candidates.is_empty() {
            return None;
        }
        if let Some(paused_until) = self.paused_until {
            if t_ref < paused_until {
                return None;
            }
            self.paused_until = None;
        }

        let this_tick: Vec<CameraId> = if self.one_per_tick {
            let id = candidates[self.round_robin_cursor % candidates.len()];
            self.round_robin_cursor = self.round_robin_cursor.wrapping_add(1);
            vec![id]
        } else {
            candidates.to_vec()
        };

        for cam in this_tick {
            let Some(stream) = streams.get_mut(&cam) else { continue };
            if stream.seek_to(t_ref).is_err() {
                continue;
            }
            let Ok(frame) = stream.read_next() else { continue };
            if let Some((_bbox, confidence)) = detect_raw_best(model, &frame.pixels) {
                self.history.entry(cam).or_default().push_back(CandidateRecord {
                    frame_index: t_ref,
                    confidence,
                });
            }
        }

        self.prune(t_ref);
        let confirmed = self.check_confirmation(t_ref);

        self.attempts_this_cycle += 1;
        if confirmed.is_some() {
            self.attempts_this_cycle = 0;
            self.cycles_completed = 0;
            self.history.clear();
        } else if self.attempts_this_cycle >= self.a_max {
            self.attempts_this_cycle = 0;
            self.cycles_completed += 1;
            self.history.clear();
            self.paused_until = Some(t_ref + self.p_frames as u64);
            if self.cycles_completed >= self.c_max {
                self.suppressed = true;
            }
        }

        confirmed
    }

    fn prune(&mut self, t_ref: u64) {
        let window = self.window_frames as u64;
        for records in self.history.values_mut() {
            while let Some(front) = records.front() {
                if t_ref.saturating_sub(front.frame_index) > window {
                    records.pop_front();
                } else {
                    break;
                }
            }
        }
    }

    /// Confirm a stationary/off-zone candidate once its decayed *detection
    /// count* reaches `k_same`, or an alternating pattern across candidates
    /// once the combined decayed count reaches `k_alt` (§4.4: "≥ K_same
    /// detections in the same candidate" / "≥ K_alt detections distributed
    /// across candidates" — confidence is not part of the vote, only of the
    /// reported `exit_prob`; §9 open question: the exact decay curve is left
    /// to the implementation — this one decays linearly from 1.0 to `rho`
    /// over the window's second half).
    fn check_confirmation(&self, t_ref: u64) -> Option<(CameraId, f32)> {
        let half = self.window_frames as f64 / 2.0;
        let window = self.window_frames as f64;

        let mut weighted: HashMap<CameraId, f64> = HashMap::new();
        let mut mean_confidence: HashMap<CameraId, f64> = HashMap::new();
        for (&cam, records) in &self.history {
            let total: f64 = records
                .iter()
                .map(|r| decayed_weight(t_ref.saturating_sub(r.frame_index) as f64, half, window, self.rho))
                .sum();
            if total > 0.0 {
                weighted.insert(cam, total);
                let conf_sum: f64 = records.iter().map(|r| r.confidence as f64).sum();
                mean_confidence.insert(cam, conf_sum / records.len() as f64);
            }
        }

        if let Some((&cam, &total)) = weighted.iter().max_by(|a, b| a.1.partial_cmp(b.1).unwrap()) {
            if total >= self.k_same {
                return Some((cam, mean_confidence[&cam].clamp(0.0, 1.0) as f32));
            }
        }

        let distinct = weighted.len();
        let total: f64 = weighted.values().sum();
        if distinct >= 2 && total >= self.k_alt {
            let (&cam, _) = weighted.iter().max_by(|a, b| a.1.partial_cmp(b.1).unwrap()).unwrap();
            return Some((cam, mean_confidence[&cam].clamp(0.0, 1.0) as f32));
        }

        None
    }
}

fn decayed_weight(age: f64, half: f64, window: f64, rho: f64) -> f64 {
    if age <= half {
        1.0
    } else if age >= window {
        rho
    } else {
        let span = (window - half).max(1.0);
        1.0 - (1.0 - rho) * ((age - half) / span)
    }
}

fn percentile_95(samples: &[u32]) -> u32 {
    if samples.is_empty() {
        return 0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    let idx = ((sorted.len() as f64) * 0.95).ceil() as usize;
    let idx = idx.saturating_sub(1).min(sorted.len() - 1);
    sorted[idx]
}

#[cfg(test)]
mod tests {
    use super::*;
    use match_models::{CameraRole, ModelError, RawCandidate, SinkError};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn cfg_two_cam() -> DirectorConfig {
        let mut c = DirectorConfig::default();
        c.cameras = vec![Camera::new(0, CameraRole::Left, "a.mp4", 30.0), Camera::new(1, CameraRole::Right, "b.mp4", 30.0)];
        c.phase0_n_scan = 3;
        c.duration_secs = 1.0;
        c.f_out_fallback = 30.0;
        c.t_cooldown_secs = 0.0;
        c.t_min_hold_secs = 0.0;
        c
    }

    #[test]
    fn sanity_check_rejects_tiny_and_huge_boxes() {
        assert!(!sanity_check(BBox::new(0.0, 0.0, 2.0, 2.0), 1920, 1080));
        assert!(!sanity_check(BBox::new(0.0, 0.0, 400.0, 400.0), 1920, 1080));
        assert!(sanity_check(BBox::new(0.0, 0.0, 20.0, 20.0), 1920, 1080));
    }

    #[test]
    fn sanity_check_rejects_extreme_aspect_ratio() {
        assert!(!sanity_check(BBox::new(0.0, 0.0, 100.0, 10.0), 1920, 1080));
    }

    #[test]
    fn sanity_check_rejects_large_relative_size() {
        assert!(!sanity_check(BBox::new(0.0, 0.0, 100.0, 100.0), 100, 100));
    }

    #[test]
    fn rect_min_distance_is_zero_inside_rect() {
        let r = NormalizedRect::from_corners(0.8, 0.0, 1.0, 1.0);
        assert_eq!(rect_min_distance(&r, 0.9, 0.5), 0.0);
    }

    #[test]
    fn rect_min_distance_measures_outside_gap() {
        let r = NormalizedRect::from_corners(0.8, 0.0, 1.0, 1.0);
        assert!((rect_min_distance(&r, 0.7, 0.5) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn decayed_weight_is_full_in_first_half_and_rho_at_window_edge() {
        assert_eq!(decayed_weight(0.0, 5.0, 10.0, 0.5), 1.0);
        assert_eq!(decayed_weight(5.0, 5.0, 10.0, 0.5), 1.0);
        assert_eq!(decayed_weight(10.0, 5.0, 10.0, 0.5), 0.5);
    }

    /// §8 S4: three low-confidence detections (0.4, 0.45, 0.5) on the same
    /// candidate within the window must confirm once `k_same` is reached —
    /// the vote is a decayed detection *count*, not confidence-weighted, so
    /// low confidence alone must never block confirmation.
    #[test]
    fn check_confirmation_counts_detections_not_confidence() {
        let mut cfg = DirectorConfig::default();
        cfg.k_same = 3;
        cfg.k_alt = 4;
        cfg.rho = 0.5;
        cfg.time_window_fb_secs = 2.0;
        let th = FrameThresholds::compute(&cfg, 30.0);
        let mut scanner = FallbackScanner::new(&cfg, &th);

        for (frame_index, confidence) in [(0u64, 0.4f32), (10, 0.45), (20, 0.5)] {
            scanner.history.entry(1).or_default().push_back(CandidateRecord { frame_index, confidence });
        }

        let confirmed = scanner.check_confirmation(20);
        assert_eq!(confirmed.map(|(cam, _)| cam), Some(1));
    }

    #[test]
    fn percentile_95_of_empty_is_zero() {
        assert_eq!(percentile_95(&[]), 0);
    }

    #[test]
    fn percentile_95_picks_near_top_of_sorted_samples() {
        let samples: Vec<u32> = (1..=20).collect();
        assert_eq!(percentile_95(&samples), 19);
    }

    #[test]
    fn cancellation_token_starts_uncancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    struct NoCandidatesModel;
    impl DetectionModel for NoCandidatesModel {
        fn detect(&self, _pixels: &FramePixels) -> Result<Vec<RawCandidate>, ModelError> {
            Ok(vec![])
        }
    }

    struct FixedScriptStream {
        camera_id: CameraId,
        fps: f64,
        position: u64,
        len: u64,
        width: u32,
        height: u32,
    }

    impl FrameStream for FixedScriptStream {
        fn camera_id(&self) -> CameraId {
            self.camera_id
        }
        fn fps(&self) -> f64 {
            self.fps
        }
        fn read_next(&mut self) -> Result<Frame, StreamError> {
            if self.position >= self.len {
                return Err(StreamError::EndOfStream);
            }
            let frame = Frame::new(
                self.camera_id,
                self.position,
                FramePixels::new(self.width, self.height, vec![0u8; (self.width * self.height * 3) as usize]),
            );
            self.position += 1;
            Ok(frame)
        }
        fn seek_to(&mut self, index: u64) -> Result<(), StreamError> {
            self.position = index;
            Ok(())
        }
        fn true_position(&self) -> u64 {
            self.position
        }
    }

    struct NullSink;
    impl FrameSink for NullSink {
        fn init(&mut self, _w: u32, _h: u32, _fps: f64) -> Result<(), SinkError> {
            Ok(())
        }
        fn write(&mut self, _frame: &Frame) -> Result<(), SinkError> {
            Ok(())
        }
        fn finalize(self: Box<Self>) -> Result<(), SinkError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSinkState {
        writes: u32,
    }

    struct RecordingSink(Rc<RefCell<RecordingSinkState>>);
    impl FrameSink for RecordingSink {
        fn init(&mut self, _w: u32, _h: u32, _fps: f64) -> Result<(), SinkError> {
            Ok(())
        }
        fn write(&mut self, _frame: &Frame) -> Result<(), SinkError> {
            self.0.borrow_mut().writes += 1;
            Ok(())
        }
        fn finalize(self: Box<Self>) -> Result<(), SinkError> {
            Ok(())
        }
    }

    #[test]
    fn run_with_no_detections_ever_still_writes_n_target_frames() {
        let cfg = cfg_two_cam();
        let streams: Vec<Box<dyn FrameStream>> = vec![
            Box::new(FixedScriptStream { camera_id: 0, fps: 30.0, position: 0, len: 60, width: 64, height: 64 }),
            Box::new(FixedScriptStream { camera_id: 1, fps: 30.0, position: 0, len: 60, width: 64, height: 64 }),
        ];
        let state = Rc::new(RefCell::new(RecordingSinkState::default()));
        let model: Arc<dyn DetectionModel> = Arc::new(NoCandidatesModel);
        let orch = Orchestrator::new(cfg, streams, model, Box::new(RecordingSink(state.clone()))).unwrap();
        let outcome = orch.run(CancellationToken::new()).unwrap();
        assert_eq!(outcome.report.written, 30);
        assert_eq!(state.borrow().writes, 30);
        assert_eq!(outcome.report.phase0.chosen_camera, 0);
    }

    #[test]
    fn run_stops_early_when_cancelled_before_first_tick() {
        let cfg = cfg_two_cam();
        let streams: Vec<Box<dyn FrameStream>> = vec![
            Box::new(FixedScriptStream { camera_id: 0, fps: 30.0, position: 0, len: 60, width: 64, height: 64 }),
            Box::new(FixedScriptStream { camera_id: 1, fps: 30.0, position: 0, len: 60, width: 64, height: 64 }),
        ];
        let model: Arc<dyn DetectionModel> = Arc::new(NoCandidatesModel);
        let orch = Orchestrator::new(cfg, streams, model, Box::new(NullSink)).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let outcome = orch.run(token).unwrap();
        assert_eq!(outcome.report.written, 0);
    }

    #[test]
    fn new_rejects_camera_with_no_matching_stream() {
        let cfg = cfg_two_cam();
        let streams: Vec<Box<dyn FrameStream>> =
            vec![Box::new(FixedScriptStream { camera_id: 0, fps: 30.0, position: 0, len: 60, width: 64, height: 64 })];
        let model: Arc<dyn DetectionModel> = Arc::new(NoCandidatesModel);
        let err = Orchestrator::new(cfg, streams, model, Box::new(NullSink)).unwrap_err();
        assert!(matches!(err, DirectorError::MissingStream(1)));
    }

    #[test]
    fn run_fails_over_when_active_stream_ends_early() {
        let cfg = cfg_two_cam();
        let streams: Vec<Box<dyn FrameStream>> = vec![
            Box::new(FixedScriptStream { camera_id: 0, fps: 30.0, position: 0, len: 5, width: 64, height: 64 }),
            Box::new(FixedScriptStream { camera_id: 1, fps: 30.0, position: 0, len: 60, width: 64, height: 64 }),
        ];
        let model: Arc<dyn DetectionModel> = Arc::new(NoCandidatesModel);
        let orch = Orchestrator::new(cfg, streams, model, Box::new(NullSink)).unwrap();
        let outcome = orch.run(CancellationToken::new()).unwrap();
        assert_eq!(outcome.report.written, 30);
        assert!(outcome.report.switches.iter().any(|s| s.reason == Reason::ActiveStreamEnded));
    }
}
