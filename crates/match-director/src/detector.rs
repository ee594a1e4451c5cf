//! Ball Detector (§4.1): per-frame candidate selection with a motion/pitch prior.
//!
//! The only state carried across frames is the motion prior — the last
//! accepted center and the timeline index it was observed at — plus the
//! detector's own confidence gate. Everything else is recomputed per call.

use match_models::{DirectorConfig, Detection, DetectionModel, FramePixels, RawCandidate};

/// Last accepted center, used to bias candidate scoring toward plausible motion.
#[derive(Debug, Clone, Copy)]
struct MotionPrior {
    center: (f32, f32),
    #[allow(dead_code)]
    timeline_index: u64,
}

/// Per-frame ball candidate selector (§4.1).
///
/// Consumes raw candidates from a [`DetectionModel`] (already class-filtered
/// by the adapter) and re-applies the detector's own confidence gate before
/// scoring, since adapters are expected to stay permissive and let this
/// layer decide what counts (see `match-video`'s `OnnxBallDetector`).
pub struct BallDetector {
    tau_conf: f32,
    tau_high: f32,
    delta_max: f32,
    pitch_mask_enabled: bool,
    motion_prior: Option<MotionPrior>,
}

impl BallDetector {
    pub fn new(cfg: &DirectorConfig) -> Self {
        Self {
            tau_conf: cfg.tau_conf,
            tau_high: cfg.tau_high,
            delta_max: cfg.delta_max,
            pitch_mask_enabled: cfg.pitch_mask_enabled,
            motion_prior: None,
        }
    }

    /// Clear the motion prior. Called on camera switch — a prior learned in
    /// one camera's pixel space is meaningless in another's.
    pub fn reset(&mut self) {
        self.motion_prior = None;
    }

    /// Run the model and select the best candidate, per the scoring rule in §4.1.
    ///
    /// Model-invocation errors are reported as an empty `Detection` with
    /// `meta.error = true`; the motion prior is left untouched so repeated
    /// errors don't poison later frames.
    pub fn detect(&mut self, model: &dyn DetectionModel, pixels: &FramePixels, timeline_index: u64) -> Detection {
        let raw = match model.detect(pixels) {
            Ok(candidates) => candidates,
            Err(_) => return Detection::empty_with_error(),
        };
        self.select(&raw, pixels, timeline_index)
    }

    fn select(&mut self, raw: &[RawCandidate], pixels: &FramePixels, timeline_index: u64) -> Detection {
        let gated: Vec<&RawCandidate> = raw.iter().filter(|c| c.confidence >= self.tau_conf).collect();
        if gated.is_empty() {
            return Detection::empty();
        }

        let mut best: Option<(&RawCandidate, f32)> = None;
        for candidate in &gated {
            let center = candidate.bbox.center();
            let score = self.score(candidate.confidence, center, pixels);
            if score <= 0.0 {
                continue;
            }
            best = Some(match best {
                None => (*candidate, score),
                Some((cur, cur_score)) => {
                    if score > cur_score {
                        (*candidate, score)
                    } else if score == cur_score {
                        self.break_tie(cur, cur_score, candidate, score)
                    } else {
                        (cur, cur_score)
                    }
                }
            });
        }

        match best {
            None => Detection::empty(),
            Some((winner, _)) => {
                let detection = Detection::present(winner.bbox, winner.confidence);
                self.motion_prior = detection.center.map(|center| MotionPrior { center, timeline_index });
                detection
            }
        }
    }

    /// Resolve a tied score by confidence, then by minimum distance to the prior.
    fn break_tie<'a>(
        &self,
        cur: &'a RawCandidate,
        cur_score: f32,
        candidate: &'a RawCandidate,
        candidate_score: f32,
    ) -> (&'a RawCandidate, f32) {
        if candidate.confidence > cur.confidence {
            return (candidate, candidate_score);
        }
        if candidate.confidence < cur.confidence {
            return (cur, cur_score);
        }
        match &self.motion_prior {
            None => (cur, cur_score),
            Some(prior) => {
                let d_cur = distance(cur.bbox.center(), prior.center);
                let d_new = distance(candidate.bbox.center(), prior.center);
                if d_new < d_cur {
                    (candidate, candidate_score)
                } else {
                    (cur, cur_score)
                }
            }
        }
    }

    fn score(&self, conf: f32, center: (f32, f32), pixels: &FramePixels) -> f32 {
        conf * self.motion(conf, center) * self.pitch(center, pixels)
    }

    fn motion(&self, conf: f32, center: (f32, f32)) -> f32 {
        match &self.motion_prior {
            None => 1.0,
            Some(_) if conf >= self.tau_high => 1.0,
            Some(prior) => {
                let d = distance(center, prior.center);
                if d > self.delta_max {
                    0.0
                } else {
                    1.0 - d / self.delta_max
                }
            }
        }
    }

    fn pitch(&self, center: (f32, f32), pixels: &FramePixels) -> f32 {
        if !self.pitch_mask_enabled {
            return 1.0;
        }
        if is_pitch_green(pixels, center.0, center.1) {
            1.0
        } else {
            0.3
        }
    }
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Sample one pixel and classify it as "pitch green" via an HSV band check —
/// the stand-in for the HSV pitch mask described in §4.1 when no precomputed
/// mask is supplied by the caller.
fn is_pitch_green(pixels: &FramePixels, x: f32, y: f32) -> bool {
    if pixels.width == 0 || pixels.height == 0 {
        return false;
    }
    let px = (x.round().max(0.0) as u32).min(pixels.width - 1);
    let py = (y.round().max(0.0) as u32).min(pixels.height - 1);
    let idx = (py as usize * pixels.width as usize + px as usize) * 3;
    let (Some(&r), Some(&g), Some(&b)) = (pixels.rgb.get(idx), pixels.rgb.get(idx + 1), pixels.rgb.get(idx + 2))
    else {
        return false;
    };
    let (h, s, v) = rgb_to_hsv(r, g, b);
    (70.0..=170.0).contains(&h) && s > 0.2 && v > 0.15
}

/// Standard RGB → HSV conversion; `h` in degrees `[0, 360)`, `s`/`v` in `[0, 1]`.
fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let (r, g, b) = (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let s = if max == 0.0 { 0.0 } else { delta / max };
    (h, s, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use match_models::BBox;

    fn cfg() -> DirectorConfig {
        let mut c = DirectorConfig::default();
        c.tau_conf = 0.2;
        c.tau_high = 0.7;
        c.delta_max = 150.0;
        c
    }

    struct FixedModel(Vec<RawCandidate>);
    impl DetectionModel for FixedModel {
        fn detect(&self, _pixels: &FramePixels) -> Result<Vec<RawCandidate>, match_models::ModelError> {
            Ok(self.0.clone())
        }
    }

    fn green_frame() -> FramePixels {
        let w = 100u32;
        let h = 100u32;
        let mut buf = vec![0u8; (w * h * 3) as usize];
        for px in buf.chunks_mut(3) {
            px[0] = 20;
            px[1] = 180;
            px[2] = 20;
        }
        FramePixels::new(w, h, buf)
    }

    fn cand(x1: f32, y1: f32, x2: f32, y2: f32, conf: f32) -> RawCandidate {
        RawCandidate {
            bbox: BBox::new(x1, y1, x2, y2),
            confidence: conf,
        }
    }

    #[test]
    fn empty_candidates_yield_empty_detection() {
        let mut det = BallDetector::new(&cfg());
        let model = FixedModel(vec![]);
        let out = det.detect(&model, &green_frame(), 0);
        assert!(!out.is_present());
    }

    #[test]
    fn below_conf_gate_is_dropped() {
        let mut det = BallDetector::new(&cfg());
        let model = FixedModel(vec![cand(10.0, 10.0, 20.0, 20.0, 0.1)]);
        let out = det.detect(&model, &green_frame(), 0);
        assert!(!out.is_present());
    }

    #[test]
    fn first_observation_has_no_motion_penalty() {
        let mut det = BallDetector::new(&cfg());
        let model = FixedModel(vec![cand(10.0, 10.0, 20.0, 20.0, 0.5)]);
        let out = det.detect(&model, &green_frame(), 0);
        assert!(out.is_present());
    }

    #[test]
    fn far_jump_below_tau_high_is_rejected() {
        let mut det = BallDetector::new(&cfg());
        let model1 = FixedModel(vec![cand(10.0, 10.0, 20.0, 20.0, 0.5)]);
        det.detect(&model1, &green_frame(), 0);

        let model2 = FixedModel(vec![cand(500.0, 500.0, 510.0, 510.0, 0.5)]);
        let out = det.detect(&model2, &green_frame(), 1);
        assert!(!out.is_present());
    }

    #[test]
    fn high_confidence_bypasses_motion_cap() {
        let mut det = BallDetector::new(&cfg());
        let model1 = FixedModel(vec![cand(10.0, 10.0, 20.0, 20.0, 0.5)]);
        det.detect(&model1, &green_frame(), 0);

        let model2 = FixedModel(vec![cand(500.0, 500.0, 510.0, 510.0, 0.9)]);
        let out = det.detect(&model2, &green_frame(), 1);
        assert!(out.is_present());
    }

    #[test]
    fn model_error_yields_error_flagged_empty_detection() {
        struct FailingModel;
        impl DetectionModel for FailingModel {
            fn detect(&self, _pixels: &FramePixels) -> Result<Vec<RawCandidate>, match_models::ModelError> {
                Err(match_models::ModelError::InferenceFailed("boom".into()))
            }
        }
        let mut det = BallDetector::new(&cfg());
        let out = det.detect(&FailingModel, &green_frame(), 0);
        assert!(!out.is_present());
        assert!(out.meta.error);
    }

    #[test]
    fn tie_breaks_by_confidence_then_distance_to_prior() {
        let mut det = BallDetector::new(&cfg());
        let model1 = FixedModel(vec![cand(10.0, 10.0, 20.0, 20.0, 0.6)]);
        det.detect(&model1, &green_frame(), 0);

        // Two candidates with identical confidence (equal score); the closer
        // one to the prior (10,10)-(20,20) center (15,15) should win.
        let model2 = FixedModel(vec![cand(16.0, 16.0, 26.0, 26.0, 0.6), cand(60.0, 60.0, 70.0, 70.0, 0.6)]);
        let out = det.detect(&model2, &green_frame(), 1);
        assert!(out.is_present());
        assert!(out.center.unwrap().0 < 30.0);
    }
}
