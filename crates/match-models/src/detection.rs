//! Detection and stabilized-tracking outcome types (§3, §4.1, §4.2).

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in pixel space, `(x1, y1, x2, y2)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Normalize against a `w x h` frame to `(x, y) in [0,1]^2` for zone checks.
    pub fn normalized_center(&self, w: u32, h: u32) -> (f32, f32) {
        let (cx, cy) = self.center();
        (cx / w.max(1) as f32, cy / h.max(1) as f32)
    }

    /// Intersection-over-union with another box.
    pub fn iou(&self, other: &BBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let iw = (ix2 - ix1).max(0.0);
        let ih = (iy2 - iy1).max(0.0);
        let inter = iw * ih;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// A raw candidate returned by the underlying detection model, before any
/// motion/pitch scoring or temporal stabilization is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawCandidate {
    pub bbox: BBox,
    pub confidence: f32,
}

/// Auxiliary, non-authoritative metadata carried alongside a `Detection`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DetectionMeta {
    /// The model invocation itself failed; treat as a miss (§4.1 failure semantics).
    pub error: bool,
    /// Raw (pre-smoothing) center, preserved for debugging even after EMA smoothing.
    pub raw_center: Option<(f32, f32)>,
}

/// Per-frame candidate selection produced by the Ball Detector (§3).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Detection {
    pub bbox: Option<BBox>,
    pub center: Option<(f32, f32)>,
    pub confidence: f32,
    pub meta: DetectionMeta,
}

impl Detection {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn empty_with_error() -> Self {
        Self {
            meta: DetectionMeta {
                error: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn present(bbox: BBox, confidence: f32) -> Self {
        let center = Some(bbox.center());
        Self {
            bbox: Some(bbox),
            center,
            confidence,
            meta: DetectionMeta {
                raw_center: center,
                ..Default::default()
            },
        }
    }

    pub fn is_present(&self) -> bool {
        self.bbox.is_some()
    }
}

/// The sticky tracker's classification of how a raw detection was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub enum StickyOrigin {
    Accepted,
    Held,
    RejectedJump,
    RejectedExclusion,
    RejectedStationary,
    Confirming,
    None,
}

/// Stabilized output of the Sticky Tracker (§3, §4.2). Extends `Detection`
/// with an origin tag and the counters needed by the Switcher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StickyOutcome {
    pub bbox: Option<BBox>,
    pub center: Option<(f32, f32)>,
    pub confidence: f32,
    pub origin: StickyOrigin,
    pub hold_age: u32,
    pub miss_streak: u32,
    /// EMA-smoothed center used by downstream trajectory logic.
    pub smoothed_center: Option<(f32, f32)>,
    pub meta: DetectionMeta,
}

impl StickyOutcome {
    pub fn none(miss_streak: u32) -> Self {
        Self {
            bbox: None,
            center: None,
            confidence: 0.0,
            origin: StickyOrigin::None,
            hold_age: 0,
            miss_streak,
            smoothed_center: None,
            meta: DetectionMeta::default(),
        }
    }

    pub fn is_found(&self) -> bool {
        self.origin == StickyOrigin::Accepted
    }
}
