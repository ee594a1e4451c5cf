//! Frame and raw pixel buffer types.

use crate::camera::CameraId;
use std::sync::Arc;

/// Raw decoded pixel buffer for a single frame, in packed RGB8.
///
/// Shared via `Arc` so a frame can be cheaply handed from the stream reader
/// through detection, tracking, and into the writer without copying pixels.
#[derive(Debug, Clone)]
pub struct FramePixels {
    pub width: u32,
    pub height: u32,
    pub rgb: Arc<[u8]>,
}

impl FramePixels {
    pub fn new(width: u32, height: u32, rgb: Vec<u8>) -> Self {
        debug_assert_eq!(rgb.len(), (width as usize) * (height as usize) * 3);
        Self {
            width,
            height,
            rgb: Arc::from(rgb),
        }
    }
}

/// One frame read from a camera stream, addressed by the reference timeline.
///
/// `timeline_index` is always derived from the active stream's true
/// position (§4.4) — never a loop counter — so that hard-sync and the
/// monotonicity invariant can be checked directly against it.
#[derive(Debug, Clone)]
pub struct Frame {
    pub camera_id: CameraId,
    pub timeline_index: u64,
    pub pixels: FramePixels,
}

impl Frame {
    pub fn new(camera_id: CameraId, timeline_index: u64, pixels: FramePixels) -> Self {
        Self {
            camera_id,
            timeline_index,
            pixels,
        }
    }
}
