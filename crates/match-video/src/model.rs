//! YOLOv8-ONNX [`DetectionModel`] adapter, filtered to the ball class.
//!
//! Reuses this crate's existing ONNX object-detection path: preprocess to a
//! square input tensor, run inference, decode the `[1, 84, 8400]` YOLOv8
//! output, apply per-class NMS. The only change from general object
//! detection is the final class filter, kept to COCO class 32 ("sports
//! ball") so the director core never sees candidates for anything else.

use std::path::Path;
use std::sync::Mutex;

use image::{ImageBuffer, Rgb};
use ndarray::Array;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use match_models::{BBox, DetectionModel, FramePixels, ModelError, RawCandidate};

/// COCO class id for "sports ball".
const BALL_CLASS_ID: usize = 32;
const NUM_CLASSES: usize = 80;
const NUM_BOXES: usize = 8400;
const NUM_FEATURES: usize = 4 + NUM_CLASSES;

/// Configuration for the ball-detection ONNX model.
#[derive(Debug, Clone)]
pub struct BallDetectorConfig {
    pub model_path: String,
    pub nms_threshold: f32,
    pub input_size: u32,
}

impl Default for BallDetectorConfig {
    fn default() -> Self {
        Self {
            model_path: "models/ball_detection/yolov8n.onnx".to_string(),
            nms_threshold: 0.45,
            input_size: 640,
        }
    }
}

/// YOLOv8-ONNX ball detector, implementing the director's [`DetectionModel`] port.
///
/// The model's own confidence gate is intentionally permissive (near zero) —
/// the sticky tracker and switcher apply the meaningful confidence
/// thresholds downstream, so this adapter returns every ball-class candidate
/// that survives NMS and lets the caller decide what to keep.
pub struct OnnxBallDetector {
    session: Mutex<Session>,
    config: BallDetectorConfig,
}

impl OnnxBallDetector {
    pub fn new(config: BallDetectorConfig) -> Result<Self, ModelError> {
        let model_path = Path::new(&config.model_path);
        if !model_path.exists() {
            return Err(ModelError::NotLoaded(format!("model file not found: {}", config.model_path)));
        }
        let session = Mutex::new(create_session(model_path)?);
        info!(model_path = %config.model_path, input_size = config.input_size, "ball detector initialized");
        Ok(Self { session, config })
    }

    fn preprocess(&self, pixels: &FramePixels) -> Result<Value, ModelError> {
        let input_size = self.config.input_size as usize;
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_raw(pixels.width, pixels.height, pixels.rgb.to_vec())
                .ok_or_else(|| ModelError::InferenceFailed("failed to build image buffer from frame".to_string()))?;
        let dynamic = image::DynamicImage::ImageRgb8(img);
        let resized = dynamic.resize_exact(
            input_size as u32,
            input_size as u32,
            image::imageops::FilterType::Triangle,
        );
        let rgb = resized.to_rgb8();

        let mut chw_data: Vec<f32> = Vec::with_capacity(3 * input_size * input_size);
        for c in 0..3 {
            for y in 0..input_size {
                for x in 0..input_size {
                    let pixel = rgb.get_pixel(x as u32, y as u32);
                    chw_data.push(pixel[c] as f32 / 255.0);
                }
            }
        }

        let shape = vec![1usize, 3, input_size, input_size];
        Tensor::from_array((shape, chw_data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| ModelError::InferenceFailed(format!("failed to build input tensor: {e}")))
    }

    fn run_inference(&self, input: Value) -> Result<Vec<f32>, ModelError> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| ModelError::InferenceFailed("session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| ModelError::InferenceFailed(format!("onnx inference failed: {e}")))?;

        let output = outputs
            .get("output0")
            .ok_or_else(|| ModelError::InferenceFailed("missing output0 tensor".to_string()))?;
        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::InferenceFailed(format!("failed to extract tensor: {e}")))?;

        Ok(tensor.1.iter().copied().collect())
    }

    fn postprocess(&self, outputs: &[f32], orig_width: u32, orig_height: u32) -> Result<Vec<RawCandidate>, ModelError> {
        if outputs.len() != NUM_FEATURES * NUM_BOXES {
            return Err(ModelError::InferenceFailed(format!(
                "unexpected output size: expected {}, got {}",
                NUM_FEATURES * NUM_BOXES,
                outputs.len()
            )));
        }

        let output_array = Array::from_shape_vec((NUM_FEATURES, NUM_BOXES), outputs.to_vec())
            .map_err(|e| ModelError::InferenceFailed(format!("failed to reshape output: {e}")))?;
        let transposed = output_array.t();

        let input_size = self.config.input_size as f32;
        let scale_w = orig_width as f32 / input_size;
        let scale_h = orig_height as f32 / input_size;

        let mut candidates: Vec<RawCandidate> = Vec::new();
        for i in 0..NUM_BOXES {
            let score = transposed[[i, 4 + BALL_CLASS_ID]];
            if score <= 0.0 {
                continue;
            }

            let cx = transposed[[i, 0]];
            let cy = transposed[[i, 1]];
            let w = transposed[[i, 2]];
            let h = transposed[[i, 3]];

            let x1 = ((cx - w / 2.0) * scale_w).max(0.0).min(orig_width as f32);
            let y1 = ((cy - h / 2.0) * scale_h).max(0.0).min(orig_height as f32);
            let x2 = ((cx + w / 2.0) * scale_w).max(0.0).min(orig_width as f32);
            let y2 = ((cy + h / 2.0) * scale_h).max(0.0).min(orig_height as f32);

            candidates.push(RawCandidate {
                bbox: BBox { x1, y1, x2, y2 },
                confidence: score,
            });
        }

        debug!(count = candidates.len(), "ball candidates before NMS");
        Ok(non_maximum_suppression(candidates, self.config.nms_threshold))
    }
}

impl DetectionModel for OnnxBallDetector {
    fn detect(&self, pixels: &FramePixels) -> Result<Vec<RawCandidate>, ModelError> {
        let input = self.preprocess(pixels)?;
        let outputs = self.run_inference(input)?;
        self.postprocess(&outputs, pixels.width, pixels.height)
    }
}

fn non_maximum_suppression(mut candidates: Vec<RawCandidate>, nms_threshold: f32) -> Vec<RawCandidate> {
    if candidates.is_empty() {
        return candidates;
    }
    candidates.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());

    let mut keep = Vec::new();
    let mut suppressed = vec![false; candidates.len()];
    for i in 0..candidates.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(candidates[i].clone());
        for j in (i + 1)..candidates.len() {
            if suppressed[j] {
                continue;
            }
            if candidates[i].bbox.iou(&candidates[j].bbox) > nms_threshold {
                suppressed[j] = true;
            }
        }
    }
    keep
}

fn create_session(model_path: &Path) -> Result<Session, ModelError> {
    let model_bytes = std::fs::read(model_path)
        .map_err(|e| ModelError::NotLoaded(format!("failed to read model file: {e}")))?;

    let builder = Session::builder()
        .map_err(|e| ModelError::NotLoaded(format!("failed to create session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| ModelError::NotLoaded(format!("failed to set optimization level: {e}")))?;

    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder.clone().with_execution_providers([CUDAExecutionProvider::default().build()]) {
            if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                info!("using CUDA execution provider for ball detection");
                return Ok(session);
            }
        }
        debug!("CUDA execution provider not available, falling back to CPU");
    }

    info!("using CPU execution provider for ball detection");
    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| ModelError::NotLoaded(format!("failed to load ONNX model: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> RawCandidate {
        RawCandidate {
            bbox: BBox { x1, y1, x2, y2 },
            confidence,
        }
    }

    #[test]
    fn nms_keeps_highest_confidence_among_overlaps() {
        let candidates = vec![candidate(0.0, 0.0, 10.0, 10.0, 0.9), candidate(1.0, 1.0, 11.0, 11.0, 0.5)];
        let kept = non_maximum_suppression(candidates, 0.3);
        assert_eq!(kept.len(), 1);
        assert!((kept[0].confidence - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn nms_keeps_disjoint_boxes() {
        let candidates = vec![candidate(0.0, 0.0, 10.0, 10.0, 0.9), candidate(50.0, 50.0, 60.0, 60.0, 0.5)];
        let kept = non_maximum_suppression(candidates, 0.3);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn empty_candidates_produce_empty_result() {
        assert!(non_maximum_suppression(Vec::new(), 0.5).is_empty());
    }
}
