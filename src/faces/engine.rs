//! ONNX Runtime face engine: UltraFace detection + ArcFace embeddings.
//!
//! Model files are downloaded on first use into the configured models
//! directory, then loaded into two long-lived sessions owned by the engine.

use anyhow::{anyhow, Result};
use image::{DynamicImage, GenericImageView};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::{Path, PathBuf};

use super::{FaceEngine, FaceLocation};

const DETECTION_MODEL_FILE: &str = "ultraface-320.onnx";
const DETECTION_MODEL_URL: &str = "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/ultraface/models/version-RFB-320.onnx";

const EMBEDDING_MODEL_FILE: &str = "arcface-resnet100.onnx";
const EMBEDDING_MODEL_URL: &str = "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/arcface/model/arcfaceresnet100-11-int8.onnx";

// UltraFace 320x240 input and post-processing thresholds
const DETECT_WIDTH: u32 = 320;
const DETECT_HEIGHT: u32 = 240;
const CONFIDENCE_THRESHOLD: f32 = 0.7;
const NMS_THRESHOLD: f32 = 0.3;

// ArcFace input size; embeddings come out 512-dimensional
const EMBED_SIZE: u32 = 112;

/// Face engine backed by ONNX Runtime sessions.
pub struct OnnxFaceEngine {
    detection: Session,
    embedding: Session,
}

impl OnnxFaceEngine {
    /// Load (downloading first if necessary) both models from `models_dir`.
    pub fn load(models_dir: &Path) -> Result<Self> {
        let detection_path = ensure_model(models_dir, DETECTION_MODEL_FILE, DETECTION_MODEL_URL)?;
        let embedding_path = ensure_model(models_dir, EMBEDDING_MODEL_FILE, EMBEDDING_MODEL_URL)?;

        let detection = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(&detection_path)?;

        let embedding = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(&embedding_path)?;

        tracing::info!(dir = ?models_dir, "face engine ready");

        Ok(Self {
            detection,
            embedding,
        })
    }

    fn detect(&mut self, img: &DynamicImage) -> Result<Vec<FaceLocation>> {
        let (orig_width, orig_height) = img.dimensions();

        let input_data = detection_input(img);
        let input_tensor = Tensor::from_array((
            [1usize, 3, DETECT_HEIGHT as usize, DETECT_WIDTH as usize],
            input_data.into_boxed_slice(),
        ))?;

        let outputs = self.detection.run(ort::inputs!["input" => input_tensor])?;

        let scores_value = outputs
            .get("scores")
            .ok_or_else(|| anyhow!("No scores output"))?;
        let boxes_value = outputs
            .get("boxes")
            .ok_or_else(|| anyhow!("No boxes output"))?;

        let (scores_shape, scores_data) = scores_value.try_extract_tensor::<f32>()?;
        let (_boxes_shape, boxes_data) = boxes_value.try_extract_tensor::<f32>()?;

        let locations = decode_detections(
            scores_shape[1] as usize,
            scores_data,
            boxes_data,
            orig_width,
            orig_height,
        );

        Ok(nms(locations, NMS_THRESHOLD))
    }
}

impl FaceEngine for OnnxFaceEngine {
    fn detect_batch(&mut self, images: &[DynamicImage]) -> Result<Vec<Vec<FaceLocation>>> {
        // One warm session across the whole batch; the session setup cost is
        // what batching amortizes here.
        images.iter().map(|img| self.detect(img)).collect()
    }

    fn encode(&mut self, image: &DynamicImage, location: &FaceLocation) -> Result<Vec<f32>> {
        let (orig_width, orig_height) = image.dimensions();
        let face_crop = crop_face(image, location, orig_width, orig_height);
        let input_data = embedding_input(&face_crop);

        let input_tensor = Tensor::from_array((
            [1usize, 3, EMBED_SIZE as usize, EMBED_SIZE as usize],
            input_data.into_boxed_slice(),
        ))?;

        // ArcFace ONNX model uses "data" as input name
        let outputs = self.embedding.run(ort::inputs!["data" => input_tensor])?;

        let embedding_output = outputs
            .iter()
            .next()
            .ok_or_else(|| anyhow!("No embedding output"))?;
        let (_shape, embedding_data) = embedding_output.1.try_extract_tensor::<f32>()?;

        // L2-normalize so euclidean distances are comparable across images
        let raw: Vec<f32> = embedding_data.to_vec();
        let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm > 0.0 {
            Ok(raw.iter().map(|x| x / norm).collect())
        } else {
            Ok(raw)
        }
    }
}

/// Download a model file if it doesn't exist.
fn ensure_model(models_dir: &Path, filename: &str, url: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(models_dir)?;
    let model_path = models_dir.join(filename);

    if !model_path.exists() {
        tracing::info!(model = %filename, "Downloading model...");
        let response = ureq::get(url)
            .call()
            .map_err(|e| anyhow!("Failed to download model: {}", e))?;

        let mut file = std::fs::File::create(&model_path)?;
        std::io::copy(&mut response.into_reader(), &mut file)?;
        tracing::info!(model = %filename, path = ?model_path, "Model downloaded");
    }

    Ok(model_path)
}

/// Resize and normalize an image into UltraFace's NCHW input layout.
fn detection_input(img: &DynamicImage) -> Vec<f32> {
    let resized = img.resize_exact(
        DETECT_WIDTH,
        DETECT_HEIGHT,
        image::imageops::FilterType::Triangle,
    );
    let rgb = resized.to_rgb8();

    let plane = (DETECT_WIDTH * DETECT_HEIGHT) as usize;
    let mut data = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let idx = y as usize * DETECT_WIDTH as usize + x as usize;
        for c in 0..3 {
            data[c * plane + idx] = (pixel[c] as f32 - 127.0) / 128.0;
        }
    }

    data
}

/// Turn raw UltraFace outputs into pixel-space face locations.
///
/// scores shape: [1, num_anchors, 2] (background, face)
/// boxes shape: [1, num_anchors, 4] (x1, y1, x2, y2 normalized)
fn decode_detections(
    num_anchors: usize,
    scores: &[f32],
    boxes: &[f32],
    orig_width: u32,
    orig_height: u32,
) -> Vec<FaceLocation> {
    let mut locations = Vec::new();

    for i in 0..num_anchors {
        let confidence = scores[i * 2 + 1];
        if confidence <= CONFIDENCE_THRESHOLD {
            continue;
        }

        let x1 = (boxes[i * 4] * orig_width as f32) as i32;
        let y1 = (boxes[i * 4 + 1] * orig_height as f32) as i32;
        let x2 = (boxes[i * 4 + 2] * orig_width as f32) as i32;
        let y2 = (boxes[i * 4 + 3] * orig_height as f32) as i32;

        locations.push(FaceLocation {
            x: x1.max(0),
            y: y1.max(0),
            width: (x2 - x1).max(1),
            height: (y2 - y1).max(1),
            confidence,
        });
    }

    locations
}

/// Non-maximum suppression to remove overlapping detections.
///
/// Output is ordered by descending confidence, so index 0 is the detector's
/// best face — the one the pipeline uses.
fn nms(mut locations: Vec<FaceLocation>, threshold: f32) -> Vec<FaceLocation> {
    locations.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<FaceLocation> = Vec::new();

    for candidate in locations {
        if keep.iter().all(|k| compute_iou(k, &candidate) <= threshold) {
            keep.push(candidate);
        }
    }

    keep
}

/// Compute Intersection over Union between two face locations.
fn compute_iou(a: &FaceLocation, b: &FaceLocation) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let intersection = ((x2 - x1).max(0) * (y2 - y1).max(0)) as f32;
    let area_a = (a.width * a.height) as f32;
    let area_b = (b.width * b.height) as f32;
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Crop face region from image with 20% padding on each side.
fn crop_face(
    img: &DynamicImage,
    location: &FaceLocation,
    img_width: u32,
    img_height: u32,
) -> DynamicImage {
    let padding_x = (location.width as f32 * 0.2) as i32;
    let padding_y = (location.height as f32 * 0.2) as i32;

    let x = (location.x - padding_x).max(0) as u32;
    let y = (location.y - padding_y).max(0) as u32;
    let w = ((location.width + padding_x * 2) as u32).min(img_width.saturating_sub(x));
    let h = ((location.height + padding_y * 2) as u32).min(img_height.saturating_sub(y));

    img.crop_imm(x, y, w.max(1), h.max(1))
}

/// Resize and normalize a face crop into ArcFace's NCHW input layout.
fn embedding_input(face_img: &DynamicImage) -> Vec<f32> {
    let resized = face_img.resize_exact(EMBED_SIZE, EMBED_SIZE, image::imageops::FilterType::Triangle);
    let rgb = resized.to_rgb8();

    let plane = (EMBED_SIZE * EMBED_SIZE) as usize;
    let mut data = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let idx = y as usize * EMBED_SIZE as usize + x as usize;
        for c in 0..3 {
            // ArcFace normalization: (pixel - 127.5) / 127.5
            data[c * plane + idx] = (pixel[c] as f32 - 127.5) / 127.5;
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(x: i32, y: i32, width: i32, height: i32, confidence: f32) -> FaceLocation {
        FaceLocation {
            x,
            y,
            width,
            height,
            confidence,
        }
    }

    #[test]
    fn test_iou() {
        let a = loc(0, 0, 10, 10, 0.9);
        let b = loc(0, 0, 10, 10, 0.8);
        assert!((compute_iou(&a, &b) - 1.0).abs() < 0.001);

        let c = loc(20, 20, 10, 10, 0.8);
        assert!(compute_iou(&a, &c).abs() < 0.001);
    }

    #[test]
    fn test_nms_suppresses_overlaps() {
        let boxes = vec![
            loc(0, 0, 10, 10, 0.8),
            loc(1, 1, 10, 10, 0.95),
            loc(50, 50, 10, 10, 0.75),
        ];

        let kept = nms(boxes, 0.3);
        assert_eq!(kept.len(), 2);
        // Highest confidence survives and comes first
        assert!((kept[0].confidence - 0.95).abs() < 0.001);
        assert!((kept[1].confidence - 0.75).abs() < 0.001);
    }

    #[test]
    fn test_decode_detections_threshold() {
        // Two anchors: one confident face, one below threshold
        let scores = vec![0.1, 0.9, 0.8, 0.2];
        let boxes = vec![0.1, 0.1, 0.5, 0.5, 0.0, 0.0, 1.0, 1.0];

        let locations = decode_detections(2, &scores, &boxes, 100, 100);
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].x, 10);
        assert_eq!(locations[0].y, 10);
        assert_eq!(locations[0].width, 40);
        assert_eq!(locations[0].height, 40);
    }

    #[test]
    fn test_detection_input_shape_and_range() {
        let img = DynamicImage::new_rgb8(64, 48);
        let data = detection_input(&img);
        assert_eq!(data.len(), 3 * (DETECT_WIDTH * DETECT_HEIGHT) as usize);
        // Black pixels normalize to (0 - 127) / 128
        assert!((data[0] - (-127.0 / 128.0)).abs() < 0.001);
    }

    #[test]
    fn test_crop_face_clamps_to_image() {
        let img = DynamicImage::new_rgb8(50, 50);
        let face = loc(40, 40, 20, 20, 0.9);
        let crop = crop_face(&img, &face, 50, 50);
        assert!(crop.width() >= 1 && crop.width() <= 50);
        assert!(crop.height() >= 1 && crop.height() <= 50);
    }
}
