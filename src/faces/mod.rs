//! Face detection and embedding extraction.
//!
//! The sorting pipeline consumes these capabilities through the [`FaceEngine`]
//! trait; [`engine::OnnxFaceEngine`] is the concrete implementation
//! (UltraFace for detection, ArcFace for embeddings, both over ONNX Runtime).

pub mod engine;

pub use engine::OnnxFaceEngine;

use anyhow::Result;
use image::DynamicImage;

/// Bounding box of a detected face, in pixel coordinates of the source image.
#[derive(Debug, Clone)]
pub struct FaceLocation {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub confidence: f32,
}

/// Detection and embedding capability consumed by the sorting pipeline.
///
/// `detect_batch` runs over a whole batch in one call so implementations can
/// amortize fixed per-invocation cost; locations per image are returned in
/// the detector's first-found order.
pub trait FaceEngine {
    fn detect_batch(&mut self, images: &[DynamicImage]) -> Result<Vec<Vec<FaceLocation>>>;

    /// Compute the embedding vector for one detected face.
    fn encode(&mut self, image: &DynamicImage, location: &FaceLocation) -> Result<Vec<f32>>;
}

/// Euclidean distance between two face embeddings.
///
/// This is the matching metric: lower is more similar, 0 is identical.
pub fn embedding_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::MAX;
    }

    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_distance() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![0.0, 0.0, 0.0];
        assert!(embedding_distance(&a, &b).abs() < 0.001);

        let c = vec![3.0, 4.0, 0.0];
        assert!((embedding_distance(&a, &c) - 5.0).abs() < 0.001);
    }

    #[test]
    fn test_embedding_distance_dimension_mismatch() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0, 2.0, 3.0];
        assert_eq!(embedding_distance(&a, &b), f32::MAX);
    }

}
