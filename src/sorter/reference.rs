//! Reference set construction: one embedding per usable reference image.

use std::path::Path;

use crate::config::Config;
use crate::error::SortError;
use crate::faces::{embedding_distance, FaceEngine};

use super::batch;

/// The known-face embeddings every candidate is compared against.
///
/// Built once per run from the reference directory, immutable afterward.
#[derive(Debug)]
pub struct ReferenceSet {
    embeddings: Vec<Vec<f32>>,
}

impl ReferenceSet {
    /// Encode every image directly under `config.input_dir`.
    ///
    /// Images where no face is detected are skipped without error; of images
    /// with several faces only the first detected one is used (documented
    /// single-face assumption). Zero usable images is a configuration error:
    /// the run halts here, before any candidate is touched.
    pub fn build<E: FaceEngine>(engine: &mut E, config: &Config) -> Result<Self, SortError> {
        let files = batch::snapshot_candidates(&config.input_dir, &config.image_extensions)?;
        tracing::info!(dir = ?config.input_dir, files = files.len(), "loading reference faces");

        let mut embeddings = Vec::new();

        for filename in &files {
            match Self::encode_reference(engine, &config.input_dir, filename)? {
                Some(embedding) => embeddings.push(embedding),
                None => continue,
            }
        }

        if embeddings.is_empty() {
            return Err(SortError::NoReferenceFaces {
                dir: config.input_dir.clone(),
            });
        }

        tracing::info!(count = embeddings.len(), "reference set ready");
        Ok(Self { embeddings })
    }

    /// Encode one reference image, or `None` if it is unusable.
    fn encode_reference<E: FaceEngine>(
        engine: &mut E,
        dir: &Path,
        filename: &str,
    ) -> Result<Option<Vec<f32>>, SortError> {
        let image = match image::open(dir.join(filename)) {
            Ok(img) => img,
            Err(e) => {
                tracing::warn!(file = %filename, error = %e, "skipping unreadable reference image");
                return Ok(None);
            }
        };

        let mut locations = engine.detect_batch(std::slice::from_ref(&image))?;
        let first = locations
            .pop()
            .and_then(|faces| faces.into_iter().next());

        match first {
            Some(location) => {
                let embedding = engine.encode(&image, &location)?;
                Ok(Some(embedding))
            }
            None => {
                tracing::debug!(file = %filename, "no face in reference image, skipping");
                Ok(None)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    /// Distance from `embedding` to its nearest reference embedding.
    pub fn min_distance(&self, embedding: &[f32]) -> f32 {
        self.embeddings
            .iter()
            .map(|reference| embedding_distance(reference, embedding))
            .fold(f32::INFINITY, f32::min)
    }

    #[cfg(test)]
    pub(crate) fn from_embeddings(embeddings: Vec<Vec<f32>>) -> Self {
        Self { embeddings }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sorter::testing::{write_face_png, StubEngine, NO_FACE};
    use tempfile::tempdir;

    fn config_for(input_dir: &Path) -> Config {
        Config {
            input_dir: input_dir.to_path_buf(),
            ..Config::default()
        }
    }

    #[test]
    fn test_build_collects_one_embedding_per_usable_image() {
        let dir = tempdir().unwrap();
        write_face_png(&dir.path().join("alice.png"), [200, 10, 10]);
        write_face_png(&dir.path().join("bob.png"), [10, 200, 10]);
        // No detectable face: skipped, not an error
        write_face_png(&dir.path().join("landscape.png"), NO_FACE);

        let mut engine = StubEngine::default();
        let set = ReferenceSet::build(&mut engine, &config_for(dir.path())).unwrap();
        assert_eq!(set.len(), 2);
        assert!(!set.is_empty());
    }

    #[test]
    fn test_build_fails_on_empty_directory() {
        let dir = tempdir().unwrap();
        let mut engine = StubEngine::default();

        let err = ReferenceSet::build(&mut engine, &config_for(dir.path())).unwrap_err();
        assert!(matches!(err, SortError::NoReferenceFaces { .. }));
    }

    #[test]
    fn test_build_fails_when_no_image_has_a_face() {
        let dir = tempdir().unwrap();
        write_face_png(&dir.path().join("empty.png"), NO_FACE);

        let mut engine = StubEngine::default();
        let err = ReferenceSet::build(&mut engine, &config_for(dir.path())).unwrap_err();
        assert!(matches!(err, SortError::NoReferenceFaces { .. }));
    }

    #[test]
    fn test_min_distance_takes_nearest_reference() {
        let set = ReferenceSet::from_embeddings(vec![vec![0.0, 0.0], vec![1.0, 0.0]]);
        let d = set.min_distance(&[0.9, 0.0]);
        assert!((d - 0.1).abs() < 0.001);
    }
}
