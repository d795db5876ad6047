//! Batched detection and classification against the reference set.

use crate::error::FileError;
use crate::faces::FaceEngine;

use super::batch::LoadedBatch;
use super::reference::ReferenceSet;

/// Classification of one candidate image against the reference set.
///
/// `distance` is the nearest-reference distance of the image's first detected
/// face; `Match` iff it is strictly below the configured tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchDecision {
    Match { distance: f32 },
    NoMatch { distance: f32 },
}

/// Read-only consumer of the reference set; classifies whole batches.
pub struct BatchMatcher<'a> {
    references: &'a ReferenceSet,
    tolerance: f32,
}

impl<'a> BatchMatcher<'a> {
    pub fn new(references: &'a ReferenceSet, tolerance: f32) -> Self {
        Self {
            references,
            tolerance,
        }
    }

    /// Classify every image of a loaded batch.
    ///
    /// Detection runs over the whole batch in one engine call — this is the
    /// throughput-critical step batching exists for. Per-image problems (no
    /// face, embedding failure) become per-file errors in the result;
    /// nothing here crashes the run.
    pub fn process<E: FaceEngine>(
        &self,
        engine: &mut E,
        batch: &LoadedBatch,
    ) -> Vec<(String, Result<MatchDecision, FileError>)> {
        if batch.filenames.is_empty() {
            return Vec::new();
        }

        let locations = match engine.detect_batch(&batch.images) {
            Ok(locations) => locations,
            Err(e) => {
                // The batched call failed as a whole; every member gets the
                // same per-file diagnostic rather than aborting the run.
                return batch
                    .filenames
                    .iter()
                    .map(|name| {
                        (
                            name.clone(),
                            Err(FileError::Detection(e.to_string())),
                        )
                    })
                    .collect();
            }
        };

        batch
            .filenames
            .iter()
            .zip(batch.images.iter())
            .zip(locations)
            .map(|((filename, image), faces)| {
                let decision = match faces.into_iter().next() {
                    Some(first) => match engine.encode(image, &first) {
                        Ok(embedding) => {
                            let distance = self.references.min_distance(&embedding);
                            if distance < self.tolerance {
                                Ok(MatchDecision::Match { distance })
                            } else {
                                Ok(MatchDecision::NoMatch { distance })
                            }
                        }
                        Err(e) => Err(FileError::Embedding(e.to_string())),
                    },
                    None => Err(FileError::NoFace),
                };
                (filename.clone(), decision)
            })
            .collect()
    }
}
