//! The batch matching and classification pipeline.
//!
//! One run: build the reference set, snapshot the candidate list, then
//! alternate between loading a batch and matching it, routing every file to
//! exactly one outcome. Single-threaded and sequential by design — batching
//! amortizes detector overhead, it is not a concurrency mechanism.

pub mod batch;
pub mod matcher;
pub mod reference;
pub mod router;

pub use matcher::MatchDecision;
pub use reference::ReferenceSet;
pub use router::OutcomeRouter;

use std::path::PathBuf;
use std::sync::mpsc;

use crate::config::Config;
use crate::error::SortError;
use crate::faces::FaceEngine;

use matcher::BatchMatcher;

/// Final filesystem action taken for one candidate file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// No match; the file stays where it was.
    Kept,
    /// Matched the reference set; moved to `sorted/matches/`.
    MovedMatch,
    /// Failed loading or detection; moved to `sorted/errors/`.
    MovedError,
}

/// Progress updates surfaced while a run executes.
///
/// Purely informational; dropping the receiver never affects control flow.
#[derive(Debug, Clone)]
pub enum SortProgress {
    Started {
        total_files: usize,
        total_batches: usize,
    },
    Processing {
        current: usize,
        total: usize,
        filename: String,
    },
    Matched {
        filename: String,
        destination: PathBuf,
        distance: f32,
    },
    Quarantined {
        filename: String,
        reason: String,
    },
    Completed {
        report: SortReport,
    },
}

/// Summary of a completed run.
///
/// `outcomes` records the final action for every candidate in snapshot
/// order; the counters are running totals over the same data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortReport {
    pub total: usize,
    pub matched: usize,
    pub kept: usize,
    pub errored: usize,
    pub batches: usize,
    pub outcomes: Vec<(String, FileOutcome)>,
}

/// The sorting pipeline, parameterized by an explicit immutable config.
pub struct Sorter {
    config: Config,
}

impl Sorter {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Execute one full sorting pass.
    ///
    /// Halts early only for configuration errors (no usable reference
    /// faces), an unreadable candidate directory, or a failed rename. All
    /// per-image failures are recovered by quarantining that file.
    pub fn run<E: FaceEngine>(
        &self,
        engine: &mut E,
        progress_tx: Option<mpsc::Sender<SortProgress>>,
    ) -> Result<SortReport, SortError> {
        self.config.validate()?;

        let references = ReferenceSet::build(engine, &self.config)?;

        // Snapshot once: later moves must not feed back into iteration.
        let candidates =
            batch::snapshot_candidates(&self.config.data_dir, &self.config.image_extensions)?;
        let router = OutcomeRouter::new(&self.config.data_dir)?;
        let batch_matcher = BatchMatcher::new(&references, self.config.tolerance);

        let total = candidates.len();
        let total_batches = total.div_ceil(self.config.batch_size);
        tracing::info!(
            files = total,
            batches = total_batches,
            batch_size = self.config.batch_size,
            tolerance = self.config.tolerance,
            "filtering candidates"
        );

        if let Some(ref tx) = progress_tx {
            let _ = tx.send(SortProgress::Started {
                total_files: total,
                total_batches,
            });
        }

        let mut report = SortReport {
            total,
            ..SortReport::default()
        };
        let mut current = 0usize;

        for chunk in candidates.chunks(self.config.batch_size) {
            let loaded = batch::load_batch(&self.config.data_dir, chunk);

            for (filename, error) in &loaded.failures {
                current += 1;
                if let Some(ref tx) = progress_tx {
                    let _ = tx.send(SortProgress::Processing {
                        current,
                        total,
                        filename: filename.clone(),
                    });
                }
                tracing::warn!(file = %filename, error = %error, "quarantining unreadable file");
                router.quarantine(filename)?;
                report.errored += 1;
                report
                    .outcomes
                    .push((filename.clone(), FileOutcome::MovedError));
                if let Some(ref tx) = progress_tx {
                    let _ = tx.send(SortProgress::Quarantined {
                        filename: filename.clone(),
                        reason: error.to_string(),
                    });
                }
            }

            for (filename, decision) in batch_matcher.process(engine, &loaded) {
                current += 1;
                if let Some(ref tx) = progress_tx {
                    let _ = tx.send(SortProgress::Processing {
                        current,
                        total,
                        filename: filename.clone(),
                    });
                }

                match decision {
                    Ok(MatchDecision::Match { distance }) => {
                        let destination = router.move_match(&filename)?;
                        report.matched += 1;
                        report
                            .outcomes
                            .push((filename.clone(), FileOutcome::MovedMatch));
                        if let Some(ref tx) = progress_tx {
                            let _ = tx.send(SortProgress::Matched {
                                filename,
                                destination,
                                distance,
                            });
                        }
                    }
                    Ok(MatchDecision::NoMatch { distance }) => {
                        tracing::debug!(file = %filename, distance, "no match, keeping in place");
                        report.kept += 1;
                        report.outcomes.push((filename, FileOutcome::Kept));
                    }
                    Err(error) => {
                        tracing::warn!(file = %filename, error = %error, "quarantining file");
                        router.quarantine(&filename)?;
                        report.errored += 1;
                        report
                            .outcomes
                            .push((filename.clone(), FileOutcome::MovedError));
                        if let Some(ref tx) = progress_tx {
                            let _ = tx.send(SortProgress::Quarantined {
                                filename,
                                reason: error.to_string(),
                            });
                        }
                    }
                }
            }

            report.batches += 1;
        }

        tracing::info!(
            matched = report.matched,
            kept = report.kept,
            errored = report.errored,
            "run complete"
        );
        if let Some(ref tx) = progress_tx {
            let _ = tx.send(SortProgress::Completed {
                report: report.clone(),
            });
        }

        Ok(report)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use anyhow::{bail, Result};
    use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
    use std::path::Path;

    use crate::faces::{FaceEngine, FaceLocation};

    /// Pixel color marking an image with no detectable face.
    pub const NO_FACE: [u8; 3] = [0, 0, 0];

    /// Deterministic engine for pipeline tests: an image "contains a face"
    /// unless its top-left pixel is black, and that face's embedding is the
    /// pixel's RGB scaled to [0, 1].
    #[derive(Default)]
    pub struct StubEngine {
        pub fail_detect: bool,
        pub fail_encode: bool,
    }

    pub fn write_face_png(path: &Path, rgb: [u8; 3]) {
        RgbImage::from_pixel(4, 4, Rgb(rgb)).save(path).unwrap();
    }

    fn top_left(image: &DynamicImage) -> [u8; 3] {
        let p = image.get_pixel(0, 0);
        [p[0], p[1], p[2]]
    }

    impl FaceEngine for StubEngine {
        fn detect_batch(&mut self, images: &[DynamicImage]) -> Result<Vec<Vec<FaceLocation>>> {
            if self.fail_detect {
                bail!("stub detector failure");
            }
            Ok(images
                .iter()
                .map(|image| {
                    if top_left(image) == NO_FACE {
                        Vec::new()
                    } else {
                        vec![FaceLocation {
                            x: 0,
                            y: 0,
                            width: 4,
                            height: 4,
                            confidence: 1.0,
                        }]
                    }
                })
                .collect())
        }

        fn encode(&mut self, image: &DynamicImage, _location: &FaceLocation) -> Result<Vec<f32>> {
            if self.fail_encode {
                bail!("stub encoder failure");
            }
            Ok(top_left(image)
                .iter()
                .map(|&c| c as f32 / 255.0)
                .collect())
        }
    }
}
