//! Candidate snapshot and per-batch image loading.
//!
//! The candidate list is captured exactly once, before any file is moved.
//! Iterating a live directory listing while renaming files out of it would
//! shift indices mid-run, so everything downstream works off this snapshot.

use image::DynamicImage;
use std::path::Path;
use walkdir::WalkDir;

use crate::error::{FileError, SortError};

/// One decoded batch of candidate images.
///
/// `filenames` and `images` are parallel (same length, same order); files
/// that failed to decode are reported through `failures` instead of being
/// deleted out of the sequence being iterated.
#[derive(Debug)]
pub struct LoadedBatch {
    pub filenames: Vec<String>,
    pub images: Vec<DynamicImage>,
    pub failures: Vec<(String, FileError)>,
}

/// Snapshot the candidate filenames directly under `dir`, sorted.
///
/// Non-recursive: subdirectories (including the `sorted/` destinations from
/// a previous run) are never candidates. Only fails if the directory itself
/// is unreadable.
pub fn snapshot_candidates(dir: &Path, extensions: &[String]) -> Result<Vec<String>, SortError> {
    let mut filenames = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(false) {
        let entry = entry.map_err(|source| SortError::DirUnreadable {
            dir: dir.to_path_buf(),
            source,
        })?;

        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        if let Some(ext) = path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if extensions.iter().any(|e| e.to_lowercase() == ext_lower) {
                if let Some(name) = path.file_name() {
                    filenames.push(name.to_string_lossy().to_string());
                }
            }
        }
    }

    // Sort for consistent ordering
    filenames.sort();

    Ok(filenames)
}

/// Decode every file of one batch, isolating per-file failures.
///
/// A corrupt or unreadable image never aborts the batch: it goes into
/// `failures` and the remaining files are still decoded in order.
pub fn load_batch(dir: &Path, batch: &[String]) -> LoadedBatch {
    let mut filenames = Vec::with_capacity(batch.len());
    let mut images = Vec::with_capacity(batch.len());
    let mut failures = Vec::new();

    for filename in batch {
        match image::open(dir.join(filename)) {
            Ok(img) => {
                filenames.push(filename.clone());
                images.push(img);
            }
            Err(e) => failures.push((filename.clone(), FileError::Decode(e))),
        }
    }

    LoadedBatch {
        filenames,
        images,
        failures,
    }
}
