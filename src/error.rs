use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors that halt a sorting run.
///
/// Everything else (a single unreadable or face-less candidate) is a
/// [`FileError`] and is recovered by quarantining that one file.
#[derive(Debug, Error)]
pub enum SortError {
    /// The reference directory yielded no usable face embeddings. Matching
    /// against an empty reference set is meaningless, so the run halts
    /// before any candidate is touched.
    #[error("no usable reference faces found in {dir} — check that the directory exists and contains face images")]
    NoReferenceFaces { dir: PathBuf },

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("cannot read directory {dir}: {source}")]
    DirUnreadable {
        dir: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to create {dir}")]
    CreateDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A rename failed. Not recoverable: continuing would let the on-disk
    /// state diverge from the reported outcome for this file.
    #[error("failed to move {from} to {to}")]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The face engine itself failed while building the reference set.
    #[error("face engine failure: {0}")]
    Engine(#[from] anyhow::Error),
}

/// Non-fatal per-file failures.
///
/// Each variant names the stage that failed so diagnostics stay actionable;
/// all of them resolve the same way: the file is moved to the error
/// quarantine and the run continues.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("no face detected")]
    NoFace,

    #[error("face detection failed: {0}")]
    Detection(String),

    #[error("embedding extraction failed: {0}")]
    Embedding(String),
}
