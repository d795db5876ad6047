//! facesort — sort a photo dump by face similarity against a reference set.
//!
//! Given a directory of reference face images and a directory of unsorted
//! candidate photos, facesort detects faces, compares their embeddings to the
//! reference set, and moves matching photos (and photos that failed
//! processing) into reviewable subdirectories, leaving everything else in
//! place.

pub mod config;
pub mod error;
pub mod faces;
pub mod logging;
pub mod sorter;

pub use config::Config;
pub use error::{FileError, SortError};
pub use sorter::{SortReport, Sorter};
