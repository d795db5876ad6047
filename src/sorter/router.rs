//! Filesystem outcome routing: matches and errors move, everything else stays.
//!
//! Matches and quarantined files get distinct, operator-reviewable
//! destinations under `data_dir/sorted/` so a reviewer can tell "this photo
//! matched" from "this photo could not be processed" without re-running.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SortError;

const SORTED_DIR: &str = "sorted";
const MATCHES_DIR: &str = "matches";
const ERRORS_DIR: &str = "errors";

/// Applies move decisions as filesystem side effects.
pub struct OutcomeRouter {
    data_dir: PathBuf,
    matches_dir: PathBuf,
    errors_dir: PathBuf,
}

impl OutcomeRouter {
    /// Create the router, ensuring both destination directories exist.
    ///
    /// Directory creation happens exactly once here, before any move; the
    /// single-threaded pipeline never races this.
    pub fn new(data_dir: &Path) -> Result<Self, SortError> {
        let sorted = data_dir.join(SORTED_DIR);
        let matches_dir = sorted.join(MATCHES_DIR);
        let errors_dir = sorted.join(ERRORS_DIR);

        for dir in [&matches_dir, &errors_dir] {
            fs::create_dir_all(dir).map_err(|source| SortError::CreateDir {
                dir: dir.clone(),
                source,
            })?;
        }

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            matches_dir,
            errors_dir,
        })
    }

    /// Move a matched file into the matches destination.
    pub fn move_match(&self, filename: &str) -> Result<PathBuf, SortError> {
        self.move_into(filename, &self.matches_dir)
    }

    /// Move a file that failed processing into the error quarantine.
    pub fn quarantine(&self, filename: &str) -> Result<PathBuf, SortError> {
        self.move_into(filename, &self.errors_dir)
    }

    /// Atomic rename within `data_dir`'s filesystem. A failure here is fatal:
    /// we cannot report the file as sorted when it was not.
    fn move_into(&self, filename: &str, dest_dir: &Path) -> Result<PathBuf, SortError> {
        let from = self.data_dir.join(filename);
        let to = dest_dir.join(filename);

        fs::rename(&from, &to).map_err(|source| SortError::MoveFailed {
            from: from.clone(),
            to: to.clone(),
            source,
        })?;

        tracing::info!(file = %filename, dest = ?to, "moved");
        Ok(to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn test_new_creates_destinations_idempotently() {
        let dir = tempdir().unwrap();
        let _ = OutcomeRouter::new(dir.path()).unwrap();
        // Second construction over existing directories is fine
        let _ = OutcomeRouter::new(dir.path()).unwrap();

        assert!(dir.path().join("sorted/matches").is_dir());
        assert!(dir.path().join("sorted/errors").is_dir());
    }

    #[test]
    fn test_move_match_and_quarantine_destinations() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("a.jpg")).unwrap();
        File::create(dir.path().join("b.jpg")).unwrap();

        let router = OutcomeRouter::new(dir.path()).unwrap();

        let dest = router.move_match("a.jpg").unwrap();
        assert_eq!(dest, dir.path().join("sorted/matches/a.jpg"));
        assert!(dest.exists());
        assert!(!dir.path().join("a.jpg").exists());

        let dest = router.quarantine("b.jpg").unwrap();
        assert_eq!(dest, dir.path().join("sorted/errors/b.jpg"));
        assert!(dest.exists());
    }

    #[test]
    fn test_missing_source_is_fatal() {
        let dir = tempdir().unwrap();
        let router = OutcomeRouter::new(dir.path()).unwrap();

        let err = router.move_match("ghost.jpg").unwrap_err();
        assert!(matches!(err, SortError::MoveFailed { .. }));
    }
}
