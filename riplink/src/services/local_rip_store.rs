//! Filesystem-backed rip store
//!
//! Only ever looks one level deep: rip directories sit directly under the
//! rip root, track files directly inside a rip directory. Symlinks are not
//! followed so linked output directories count their links, not targets.

use crate::error::{ProcessError, ProcessResult};
use crate::services::collaborators::RipStore;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Rip store rooted at the rip directory
pub struct LocalRipStore {
    root: PathBuf,
}

impl LocalRipStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Immediate children of `dir`, failing on the first unreadable entry
    fn children(dir: &Path) -> ProcessResult<Vec<DirEntry>> {
        WalkDir::new(dir)
            .follow_links(false)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ProcessError::Io(e.into()))
    }
}

impl RipStore for LocalRipStore {
    fn list_rip_dirs(&self) -> ProcessResult<Vec<String>> {
        if !self.root.is_dir() {
            return Err(ProcessError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Rip root not found: {}", self.root.display()),
            )));
        }

        let dirs = Self::children(&self.root)?
            .into_iter()
            .filter(|e| e.file_type().is_dir())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        Ok(dirs)
    }

    fn list_files(&self, dir: &str) -> ProcessResult<Vec<String>> {
        let files = Self::children(&self.root.join(dir))?
            .into_iter()
            .filter(|e| !e.file_type().is_dir())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        Ok(files)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn count_entries(&self, path: &Path) -> ProcessResult<usize> {
        Ok(Self::children(path)?.len())
    }

    fn create_dir_all(&self, path: &Path) -> ProcessResult<()> {
        std::fs::create_dir_all(path)?;
        Ok(())
    }
}
