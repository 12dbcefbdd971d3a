use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("relative path escapes the output directory: {0}")]
    InvalidPath(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Creates `dir` (and its parents) unless it already exists as a directory.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    Ok(())
}

/// Writes files below a root directory so readers never observe a partial file.
///
/// Relative paths may contain `/` separators (object keys such as `com/x/<digest>`);
/// intermediate directories are created on demand.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, relative: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        let relative_path = Path::new(relative);
        let is_plain = relative_path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if relative.is_empty() || !is_plain {
            return Err(PersistError::InvalidPath(relative.to_string()));
        }

        let target = self.dir.join(relative_path);
        let parent = target.parent().unwrap_or(&self.dir).to_path_buf();
        ensure_output_dir(&parent)?;

        // Staged beside the target so the rename stays on one filesystem.
        let mut staged = NamedTempFile::new_in(&parent)?;
        staged.write_all(content)?;
        staged.as_file_mut().sync_all()?;
        staged.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}
