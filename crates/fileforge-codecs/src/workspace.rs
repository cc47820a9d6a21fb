//! Staging area for conversion outputs.

use crate::{CodecError, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Staging directory for a single conversion.
///
/// The temp directory is created next to the destination so that
/// finalizing is a same-filesystem rename: the destination either does not
/// exist yet or is the complete output, never a partial write. Dropping the
/// workspace without finalizing discards everything staged in it.
///
/// # Example
///
/// ```no_run
/// use fileforge_codecs::Workspace;
///
/// let workspace = Workspace::new("/out/report.pdf")?;
/// // write the converted file to workspace.output()
/// workspace.finalize()?;
/// # Ok::<(), fileforge_codecs::CodecError>(())
/// ```
#[derive(Debug)]
pub struct Workspace {
    temp_dir: TempDir,
    destination: PathBuf,
    output_path: PathBuf,
}

impl Workspace {
    /// Create a workspace that will finalize into `destination`.
    pub fn new<P: AsRef<Path>>(destination: P) -> Result<Self> {
        let destination = destination.as_ref();

        let file_name = destination
            .file_name()
            .ok_or_else(|| CodecError::InvalidInput("Invalid destination path".to_string()))?;
        let parent = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let temp_dir = tempfile::Builder::new()
            .prefix(".fileforge-")
            .tempdir_in(parent)
            .map_err(|e| CodecError::Workspace(format!("{}: {}", parent.display(), e)))?;
        let output_path = temp_dir.path().join(file_name);

        Ok(Self {
            temp_dir,
            destination: destination.to_path_buf(),
            output_path,
        })
    }

    /// Final destination path.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Staged output path, same file name as the destination.
    pub fn output(&self) -> &Path {
        &self.output_path
    }

    /// Get the temp directory path.
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a temp file path with the given name.
    pub fn temp_file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Move the staged output into place.
    pub fn finalize(self) -> Result<PathBuf> {
        match std::fs::metadata(&self.output_path) {
            Ok(meta) if meta.len() > 0 => {}
            Ok(_) => {
                return Err(CodecError::Workspace(format!(
                    "Output file is empty: {:?}",
                    self.output_path
                )))
            }
            Err(_) => {
                return Err(CodecError::Workspace(format!(
                    "Output file does not exist: {:?}",
                    self.output_path
                )))
            }
        }

        std::fs::rename(&self.output_path, &self.destination).map_err(|e| {
            CodecError::Workspace(format!("Failed to move output to destination: {}", e))
        })?;

        Ok(self.destination)
    }
}
