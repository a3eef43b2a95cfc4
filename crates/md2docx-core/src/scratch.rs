use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use md2docx_ingest::ArchiveFormat;
use tempfile::TempDir;
use tracing::{debug, warn};

const REQUEST_PREFIX: &str = "req-";
const UPLOAD_STEM: &str = "upload";
const EXTRACT_DIR: &str = "extracted";

/// Per-request working storage under the scratch root.
///
/// Holds the persisted upload (`upload.<ext>`) and the extraction target
/// (`extracted/`) inside a freshly named `req-*` directory. The directory and
/// everything in it is removed exactly once: by [`ScratchSpace::close`], or on
/// drop if `close` was never reached.
pub struct ScratchSpace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScratchSpace {
    /// Create a uniquely named request directory under `scratch_root`,
    /// creating the root itself if needed.
    pub fn create(scratch_root: &Path) -> io::Result<Self> {
        fs::create_dir_all(scratch_root)?;
        let dir = tempfile::Builder::new()
            .prefix(REQUEST_PREFIX)
            .tempdir_in(scratch_root)?;
        let path = fs::canonicalize(dir.path())?;

        debug!(scratch = %path.display(), "Acquired scratch space");
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    /// Absolute path of the request directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where archive entries are materialized.
    pub fn extraction_dir(&self) -> PathBuf {
        self.path.join(EXTRACT_DIR)
    }

    /// Write the uploaded archive bytes into the request directory.
    ///
    /// The on-disk name depends only on the detected container type.
    pub fn persist_upload(&self, data: &[u8], format: ArchiveFormat) -> io::Result<PathBuf> {
        let path = self
            .path
            .join(format!("{}.{}", UPLOAD_STEM, format.extension()));
        fs::write(&path, data)?;
        debug!(upload = %path.display(), bytes = data.len(), "Persisted upload");
        Ok(path)
    }

    /// Remove the request directory and report any failure.
    pub fn close(mut self) -> io::Result<()> {
        match self.dir.take() {
            Some(dir) => {
                dir.close()?;
                debug!(scratch = %self.path.display(), "Released scratch space");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            match dir.close() {
                Ok(()) => debug!(scratch = %self.path.display(), "Released scratch space"),
                Err(e) => warn!(
                    scratch = %self.path.display(),
                    error = %e,
                    "Failed to remove scratch space"
                ),
            }
        }
    }
}
