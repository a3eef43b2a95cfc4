//! Archive ingestion for md2docx.
//!
//! Unpacks an uploaded ZIP or tar.gz into a scratch directory without letting
//! any entry escape it, then finds the document source inside the extracted
//! tree.

use std::path::PathBuf;

use thiserror::Error;

pub mod archive;
pub mod locate;

// Re-export the ingestion API
pub use archive::{ArchiveFormat, ExtractLimits, ExtractionSummary, extract, resolve_entry_path};
pub use locate::{DEFAULT_SOURCE_EXTENSION, locate};

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("unreadable archive: {reason}")]
    Unreadable { reason: String },
    #[error("archive entry escapes the extraction directory: {entry}")]
    PathTraversal { entry: String },
    #[error("failed to write archive entry {entry}: {source}")]
    WriteFailed {
        entry: String,
        #[source]
        source: std::io::Error,
    },
    #[error("archive exceeds extraction limit: {limit}")]
    LimitExceeded { limit: String },
    #[error("failed to prepare extraction directory {path}: {source}")]
    CreateTarget {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum LocatorError {
    #[error("no .{extension} file found in archive")]
    NotFound { extension: String },
    #[error("error walking the path {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
