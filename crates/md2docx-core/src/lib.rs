use std::path::PathBuf;
use thiserror::Error;

use md2docx_ingest::{ExtractionError, LocatorError};

pub mod config_file;
pub mod converter;
pub mod pipeline;
pub mod scratch;
pub mod settings;

// Re-export for convenience
pub use converter::Converter;
pub use pipeline::{ConvertedArtifact, Upload, convert_archive};
pub use scratch::ScratchSpace;
pub use settings::Settings;

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("converter {program} is not installed or not executable: {reason}")]
    Unavailable { program: String, reason: String },
    #[error("cannot resolve converter path {path:?}: {source}")]
    ResolvePath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to launch converter {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("converter failed ({status}), output: {output}")]
    ToolFailed { status: String, output: String },
    #[error("converter did not finish within {secs}s")]
    TimedOut { secs: f64 },
    #[error("converter reported success but wrote no output at {path}")]
    MissingOutput { path: PathBuf },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to prepare scratch space: {0}")]
    Scratch(#[source] std::io::Error),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Locator(#[from] LocatorError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error("failed to read converted document: {0}")]
    ReadArtifact(#[source] std::io::Error),
    #[error("conversion worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl PipelineError {
    /// Whether the failure was caused by what the caller uploaded.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Extraction(ExtractionError::CreateTarget { .. }) => false,
            Self::Extraction(_) => true,
            Self::Locator(LocatorError::NotFound { .. }) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_client_and_server_failures() {
        let traversal = PipelineError::from(ExtractionError::PathTraversal {
            entry: "../evil.txt".into(),
        });
        assert!(traversal.is_client_error());
        assert!(traversal.to_string().contains("../evil.txt"));

        let missing = PipelineError::from(LocatorError::NotFound {
            extension: "md".into(),
        });
        assert!(missing.is_client_error());
        assert_eq!(missing.to_string(), "no .md file found in archive");

        let tool = PipelineError::from(ConversionError::ToolFailed {
            status: "exit code 64".into(),
            output: "pandoc: unknown option".into(),
        });
        assert!(!tool.is_client_error());
        assert!(tool.to_string().contains("pandoc: unknown option"));

        let target = PipelineError::from(ExtractionError::CreateTarget {
            path: PathBuf::from("/scratch/x"),
            source: std::io::Error::other("disk full"),
        });
        assert!(!target.is_client_error());
    }
}
