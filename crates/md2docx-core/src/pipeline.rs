use std::path::PathBuf;

use md2docx_ingest::{ArchiveFormat, ExtractionError};
use tracing::{info, warn};

use crate::PipelineError;
use crate::scratch::ScratchSpace;
use crate::settings::Settings;

/// An uploaded archive as received from the caller.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Client-supplied name. Only used for logging and as a format hint.
    pub filename: String,
    pub data: Vec<u8>,
}

/// The converted document, fully read into memory.
#[derive(Debug, Clone)]
pub struct ConvertedArtifact {
    pub data: Vec<u8>,
    /// Source document path relative to the extraction root.
    pub source: PathBuf,
}

/// Run one upload through extract → locate → convert inside its own scratch space.
///
/// The artifact is read into memory before the scratch space is released, and
/// the scratch space is released on every path out of this function.
pub async fn convert_archive(
    settings: &Settings,
    upload: Upload,
) -> Result<ConvertedArtifact, PipelineError> {
    info!(filename = %upload.filename, bytes = upload.data.len(), "Starting conversion");

    let scratch_root = settings.scratch_root.clone();
    let limits = settings.limits;
    let extension = settings.source_extension.clone();

    // Extraction and the tree walk are blocking filesystem work
    let (scratch, source) = tokio::task::spawn_blocking(move || {
        let format = ArchiveFormat::detect(&upload.filename, &upload.data).ok_or_else(|| {
            ExtractionError::Unreadable {
                reason: "Unsupported archive format. Please upload a ZIP or tar.gz file."
                    .to_string(),
            }
        })?;

        let scratch = ScratchSpace::create(&scratch_root).map_err(PipelineError::Scratch)?;
        let archive_path = scratch
            .persist_upload(&upload.data, format)
            .map_err(PipelineError::Scratch)?;
        drop(upload);

        let target = scratch.extraction_dir();
        md2docx_ingest::extract(&archive_path, &target, &limits)?;

        let source = md2docx_ingest::locate(&target, &extension)?;
        Ok::<_, PipelineError>((scratch, source))
    })
    .await??;

    let extraction_dir = scratch.extraction_dir();
    let output = extraction_dir.join(format!("output.{}", settings.converter.output_format));
    settings.converter.convert(&source, &output).await?;

    let data = tokio::fs::read(&output)
        .await
        .map_err(PipelineError::ReadArtifact)?;
    let relative = source
        .strip_prefix(&extraction_dir)
        .unwrap_or(&source)
        .to_path_buf();

    if let Err(e) = scratch.close() {
        warn!(error = %e, "Failed to remove scratch space after conversion");
    }

    info!(source = %relative.display(), bytes = data.len(), "Conversion complete");
    Ok(ConvertedArtifact {
        data,
        source: relative,
    })
}
