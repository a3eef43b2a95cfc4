use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::{error, info, warn};

use md2docx_core::{ConvertedArtifact, PipelineError};
use md2docx_ingest::ExtractionError;

use crate::models::error_response;
use crate::state::AppState;
use crate::upload;

pub async fn convert(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let multipart = match multipart {
        Ok(m) => m,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected non-multipart request");
            return error_response(rejection.status(), "No file uploaded");
        }
    };

    let upload = match upload::parse_multipart(multipart).await {
        Ok(u) => u,
        Err(e) => {
            warn!(error = %e, "Rejected upload");
            return error_response(e.status(), e.to_string());
        }
    };
    info!(filename = %upload.filename, bytes = upload.data.len(), "Received upload");

    // Run the pipeline in its own task so a client disconnect cannot cut
    // the conversion (and its cleanup) short.
    let task_state = state.clone();
    let result = tokio::spawn(async move {
        md2docx_core::convert_archive(&task_state.settings, upload).await
    })
    .await;

    match result {
        Ok(Ok(artifact)) => attachment(&state, artifact),
        Ok(Err(e)) => pipeline_error(e),
        Err(e) => {
            error!(error = %e, "Conversion task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Conversion task failed")
        }
    }
}

fn attachment(state: &AppState, artifact: ConvertedArtifact) -> Response {
    let format = &state.settings.converter.output_format;
    let disposition = format!("attachment; filename=\"converted.{}\"", format);

    info!(source = %artifact.source.display(), bytes = artifact.data.len(), "Sending converted document");
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type(format).to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.data,
    )
        .into_response()
}

fn pipeline_error(e: PipelineError) -> Response {
    let status = match &e {
        PipelineError::Extraction(ExtractionError::LimitExceeded { .. }) => {
            StatusCode::PAYLOAD_TOO_LARGE
        }
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let message = match &e {
        PipelineError::Extraction(ExtractionError::CreateTarget { .. })
        | PipelineError::Scratch(_) => "Failed to prepare working directory".to_string(),
        PipelineError::Extraction(inner) => format!("Failed to extract archive: {}", inner),
        PipelineError::Locator(inner) => inner.to_string(),
        PipelineError::Conversion(inner) => format!("Conversion failed: {}", inner),
        PipelineError::ReadArtifact(_) | PipelineError::Worker(_) => {
            "Failed to produce converted document".to_string()
        }
    };

    if status.is_server_error() {
        error!(error = %e, "Conversion failed");
    } else {
        warn!(error = %e, "Conversion rejected");
    }
    error_response(status, message)
}

fn content_type(format: &str) -> &'static str {
    match format {
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "odt" => "application/vnd.oasis.opendocument.text",
        "rtf" => "application/rtf",
        "epub" => "application/epub+zip",
        "html" => "text/html; charset=utf-8",
        _ => "application/octet-stream",
    }
}
