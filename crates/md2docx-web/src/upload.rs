use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use thiserror::Error;

use md2docx_core::Upload;

/// Name of the multipart field carrying the archive.
pub const FILE_FIELD: &str = "file";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No file uploaded")]
    Missing,
    #[error("Uploaded file is empty")]
    Empty,
    #[error("Failed to read upload: {0}")]
    Multipart(#[from] MultipartError),
}

impl UploadError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Multipart(e) => e.status(),
            Self::Missing | Self::Empty => StatusCode::BAD_REQUEST,
        }
    }
}

/// Pull the archive out of a multipart form upload.
///
/// Only the `file` field is read; anything else is drained and ignored.
pub async fn parse_multipart(mut multipart: Multipart) -> Result<Upload, UploadError> {
    let mut upload: Option<Upload> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            FILE_FIELD => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let data = field.bytes().await?.to_vec();
                upload = Some(Upload { filename, data });
            }
            _ => {
                // Ignore unknown fields
                let _ = field.bytes().await;
            }
        }
    }

    let upload = upload.ok_or(UploadError::Missing)?;
    if upload.data.is_empty() {
        return Err(UploadError::Empty);
    }
    Ok(upload)
}
