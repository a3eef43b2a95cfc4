use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Error payload returned for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorJson {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthJson {
    pub status: String,
    pub converter: String,
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorJson {
            error: message.into(),
        }),
    )
        .into_response()
}
