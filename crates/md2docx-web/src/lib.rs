//! HTTP surface for md2docx: `POST /convert` takes a multipart upload with a
//! `file` field holding a ZIP or tar.gz of a Markdown project and answers with
//! the converted document as an attachment, or `{"error": "..."}`.

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

pub mod handlers;
pub mod models;
pub mod state;
pub mod upload;

pub use state::AppState;

/// Build the application router.
pub fn app(state: Arc<AppState>) -> Router {
    let body_limit = DefaultBodyLimit::max(state.settings.max_upload_bytes);
    let cors = cors_layer(&state.settings.cors_origins);

    Router::new()
        .route("/convert", post(handlers::convert::convert))
        .route("/health", get(handlers::health::health))
        .layer(body_limit)
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods([Method::GET, Method::POST]);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}
