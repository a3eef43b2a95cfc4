use axum::Json;
use axum::extract::State;
use std::sync::Arc;

use crate::models::HealthJson;
use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthJson> {
    Json(HealthJson {
        status: "ok".to_string(),
        converter: state.converter_version.clone(),
    })
}
