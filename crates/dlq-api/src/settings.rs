//! `/api/settings` handlers.

use axum::Json;
use axum::extract::State;
use dlq_config::{Settings, SettingsPatch};
use serde_json::Value;

use crate::error::ApiError;
use crate::state::ApiState;

pub(crate) async fn show(State(state): State<ApiState>) -> Json<Settings> {
    Json(state.settings.snapshot())
}

pub(crate) async fn update(
    State(state): State<ApiState>,
    Json(body): Json<Value>,
) -> Result<Json<Settings>, ApiError> {
    let patch: SettingsPatch =
        serde_json::from_value(body).map_err(|err| ApiError::BadRequest(err.to_string()))?;
    let updated = state.settings.apply(patch)?;
    Ok(Json(updated))
}
