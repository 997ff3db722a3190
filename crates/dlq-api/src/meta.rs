//! `/meta` handler.

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::state::ApiState;

pub(crate) async fn show(State(state): State<ApiState>) -> Json<Value> {
    Json(json!({
        "out_dir_presets": state.meta.out_dir_presets,
        "version": state.meta.version,
    }))
}
