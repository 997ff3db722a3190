//! Directory browsing for output-directory pickers.
//!
//! Both endpoints are confined to the allowed roots by the same lexical
//! containment rule used for job `out_dir` validation.

use std::path::{Component, Path, PathBuf};

use axum::Json;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::state::ApiState;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct BrowseParams {
    #[serde(default)]
    path: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BrowseResponse {
    path: String,
    parent: String,
    dirs: Vec<String>,
    is_root: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MkdirBody {
    path: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct MkdirResponse {
    ok: bool,
    path: String,
}

fn clean(path: &str) -> PathBuf {
    let mut out = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::RootDir);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn is_allowed(path: &str, presets: &[String]) -> bool {
    if presets.is_empty() {
        return false;
    }
    let cleaned = clean(path);
    presets.iter().any(|root| {
        let root = clean(root);
        cleaned == root || cleaned.starts_with(&root)
    })
}

fn is_root_preset(path: &str, presets: &[String]) -> bool {
    let cleaned = clean(path);
    presets.iter().any(|root| cleaned == clean(root))
}

pub(crate) async fn list(
    State(state): State<ApiState>,
    Query(params): Query<BrowseParams>,
) -> Result<Json<BrowseResponse>, ApiError> {
    let presets = &state.meta.out_dir_presets;
    let Some(path) = params.path.filter(|p| !p.is_empty()) else {
        return Ok(Json(BrowseResponse {
            path: String::new(),
            parent: String::new(),
            dirs: presets.clone(),
            is_root: true,
        }));
    };
    if !is_allowed(&path, presets) {
        return Err(ApiError::Forbidden("path not allowed".to_string()));
    }

    let metadata = tokio::fs::metadata(&path).await.map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            ApiError::NotFound("path not found".to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    })?;
    if !metadata.is_dir() {
        return Err(ApiError::BadRequest("path is not a directory".to_string()));
    }

    let mut dirs = Vec::new();
    let mut entries = tokio::fs::read_dir(&path)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?
    {
        let is_dir = entry
            .file_type()
            .await
            .map(|file_type| file_type.is_dir())
            .unwrap_or(false);
        if is_dir {
            dirs.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    dirs.sort();

    let parent = Path::new(&path)
        .parent()
        .map(|parent| parent.to_string_lossy().into_owned())
        .filter(|parent| parent != &path)
        .unwrap_or_default();

    Ok(Json(BrowseResponse {
        is_root: is_root_preset(&path, presets),
        path,
        parent,
        dirs,
    }))
}

pub(crate) async fn mkdir(
    State(state): State<ApiState>,
    Json(body): Json<MkdirBody>,
) -> Result<Json<MkdirResponse>, ApiError> {
    if body.path.is_empty() {
        return Err(ApiError::BadRequest("path required".to_string()));
    }
    if !is_allowed(&body.path, &state.meta.out_dir_presets) {
        return Err(ApiError::Forbidden("path not allowed".to_string()));
    }
    tokio::fs::create_dir_all(&body.path)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    info!(path = %body.path, "directory created");
    Ok(Json(MkdirResponse {
        ok: true,
        path: body.path,
    }))
}
