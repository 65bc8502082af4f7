use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};

use crate::constants::{CATALOG_CACHE_CONTROL, ICON_FILE_NAME};
use crate::error::{AppError, Result};
use crate::models::ConfigListing;
use crate::AppState;

/// List published configs
///
/// GET /api/configs
pub async fn list_configs(State(state): State<AppState>) -> impl IntoResponse {
    let configs = state.catalog.list_configs().await;
    (
        [(header::CACHE_CONTROL, CATALOG_CACHE_CONTROL)],
        Json(ConfigListing { configs }),
    )
}

/// Serve a config archive or icon
///
/// GET /api/configs/{id}/download
/// GET /api/configs/{id}/icon.png
pub async fn config_resource(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response> {
    if path.contains("..") {
        return Err(AppError::InvalidInput("Invalid path".to_string()));
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match segments.as_slice() {
        [id, "download"] => {
            let archive = state.catalog.config_archive(id).await.map_err(|e| {
                tracing::error!("Error fetching config archive {}: {}", id, e);
                AppError::NotFound("Config not found".to_string())
            })?;

            Ok((
                [
                    (header::CONTENT_TYPE, "application/zip".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}.zip\"", id),
                    ),
                ],
                archive,
            )
                .into_response())
        }
        [id, name] if *name == ICON_FILE_NAME => {
            let icon = state.catalog.config_icon(id).await.map_err(|e| {
                tracing::error!("Error fetching config icon {}: {}", id, e);
                AppError::NotFound("Icon not found".to_string())
            })?;

            Ok(([(header::CONTENT_TYPE, "image/png")], icon).into_response())
        }
        _ => Err(AppError::NotFound("Not found".to_string())),
    }
}
