use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};

use crate::constants::{CATALOG_CACHE_CONTROL, ERR_INVALID_SCRIPT_TYPE, ERR_SCRIPT_NOT_FOUND};
use crate::error::{AppError, Result};
use crate::models::ScriptKind;
use crate::AppState;

/// List published scripts grouped by kind
///
/// GET /api/scripts
pub async fn list_scripts(State(state): State<AppState>) -> impl IntoResponse {
    let listing = state.catalog.list_scripts().await;
    ([(header::CACHE_CONTROL, CATALOG_CACHE_CONTROL)], Json(listing))
}

/// GET /api/scripts/{type}/{name}
pub async fn script_source(
    State(state): State<AppState>,
    Path((kind, name)): Path<(String, String)>,
) -> Result<Response> {
    serve_script(&state, &kind, &name, false).await
}

/// GET /api/scripts/{type}/{name}/{action}
///
/// `download` serves the script as an attachment; any other action serves it
/// inline.
pub async fn script_action(
    State(state): State<AppState>,
    Path((kind, name, action)): Path<(String, String, String)>,
) -> Result<Response> {
    serve_script(&state, &kind, &name, action == "download").await
}

async fn serve_script(state: &AppState, kind: &str, name: &str, download: bool) -> Result<Response> {
    let kind: ScriptKind = kind
        .parse()
        .map_err(|_| AppError::InvalidInput(ERR_INVALID_SCRIPT_TYPE.to_string()))?;

    let (entry, content) = state
        .catalog
        .script_source(kind, name)
        .await
        .map_err(|e| {
            tracing::error!("Error fetching {} script {}: {}", kind, name, e);
            AppError::NotFound(ERR_SCRIPT_NOT_FOUND.to_string())
        })?
        .ok_or_else(|| AppError::NotFound(ERR_SCRIPT_NOT_FOUND.to_string()))?;

    if download {
        Ok((
            [
                (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", entry.filename),
                ),
            ],
            content,
        )
            .into_response())
    } else {
        Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            content,
        )
            .into_response())
    }
}
