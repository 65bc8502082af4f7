use axum::Json;
use serde_json::{json, Value};

/// Health check endpoint
///
/// The server holds no connections of its own, so this only reports liveness.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "server": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
