//! Marketplace Server Library
//!
//! Catalog mirror and GitHub pull request pipeline for community scripts and
//! configs. This module exports the router and core types for the binary and
//! for testing.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod error;
pub mod github;
pub mod models;
pub mod routes;
pub mod security;
pub mod submission;

pub use config::Config;
pub use error::{AppError, Result};

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use auth::{GitHubSessionHooks, SessionHooks};
use catalog::{CatalogService, ContentSource};
use github::GitHubApi;
use models::UploadTrackers;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub catalog: Arc<CatalogService>,
    pub github: Arc<dyn GitHubApi>,
    pub trackers: Arc<UploadTrackers>,
    pub hooks: Arc<dyn SessionHooks>,
    /// Shared client for best-effort outbound calls (webhook)
    pub http: reqwest::Client,
}

impl AppState {
    /// Create a new AppState over the given GitHub API and content source
    pub fn new(
        config: Config,
        github: Arc<dyn GitHubApi>,
        source: Arc<dyn ContentSource>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            catalog: Arc::new(CatalogService::new(source, &config)),
            trackers: Arc::new(UploadTrackers::new(config.upload_cooldown_secs)),
            hooks: Arc::new(GitHubSessionHooks),
            github,
            http,
            config,
        }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid allowed origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
        ])
        .allow_credentials(true)
}

/// Build the application router
pub fn app(state: AppState) -> Router {
    let csp = security::content_security_policy(&state.config.csp_connect_src);
    let csp = HeaderValue::from_str(&csp).unwrap_or_else(|_| {
        tracing::warn!("Invalid CSP connect-src, falling back to 'self'");
        HeaderValue::from_static("default-src 'self'")
    });

    let upload = post(routes::upload_config)
        .layer::<_, Infallible>(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_upload_bytes));

    Router::new()
        .route("/health", get(routes::health_check))
        .route("/api/configs", get(routes::list_configs))
        .route("/api/configs/*path", get(routes::config_resource))
        .route("/api/scripts", get(routes::list_scripts))
        .route("/api/scripts/:kind/:name", get(routes::script_source))
        .route("/api/scripts/:kind/:name/:action", get(routes::script_action))
        .route("/api/upload-config", upload)
        .route("/api/auth/signin/github", get(routes::signin_github))
        .route("/api/auth/callback/github", get(routes::callback_github))
        .route("/api/auth/session", get(routes::current_session))
        .route("/api/auth/signout", post(routes::signout))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            csp,
        ))
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
