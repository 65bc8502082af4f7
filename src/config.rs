use std::env;

use crate::constants::{
    DEFAULT_CATALOG_CACHE_SECS, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_SESSION_TTL_SECS,
    UPLOAD_COOLDOWN_SECS,
};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub allowed_origins: Vec<String>,
    /// Public origin of this deployment, used for OAuth redirects
    pub public_url: String,
    /// Extra origins permitted by the CSP `connect-src` directive
    pub csp_connect_src: Vec<String>,
    /// CDN mirror of GitHub content, e.g. `https://cdn.statically.io/gh`
    pub cdn_base_url: String,
    pub github_api_base: String,
    pub github_oauth_base: String,
    /// `owner/name` of the repository the config catalog is read from
    pub configs_repo: String,
    /// `owner/name` of the repository the script catalog is read from
    pub scripts_repo: String,
    /// `owner/name` of the repository submissions open pull requests against
    pub upload_repo: String,
    pub base_branch: String,
    /// Directory inside `upload_repo` that receives new configs
    pub configs_dir: String,
    pub upload_cooldown_secs: i64,
    pub one_config_per_user: bool,
    pub max_upload_bytes: usize,
    pub catalog_cache_secs: u64,
    pub webhook_url: Option<String>,
    pub github_client_id: String,
    pub github_client_secret: String,
    pub session_secret: String,
    pub session_ttl_secs: i64,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn list_var(key: &str, default: &str) -> Vec<String> {
    var_or(key, default)
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if it exists (development)
        dotenvy::dotenv().ok();

        let server_host = var_or("SERVER_HOST", "0.0.0.0");
        let server_port = var_or("SERVER_PORT", "5020")
            .parse()
            .map_err(|_| "Invalid SERVER_PORT")?;

        let environment = var_or("ENVIRONMENT", "development");
        let allowed_origins = list_var("ALLOWED_ORIGINS", "http://localhost:3000");
        let public_url = var_or("PUBLIC_URL", "http://localhost:5020")
            .trim_end_matches('/')
            .to_string();
        let csp_connect_src = list_var("CSP_CONNECT_SRC", "https://cloudflareinsights.com");

        let cdn_base_url = var_or("CDN_BASE_URL", "https://cdn.statically.io/gh")
            .trim_end_matches('/')
            .to_string();
        let github_api_base = var_or("GITHUB_API_BASE", "https://api.github.com")
            .trim_end_matches('/')
            .to_string();
        let github_oauth_base = var_or("GITHUB_OAUTH_BASE", "https://github.com")
            .trim_end_matches('/')
            .to_string();

        let configs_repo = var_or("CONFIGS_REPO", "flarialmc/configs");
        let scripts_repo = var_or("SCRIPTS_REPO", "flarialmc/scripts");
        let upload_repo = env::var("CONFIGS_UPLOAD_REPO").unwrap_or_else(|_| configs_repo.clone());
        let base_branch = var_or("BASE_BRANCH", "main");
        let configs_dir = var_or("CONFIGS_DIR", "configs").trim_matches('/').to_string();

        let upload_cooldown_secs = var_or("UPLOAD_COOLDOWN_SECS", &UPLOAD_COOLDOWN_SECS.to_string())
            .parse()
            .map_err(|_| "Invalid UPLOAD_COOLDOWN_SECS")?;

        let one_config_per_user = var_or("ONE_CONFIG_PER_USER", "false")
            .parse()
            .map_err(|_| "Invalid ONE_CONFIG_PER_USER")?;

        let max_upload_bytes = var_or("MAX_UPLOAD_BYTES", &DEFAULT_MAX_UPLOAD_BYTES.to_string())
            .parse()
            .map_err(|_| "Invalid MAX_UPLOAD_BYTES")?;

        let catalog_cache_secs =
            var_or("CATALOG_CACHE_SECS", &DEFAULT_CATALOG_CACHE_SECS.to_string())
                .parse()
                .map_err(|_| "Invalid CATALOG_CACHE_SECS")?;

        let webhook_url = env::var("WEBHOOK").ok().filter(|s| !s.trim().is_empty());

        let github_client_id = var_or("GITHUB_CLIENT_ID", "");
        let github_client_secret = var_or("GITHUB_CLIENT_SECRET", "");
        if github_client_id.is_empty() || github_client_secret.is_empty() {
            tracing::warn!("GITHUB_CLIENT_ID/GITHUB_CLIENT_SECRET not set, sign-in will fail");
        }

        let session_secret = env::var("SESSION_SECRET")
            .map_err(|_| "SESSION_SECRET must be set for session cookie signing")?;

        let session_ttl_secs = var_or("SESSION_TTL_SECS", &DEFAULT_SESSION_TTL_SECS.to_string())
            .parse()
            .map_err(|_| "Invalid SESSION_TTL_SECS")?;

        Ok(Config {
            server_host,
            server_port,
            environment,
            allowed_origins,
            public_url,
            csp_connect_src,
            cdn_base_url,
            github_api_base,
            github_oauth_base,
            configs_repo,
            scripts_repo,
            upload_repo,
            base_branch,
            configs_dir,
            upload_cooldown_secs,
            one_config_per_user,
            max_upload_bytes,
            catalog_cache_secs,
            webhook_url,
            github_client_id,
            github_client_secret,
            session_secret,
            session_ttl_secs,
        })
    }

    /// Get server address as string
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Cookies are marked `Secure` outside of development
    pub fn secure_cookies(&self) -> bool {
        self.environment != "development" && self.environment != "test"
    }

    /// Redirect URI registered with the GitHub OAuth app
    pub fn oauth_callback_url(&self) -> String {
        format!("{}/api/auth/callback/github", self.public_url)
    }
}
