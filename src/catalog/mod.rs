//! Read-only mirror of the scripts and configs published upstream.

pub mod cache;
pub mod cdn;
pub mod service;

use async_trait::async_trait;
use thiserror::Error;

pub use cdn::CdnClient;
pub use service::CatalogService;

#[derive(Error, Debug)]
pub enum CdnError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("invalid index at {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Where published content is read from
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch `path` from `repo` (`owner/name`) on the published branch
    async fn fetch(&self, repo: &str, path: &str) -> Result<Vec<u8>, CdnError>;

    /// Public URL of `path` in `repo`
    fn public_url(&self, repo: &str, path: &str) -> String;
}
