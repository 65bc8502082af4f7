use async_trait::async_trait;

use super::{CdnError, ContentSource};

/// Reads repository content through a GitHub CDN mirror
///
/// URLs take the form `{base}/{owner}/{repo}/{branch}/{path}`.
#[derive(Debug, Clone)]
pub struct CdnClient {
    http: reqwest::Client,
    base_url: String,
    branch: String,
}

impl CdnClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            branch: branch.into(),
        }
    }
}

#[async_trait]
impl ContentSource for CdnClient {
    async fn fetch(&self, repo: &str, path: &str) -> Result<Vec<u8>, CdnError> {
        let url = self.public_url(repo, path);
        tracing::debug!("Fetching {}", url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| CdnError::Request {
                url: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CdnError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| CdnError::Request { url, source })?;
        Ok(bytes.to_vec())
    }

    fn public_url(&self, repo: &str, path: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url,
            repo,
            self.branch,
            path.trim_start_matches('/')
        )
    }
}
