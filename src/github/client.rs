use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use super::{GitHubApi, GitHubError, GitHubUser, NewCommit, NewPullRequest, PullRequest, TreeEntry};
use crate::config::Config;

const GITHUB_ACCEPT: &str = "application/vnd.github+json";

#[derive(Deserialize)]
struct ShaResponse {
    sha: String,
}

#[derive(Deserialize)]
struct RefResponse {
    object: ShaResponse,
}

#[derive(Deserialize)]
struct PullTitle {
    title: String,
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// reqwest-backed [`GitHubApi`] bound to one repository
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    oauth_base: String,
    /// `owner/name`
    repo: String,
    client_id: String,
    client_secret: String,
}

impl GitHubClient {
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            api_base: config.github_api_base.clone(),
            oauth_base: config.github_oauth_base.clone(),
            repo: config.upload_repo.clone(),
            client_id: config.github_client_id.clone(),
            client_secret: config.github_client_secret.clone(),
        }
    }

    fn repo_url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}", self.api_base, self.repo, path)
    }

    fn headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    async fn send(request: RequestBuilder, context: &str) -> Result<reqwest::Response, GitHubError> {
        let response = request.send().await.map_err(|source| GitHubError::Request {
            context: context.to_string(),
            source,
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("{} (HTTP {}): {}", context, status, body);
            return Err(GitHubError::api(context, body));
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        request: RequestBuilder,
        context: &str,
    ) -> Result<T, GitHubError> {
        Self::send(request, context)
            .await?
            .json::<T>()
            .await
            .map_err(|source| GitHubError::Request {
                context: context.to_string(),
                source,
            })
    }
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn list_pull_request_titles(&self, token: &str) -> Result<Vec<String>, GitHubError> {
        let request = self
            .http
            .get(self.repo_url("pulls"))
            .query(&[("state", "all"), ("per_page", "100")])
            .headers(Self::headers(token));
        let pulls: Vec<PullTitle> = Self::send_json(request, "Failed to fetch PRs").await?;
        Ok(pulls.into_iter().map(|p| p.title).collect())
    }

    async fn branch_head(&self, token: &str, branch: &str) -> Result<String, GitHubError> {
        let request = self
            .http
            .get(self.repo_url(&format!("git/ref/heads/{}", branch)))
            .headers(Self::headers(token));
        let reference: RefResponse =
            Self::send_json(request, "Failed to get base branch ref").await?;
        Ok(reference.object.sha)
    }

    async fn create_branch(
        &self,
        token: &str,
        branch: &str,
        sha: &str,
    ) -> Result<(), GitHubError> {
        let request = self
            .http
            .post(self.repo_url("git/refs"))
            .headers(Self::headers(token))
            .json(&json!({ "ref": format!("refs/heads/{}", branch), "sha": sha }));
        Self::send(request, "Failed to create branch").await?;
        Ok(())
    }

    async fn create_blob(&self, token: &str, content: &[u8]) -> Result<String, GitHubError> {
        let request = self
            .http
            .post(self.repo_url("git/blobs"))
            .headers(Self::headers(token))
            .json(&json!({ "content": STANDARD.encode(content), "encoding": "base64" }));
        let blob: ShaResponse = Self::send_json(request, "Failed to create blob").await?;
        Ok(blob.sha)
    }

    async fn create_tree(
        &self,
        token: &str,
        base_tree: &str,
        entries: &[TreeEntry],
    ) -> Result<String, GitHubError> {
        let request = self
            .http
            .post(self.repo_url("git/trees"))
            .headers(Self::headers(token))
            .json(&json!({ "base_tree": base_tree, "tree": entries }));
        let tree: ShaResponse = Self::send_json(request, "Failed to create tree").await?;
        Ok(tree.sha)
    }

    async fn create_commit(&self, token: &str, commit: &NewCommit) -> Result<String, GitHubError> {
        let request = self
            .http
            .post(self.repo_url("git/commits"))
            .headers(Self::headers(token))
            .json(commit);
        let created: ShaResponse = Self::send_json(request, "Failed to create commit").await?;
        Ok(created.sha)
    }

    async fn update_branch(
        &self,
        token: &str,
        branch: &str,
        sha: &str,
    ) -> Result<(), GitHubError> {
        let request = self
            .http
            .patch(self.repo_url(&format!("git/refs/heads/{}", branch)))
            .headers(Self::headers(token))
            .json(&json!({ "sha": sha }));
        Self::send(request, "Failed to update branch ref").await?;
        Ok(())
    }

    async fn create_pull_request(
        &self,
        token: &str,
        pull: &NewPullRequest,
    ) -> Result<PullRequest, GitHubError> {
        let request = self
            .http
            .post(self.repo_url("pulls"))
            .headers(Self::headers(token))
            .json(pull);
        Self::send_json(request, "Failed to create PR").await
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String, GitHubError> {
        let context = "Failed to exchange OAuth code";
        let request = self
            .http
            .post(format!("{}/login/oauth/access_token", self.oauth_base))
            .header(ACCEPT, "application/json")
            .json(&json!({
                "client_id": self.client_id,
                "client_secret": self.client_secret,
                "code": code,
                "redirect_uri": redirect_uri,
            }));
        let response: AccessTokenResponse = Self::send_json(request, context).await?;

        // GitHub reports bad codes with a 200 and an `error` field
        match response.access_token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(GitHubError::api(
                context,
                response
                    .error_description
                    .or(response.error)
                    .unwrap_or_else(|| "no access token returned".to_string()),
            )),
        }
    }

    async fn authenticated_user(&self, token: &str) -> Result<GitHubUser, GitHubError> {
        let request = self
            .http
            .get(format!("{}/user", self.api_base))
            .headers(Self::headers(token));
        Self::send_json(request, "Failed to fetch GitHub user").await
    }
}
