//! GitHub REST API access used by sign-in and the submission pipeline.

pub mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::BLOB_FILE_MODE;

pub use client::GitHubClient;

#[derive(Error, Debug)]
pub enum GitHubError {
    /// Non-success response, `body` is the raw text GitHub returned
    #[error("{context}: {body}")]
    Api { context: String, body: String },

    #[error("{context}: {source}")]
    Request {
        context: String,
        #[source]
        source: reqwest::Error,
    },
}

impl GitHubError {
    pub fn api(context: &str, body: impl Into<String>) -> Self {
        GitHubError::Api {
            context: context.to_string(),
            body: body.into(),
        }
    }
}

/// Profile of the authenticated user
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUser {
    pub id: u64,
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Entry of a tree created on top of a base tree
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TreeEntry {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: String,
}

impl TreeEntry {
    pub fn blob(path: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: BLOB_FILE_MODE.to_string(),
            kind: "blob".to_string(),
            sha: sha.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
    pub date: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewCommit {
    pub message: String,
    pub tree: String,
    pub parents: Vec<String>,
    pub author: CommitAuthor,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewPullRequest {
    pub title: String,
    pub head: String,
    pub base: String,
    pub body: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
}

/// Operations against the upload repository, each under the caller's token
#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// Titles of all open and closed pull requests
    async fn list_pull_request_titles(&self, token: &str) -> Result<Vec<String>, GitHubError>;

    /// Head commit SHA of `branch`
    async fn branch_head(&self, token: &str, branch: &str) -> Result<String, GitHubError>;

    async fn create_branch(&self, token: &str, branch: &str, sha: &str)
        -> Result<(), GitHubError>;

    /// Upload `content` as a blob, returning its SHA
    async fn create_blob(&self, token: &str, content: &[u8]) -> Result<String, GitHubError>;

    /// Create a tree on top of `base_tree`, returning its SHA
    async fn create_tree(
        &self,
        token: &str,
        base_tree: &str,
        entries: &[TreeEntry],
    ) -> Result<String, GitHubError>;

    /// Create a commit, returning its SHA
    async fn create_commit(&self, token: &str, commit: &NewCommit) -> Result<String, GitHubError>;

    /// Move `branch` to `sha`
    async fn update_branch(&self, token: &str, branch: &str, sha: &str)
        -> Result<(), GitHubError>;

    async fn create_pull_request(
        &self,
        token: &str,
        pull: &NewPullRequest,
    ) -> Result<PullRequest, GitHubError>;

    /// Trade an OAuth authorization code for an access token
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String, GitHubError>;

    async fn authenticated_user(&self, token: &str) -> Result<GitHubUser, GitHubError>;
}
