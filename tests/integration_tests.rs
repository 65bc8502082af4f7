//! Integration tests for the Marketplace Server API
//!
//! These tests drive the full router against in-memory GitHub and CDN fakes.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tower::ServiceExt;

use marketplace_server::{
    app,
    auth::{issue_session, GitHubSessionHooks},
    catalog::{CdnError, ContentSource},
    github::{GitHubApi, GitHubError, GitHubUser, NewCommit, NewPullRequest, PullRequest, TreeEntry},
    models::{Submission, SubmissionMetadata, SubmittedFile, UploadTrackers},
    submission::{ProgressSink, SubmissionPipeline, Submitter},
    AppError, AppState, Config,
};

// Test configuration constants
const TEST_SECRET: &str = "test-session-secret";
const BOUNDARY: &str = "----marketplace-test-boundary";
const CONFIGS_REPO: &str = "org/configs";
const SCRIPTS_REPO: &str = "org/scripts";

// =============================================================================
// Fakes
// =============================================================================

/// Records every call and answers with deterministic SHAs
#[derive(Default)]
struct FakeGitHub {
    calls: Mutex<Vec<String>>,
    pr_titles: Vec<String>,
    branches: Mutex<Vec<String>>,
    tree: Mutex<Vec<TreeEntry>>,
    commits: Mutex<Vec<NewCommit>>,
    pulls: Mutex<Vec<NewPullRequest>>,
    /// When set, `branch_head` signals `entered` and waits on `gate`
    gate: Option<Arc<Notify>>,
    entered: Arc<Notify>,
}

impl FakeGitHub {
    fn with_titles(titles: &[&str]) -> Self {
        Self {
            pr_titles: titles.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GitHubApi for FakeGitHub {
    async fn list_pull_request_titles(&self, _token: &str) -> Result<Vec<String>, GitHubError> {
        self.record("list_pull_requests");
        Ok(self.pr_titles.clone())
    }

    async fn branch_head(&self, _token: &str, branch: &str) -> Result<String, GitHubError> {
        self.record("branch_head");
        if let Some(gate) = &self.gate {
            self.entered.notify_one();
            gate.notified().await;
        }
        Ok(format!("base-{}", branch))
    }

    async fn create_branch(&self, _token: &str, branch: &str, _sha: &str) -> Result<(), GitHubError> {
        self.record("create_branch");
        self.branches.lock().unwrap().push(branch.to_string());
        Ok(())
    }

    async fn create_blob(&self, _token: &str, content: &[u8]) -> Result<String, GitHubError> {
        self.record("create_blob");
        Ok(format!("blob-{}", content.len()))
    }

    async fn create_tree(
        &self,
        _token: &str,
        _base_tree: &str,
        entries: &[TreeEntry],
    ) -> Result<String, GitHubError> {
        self.record("create_tree");
        self.tree.lock().unwrap().extend_from_slice(entries);
        Ok("tree-sha".to_string())
    }

    async fn create_commit(&self, _token: &str, commit: &NewCommit) -> Result<String, GitHubError> {
        self.record("create_commit");
        self.commits.lock().unwrap().push(commit.clone());
        Ok("commit-sha".to_string())
    }

    async fn update_branch(&self, _token: &str, _branch: &str, _sha: &str) -> Result<(), GitHubError> {
        self.record("update_branch");
        Ok(())
    }

    async fn create_pull_request(
        &self,
        _token: &str,
        pull: &NewPullRequest,
    ) -> Result<PullRequest, GitHubError> {
        self.record("create_pull_request");
        self.pulls.lock().unwrap().push(pull.clone());
        Ok(PullRequest {
            number: 7,
            html_url: "https://github.test/org/configs/pull/7".to_string(),
        })
    }

    async fn exchange_code(&self, code: &str, _redirect_uri: &str) -> Result<String, GitHubError> {
        self.record("exchange_code");
        if code == "good-code" {
            Ok("gho_exchanged".to_string())
        } else {
            Err(GitHubError::api("Failed to exchange OAuth code", "bad_verification_code"))
        }
    }

    async fn authenticated_user(&self, _token: &str) -> Result<GitHubUser, GitHubError> {
        self.record("authenticated_user");
        Ok(octocat())
    }
}

/// In-memory CDN; missing paths answer 404
#[derive(Default)]
struct FakeCdn {
    files: HashMap<String, Vec<u8>>,
}

impl FakeCdn {
    fn with(mut self, repo: &str, path: &str, body: &[u8]) -> Self {
        self.files.insert(format!("{}/{}", repo, path), body.to_vec());
        self
    }

    fn populated() -> Self {
        FakeCdn::default()
            .with(
                CONFIGS_REPO,
                "config-index.json",
                br#"[{"id":"ocean","name":"Ocean","author":"alice","filename":"ocean.zip"}]"#,
            )
            .with(CONFIGS_REPO, "ocean.zip", b"PK\x03\x04zip")
            .with(CONFIGS_REPO, "ocean/icon.png", b"\x89PNG")
            .with(
                SCRIPTS_REPO,
                "module-index.json",
                br#"[{"filename":"AutoGG.lua","name":"AutoGG","type":"module","path":"module/AutoGG.lua"}]"#,
            )
            .with(SCRIPTS_REPO, "command-index.json", b"[]")
            .with(SCRIPTS_REPO, "module/AutoGG.lua", b"print('gg')")
    }
}

#[async_trait]
impl ContentSource for FakeCdn {
    async fn fetch(&self, repo: &str, path: &str) -> Result<Vec<u8>, CdnError> {
        let key = format!("{}/{}", repo, path);
        self.files.get(&key).cloned().ok_or(CdnError::Status {
            url: key,
            status: 404,
        })
    }

    fn public_url(&self, repo: &str, path: &str) -> String {
        format!("https://cdn.test/{}/main/{}", repo, path)
    }
}

// =============================================================================
// Test Helpers
// =============================================================================

/// Create a test configuration
fn test_config() -> Config {
    Config {
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        environment: "test".to_string(),
        allowed_origins: vec!["http://localhost:3000".to_string()],
        public_url: "http://localhost:5020".to_string(),
        csp_connect_src: vec!["https://api.github.test".to_string()],
        cdn_base_url: "https://cdn.test".to_string(),
        github_api_base: "https://api.github.test".to_string(),
        github_oauth_base: "https://github.test".to_string(),
        configs_repo: CONFIGS_REPO.to_string(),
        scripts_repo: SCRIPTS_REPO.to_string(),
        upload_repo: CONFIGS_REPO.to_string(),
        base_branch: "main".to_string(),
        configs_dir: "configs".to_string(),
        upload_cooldown_secs: 86_400,
        one_config_per_user: false,
        max_upload_bytes: 1_000_000,
        catalog_cache_secs: 0,
        webhook_url: None,
        github_client_id: "client-id".to_string(),
        github_client_secret: "client-secret".to_string(),
        session_secret: TEST_SECRET.to_string(),
        session_ttl_secs: 3600,
    }
}

fn octocat() -> GitHubUser {
    GitHubUser {
        id: 583231,
        login: "octocat".to_string(),
        name: Some("The Octocat".to_string()),
        email: None,
        avatar_url: None,
    }
}

fn hubot() -> GitHubUser {
    GitHubUser {
        id: 480938,
        login: "hubot".to_string(),
        name: None,
        email: Some("hubot@example.com".to_string()),
        avatar_url: None,
    }
}

fn create_state(config: Config, github: Arc<FakeGitHub>, cdn: FakeCdn) -> AppState {
    AppState::new(config, github, Arc::new(cdn), reqwest::Client::new())
}

/// Create a test app router
fn create_test_app(github: Arc<FakeGitHub>) -> (AppState, Router) {
    let state = create_state(test_config(), github, FakeCdn::populated());
    (state.clone(), app(state))
}

/// `Cookie` header value carrying a valid session for `user`
fn session_cookie(user: &GitHubUser) -> String {
    let config = test_config();
    let now = chrono::Utc::now().timestamp();
    let token = issue_session(&GitHubSessionHooks, &config, user, "gho_test", now).unwrap();
    format!("marketplace_session={}", token)
}

/// Build a multipart upload body with a `configData` part and `files` parts
fn multipart_body(name: &str, files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    let config_data = serde_json::json!({ "name": name, "version": "1.0.0" }).to_string();

    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"configData\"\r\n\r\n{}\r\n",
            BOUNDARY, config_data
        )
        .as_bytes(),
    );
    for (filename, content) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn valid_files() -> Vec<(&'static str, &'static [u8])> {
    vec![
        ("My Config/icon.png", &b"\x89PNG"[..]),
        ("My Config/My Config.flarial", &b"{\"modules\":[]}"[..]),
    ]
}

/// Create an upload request; `json` selects the non-streamed response
fn make_upload_request(
    cookie: Option<&str>,
    ip: &str,
    name: &str,
    files: &[(&str, &[u8])],
    json: bool,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/upload-config")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header("x-forwarded-for", ip);
    if json {
        builder = builder.header(header::ACCEPT, "application/json");
    }
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(multipart_body(name, files))).unwrap()
}

/// Create a GET request
fn make_get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Parse response body as JSON
async fn body_to_json(body: Body) -> Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_to_bytes(body: Body) -> Vec<u8> {
    body.collect().await.unwrap().to_bytes().to_vec()
}

/// Parse every `data:` frame of an event stream body
async fn sse_frames(body: Body) -> Vec<Value> {
    let text = String::from_utf8(body_to_bytes(body).await).unwrap();
    text.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).unwrap())
        .collect()
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check_returns_healthy() {
    let (_, app) = create_test_app(Arc::new(FakeGitHub::default()));

    let response = app.oneshot(make_get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let csp = response
        .headers()
        .get(header::CONTENT_SECURITY_POLICY)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(csp.contains("default-src 'self'"));
    assert!(csp.contains("connect-src 'self' https://api.github.test"));

    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].as_str().is_some());
    assert!(body["timestamp"].as_str().is_some());
}

// =============================================================================
// Catalog Tests
// =============================================================================

#[tokio::test]
async fn test_list_configs() {
    let (_, app) = create_test_app(Arc::new(FakeGitHub::default()));

    let response = app.oneshot(make_get_request("/api/configs")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "public, s-maxage=300, stale-while-revalidate=600"
    );
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["configs"][0]["id"], "ocean");
    assert_eq!(body["configs"][0]["version"], "1.0.0");
}

#[tokio::test]
async fn test_catalogs_empty_when_upstream_unreachable() {
    let state = create_state(test_config(), Arc::new(FakeGitHub::default()), FakeCdn::default());

    let response = app(state.clone())
        .oneshot(make_get_request("/api/configs"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["configs"], serde_json::json!([]));

    let response = app(state).oneshot(make_get_request("/api/scripts")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["module"], serde_json::json!([]));
    assert_eq!(body["command"], serde_json::json!([]));
}

#[tokio::test]
async fn test_list_scripts() {
    let (_, app) = create_test_app(Arc::new(FakeGitHub::default()));

    let response = app.oneshot(make_get_request("/api/scripts")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["module"][0]["id"], "module-AutoGG");
    assert_eq!(
        body["module"][0]["downloadUrl"],
        "https://cdn.test/org/scripts/main/module/AutoGG.lua"
    );
    assert_eq!(body["command"], serde_json::json!([]));
}

#[tokio::test]
async fn test_config_download_and_icon() {
    let (state, app_router) = create_test_app(Arc::new(FakeGitHub::default()));

    let response = app_router
        .oneshot(make_get_request("/api/configs/ocean/download"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "application/zip");
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"ocean.zip\""
    );
    assert_eq!(body_to_bytes(response.into_body()).await, b"PK\x03\x04zip");

    let response = app(state)
        .oneshot(make_get_request("/api/configs/ocean/icon.png"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "image/png");
}

#[tokio::test]
async fn test_config_resource_errors() {
    let (state, _) = create_test_app(Arc::new(FakeGitHub::default()));

    let cases = [
        ("/api/configs/x../download", StatusCode::BAD_REQUEST),
        ("/api/configs/ocean/readme.txt", StatusCode::NOT_FOUND),
        ("/api/configs/missing/download", StatusCode::NOT_FOUND),
    ];
    for (uri, expected) in cases {
        let response = app(state.clone()).oneshot(make_get_request(uri)).await.unwrap();
        assert_eq!(response.status(), expected, "{}", uri);
        let body = body_to_json(response.into_body()).await;
        assert!(body["error"].as_str().is_some());
    }
}

#[tokio::test]
async fn test_script_source_and_download() {
    let (state, _) = create_test_app(Arc::new(FakeGitHub::default()));

    let response = app(state.clone())
        .oneshot(make_get_request("/api/scripts/module/autogg"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert_eq!(body_to_bytes(response.into_body()).await, b"print('gg')");

    let response = app(state)
        .oneshot(make_get_request("/api/scripts/module/AutoGG/download"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/octet-stream"
    );
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"AutoGG.lua\""
    );
}

#[tokio::test]
async fn test_script_errors() {
    let (state, _) = create_test_app(Arc::new(FakeGitHub::default()));

    let response = app(state.clone())
        .oneshot(make_get_request("/api/scripts/widget/autogg"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app(state)
        .oneshot(make_get_request("/api/scripts/command/autogg"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["error"], "Script not found");
}

// =============================================================================
// Session Tests
// =============================================================================

#[tokio::test]
async fn test_session_endpoint() {
    let (state, _) = create_test_app(Arc::new(FakeGitHub::default()));

    let response = app(state.clone())
        .oneshot(make_get_request("/api/auth/session"))
        .await
        .unwrap();
    assert_eq!(body_to_json(response.into_body()).await, serde_json::json!({}));

    let request = Request::builder()
        .uri("/api/auth/session")
        .header(header::COOKIE, session_cookie(&octocat()))
        .body(Body::empty())
        .unwrap();
    let response = app(state).oneshot(request).await.unwrap();
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["user"]["id"], "583231");
    assert_eq!(body["user"]["login"], "octocat");
    assert!(body.get("accessToken").is_none());
}

#[tokio::test]
async fn test_forged_session_is_ignored() {
    let (_, app) = create_test_app(Arc::new(FakeGitHub::default()));

    let request = Request::builder()
        .uri("/api/auth/session")
        .header(header::COOKIE, "marketplace_session=eyJzdWIiOiIxIn0.deadbeef")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(body_to_json(response.into_body()).await, serde_json::json!({}));
}

#[tokio::test]
async fn test_signin_redirects_to_github() {
    let (_, app) = create_test_app(Arc::new(FakeGitHub::default()));

    let response = app
        .oneshot(make_get_request("/api/auth/signin/github"))
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
    assert!(location.starts_with("https://github.test/login/oauth/authorize?client_id=client-id"));
    assert!(location.contains("scope=read%3Auser+user%3Aemail+public_repo"));
    let cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("marketplace_oauth_state="));
}

#[tokio::test]
async fn test_callback_sets_session_cookie() {
    let github = Arc::new(FakeGitHub::default());
    let (_, app) = create_test_app(github.clone());

    let request = Request::builder()
        .uri("/api/auth/callback/github?code=good-code&state=abc123")
        .header(header::COOKIE, "marketplace_oauth_state=abc123")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
    let cookies: Vec<&str> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap())
        .collect();
    assert!(cookies.iter().any(|c| c.starts_with("marketplace_session=")));
    assert_eq!(github.calls(), vec!["exchange_code", "authenticated_user"]);
}

#[tokio::test]
async fn test_callback_rejects_state_mismatch() {
    let github = Arc::new(FakeGitHub::default());
    let (_, app) = create_test_app(github.clone());

    let request = Request::builder()
        .uri("/api/auth/callback/github?code=good-code&state=forged")
        .header(header::COOKIE, "marketplace_oauth_state=abc123")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(github.calls().is_empty());
}

// =============================================================================
// Upload Tests
// =============================================================================

#[tokio::test]
async fn test_upload_requires_session() {
    let github = Arc::new(FakeGitHub::default());
    let (_, app) = create_test_app(github.clone());

    let response = app
        .oneshot(make_upload_request(None, "203.0.113.7", "My Config", &valid_files(), true))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["error"], "Unauthorized: Please sign in with GitHub");
    assert!(github.calls().is_empty());
}

#[tokio::test]
async fn test_upload_creates_branch_commit_and_pull_request() {
    let github = Arc::new(FakeGitHub::default());
    let (_, app) = create_test_app(github.clone());
    let cookie = session_cookie(&octocat());

    let response = app
        .oneshot(make_upload_request(
            Some(&cookie),
            "203.0.113.7",
            "My Config",
            &valid_files(),
            true,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["configId"], "myconfig");
    assert_eq!(body["pullRequestUrl"], "https://github.test/org/configs/pull/7");
    assert!(body["branch"].as_str().unwrap().starts_with("config/add-myconfig-"));
    assert_eq!(github.branches.lock().unwrap().as_slice(), [body["branch"].as_str().unwrap()]);

    assert_eq!(
        github.calls(),
        vec![
            "list_pull_requests",
            "branch_head",
            "create_branch",
            "create_blob",
            "create_blob",
            "create_blob",
            "create_tree",
            "create_commit",
            "update_branch",
            "create_pull_request",
        ]
    );

    let paths: Vec<String> = github.tree.lock().unwrap().iter().map(|e| e.path.clone()).collect();
    assert_eq!(
        paths,
        vec![
            "configs/myconfig/main.json",
            "configs/myconfig/icon.png",
            "configs/myconfig/My Config.flarial",
        ]
    );

    let commit = github.commits.lock().unwrap()[0].clone();
    assert_eq!(commit.message, "Add myconfig configuration");
    assert_eq!(commit.parents, vec!["base-main"]);
    assert_eq!(commit.author.name, "The Octocat");
    assert_eq!(commit.author.email, "octocat@users.noreply.github.com");

    let pull = github.pulls.lock().unwrap()[0].clone();
    assert_eq!(pull.title, "Add config: myconfig");
    assert_eq!(pull.base, "main");
    assert!(pull.body.contains("Submitted by: @octocat"));
    assert!(pull.body.contains("Config Name: My Config"));
}

#[tokio::test]
async fn test_upload_rejects_blocked_name_before_github() {
    let github = Arc::new(FakeGitHub::default());
    let (_, app) = create_test_app(github.clone());
    let cookie = session_cookie(&octocat());

    let response = app
        .oneshot(make_upload_request(
            Some(&cookie),
            "203.0.113.7",
            "Sh.it Theme",
            &valid_files(),
            true,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["error"], "Config name contains prohibited words");
    assert!(github.calls().is_empty());
}

#[tokio::test]
async fn test_upload_rejects_name_unusable_as_branch() {
    let github = Arc::new(FakeGitHub::default());
    let (_, app) = create_test_app(github.clone());
    let cookie = session_cookie(&octocat());

    let response = app
        .oneshot(make_upload_request(Some(&cookie), "203.0.113.7", "a~b", &valid_files(), true))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(
        body["error"],
        "Config name contains characters that cannot be used in a branch name"
    );
    assert!(github.calls().is_empty());
}

#[tokio::test]
async fn test_chunked_upload_over_limit_rejected() {
    let github = Arc::new(FakeGitHub::default());
    let mut config = test_config();
    config.max_upload_bytes = 2000;
    let state = create_state(config, github.clone(), FakeCdn::populated());
    let cookie = session_cookie(&octocat());

    let icon = [0u8; 5000];
    let body = multipart_body(
        "My Config",
        &[("My Config/icon.png", &icon[..]), ("My Config/My Config.flarial", b"{}")],
    );
    // No Content-Length: the limit can only trip while the body is read
    let chunks: Vec<Result<Vec<u8>, std::io::Error>> =
        body.chunks(512).map(|chunk| Ok(chunk.to_vec())).collect();

    let request = Request::builder()
        .method("POST")
        .uri("/api/upload-config")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header(header::ACCEPT, "application/json")
        .header(header::COOKIE, &cookie)
        .header("x-forwarded-for", "203.0.113.7")
        .body(Body::from_stream(tokio_stream::iter(chunks)))
        .unwrap();

    let response = app(state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["error"], "Upload exceeds maximum allowed size");
    assert!(github.calls().is_empty());
}

#[tokio::test]
async fn test_upload_rejects_disallowed_files() {
    let github = Arc::new(FakeGitHub::default());
    let (_, app) = create_test_app(github.clone());
    let cookie = session_cookie(&octocat());

    let mut files = valid_files();
    files.push(("My Config/run.exe", b"MZ"));
    let response = app
        .oneshot(make_upload_request(Some(&cookie), "203.0.113.7", "My Config", &files, true))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(github.calls().is_empty());
}

#[tokio::test]
async fn test_upload_rejects_existing_pull_request() {
    let github = Arc::new(FakeGitHub::with_titles(&["Fix typo", "Add config: myconfig"]));
    let (_, app) = create_test_app(github.clone());
    let cookie = session_cookie(&octocat());

    let response = app
        .oneshot(make_upload_request(
            Some(&cookie),
            "203.0.113.7",
            "My Config",
            &valid_files(),
            true,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["error"], "A pull request with this config name already exists");
    assert_eq!(github.calls(), vec!["list_pull_requests"]);
}

#[tokio::test]
async fn test_second_upload_within_cooldown_rejected() {
    let github = Arc::new(FakeGitHub::default());
    let (state, _) = create_test_app(github.clone());
    let cookie = session_cookie(&octocat());

    let response = app(state.clone())
        .oneshot(make_upload_request(
            Some(&cookie),
            "203.0.113.7",
            "My Config",
            &valid_files(),
            true,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app(state)
        .oneshot(make_upload_request(
            Some(&cookie),
            "198.51.100.1",
            "Ocean Breeze",
            &valid_files(),
            true,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(
        body["error"],
        "Upload limit reached. Please wait 1440 minutes before uploading again."
    );
    assert_eq!(
        github.calls().iter().filter(|c| *c == "create_pull_request").count(),
        1
    );
}

#[tokio::test]
async fn test_one_config_per_address_policy() {
    let github = Arc::new(FakeGitHub::default());
    let mut config = test_config();
    config.one_config_per_user = true;
    let state = create_state(config, github.clone(), FakeCdn::populated());

    let response = app(state.clone())
        .oneshot(make_upload_request(
            Some(&session_cookie(&octocat())),
            "203.0.113.7",
            "My Config",
            &valid_files(),
            true,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app(state)
        .oneshot(make_upload_request(
            Some(&session_cookie(&hubot())),
            "203.0.113.7",
            "Ocean Breeze",
            &valid_files(),
            true,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_to_json(response.into_body()).await;
    assert_eq!(body["error"], "Only one config upload allowed per IP");
}

#[tokio::test]
async fn test_policy_rejection_does_not_start_cooldown() {
    let github = Arc::new(FakeGitHub::default());
    let mut config = test_config();
    config.one_config_per_user = true;
    let state = create_state(config, github.clone(), FakeCdn::populated());

    let response = app(state.clone())
        .oneshot(make_upload_request(
            Some(&session_cookie(&octocat())),
            "203.0.113.7",
            "My Config",
            &valid_files(),
            true,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Rejected by address, after the cooldown slot was claimed
    let response = app(state.clone())
        .oneshot(make_upload_request(
            Some(&session_cookie(&hubot())),
            "203.0.113.7",
            "Ocean Breeze",
            &valid_files(),
            true,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The failed attempt left no cooldown behind
    let response = app(state)
        .oneshot(make_upload_request(
            Some(&session_cookie(&hubot())),
            "198.51.100.1",
            "Ocean Breeze",
            &valid_files(),
            true,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_upload_streams_progress_events() {
    let github = Arc::new(FakeGitHub::default());
    let (_, app) = create_test_app(github.clone());
    let cookie = session_cookie(&octocat());

    let response = app
        .oneshot(make_upload_request(
            Some(&cookie),
            "203.0.113.7",
            "My Config",
            &valid_files(),
            false,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let frames = sse_frames(response.into_body()).await;
    assert_eq!(frames[0]["type"], "progress");
    assert_eq!(frames[0]["percentage"], 5);

    let percentages: Vec<u64> = frames
        .iter()
        .filter_map(|f| f["percentage"].as_u64())
        .collect();
    assert!(percentages.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(percentages.last(), Some(&98));

    let last = frames.last().unwrap();
    assert_eq!(last["type"], "complete");
    assert_eq!(last["configId"], "myconfig");
    assert_eq!(last["pullRequestUrl"], "https://github.test/org/configs/pull/7");
}

#[tokio::test]
async fn test_streamed_failure_ends_with_error_frame() {
    let github = Arc::new(FakeGitHub::with_titles(&["Add config: My Config"]));
    let (_, app) = create_test_app(github);
    let cookie = session_cookie(&octocat());

    let response = app
        .oneshot(make_upload_request(
            Some(&cookie),
            "203.0.113.7",
            "my config",
            &valid_files(),
            false,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let frames = sse_frames(response.into_body()).await;
    let last = frames.last().unwrap();
    assert_eq!(last["type"], "error");
    assert_eq!(last["error"], "A pull request with this config name already exists");
}

// =============================================================================
// Concurrency Tests
// =============================================================================

fn submission(name: &str) -> Submission {
    Submission::new(
        SubmissionMetadata {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            author: Some("alice".to_string()),
            description: None,
        },
        valid_files()
            .into_iter()
            .map(|(name, content)| SubmittedFile::new(name, content.to_vec()))
            .collect(),
    )
}

fn submitter(id: &str, ip: &str) -> Submitter {
    Submitter {
        id: id.to_string(),
        login: format!("user{}", id),
        display_name: format!("User {}", id),
        email: format!("user{}@users.noreply.github.com", id),
        access_token: "gho_test".to_string(),
        ip: ip.to_string(),
    }
}

#[tokio::test]
async fn test_concurrent_same_name_submissions() {
    let gate = Arc::new(Notify::new());
    let github = Arc::new(FakeGitHub::gated(gate.clone()));
    let trackers = Arc::new(UploadTrackers::new(86_400));
    let config = Arc::new(test_config());
    let http = reqwest::Client::new();

    let first = {
        let (github, trackers, config, http) =
            (github.clone(), trackers.clone(), config.clone(), http.clone());
        tokio::spawn(async move {
            SubmissionPipeline::new(github.as_ref(), &trackers, &config, &http)
                .run(&submitter("1", "10.0.0.1"), &submission("My Config"), &ProgressSink::disabled())
                .await
        })
    };

    // The first submission now holds "myconfig" and waits inside GitHub
    github.entered.notified().await;
    assert!(trackers.in_flight.contains("myconfig"));

    let second = SubmissionPipeline::new(github.as_ref(), &trackers, &config, &http)
        .run(&submitter("2", "10.0.0.2"), &submission("myconfig"), &ProgressSink::disabled())
        .await;
    assert!(matches!(second, Err(AppError::UploadInProgress)));

    gate.notify_one();
    let outcome = first.await.unwrap().unwrap();
    assert_eq!(outcome.config_id, "myconfig");
    assert!(trackers.in_flight.is_empty());

    assert_eq!(
        github.calls().iter().filter(|c| *c == "create_branch").count(),
        1
    );
}

#[tokio::test]
async fn test_in_flight_released_after_failure() {
    let github = Arc::new(FakeGitHub::default());
    let trackers = UploadTrackers::new(86_400);
    let config = test_config();
    let http = reqwest::Client::new();

    let mut bad = submission("Ocean Breeze");
    bad.files.retain(|f| f.base_name() != "icon.png");
    let result = SubmissionPipeline::new(github.as_ref(), &trackers, &config, &http)
        .run(&submitter("1", "10.0.0.1"), &bad, &ProgressSink::disabled())
        .await;
    assert!(matches!(result, Err(AppError::InvalidInput(_))));
    assert!(trackers.in_flight.is_empty());

    let result = SubmissionPipeline::new(github.as_ref(), &trackers, &config, &http)
        .run(&submitter("1", "10.0.0.1"), &submission("Ocean Breeze"), &ProgressSink::disabled())
        .await;
    tokio_test::assert_ok!(result);
    assert!(trackers.in_flight.is_empty());
}

#[tokio::test]
async fn test_concurrent_uploads_from_same_submitter() {
    let gate = Arc::new(Notify::new());
    let github = Arc::new(FakeGitHub::gated(gate.clone()));
    let trackers = Arc::new(UploadTrackers::new(86_400));
    let config = Arc::new(test_config());
    let http = reqwest::Client::new();

    let first = {
        let (github, trackers, config, http) =
            (github.clone(), trackers.clone(), config.clone(), http.clone());
        tokio::spawn(async move {
            SubmissionPipeline::new(github.as_ref(), &trackers, &config, &http)
                .run(&submitter("1", "10.0.0.1"), &submission("My Config"), &ProgressSink::disabled())
                .await
        })
    };

    // The first submission has passed the cooldown check and waits inside GitHub
    github.entered.notified().await;

    let second = SubmissionPipeline::new(github.as_ref(), &trackers, &config, &http)
        .run(&submitter("1", "10.0.0.1"), &submission("Ocean Breeze"), &ProgressSink::disabled())
        .await;
    assert!(matches!(second, Err(AppError::CooldownActive { .. })));

    gate.notify_one();
    tokio_test::assert_ok!(first.await.unwrap());

    // Still limited once the first upload has been accepted
    let third = SubmissionPipeline::new(github.as_ref(), &trackers, &config, &http)
        .run(&submitter("1", "10.0.0.1"), &submission("Ocean Breeze"), &ProgressSink::disabled())
        .await;
    assert!(matches!(third, Err(AppError::CooldownActive { .. })));

    assert_eq!(
        github.calls().iter().filter(|c| *c == "create_pull_request").count(),
        1
    );
}
