use chrono::{DateTime, SecondsFormat, Utc};

use super::progress::ProgressSink;
use super::webhook::{self, WebhookPayload};
use super::{Submitter, SubmissionOutcome};
use crate::config::Config;
use crate::constants::PR_TITLE_PREFIX;
use crate::error::{AppError, Result};
use crate::github::{CommitAuthor, GitHubApi, NewCommit, NewPullRequest, TreeEntry};
use crate::models::{normalize_name, Submission, UploadTrackers};
use crate::AppState;

/// Branch receiving a submission: `config/add-{id}-{unix millis}`
pub fn branch_name(config_id: &str, now_ms: i64) -> String {
    format!("config/add-{}-{}", config_id, now_ms)
}

pub fn pull_request_title(config_id: &str) -> String {
    format!("{}{}", PR_TITLE_PREFIX, config_id)
}

/// Config id a pull request title refers to
pub fn config_id_from_title(title: &str) -> String {
    normalize_name(&title.replacen(PR_TITLE_PREFIX, "", 1))
}

/// Percentage reported while uploading file `index` of `total` (60..80)
fn upload_percentage(index: usize, total: usize) -> u8 {
    if total == 0 {
        return 60;
    }
    (60.0 + (index as f64 / total as f64) * 20.0).round() as u8
}

/// Turns a validated submission into a branch, commit and pull request
///
/// Steps run strictly in order and the first failure aborts the run. GitHub
/// artifacts created before a failure are left in place.
pub struct SubmissionPipeline<'a> {
    github: &'a dyn GitHubApi,
    trackers: &'a UploadTrackers,
    config: &'a Config,
    http: &'a reqwest::Client,
}

impl<'a> SubmissionPipeline<'a> {
    pub fn new(
        github: &'a dyn GitHubApi,
        trackers: &'a UploadTrackers,
        config: &'a Config,
        http: &'a reqwest::Client,
    ) -> Self {
        Self {
            github,
            trackers,
            config,
            http,
        }
    }

    pub fn from_state(state: &'a AppState) -> Self {
        Self::new(
            state.github.as_ref(),
            state.trackers.as_ref(),
            &state.config,
            &state.http,
        )
    }

    /// Whether any open or closed pull request already targets `config_id`
    ///
    /// A failed listing counts as "no duplicate".
    async fn pull_request_exists(&self, config_id: &str, token: &str) -> bool {
        match self.github.list_pull_request_titles(token).await {
            Ok(titles) => titles.iter().any(|t| config_id_from_title(t) == config_id),
            Err(e) => {
                tracing::error!("{}", e);
                false
            }
        }
    }

    fn check_one_config_policy(&self, submitter: &Submitter) -> Result<()> {
        if !self.config.one_config_per_user {
            return Ok(());
        }

        if let Some(existing) = self.trackers.addresses.config_for(&submitter.ip) {
            tracing::info!("Blocked upload: IP {} already has config {:?}", submitter.ip, existing);
            return Err(AppError::Forbidden(
                "Only one config upload allowed per IP".to_string(),
            ));
        }

        if let Some(existing) = self.trackers.users.config_for(&submitter.id) {
            tracing::info!("Blocked upload: user {} already has config {:?}", submitter.id, existing);
            return Err(AppError::Forbidden(
                "Only one config upload allowed per GitHub user".to_string(),
            ));
        }

        Ok(())
    }

    fn pull_request_body(&self, config_id: &str, submission: &Submission, submitter: &Submitter, author: &str) -> String {
        format!(
            "This PR adds the {id} configuration to {dir}/.\n\n\
             Submitted by: @{login}\n\
             Config Name: {name}\n\
             Version: {version}\n\
             Author: {author}\n\n\
             Please review and merge.",
            id = config_id,
            dir = self.config.configs_dir,
            login = submitter.login,
            name = submission.name(),
            version = submission.metadata.version.trim(),
            author = author,
        )
    }

    pub async fn run(
        &self,
        submitter: &Submitter,
        submission: &Submission,
        progress: &ProgressSink,
    ) -> Result<SubmissionOutcome> {
        progress.step("Authenticating...", 5);
        if submitter.id.is_empty() || submitter.access_token.is_empty() {
            return Err(AppError::Unauthorized);
        }
        let token = submitter.access_token.as_str();

        progress.step("Processing request...", 10);
        let config_id = submission.config_id();
        let author = submission
            .metadata
            .author
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| submitter.display_name.clone());

        progress.step("Validating config...", 15);
        submission.validate_name()?;
        submission.validate_files()?;

        progress.step("Checking for existing configs...", 20);
        if self.pull_request_exists(&config_id, token).await {
            tracing::info!("Blocked upload: PR for {} already exists", config_id);
            return Err(AppError::DuplicateSubmission);
        }

        progress.step("Checking upload limits...", 25);
        let now: DateTime<Utc> = Utc::now();
        let now_ms = now.timestamp_millis();
        // Released again on any early return below
        let cooldown = self.trackers.cooldown.reserve(&submitter.id, now_ms)?;
        self.check_one_config_policy(submitter)?;

        // Held until this function returns, whatever the outcome
        let _in_flight = self.trackers.in_flight.try_acquire(&config_id)?;

        progress.step("Initializing GitHub operations...", 30);
        let base_branch = self.config.base_branch.as_str();
        let branch = branch_name(&config_id, now_ms);

        progress.step("Getting repository information...", 35);
        let base_sha = self.github.branch_head(token, base_branch).await?;

        progress.step_with("Creating new branch...", 40, format!("Branch: {}", branch));
        self.github.create_branch(token, &branch, &base_sha).await?;

        progress.step("Preparing configuration files...", 50);
        let files = submission.commit_files(&author, now)?;

        progress.step_with(
            "Uploading files to GitHub...",
            60,
            format!("Processing {} files", files.len()),
        );
        let mut entries = Vec::with_capacity(files.len());
        for (i, file) in files.iter().enumerate() {
            progress.step_with(
                "Uploading files to GitHub...",
                upload_percentage(i, files.len()),
                format!("Processing {}...", file.base_name()),
            );
            let sha = self.github.create_blob(token, &file.content).await?;
            let path = format!("{}/{}/{}", self.config.configs_dir, config_id, file.base_name());
            entries.push(TreeEntry::blob(path, sha));
        }

        progress.step("Creating file tree...", 80);
        let tree_sha = self.github.create_tree(token, &base_sha, &entries).await?;

        progress.step("Creating commit...", 85);
        let commit = NewCommit {
            message: format!("Add {} configuration", config_id),
            tree: tree_sha,
            parents: vec![base_sha],
            author: CommitAuthor {
                name: submitter.display_name.clone(),
                email: submitter.email.clone(),
                date: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            },
        };
        let commit_sha = self.github.create_commit(token, &commit).await?;

        progress.step("Updating branch...", 90);
        self.github.update_branch(token, &branch, &commit_sha).await?;

        progress.step("Creating pull request...", 95);
        let pull = NewPullRequest {
            title: pull_request_title(&config_id),
            head: branch.clone(),
            base: base_branch.to_string(),
            body: self.pull_request_body(&config_id, submission, submitter, &author),
        };
        let pull_request = self.github.create_pull_request(token, &pull).await?;

        progress.step("Finalizing...", 98);
        let payload = WebhookPayload::config_uploaded(
            submission.name(),
            &submitter.display_name,
            &submitter.ip,
            Utc::now(),
        );
        webhook::notify(self.http, self.config.webhook_url.as_deref(), &payload).await;

        cooldown.commit();
        self.trackers.users.record(&submitter.id, &config_id);
        self.trackers.addresses.record(&submitter.ip, &config_id);

        tracing::info!(
            "Opened PR #{} for config {} from @{}",
            pull_request.number,
            config_id,
            submitter.login
        );

        Ok(SubmissionOutcome {
            config_id,
            branch,
            commit_sha,
            pull_request,
        })
    }
}
