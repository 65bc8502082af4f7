//! Config submission: validation, rate limiting and the GitHub pull request
//! pipeline, with optional streamed progress.

pub mod pipeline;
pub mod progress;
pub mod webhook;

use crate::github::PullRequest;
use crate::models::Session;

pub use pipeline::SubmissionPipeline;
pub use progress::{ProgressEvent, ProgressSink};

/// Who is submitting, resolved from the session and request
#[derive(Debug, Clone)]
pub struct Submitter {
    /// GitHub user id; the cooldown identity
    pub id: String,
    pub login: String,
    pub display_name: String,
    pub email: String,
    pub access_token: String,
    pub ip: String,
}

impl Submitter {
    pub fn from_session(session: &Session, ip: impl Into<String>) -> Self {
        Self {
            id: session.user.id.clone(),
            login: session.login(),
            display_name: session.display_name(),
            email: session.commit_email(),
            access_token: session.access_token.clone().unwrap_or_default(),
            ip: ip.into(),
        }
    }
}

/// Result of a successful submission
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub config_id: String,
    pub branch: String,
    pub commit_sha: String,
    pub pull_request: PullRequest,
}
