use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::SubmissionOutcome;
use crate::error::AppError;

/// Frame of the streamed upload response
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent {
    Progress {
        step: String,
        percentage: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Complete {
        message: String,
        config_id: String,
        branch: String,
        pull_request_url: String,
    },
    Error {
        error: String,
    },
}

/// Where the pipeline reports its progress
///
/// Sending never fails: once the client has gone away events are dropped and
/// the pipeline keeps running to completion.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<UnboundedSender<ProgressEvent>>,
}

impl ProgressSink {
    pub fn channel() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that discards everything (non-streamed responses)
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    fn send(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn step(&self, step: &str, percentage: u8) {
        self.send(ProgressEvent::Progress {
            step: step.to_string(),
            percentage,
            details: None,
        });
    }

    pub fn step_with(&self, step: &str, percentage: u8, details: impl Into<String>) {
        self.send(ProgressEvent::Progress {
            step: step.to_string(),
            percentage,
            details: Some(details.into()),
        });
    }

    pub fn complete(&self, outcome: &SubmissionOutcome) {
        self.send(ProgressEvent::Complete {
            message: "Pull request created successfully".to_string(),
            config_id: outcome.config_id.clone(),
            branch: outcome.branch.clone(),
            pull_request_url: outcome.pull_request.html_url.clone(),
        });
    }

    pub fn error(&self, error: &AppError) {
        self.send(ProgressEvent::Error {
            error: error.client_message(),
        });
    }
}
