use std::convert::Infallible;

use axum::{
    extract::{Multipart, State},
    http::{header, HeaderMap},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use serde::Serialize;
use tokio_stream::{wrappers::UnboundedReceiverStream, StreamExt};

use crate::auth::{AuthSession, ClientIp};
use crate::error::{AppError, Result};
use crate::models::{Submission, SubmissionMetadata, SubmittedFile};
use crate::submission::{ProgressSink, SubmissionOutcome, SubmissionPipeline, Submitter};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub config_id: String,
    pub branch: String,
    pub pull_request_url: String,
}

impl From<SubmissionOutcome> for UploadResponse {
    fn from(outcome: SubmissionOutcome) -> Self {
        Self {
            success: true,
            message: "Pull request created successfully".to_string(),
            config_id: outcome.config_id,
            branch: outcome.branch,
            pull_request_url: outcome.pull_request.html_url,
        }
    }
}

/// Whether the caller asked for a single JSON result instead of a stream
fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"))
}

/// Read the `files` and `configData` parts of the upload form
async fn read_submission(mut multipart: Multipart, max_bytes: usize) -> Result<Submission> {
    let mut metadata: Option<SubmissionMetadata> = None;
    let mut files = Vec::new();
    let mut total = 0usize;

    while let Some(field) = multipart.next_field().await? {
        let part = field.name().map(str::to_string);
        match part.as_deref() {
            Some("files") => {
                let name = field.file_name().unwrap_or_default().to_string();
                let content = field.bytes().await?;
                total += content.len();
                if total > max_bytes {
                    return Err(AppError::PayloadTooLarge);
                }
                files.push(SubmittedFile::new(name, content.to_vec()));
            }
            Some("configData") => {
                let text = field.text().await?;
                metadata = Some(serde_json::from_str(&text).map_err(|_| {
                    AppError::InvalidInput("configData must be valid JSON".to_string())
                })?);
            }
            _ => {}
        }
    }

    let metadata =
        metadata.ok_or_else(|| AppError::InvalidInput("Missing configData".to_string()))?;
    if files.is_empty() {
        return Err(AppError::InvalidInput("No files uploaded".to_string()));
    }

    Ok(Submission::new(metadata, files))
}

/// Submit a config as a GitHub pull request
///
/// POST /api/upload-config (multipart: repeated `files`, one `configData`)
///
/// Progress is streamed as server-sent events unless the caller sends
/// `Accept: application/json`. Authentication and form errors are returned as
/// plain error responses in both modes.
pub async fn upload_config(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response> {
    let submission = read_submission(multipart, state.config.max_upload_bytes).await?;
    let submitter = Submitter::from_session(&session, ip);

    tracing::info!(
        "Upload of {:?} ({} files) from @{}",
        submission.name(),
        submission.files.len(),
        submitter.login
    );

    if wants_json(&headers) {
        let outcome = SubmissionPipeline::from_state(&state)
            .run(&submitter, &submission, &ProgressSink::disabled())
            .await?;
        return Ok(Json(UploadResponse::from(outcome)).into_response());
    }

    let (sink, rx) = ProgressSink::channel();

    // Runs to completion even if the client disconnects
    tokio::spawn(async move {
        let pipeline = SubmissionPipeline::from_state(&state);
        match pipeline.run(&submitter, &submission, &sink).await {
            Ok(outcome) => sink.complete(&outcome),
            Err(e) => {
                tracing::warn!("Upload of {:?} failed: {}", submission.name(), e);
                sink.error(&e);
            }
        }
    });

    let stream = UnboundedReceiverStream::new(rx).map(|event| {
        Ok::<Event, Infallible>(
            Event::default()
                .json_data(&event)
                .unwrap_or_else(|_| Event::default().data("{}")),
        )
    });

    Ok(Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response())
}
