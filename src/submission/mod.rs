use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::CommentState;
use crate::store::CommentStore;

/// Why a submission was blocked before assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing name: enter your name before submitting")]
    MissingName,
    #[error("Incomplete responses: {} comment(s) still need a response", .pending.len())]
    IncompleteResponses { pending: Vec<String> },
}

/// Errors from the submission sink.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("no submission endpoint configured")]
    NoEndpoint,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("submission endpoint returned HTTP {0}")]
    Status(u16),
}

pub type Result<T> = std::result::Result<T, SubmissionError>;

/// Response for one comment in the outbound payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEntry {
    #[serde(rename = "CommentID")]
    pub comment_id: String,
    /// Empty unless the comment was completed.
    #[serde(rename = "ResponseText")]
    pub response_text: String,
    #[serde(rename = "ResponseAuthor", skip_serializing_if = "Option::is_none", default)]
    pub response_author: Option<String>,
    #[serde(rename = "ResponseDateTime", skip_serializing_if = "Option::is_none", default)]
    pub responded_at: Option<DateTime<Utc>>,
}

/// Serialized set of responses sent when the review is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    #[serde(rename = "DocumentID")]
    pub document_id: String,
    #[serde(rename = "ReviewerName")]
    pub reviewer_name: String,
    #[serde(rename = "SubmittedAt")]
    pub submitted_at: DateTime<Utc>,
    #[serde(rename = "Comments")]
    pub comments: Vec<ResponseEntry>,
}

impl SubmissionPayload {
    pub fn entry(&self, comment_id: &str) -> Option<&ResponseEntry> {
        self.comments.iter().find(|e| e.comment_id == comment_id)
    }
}

/// Check that a submission may be assembled.
///
/// The reviewer name is checked first, then every comment's response text.
pub fn validate(store: &CommentStore, reviewer_name: &str) -> std::result::Result<(), ValidationError> {
    if reviewer_name.trim().is_empty() {
        return Err(ValidationError::MissingName);
    }

    let pending = store.missing_responses();
    if !pending.is_empty() {
        return Err(ValidationError::IncompleteResponses {
            pending: pending.into_iter().map(str::to_string).collect(),
        });
    }

    Ok(())
}

/// Validate and build the payload from the comments in display order.
///
/// Only completed comments carry their response text, author and time.
pub fn assemble(
    document_id: &str,
    store: &CommentStore,
    reviewer_name: &str,
    responded_at: DateTime<Utc>,
) -> std::result::Result<SubmissionPayload, ValidationError> {
    validate(store, reviewer_name)?;
    let reviewer_name = reviewer_name.trim().to_string();

    let comments = store
        .comments()
        .iter()
        .map(|c| {
            if c.state == CommentState::Complete {
                ResponseEntry {
                    comment_id: c.id.clone(),
                    response_text: c.response_text.trim().to_string(),
                    response_author: Some(reviewer_name.clone()),
                    responded_at: Some(responded_at),
                }
            } else {
                ResponseEntry {
                    comment_id: c.id.clone(),
                    response_text: String::new(),
                    response_author: None,
                    responded_at: None,
                }
            }
        })
        .collect();

    Ok(SubmissionPayload {
        document_id: document_id.to_string(),
        reviewer_name,
        submitted_at: responded_at,
        comments,
    })
}

/// Accepts an assembled payload.
pub trait SubmissionSink: Send + Sync {
    fn submit(&self, payload: &SubmissionPayload) -> Result<()>;
}

/// POSTs the payload as JSON to the review workflow endpoint.
pub struct HttpSubmissionSink {
    client: reqwest::blocking::Client,
    url: Option<String>,
}

impl HttpSubmissionSink {
    pub fn new(url: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client, url })
    }
}

impl SubmissionSink for HttpSubmissionSink {
    fn submit(&self, payload: &SubmissionPayload) -> Result<()> {
        let url = self.url.as_deref().ok_or(SubmissionError::NoEndpoint)?;
        info!(
            document_id = %payload.document_id,
            comments = payload.comments.len(),
            "submitting responses"
        );

        let response = self.client.post(url).json(payload).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(SubmissionError::Status(status.as_u16()));
        }
        Ok(())
    }
}
