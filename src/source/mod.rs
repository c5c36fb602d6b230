use serde::{Deserialize, Deserializer, Serialize, de};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::Comment;

/// Errors that can occur while fetching comments.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no comments endpoint configured; set comments_url or REVIEW_PORTAL_COMMENTS_URL")]
    NoEndpoint,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("comment service returned HTTP {0}")]
    Status(u16),
    #[error("malformed comment data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, SourceError>;

/// One comment as delivered by the comment workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    #[serde(rename = "CommentID", deserialize_with = "string_or_number")]
    pub comment_id: String,
    #[serde(
        rename = "TextID",
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub text_id: Option<String>,
    #[serde(rename = "CommentAuthor", default, deserialize_with = "string_or_null")]
    pub author: String,
    #[serde(rename = "CommentDateTime", default, deserialize_with = "string_or_null")]
    pub created_at: String,
    #[serde(rename = "CommentText", default, deserialize_with = "string_or_null")]
    pub text: String,
    #[serde(
        rename = "DocumentID",
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub document_id: Option<String>,
}

impl CommentRecord {
    /// Convert into an untouched domain comment.
    pub fn into_comment(self) -> Comment {
        let reference_key = self
            .text_id
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        Comment {
            author: self.author,
            created_at: self.created_at,
            ..Comment::new(self.comment_id, reference_key, self.text)
        }
    }
}

#[derive(Debug, Serialize)]
struct CommentsRequest<'a> {
    #[serde(rename = "DocumentID")]
    document_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct CommentsResponse {
    #[serde(rename = "Comments", default)]
    comments: Vec<CommentRecord>,
}

/// Either the workflow response shape or a bare list of records.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CommentsBody {
    Bare(Vec<CommentRecord>),
    Wrapped(CommentsResponse),
}

/// Supplies the ordered comment list for a document.
pub trait CommentSource: Send + Sync {
    fn fetch(&self, document_id: &str) -> Result<Vec<Comment>>;
}

/// Parse a comment payload and keep the records that belong to `document_id`.
///
/// An empty body means no comments. Records without a `DocumentID` are kept.
pub fn parse_comments(body: &str, document_id: &str) -> Result<Vec<Comment>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let records = match serde_json::from_str::<CommentsBody>(body)? {
        CommentsBody::Bare(records) => records,
        CommentsBody::Wrapped(response) => response.comments,
    };
    let total = records.len();
    let comments: Vec<Comment> = records
        .into_iter()
        .filter(|r| r.document_id.as_deref().is_none_or(|id| id == document_id))
        .map(CommentRecord::into_comment)
        .collect();
    debug!(total, kept = comments.len(), document_id, "parsed comment records");
    Ok(comments)
}

/// Fetches comments by POSTing `{"DocumentID": ..}` to a workflow trigger URL.
pub struct HttpCommentSource {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpCommentSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl CommentSource for HttpCommentSource {
    fn fetch(&self, document_id: &str) -> Result<Vec<Comment>> {
        info!(document_id, "fetching comments");
        let response = self
            .client
            .post(&self.url)
            .json(&CommentsRequest { document_id })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let body = response.text()?;
        parse_comments(&body, document_id)
    }
}

/// Reads comments from a local JSON file.
#[derive(Debug, Clone)]
pub struct FileCommentSource {
    path: PathBuf,
}

impl FileCommentSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CommentSource for FileCommentSource {
    fn fetch(&self, document_id: &str) -> Result<Vec<Comment>> {
        info!(document_id, path = %self.path.display(), "reading comments file");
        let body = std::fs::read_to_string(&self.path).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        parse_comments(&body, document_id)
    }
}

/// Source for the configured `comments_url`, if one is set.
pub fn configured_source(
    location: Option<&str>,
    timeout: Duration,
) -> Result<Box<dyn CommentSource>> {
    let location = location
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or(SourceError::NoEndpoint)?;
    source_for(location, timeout)
}

/// Pick a source for a configured location: http(s) URLs are fetched,
/// anything else is read as a file path.
pub fn source_for(location: &str, timeout: Duration) -> Result<Box<dyn CommentSource>> {
    match url::Url::parse(location) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            Ok(Box::new(HttpCommentSource::new(location, timeout)?))
        }
        _ => Ok(Box::new(FileCommentSource::new(location))),
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "expected string or number, found {other}"
        ))),
    }
}

/// Display fields: `null` reads as an empty string.
fn string_or_null<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_string_or_number(deserializer)?.unwrap_or_default())
}

fn opt_string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(de::Error::custom(format!(
            "expected string or number, found {other}"
        ))),
    }
}
