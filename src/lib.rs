pub mod cli;
pub mod config;
pub mod document;
pub mod editor;
pub mod gate;
pub mod highlight;
pub mod portal;
pub mod progress;
pub mod source;
pub mod store;
pub mod submission;
pub mod tui;
pub mod worker;

/// Review state of a single comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommentState {
    #[default]
    Untouched,
    InProgress,
    Complete,
}

/// Visual category of a progress step.
///
/// Always a projection of [`CommentState`], never stored independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepCategory {
    #[default]
    Neutral,
    Active,
    Done,
}

impl From<CommentState> for StepCategory {
    fn from(state: CommentState) -> Self {
        match state {
            CommentState::Untouched => StepCategory::Neutral,
            CommentState::InProgress => StepCategory::Active,
            CommentState::Complete => StepCategory::Done,
        }
    }
}

/// A reviewable remark tied to a passage in the loaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: String,
    /// Anchor name of the passage in the document, if any.
    pub reference_key: Option<String>,
    pub author: String,
    pub created_at: String,
    pub text: String,
    /// Reviewer's response. Empty means no response.
    pub response_text: String,
    pub state: CommentState,
}

impl Comment {
    /// Create an untouched comment with an empty response.
    pub fn new(id: impl Into<String>, reference_key: Option<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reference_key,
            author: String::new(),
            created_at: String::new(),
            text: text.into(),
            response_text: String::new(),
            state: CommentState::Untouched,
        }
    }

    /// Whether the response has any non-whitespace content.
    pub fn has_response(&self) -> bool {
        !self.response_text.trim().is_empty()
    }
}

/// Review progress summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReviewProgress {
    pub total: usize,
    pub done: usize,
    pub active: usize,
    pub neutral: usize,
}

impl ReviewProgress {
    /// Percentage of steps marked done, 0 when there are no steps.
    pub fn percent_done(&self) -> f64 {
        if self.total > 0 {
            (self.done as f64 / self.total as f64) * 100.0
        } else {
            0.0
        }
    }
}
