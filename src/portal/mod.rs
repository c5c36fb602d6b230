use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::document::{DocumentError, LoadedDocument};
use crate::editor::{EditorContext, ResponseEditor};
use crate::highlight::{HighlightController, HighlightTarget};
use crate::progress::ProgressIndicator;
use crate::source::SourceError;
use crate::store::CommentStore;
use crate::submission::{self, SubmissionError, SubmissionPayload};
use crate::{Comment, CommentState};

/// How long informational status messages stay visible.
const INFO_STATUS_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Error,
}

/// Message shown in the status line.
#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub text: String,
    pub kind: StatusKind,
    pub at: Instant,
}

/// Page controller for one document session.
///
/// Owns the comment store, the progress indicator, the highlight controller
/// and one response editor per comment, and routes UI events to them.
#[derive(Debug)]
pub struct Portal {
    document_id: String,
    store: CommentStore,
    progress: ProgressIndicator,
    highlight: HighlightController,
    editors: Vec<ResponseEditor>,
    focused: Option<usize>,
    selected: usize,
    reviewer_name: String,
    comments_loaded: bool,
    document_error: Option<String>,
    submitting: bool,
    submitted: bool,
    status: Option<StatusMessage>,
}

impl Portal {
    pub fn new(
        document_id: impl Into<String>,
        reviewer_name: impl Into<String>,
        coalesce_window: Duration,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            store: CommentStore::default(),
            progress: ProgressIndicator::default(),
            highlight: HighlightController::new(coalesce_window),
            editors: Vec::new(),
            focused: None,
            selected: 0,
            reviewer_name: reviewer_name.into(),
            comments_loaded: false,
            document_error: None,
            submitting: false,
            submitted: false,
            status: None,
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn store(&self) -> &CommentStore {
        &self.store
    }

    pub fn progress(&self) -> &ProgressIndicator {
        &self.progress
    }

    pub fn highlight(&self) -> &HighlightController {
        &self.highlight
    }

    pub fn highlight_mut(&mut self) -> &mut HighlightController {
        &mut self.highlight
    }

    pub fn focused(&self) -> Option<usize> {
        self.focused
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn reviewer_name(&self) -> &str {
        &self.reviewer_name
    }

    /// Why the document could not be loaded, if it failed.
    pub fn document_error(&self) -> Option<&str> {
        self.document_error.as_deref()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    fn set_status(&mut self, kind: StatusKind, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
            at: Instant::now(),
        });
    }

    /// Drop informational messages older than their display time.
    pub fn expire_status(&mut self, now: Instant) {
        let expired = self.status.as_ref().is_some_and(|s| {
            s.kind == StatusKind::Info && now.saturating_duration_since(s.at) >= INFO_STATUS_TTL
        });
        if expired {
            self.status = None;
        }
    }

    /// Populate the session from the comment fetch.
    ///
    /// Only the first successful load is accepted. A failure is logged and
    /// leaves the comment panel empty.
    pub fn on_comments_loaded(&mut self, result: Result<Vec<Comment>, SourceError>) {
        if self.comments_loaded {
            warn!("ignoring repeated comment load");
            return;
        }

        match result {
            Ok(comments) => {
                info!(
                    document_id = %self.document_id,
                    count = comments.len(),
                    "comments loaded"
                );
                self.store = CommentStore::new(comments);
                self.progress = ProgressIndicator::for_store(&self.store);
                self.editors = ResponseEditor::for_store(&self.store);
                self.selected = 0;
                self.focused = None;
                self.comments_loaded = true;
                let count = self.store.len();
                if count == 0 {
                    self.set_status(StatusKind::Info, "No comments for this document");
                } else {
                    self.set_status(StatusKind::Info, format!("Loaded {count} comments"));
                }
            }
            Err(e) => {
                error!(document_id = %self.document_id, error = %e, "error fetching comments");
                self.set_status(StatusKind::Error, format!("Could not load comments: {e}"));
            }
        }
    }

    /// Hand the loaded document to the highlight controller.
    ///
    /// Highlights requested before this point were dropped, so the focused
    /// comment's passage is highlighted now.
    pub fn on_document_loaded(&mut self, result: Result<LoadedDocument, DocumentError>) {
        match result {
            Ok(document) => {
                info!(
                    document_id = %self.document_id,
                    lines = document.lines.len(),
                    "document loaded"
                );
                self.document_error = None;
                self.highlight.attach_document(document);
                if let Some(key) = self
                    .focused
                    .and_then(|idx| self.store.get(idx))
                    .and_then(|c| c.reference_key.clone())
                {
                    self.highlight.set_highlight(Some(&key), true);
                }
            }
            Err(e) => {
                error!(document_id = %self.document_id, error = %e, "error loading document");
                self.document_error = Some(e.to_string());
                self.set_status(StatusKind::Error, format!("Could not load document: {e}"));
            }
        }
    }

    fn with_editor<R>(
        &mut self,
        index: usize,
        f: impl FnOnce(&mut ResponseEditor, &mut EditorContext<'_, HighlightController>) -> R,
    ) -> Option<R> {
        let editor = self.editors.get_mut(index)?;
        let mut ctx = EditorContext {
            store: &mut self.store,
            progress: &mut self.progress,
            highlight: &mut self.highlight,
        };
        Some(f(editor, &mut ctx))
    }

    pub fn select_next(&mut self) {
        if !self.editors.is_empty() && self.selected < self.editors.len() - 1 {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
        }
    }

    /// Focus the editor at `index`, blurring any other focused editor first.
    pub fn focus(&mut self, index: usize) {
        if index >= self.editors.len() || self.focused == Some(index) {
            return;
        }
        self.blur();
        self.with_editor(index, |editor, ctx| editor.focus(ctx));
        self.focused = Some(index);
        self.selected = index;
    }

    pub fn focus_selected(&mut self) {
        self.focus(self.selected);
    }

    /// Blur the focused editor, if any.
    pub fn blur(&mut self) {
        if let Some(index) = self.focused.take() {
            self.with_editor(index, |editor, ctx| editor.blur(ctx));
        }
    }

    /// Text of the focused editor.
    pub fn focused_text(&self) -> Option<&str> {
        self.focused
            .and_then(|idx| self.store.get(idx))
            .map(|c| c.response_text.as_str())
    }

    fn edit_focused(&mut self, edit: impl FnOnce(&mut String)) {
        let Some(index) = self.focused else {
            return;
        };
        let Some(mut text) = self.store.get(index).map(|c| c.response_text.clone()) else {
            return;
        };
        edit(&mut text);
        if let Some(Err(e)) = self.with_editor(index, |editor, ctx| editor.set_text(ctx, &text)) {
            self.set_status(StatusKind::Error, e.to_string());
        }
    }

    /// Type a character into the focused editor.
    pub fn push_char(&mut self, ch: char) {
        self.edit_focused(|text| text.push(ch));
    }

    /// Delete the last character of the focused editor.
    pub fn backspace(&mut self) {
        self.edit_focused(|text| {
            text.pop();
        });
    }

    /// Invoke the "mark complete" action on the comment at `index`.
    pub fn toggle_complete(&mut self, index: usize) -> Option<CommentState> {
        match self.with_editor(index, |editor, ctx| editor.toggle_complete(ctx))? {
            Ok(state) => {
                let label = ProgressIndicator::label(index);
                match state {
                    CommentState::Complete => {
                        self.set_status(StatusKind::Info, format!("Comment {label} marked complete"))
                    }
                    _ => self.set_status(StatusKind::Info, format!("Comment {label} reopened")),
                }
                Some(state)
            }
            Err(e) => {
                self.set_status(StatusKind::Error, e.to_string());
                self.store.get(index).map(|c| c.state)
            }
        }
    }

    /// Toggle completion of the focused comment, or the selected one.
    pub fn toggle_complete_current(&mut self) -> Option<CommentState> {
        self.toggle_complete(self.focused.unwrap_or(self.selected))
    }

    pub fn set_reviewer_name(&mut self, name: impl Into<String>) {
        self.reviewer_name = name.into();
    }

    pub fn push_name_char(&mut self, ch: char) {
        self.reviewer_name.push(ch);
    }

    pub fn name_backspace(&mut self) {
        self.reviewer_name.pop();
    }

    /// Validate and assemble the payload for sending.
    ///
    /// Returns `None` and shows the reason when validation fails or a
    /// submission is already in flight.
    pub fn prepare_submission(&mut self, now: DateTime<Utc>) -> Option<SubmissionPayload> {
        if self.submitting {
            return None;
        }

        match submission::assemble(&self.document_id, &self.store, &self.reviewer_name, now) {
            Ok(payload) => {
                self.submitting = true;
                self.set_status(StatusKind::Info, "Submitting responses…");
                Some(payload)
            }
            Err(e) => {
                warn!(error = %e, "submission blocked");
                self.set_status(StatusKind::Error, e.to_string());
                None
            }
        }
    }

    /// Record the sink's answer. Failures are not retried automatically.
    pub fn on_submission_result(&mut self, result: Result<(), SubmissionError>) {
        self.submitting = false;
        match result {
            Ok(()) => {
                info!(document_id = %self.document_id, "responses submitted");
                self.submitted = true;
                self.set_status(StatusKind::Info, "Responses submitted successfully!");
            }
            Err(e) => {
                error!(document_id = %self.document_id, error = %e, "error submitting responses");
                self.set_status(
                    StatusKind::Error,
                    format!("Submission failed: {e}. Press S to try again."),
                );
            }
        }
    }
}
