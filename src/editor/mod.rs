use thiserror::Error;
use tracing::{debug, warn};

use crate::CommentState;
use crate::highlight::HighlightTarget;
use crate::progress::ProgressIndicator;
use crate::store::CommentStore;

/// Reasons a response editor rejects an action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    #[error("Enter a response before marking this comment complete")]
    EmptyResponse,
    #[error("Comment is complete; reopen it to edit the response")]
    Locked,
}

pub type Result<T> = std::result::Result<T, EditorError>;

/// Everything an editor touches when its comment changes state.
pub struct EditorContext<'a, H: HighlightTarget + ?Sized> {
    pub store: &'a mut CommentStore,
    pub progress: &'a mut ProgressIndicator,
    pub highlight: &'a mut H,
}

/// Interactive unit bound to one comment.
///
/// Focus and blur drive the transient highlight; the completion action drives
/// the durable state. The editor keeps no copy of the comment, only its id and
/// display position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEditor {
    comment_id: String,
    index: usize,
    focused: bool,
}

impl ResponseEditor {
    pub fn new(comment_id: impl Into<String>, index: usize) -> Self {
        Self {
            comment_id: comment_id.into(),
            index,
            focused: false,
        }
    }

    /// Create one editor per stored comment.
    pub fn for_store(store: &CommentStore) -> Vec<Self> {
        store
            .comments()
            .iter()
            .enumerate()
            .map(|(index, c)| Self::new(c.id.clone(), index))
            .collect()
    }

    pub fn comment_id(&self) -> &str {
        &self.comment_id
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Editor gains focus. Untouched comments move to in-progress.
    pub fn focus<H: HighlightTarget + ?Sized>(
        &mut self,
        ctx: &mut EditorContext<'_, H>,
    ) -> Option<CommentState> {
        let (state, reference_key) = self.snapshot(ctx.store)?;
        self.focused = true;

        let state = match state {
            CommentState::Untouched => self.transition(ctx, CommentState::InProgress),
            other => other,
        };
        ctx.highlight.set_highlight(reference_key.as_deref(), true);
        Some(state)
    }

    /// Editor loses focus. An in-progress comment with blank text reverts to untouched.
    pub fn blur<H: HighlightTarget + ?Sized>(
        &mut self,
        ctx: &mut EditorContext<'_, H>,
    ) -> Option<CommentState> {
        let (state, reference_key) = self.snapshot(ctx.store)?;
        self.focused = false;

        let blank = ctx
            .store
            .find(&self.comment_id)
            .is_some_and(|c| !c.has_response());
        let state = match state {
            CommentState::InProgress if blank => self.transition(ctx, CommentState::Untouched),
            other => other,
        };
        ctx.highlight.set_highlight(reference_key.as_deref(), false);
        Some(state)
    }

    /// Replace the response text.
    ///
    /// Rejected while the comment is complete. Typing into an untouched
    /// comment starts work on it.
    pub fn set_text<H: HighlightTarget + ?Sized>(
        &mut self,
        ctx: &mut EditorContext<'_, H>,
        text: &str,
    ) -> Result<()> {
        let Some((state, _)) = self.snapshot(ctx.store) else {
            return Ok(());
        };
        if state == CommentState::Complete {
            return Err(EditorError::Locked);
        }

        ctx.store.set_response(&self.comment_id, text);
        if state == CommentState::Untouched && !text.trim().is_empty() {
            self.transition(ctx, CommentState::InProgress);
        }
        Ok(())
    }

    /// The "mark complete" action.
    ///
    /// Completes the comment when its response is non-blank; on a complete
    /// comment it reopens it instead.
    pub fn toggle_complete<H: HighlightTarget + ?Sized>(
        &mut self,
        ctx: &mut EditorContext<'_, H>,
    ) -> Result<CommentState> {
        let Some((state, has_response)) = ctx
            .store
            .find(&self.comment_id)
            .map(|c| (c.state, c.has_response()))
        else {
            return Ok(CommentState::Untouched);
        };

        match state {
            CommentState::Complete => Ok(self.transition(ctx, CommentState::InProgress)),
            _ if !has_response => {
                warn!(comment_id = %self.comment_id, "completion rejected, response is blank");
                Err(EditorError::EmptyResponse)
            }
            _ => Ok(self.transition(ctx, CommentState::Complete)),
        }
    }

    fn snapshot(&self, store: &CommentStore) -> Option<(CommentState, Option<String>)> {
        store
            .find(&self.comment_id)
            .map(|c| (c.state, c.reference_key.clone()))
    }

    fn transition<H: HighlightTarget + ?Sized>(
        &self,
        ctx: &mut EditorContext<'_, H>,
        to: CommentState,
    ) -> CommentState {
        if ctx.store.set_state(&self.comment_id, to) {
            ctx.progress.set_step_state(self.index, to);
            debug!(comment_id = %self.comment_id, state = ?to, "comment state changed");
        }
        ctx.store
            .get_state(&self.comment_id)
            .unwrap_or(CommentState::Untouched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Comment, StepCategory};

    /// Records every highlight call.
    #[derive(Default)]
    struct RecordingHighlight {
        calls: Vec<(Option<String>, bool)>,
    }

    impl HighlightTarget for RecordingHighlight {
        fn set_highlight(&mut self, reference_key: Option<&str>, on: bool) {
            self.calls.push((reference_key.map(str::to_string), on));
        }
    }

    struct Fixture {
        store: CommentStore,
        progress: ProgressIndicator,
        highlight: RecordingHighlight,
        editors: Vec<ResponseEditor>,
    }

    impl Fixture {
        fn new() -> Self {
            let store = CommentStore::new(vec![
                Comment::new("c1", Some("r1".to_string()), "Clarify clause 1"),
                Comment::new("c2", Some("r2".to_string()), "Typo in clause 2"),
            ]);
            let progress = ProgressIndicator::for_store(&store);
            let editors = ResponseEditor::for_store(&store);
            Self {
                store,
                progress,
                highlight: RecordingHighlight::default(),
                editors,
            }
        }

        fn with<R>(
            &mut self,
            idx: usize,
            f: impl FnOnce(&mut ResponseEditor, &mut EditorContext<'_, RecordingHighlight>) -> R,
        ) -> R {
            let mut ctx = EditorContext {
                store: &mut self.store,
                progress: &mut self.progress,
                highlight: &mut self.highlight,
            };
            f(&mut self.editors[idx], &mut ctx)
        }

        fn state(&self, idx: usize) -> CommentState {
            self.store.get(idx).unwrap().state
        }

        fn step(&self, idx: usize) -> StepCategory {
            self.progress.step(idx).unwrap()
        }
    }

    #[test]
    fn focus_moves_untouched_to_in_progress() {
        let mut fx = Fixture::new();
        let state = fx.with(0, |e, ctx| e.focus(ctx));

        assert_eq!(state, Some(CommentState::InProgress));
        assert_eq!(fx.step(0), StepCategory::Active);
        assert_eq!(fx.highlight.calls, vec![(Some("r1".to_string()), true)]);
        assert!(fx.editors[0].is_focused());
    }

    #[test]
    fn blur_without_text_reverts_to_untouched() {
        let mut fx = Fixture::new();
        fx.with(0, |e, ctx| e.focus(ctx));
        let state = fx.with(0, |e, ctx| e.blur(ctx));

        assert_eq!(state, Some(CommentState::Untouched));
        assert_eq!(fx.step(0), StepCategory::Neutral);
        assert_eq!(
            fx.highlight.calls.last(),
            Some(&(Some("r1".to_string()), false))
        );
    }

    #[test]
    fn blur_with_whitespace_only_reverts_to_untouched() {
        let mut fx = Fixture::new();
        fx.with(0, |e, ctx| e.focus(ctx));
        fx.with(0, |e, ctx| e.set_text(ctx, "   ")).unwrap();
        let state = fx.with(0, |e, ctx| e.blur(ctx));
        assert_eq!(state, Some(CommentState::Untouched));
    }

    #[test]
    fn blur_with_text_stays_in_progress() {
        let mut fx = Fixture::new();
        fx.with(0, |e, ctx| e.focus(ctx));
        fx.with(0, |e, ctx| e.set_text(ctx, "draft")).unwrap();
        let state = fx.with(0, |e, ctx| e.blur(ctx));

        assert_eq!(state, Some(CommentState::InProgress));
        assert_eq!(fx.step(0), StepCategory::Active);
        assert_eq!(
            fx.highlight.calls.last(),
            Some(&(Some("r1".to_string()), false))
        );
    }

    #[test]
    fn complete_with_empty_text_is_rejected() {
        let mut fx = Fixture::new();

        // Untouched
        let err = fx.with(0, |e, ctx| e.toggle_complete(ctx)).unwrap_err();
        assert_eq!(err, EditorError::EmptyResponse);
        assert_eq!(fx.state(0), CommentState::Untouched);
        assert_eq!(fx.step(0), StepCategory::Neutral);

        // In progress
        fx.with(0, |e, ctx| e.focus(ctx));
        let err = fx.with(0, |e, ctx| e.toggle_complete(ctx)).unwrap_err();
        assert_eq!(err, EditorError::EmptyResponse);
        assert_eq!(fx.state(0), CommentState::InProgress);
        assert_ne!(fx.step(0), StepCategory::Done);
    }

    #[test]
    fn complete_with_text_then_toggle_reopens() {
        let mut fx = Fixture::new();
        fx.with(1, |e, ctx| e.focus(ctx));
        fx.with(1, |e, ctx| e.set_text(ctx, "fixed")).unwrap();

        let state = fx.with(1, |e, ctx| e.toggle_complete(ctx)).unwrap();
        assert_eq!(state, CommentState::Complete);
        assert_eq!(fx.step(1), StepCategory::Done);

        let state = fx.with(1, |e, ctx| e.toggle_complete(ctx)).unwrap();
        assert_eq!(state, CommentState::InProgress);
        assert_eq!(fx.step(1), StepCategory::Active);
        assert_eq!(fx.store.get(1).unwrap().response_text, "fixed");
    }

    #[test]
    fn complete_survives_focus_and_blur() {
        let mut fx = Fixture::new();
        fx.with(0, |e, ctx| e.focus(ctx));
        fx.with(0, |e, ctx| e.set_text(ctx, "ok")).unwrap();
        fx.with(0, |e, ctx| e.toggle_complete(ctx)).unwrap();

        fx.with(0, |e, ctx| e.blur(ctx));
        assert_eq!(fx.state(0), CommentState::Complete);
        fx.with(0, |e, ctx| e.focus(ctx));
        assert_eq!(fx.state(0), CommentState::Complete);
        assert_eq!(fx.step(0), StepCategory::Done);

        // Highlight still toggles
        assert_eq!(
            fx.highlight.calls.last(),
            Some(&(Some("r1".to_string()), true))
        );
    }

    #[test]
    fn editing_complete_comment_is_locked() {
        let mut fx = Fixture::new();
        fx.with(0, |e, ctx| e.set_text(ctx, "ok")).unwrap();
        fx.with(0, |e, ctx| e.toggle_complete(ctx)).unwrap();

        let err = fx.with(0, |e, ctx| e.set_text(ctx, "")).unwrap_err();
        assert_eq!(err, EditorError::Locked);
        assert_eq!(fx.store.get(0).unwrap().response_text, "ok");
    }

    #[test]
    fn typing_into_untouched_starts_work() {
        let mut fx = Fixture::new();
        fx.with(1, |e, ctx| e.set_text(ctx, "x")).unwrap();
        assert_eq!(fx.state(1), CommentState::InProgress);
        assert_eq!(fx.step(1), StepCategory::Active);
    }

    #[test]
    fn editors_only_touch_their_own_step() {
        let mut fx = Fixture::new();
        fx.with(0, |e, ctx| e.focus(ctx));
        assert_eq!(fx.step(1), StepCategory::Neutral);
        assert_eq!(fx.state(1), CommentState::Untouched);
    }

    #[test]
    fn steps_always_project_states() {
        let mut fx = Fixture::new();
        fx.with(0, |e, ctx| e.focus(ctx));
        fx.with(0, |e, ctx| e.set_text(ctx, "a")).unwrap();
        fx.with(0, |e, ctx| e.toggle_complete(ctx)).unwrap();
        fx.with(0, |e, ctx| e.blur(ctx));
        fx.with(1, |e, ctx| e.focus(ctx));
        fx.with(1, |e, ctx| e.blur(ctx));

        for (idx, comment) in fx.store.comments().iter().enumerate() {
            assert_eq!(fx.step(idx), StepCategory::from(comment.state));
        }
    }
}
