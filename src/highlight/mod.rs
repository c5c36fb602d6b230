use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::document::{LoadedDocument, Segment};

/// Default window in which an identical highlight request is coalesced.
pub const DEFAULT_COALESCE_WINDOW: Duration = Duration::from_millis(300);

/// Something that can toggle the highlight on a referenced passage.
pub trait HighlightTarget {
    /// Turn the highlight for `reference_key` on or off.
    ///
    /// Must never fail: unresolvable keys and a missing document are no-ops.
    fn set_highlight(&mut self, reference_key: Option<&str>, on: bool);
}

/// What a highlight request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightOutcome {
    /// Highlight applied and the view asked to center on this line.
    Applied { center_line: usize },
    /// Highlight removed.
    Cleared,
    /// Identical request within the coalesce window; nothing changed.
    Coalesced,
    /// No document loaded, no key, or key not found.
    Ignored,
}

/// Tracks highlighted passages inside the loaded document.
///
/// Highlights are a set of reference keys, so repeating a request never
/// stacks. Scrolling is exposed as a pending request the view consumes.
#[derive(Debug)]
pub struct HighlightController {
    document: Option<LoadedDocument>,
    highlighted: HashSet<String>,
    scroll_request: Option<usize>,
    last_applied: Option<(String, Instant)>,
    coalesce_window: Duration,
}

impl HighlightController {
    pub fn new(coalesce_window: Duration) -> Self {
        Self {
            document: None,
            highlighted: HashSet::new(),
            scroll_request: None,
            last_applied: None,
            coalesce_window,
        }
    }

    /// Attach the loaded document. Highlights from a previous document are dropped.
    pub fn attach_document(&mut self, document: LoadedDocument) {
        self.document = Some(document);
        self.highlighted.clear();
        self.scroll_request = None;
        self.last_applied = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    pub fn document(&self) -> Option<&LoadedDocument> {
        self.document.as_ref()
    }

    /// Whether a reference key resolves in the loaded document.
    pub fn resolves(&self, reference_key: &str) -> bool {
        self.document
            .as_ref()
            .is_some_and(|doc| doc.anchor(reference_key).is_some())
    }

    pub fn is_highlighted(&self, reference_key: &str) -> bool {
        self.highlighted.contains(reference_key)
    }

    /// Whether a rendered segment falls inside a highlighted anchor.
    pub fn segment_highlighted(&self, segment: &Segment) -> bool {
        segment
            .anchor
            .as_deref()
            .is_some_and(|key| self.highlighted.contains(key))
    }

    /// Whether a whole line is highlighted because a text-less anchor marks it.
    pub fn line_highlighted(&self, line: usize) -> bool {
        let Some(doc) = &self.document else {
            return false;
        };
        self.highlighted.iter().any(|key| {
            doc.anchor(key)
                .is_some_and(|a| !a.has_text && a.contains_line(line))
        })
    }

    /// Take the pending scroll request, if any.
    pub fn take_scroll_request(&mut self) -> Option<usize> {
        self.scroll_request.take()
    }

    /// Apply a highlight request at a given instant.
    pub fn set_highlight_at(
        &mut self,
        reference_key: Option<&str>,
        on: bool,
        now: Instant,
    ) -> HighlightOutcome {
        let Some(doc) = &self.document else {
            debug!(?reference_key, on, "highlight ignored, document not loaded");
            return HighlightOutcome::Ignored;
        };
        let Some(key) = reference_key.filter(|k| !k.is_empty()) else {
            return HighlightOutcome::Ignored;
        };
        let Some(anchor) = doc.anchor(key) else {
            debug!(reference_key = key, "highlight target not found");
            return HighlightOutcome::Ignored;
        };

        if !on {
            self.highlighted.remove(key);
            return HighlightOutcome::Cleared;
        }

        if self.highlighted.contains(key)
            && let Some((last_key, at)) = &self.last_applied
            && last_key == key
            && now.saturating_duration_since(*at) < self.coalesce_window
        {
            return HighlightOutcome::Coalesced;
        }

        let center_line = anchor.center_line();
        self.highlighted.insert(key.to_string());
        self.scroll_request = Some(center_line);
        self.last_applied = Some((key.to_string(), now));
        HighlightOutcome::Applied { center_line }
    }
}

impl Default for HighlightController {
    fn default() -> Self {
        Self::new(DEFAULT_COALESCE_WINDOW)
    }
}

impl HighlightTarget for HighlightController {
    fn set_highlight(&mut self, reference_key: Option<&str>, on: bool) {
        self.set_highlight_at(reference_key, on, Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_html;

    fn loaded() -> HighlightController {
        let mut controller = HighlightController::default();
        controller.attach_document(parse_html(
            r#"<p>Intro</p><p><a name="r1">first passage</a></p><p><a name="r2">second</a></p><p><a name="r3"></a>marked line</p>"#,
        ));
        controller
    }

    #[test]
    fn noop_before_document_loaded() {
        let mut controller = HighlightController::default();
        let outcome = controller.set_highlight_at(Some("r1"), true, Instant::now());
        assert_eq!(outcome, HighlightOutcome::Ignored);
        assert!(!controller.is_highlighted("r1"));
        assert_eq!(controller.take_scroll_request(), None);
    }

    #[test]
    fn absent_key_is_noop() {
        let mut controller = loaded();
        assert_eq!(
            controller.set_highlight_at(None, true, Instant::now()),
            HighlightOutcome::Ignored
        );
        assert_eq!(
            controller.set_highlight_at(Some(""), true, Instant::now()),
            HighlightOutcome::Ignored
        );
    }

    #[test]
    fn unknown_key_leaves_other_highlights() {
        let mut controller = loaded();
        let now = Instant::now();
        controller.set_highlight_at(Some("r1"), true, now);
        controller.take_scroll_request();

        let outcome = controller.set_highlight_at(Some("rX"), true, now);
        assert_eq!(outcome, HighlightOutcome::Ignored);
        assert!(controller.is_highlighted("r1"));
        assert_eq!(controller.take_scroll_request(), None);
    }

    #[test]
    fn on_highlights_and_requests_scroll() {
        let mut controller = loaded();
        let outcome = controller.set_highlight_at(Some("r2"), true, Instant::now());

        let HighlightOutcome::Applied { center_line } = outcome else {
            panic!("expected highlight to apply, got {outcome:?}");
        };
        assert!(controller.is_highlighted("r2"));
        assert_eq!(controller.take_scroll_request(), Some(center_line));
        // Request is consumed
        assert_eq!(controller.take_scroll_request(), None);
    }

    #[test]
    fn off_clears_without_scrolling() {
        let mut controller = loaded();
        let now = Instant::now();
        controller.set_highlight_at(Some("r1"), true, now);
        controller.take_scroll_request();

        assert_eq!(
            controller.set_highlight_at(Some("r1"), false, now),
            HighlightOutcome::Cleared
        );
        assert!(!controller.is_highlighted("r1"));
        assert_eq!(controller.take_scroll_request(), None);
    }

    #[test]
    fn rapid_repeat_is_coalesced() {
        let mut controller = loaded();
        let start = Instant::now();
        controller.set_highlight_at(Some("r1"), true, start);
        controller.take_scroll_request();

        let outcome =
            controller.set_highlight_at(Some("r1"), true, start + Duration::from_millis(100));
        assert_eq!(outcome, HighlightOutcome::Coalesced);
        assert_eq!(controller.take_scroll_request(), None);
        assert!(controller.is_highlighted("r1"));
    }

    #[test]
    fn repeat_after_window_scrolls_again() {
        let mut controller = loaded();
        let start = Instant::now();
        controller.set_highlight_at(Some("r1"), true, start);

        let outcome =
            controller.set_highlight_at(Some("r1"), true, start + Duration::from_millis(400));
        assert!(matches!(outcome, HighlightOutcome::Applied { .. }));
        assert_eq!(controller.highlighted.len(), 1, "highlights must not stack");
    }

    #[test]
    fn refocus_after_clear_is_not_coalesced() {
        let mut controller = loaded();
        let start = Instant::now();
        controller.set_highlight_at(Some("r1"), true, start);
        controller.set_highlight_at(Some("r1"), false, start);

        let outcome =
            controller.set_highlight_at(Some("r1"), true, start + Duration::from_millis(50));
        assert!(matches!(outcome, HighlightOutcome::Applied { .. }));
    }

    #[test]
    fn empty_anchor_highlights_its_line() {
        let mut controller = loaded();
        controller.set_highlight(Some("r3"), true);

        let doc = controller.document().unwrap();
        let line = doc.anchor("r3").unwrap().start_line;
        assert_eq!(doc.lines[line].text(), "marked line");
        assert!(controller.line_highlighted(line));
        assert!(!controller.line_highlighted(0));
    }

    #[test]
    fn attach_document_resets_highlights() {
        let mut controller = loaded();
        controller.set_highlight(Some("r1"), true);
        controller.attach_document(parse_html("<p>other</p>"));
        assert!(!controller.is_highlighted("r1"));
        assert!(!controller.resolves("r1"));
    }
}
