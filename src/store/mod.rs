use crate::{Comment, CommentState};
use tracing::debug;

/// In-memory comment store for one document session.
///
/// Holds comments in display order. Order never changes and no comment is
/// added or removed after construction; only response text and state mutate.
#[derive(Debug, Clone, Default)]
pub struct CommentStore {
    comments: Vec<Comment>,
}

impl CommentStore {
    /// Create a store from the fetched comments, keeping their order.
    pub fn new(comments: Vec<Comment>) -> Self {
        Self { comments }
    }

    /// All comments in display order.
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    /// Get the comment at a display position.
    pub fn get(&self, index: usize) -> Option<&Comment> {
        self.comments.get(index)
    }

    /// Display position of the comment with the given id.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.comments.iter().position(|c| c.id == id)
    }

    /// Look up a comment by id.
    pub fn find(&self, id: &str) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == id)
    }

    /// Get the state of a comment, `None` if the id is unknown.
    pub fn get_state(&self, id: &str) -> Option<CommentState> {
        self.find(id).map(|c| c.state)
    }

    /// Replace the response text of one comment.
    ///
    /// Unknown ids are ignored. Returns `true` if a record was updated.
    pub fn set_response(&mut self, id: &str, text: &str) -> bool {
        match self.comments.iter_mut().find(|c| c.id == id) {
            Some(comment) => {
                comment.response_text = text.to_string();
                true
            }
            None => {
                debug!(comment_id = id, "set_response for unknown comment ignored");
                false
            }
        }
    }

    /// Set the state of one comment.
    ///
    /// Unknown ids are ignored, as is `Complete` for a comment whose response
    /// is blank. Returns `true` if a record was updated.
    pub fn set_state(&mut self, id: &str, state: CommentState) -> bool {
        let Some(comment) = self.comments.iter_mut().find(|c| c.id == id) else {
            debug!(comment_id = id, "set_state for unknown comment ignored");
            return false;
        };

        if state == CommentState::Complete && !comment.has_response() {
            debug!(comment_id = id, "refusing to complete comment with blank response");
            return false;
        }

        comment.state = state;
        true
    }

    /// Ids of comments whose response text is still blank, in display order.
    pub fn missing_responses(&self) -> Vec<&str> {
        self.comments
            .iter()
            .filter(|c| !c.has_response())
            .map(|c| c.id.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_store() -> CommentStore {
        CommentStore::new(vec![
            Comment::new("c1", Some("r1".to_string()), "First remark"),
            Comment::new("c2", None, "Second remark"),
            Comment::new("c3", Some("r3".to_string()), "Third remark"),
        ])
    }

    #[test]
    fn new_preserves_order_and_initial_state() {
        let store = sample_store();
        let ids: Vec<&str> = store.comments().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);

        for comment in store.comments() {
            assert_eq!(comment.state, CommentState::Untouched);
            assert_eq!(comment.response_text, "");
        }
    }

    #[test]
    fn set_response_updates_only_target() {
        let mut store = sample_store();
        assert!(store.set_response("c2", "Agreed"));

        assert_eq!(store.find("c2").unwrap().response_text, "Agreed");
        assert_eq!(store.find("c1").unwrap().response_text, "");
        assert_eq!(store.find("c3").unwrap().response_text, "");
    }

    #[test]
    fn set_response_unknown_id_is_noop() {
        let mut store = sample_store();
        assert!(!store.set_response("nope", "text"));
        assert!(store.comments().iter().all(|c| c.response_text.is_empty()));
    }

    #[test]
    fn set_state_unknown_id_is_noop() {
        let mut store = sample_store();
        assert!(!store.set_state("nope", CommentState::InProgress));
        assert!(store
            .comments()
            .iter()
            .all(|c| c.state == CommentState::Untouched));
    }

    #[test]
    fn set_state_refuses_complete_with_blank_response() {
        let mut store = sample_store();
        store.set_response("c1", "   ");

        assert!(!store.set_state("c1", CommentState::Complete));
        assert_eq!(store.get_state("c1"), Some(CommentState::Untouched));

        store.set_response("c1", "ok");
        assert!(store.set_state("c1", CommentState::Complete));
        assert_eq!(store.get_state("c1"), Some(CommentState::Complete));
    }

    #[test]
    fn position_and_get_agree() {
        let store = sample_store();
        let idx = store.position("c3").unwrap();
        assert_eq!(idx, 2);
        assert_eq!(store.get(idx).unwrap().id, "c3");
        assert_eq!(store.position("missing"), None);
    }

    #[test]
    fn missing_responses_lists_blank_entries_in_order() {
        let mut store = sample_store();
        store.set_response("c2", "fine");
        store.set_response("c3", "  \n ");

        assert_eq!(store.missing_responses(), vec!["c1", "c3"]);
    }
}
