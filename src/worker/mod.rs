//! Background workers for the three one-shot requests of a session.
//!
//! Each request runs on its own thread and reports back over a channel that
//! the event loop drains between frames, so no handler blocks input.

use crossbeam_channel::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::error;

use crate::Comment;
use crate::document::{DocumentError, DocumentLoader, LoadedDocument};
use crate::source::{CommentSource, SourceError};
use crate::submission::{SubmissionError, SubmissionPayload, SubmissionSink};

/// Completion notifications delivered to the event loop.
#[derive(Debug)]
pub enum PortalEvent {
    CommentsLoaded(Result<Vec<Comment>, SourceError>),
    DocumentLoaded(Result<LoadedDocument, DocumentError>),
    Submitted(Result<(), SubmissionError>),
}

/// Fetch the comment list for a document.
pub fn spawn_comment_fetch(
    source: Arc<dyn CommentSource>,
    document_id: String,
    tx: Sender<PortalEvent>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let result = source.fetch(&document_id);
        // The receiver is gone once the page is closed; the result is dropped.
        let _ = tx.send(PortalEvent::CommentsLoaded(result));
    })
}

/// Start the comment fetch, or report straight away why there is no source.
///
/// A missing source leaves the comment panel empty; the session still runs.
pub fn start_comment_fetch(
    source: Result<Arc<dyn CommentSource>, SourceError>,
    document_id: String,
    tx: Sender<PortalEvent>,
) -> Option<JoinHandle<()>> {
    match source {
        Ok(source) => Some(spawn_comment_fetch(source, document_id, tx)),
        Err(e) => {
            error!(document_id = %document_id, error = %e, "no comment source");
            let _ = tx.send(PortalEvent::CommentsLoaded(Err(e)));
            None
        }
    }
}

/// Load the document and emit the "loaded" notification.
pub fn spawn_document_load(
    loader: Arc<dyn DocumentLoader>,
    document_id: String,
    tx: Sender<PortalEvent>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let result = loader.load(&document_id);
        let _ = tx.send(PortalEvent::DocumentLoaded(result));
    })
}

/// Send an assembled payload to the submission sink.
pub fn spawn_submission(
    sink: Arc<dyn SubmissionSink>,
    payload: SubmissionPayload,
    tx: Sender<PortalEvent>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let result = sink.submit(&payload);
        let _ = tx.send(PortalEvent::Submitted(result));
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FileDocumentLoader;
    use crate::source::FileCommentSource;
    use chrono::Utc;

    struct RejectingSink;

    impl SubmissionSink for RejectingSink {
        fn submit(&self, _payload: &SubmissionPayload) -> crate::submission::Result<()> {
            Err(SubmissionError::Status(503))
        }
    }

    #[test]
    fn comment_fetch_reports_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("comments.json");
        std::fs::write(&path, r#"[{"CommentID": "c1", "CommentText": "hi"}]"#).unwrap();

        let (tx, rx) = crossbeam_channel::unbounded();
        spawn_comment_fetch(Arc::new(FileCommentSource::new(&path)), "doc".into(), tx)
            .join()
            .unwrap();

        match rx.recv().unwrap() {
            PortalEvent::CommentsLoaded(Ok(comments)) => assert_eq!(comments.len(), 1),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn missing_source_reported_without_thread() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = start_comment_fetch(Err(SourceError::NoEndpoint), "doc".into(), tx);

        assert!(handle.is_none());
        assert!(matches!(
            rx.recv().unwrap(),
            PortalEvent::CommentsLoaded(Err(SourceError::NoEndpoint))
        ));
    }

    #[test]
    fn document_load_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        spawn_document_load(Arc::new(FileDocumentLoader::new(dir.path())), "missing".into(), tx)
            .join()
            .unwrap();

        assert!(matches!(
            rx.recv().unwrap(),
            PortalEvent::DocumentLoaded(Err(DocumentError::NotFound(_)))
        ));
    }

    #[test]
    fn submission_failure_is_reported() {
        let payload = SubmissionPayload {
            document_id: "doc".into(),
            reviewer_name: "Jane".into(),
            submitted_at: Utc::now(),
            comments: Vec::new(),
        };
        let (tx, rx) = crossbeam_channel::unbounded();
        spawn_submission(Arc::new(RejectingSink), payload, tx)
            .join()
            .unwrap();

        assert!(matches!(
            rx.recv().unwrap(),
            PortalEvent::Submitted(Err(SubmissionError::Status(503)))
        ));
    }

    #[test]
    fn closed_receiver_does_not_panic() {
        let (tx, rx) = crossbeam_channel::unbounded();
        drop(rx);
        let dir = tempfile::tempdir().unwrap();
        spawn_document_load(Arc::new(FileDocumentLoader::new(dir.path())), "x".into(), tx)
            .join()
            .unwrap();
    }
}
