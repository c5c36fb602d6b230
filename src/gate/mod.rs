use thiserror::Error;
use tracing::warn;

/// Query parameter carrying the document identifier in a portal link.
const DOCUMENT_ID_PARAM: &str = "documentId";

/// Errors raised before the portal may start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("No DocumentID provided. Example: --document-id mydoc-1234")]
    MissingDocumentId,
    #[error("Invalid character in DocumentID: '{0}'")]
    InvalidCharacter(char),
    #[error("DocumentID must not contain '..'")]
    ParentReference,
    #[error("invalid portal URL: {0}")]
    InvalidUrl(String),
}

pub type Result<T> = std::result::Result<T, GateError>;

/// Validate a document identifier.
///
/// The identifier becomes a file name, so only alphanumerics, dash,
/// underscore and dot are allowed, and `..` is rejected.
pub fn validate_document_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(GateError::MissingDocumentId);
    }

    for ch in id.chars() {
        if !ch.is_alphanumeric() && !matches!(ch, '-' | '_' | '.') {
            return Err(GateError::InvalidCharacter(ch));
        }
    }

    if id.contains("..") {
        return Err(GateError::ParentReference);
    }

    Ok(())
}

/// Extract the `documentId` query parameter from a portal link.
///
/// The parameter name is matched case-insensitively.
pub fn document_id_from_url(link: &str) -> Result<Option<String>> {
    let parsed = url::Url::parse(link).map_err(|e| GateError::InvalidUrl(e.to_string()))?;
    Ok(parsed
        .query_pairs()
        .find(|(k, _)| k.eq_ignore_ascii_case(DOCUMENT_ID_PARAM))
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

/// Resolve the document identifier from an explicit flag or a portal link.
///
/// The explicit flag wins when both are given.
pub fn resolve_document_id(explicit: Option<&str>, link: Option<&str>) -> Result<String> {
    let id = match (explicit.map(str::trim).filter(|s| !s.is_empty()), link) {
        (Some(id), _) => id.to_string(),
        (None, Some(link)) => document_id_from_url(link)?.ok_or(GateError::MissingDocumentId)?,
        (None, None) => return Err(GateError::MissingDocumentId),
    };
    validate_document_id(&id)?;
    Ok(id)
}

/// Optional access phrase shown before the portal.
///
/// Compared by plain string equality. This only hides the page; it is not
/// access control.
#[derive(Debug, Clone)]
pub struct AccessGate {
    phrase: Option<String>,
    unlocked: bool,
}

impl AccessGate {
    pub fn new(phrase: Option<String>) -> Self {
        let phrase = phrase.filter(|p| !p.is_empty());
        let unlocked = phrase.is_none();
        Self { phrase, unlocked }
    }

    pub fn is_locked(&self) -> bool {
        !self.unlocked
    }

    /// Try an entered phrase. Returns `true` once the gate is open.
    pub fn try_unlock(&mut self, entered: &str) -> bool {
        if self.unlocked {
            return true;
        }
        if self.phrase.as_deref() == Some(entered) {
            self.unlocked = true;
        } else {
            warn!("incorrect access phrase entered");
        }
        self.unlocked
    }
}
