use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->|<![^>]*>|<\?[^>]*>").expect("valid comment regex"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(/?)([A-Za-z][A-Za-z0-9]*)([^>]*)>").expect("valid tag regex")
});
static ANCHOR_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|\s)(?:name|id)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid attr regex")
});
static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9A-Fa-f]+|#[0-9]+|[A-Za-z]+);").expect("valid entity regex")
});

/// Tags that end the current display line.
const LINE_BREAK_TAGS: &[&str] = &[
    "br", "div", "li", "tr", "ul", "ol", "table", "section", "article", "blockquote",
];

/// Tags whose closing also leaves a blank line behind.
const PARAGRAPH_TAGS: &[&str] = &["p", "h1", "h2", "h3", "h4", "h5", "h6"];

/// Errors that can occur while loading a document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, DocumentError>;

/// A run of text on a display line, optionally inside a named anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub anchor: Option<String>,
}

/// One display line of the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocLine {
    pub segments: Vec<Segment>,
}

impl DocLine {
    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(|s| s.text.is_empty())
    }

    /// Plain text of the line.
    pub fn text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }

    fn ends_with_space(&self) -> bool {
        self.segments
            .last()
            .map(|s| s.text.ends_with(' '))
            .unwrap_or(true)
    }
}

/// Location of a named anchor in the display lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub start_line: usize,
    pub end_line: usize,
    /// Whether the anchor wraps any text. Empty anchors mark a position only.
    pub has_text: bool,
}

impl Anchor {
    /// Line to center the view on.
    pub fn center_line(&self) -> usize {
        self.start_line + (self.end_line - self.start_line) / 2
    }

    pub fn contains_line(&self, line: usize) -> bool {
        (self.start_line..=self.end_line).contains(&line)
    }
}

/// A document converted to display lines with an anchor index.
#[derive(Debug, Clone, Default)]
pub struct LoadedDocument {
    pub lines: Vec<DocLine>,
    anchors: HashMap<String, Anchor>,
}

impl LoadedDocument {
    /// Resolve an anchor by its reference key.
    pub fn anchor(&self, key: &str) -> Option<&Anchor> {
        self.anchors.get(key)
    }

    /// All anchor keys, sorted.
    pub fn anchor_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.anchors.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

/// Makes a renderable document available for a document identifier.
pub trait DocumentLoader: Send + Sync {
    fn load(&self, document_id: &str) -> Result<LoadedDocument>;
}

/// Loads `<root>/<document_id>.html` from disk.
#[derive(Debug, Clone)]
pub struct FileDocumentLoader {
    root: PathBuf,
}

impl FileDocumentLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the document file for an identifier.
    pub fn path_for(&self, document_id: &str) -> PathBuf {
        self.root.join(format!("{document_id}.html"))
    }
}

impl DocumentLoader for FileDocumentLoader {
    fn load(&self, document_id: &str) -> Result<LoadedDocument> {
        let path = self.path_for(document_id);
        read_document(&path)
    }
}

fn read_document(path: &Path) -> Result<LoadedDocument> {
    if !path.exists() {
        return Err(DocumentError::NotFound(path.to_path_buf()));
    }
    let html = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_html(&html))
}

/// Accumulates display lines while the tag stream is walked.
#[derive(Default)]
struct LineBuilder {
    lines: Vec<DocLine>,
    current: DocLine,
    anchors: HashMap<String, Anchor>,
}

impl LineBuilder {
    fn push_text(&mut self, raw: &str, anchor: Option<&String>) {
        let decoded = decode_entities(raw);
        let mut text = collapse_whitespace(&decoded);
        if self.current.ends_with_space() {
            text = text.trim_start().to_string();
        }
        if text.is_empty() {
            return;
        }
        if let Some(key) = anchor
            && let Some(a) = self.anchors.get_mut(key)
        {
            a.has_text = true;
            a.end_line = self.lines.len();
        }
        self.current.segments.push(Segment {
            text,
            anchor: anchor.cloned(),
        });
    }

    fn open_anchor(&mut self, key: &str) {
        let line = self.lines.len();
        self.anchors.insert(
            key.to_string(),
            Anchor {
                start_line: line,
                end_line: line,
                has_text: false,
            },
        );
    }

    fn break_line(&mut self) {
        if self.current.is_empty() {
            self.current = DocLine::default();
            return;
        }
        let mut line = std::mem::take(&mut self.current);
        if let Some(last) = line.segments.last_mut() {
            let trimmed = last.text.trim_end().len();
            last.text.truncate(trimmed);
        }
        self.lines.push(line);
    }

    fn blank_line(&mut self) {
        self.break_line();
        if self.lines.last().is_some_and(|l| !l.is_empty()) {
            self.lines.push(DocLine::default());
        }
    }

    fn finish(mut self) -> LoadedDocument {
        self.break_line();
        while self.lines.last().is_some_and(DocLine::is_empty) {
            self.lines.pop();
        }
        let last = self.lines.len().saturating_sub(1);
        for anchor in self.anchors.values_mut() {
            anchor.start_line = anchor.start_line.min(last);
            anchor.end_line = anchor.end_line.clamp(anchor.start_line, last.max(anchor.start_line));
        }
        LoadedDocument {
            lines: self.lines,
            anchors: self.anchors,
        }
    }
}

/// Convert HTML into display lines, indexing `<a name=..>` / `<a id=..>` anchors.
///
/// Head, script and style content is dropped. Unknown tags are ignored.
pub fn parse_html(input: &str) -> LoadedDocument {
    let html = COMMENT_RE.replace_all(input, "");
    let mut builder = LineBuilder::default();
    let mut open_anchor: Option<String> = None;
    let mut skip_depth = 0usize;
    let mut last = 0;

    for cap in TAG_RE.captures_iter(&html) {
        let Some(whole) = cap.get(0) else { continue };
        if skip_depth == 0 {
            builder.push_text(&html[last..whole.start()], open_anchor.as_ref());
        }
        last = whole.end();

        let closing = &cap[1] == "/";
        let name = cap[2].to_ascii_lowercase();
        let attrs = &cap[3];

        match name.as_str() {
            "head" | "title" | "script" | "style" => {
                if closing {
                    skip_depth = skip_depth.saturating_sub(1);
                } else if !attrs.trim_end().ends_with('/') {
                    skip_depth += 1;
                }
            }
            _ if skip_depth > 0 => {}
            "a" => {
                if closing {
                    open_anchor = None;
                } else if let Some(key) = anchor_key(attrs) {
                    builder.open_anchor(&key);
                    open_anchor = Some(key);
                }
            }
            tag if PARAGRAPH_TAGS.contains(&tag) => {
                if closing {
                    builder.blank_line();
                } else {
                    builder.break_line();
                }
            }
            tag if LINE_BREAK_TAGS.contains(&tag) => builder.break_line(),
            _ => {}
        }
    }

    if skip_depth == 0 {
        builder.push_text(&html[last..], open_anchor.as_ref());
    }

    builder.finish()
}

fn anchor_key(attrs: &str) -> Option<String> {
    let cap = ANCHOR_ATTR_RE.captures(attrs)?;
    let value = cap.get(1).or_else(|| cap.get(2))?.as_str().trim();
    if value.is_empty() {
        None
    } else {
        Some(decode_entities(value))
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |cap: &regex::Captures| {
            let entity = &cap[1];
            let decoded = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match entity {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    "ndash" => Some('–'),
                    "mdash" => Some('—'),
                    "rsquo" => Some('’'),
                    "lsquo" => Some('‘'),
                    "rdquo" => Some('”'),
                    "ldquo" => Some('“'),
                    _ => None,
                }
            };
            decoded
                .map(String::from)
                .unwrap_or_else(|| cap[0].to_string())
        })
        .into_owned()
}
