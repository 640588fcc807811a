use super::{DocumentUri, LineTable};

/// An immutable document version at a given edit point.
///
/// A snapshot may be either the document manager's live view of an open
/// buffer, or a synthesized snapshot loaded from disk for a file the
/// editor never opened (cross-file rename, §4.7 step 3, needs both).
/// Older snapshots may outlive the buffer they were taken from for as
/// long as a request holds them — nothing else in the core mutates a
/// `DocumentSnapshot` once constructed.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    pub uri: DocumentUri,
    pub language: String,
    pub version: i32,
    pub text: LineTable,
}

impl DocumentSnapshot {
    pub fn new(uri: DocumentUri, language: impl Into<String>, version: i32, text: LineTable) -> Self {
        Self { uri, language: language.into(), version, text }
    }

    /// Synthesizes a snapshot for a file that is not open in the editor,
    /// inferring its language from the URI's extension. Used by
    /// cross-file rename (§4.7 step 3) and navigation (§4.8) when an
    /// index hit falls outside the live edit set. Synthesized snapshots
    /// carry version 0 — they are never subject to the document
    /// manager's monotonic-version invariant.
    pub fn from_disk(uri: DocumentUri, text: &str, language_for_extension: impl Fn(&str) -> String) -> Self {
        let language = uri
            .extension()
            .map(|ext| language_for_extension(&ext))
            .unwrap_or_else(|| "plaintext".to_string());
        Self { uri, language, version: 0, text: LineTable::from_str(text) }
    }

    pub fn full_text(&self) -> String {
        self.text.to_string()
    }
}
