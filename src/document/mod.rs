//! Document manager (C2): authoritative in-memory buffer state.
//!
//! The document manager is the single writer of buffer state; callers
//! only ever observe it through immutable [`DocumentSnapshot`]s. The
//! message scheduler (`crate::scheduler`) is what actually guarantees
//! there is only one writer in flight for a given URI at a time — this
//! module does not itself serialize concurrent `edit` calls for the
//! same URI beyond the per-entry lock needed to make a single `edit`
//! call atomic.

mod line_table;
mod snapshot;
mod uri;

pub use line_table::LineTable;
pub use snapshot::DocumentSnapshot;
pub use uri::DocumentUri;

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tower_lsp::lsp_types::TextDocumentContentChangeEvent;
use tracing::trace;

use crate::error::{CoreError, CoreResult};

struct OpenDocument {
    language: String,
    version: i32,
    text: LineTable,
}

/// Authoritative table of open document buffers, keyed by URI.
#[derive(Default)]
pub struct DocumentManager {
    documents: DashMap<DocumentUri, Mutex<OpenDocument>>,
}

impl DocumentManager {
    pub fn new() -> Self {
        Self { documents: DashMap::new() }
    }

    /// Registers a newly opened document. Replaces any prior buffer for
    /// the same URI (a reopen after a server-initiated close recovery,
    /// per the service registry's crash-recovery procedure).
    pub fn open(&self, uri: DocumentUri, language: impl Into<String>, version: i32, text: &str) {
        trace!(%uri, version, "document opened");
        self.documents.insert(
            uri,
            Mutex::new(OpenDocument {
                language: language.into(),
                version,
                text: LineTable::from_str(text),
            }),
        );
    }

    /// Applies an incremental or full-replace edit. Returns the resulting
    /// snapshot. Rejects edits whose version is not strictly newer than
    /// the current version, and edits with non-contiguous range
    /// endpoints.
    pub fn edit(
        &self,
        uri: &DocumentUri,
        version: i32,
        changes: Vec<TextDocumentContentChangeEvent>,
    ) -> CoreResult<Arc<DocumentSnapshot>> {
        let entry = self
            .documents
            .get(uri)
            .ok_or_else(|| CoreError::NotOpen(uri.clone()))?;
        let mut doc = entry.lock();
        if version <= doc.version {
            return Err(CoreError::StaleVersion { given: version, current: doc.version });
        }
        for change in changes {
            match change.range {
                Some(range) => doc.text.splice(range, &change.text)?,
                None => doc.text = LineTable::from_str(&change.text),
            }
        }
        doc.version = version;
        trace!(%uri, version, "document edited");
        Ok(Arc::new(DocumentSnapshot::new(
            uri.clone(),
            doc.language.clone(),
            doc.version,
            doc.text.clone(),
        )))
    }

    /// Removes a buffer. Later `latest` calls for this URI fail until a
    /// new `open`.
    pub fn close(&self, uri: &DocumentUri) -> CoreResult<()> {
        self.documents
            .remove(uri)
            .map(|_| ())
            .ok_or_else(|| CoreError::NotOpen(uri.clone()))
    }

    /// Returns the most recently committed snapshot for `uri`.
    pub fn latest(&self, uri: &DocumentUri) -> CoreResult<Arc<DocumentSnapshot>> {
        let entry = self
            .documents
            .get(uri)
            .ok_or_else(|| CoreError::NotOpen(uri.clone()))?;
        let doc = entry.lock();
        Ok(Arc::new(DocumentSnapshot::new(
            uri.clone(),
            doc.language.clone(),
            doc.version,
            doc.text.clone(),
        )))
    }

    pub fn is_open(&self, uri: &DocumentUri) -> bool {
        self.documents.contains_key(uri)
    }

    /// All currently open URIs, in no particular order.
    pub fn open_uris(&self) -> Vec<DocumentUri> {
        self.documents.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(sl: u32, sc: u32, el: u32, ec: u32) -> tower_lsp::lsp_types::Range {
        use tower_lsp::lsp_types::{Position, Range};
        Range::new(Position::new(sl, sc), Position::new(el, ec))
    }

    fn change(
        range: Option<tower_lsp::lsp_types::Range>,
        text: &str,
    ) -> TextDocumentContentChangeEvent {
        TextDocumentContentChangeEvent { range, range_length: None, text: text.to_string() }
    }

    fn uri(s: &str) -> DocumentUri {
        DocumentUri::parse(s).unwrap()
    }

    #[test]
    fn open_then_edit_applies_incremental_change() {
        let manager = DocumentManager::new();
        let u = uri("file:///a.swift");
        manager.open(u.clone(), "swift", 1, "let foo = 1\nprint(foo)");
        let snap = manager
            .edit(&u, 2, vec![change(Some(range(0, 4, 0, 7)), "bar")])
            .unwrap();
        assert_eq!(snap.full_text(), "let bar = 1\nprint(foo)");
    }

    #[test]
    fn stale_version_is_rejected() {
        let manager = DocumentManager::new();
        let u = uri("file:///a.swift");
        manager.open(u.clone(), "swift", 5, "hello");
        let err = manager.edit(&u, 5, vec![change(None, "x")]).unwrap_err();
        assert!(matches!(err, CoreError::StaleVersion { .. }));
    }

    #[test]
    fn latest_on_unopened_document_fails() {
        let manager = DocumentManager::new();
        let err = manager.latest(&uri("file:///missing.swift")).unwrap_err();
        assert!(matches!(err, CoreError::NotOpen(_)));
    }

    #[test]
    fn close_removes_buffer() {
        let manager = DocumentManager::new();
        let u = uri("file:///a.swift");
        manager.open(u.clone(), "swift", 1, "x");
        manager.close(&u).unwrap();
        assert!(manager.latest(&u).is_err());
    }

    #[test]
    fn reopen_after_close_round_trips_text() {
        let manager = DocumentManager::new();
        let u = uri("file:///a.swift");
        manager.open(u.clone(), "swift", 1, "let x = 1");
        let before = manager.latest(&u).unwrap();
        manager.close(&u).unwrap();
        manager.open(u.clone(), "swift", 1, "let x = 1");
        let after = manager.latest(&u).unwrap();
        assert_eq!(before.full_text(), after.full_text());
    }
}
