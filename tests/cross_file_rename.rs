//! End-to-end exercise of the cross-file rename algorithm (§4.7):
//! the adapter covers the cursor's own file, the index surfaces one more
//! file, and the two edit sets must come out disjoint and both correct.

mod common;

use tower_lsp::lsp_types::Position;

use common::{language_for_extension, FakeAdapter, FakeIndex};
use polyglot_lsp::document::{DocumentManager, DocumentUri};
use polyglot_lsp::index::{Role, SymbolOccurrence};
use polyglot_lsp::rename;

#[tokio::test]
async fn rename_expands_across_an_unopened_file_via_the_index() {
    let documents = DocumentManager::new();

    let dir = tempfile::tempdir().unwrap();
    let open_path = dir.path().join("a.swift");
    let disk_path = dir.path().join("b.swift");
    std::fs::write(&disk_path, "foo()\n").unwrap();

    let open_uri = DocumentUri::from_file_path(&open_path).unwrap();
    documents.open(open_uri.clone(), "swift", 1, "let foo = 1\nprint(foo)");
    let snapshot = documents.latest(&open_uri).unwrap();

    let adapter = FakeAdapter::new("s:foo", "foo");
    let index = FakeIndex::new().with_occurrence(
        "s:foo",
        SymbolOccurrence {
            path: disk_path.canonicalize().unwrap(),
            line: 1,
            utf8_column: 0,
            roles: vec![Role::Call],
            symbol: "s:foo".to_string(),
            symbol_name: "foo".to_string(),
            relations: Vec::new(),
        },
    );

    let edit = rename::rename(
        &adapter,
        &documents,
        Some(&index),
        language_for_extension,
        &snapshot,
        Position::new(0, 4),
        "bar",
    )
    .await
    .unwrap();

    let changes = edit.changes.expect("workspace edit should carry per-file changes");
    assert_eq!(changes.len(), 2, "adapter-local file and index-expanded file should both have edits");

    let disk_uri = DocumentUri::from_file_path(disk_path.canonicalize().unwrap()).unwrap();
    let adapter_edits = changes.get(open_uri.as_url()).expect("adapter-covered file missing edits");
    assert_eq!(adapter_edits.len(), 1);

    let index_edits = changes.get(disk_uri.as_url()).expect("index-expanded file missing edits");
    assert_eq!(index_edits.len(), 1);
    assert_eq!(index_edits[0].new_text, "bar");
}

#[tokio::test]
async fn rename_without_usr_or_old_name_skips_index_expansion() {
    let adapter = FakeAdapter::without_identity();

    let documents = DocumentManager::new();
    let uri = DocumentUri::parse("file:///a.swift").unwrap();
    documents.open(uri.clone(), "swift", 1, "let foo = 1");
    let snapshot = documents.latest(&uri).unwrap();

    let edit = rename::rename(&adapter, &documents, None, language_for_extension, &snapshot, Position::new(0, 4), "bar")
        .await
        .unwrap();

    let changes = edit.changes.unwrap();
    assert_eq!(changes.len(), 1, "with no usr/old_name there is nothing to expand beyond the adapter's own edits");
}
