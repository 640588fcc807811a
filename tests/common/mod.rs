//! Shared fixtures for integration tests: a fake adapter that never
//! spawns a real backend process, and a fake symbol index, both driven
//! entirely by data supplied in the test.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tower_lsp::lsp_types::{
    CodeActionResponse, ColorInformation, ColorPresentation, CompletionResponse, Diagnostic,
    DocumentHighlight, DocumentSymbolResponse, FoldingRange, Hover, InlayHint, Location, Position,
    Range, SemanticTokensDeltaResult, SemanticTokensRangeResult, SemanticTokensResult, Url,
    WorkspaceEdit,
};

use polyglot_lsp::adapter::{InterfaceDocument, LanguageServiceAdapter, LocalRenameResult, PrepareRenameResult, SymbolInfo};
use polyglot_lsp::document::{DocumentSnapshot, DocumentUri};
use polyglot_lsp::error::{CoreError, CoreResult};
use polyglot_lsp::index::{Role, SymbolIndex, SymbolOccurrence, Usr};
use polyglot_lsp::rename::{RenameLocation, SyntacticRenameName, SyntacticRenamePiece};

/// An adapter whose "local rename" only ever touches the document it was
/// invoked on (simulating a backend whose index of the symbol doesn't
/// reach other files), and whose `edits_to_rename` locates every
/// occurrence of `old_name` on the target line by a plain substring
/// search, tagging each as a `BaseName` piece. Good enough to drive the
/// cross-file expansion in `rename::rename` without a real compiler
/// backend.
pub struct FakeAdapter {
    pub local_usr: Option<Usr>,
    pub local_old_name: Option<String>,
}

impl FakeAdapter {
    pub fn new(usr: impl Into<String>, old_name: impl Into<String>) -> Self {
        Self { local_usr: Some(usr.into()), local_old_name: Some(old_name.into()) }
    }

    /// An adapter whose local rename reports no USR/old-name, the way a
    /// backend without index integration would — exercises the early
    /// return in `rename::rename` before any index query is made.
    pub fn without_identity() -> Self {
        Self { local_usr: None, local_old_name: None }
    }
}

fn unused(name: &str) -> ! {
    panic!("FakeAdapter::{name} is not exercised by this test")
}

#[async_trait]
impl LanguageServiceAdapter for FakeAdapter {
    async fn initialize(&self) -> CoreResult<bool> {
        Ok(true)
    }

    async fn did_open(&self, _snapshot: &DocumentSnapshot) -> CoreResult<()> {
        Ok(())
    }
    async fn did_change(&self, _snapshot: &DocumentSnapshot) -> CoreResult<()> {
        Ok(())
    }
    async fn did_close(&self, _uri: &DocumentUri) -> CoreResult<()> {
        Ok(())
    }
    async fn did_save(&self, _uri: &DocumentUri) -> CoreResult<()> {
        Ok(())
    }

    async fn completion(&self, _snapshot: &DocumentSnapshot, _position: Position) -> CoreResult<Option<CompletionResponse>> {
        unused("completion")
    }
    async fn hover(&self, _snapshot: &DocumentSnapshot, _position: Position) -> CoreResult<Option<Hover>> {
        unused("hover")
    }
    async fn symbol_info(&self, _snapshot: &DocumentSnapshot, _position: Position) -> CoreResult<SymbolInfo> {
        unused("symbol_info")
    }
    async fn definition(&self, _snapshot: &DocumentSnapshot, _position: Position) -> CoreResult<Vec<Location>> {
        unused("definition")
    }
    async fn declaration(&self, _snapshot: &DocumentSnapshot, _position: Position) -> CoreResult<Vec<Location>> {
        unused("declaration")
    }
    async fn references(&self, _snapshot: &DocumentSnapshot, _position: Position, _include_declaration: bool) -> CoreResult<Vec<Location>> {
        unused("references")
    }
    async fn implementation(&self, _snapshot: &DocumentSnapshot, _position: Position) -> CoreResult<Vec<Location>> {
        unused("implementation")
    }
    async fn document_symbol(&self, _snapshot: &DocumentSnapshot) -> CoreResult<Option<DocumentSymbolResponse>> {
        unused("document_symbol")
    }
    async fn document_highlight(&self, _snapshot: &DocumentSnapshot, _position: Position) -> CoreResult<Vec<DocumentHighlight>> {
        unused("document_highlight")
    }
    async fn folding_range(&self, _snapshot: &DocumentSnapshot) -> CoreResult<Vec<FoldingRange>> {
        unused("folding_range")
    }
    async fn semantic_tokens_full(&self, _snapshot: &DocumentSnapshot) -> CoreResult<Option<SemanticTokensResult>> {
        unused("semantic_tokens_full")
    }
    async fn semantic_tokens_range(&self, _snapshot: &DocumentSnapshot, _range: Range) -> CoreResult<Option<SemanticTokensRangeResult>> {
        unused("semantic_tokens_range")
    }
    async fn semantic_tokens_delta(&self, _snapshot: &DocumentSnapshot, _previous_result_id: &str) -> CoreResult<Option<SemanticTokensDeltaResult>> {
        unused("semantic_tokens_delta")
    }
    async fn document_color(&self, _snapshot: &DocumentSnapshot) -> CoreResult<Vec<ColorInformation>> {
        unused("document_color")
    }
    async fn color_presentation(&self, _snapshot: &DocumentSnapshot, _color: ColorInformation) -> CoreResult<Vec<ColorPresentation>> {
        unused("color_presentation")
    }
    async fn code_action(&self, _snapshot: &DocumentSnapshot, _range: Range) -> CoreResult<Option<CodeActionResponse>> {
        unused("code_action")
    }
    async fn inlay_hint(&self, _snapshot: &DocumentSnapshot, _range: Range) -> CoreResult<Vec<InlayHint>> {
        unused("inlay_hint")
    }
    async fn document_diagnostic(&self, _snapshot: &DocumentSnapshot) -> CoreResult<Vec<Diagnostic>> {
        Ok(Vec::new())
    }
    async fn execute_command(&self, _command: &str, _arguments: Vec<serde_json::Value>) -> CoreResult<Option<serde_json::Value>> {
        unused("execute_command")
    }

    async fn open_interface(&self, _module_name: &str, _usr: &Usr) -> CoreResult<InterfaceDocument> {
        unused("open_interface")
    }

    async fn rename(&self, snapshot: &DocumentSnapshot, position: Position, _new_name: &str) -> CoreResult<LocalRenameResult> {
        let mut changes = HashMap::new();
        let edits = match &self.local_old_name {
            Some(old_name) => {
                let line = snapshot.text.to_string().lines().nth(position.line as usize).unwrap_or_default().to_string();
                let Some(col) = line.find(old_name.as_str()) else {
                    return Err(CoreError::Internal("fake adapter: old_name not found on the cursor's line".into()));
                };
                let start = Position::new(position.line, col as u32);
                let end = Position::new(position.line, (col + old_name.len()) as u32);
                // The actual replacement text is irrelevant to these tests;
                // what matters is that this file is marked "covered" so step
                // 2's disjointness filter excludes it from index expansion.
                vec![tower_lsp::lsp_types::TextEdit { range: Range::new(start, end), new_text: String::new() }]
            }
            None => Vec::new(),
        };
        changes.insert(snapshot.uri.as_url().clone(), edits);
        Ok(LocalRenameResult {
            edits: WorkspaceEdit { changes: Some(changes), ..Default::default() },
            usr: self.local_usr.clone(),
            old_name: self.local_old_name.clone(),
        })
    }

    async fn prepare_rename(&self, _snapshot: &DocumentSnapshot, _position: Position) -> CoreResult<Option<PrepareRenameResult>> {
        unused("prepare_rename")
    }

    async fn edits_to_rename(
        &self,
        locations: &[RenameLocation],
        snapshot: &DocumentSnapshot,
        old_name: &str,
        _new_name: &str,
    ) -> CoreResult<Vec<SyntacticRenameName>> {
        use polyglot_lsp::rename::{PieceCategory, RenamePieceKind};

        let lines: Vec<&str> = snapshot.text.to_string().lines().collect();
        let mut names = Vec::with_capacity(locations.len());
        for loc in locations {
            let Some(line) = lines.get(loc.line) else { continue };
            let Some(col) = line.find(old_name) else { continue };
            let range = Range::new(Position::new(loc.line as u32, col as u32), Position::new(loc.line as u32, (col + old_name.len()) as u32));
            names.push(SyntacticRenameName {
                pieces: vec![SyntacticRenamePiece {
                    range,
                    kind: RenamePieceKind::BaseName,
                    category: PieceCategory::ActiveCode,
                    parameter_index: None,
                }],
            });
        }
        Ok(names)
    }

    async fn document_updated_build_settings(&self, _uris: &[DocumentUri]) {}
    async fn document_dependencies_updated(&self, _uris: &[DocumentUri]) {}
    async fn can_handle(&self, _workspace_root: &Url) -> bool {
        true
    }

    async fn shutdown(&self) -> CoreResult<()> {
        Ok(())
    }
}

/// A symbol index backed by a fixed occurrence list, keyed by USR.
#[derive(Default)]
pub struct FakeIndex {
    occurrences: Mutex<HashMap<Usr, Vec<SymbolOccurrence>>>,
}

impl FakeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_occurrence(self, usr: impl Into<Usr>, occurrence: SymbolOccurrence) -> Self {
        self.occurrences.lock().unwrap().entry(usr.into()).or_default().push(occurrence);
        self
    }
}

#[async_trait]
impl SymbolIndex for FakeIndex {
    async fn occurrences(&self, usr: &Usr, roles: &[Role]) -> Vec<SymbolOccurrence> {
        self.occurrences
            .lock()
            .unwrap()
            .get(usr)
            .map(|all| all.iter().filter(|o| roles.iter().any(|r| o.has_role(*r))).cloned().collect())
            .unwrap_or_default()
    }

    async fn related_occurrences(&self, _usr: &Usr, _roles: &[Role]) -> Vec<SymbolOccurrence> {
        Vec::new()
    }

    async fn search_symbols(&self, _substring: &str, _ignore_case: bool) -> Vec<SymbolOccurrence> {
        Vec::new()
    }

    async fn poll_for_unit_changes_and_wait(&self) {}
}

pub fn language_for_extension(ext: &str) -> String {
    match ext {
        "swift" => "swift".to_string(),
        "c" | "h" => "c".to_string(),
        "cpp" | "hpp" | "cc" => "cpp".to_string(),
        other => other.to_string(),
    }
}
