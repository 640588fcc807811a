//! Language-service adapter (C5): the uniform capability surface the
//! scheduler depends on, with one concrete implementation per backend
//! kind.

mod clang;
mod compile_driven;
mod wire;

pub use clang::CFamilyAdapter;
pub use compile_driven::CompileDrivenAdapter;
pub(crate) use wire::send_lsp_request;

use async_trait::async_trait;
use tower_lsp::lsp_types::{
    CodeActionResponse, ColorInformation, ColorPresentation, CompletionResponse, Diagnostic,
    DocumentHighlight, DocumentSymbolResponse, FoldingRange, Hover, InlayHint, Location,
    SemanticTokensDeltaResult, SemanticTokensRangeResult, SemanticTokensResult, Url, WorkspaceEdit,
};

use crate::document::{DocumentSnapshot, DocumentUri};
use crate::error::CoreResult;
use crate::index::Usr;
use crate::rename::{RenameLocation, SyntacticRenameName};

/// Top symbol information at a cursor position: the USRs it resolves to
/// and a best-effort local declaration location (§4.8).
#[derive(Debug, Clone)]
pub struct SymbolInfo {
    pub usrs: Vec<Usr>,
    pub best_local_declaration: Option<Location>,
    /// True when the top symbol is a module; navigation re-routes to
    /// [`LanguageServiceAdapter::open_interface`] in that case.
    pub is_module: bool,
    pub module_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InterfaceDocument {
    pub uri: DocumentUri,
    pub header_location: Location,
}

/// Result of an adapter-local rename: edits for buffers the adapter
/// already covers, plus enough identity information (§4.7 step 1) for
/// the core to expand the rename across the rest of the workspace via
/// the index.
#[derive(Debug, Clone, Default)]
pub struct LocalRenameResult {
    pub edits: WorkspaceEdit,
    pub usr: Option<Usr>,
    pub old_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PrepareRenameResult {
    pub range: tower_lsp::lsp_types::Range,
    /// The compound placeholder text (e.g. `foo(bar:)`), not just the
    /// base name.
    pub placeholder: String,
}

/// The capability set every backend-specific adapter implements. The
/// core only ever programs against this trait; `CompileDrivenAdapter`
/// and `CFamilyAdapter` are its only two variants (§4.5).
#[async_trait]
pub trait LanguageServiceAdapter: Send + Sync {
    /// Performs the backend's own `initialize` handshake and reports
    /// whether it negotiated incremental text-document sync (§4.6 step
    /// 2). The registry treats `Ok(false)` as fatal for this adapter.
    async fn initialize(&self) -> CoreResult<bool>;

    async fn did_open(&self, snapshot: &DocumentSnapshot) -> CoreResult<()>;
    async fn did_change(&self, snapshot: &DocumentSnapshot) -> CoreResult<()>;
    async fn did_close(&self, uri: &DocumentUri) -> CoreResult<()>;
    async fn did_save(&self, uri: &DocumentUri) -> CoreResult<()>;

    async fn completion(&self, snapshot: &DocumentSnapshot, position: tower_lsp::lsp_types::Position) -> CoreResult<Option<CompletionResponse>>;
    async fn hover(&self, snapshot: &DocumentSnapshot, position: tower_lsp::lsp_types::Position) -> CoreResult<Option<Hover>>;
    async fn symbol_info(&self, snapshot: &DocumentSnapshot, position: tower_lsp::lsp_types::Position) -> CoreResult<SymbolInfo>;
    async fn definition(&self, snapshot: &DocumentSnapshot, position: tower_lsp::lsp_types::Position) -> CoreResult<Vec<Location>>;
    async fn declaration(&self, snapshot: &DocumentSnapshot, position: tower_lsp::lsp_types::Position) -> CoreResult<Vec<Location>>;
    async fn references(&self, snapshot: &DocumentSnapshot, position: tower_lsp::lsp_types::Position, include_declaration: bool) -> CoreResult<Vec<Location>>;
    async fn implementation(&self, snapshot: &DocumentSnapshot, position: tower_lsp::lsp_types::Position) -> CoreResult<Vec<Location>>;
    async fn document_symbol(&self, snapshot: &DocumentSnapshot) -> CoreResult<Option<DocumentSymbolResponse>>;
    async fn document_highlight(&self, snapshot: &DocumentSnapshot, position: tower_lsp::lsp_types::Position) -> CoreResult<Vec<DocumentHighlight>>;
    async fn folding_range(&self, snapshot: &DocumentSnapshot) -> CoreResult<Vec<FoldingRange>>;
    async fn semantic_tokens_full(&self, snapshot: &DocumentSnapshot) -> CoreResult<Option<SemanticTokensResult>>;
    async fn semantic_tokens_range(&self, snapshot: &DocumentSnapshot, range: tower_lsp::lsp_types::Range) -> CoreResult<Option<SemanticTokensRangeResult>>;
    async fn semantic_tokens_delta(&self, snapshot: &DocumentSnapshot, previous_result_id: &str) -> CoreResult<Option<SemanticTokensDeltaResult>>;
    async fn document_color(&self, snapshot: &DocumentSnapshot) -> CoreResult<Vec<ColorInformation>>;
    async fn color_presentation(&self, snapshot: &DocumentSnapshot, color: ColorInformation) -> CoreResult<Vec<ColorPresentation>>;
    async fn code_action(&self, snapshot: &DocumentSnapshot, range: tower_lsp::lsp_types::Range) -> CoreResult<Option<CodeActionResponse>>;
    async fn inlay_hint(&self, snapshot: &DocumentSnapshot, range: tower_lsp::lsp_types::Range) -> CoreResult<Vec<InlayHint>>;
    async fn document_diagnostic(&self, snapshot: &DocumentSnapshot) -> CoreResult<Vec<Diagnostic>>;
    async fn execute_command(&self, command: &str, arguments: Vec<serde_json::Value>) -> CoreResult<Option<serde_json::Value>>;

    async fn open_interface(&self, module_name: &str, usr: &Usr) -> CoreResult<InterfaceDocument>;

    async fn rename(&self, snapshot: &DocumentSnapshot, position: tower_lsp::lsp_types::Position, new_name: &str) -> CoreResult<LocalRenameResult>;
    async fn prepare_rename(&self, snapshot: &DocumentSnapshot, position: tower_lsp::lsp_types::Position) -> CoreResult<Option<PrepareRenameResult>>;
    async fn edits_to_rename(
        &self,
        locations: &[RenameLocation],
        snapshot: &DocumentSnapshot,
        old_name: &str,
        new_name: &str,
    ) -> CoreResult<Vec<SyntacticRenameName>>;

    /// Notifies the adapter that the build system recomputed settings
    /// for these URIs (out-of-band hook, §4.5).
    async fn document_updated_build_settings(&self, uris: &[DocumentUri]);
    async fn document_dependencies_updated(&self, uris: &[DocumentUri]);
    async fn can_handle(&self, workspace_root: &Url) -> bool;

    async fn shutdown(&self) -> CoreResult<()>;
}
