//! Adapter for the C-family backend (modelled on clangd, which speaks
//! LSP natively over its own stdio transport).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tower_lsp::lsp_types::{
    CodeActionResponse, ColorInformation, ColorPresentation, CompletionResponse, Diagnostic,
    DocumentHighlight, DocumentSymbolResponse, FoldingRange, Hover, InlayHint, Location, Position,
    Range, SemanticTokensDeltaResult, SemanticTokensRangeResult, SemanticTokensResult, Url, WorkspaceEdit,
};

use crate::backend::BackendChannel;
use crate::document::{DocumentSnapshot, DocumentUri};
use crate::error::CoreResult;
use crate::index::Usr;
use crate::payload::Value;
use crate::rename::{RenameLocation, SyntacticRenameName};

use super::wire::send_lsp_request;
use super::{InterfaceDocument, LanguageServiceAdapter, LocalRenameResult, PrepareRenameResult, SymbolInfo};

pub struct CFamilyAdapter {
    channel: Arc<BackendChannel>,
}

impl CFamilyAdapter {
    pub fn new(channel: Arc<BackendChannel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl LanguageServiceAdapter for CFamilyAdapter {
    async fn initialize(&self) -> CoreResult<bool> {
        let response: serde_json::Value = send_lsp_request(
            &self.channel,
            "initialize",
            &json!({ "processId": null, "rootUri": null, "capabilities": {} }),
        )
        .await?;
        let sync_kind = response
            .get("capabilities")
            .and_then(|c| c.get("textDocumentSync"))
            .and_then(|sync| sync.get("change").or(Some(sync)))
            .and_then(serde_json::Value::as_u64);
        // TextDocumentSyncKind::INCREMENTAL == 2.
        Ok(sync_kind == Some(2))
    }

    async fn did_open(&self, snapshot: &DocumentSnapshot) -> CoreResult<()> {
        self.channel
            .send_notification(
                "textDocument/didOpen",
                Value::from_wire_json(json!({
                    "textDocument": { "uri": snapshot.uri.to_string(), "languageId": snapshot.language, "version": snapshot.version, "text": snapshot.full_text() }
                }))
                .unwrap_or(Value::Null),
            )
            .await
    }

    async fn did_change(&self, snapshot: &DocumentSnapshot) -> CoreResult<()> {
        self.channel
            .send_notification(
                "textDocument/didChange",
                Value::from_wire_json(json!({
                    "textDocument": { "uri": snapshot.uri.to_string(), "version": snapshot.version },
                    "contentChanges": [{ "text": snapshot.full_text() }]
                }))
                .unwrap_or(Value::Null),
            )
            .await
    }

    async fn did_close(&self, uri: &DocumentUri) -> CoreResult<()> {
        self.channel
            .send_notification(
                "textDocument/didClose",
                Value::from_wire_json(json!({ "textDocument": { "uri": uri.to_string() } })).unwrap_or(Value::Null),
            )
            .await
    }

    async fn did_save(&self, uri: &DocumentUri) -> CoreResult<()> {
        self.channel
            .send_notification(
                "textDocument/didSave",
                Value::from_wire_json(json!({ "textDocument": { "uri": uri.to_string() } })).unwrap_or(Value::Null),
            )
            .await
    }

    async fn completion(&self, snapshot: &DocumentSnapshot, position: Position) -> CoreResult<Option<CompletionResponse>> {
        send_lsp_request(&self.channel, "textDocument/completion", &json!({ "textDocument": { "uri": snapshot.uri.to_string() }, "position": position })).await
    }

    async fn hover(&self, snapshot: &DocumentSnapshot, position: Position) -> CoreResult<Option<Hover>> {
        send_lsp_request(&self.channel, "textDocument/hover", &json!({ "textDocument": { "uri": snapshot.uri.to_string() }, "position": position })).await
    }

    async fn symbol_info(&self, snapshot: &DocumentSnapshot, position: Position) -> CoreResult<SymbolInfo> {
        // clangd's `textDocument/symbolInfo` extension returns the USR
        // directly; unlike the compile-driven backend there is no
        // interned-keyword dictionary to build.
        let response: Vec<serde_json::Value> =
            send_lsp_request(&self.channel, "textDocument/symbolInfo", &json!({ "textDocument": { "uri": snapshot.uri.to_string() }, "position": position }))
                .await
                .unwrap_or_default();
        let usrs = response
            .iter()
            .filter_map(|entry| entry.get("usr").and_then(serde_json::Value::as_str))
            .map(str::to_string)
            .collect();
        Ok(SymbolInfo { usrs, best_local_declaration: None, is_module: false, module_name: None })
    }

    async fn definition(&self, snapshot: &DocumentSnapshot, position: Position) -> CoreResult<Vec<Location>> {
        let locations: Option<Vec<Location>> =
            send_lsp_request(&self.channel, "textDocument/definition", &json!({ "textDocument": { "uri": snapshot.uri.to_string() }, "position": position })).await?;
        Ok(locations.unwrap_or_default())
    }

    async fn declaration(&self, snapshot: &DocumentSnapshot, position: Position) -> CoreResult<Vec<Location>> {
        let locations: Option<Vec<Location>> =
            send_lsp_request(&self.channel, "textDocument/declaration", &json!({ "textDocument": { "uri": snapshot.uri.to_string() }, "position": position })).await?;
        Ok(locations.unwrap_or_default())
    }

    async fn references(&self, snapshot: &DocumentSnapshot, position: Position, include_declaration: bool) -> CoreResult<Vec<Location>> {
        let locations: Option<Vec<Location>> = send_lsp_request(
            &self.channel,
            "textDocument/references",
            &json!({ "textDocument": { "uri": snapshot.uri.to_string() }, "position": position, "context": { "includeDeclaration": include_declaration } }),
        )
        .await?;
        Ok(locations.unwrap_or_default())
    }

    async fn implementation(&self, snapshot: &DocumentSnapshot, position: Position) -> CoreResult<Vec<Location>> {
        let locations: Option<Vec<Location>> =
            send_lsp_request(&self.channel, "textDocument/implementation", &json!({ "textDocument": { "uri": snapshot.uri.to_string() }, "position": position })).await?;
        Ok(locations.unwrap_or_default())
    }

    async fn document_symbol(&self, snapshot: &DocumentSnapshot) -> CoreResult<Option<DocumentSymbolResponse>> {
        send_lsp_request(&self.channel, "textDocument/documentSymbol", &json!({ "textDocument": { "uri": snapshot.uri.to_string() } })).await
    }

    async fn document_highlight(&self, snapshot: &DocumentSnapshot, position: Position) -> CoreResult<Vec<DocumentHighlight>> {
        let highlights: Option<Vec<DocumentHighlight>> =
            send_lsp_request(&self.channel, "textDocument/documentHighlight", &json!({ "textDocument": { "uri": snapshot.uri.to_string() }, "position": position })).await?;
        Ok(highlights.unwrap_or_default())
    }

    async fn folding_range(&self, snapshot: &DocumentSnapshot) -> CoreResult<Vec<FoldingRange>> {
        let ranges: Option<Vec<FoldingRange>> = send_lsp_request(&self.channel, "textDocument/foldingRange", &json!({ "textDocument": { "uri": snapshot.uri.to_string() } })).await?;
        Ok(ranges.unwrap_or_default())
    }

    async fn semantic_tokens_full(&self, snapshot: &DocumentSnapshot) -> CoreResult<Option<SemanticTokensResult>> {
        send_lsp_request(&self.channel, "textDocument/semanticTokens/full", &json!({ "textDocument": { "uri": snapshot.uri.to_string() } })).await
    }

    async fn semantic_tokens_range(&self, snapshot: &DocumentSnapshot, range: Range) -> CoreResult<Option<SemanticTokensRangeResult>> {
        send_lsp_request(
            &self.channel,
            "textDocument/semanticTokens/range",
            &json!({ "textDocument": { "uri": snapshot.uri.to_string() }, "range": range }),
        )
        .await
    }

    async fn semantic_tokens_delta(&self, snapshot: &DocumentSnapshot, previous_result_id: &str) -> CoreResult<Option<SemanticTokensDeltaResult>> {
        send_lsp_request(
            &self.channel,
            "textDocument/semanticTokens/full/delta",
            &json!({ "textDocument": { "uri": snapshot.uri.to_string() }, "previousResultId": previous_result_id }),
        )
        .await
    }

    async fn document_color(&self, snapshot: &DocumentSnapshot) -> CoreResult<Vec<ColorInformation>> {
        let colors: Option<Vec<ColorInformation>> = send_lsp_request(&self.channel, "textDocument/documentColor", &json!({ "textDocument": { "uri": snapshot.uri.to_string() } })).await?;
        Ok(colors.unwrap_or_default())
    }

    async fn color_presentation(&self, snapshot: &DocumentSnapshot, color: ColorInformation) -> CoreResult<Vec<ColorPresentation>> {
        let presentations: Option<Vec<ColorPresentation>> = send_lsp_request(
            &self.channel,
            "textDocument/colorPresentation",
            &json!({ "textDocument": { "uri": snapshot.uri.to_string() }, "color": color.color, "range": color.range }),
        )
        .await?;
        Ok(presentations.unwrap_or_default())
    }

    async fn code_action(&self, snapshot: &DocumentSnapshot, range: Range) -> CoreResult<Option<CodeActionResponse>> {
        send_lsp_request(
            &self.channel,
            "textDocument/codeAction",
            &json!({ "textDocument": { "uri": snapshot.uri.to_string() }, "range": range, "context": { "diagnostics": [] } }),
        )
        .await
    }

    async fn inlay_hint(&self, snapshot: &DocumentSnapshot, range: Range) -> CoreResult<Vec<InlayHint>> {
        let hints: Option<Vec<InlayHint>> = send_lsp_request(&self.channel, "textDocument/inlayHint", &json!({ "textDocument": { "uri": snapshot.uri.to_string() }, "range": range })).await?;
        Ok(hints.unwrap_or_default())
    }

    async fn document_diagnostic(&self, snapshot: &DocumentSnapshot) -> CoreResult<Vec<Diagnostic>> {
        let diagnostics: Option<Vec<Diagnostic>> = send_lsp_request(&self.channel, "textDocument/diagnostic", &json!({ "textDocument": { "uri": snapshot.uri.to_string() } })).await?;
        Ok(diagnostics.unwrap_or_default())
    }

    async fn execute_command(&self, command: &str, arguments: Vec<serde_json::Value>) -> CoreResult<Option<serde_json::Value>> {
        send_lsp_request(&self.channel, "workspace/executeCommand", &json!({ "command": command, "arguments": arguments })).await
    }

    async fn open_interface(&self, module_name: &str, usr: &Usr) -> CoreResult<InterfaceDocument> {
        // The C-family backend has no module-interface concept; headers
        // serve that role and are already addressable by URI.
        let _ = usr;
        let uri = DocumentUri::parse(&format!("file:///{module_name}.h")).unwrap_or_else(|_| DocumentUri::parse("file:///unknown.h").unwrap());
        Ok(InterfaceDocument {
            uri: uri.clone(),
            header_location: Location { uri: uri.into_url(), range: Range::new(Position::new(0, 0), Position::new(0, 0)) },
        })
    }

    async fn rename(&self, snapshot: &DocumentSnapshot, position: Position, new_name: &str) -> CoreResult<LocalRenameResult> {
        let edits: Option<WorkspaceEdit> = send_lsp_request(
            &self.channel,
            "textDocument/rename",
            &json!({ "textDocument": { "uri": snapshot.uri.to_string() }, "position": position, "newName": new_name }),
        )
        .await?;
        let symbol_info = self.symbol_info(snapshot, position).await?;
        Ok(LocalRenameResult {
            edits: edits.unwrap_or_default(),
            usr: symbol_info.usrs.into_iter().next(),
            old_name: None,
        })
    }

    async fn prepare_rename(&self, snapshot: &DocumentSnapshot, position: Position) -> CoreResult<Option<PrepareRenameResult>> {
        let response: Option<serde_json::Value> =
            send_lsp_request(&self.channel, "textDocument/prepareRename", &json!({ "textDocument": { "uri": snapshot.uri.to_string() }, "position": position })).await?;
        Ok(response.and_then(|value| {
            let range: Range = serde_json::from_value(value.get("range")?.clone()).ok()?;
            let placeholder = value.get("placeholder").and_then(serde_json::Value::as_str).unwrap_or_default().to_string();
            Some(PrepareRenameResult { range, placeholder })
        }))
    }

    async fn edits_to_rename(
        &self,
        locations: &[RenameLocation],
        snapshot: &DocumentSnapshot,
        old_name: &str,
        new_name: &str,
    ) -> CoreResult<Vec<SyntacticRenameName>> {
        let _ = (locations, snapshot, old_name, new_name);
        // clangd has no compound-name / selector syntax to resolve;
        // cross-file C-family renames are plain textual substitutions
        // already covered by its own `textDocument/rename` response, so
        // there is nothing further for the syntactic resolver to do.
        Ok(Vec::new())
    }

    async fn document_updated_build_settings(&self, uris: &[DocumentUri]) {
        for uri in uris {
            let _ = self
                .channel
                .send_notification("workspace/didChangeConfiguration", Value::from_wire_json(json!({ "uri": uri.to_string() })).unwrap_or(Value::Null))
                .await;
        }
    }

    async fn document_dependencies_updated(&self, uris: &[DocumentUri]) {
        let _ = uris;
    }

    async fn can_handle(&self, workspace_root: &Url) -> bool {
        let _ = workspace_root;
        true
    }

    async fn shutdown(&self) -> CoreResult<()> {
        self.channel.send("shutdown", Value::Null).await.map(|_| ())
    }
}
