//! Adapter for the compile-driven backend (modelled on sourcekit-lsp's
//! relationship to a compiler-hosted indexing service).

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
use crate::rename::{PieceCategory, RenameLocation, RenamePieceKind, SyntacticRenameName, SyntacticRenamePiece};

use super::wire::send_lsp_request;
use super::{InterfaceDocument, LanguageServiceAdapter, LocalRenameResult, PrepareRenameResult, SymbolInfo};

/// A request key interned once, from the set of well-known protocol
/// keywords in the glossary (`key.offset`, `source.request.*`, ...).
struct Keys {
    offset: crate::payload::Ident,
    source_file: crate::payload::Ident,
    request: crate::payload::Ident,
    cursorinfo: crate::payload::Ident,
    find_syntactic_rename_ranges: crate::payload::Ident,
    source_text: crate::payload::Ident,
    name: crate::payload::Ident,
    new_name: crate::payload::Ident,
    rename_locations: crate::payload::Ident,
    line: crate::payload::Ident,
    column: crate::payload::Ident,
    results: crate::payload::Ident,
    ranges: crate::payload::Ident,
    kind: crate::payload::Ident,
    category: crate::payload::Ident,
    arg_index: crate::payload::Ident,
    end_line: crate::payload::Ident,
    end_column: crate::payload::Ident,
}

pub struct CompileDrivenAdapter {
    channel: Arc<BackendChannel>,
    keys: Keys,
}

impl CompileDrivenAdapter {
    pub fn new(channel: Arc<BackendChannel>) -> Self {
        let keys = Keys {
            offset: channel.intern("key.offset"),
            source_file: channel.intern("key.sourcefile"),
            request: channel.intern("key.request"),
            cursorinfo: channel.intern("source.request.cursorinfo"),
            find_syntactic_rename_ranges: channel.intern("source.request.find-syntactic-rename-ranges"),
            source_text: channel.intern("key.sourcetext"),
            name: channel.intern("key.name"),
            new_name: channel.intern("key.newname"),
            rename_locations: channel.intern("key.renamelocations"),
            line: channel.intern("key.line"),
            column: channel.intern("key.column"),
            results: channel.intern("key.results"),
            ranges: channel.intern("key.ranges"),
            kind: channel.intern("key.kind"),
            category: channel.intern("key.category"),
            arg_index: channel.intern("key.argindex"),
            end_line: channel.intern("key.endline"),
            end_column: channel.intern("key.endcolumn"),
        };
        Self { channel, keys }
    }

    fn find_syntactic_rename_ranges_request(
        &self,
        locations: &[RenameLocation],
        snapshot: &DocumentSnapshot,
        old_name: &str,
        new_name: &str,
    ) -> Value {
        let location_values = locations
            .iter()
            .map(|loc| {
                let mut map = std::collections::HashMap::new();
                map.insert(self.keys.line, Value::Int(loc.line as i64));
                map.insert(self.keys.column, Value::Int(loc.utf8_column as i64));
                Value::Map(map)
            })
            .collect();

        let mut map = std::collections::HashMap::new();
        map.insert(self.keys.request, Value::Ident(self.keys.find_syntactic_rename_ranges));
        map.insert(self.keys.source_file, Value::Str(snapshot.uri.to_string()));
        map.insert(self.keys.source_text, Value::Str(snapshot.full_text()));
        map.insert(self.keys.name, Value::Str(old_name.to_string()));
        map.insert(self.keys.new_name, Value::Str(new_name.to_string()));
        map.insert(self.keys.rename_locations, Value::List(location_values));
        Value::Map(map)
    }

    /// Decodes one rename location's worth of ranges from the backend's
    /// response. Unknown `key.kind`/`key.category` tags are skipped
    /// rather than rejecting the whole response, since a newer backend
    /// may report range kinds this core does not yet model.
    fn decode_name(&self, value: &Value) -> SyntacticRenameName {
        let pieces = value
            .get(self.keys.ranges)
            .and_then(Value::as_list)
            .map(|ranges| {
                ranges
                    .iter()
                    .filter_map(|range| self.decode_piece(range))
                    .collect()
            })
            .unwrap_or_default();
        SyntacticRenameName { pieces }
    }

    fn decode_piece(&self, value: &Value) -> Option<SyntacticRenamePiece> {
        let kind = match value.get(self.keys.kind).and_then(Value::as_str)? {
            "source.refactoring.range.kind.basename" => RenamePieceKind::BaseName,
            "source.refactoring.range.kind.keyword-basename" => RenamePieceKind::KeywordBase,
            "source.refactoring.range.kind.parameter-and-whitespace" => RenamePieceKind::ParameterName,
            "source.refactoring.range.kind.noncollapsible-parameter" => RenamePieceKind::NoncollapsibleParameter,
            "source.refactoring.range.kind.decl-arg-label" => RenamePieceKind::DeclArgLabel,
            "source.refactoring.range.kind.call-arg-label" => RenamePieceKind::CallArgLabel,
            "source.refactoring.range.kind.call-arg-colon" => RenamePieceKind::CallArgColon,
            "source.refactoring.range.kind.call-arg-combined" => RenamePieceKind::CallArgCombined,
            "source.refactoring.range.kind.selector-arg-label" => RenamePieceKind::SelectorArgLabel,
            _ => return None,
        };
        let category = match value.get(self.keys.category).and_then(Value::as_str)? {
            "active-code" => PieceCategory::ActiveCode,
            "inactive" => PieceCategory::Inactive,
            "mismatch" => PieceCategory::Mismatch,
            "unmatched" => PieceCategory::Unmatched,
            "string-literal" => PieceCategory::StringLiteral,
            "comment" => PieceCategory::Comment,
            "selector" => PieceCategory::Selector,
            _ => return None,
        };
        let line = value.get(self.keys.line).and_then(Value::as_int)? as u32;
        let column = value.get(self.keys.column).and_then(Value::as_int)? as u32;
        let end_line = value.get(self.keys.end_line).and_then(Value::as_int).unwrap_or(line as i64) as u32;
        let end_column = value.get(self.keys.end_column).and_then(Value::as_int).unwrap_or(column as i64) as u32;
        let parameter_index = value.get(self.keys.arg_index).and_then(Value::as_int).map(|i| i as usize);
        Some(SyntacticRenamePiece {
            range: Range::new(Position::new(line, column), Position::new(end_line, end_column)),
            kind,
            category,
            parameter_index,
        })
    }

    fn cursor_info_request(&self, snapshot: &DocumentSnapshot, position: Position) -> CoreResult<Value> {
        let offset = snapshot
            .text
            .utf16_to_utf8_column(position)
            .map(|(_, col)| col as i64)
            .unwrap_or(0);
        let mut map = std::collections::HashMap::new();
        map.insert(self.keys.request, Value::Ident(self.keys.cursorinfo));
        map.insert(self.keys.source_file, Value::Str(snapshot.uri.to_string()));
        map.insert(self.keys.offset, Value::Int(offset));
        Ok(Value::Map(map))
    }
}

#[async_trait]
impl LanguageServiceAdapter for CompileDrivenAdapter {
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
        send_lsp_request(
            &self.channel,
            "textDocument/completion",
            &json!({ "textDocument": { "uri": snapshot.uri.to_string() }, "position": position }),
        )
        .await
    }

    async fn hover(&self, snapshot: &DocumentSnapshot, position: Position) -> CoreResult<Option<Hover>> {
        send_lsp_request(
            &self.channel,
            "textDocument/hover",
            &json!({ "textDocument": { "uri": snapshot.uri.to_string() }, "position": position }),
        )
        .await
    }

    async fn symbol_info(&self, snapshot: &DocumentSnapshot, position: Position) -> CoreResult<SymbolInfo> {
        let request = self.cursor_info_request(snapshot, position)?;
        let response = self.channel.send("source.request.cursorinfo", request).await?;
        let usr = response.as_map().and_then(|m| m.values().find_map(Value::as_str)).map(str::to_string);
        Ok(SymbolInfo {
            usrs: usr.into_iter().collect(),
            best_local_declaration: None,
            is_module: false,
            module_name: None,
        })
    }

    async fn definition(&self, snapshot: &DocumentSnapshot, position: Position) -> CoreResult<Vec<Location>> {
        let locations: Option<Vec<Location>> = send_lsp_request(
            &self.channel,
            "textDocument/definition",
            &json!({ "textDocument": { "uri": snapshot.uri.to_string() }, "position": position }),
        )
        .await?;
        Ok(locations.unwrap_or_default())
    }

    async fn declaration(&self, snapshot: &DocumentSnapshot, position: Position) -> CoreResult<Vec<Location>> {
        self.definition(snapshot, position).await
    }

    async fn references(&self, snapshot: &DocumentSnapshot, position: Position, include_declaration: bool) -> CoreResult<Vec<Location>> {
        let locations: Option<Vec<Location>> = send_lsp_request(
            &self.channel,
            "textDocument/references",
            &json!({
                "textDocument": { "uri": snapshot.uri.to_string() },
                "position": position,
                "context": { "includeDeclaration": include_declaration }
            }),
        )
        .await?;
        Ok(locations.unwrap_or_default())
    }

    async fn implementation(&self, snapshot: &DocumentSnapshot, position: Position) -> CoreResult<Vec<Location>> {
        self.definition(snapshot, position).await
    }

    async fn document_symbol(&self, snapshot: &DocumentSnapshot) -> CoreResult<Option<DocumentSymbolResponse>> {
        send_lsp_request(
            &self.channel,
            "textDocument/documentSymbol",
            &json!({ "textDocument": { "uri": snapshot.uri.to_string() } }),
        )
        .await
    }

    async fn document_highlight(&self, snapshot: &DocumentSnapshot, position: Position) -> CoreResult<Vec<DocumentHighlight>> {
        let highlights: Option<Vec<DocumentHighlight>> = send_lsp_request(
            &self.channel,
            "textDocument/documentHighlight",
            &json!({ "textDocument": { "uri": snapshot.uri.to_string() }, "position": position }),
        )
        .await?;
        Ok(highlights.unwrap_or_default())
    }

    async fn folding_range(&self, snapshot: &DocumentSnapshot) -> CoreResult<Vec<FoldingRange>> {
        let ranges: Option<Vec<FoldingRange>> = send_lsp_request(
            &self.channel,
            "textDocument/foldingRange",
            &json!({ "textDocument": { "uri": snapshot.uri.to_string() } }),
        )
        .await?;
        Ok(ranges.unwrap_or_default())
    }

    async fn semantic_tokens_full(&self, snapshot: &DocumentSnapshot) -> CoreResult<Option<SemanticTokensResult>> {
        send_lsp_request(
            &self.channel,
            "textDocument/semanticTokens/full",
            &json!({ "textDocument": { "uri": snapshot.uri.to_string() } }),
        )
        .await
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
        let colors: Option<Vec<ColorInformation>> = send_lsp_request(
            &self.channel,
            "textDocument/documentColor",
            &json!({ "textDocument": { "uri": snapshot.uri.to_string() } }),
        )
        .await?;
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
        let hints: Option<Vec<InlayHint>> = send_lsp_request(
            &self.channel,
            "textDocument/inlayHint",
            &json!({ "textDocument": { "uri": snapshot.uri.to_string() }, "range": range }),
        )
        .await?;
        Ok(hints.unwrap_or_default())
    }

    async fn document_diagnostic(&self, snapshot: &DocumentSnapshot) -> CoreResult<Vec<Diagnostic>> {
        let diagnostics: Option<Vec<Diagnostic>> = send_lsp_request(
            &self.channel,
            "textDocument/diagnostic",
            &json!({ "textDocument": { "uri": snapshot.uri.to_string() } }),
        )
        .await?;
        Ok(diagnostics.unwrap_or_default())
    }

    async fn execute_command(&self, command: &str, arguments: Vec<serde_json::Value>) -> CoreResult<Option<serde_json::Value>> {
        send_lsp_request(&self.channel, "workspace/executeCommand", &json!({ "command": command, "arguments": arguments })).await
    }

    async fn open_interface(&self, module_name: &str, usr: &Usr) -> CoreResult<InterfaceDocument> {
        let response: serde_json::Value = send_lsp_request(
            &self.channel,
            "source.request.editor.open.interface",
            &json!({ "moduleName": module_name, "usr": usr }),
        )
        .await?;
        let uri = response
            .get("uri")
            .and_then(serde_json::Value::as_str)
            .and_then(|s| DocumentUri::parse(s).ok())
            .unwrap_or_else(|| DocumentUri::parse("file:///unknown-interface").unwrap());
        Ok(InterfaceDocument {
            uri: uri.clone(),
            header_location: Location { uri: uri.into_url(), range: Range::new(Position::new(0, 0), Position::new(0, 0)) },
        })
    }

    async fn rename(&self, snapshot: &DocumentSnapshot, position: Position, new_name: &str) -> CoreResult<LocalRenameResult> {
        let response: serde_json::Value = send_lsp_request(
            &self.channel,
            "source.request.rename.local",
            &json!({ "textDocument": { "uri": snapshot.uri.to_string() }, "position": position, "newName": new_name }),
        )
        .await?;
        let edits: WorkspaceEdit = serde_json::from_value(response.get("edits").cloned().unwrap_or(serde_json::Value::Null)).unwrap_or_default();
        Ok(LocalRenameResult {
            edits,
            usr: response.get("usr").and_then(serde_json::Value::as_str).map(str::to_string),
            old_name: response.get("oldName").and_then(serde_json::Value::as_str).map(str::to_string),
        })
    }

    async fn prepare_rename(&self, snapshot: &DocumentSnapshot, position: Position) -> CoreResult<Option<PrepareRenameResult>> {
        let response: Option<serde_json::Value> = send_lsp_request(
            &self.channel,
            "textDocument/prepareRename",
            &json!({ "textDocument": { "uri": snapshot.uri.to_string() }, "position": position }),
        )
        .await?;
        Ok(response.and_then(|value| {
            let range: Range = serde_json::from_value(value.get("range")?.clone()).ok()?;
            let placeholder = value.get("placeholder")?.as_str()?.to_string();
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
        if locations.is_empty() {
            return Ok(Vec::new());
        }
        let request = self.find_syntactic_rename_ranges_request(locations, snapshot, old_name, new_name);
        let response = self.channel.send("source.request.find-syntactic-rename-ranges", request).await?;
        let names = response
            .get(self.keys.results)
            .and_then(Value::as_list)
            .map(|results| results.iter().map(|result| self.decode_name(result)).collect())
            .unwrap_or_default();
        Ok(names)
    }

    async fn document_updated_build_settings(&self, uris: &[DocumentUri]) {
        for uri in uris {
            let _ = self
                .channel
                .send_notification(
                    "workspace/didChangeBuildSettings",
                    Value::from_wire_json(json!({ "uri": uri.to_string() })).unwrap_or(Value::Null),
                )
                .await;
        }
    }

    async fn document_dependencies_updated(&self, uris: &[DocumentUri]) {
        for uri in uris {
            let _ = self
                .channel
                .send_notification(
                    "workspace/didChangeDependencies",
                    Value::from_wire_json(json!({ "uri": uri.to_string() })).unwrap_or(Value::Null),
                )
                .await;
        }
    }

    async fn can_handle(&self, workspace_root: &Url) -> bool {
        let _ = workspace_root;
        true
    }

    async fn shutdown(&self) -> CoreResult<()> {
        self.channel.send_notification("shutdown", Value::Null).await
    }
}
