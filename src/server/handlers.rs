use tower_lsp::jsonrpc;
use tower_lsp::lsp_types::request::{
    GotoDeclarationParams, GotoDeclarationResponse, GotoImplementationParams, GotoImplementationResponse,
};
use tower_lsp::lsp_types::{
    CallHierarchyIncomingCallsParams, CallHierarchyIncomingCall, CallHierarchyItem, CallHierarchyOutgoingCall,
    CallHierarchyOutgoingCallsParams, CallHierarchyPrepareParams, CodeActionParams, CodeActionResponse,
    ColorPresentationParams, CompletionParams, CompletionResponse, DidChangeConfigurationParams,
    DidChangeTextDocumentParams, DidChangeWatchedFilesParams, DidChangeWorkspaceFoldersParams,
    DidCloseTextDocumentParams, DidOpenTextDocumentParams, DidSaveTextDocumentParams, DocumentColorParams,
    DocumentHighlight, DocumentHighlightParams, DocumentSymbolParams, DocumentSymbolResponse,
    ExecuteCommandParams, FoldingRange, FoldingRangeParams, GotoDefinitionParams, GotoDefinitionResponse,
    Hover, HoverParams, InitializeParams, InitializeResult, InitializedParams, InlayHint, InlayHintParams,
    Location, PrepareRenameResponse, ReferenceParams, RenameParams, SemanticTokensDeltaParams,
    SemanticTokensDeltaResult, SemanticTokensFullDeltaResult, SemanticTokensParams, SemanticTokensRangeParams,
    SemanticTokensRangeResult, SemanticTokensResult, SymbolInformation, TextDocumentPositionParams,
    TypeHierarchyItem, TypeHierarchyPrepareParams, TypeHierarchySubtypesParams, TypeHierarchySupertypesParams,
    WorkspaceEdit, WorkspaceSymbolParams,
};

use crate::document::DocumentUri;
use crate::scheduler::DependencyTag;

use super::state::{tag_for, PolyglotBackend};

macro_rules! document_request {
    ($self:expr, $method:literal, $uri:expr, $work:expr) => {{
        let backend = $self.clone();
        $self.dispatch_request(tag_for($method, Some(&$uri)), move || async move { $work(backend).await }).await
    }};
}

#[tower_lsp::async_trait]
impl tower_lsp::LanguageServer for PolyglotBackend {
    async fn initialize(&self, params: InitializeParams) -> jsonrpc::Result<InitializeResult> {
        let folders: Vec<DocumentUri> = match params.workspace_folders {
            Some(folders) => folders.into_iter().map(|folder| DocumentUri::new(folder.uri)).collect(),
            None => params.root_uri.into_iter().map(DocumentUri::new).collect(),
        };
        let backend = self.clone();
        self.dispatch_request(tag_for("initialize", None), move || async move { backend.do_initialize(folders).await }).await
    }

    async fn initialized(&self, _params: InitializedParams) {
        let backend = self.clone();
        let _ = self
            .dispatch(tag_for("initialized", None), move || async move {
                backend.do_initialized().await;
                Ok(())
            })
            .await;
    }

    async fn shutdown(&self) -> jsonrpc::Result<()> {
        let backend = self.clone();
        self.dispatch_request(tag_for("shutdown", None), move || async move { backend.do_shutdown().await }).await
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = DocumentUri::new(params.text_document.uri);
        let language = params.text_document.language_id;
        let version = params.text_document.version;
        let text = params.text_document.text;
        let backend = self.clone();
        let _ = self
            .dispatch(tag_for("textDocument/didOpen", Some(&uri)), move || async move {
                backend.do_did_open(uri, language, version, text).await;
                Ok(())
            })
            .await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = DocumentUri::new(params.text_document.uri);
        let version = params.text_document.version;
        let changes = params.content_changes;
        let backend = self.clone();
        let _ = self
            .dispatch(tag_for("textDocument/didChange", Some(&uri)), move || async move {
                backend.do_did_change(uri, version, changes).await;
                Ok(())
            })
            .await;
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = DocumentUri::new(params.text_document.uri);
        let backend = self.clone();
        let _ = self
            .dispatch(tag_for("textDocument/didSave", Some(&uri)), move || async move {
                backend.do_did_save(uri).await;
                Ok(())
            })
            .await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = DocumentUri::new(params.text_document.uri);
        let backend = self.clone();
        let _ = self
            .dispatch(tag_for("textDocument/didClose", Some(&uri)), move || async move {
                backend.do_did_close(uri).await;
                Ok(())
            })
            .await;
    }

    async fn did_change_configuration(&self, _params: DidChangeConfigurationParams) {
        let _ = self.dispatch(tag_for("workspace/didChangeConfiguration", None), move || async move { Ok(()) }).await;
    }

    async fn did_change_watched_files(&self, _params: DidChangeWatchedFilesParams) {
        let backend = self.clone();
        let _ = self
            .dispatch(DependencyTag::GlobalConfig, move || async move {
                backend.do_did_change_watched_files().await;
                Ok(())
            })
            .await;
    }

    async fn did_change_workspace_folders(&self, params: DidChangeWorkspaceFoldersParams) {
        let added = params.event.added.into_iter().map(|folder| DocumentUri::new(folder.uri)).collect();
        let removed = params.event.removed.into_iter().map(|folder| DocumentUri::new(folder.uri)).collect();
        let backend = self.clone();
        let _ = self
            .dispatch(tag_for("workspace/didChangeWorkspaceFolders", None), move || async move {
                backend.do_did_change_workspace_folders(added, removed).await;
                Ok(())
            })
            .await;
    }

    async fn completion(&self, params: CompletionParams) -> jsonrpc::Result<Option<CompletionResponse>> {
        let uri = DocumentUri::new(params.text_document_position.text_document.uri);
        let position = params.text_document_position.position;
        document_request!(self, "textDocument/completion", uri, |b: PolyglotBackend| async move { b.do_completion(uri, position).await })
    }

    async fn hover(&self, params: HoverParams) -> jsonrpc::Result<Option<Hover>> {
        let uri = DocumentUri::new(params.text_document_position_params.text_document.uri);
        let position = params.text_document_position_params.position;
        document_request!(self, "textDocument/hover", uri, |b: PolyglotBackend| async move { b.do_hover(uri, position).await })
    }

    async fn goto_definition(&self, params: GotoDefinitionParams) -> jsonrpc::Result<Option<GotoDefinitionResponse>> {
        let uri = DocumentUri::new(params.text_document_position_params.text_document.uri);
        let position = params.text_document_position_params.position;
        let locations: Vec<Location> = document_request!(self, "textDocument/definition", uri, |b: PolyglotBackend| async move {
            b.do_definition(uri, position).await
        })?;
        Ok(locations_response(locations))
    }

    async fn goto_declaration(&self, params: GotoDeclarationParams) -> jsonrpc::Result<Option<GotoDeclarationResponse>> {
        let uri = DocumentUri::new(params.text_document_position_params.text_document.uri);
        let position = params.text_document_position_params.position;
        let locations: Vec<Location> = document_request!(self, "textDocument/declaration", uri, |b: PolyglotBackend| async move {
            b.do_declaration(uri, position).await
        })?;
        Ok(locations_response(locations))
    }

    async fn goto_implementation(&self, params: GotoImplementationParams) -> jsonrpc::Result<Option<GotoImplementationResponse>> {
        let uri = DocumentUri::new(params.text_document_position_params.text_document.uri);
        let position = params.text_document_position_params.position;
        let locations: Vec<Location> = document_request!(self, "textDocument/implementation", uri, |b: PolyglotBackend| async move {
            b.do_implementation(uri, position).await
        })?;
        Ok(locations_response(locations))
    }

    async fn references(&self, params: ReferenceParams) -> jsonrpc::Result<Option<Vec<Location>>> {
        let uri = DocumentUri::new(params.text_document_position.text_document.uri);
        let position = params.text_document_position.position;
        let include_declaration = params.context.include_declaration;
        let locations = document_request!(self, "textDocument/references", uri, |b: PolyglotBackend| async move {
            b.do_references(uri, position, include_declaration).await
        })?;
        Ok(Some(locations))
    }

    async fn document_symbol(&self, params: DocumentSymbolParams) -> jsonrpc::Result<Option<DocumentSymbolResponse>> {
        let uri = DocumentUri::new(params.text_document.uri);
        document_request!(self, "textDocument/documentSymbol", uri, |b: PolyglotBackend| async move { b.do_document_symbol(uri).await })
    }

    async fn symbol(&self, params: WorkspaceSymbolParams) -> jsonrpc::Result<Option<Vec<SymbolInformation>>> {
        let query = params.query;
        let backend = self.clone();
        let results = self
            .dispatch_request(tag_for("workspace/symbol", None), move || async move { Ok(backend.do_workspace_symbol(query).await) })
            .await?;
        Ok(Some(results))
    }

    async fn document_highlight(&self, params: DocumentHighlightParams) -> jsonrpc::Result<Option<Vec<DocumentHighlight>>> {
        let uri = DocumentUri::new(params.text_document_position_params.text_document.uri);
        let position = params.text_document_position_params.position;
        let highlights = document_request!(self, "textDocument/documentHighlight", uri, |b: PolyglotBackend| async move {
            b.do_document_highlight(uri, position).await
        })?;
        Ok(Some(highlights))
    }

    async fn folding_range(&self, params: FoldingRangeParams) -> jsonrpc::Result<Option<Vec<FoldingRange>>> {
        let uri = DocumentUri::new(params.text_document.uri);
        let ranges = document_request!(self, "textDocument/foldingRange", uri, |b: PolyglotBackend| async move { b.do_folding_range(uri).await })?;
        Ok(Some(ranges))
    }

    async fn semantic_tokens_full(&self, params: SemanticTokensParams) -> jsonrpc::Result<Option<SemanticTokensResult>> {
        let uri = DocumentUri::new(params.text_document.uri);
        document_request!(self, "textDocument/semanticTokens/full", uri, |b: PolyglotBackend| async move {
            b.do_semantic_tokens_full(uri).await
        })
    }

    async fn semantic_tokens_full_delta(&self, params: SemanticTokensDeltaParams) -> jsonrpc::Result<Option<SemanticTokensFullDeltaResult>> {
        let uri = DocumentUri::new(params.text_document.uri);
        let previous_result_id = params.previous_result_id;
        let result = document_request!(self, "textDocument/semanticTokens/full/delta", uri, |b: PolyglotBackend| async move {
            b.do_semantic_tokens_delta(uri, previous_result_id).await
        })?;
        Ok(result.map(|delta| match delta {
            SemanticTokensDeltaResult::Tokens(tokens) => SemanticTokensFullDeltaResult::Tokens(tokens),
            SemanticTokensDeltaResult::TokensDelta(delta) => SemanticTokensFullDeltaResult::TokensDelta(delta),
            SemanticTokensDeltaResult::PartialTokensDelta { edits } => SemanticTokensFullDeltaResult::PartialTokensDelta { edits },
        }))
    }

    async fn semantic_tokens_range(&self, params: SemanticTokensRangeParams) -> jsonrpc::Result<Option<SemanticTokensRangeResult>> {
        let uri = DocumentUri::new(params.text_document.uri);
        let range = params.range;
        document_request!(self, "textDocument/semanticTokens/range", uri, |b: PolyglotBackend| async move {
            b.do_semantic_tokens_range(uri, range).await
        })
    }

    async fn document_color(&self, params: DocumentColorParams) -> jsonrpc::Result<Vec<tower_lsp::lsp_types::ColorInformation>> {
        let uri = DocumentUri::new(params.text_document.uri);
        document_request!(self, "textDocument/documentColor", uri, |b: PolyglotBackend| async move { b.do_document_color(uri).await })
    }

    async fn color_presentation(&self, params: ColorPresentationParams) -> jsonrpc::Result<Vec<tower_lsp::lsp_types::ColorPresentation>> {
        let uri = DocumentUri::new(params.text_document.uri);
        let color = params.color;
        document_request!(self, "textDocument/colorPresentation", uri, |b: PolyglotBackend| async move {
            b.do_color_presentation(uri, color).await
        })
    }

    async fn code_action(&self, params: CodeActionParams) -> jsonrpc::Result<Option<CodeActionResponse>> {
        let uri = DocumentUri::new(params.text_document.uri);
        let range = params.range;
        document_request!(self, "textDocument/codeAction", uri, |b: PolyglotBackend| async move { b.do_code_action(uri, range).await })
    }

    async fn inlay_hint(&self, params: InlayHintParams) -> jsonrpc::Result<Option<Vec<InlayHint>>> {
        let uri = DocumentUri::new(params.text_document.uri);
        let range = params.range;
        let hints = document_request!(self, "textDocument/inlayHint", uri, |b: PolyglotBackend| async move { b.do_inlay_hint(uri, range).await })?;
        Ok(Some(hints))
    }

    async fn rename(&self, params: RenameParams) -> jsonrpc::Result<Option<WorkspaceEdit>> {
        let uri = DocumentUri::new(params.text_document_position.text_document.uri);
        let position = params.text_document_position.position;
        let new_name = params.new_name;
        let edit = document_request!(self, "textDocument/rename", uri, |b: PolyglotBackend| async move {
            b.do_rename(uri, position, new_name).await
        })?;
        Ok(Some(edit))
    }

    async fn prepare_rename(&self, params: TextDocumentPositionParams) -> jsonrpc::Result<Option<PrepareRenameResponse>> {
        let uri = DocumentUri::new(params.text_document.uri);
        let position = params.position;
        document_request!(self, "textDocument/prepareRename", uri, |b: PolyglotBackend| async move {
            b.do_prepare_rename(uri, position).await
        })
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> jsonrpc::Result<Option<serde_json::Value>> {
        let command = params.command;
        let arguments = params.arguments;
        let tag = match PolyglotBackend::execute_command_uri(&arguments) {
            Some(uri) => tag_for("workspace/executeCommand", Some(&uri)),
            None => DependencyTag::Freestanding,
        };
        let backend = self.clone();
        self.dispatch_request(tag, move || async move { backend.do_execute_command(command, arguments).await }).await
    }

    async fn prepare_call_hierarchy(&self, params: CallHierarchyPrepareParams) -> jsonrpc::Result<Option<Vec<CallHierarchyItem>>> {
        let uri = DocumentUri::new(params.text_document_position_params.text_document.uri);
        let position = params.text_document_position_params.position;
        let items = document_request!(self, "textDocument/prepareCallHierarchy", uri, |b: PolyglotBackend| async move {
            b.do_prepare_call_hierarchy(uri, position).await
        })?;
        Ok(if items.is_empty() { None } else { Some(items) })
    }

    async fn incoming_calls(&self, params: CallHierarchyIncomingCallsParams) -> jsonrpc::Result<Option<Vec<CallHierarchyIncomingCall>>> {
        let backend = self.clone();
        let item = params.item;
        let calls = self
            .dispatch_request(DependencyTag::Freestanding, move || async move { backend.do_incoming_calls(item).await })
            .await?;
        Ok(Some(calls))
    }

    async fn outgoing_calls(&self, params: CallHierarchyOutgoingCallsParams) -> jsonrpc::Result<Option<Vec<CallHierarchyOutgoingCall>>> {
        let backend = self.clone();
        let item = params.item;
        let calls = self
            .dispatch_request(DependencyTag::Freestanding, move || async move { backend.do_outgoing_calls(item).await })
            .await?;
        Ok(Some(calls))
    }

    async fn prepare_type_hierarchy(&self, params: TypeHierarchyPrepareParams) -> jsonrpc::Result<Option<Vec<TypeHierarchyItem>>> {
        let uri = DocumentUri::new(params.text_document_position_params.text_document.uri);
        let position = params.text_document_position_params.position;
        let items = document_request!(self, "textDocument/prepareTypeHierarchy", uri, |b: PolyglotBackend| async move {
            b.do_prepare_type_hierarchy(uri, position).await
        })?;
        Ok(if items.is_empty() { None } else { Some(items) })
    }

    async fn supertypes(&self, params: TypeHierarchySupertypesParams) -> jsonrpc::Result<Option<Vec<TypeHierarchyItem>>> {
        let backend = self.clone();
        let item = params.item;
        let items = self
            .dispatch_request(DependencyTag::Freestanding, move || async move { backend.do_supertypes(item).await })
            .await?;
        Ok(Some(items))
    }

    async fn subtypes(&self, params: TypeHierarchySubtypesParams) -> jsonrpc::Result<Option<Vec<TypeHierarchyItem>>> {
        let backend = self.clone();
        let item = params.item;
        let items = self
            .dispatch_request(DependencyTag::Freestanding, move || async move { backend.do_subtypes(item).await })
            .await?;
        Ok(Some(items))
    }
}

fn locations_response(locations: Vec<Location>) -> Option<GotoDefinitionResponse> {
    if locations.is_empty() {
        None
    } else {
        Some(GotoDefinitionResponse::Array(locations))
    }
}
