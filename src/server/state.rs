use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value as Json;
use tower_lsp::lsp_types::{
    CallHierarchyIncomingCall, CallHierarchyItem, CallHierarchyOutgoingCall, CodeActionResponse,
    ColorInformation, ColorPresentation, CompletionResponse, Diagnostic, DocumentHighlight,
    DocumentSymbolResponse, FoldingRange, Hover, InlayHint, Location, PrepareRenameResponse, Position,
    Range, SemanticTokensDeltaResult, SemanticTokensRangeResult, SemanticTokensResult, SymbolInformation,
    SymbolKind, TypeHierarchyItem, WorkspaceEdit,
};
use tower_lsp::{jsonrpc, Client};
use tracing::warn;

use crate::adapter::{LanguageServiceAdapter, PrepareRenameResult};
use crate::buildsystem::{BuildSystem, CompilationDatabaseBuildSystem, NullBuildSystem};
use crate::capabilities::static_server_capabilities;
use crate::document::{DocumentManager, DocumentSnapshot, DocumentUri};
use crate::error::{CoreError, CoreResult};
use crate::index::SymbolIndex;
use crate::navigation::{self, HierarchyItemData};
use crate::progress::{ClientProgressTransport, WorkDoneProgress_};
use crate::registry::{BackendPaths, ServiceRegistry};
use crate::rename;
use crate::scheduler::{classify, DependencyTag, MethodClass, Scheduler};
use crate::types::{language_for_extension, BackendKind};
use crate::workspace::{Workspace, WorkspaceRegistry};

/// Builds the dependency tag a scheduled handler runs under, per the
/// classification table in §4.1. Document-scoped methods must be
/// called with a URI; it is a programmer error to omit one for them.
pub(super) fn tag_for(method: &str, uri: Option<&DocumentUri>) -> DependencyTag {
    match classify(method) {
        MethodClass::GlobalConfig => DependencyTag::GlobalConfig,
        MethodClass::DocumentUpdate => {
            DependencyTag::DocumentUpdate(uri.cloned().expect("document-update method requires a uri"))
        }
        MethodClass::DocumentRequest => {
            DependencyTag::DocumentRequest(uri.cloned().expect("document-request method requires a uri"))
        }
        MethodClass::Freestanding => DependencyTag::Freestanding,
    }
}

fn implicit_root(uri: &DocumentUri) -> DocumentUri {
    match uri.path().and_then(|path| path.parent().map(Path::to_path_buf)) {
        Some(parent) => DocumentUri::from_file_path(parent).unwrap_or_else(|| uri.clone()),
        None => uri.clone(),
    }
}

fn hierarchy_item(location: Location, data: HierarchyItemData) -> CallHierarchyItem {
    CallHierarchyItem {
        name: data.usr.clone(),
        kind: SymbolKind::FUNCTION,
        tags: None,
        detail: None,
        uri: location.uri,
        range: location.range,
        selection_range: location.range,
        data: serde_json::to_value(&data).ok(),
    }
}

fn type_hierarchy_item(location: Location, data: HierarchyItemData) -> TypeHierarchyItem {
    TypeHierarchyItem {
        name: data.usr.clone(),
        kind: SymbolKind::CLASS,
        tags: None,
        detail: None,
        uri: location.uri,
        range: location.range,
        selection_range: location.range,
        data: serde_json::to_value(&data).ok(),
    }
}

/// The `tower_lsp::LanguageServer` implementation's owning struct.
/// Every field is itself cheaply clonable so the whole backend is
/// `Clone` (tower-lsp hands out one instance per connection and clones
/// it into every spawned handler task).
#[derive(Clone)]
pub struct PolyglotBackend {
    pub(super) client: Client,
    pub(super) scheduler: Arc<Scheduler>,
    pub(super) documents: Arc<DocumentManager>,
    pub(super) workspaces: Arc<WorkspaceRegistry>,
    pub(super) registry: Arc<ServiceRegistry>,
    progress: Arc<WorkDoneProgress_>,
    no_progress: bool,
    shutting_down: Arc<AtomicBool>,
}

impl PolyglotBackend {
    pub fn new(client: Client, backend_paths: BackendPaths, no_progress: bool) -> Self {
        Self::with_scheduler(client, backend_paths, no_progress, Scheduler::new())
    }

    /// Builds a backend against an externally constructed scheduler, so
    /// the caller (`main.rs`) can share the same cancellation lane with
    /// the transport-level `$/cancelRequest` sniffer wrapped around its
    /// reader.
    pub fn with_scheduler(client: Client, backend_paths: BackendPaths, no_progress: bool, scheduler: Arc<Scheduler>) -> Self {
        let progress = Arc::new(WorkDoneProgress_::new(
            "polyglot-lsp/adapter-startup",
            "Starting language backend",
            Box::new(ClientProgressTransport::new(client.clone())),
        ));
        let documents = Arc::new(DocumentManager::new());
        Self {
            scheduler,
            registry: Arc::new(ServiceRegistry::new(documents.clone(), backend_paths)),
            documents,
            workspaces: Arc::new(WorkspaceRegistry::new()),
            progress,
            no_progress,
            shutting_down: Arc::new(AtomicBool::new(false)),
            client,
        }
    }

    /// Runs `task` on the scheduler under `tag`, translating a join
    /// failure into an internal error and a [`CoreError`] into its
    /// `jsonrpc::Error` form (§7). For notifications only — they carry
    /// no wire request id, so they are never cancellable.
    pub(super) async fn dispatch<F, Fut, T>(&self, tag: DependencyTag, task: F) -> jsonrpc::Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = CoreResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        match self.scheduler.schedule(tag, task).await {
            Ok(result) => result.map_err(jsonrpc::Error::from),
            Err(_join_err) => Err(jsonrpc::Error::internal_error()),
        }
    }

    /// Like [`Self::dispatch`], but for genuine requests: races `task`
    /// against `$/cancelRequest` via the scheduler's cancellation lane
    /// (§4.1).
    pub(super) async fn dispatch_request<F, Fut, T>(&self, tag: DependencyTag, task: F) -> jsonrpc::Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = CoreResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        self.scheduler.schedule_cancellable(tag, task).await.map_err(jsonrpc::Error::from)
    }

    async fn ensure_workspace(&self, root: DocumentUri) -> Arc<Workspace> {
        for workspace in self.workspaces.all() {
            if workspace.root == root {
                return workspace;
            }
        }
        let build_system: Arc<dyn BuildSystem> = match root.path() {
            Some(path) => Arc::new(CompilationDatabaseBuildSystem::load(&path)),
            None => Arc::new(NullBuildSystem),
        };
        let workspace = Arc::new(Workspace::new(root, build_system, None));
        self.workspaces.add(workspace.clone());
        workspace
    }

    async fn workspace_for(&self, uri: &DocumentUri) -> CoreResult<Arc<Workspace>> {
        match self.workspaces.workspace_for(uri).await {
            Some(workspace) => Ok(workspace),
            None => Ok(self.ensure_workspace(implicit_root(uri)).await),
        }
    }

    async fn workspace_and_kind(&self, uri: &DocumentUri) -> Option<(Arc<Workspace>, BackendKind)> {
        let workspace = self.workspaces.workspace_for(uri).await?;
        let kind = workspace.assigned_backend(uri)?;
        Some((workspace, kind))
    }

    /// Wraps adapter creation/reuse in work-done progress (§4.9): the
    /// first document in a language a workspace sees may have to spawn
    /// and `initialize` a backend process, which is exactly the
    /// latency work-done progress exists to surface.
    async fn adapter_for(&self, workspace: &Arc<Workspace>, language: &str) -> CoreResult<Arc<dyn LanguageServiceAdapter>> {
        let already_running = BackendKind::for_language(language).and_then(|kind| workspace.adapter(kind)).is_some();
        if self.no_progress || already_running {
            return self.registry.get(language, workspace).await;
        }
        self.progress.start().await;
        let result = self.registry.get(language, workspace).await;
        self.progress.end_one().await;
        result
    }

    async fn snapshot_adapter(&self, uri: &DocumentUri) -> CoreResult<(Arc<dyn LanguageServiceAdapter>, Arc<DocumentSnapshot>)> {
        let snapshot = self.documents.latest(uri)?;
        let workspace = self.workspace_for(uri).await?;
        let adapter = self.adapter_for(&workspace, &snapshot.language).await?;
        Ok((adapter, snapshot))
    }

    async fn publish_diagnostics(&self, adapter: &Arc<dyn LanguageServiceAdapter>, snapshot: &DocumentSnapshot) {
        match adapter.document_diagnostic(snapshot).await {
            Ok(diagnostics) => {
                self.client
                    .publish_diagnostics(snapshot.uri.as_url().clone(), diagnostics, Some(snapshot.version))
                    .await;
            }
            Err(err) => warn!(uri = %snapshot.uri, %err, "diagnostics request failed"),
        }
    }

    pub(super) async fn do_initialize(
        &self,
        folders: Vec<DocumentUri>,
    ) -> CoreResult<tower_lsp::lsp_types::InitializeResult> {
        for root in folders {
            self.ensure_workspace(root).await;
        }
        Ok(tower_lsp::lsp_types::InitializeResult {
            capabilities: static_server_capabilities(),
            server_info: Some(tower_lsp::lsp_types::ServerInfo {
                name: "polyglot-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            ..Default::default()
        })
    }

    pub(super) async fn do_initialized(&self) {
        for workspace in self.workspaces.all() {
            self.register_file_watchers(&workspace).await;
        }
    }

    async fn register_file_watchers(&self, workspace: &Arc<Workspace>) {
        use tower_lsp::lsp_types::{
            DidChangeWatchedFilesRegistrationOptions, FileSystemWatcher, GlobPattern, Registration, WatchKind,
        };

        let mut watchers = Vec::new();
        for kind in [BackendKind::CompileDriven, BackendKind::CFamily] {
            for extension in crate::types::watched_extensions(kind) {
                watchers.push(FileSystemWatcher { glob_pattern: GlobPattern::String(format!("**/*.{extension}")), kind: None });
            }
            watchers.push(FileSystemWatcher {
                glob_pattern: GlobPattern::String(format!("**/{}", crate::types::manifest_filename(kind))),
                kind: Some(WatchKind::Change),
            });
        }
        watchers.push(FileSystemWatcher {
            glob_pattern: GlobPattern::String("**/compile_commands.json".to_string()),
            kind: Some(WatchKind::Change),
        });
        watchers.push(FileSystemWatcher {
            glob_pattern: GlobPattern::String("**/compile_flags.txt".to_string()),
            kind: Some(WatchKind::Change),
        });

        let registration = Registration {
            id: format!("watched-files-{}", workspace.root),
            method: "workspace/didChangeWatchedFiles".to_string(),
            register_options: serde_json::to_value(DidChangeWatchedFilesRegistrationOptions { watchers }).ok(),
        };
        if let Err(err) = self.client.register_capability(vec![registration]).await {
            warn!(%err, "failed to register workspace/didChangeWatchedFiles");
        }
    }

    pub(super) async fn do_shutdown(&self) -> CoreResult<()> {
        self.shutting_down.store(true, Ordering::SeqCst);
        for workspace in self.workspaces.all() {
            for kind in [BackendKind::CompileDriven, BackendKind::CFamily] {
                if let Some(adapter) = workspace.adapter(kind) {
                    let _ = adapter.shutdown().await;
                }
            }
        }
        Ok(())
    }

    pub(super) async fn do_did_open(&self, uri: DocumentUri, language: String, version: i32, text: String) {
        self.documents.open(uri.clone(), language.clone(), version, &text);
        let Some(kind) = BackendKind::for_language(&language) else {
            warn!(%uri, %language, "no backend supports this language; buffer tracked without an adapter");
            return;
        };
        let workspace = match self.workspace_for(&uri).await {
            Ok(workspace) => workspace,
            Err(err) => {
                warn!(%uri, %err, "failed to resolve workspace for opened document");
                return;
            }
        };
        workspace.assign_backend(uri.clone(), kind);
        let adapter = match self.adapter_for(&workspace, &language).await {
            Ok(adapter) => adapter,
            Err(err) => {
                warn!(%uri, %err, "failed to obtain adapter for opened document");
                return;
            }
        };
        let Ok(snapshot) = self.documents.latest(&uri) else { return };
        if let Err(err) = adapter.did_open(&snapshot).await {
            warn!(%uri, %err, "adapter did_open failed");
            return;
        }
        self.publish_diagnostics(&adapter, &snapshot).await;
    }

    pub(super) async fn do_did_change(
        &self,
        uri: DocumentUri,
        version: i32,
        changes: Vec<tower_lsp::lsp_types::TextDocumentContentChangeEvent>,
    ) {
        let snapshot = match self.documents.edit(&uri, version, changes) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(%uri, %err, "rejected document edit");
                return;
            }
        };
        let Some((workspace, kind)) = self.workspace_and_kind(&uri).await else { return };
        let Some(adapter) = workspace.adapter(kind) else { return };
        if let Err(err) = adapter.did_change(&snapshot).await {
            warn!(%uri, %err, "adapter did_change failed");
            return;
        }
        self.publish_diagnostics(&adapter, &snapshot).await;
    }

    pub(super) async fn do_did_save(&self, uri: DocumentUri) {
        if let Some((workspace, kind)) = self.workspace_and_kind(&uri).await {
            if let Some(adapter) = workspace.adapter(kind) {
                if let Err(err) = adapter.did_save(&uri).await {
                    warn!(%uri, %err, "adapter did_save failed");
                }
            }
        }
    }

    pub(super) async fn do_did_close(&self, uri: DocumentUri) {
        if let Some((workspace, kind)) = self.workspace_and_kind(&uri).await {
            if let Some(adapter) = workspace.adapter(kind) {
                if let Err(err) = adapter.did_close(&uri).await {
                    warn!(%uri, %err, "adapter did_close failed");
                }
            }
            workspace.forget_document(&uri);
        }
        if let Err(err) = self.documents.close(&uri) {
            warn!(%uri, %err, "close of a document that was not open");
        }
        self.client.publish_diagnostics(uri.into_url(), Vec::new(), None).await;
    }

    pub(super) async fn do_completion(&self, uri: DocumentUri, position: Position) -> CoreResult<Option<CompletionResponse>> {
        let (adapter, snapshot) = self.snapshot_adapter(&uri).await?;
        adapter.completion(&snapshot, position).await
    }

    pub(super) async fn do_hover(&self, uri: DocumentUri, position: Position) -> CoreResult<Option<Hover>> {
        let (adapter, snapshot) = self.snapshot_adapter(&uri).await?;
        adapter.hover(&snapshot, position).await
    }

    pub(super) async fn do_definition(&self, uri: DocumentUri, position: Position) -> CoreResult<Vec<Location>> {
        let (adapter, snapshot) = self.snapshot_adapter(&uri).await?;
        let workspace = self.workspace_for(&uri).await?;
        navigation::definition(adapter.as_ref(), workspace.index.as_deref(), &self.documents, &language_for_extension, &snapshot, position).await
    }

    pub(super) async fn do_declaration(&self, uri: DocumentUri, position: Position) -> CoreResult<Vec<Location>> {
        let (adapter, snapshot) = self.snapshot_adapter(&uri).await?;
        adapter.declaration(&snapshot, position).await
    }

    pub(super) async fn do_implementation(&self, uri: DocumentUri, position: Position) -> CoreResult<Vec<Location>> {
        let (adapter, snapshot) = self.snapshot_adapter(&uri).await?;
        let workspace = self.workspace_for(&uri).await?;
        navigation::implementation(adapter.as_ref(), workspace.index.as_deref(), &self.documents, &language_for_extension, &snapshot, position).await
    }

    pub(super) async fn do_references(&self, uri: DocumentUri, position: Position, include_declaration: bool) -> CoreResult<Vec<Location>> {
        let (adapter, snapshot) = self.snapshot_adapter(&uri).await?;
        let workspace = self.workspace_for(&uri).await?;
        navigation::references(adapter.as_ref(), workspace.index.as_deref(), &self.documents, &language_for_extension, &snapshot, position, include_declaration).await
    }

    pub(super) async fn do_document_symbol(&self, uri: DocumentUri) -> CoreResult<Option<DocumentSymbolResponse>> {
        let (adapter, snapshot) = self.snapshot_adapter(&uri).await?;
        adapter.document_symbol(&snapshot).await
    }

    pub(super) async fn do_workspace_symbol(&self, query: String) -> Vec<SymbolInformation> {
        let workspaces = self.workspaces.all();
        let occurrences = navigation::workspace_symbols(&workspaces, &query).await;
        let mut results = Vec::with_capacity(occurrences.len());
        for occurrence in &occurrences {
            let Some(location) = navigation::resolve_occurrence_location(&self.documents, &language_for_extension, occurrence).await else {
                continue;
            };
            #[allow(deprecated)]
            results.push(SymbolInformation {
                name: occurrence.symbol_name.clone(),
                kind: SymbolKind::VARIABLE,
                tags: None,
                deprecated: None,
                location,
                container_name: None,
            });
        }
        results
    }

    pub(super) async fn do_document_highlight(&self, uri: DocumentUri, position: Position) -> CoreResult<Vec<DocumentHighlight>> {
        let (adapter, snapshot) = self.snapshot_adapter(&uri).await?;
        adapter.document_highlight(&snapshot, position).await
    }

    pub(super) async fn do_folding_range(&self, uri: DocumentUri) -> CoreResult<Vec<FoldingRange>> {
        let (adapter, snapshot) = self.snapshot_adapter(&uri).await?;
        adapter.folding_range(&snapshot).await
    }

    pub(super) async fn do_semantic_tokens_full(&self, uri: DocumentUri) -> CoreResult<Option<SemanticTokensResult>> {
        let (adapter, snapshot) = self.snapshot_adapter(&uri).await?;
        adapter.semantic_tokens_full(&snapshot).await
    }

    pub(super) async fn do_semantic_tokens_range(&self, uri: DocumentUri, range: Range) -> CoreResult<Option<SemanticTokensRangeResult>> {
        let (adapter, snapshot) = self.snapshot_adapter(&uri).await?;
        adapter.semantic_tokens_range(&snapshot, range).await
    }

    pub(super) async fn do_semantic_tokens_delta(&self, uri: DocumentUri, previous_result_id: String) -> CoreResult<Option<SemanticTokensDeltaResult>> {
        let (adapter, snapshot) = self.snapshot_adapter(&uri).await?;
        adapter.semantic_tokens_delta(&snapshot, &previous_result_id).await
    }

    pub(super) async fn do_document_color(&self, uri: DocumentUri) -> CoreResult<Vec<ColorInformation>> {
        let (adapter, snapshot) = self.snapshot_adapter(&uri).await?;
        adapter.document_color(&snapshot).await
    }

    pub(super) async fn do_color_presentation(&self, uri: DocumentUri, color: ColorInformation) -> CoreResult<Vec<ColorPresentation>> {
        let (adapter, snapshot) = self.snapshot_adapter(&uri).await?;
        adapter.color_presentation(&snapshot, color).await
    }

    pub(super) async fn do_code_action(&self, uri: DocumentUri, range: Range) -> CoreResult<Option<CodeActionResponse>> {
        let (adapter, snapshot) = self.snapshot_adapter(&uri).await?;
        adapter.code_action(&snapshot, range).await
    }

    pub(super) async fn do_inlay_hint(&self, uri: DocumentUri, range: Range) -> CoreResult<Vec<InlayHint>> {
        let (adapter, snapshot) = self.snapshot_adapter(&uri).await?;
        adapter.inlay_hint(&snapshot, range).await
    }

    pub(super) async fn do_rename(&self, uri: DocumentUri, position: Position, new_name: String) -> CoreResult<WorkspaceEdit> {
        let (adapter, snapshot) = self.snapshot_adapter(&uri).await?;
        let workspace = self.workspace_for(&uri).await?;
        rename::rename(adapter.as_ref(), &self.documents, workspace.index.as_deref(), language_for_extension, &snapshot, position, &new_name).await
    }

    pub(super) async fn do_prepare_rename(&self, uri: DocumentUri, position: Position) -> CoreResult<Option<PrepareRenameResponse>> {
        let (adapter, snapshot) = self.snapshot_adapter(&uri).await?;
        let result: Option<PrepareRenameResult> = adapter.prepare_rename(&snapshot, position).await?;
        Ok(result.map(|r| PrepareRenameResponse::RangeWithPlaceholder { range: r.range, placeholder: r.placeholder }))
    }

    /// Extracts a document URI from a `workspace/executeCommand`
    /// argument list to pick this call's dependency tag (§4.1): a
    /// command whose arguments name a document is a `DocumentRequest`
    /// for that URI, matching the classification table; a command with
    /// no recognizable document argument is scheduled `Freestanding`
    /// instead of refused, since the classification table does not
    /// give commands without arguments a home of their own.
    pub(super) fn execute_command_uri(arguments: &[Json]) -> Option<DocumentUri> {
        arguments.iter().find_map(|argument| {
            argument.get("uri").and_then(Json::as_str).and_then(|uri| DocumentUri::parse(uri).ok())
        })
    }

    pub(super) async fn do_execute_command(&self, command: String, arguments: Vec<Json>) -> CoreResult<Option<Json>> {
        let Some(uri) = Self::execute_command_uri(&arguments) else {
            return Err(CoreError::Internal(format!("command {command} has no adapter to run against")));
        };
        let (adapter, _snapshot) = self.snapshot_adapter(&uri).await?;
        adapter.execute_command(&command, arguments).await
    }

    pub(super) async fn do_did_change_watched_files(&self) {
        self.workspaces.invalidate_cache();
    }

    pub(super) async fn do_did_change_workspace_folders(&self, added: Vec<DocumentUri>, removed: Vec<DocumentUri>) {
        for root in added {
            self.ensure_workspace(root).await;
        }
        for root in removed {
            self.workspaces.remove(&root);
        }
    }

    fn decode_hierarchy_item(item: &CallHierarchyItem) -> CoreResult<HierarchyItemData> {
        let data = item.data.clone().ok_or_else(|| CoreError::Internal("call hierarchy item missing data".into()))?;
        serde_json::from_value(data).map_err(|err| CoreError::Internal(err.to_string()))
    }

    fn decode_type_hierarchy_item(item: &TypeHierarchyItem) -> CoreResult<HierarchyItemData> {
        let data = item.data.clone().ok_or_else(|| CoreError::Internal("type hierarchy item missing data".into()))?;
        serde_json::from_value(data).map_err(|err| CoreError::Internal(err.to_string()))
    }

    pub(super) async fn do_prepare_call_hierarchy(&self, uri: DocumentUri, position: Position) -> CoreResult<Vec<CallHierarchyItem>> {
        let (adapter, snapshot) = self.snapshot_adapter(&uri).await?;
        let workspace = self.workspace_for(&uri).await?;
        let items = navigation::prepare_hierarchy(adapter.as_ref(), workspace.index.as_deref(), &self.documents, &language_for_extension, &snapshot, position).await?;
        Ok(items.into_iter().map(|(location, data)| hierarchy_item(location, data)).collect())
    }

    pub(super) async fn do_incoming_calls(&self, item: CallHierarchyItem) -> CoreResult<Vec<CallHierarchyIncomingCall>> {
        let data = Self::decode_hierarchy_item(&item)?;
        let uri = DocumentUri::parse(&data.uri).map_err(|err| CoreError::Internal(err.to_string()))?;
        let workspace = self.workspace_for(&uri).await?;
        let Some(index) = &workspace.index else { return Ok(Vec::new()) };
        let locations = navigation::call_hierarchy_incoming(index.as_ref(), &self.documents, &language_for_extension, &data).await;
        Ok(locations
            .into_iter()
            .map(|location| CallHierarchyIncomingCall { from: hierarchy_item(location.clone(), data.clone()), from_ranges: vec![location.range] })
            .collect())
    }

    pub(super) async fn do_outgoing_calls(&self, item: CallHierarchyItem) -> CoreResult<Vec<CallHierarchyOutgoingCall>> {
        let data = Self::decode_hierarchy_item(&item)?;
        let uri = DocumentUri::parse(&data.uri).map_err(|err| CoreError::Internal(err.to_string()))?;
        let workspace = self.workspace_for(&uri).await?;
        let Some(index) = &workspace.index else { return Ok(Vec::new()) };
        let locations = navigation::call_hierarchy_outgoing(index.as_ref(), &self.documents, &language_for_extension, &data).await;
        Ok(locations
            .into_iter()
            .map(|location| CallHierarchyOutgoingCall { to: hierarchy_item(location.clone(), data.clone()), from_ranges: vec![location.range] })
            .collect())
    }

    pub(super) async fn do_prepare_type_hierarchy(&self, uri: DocumentUri, position: Position) -> CoreResult<Vec<TypeHierarchyItem>> {
        let (adapter, snapshot) = self.snapshot_adapter(&uri).await?;
        let workspace = self.workspace_for(&uri).await?;
        let items = navigation::prepare_hierarchy(adapter.as_ref(), workspace.index.as_deref(), &self.documents, &language_for_extension, &snapshot, position).await?;
        Ok(items.into_iter().map(|(location, data)| type_hierarchy_item(location, data)).collect())
    }

    pub(super) async fn do_supertypes(&self, item: TypeHierarchyItem) -> CoreResult<Vec<TypeHierarchyItem>> {
        let data = Self::decode_type_hierarchy_item(&item)?;
        let uri = DocumentUri::parse(&data.uri).map_err(|err| CoreError::Internal(err.to_string()))?;
        let workspace = self.workspace_for(&uri).await?;
        let Some(index) = &workspace.index else { return Ok(Vec::new()) };
        let locations = navigation::type_hierarchy_supertypes(index.as_ref(), &self.documents, &language_for_extension, &data).await;
        Ok(locations.into_iter().map(|location| type_hierarchy_item(location, data.clone())).collect())
    }

    pub(super) async fn do_subtypes(&self, item: TypeHierarchyItem) -> CoreResult<Vec<TypeHierarchyItem>> {
        let data = Self::decode_type_hierarchy_item(&item)?;
        let uri = DocumentUri::parse(&data.uri).map_err(|err| CoreError::Internal(err.to_string()))?;
        let workspace = self.workspace_for(&uri).await?;
        let Some(index) = &workspace.index else { return Ok(Vec::new()) };
        let locations = navigation::type_hierarchy_subtypes(index.as_ref(), &self.documents, &language_for_extension, &data).await;
        Ok(locations.into_iter().map(|location| type_hierarchy_item(location, data.clone())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> DocumentUri {
        DocumentUri::parse(s).unwrap()
    }

    #[test]
    fn tag_for_document_update_carries_the_uri() {
        let u = uri("file:///a.swift");
        let tag = tag_for("textDocument/didChange", Some(&u));
        assert_eq!(tag, DependencyTag::DocumentUpdate(u));
    }

    #[test]
    fn tag_for_initialize_is_global_config() {
        assert_eq!(tag_for("initialize", None), DependencyTag::GlobalConfig);
    }

    #[test]
    fn implicit_root_is_the_parent_directory() {
        let root = implicit_root(&uri("file:///workspace/src/a.swift"));
        assert_eq!(root, uri("file:///workspace/src"));
    }

    #[test]
    fn execute_command_uri_reads_the_first_matching_argument() {
        let args = vec![serde_json::json!({"uri": "file:///a.swift"})];
        assert_eq!(PolyglotBackend::execute_command_uri(&args), Some(uri("file:///a.swift")));
        assert_eq!(PolyglotBackend::execute_command_uri(&[]), None);
    }
}
