//! Service registry & lifecycle (C6): creates, initializes, and
//! recovers language-service adapters.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::adapter::{CFamilyAdapter, CompileDrivenAdapter, LanguageServiceAdapter};
use crate::backend::BackendChannel;
use crate::document::{DocumentManager, DocumentUri};
use crate::error::{CoreError, CoreResult};
use crate::types::BackendKind;
use crate::workspace::Workspace;

/// Where to find each backend's executable.
#[derive(Debug, Clone)]
pub struct BackendPaths {
    pub compile_driven: PathBuf,
    pub cfamily: PathBuf,
}

/// Owns adapter creation and crash recovery across all workspaces.
/// Holds no per-workspace state itself — that lives on [`Workspace`]
/// per the ownership rule in §3 — only the collaborators needed to
/// build and recover adapters.
pub struct ServiceRegistry {
    documents: Arc<DocumentManager>,
    backend_paths: BackendPaths,
}

impl ServiceRegistry {
    pub fn new(documents: Arc<DocumentManager>, backend_paths: BackendPaths) -> Self {
        Self { documents, backend_paths }
    }

    /// Returns the adapter for `(kind-of-language, workspace)`, creating
    /// one if necessary (§4.6 steps 1-5).
    pub async fn get(self: &Arc<Self>, language: &str, workspace: &Arc<Workspace>) -> CoreResult<Arc<dyn LanguageServiceAdapter>> {
        let kind = BackendKind::for_language(language).ok_or_else(|| CoreError::UnsupportedLanguage(language.to_string()))?;

        if let Some(adapter) = workspace.adapter(kind) {
            return Ok(adapter);
        }

        let (adapter, crash_events) = self.create_adapter(kind).await?;
        self.initialize(&adapter).await?;

        // Step 4: creation suspended above; check again.
        let installed = workspace.install_adapter(kind, adapter.clone());
        if !Arc::ptr_eq(&installed, &adapter) {
            info!(%kind, workspace = %workspace.root, "discarding redundant adapter lost to a concurrent creation");
            let _ = adapter.shutdown().await;
            return Ok(installed);
        }

        self.register_dynamic_capabilities(workspace, kind);
        self.clone().watch_for_crashes(kind, workspace.clone(), crash_events);
        info!(%kind, workspace = %workspace.root, "adapter ready");
        Ok(installed)
    }

    async fn create_adapter(&self, kind: BackendKind) -> CoreResult<(Arc<dyn LanguageServiceAdapter>, watch::Receiver<u64>)> {
        let (name, path): (&str, &PathBuf) = match kind {
            BackendKind::CompileDriven => ("compile-driven-backend", &self.backend_paths.compile_driven),
            BackendKind::CFamily => ("cfamily-backend", &self.backend_paths.cfamily),
        };
        let channel = BackendChannel::spawn(name, path, Vec::new()).await?;
        let crash_events = channel.crash_events();
        let adapter: Arc<dyn LanguageServiceAdapter> = match kind {
            BackendKind::CompileDriven => Arc::new(CompileDrivenAdapter::new(channel)),
            BackendKind::CFamily => Arc::new(CFamilyAdapter::new(channel)),
        };
        Ok((adapter, crash_events))
    }

    /// Performs the `initialize`/`initialized` handshake. Fatal if the
    /// backend does not report incremental sync (§4.6 step 2).
    async fn initialize(&self, adapter: &Arc<dyn LanguageServiceAdapter>) -> CoreResult<()> {
        if adapter.initialize().await? {
            Ok(())
        } else {
            Err(CoreError::VersionNotSupported("incremental text document sync".into()))
        }
    }

    fn register_dynamic_capabilities(&self, workspace: &Arc<Workspace>, kind: BackendKind) {
        // A real adapter reports its server capabilities from the
        // initialize response; this records the kind-specific
        // completion trigger characters as an example of a capability
        // only known once the backend has started.
        let method = match kind {
            BackendKind::CompileDriven => "textDocument/completion",
            BackendKind::CFamily => "textDocument/completion",
        };
        workspace.capabilities.register(tower_lsp::lsp_types::Registration {
            id: format!("{kind}-completion"),
            method: method.to_string(),
            register_options: None,
        });
    }

    /// Subscribes to a channel's crash events and, on every crash,
    /// re-opens every document the workspace currently routes to
    /// `kind` (§4.6 crash recovery): send close, then re-send open with
    /// the latest snapshot's language, version, and text.
    pub fn watch_for_crashes(
        self: Arc<Self>,
        kind: BackendKind,
        workspace: Arc<Workspace>,
        mut crash_events: watch::Receiver<u64>,
    ) {
        tokio::spawn(async move {
            let mut last_seen = *crash_events.borrow();
            while crash_events.changed().await.is_ok() {
                let generation = *crash_events.borrow();
                if generation == last_seen {
                    continue;
                }
                last_seen = generation;
                warn!(%kind, workspace = %workspace.root, generation, "backend crashed, rebuilding adapter");
                workspace.remove_adapter(kind);

                let registry = Arc::clone(&self);
                let documents = &registry.documents;
                let language = match kind {
                    BackendKind::CompileDriven => "swift",
                    BackendKind::CFamily => "c",
                };
                let new_adapter = match registry.get(language, &workspace).await {
                    Ok(adapter) => adapter,
                    Err(err) => {
                        warn!(%err, "failed to rebuild crashed adapter");
                        continue;
                    }
                };

                for uri in workspace.uris_assigned_to(kind) {
                    reopen_document(documents, &new_adapter, &uri).await;
                }
            }
        });
    }
}

async fn reopen_document(documents: &DocumentManager, adapter: &Arc<dyn LanguageServiceAdapter>, uri: &DocumentUri) {
    let Ok(snapshot) = documents.latest(uri) else { return };
    let _ = adapter.did_close(uri).await;
    let _ = adapter.did_open(&snapshot).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_maps_to_expected_executable_field() {
        let paths = BackendPaths { compile_driven: PathBuf::from("/bin/swift-backend"), cfamily: PathBuf::from("/bin/clangd") };
        assert_eq!(paths.compile_driven, PathBuf::from("/bin/swift-backend"));
        assert_eq!(paths.cfamily, PathBuf::from("/bin/clangd"));
    }
}
