//! Workspace registry (C3): URI → workspace routing with fallbacks.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::trace;

use crate::adapter::LanguageServiceAdapter;
use crate::buildsystem::{BuildSystem, FileHandlingCapability};
use crate::capabilities::CapabilityRegistry;
use crate::document::DocumentUri;
use crate::index::SymbolIndex;
use crate::types::BackendKind;

/// A workspace root with its associated collaborators.
///
/// The document-service table (which backend kind an open document is
/// routed to) lives here rather than on the service registry because
/// its invariant — "a document's adapter, once assigned, is not
/// reassigned within a workspace" — is scoped per workspace.
pub struct Workspace {
    pub root: DocumentUri,
    pub build_system: Arc<dyn BuildSystem>,
    pub index: Option<Arc<dyn SymbolIndex>>,
    pub capabilities: Arc<CapabilityRegistry>,
    document_services: DashMap<DocumentUri, BackendKind>,
    /// At most one adapter per backend kind (C6 §4.6). Insert-once via
    /// `DashMap::entry`, which is how the creation race in §4.6 step 4
    /// is resolved: two concurrent creators both finish construction,
    /// both call `install_adapter`, and only the first insert wins.
    adapters: DashMap<BackendKind, Arc<dyn LanguageServiceAdapter>>,
}

impl Workspace {
    pub fn new(root: DocumentUri, build_system: Arc<dyn BuildSystem>, index: Option<Arc<dyn SymbolIndex>>) -> Self {
        Self {
            root,
            build_system,
            index,
            capabilities: Arc::new(CapabilityRegistry::new()),
            document_services: DashMap::new(),
            adapters: DashMap::new(),
        }
    }

    pub fn adapter(&self, kind: BackendKind) -> Option<Arc<dyn LanguageServiceAdapter>> {
        self.adapters.get(&kind).map(|e| e.value().clone())
    }

    /// Installs `adapter` for `kind` if none exists yet. Returns the
    /// (possibly pre-existing) adapter; callers that lose the race must
    /// shut down the one they just built.
    pub fn install_adapter(&self, kind: BackendKind, adapter: Arc<dyn LanguageServiceAdapter>) -> Arc<dyn LanguageServiceAdapter> {
        self.adapters.entry(kind).or_insert(adapter).clone()
    }

    pub fn remove_adapter(&self, kind: BackendKind) {
        self.adapters.remove(&kind);
    }

    /// Returns the backend kind already assigned to `uri`, if any.
    pub fn assigned_backend(&self, uri: &DocumentUri) -> Option<BackendKind> {
        self.document_services.get(uri).map(|e| *e.value())
    }

    /// Assigns `uri` to `kind` if it has no assignment yet. Returns the
    /// (possibly pre-existing) assignment, honoring the invariant that an
    /// assignment is never replaced.
    pub fn assign_backend(&self, uri: DocumentUri, kind: BackendKind) -> BackendKind {
        *self.document_services.entry(uri).or_insert(kind)
    }

    pub fn forget_document(&self, uri: &DocumentUri) {
        self.document_services.remove(uri);
    }

    /// URIs currently routed to `kind` in this workspace. Used by C6's
    /// crash-recovery procedure to find the documents that need a
    /// close/reopen against the replacement adapter.
    pub fn uris_assigned_to(&self, kind: BackendKind) -> Vec<DocumentUri> {
        self.document_services
            .iter()
            .filter(|e| *e.value() == kind)
            .map(|e| e.key().clone())
            .collect()
    }
}

/// Ordered set of workspaces with URI→workspace routing.
///
/// Mutations (add/remove) and cache invalidation are the province of
/// global-config tasks only, per §5; reads may happen concurrently with
/// anything except another mutation.
pub struct WorkspaceRegistry {
    workspaces: RwLock<Vec<Arc<Workspace>>>,
    cache: DashMap<DocumentUri, usize>,
}

impl WorkspaceRegistry {
    pub fn new() -> Self {
        Self { workspaces: RwLock::new(Vec::new()), cache: DashMap::new() }
    }

    /// Appends a workspace, preserving insertion order (used as the
    /// routing tie-breaker).
    pub fn add(&self, workspace: Arc<Workspace>) {
        self.workspaces.write().push(workspace);
        self.invalidate_cache();
    }

    pub fn remove(&self, root: &DocumentUri) {
        self.workspaces.write().retain(|w| &w.root != root);
        self.invalidate_cache();
    }

    pub fn invalidate_cache(&self) {
        self.cache.clear();
    }

    pub fn all(&self) -> Vec<Arc<Workspace>> {
        self.workspaces.read().clone()
    }

    pub fn len(&self) -> usize {
        self.workspaces.read().len()
    }

    /// Routes `uri` to a workspace per the policy in §4.3.
    pub async fn workspace_for(&self, uri: &DocumentUri) -> Option<Arc<Workspace>> {
        let workspaces = self.workspaces.read().clone();
        if workspaces.len() == 1 {
            return workspaces.into_iter().next();
        }
        if workspaces.is_empty() {
            return None;
        }
        if let Some(index) = self.cache.get(uri) {
            return workspaces.get(*index).cloned();
        }

        let mut best: Option<(usize, FileHandlingCapability)> = None;
        for (i, workspace) in workspaces.iter().enumerate() {
            let capability = workspace.build_system.file_handling_capability(uri).await;
            let replace = match best {
                None => true,
                Some((_, best_cap)) => capability > best_cap,
            };
            if replace {
                best = Some((i, capability));
            }
        }
        let (index, _) = best?;
        trace!(%uri, index, "workspace routing resolved");
        self.cache.insert(uri.clone(), index);
        workspaces.get(index).cloned()
    }
}

impl Default for WorkspaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildsystem::MapBuildSystem;

    fn uri(s: &str) -> DocumentUri {
        DocumentUri::parse(s).unwrap()
    }

    fn workspace_with(root: &str, default_capability: FileHandlingCapability) -> Arc<Workspace> {
        let build_system =
            Arc::new(MapBuildSystem { capabilities: Default::default(), default_capability });
        Arc::new(Workspace::new(uri(root), build_system, None))
    }

    #[tokio::test]
    async fn single_workspace_is_always_returned() {
        let registry = WorkspaceRegistry::new();
        registry.add(workspace_with("file:///w1", FileHandlingCapability::Unhandled));
        let found = registry.workspace_for(&uri("file:///w1/a.swift")).await.unwrap();
        assert_eq!(found.root, uri("file:///w1"));
    }

    #[tokio::test]
    async fn routing_picks_max_capability_with_insertion_order_tiebreak() {
        let registry = WorkspaceRegistry::new();
        registry.add(workspace_with("file:///w1", FileHandlingCapability::Fallback));
        registry.add(workspace_with("file:///w2", FileHandlingCapability::Fallback));
        let found = registry.workspace_for(&uri("file:///shared/a.swift")).await.unwrap();
        assert_eq!(found.root, uri("file:///w1"));
    }

    #[tokio::test]
    async fn routing_is_cached_until_invalidated() {
        let registry = WorkspaceRegistry::new();
        registry.add(workspace_with("file:///w1", FileHandlingCapability::Unhandled));
        registry.add(workspace_with("file:///w2", FileHandlingCapability::Handled));
        let target = uri("file:///x/a.swift");
        let first = registry.workspace_for(&target).await.unwrap();
        assert_eq!(first.root, uri("file:///w2"));
        assert!(registry.cache.contains_key(&target));
        registry.invalidate_cache();
        assert!(!registry.cache.contains_key(&target));
    }

    #[test]
    fn document_assignment_is_sticky() {
        let build_system = Arc::new(crate::buildsystem::NullBuildSystem);
        let ws = Workspace::new(uri("file:///w1"), build_system, None);
        let u = uri("file:///w1/a.swift");
        assert_eq!(ws.assign_backend(u.clone(), BackendKind::CompileDriven), BackendKind::CompileDriven);
        assert_eq!(ws.assign_backend(u.clone(), BackendKind::CFamily), BackendKind::CompileDriven);
    }
}
