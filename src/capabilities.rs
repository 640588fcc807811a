//! Capability negotiation (C11): merges static server capabilities with
//! dynamic registrations requested later by an adapter.

use dashmap::DashMap;
use tower_lsp::lsp_types::{
    CodeActionProviderCapability, CompletionOptions, DeclarationCapability, ExecuteCommandOptions,
    HoverProviderCapability, ImplementationProviderCapability, OneOf, Registration, RenameOptions,
    RenameProviderCapability, ServerCapabilities, TextDocumentSyncCapability, TextDocumentSyncKind,
    WorkDoneProgressOptions, WorkspaceFoldersServerCapabilities, WorkspaceServerCapabilities,
};

/// The server's static capability set, assembled once at `initialize`
/// time. Mirrors the fixed feature list in spec.md §6.
pub fn static_server_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Kind(TextDocumentSyncKind::INCREMENTAL)),
        completion_provider: Some(CompletionOptions {
            trigger_characters: Some(vec![".".to_string()]),
            ..Default::default()
        }),
        definition_provider: Some(OneOf::Left(true)),
        declaration_provider: Some(DeclarationCapability::Simple(true)),
        references_provider: Some(OneOf::Left(true)),
        implementation_provider: Some(ImplementationProviderCapability::Simple(true)),
        hover_provider: Some(HoverProviderCapability::Simple(true)),
        document_symbol_provider: Some(OneOf::Left(true)),
        document_highlight_provider: Some(OneOf::Left(true)),
        workspace_symbol_provider: Some(OneOf::Left(true)),
        color_provider: Some(tower_lsp::lsp_types::ColorProviderCapability::Simple(true)),
        code_action_provider: Some(CodeActionProviderCapability::Simple(true)),
        folding_range_provider: Some(tower_lsp::lsp_types::FoldingRangeProviderCapability::Simple(true)),
        call_hierarchy_provider: Some(tower_lsp::lsp_types::CallHierarchyServerCapability::Simple(true)),
        type_hierarchy_provider: Some(tower_lsp::lsp_types::TypeHierarchyServerCapability::Simple(true)),
        // The concrete command set is backend-dependent and only known
        // once an adapter has initialized; starts empty and grows via
        // `client/registerCapability` through `CapabilityRegistry`.
        execute_command_provider: Some(ExecuteCommandOptions {
            commands: Vec::new(),
            work_done_progress_options: WorkDoneProgressOptions::default(),
        }),
        rename_provider: Some(RenameProviderCapability::Options(RenameOptions {
            prepare_provider: Some(true),
            work_done_progress_options: WorkDoneProgressOptions::default(),
        })),
        workspace: Some(WorkspaceServerCapabilities {
            workspace_folders: Some(WorkspaceFoldersServerCapabilities {
                supported: Some(true),
                change_notifications: Some(OneOf::Left(true)),
            }),
            file_operations: None,
        }),
        ..Default::default()
    }
}

/// Dynamic registrations an adapter asks the client to add after its own
/// initialization handshake completes (e.g. completion re-registered
/// once a backend finishes indexing and knows its real trigger
/// characters).
#[derive(Default)]
pub struct CapabilityRegistry {
    registrations: DashMap<String, Registration>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a dynamic capability, deduplicating by
    /// method.
    pub fn register(&self, registration: Registration) {
        self.registrations.insert(registration.method.clone(), registration);
    }

    pub fn unregister(&self, method: &str) {
        self.registrations.remove(method);
    }

    pub fn registered_methods(&self) -> Vec<String> {
        self.registrations.iter().map(|e| e.key().clone()).collect()
    }

    pub fn all(&self) -> Vec<Registration> {
        self.registrations.iter().map(|e| e.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_deduplicates_by_method() {
        let registry = CapabilityRegistry::new();
        registry.register(Registration {
            id: "a".into(),
            method: "textDocument/completion".into(),
            register_options: None,
        });
        registry.register(Registration {
            id: "b".into(),
            method: "textDocument/completion".into(),
            register_options: None,
        });
        assert_eq!(registry.registered_methods().len(), 1);
        assert_eq!(registry.all()[0].id, "b");
    }
}
