//! Hierarchy & navigation (C9): definition/references/implementation,
//! call/type hierarchy, and workspace-symbol search, fusing the index
//! with the owning adapter.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::{Location, Position};
use tracing::warn;

use crate::adapter::LanguageServiceAdapter;
use crate::document::{DocumentManager, DocumentSnapshot, DocumentUri};
use crate::error::CoreResult;
use crate::index::{Role, SymbolIndex, SymbolOccurrence, Usr};
use crate::workspace::Workspace;

const WORKSPACE_SYMBOL_MIN_QUERY_LEN: usize = 3;
const WORKSPACE_SYMBOL_CAP: usize = 4096;

/// Opaque payload a call/type-hierarchy "prepare" step encodes into the
/// returned item's `data` field, decoded by the matching
/// incoming/outgoing or super/subtypes request (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyItemData {
    pub uri: String,
    pub usr: Usr,
}

pub(crate) async fn resolve_occurrence_location(
    documents: &DocumentManager,
    language_for_extension: &(dyn Fn(&str) -> String + Sync),
    occurrence: &SymbolOccurrence,
) -> Option<Location> {
    let uri = DocumentUri::from_file_path(&occurrence.path)?;
    let snapshot: DocumentSnapshot = match documents.latest(&uri) {
        Ok(snapshot) => (*snapshot).clone(),
        Err(_) => {
            let text = std::fs::read_to_string(&occurrence.path).ok()?;
            DocumentSnapshot::from_disk(uri.clone(), &text, language_for_extension)
        }
    };
    // Index-to-LSP translation: 1-based line, UTF-8 column -> 0-based
    // line, UTF-16 column (§4.8). This may read the file if it is not
    // open, which the caller above already accounts for. The conversion
    // assumes the index's columns still line up with this text; if the
    // on-disk/open content has drifted from what the index last saw,
    // the resulting position may be off by a few UTF-16 units. Known
    // limit, not fixed here.
    let zero_based_line = occurrence.line.checked_sub(1)?;
    let zero_based_column = occurrence.utf8_column.checked_sub(1)?;
    let position = snapshot.text.utf8_to_utf16_position(zero_based_line, zero_based_column)?;
    Some(Location { uri: uri.into_url(), range: tower_lsp::lsp_types::Range::new(position, position) })
}

pub(crate) async fn resolve_all(
    documents: &DocumentManager,
    language_for_extension: &(dyn Fn(&str) -> String + Sync),
    occurrences: &[SymbolOccurrence],
) -> Vec<Location> {
    let mut locations = Vec::with_capacity(occurrences.len());
    for occurrence in occurrences {
        if let Some(location) = resolve_occurrence_location(documents, language_for_extension, occurrence).await {
            locations.push(location);
        } else {
            warn!(path = %occurrence.path.display(), "could not resolve index occurrence to a location");
        }
    }
    locations
}

pub async fn definition(
    adapter: &dyn LanguageServiceAdapter,
    index: Option<&dyn SymbolIndex>,
    documents: &DocumentManager,
    language_for_extension: &(dyn Fn(&str) -> String + Sync),
    snapshot: &DocumentSnapshot,
    position: Position,
) -> CoreResult<Vec<Location>> {
    let info = adapter.symbol_info(snapshot, position).await?;
    let Some(index) = index else {
        return adapter.definition(snapshot, position).await;
    };
    for usr in &info.usrs {
        let mut occurrences = index.occurrences(usr, &[Role::Definition]).await;
        if occurrences.is_empty() {
            occurrences = index.occurrences(usr, &[Role::Declaration]).await;
        }
        if !occurrences.is_empty() {
            return Ok(resolve_all(documents, language_for_extension, &occurrences).await);
        }
    }
    adapter.definition(snapshot, position).await
}

pub async fn implementation(
    adapter: &dyn LanguageServiceAdapter,
    index: Option<&dyn SymbolIndex>,
    documents: &DocumentManager,
    language_for_extension: &(dyn Fn(&str) -> String + Sync),
    snapshot: &DocumentSnapshot,
    position: Position,
) -> CoreResult<Vec<Location>> {
    let info = adapter.symbol_info(snapshot, position).await?;
    let Some(index) = index else {
        return adapter.implementation(snapshot, position).await;
    };
    for usr in &info.usrs {
        let mut occurrences = index.related_occurrences(usr, &[Role::BaseOf]).await;
        if occurrences.is_empty() {
            occurrences = index.related_occurrences(usr, &[Role::OverrideOf]).await;
        }
        if !occurrences.is_empty() {
            return Ok(resolve_all(documents, language_for_extension, &occurrences).await);
        }
    }
    adapter.implementation(snapshot, position).await
}

pub async fn references(
    adapter: &dyn LanguageServiceAdapter,
    index: Option<&dyn SymbolIndex>,
    documents: &DocumentManager,
    language_for_extension: &(dyn Fn(&str) -> String + Sync),
    snapshot: &DocumentSnapshot,
    position: Position,
    include_declaration: bool,
) -> CoreResult<Vec<Location>> {
    let info = adapter.symbol_info(snapshot, position).await?;
    let Some(index) = index else {
        return adapter.references(snapshot, position, include_declaration).await;
    };
    let mut roles = vec![Role::Reference, Role::Call];
    if include_declaration {
        roles.push(Role::Declaration);
        roles.push(Role::Definition);
    }
    for usr in &info.usrs {
        let occurrences = index.occurrences(usr, &roles).await;
        if !occurrences.is_empty() {
            return Ok(resolve_all(documents, language_for_extension, &occurrences).await);
        }
    }
    adapter.references(snapshot, position, include_declaration).await
}

/// "Prepare" step shared by call hierarchy and type hierarchy: resolve
/// the cursor to a USR, find its definition/declaration location, and
/// encode `(uri, usr)` for the subsequent incoming/outgoing or
/// super/subtypes request.
pub async fn prepare_hierarchy(
    adapter: &dyn LanguageServiceAdapter,
    index: Option<&dyn SymbolIndex>,
    documents: &DocumentManager,
    language_for_extension: &(dyn Fn(&str) -> String + Sync),
    snapshot: &DocumentSnapshot,
    position: Position,
) -> CoreResult<Vec<(Location, HierarchyItemData)>> {
    let info = adapter.symbol_info(snapshot, position).await?;
    let mut items = Vec::new();
    for usr in &info.usrs {
        let location = if let Some(index) = index {
            let mut occurrences = index.occurrences(usr, &[Role::Definition]).await;
            if occurrences.is_empty() {
                occurrences = index.occurrences(usr, &[Role::Declaration]).await;
            }
            match occurrences.first() {
                Some(occurrence) => resolve_occurrence_location(documents, language_for_extension, occurrence).await,
                None => None,
            }
        } else {
            None
        };
        let Some(location) = location else { continue };
        items.push((location.clone(), HierarchyItemData { uri: location.uri.to_string(), usr: usr.clone() }));
    }
    Ok(items)
}

pub async fn call_hierarchy_incoming(
    index: &dyn SymbolIndex,
    documents: &DocumentManager,
    language_for_extension: &(dyn Fn(&str) -> String + Sync),
    data: &HierarchyItemData,
) -> Vec<Location> {
    let occurrences = index.related_occurrences(&data.usr, &[Role::CalledBy]).await;
    resolve_all(documents, language_for_extension, &occurrences).await
}

pub async fn call_hierarchy_outgoing(
    index: &dyn SymbolIndex,
    documents: &DocumentManager,
    language_for_extension: &(dyn Fn(&str) -> String + Sync),
    data: &HierarchyItemData,
) -> Vec<Location> {
    let occurrences = index.occurrences(&data.usr, &[Role::Call]).await;
    resolve_all(documents, language_for_extension, &occurrences).await
}

pub async fn type_hierarchy_supertypes(
    index: &dyn SymbolIndex,
    documents: &DocumentManager,
    language_for_extension: &(dyn Fn(&str) -> String + Sync),
    data: &HierarchyItemData,
) -> Vec<Location> {
    let occurrences = index.related_occurrences(&data.usr, &[Role::BaseOf]).await;
    resolve_all(documents, language_for_extension, &occurrences).await
}

pub async fn type_hierarchy_subtypes(
    index: &dyn SymbolIndex,
    documents: &DocumentManager,
    language_for_extension: &(dyn Fn(&str) -> String + Sync),
    data: &HierarchyItemData,
) -> Vec<Location> {
    let occurrences = index.related_occurrences(&data.usr, &[Role::ExtendedBy]).await;
    resolve_all(documents, language_for_extension, &occurrences).await
}

/// Workspace-symbol search (§4.8 boundary cases): queries shorter than
/// 3 characters return empty; matches exclude system/accessor-of
/// roles; results are capped at 4,096.
pub async fn workspace_symbols(workspaces: &[Arc<Workspace>], query: &str) -> Vec<SymbolOccurrence> {
    if query.chars().count() < WORKSPACE_SYMBOL_MIN_QUERY_LEN {
        return Vec::new();
    }
    let mut results = Vec::new();
    'workspaces: for workspace in workspaces {
        let Some(index) = &workspace.index else { continue };
        let hits = index.search_symbols(query, true).await;
        for hit in hits {
            if hit.has_role(Role::System) || hit.has_role(Role::AccessorOf) {
                continue;
            }
            results.push(hit);
            if results.len() >= WORKSPACE_SYMBOL_CAP {
                break 'workspaces;
            }
        }
    }
    results.truncate(WORKSPACE_SYMBOL_CAP);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildsystem::NullBuildSystem;
    use async_trait::async_trait;
    use std::path::PathBuf;

    struct FixedIndex {
        occurrences: Vec<SymbolOccurrence>,
    }

    #[async_trait]
    impl SymbolIndex for FixedIndex {
        async fn occurrences(&self, _usr: &Usr, _roles: &[Role]) -> Vec<SymbolOccurrence> {
            Vec::new()
        }
        async fn related_occurrences(&self, _usr: &Usr, _roles: &[Role]) -> Vec<SymbolOccurrence> {
            Vec::new()
        }
        async fn search_symbols(&self, _substring: &str, _ignore_case: bool) -> Vec<SymbolOccurrence> {
            self.occurrences.clone()
        }
        async fn poll_for_unit_changes_and_wait(&self) {}
    }

    fn occurrence(roles: Vec<Role>) -> SymbolOccurrence {
        SymbolOccurrence {
            path: PathBuf::from("/a.swift"),
            line: 1,
            utf8_column: 0,
            roles,
            symbol: "usr".into(),
            symbol_name: "foo".into(),
            relations: Vec::new(),
        }
    }

    #[tokio::test]
    async fn queries_under_three_chars_return_nothing() {
        let workspace = Arc::new(Workspace::new(
            DocumentUri::parse("file:///w").unwrap(),
            Arc::new(NullBuildSystem),
            Some(Arc::new(FixedIndex { occurrences: vec![occurrence(vec![Role::Definition])] })),
        ));
        assert!(workspace_symbols(&[workspace], "ab").await.is_empty());
    }

    #[tokio::test]
    async fn system_and_accessor_roles_are_excluded() {
        let workspace = Arc::new(Workspace::new(
            DocumentUri::parse("file:///w").unwrap(),
            Arc::new(NullBuildSystem),
            Some(Arc::new(FixedIndex {
                occurrences: vec![occurrence(vec![Role::System]), occurrence(vec![Role::Definition])],
            })),
        ));
        let results = workspace_symbols(&[workspace], "foo").await;
        assert_eq!(results.len(), 1);
    }
}
