//! Cross-file rename (C8): combines an adapter-local rename with an
//! index-driven expansion across the rest of the workspace.

mod compound_name;
mod syntactic;

pub use compound_name::CompoundDeclName;
pub use syntactic::{edit_for_piece, PieceCategory, RenamePieceKind, SyntacticRenameName, SyntacticRenamePiece};

use std::collections::HashMap;

use tower_lsp::lsp_types::{Position, TextEdit, Url, WorkspaceEdit};
use tracing::warn;

use crate::adapter::LanguageServiceAdapter;
use crate::document::{DocumentManager, DocumentSnapshot, DocumentUri};
use crate::error::CoreResult;
use crate::index::{Role, SymbolIndex, Usr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameUsage {
    Definition,
    Reference,
    Call,
}

impl RenameUsage {
    fn from_roles(roles: &[Role]) -> Self {
        if roles.contains(&Role::Call) {
            RenameUsage::Call
        } else if roles.contains(&Role::Definition) || roles.contains(&Role::Declaration) {
            RenameUsage::Definition
        } else {
            RenameUsage::Reference
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenameLocation {
    pub line: usize,
    pub utf8_column: usize,
    pub usage: RenameUsage,
}

/// Runs the full cross-file rename algorithm (§4.7) and returns a
/// workspace edit, or an error if the adapter-local rename itself
/// fails.
pub async fn rename(
    adapter: &dyn LanguageServiceAdapter,
    documents: &DocumentManager,
    index: Option<&dyn SymbolIndex>,
    language_for_extension: impl Fn(&str) -> String,
    snapshot: &DocumentSnapshot,
    position: Position,
    new_name: &str,
) -> CoreResult<WorkspaceEdit> {
    // Step 1: adapter-local rename.
    let local = adapter.rename(snapshot, position, new_name).await?;
    let mut changes: HashMap<Url, Vec<TextEdit>> = local
        .edits
        .changes
        .unwrap_or_default()
        .into_iter()
        .collect();
    let covered_uris: std::collections::HashSet<Url> = changes.keys().cloned().collect();

    // Step 2: expand via the index, when we know the USR and old name.
    let (Some(usr), Some(old_name)) = (local.usr.clone(), local.old_name.clone()) else {
        return Ok(WorkspaceEdit { changes: Some(changes), ..Default::default() });
    };
    let Some(index) = index else {
        return Ok(WorkspaceEdit { changes: Some(changes), ..Default::default() });
    };

    let occurrences = index
        .occurrences(&usr, &[Role::Declaration, Role::Definition, Role::Reference])
        .await;

    let mut by_file: HashMap<std::path::PathBuf, Vec<RenameLocation>> = HashMap::new();
    for occurrence in occurrences {
        let uri = DocumentUri::from_file_path(&occurrence.path);
        if let Some(uri) = &uri {
            if covered_uris.contains(uri.as_url()) {
                continue; // disjointness invariant: step 2's filter
            }
        }
        // Left in the index's native 1-based line/column form, unlike
        // navigation.rs's LSP-facing locations: these feed
        // adapter.edits_to_rename below, which forwards them straight
        // into the adapter's own 1-based line/column protocol.
        by_file.entry(occurrence.path.clone()).or_default().push(RenameLocation {
            line: occurrence.line,
            utf8_column: occurrence.utf8_column,
            usage: RenameUsage::from_roles(&occurrence.roles),
        });
    }

    let old_compound = CompoundDeclName::parse(&old_name);
    let new_compound = CompoundDeclName::parse(new_name);

    for (path, locations) in by_file {
        let Some(uri) = DocumentUri::from_file_path(&path) else { continue };
        let file_snapshot = match documents.latest(&uri) {
            Ok(snap) => (*snap).clone(),
            Err(_) => match std::fs::read_to_string(&path) {
                Ok(text) => DocumentSnapshot::from_disk(uri.clone(), &text, &language_for_extension),
                Err(err) => {
                    warn!(%uri, %err, "skipping rename expansion: file unreadable");
                    continue;
                }
            },
        };

        // Step 4: ask the adapter for syntactic rename pieces.
        let names = adapter
            .edits_to_rename(&locations, &file_snapshot, &old_name, new_name)
            .await?;

        // Step 5: apply the edit rules per piece.
        let mut edits = Vec::new();
        for name in &names {
            for piece in &name.pieces {
                if let Some(edit) = edit_for_piece(piece, &old_compound, &new_compound) {
                    edits.push(edit);
                }
            }
        }
        if !edits.is_empty() {
            changes.insert(uri.into_url(), edits);
        }
    }

    Ok(WorkspaceEdit { changes: Some(changes), ..Default::default() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rename_usage_prefers_call_over_other_roles() {
        assert_eq!(RenameUsage::from_roles(&[Role::Call, Role::Reference]), RenameUsage::Call);
        assert_eq!(RenameUsage::from_roles(&[Role::Definition]), RenameUsage::Definition);
        assert_eq!(RenameUsage::from_roles(&[Role::Reference]), RenameUsage::Reference);
    }
}
