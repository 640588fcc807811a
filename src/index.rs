//! Persistent symbol index interface (§6).
//!
//! The index itself is out of scope (spec.md §1 Non-goals); the core
//! only depends on this narrow query interface. `Role` mirrors the role
//! set named in the glossary and §6.

use std::path::PathBuf;

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Declaration,
    Definition,
    Reference,
    Call,
    CalledBy,
    BaseOf,
    OverrideOf,
    ExtendedBy,
    ChildOf,
    AccessorOf,
    System,
}

/// A USR — unique symbol resolver string — the compiler-assigned stable
/// identifier for a declaration.
pub type Usr = String;

#[derive(Debug, Clone)]
pub struct SymbolOccurrence {
    pub path: PathBuf,
    /// 1-based line, per §4.8 ("converts 1-based line and UTF-8
    /// column...").
    pub line: usize,
    pub utf8_column: usize,
    pub roles: Vec<Role>,
    pub symbol: Usr,
    pub symbol_name: String,
    /// Related USRs (e.g. override targets, base classes) attached to
    /// this occurrence, keyed by the role that relates them.
    pub relations: Vec<(Role, Usr)>,
}

impl SymbolOccurrence {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

#[async_trait]
pub trait SymbolIndex: Send + Sync {
    /// All occurrences of `usr` whose role set intersects `roles`.
    async fn occurrences(&self, usr: &Usr, roles: &[Role]) -> Vec<SymbolOccurrence>;

    /// All occurrences related to `usr` by any of `roles` (e.g.
    /// `called_by`, `base_of`).
    async fn related_occurrences(&self, usr: &Usr, roles: &[Role]) -> Vec<SymbolOccurrence>;

    /// Workspace-symbol style substring search: `substring` matched as a
    /// case-insensitive subsequence against canonical symbol names.
    async fn search_symbols(&self, substring: &str, ignore_case: bool) -> Vec<SymbolOccurrence>;

    /// Blocks until the index has caught up with any outstanding build
    /// unit changes. The service registry and navigation layer call this
    /// before trusting a "not found" result after a recent edit.
    async fn poll_for_unit_changes_and_wait(&self);
}

/// An index that reports nothing. Used when a workspace has no index
/// handle (spec.md §3: `Workspace.index` is optional) and in tests.
pub struct NoIndex;

#[async_trait]
impl SymbolIndex for NoIndex {
    async fn occurrences(&self, _usr: &Usr, _roles: &[Role]) -> Vec<SymbolOccurrence> {
        Vec::new()
    }

    async fn related_occurrences(&self, _usr: &Usr, _roles: &[Role]) -> Vec<SymbolOccurrence> {
        Vec::new()
    }

    async fn search_symbols(&self, _substring: &str, _ignore_case: bool) -> Vec<SymbolOccurrence> {
        Vec::new()
    }

    async fn poll_for_unit_changes_and_wait(&self) {}
}
