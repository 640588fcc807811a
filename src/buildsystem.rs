//! Build-system interface (§6) and compilation database parsing (C14).
//!
//! The build system that computes compiler arguments for a file is an
//! external collaborator — the core only depends on the narrow
//! [`BuildSystem`] trait. The core does, however, own the file-watch
//! registration for `compile_commands.json` and `compile_flags.txt`
//! (the watcher is registered by the capability negotiation layer, C11,
//! from the rule table in §6), so it owns parsing those formats too:
//! a watcher needs to validate a changed file before forwarding a
//! `file-build-settings-changed` hint upstream.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::document::DocumentUri;

/// Ordered capability a workspace's build system reports for a URI.
/// Ordering matters: workspace routing (C3) picks the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FileHandlingCapability {
    Unhandled,
    Fallback,
    Handled,
}

#[derive(Debug, Clone)]
pub struct BuildSettings {
    pub compiler_args: Vec<String>,
    pub working_dir: String,
}

#[async_trait]
pub trait BuildSystem: Send + Sync {
    async fn build_settings(&self, uri: &DocumentUri, language: &str) -> Option<BuildSettings>;

    async fn file_handling_capability(&self, uri: &DocumentUri) -> FileHandlingCapability;
}

/// Shell dialect used to split a compilation database entry's `command`
/// string, per §6 ("on a Windows-style host use Windows command
/// splitting").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellDialect {
    Posix,
    Windows,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompilationDatabaseEntry {
    pub directory: String,
    pub file: String,
    pub command: Option<String>,
    pub arguments: Option<Vec<String>>,
    pub output: Option<String>,
}

impl CompilationDatabaseEntry {
    /// The effective argument list: `arguments` wins over `command` when
    /// both are present.
    pub fn effective_arguments(&self, dialect: ShellDialect) -> Vec<String> {
        if let Some(args) = &self.arguments {
            return args.clone();
        }
        match &self.command {
            Some(command) => split_command(command, dialect),
            None => Vec::new(),
        }
    }
}

fn split_command(command: &str, dialect: ShellDialect) -> Vec<String> {
    match dialect {
        ShellDialect::Posix => shell_words::split(command).unwrap_or_default(),
        // Windows command-line splitting: whitespace-separated, double
        // quotes group a token, a literal `"` is escaped as `\"`.
        ShellDialect::Windows => split_windows_command_line(command),
    }
}

fn split_windows_command_line(command: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = command.chars().peekable();
    let mut has_token = false;
    while let Some(ch) = chars.next() {
        match ch {
            '\\' if chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
                has_token = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        tokens.push(current);
    }
    tokens
}

/// Parses a `compile_commands.json` document into its entries.
pub fn parse_compile_commands(text: &str) -> serde_json::Result<Vec<CompilationDatabaseEntry>> {
    serde_json::from_str(text)
}

/// Parses a `compile_flags.txt` document: one argument per line, trimmed
/// of whitespace, blank lines dropped, prefixed with `compiler_name`.
pub fn parse_compile_flags(text: &str, compiler_name: &str) -> Vec<String> {
    let mut args = vec![compiler_name.to_string()];
    args.extend(
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string),
    );
    args
}

/// A build system backed by a workspace-root `compile_commands.json` or
/// `compile_flags.txt`, loaded once at workspace creation. This is the
/// one concrete [`BuildSystem`] the core ships itself, since the core
/// already owns parsing these formats for the file-watch registration
/// (§6); a richer build system (a real package manager integration)
/// remains an external collaborator plugged in via the same trait.
pub struct CompilationDatabaseBuildSystem {
    entries: HashMap<std::path::PathBuf, CompilationDatabaseEntry>,
    dialect: ShellDialect,
}

impl CompilationDatabaseBuildSystem {
    /// Loads `compile_commands.json` from `workspace_root` if present,
    /// falling back to an empty entry set (every file reports
    /// [`FileHandlingCapability::Fallback`]). `compile_flags.txt` carries
    /// no per-file mapping, so it is not represented here; a watcher
    /// that sees it change still invalidates routing via the same
    /// file-watch rule table.
    pub fn load(workspace_root: &std::path::Path) -> Self {
        let dialect = if cfg!(windows) { ShellDialect::Windows } else { ShellDialect::Posix };
        let entries = std::fs::read_to_string(workspace_root.join("compile_commands.json"))
            .ok()
            .and_then(|text| parse_compile_commands(&text).ok())
            .map(|entries| {
                entries
                    .into_iter()
                    .filter_map(|entry| {
                        let path = std::path::Path::new(&entry.directory).join(&entry.file);
                        std::fs::canonicalize(&path).ok().map(|canonical| (canonical, entry))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self { entries, dialect }
    }
}

#[async_trait]
impl BuildSystem for CompilationDatabaseBuildSystem {
    async fn build_settings(&self, uri: &DocumentUri, _language: &str) -> Option<BuildSettings> {
        let path = uri.canonical_path()?;
        let entry = self.entries.get(&path)?;
        Some(BuildSettings { compiler_args: entry.effective_arguments(self.dialect), working_dir: entry.directory.clone() })
    }

    async fn file_handling_capability(&self, uri: &DocumentUri) -> FileHandlingCapability {
        match uri.canonical_path() {
            Some(path) if self.entries.contains_key(&path) => FileHandlingCapability::Handled,
            _ => FileHandlingCapability::Fallback,
        }
    }
}

/// Minimal build-system stub used in tests and as a placeholder before a
/// real build-system collaborator is wired up: always reports
/// `Fallback` and has no compiler arguments for any file.
pub struct NullBuildSystem;

#[async_trait]
impl BuildSystem for NullBuildSystem {
    async fn build_settings(&self, _uri: &DocumentUri, _language: &str) -> Option<BuildSettings> {
        None
    }

    async fn file_handling_capability(&self, _uri: &DocumentUri) -> FileHandlingCapability {
        FileHandlingCapability::Fallback
    }
}

#[derive(Default)]
pub struct MapBuildSystem {
    pub capabilities: HashMap<String, FileHandlingCapability>,
    pub default_capability: FileHandlingCapability,
}

impl Default for FileHandlingCapability {
    fn default() -> Self {
        FileHandlingCapability::Unhandled
    }
}

#[async_trait]
impl BuildSystem for MapBuildSystem {
    async fn build_settings(&self, _uri: &DocumentUri, _language: &str) -> Option<BuildSettings> {
        None
    }

    async fn file_handling_capability(&self, uri: &DocumentUri) -> FileHandlingCapability {
        self.capabilities.get(&uri.to_string()).copied().unwrap_or(self.default_capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_field_wins_over_command() {
        let entry = CompilationDatabaseEntry {
            directory: "/tmp".into(),
            file: "a.c".into(),
            command: Some("cc -O2 a.c".into()),
            arguments: Some(vec!["cc".into(), "-O0".into(), "a.c".into()]),
            output: None,
        };
        assert_eq!(
            entry.effective_arguments(ShellDialect::Posix),
            vec!["cc", "-O0", "a.c"]
        );
    }

    #[test]
    fn command_is_shell_split_posix() {
        let entry = CompilationDatabaseEntry {
            directory: "/tmp".into(),
            file: "a.c".into(),
            command: Some(r#"cc -DFOO="bar baz" a.c"#.into()),
            arguments: None,
            output: None,
        };
        assert_eq!(
            entry.effective_arguments(ShellDialect::Posix),
            vec!["cc", "-DFOO=bar baz", "a.c"]
        );
    }

    #[test]
    fn command_is_shell_split_windows() {
        let entry = CompilationDatabaseEntry {
            directory: "C:\\tmp".into(),
            file: "a.c".into(),
            command: Some(r#"cl.exe /DFOO="bar baz" a.c"#.into()),
            arguments: None,
            output: None,
        };
        assert_eq!(
            entry.effective_arguments(ShellDialect::Windows),
            vec!["cl.exe", "/DFOO=bar baz", "a.c"]
        );
    }

    #[test]
    fn compile_commands_round_trip_preserves_fields() {
        let json = r#"[{"directory":"/tmp","file":"a.c","arguments":["cc","a.c"],"output":"a.o"}]"#;
        let entries = parse_compile_commands(json).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].directory, "/tmp");
        assert_eq!(entries[0].file, "a.c");
        assert_eq!(entries[0].output.as_deref(), Some("a.o"));
    }

    #[test]
    fn compile_flags_are_trimmed_and_prefixed() {
        let flags = parse_compile_flags("  -Wall  \n\n-O2\n", "clang");
        assert_eq!(flags, vec!["clang", "-Wall", "-O2"]);
    }

    #[test]
    fn capability_ordering_matches_spec() {
        assert!(FileHandlingCapability::Unhandled < FileHandlingCapability::Fallback);
        assert!(FileHandlingCapability::Fallback < FileHandlingCapability::Handled);
    }

    #[tokio::test]
    async fn compilation_database_reports_handled_for_files_it_covers() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.c");
        std::fs::write(&source, "int main(void) { return 0; }").unwrap();
        let db = format!(
            r#"[{{"directory":"{}","file":"a.c","arguments":["cc","a.c"]}}]"#,
            dir.path().display()
        );
        std::fs::write(dir.path().join("compile_commands.json"), db).unwrap();

        let build_system = CompilationDatabaseBuildSystem::load(dir.path());
        let uri = DocumentUri::from_file_path(&source).unwrap();
        assert_eq!(build_system.file_handling_capability(&uri).await, FileHandlingCapability::Handled);
        let settings = build_system.build_settings(&uri, "c").await.unwrap();
        assert_eq!(settings.compiler_args, vec!["cc", "a.c"]);
    }

    #[tokio::test]
    async fn compilation_database_falls_back_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let build_system = CompilationDatabaseBuildSystem::load(dir.path());
        let uri = DocumentUri::from_file_path(dir.path().join("a.c")).unwrap();
        assert_eq!(build_system.file_handling_capability(&uri).await, FileHandlingCapability::Fallback);
    }
}
