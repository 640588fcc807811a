//! Shared small types referenced across several components.

use serde::{Deserialize, Serialize};

/// Which backend family a language-service adapter wraps.
///
/// The core is polymorphic over exactly two backend kinds: a
/// compile-driven backend (modelled on sourcekit-lsp's relationship to
/// the Swift compiler's SourceKit service) and a C-family backend
/// (modelled on clangd). Adding a third backend kind is out of scope —
/// spec.md scopes the backend interface to these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    CompileDriven,
    CFamily,
}

impl BackendKind {
    pub fn supports_language(&self, language: &str) -> bool {
        match self {
            BackendKind::CompileDriven => matches!(language, "swift"),
            BackendKind::CFamily => matches!(language, "c" | "cpp" | "objective-c" | "objective-cpp"),
        }
    }

    pub fn for_language(language: &str) -> Option<Self> {
        if BackendKind::CompileDriven.supports_language(language) {
            Some(BackendKind::CompileDriven)
        } else if BackendKind::CFamily.supports_language(language) {
            Some(BackendKind::CFamily)
        } else {
            None
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::CompileDriven => write!(f, "compile-driven"),
            BackendKind::CFamily => write!(f, "c-family"),
        }
    }
}

/// Maps a file extension to the language id handlers and synthesized
/// disk snapshots (`DocumentSnapshot::from_disk`) key off of. This is
/// the rule table §6 mentions for file-watcher registration and for
/// inferring the language of a file the editor never opened.
pub fn language_for_extension(extension: &str) -> String {
    match extension {
        "swift" => "swift",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => "cpp",
        "m" => "objective-c",
        "mm" => "objective-cpp",
        other => other,
    }
    .to_string()
}

/// Source file extensions watched per backend kind, and the package
/// manifest filename whose *change* (not create/delete) is watched
/// alongside them (§6).
pub fn watched_extensions(kind: BackendKind) -> &'static [&'static str] {
    match kind {
        BackendKind::CompileDriven => &["swift"],
        BackendKind::CFamily => &["c", "h", "cpp", "cc", "cxx", "hpp", "hh", "hxx", "m", "mm"],
    }
}

pub fn manifest_filename(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::CompileDriven => "Package.swift",
        BackendKind::CFamily => "CMakeLists.txt",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_maps_to_expected_language() {
        assert_eq!(language_for_extension("swift"), "swift");
        assert_eq!(language_for_extension("hpp"), "cpp");
        assert_eq!(language_for_extension("mm"), "objective-cpp");
    }

    #[test]
    fn for_language_picks_compile_driven_for_swift() {
        assert_eq!(BackendKind::for_language("swift"), Some(BackendKind::CompileDriven));
        assert_eq!(BackendKind::for_language("cpp"), Some(BackendKind::CFamily));
        assert_eq!(BackendKind::for_language("rust"), None);
    }
}
