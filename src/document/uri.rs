use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::Url;

/// An opaque document identifier with an associated file-system path
/// projection.
///
/// Equality is stringwise (the wrapped [`Url`]'s own `Eq`), but routing
/// collaborators that need to match against index-reported paths should
/// use [`DocumentUri::canonical_path`], which resolves symbolic links the
/// way the persistent index does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentUri(Url);

impl DocumentUri {
    pub fn new(url: Url) -> Self {
        Self(url)
    }

    pub fn parse(s: &str) -> Result<Self, url::ParseError> {
        Ok(Self(Url::parse(s)?))
    }

    pub fn from_file_path(path: impl AsRef<Path>) -> Option<Self> {
        Url::from_file_path(path).ok().map(Self)
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn into_url(self) -> Url {
        self.0
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.0.to_file_path().ok()
    }

    /// Resolves symbolic links in the file-system projection of this URI.
    /// Returns `None` for non-`file://` URIs or paths that do not exist on
    /// disk. The persistent index stores canonical paths, so rename (C8)
    /// and navigation (C9) use this to line up index occurrences with
    /// live buffers.
    pub fn canonical_path(&self) -> Option<PathBuf> {
        self.path().and_then(|p| std::fs::canonicalize(p).ok())
    }

    pub fn extension(&self) -> Option<String> {
        self.path()
            .and_then(|p| p.extension().map(|e| e.to_string_lossy().into_owned()))
    }
}

impl fmt::Display for DocumentUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Url> for DocumentUri {
    fn from(url: Url) -> Self {
        Self(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_stringwise() {
        let a = DocumentUri::parse("file:///a.swift").unwrap();
        let b = DocumentUri::parse("file:///a.swift").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_paths_are_not_equal() {
        let a = DocumentUri::parse("file:///a.swift").unwrap();
        let b = DocumentUri::parse("file:///b.swift").unwrap();
        assert_ne!(a, b);
    }
}
