//! Canonical project-relative file identifiers.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

static KNOWN_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.(txt|rst|yaml)$").expect("static regex"));

/// A POSIX-style, project-relative path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "PathBuf", into = "PathBuf")]
pub struct FileId {
    path: PathBuf,
}

impl FileId {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileId { path: path.into() }
    }

    pub fn as_path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn suffix(&self) -> Option<String> {
        self.path
            .extension()
            .map(|s| format!(".{}", s.to_string_lossy()))
    }

    /// Stable, forward-slash, no-leading-`.`, no-`..`-collapsed representation.
    pub fn as_posix(&self) -> String {
        let mut parts = Vec::new();
        for component in self.path.components() {
            match component {
                Component::RootDir => {}
                Component::CurDir => parts.push(".".to_string()),
                Component::ParentDir => parts.push("..".to_string()),
                Component::Normal(s) => parts.push(s.to_string_lossy().into_owned()),
                Component::Prefix(_) => {}
            }
        }
        parts.join("/")
    }

    /// The slug: known suffix stripped.
    pub fn without_known_suffix(&self) -> String {
        let posix = self.as_posix();
        KNOWN_SUFFIX.replace(&posix, "").into_owned()
    }

    /// The slug with a trailing `/`, used for directory-style HTML output.
    pub fn as_directory_html(&self) -> String {
        format!("{}/", self.without_known_suffix())
    }

    pub fn is_giza_category(&self, prefix: &str) -> bool {
        self.suffix().as_deref() == Some(".yaml") && self.name().starts_with(prefix)
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_posix())
    }
}

impl From<PathBuf> for FileId {
    fn from(path: PathBuf) -> Self {
        FileId { path }
    }
}

impl From<FileId> for PathBuf {
    fn from(id: FileId) -> Self {
        id.path
    }
}

impl From<&str> for FileId {
    fn from(s: &str) -> Self {
        FileId::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_known_suffixes() {
        assert_eq!(FileId::new("a/b.txt").without_known_suffix(), "a/b");
        assert_eq!(FileId::new("steps-foo.yaml").without_known_suffix(), "steps-foo");
        assert_eq!(FileId::new("a/b.png").without_known_suffix(), "a/b.png");
    }

    #[test]
    fn directory_html_has_trailing_slash() {
        assert_eq!(FileId::new("a/b.rst").as_directory_html(), "a/b/");
    }

    #[test]
    fn as_posix_normalizes_components() {
        assert_eq!(FileId::new("/a/./b/../c.rst").as_posix(), "a/./b/../c.rst");
    }

    #[test]
    fn giza_category_prefix() {
        assert!(FileId::new("steps-foo.yaml").is_giza_category("steps"));
        assert!(!FileId::new("other-foo.yaml").is_giza_category("steps"));
        assert!(!FileId::new("steps-foo.rst").is_giza_category("steps"));
    }
}
