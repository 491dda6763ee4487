//! Incremental parse cache (spec §4.8), grounded on the original
//! implementation's `parse_cache.py`. A single persisted artifact maps
//! `(slug, blake2b)` to a serialized page, discarded wholesale when its
//! `(version, config-hash, spec-hash)` specifier no longer matches.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::assets::blake2b_hex;
use crate::config::ProjectConfig;
use crate::diagnostic::Diagnostic;
use crate::error::CoreError;
use crate::fileid::FileId;
use crate::page::Page;

pub const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSpecifier {
    pub version: String,
    pub config_hash: String,
    pub spec_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedPage {
    page: Page,
    diagnostics: Vec<Diagnostic>,
}

/// The persisted cache payload. Keyed by `(slug, blake2b)` exactly as
/// the original implementation does, so a file's content hash alone
/// determines whether its cached entry still applies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheData {
    pub specifier: CacheSpecifier,
    /// Keyed by `"{slug}\u{0}{blake2b}"`: a tuple key would not
    /// round-trip through a JSON object, whose keys must be strings.
    pages: HashMap<String, CachedPage>,
    orphan_diagnostics: HashMap<String, Vec<Diagnostic>>,
}

pub struct CacheMiss;

fn page_key(slug: &str, blake2b: &str) -> String {
    format!("{slug}\u{0}{blake2b}")
}

impl CacheData {
    pub fn new(specifier: CacheSpecifier) -> Self {
        CacheData {
            specifier,
            pages: HashMap::new(),
            orphan_diagnostics: HashMap::new(),
        }
    }

    pub fn set_page(&mut self, page: Page, diagnostics: Vec<Diagnostic>) {
        let key = page_key(&page.fileid.as_posix(), &page.blake2b);
        self.pages.insert(key, CachedPage { page, diagnostics });
    }

    pub fn set_orphan_diagnostics(&mut self, fileid: &FileId, diagnostics: Vec<Diagnostic>) {
        self.orphan_diagnostics.insert(fileid.as_posix(), diagnostics);
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Looks up the cached page for `fileid` at `source_root`, by
    /// content hash, then revalidates every recorded dependency
    /// against its current on-disk hash. Any mismatch — the page
    /// itself changed, a dependency changed, or a dependency
    /// disappeared — is a cache miss.
    pub fn get(
        &self,
        fileid: &FileId,
        source_root: &Path,
    ) -> Result<(Page, Vec<Diagnostic>), CacheMiss> {
        let full_path = source_root.join(fileid.as_path());
        let bytes = std::fs::read(&full_path).map_err(|_| CacheMiss)?;
        let file_hash = blake2b_hex(&bytes);

        let key = page_key(&fileid.as_posix(), &file_hash);
        let cached = self.pages.get(&key).ok_or(CacheMiss)?;

        for (dep_fileid, expected_hash) in &cached.page.dependencies {
            let dep_path = source_root.join(dep_fileid.as_path());
            let actual = std::fs::read(&dep_path).map_err(|_| CacheMiss)?;
            if blake2b_hex(&actual) != *expected_hash {
                return Err(CacheMiss);
            }
        }

        Ok((cached.page.clone(), cached.diagnostics.clone()))
    }
}

pub struct ParseCache {
    path: PathBuf,
}

impl ParseCache {
    pub fn new(config: &ProjectConfig) -> Self {
        ParseCache {
            path: config.root.join(".parsercache"),
        }
    }

    /// Computes the current `(version, config-hash, spec-hash)` triple
    /// a fresh `CacheData` must be stamped with, and an existing one
    /// must match to be reused.
    pub fn generate_specifier(config: &ProjectConfig, spec_text: &str) -> Result<CacheSpecifier, CoreError> {
        let config_bytes = serde_json::to_vec(config)?;
        Ok(CacheSpecifier {
            version: CRATE_VERSION.to_string(),
            config_hash: blake2b_hex(&config_bytes),
            spec_hash: blake2b_hex(spec_text.as_bytes()),
        })
    }

    /// Reads the cache file, discarding it (returning an empty
    /// `CacheData`) if it is missing, unreadable, or stamped with a
    /// stale specifier.
    pub fn read(&self, specifier: CacheSpecifier) -> CacheData {
        match std::fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<CacheData>(&bytes) {
                Ok(data) if data.specifier == specifier => data,
                Ok(_) => {
                    tracing::info!("cache specifier mismatch, discarding cache");
                    CacheData::new(specifier)
                }
                Err(err) => {
                    tracing::debug!(%err, "error deserializing cache file");
                    CacheData::new(specifier)
                }
            },
            Err(err) => {
                tracing::debug!(%err, "error reading cache file");
                CacheData::new(specifier)
            }
        }
    }

    /// Writes `data` via a temporary sibling file, then renames it
    /// into place, so a crash mid-write never corrupts the existing
    /// cache.
    pub fn persist(&self, data: &CacheData) -> Result<(), CoreError> {
        let bytes = serde_json::to_vec(data)?;
        let tmp_path = self.path.with_extension("tmp");
        {
            let mut tmp = std::fs::File::create(&tmp_path).map_err(|e| CoreError::Cache(e.to_string()))?;
            tmp.write_all(&bytes).map_err(|e| CoreError::Cache(e.to_string()))?;
        }
        std::fs::rename(&tmp_path, &self.path).map_err(|e| CoreError::Cache(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{NodeData, Options, Span};

    fn sample_page(fileid: FileId, source: &str) -> Page {
        let ast = crate::ast::Node::new(
            Span::new(0),
            NodeData::Root {
                children: vec![],
                options: Options::new(),
                fileid: fileid.clone(),
            },
        );
        Page::create(fileid, "page.html", source.to_string(), ast)
    }

    #[test]
    fn hit_after_set_with_matching_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();

        let mut cache = CacheData::new(CacheSpecifier {
            version: "1".into(),
            config_hash: "c".into(),
            spec_hash: "s".into(),
        });
        let page = sample_page(FileId::new("a.txt"), "hello");
        cache.set_page(page, vec![]);

        let result = cache.get(&FileId::new("a.txt"), dir.path());
        assert!(result.is_ok());
    }

    #[test]
    fn miss_when_content_changed_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "changed").unwrap();

        let mut cache = CacheData::new(CacheSpecifier {
            version: "1".into(),
            config_hash: "c".into(),
            spec_hash: "s".into(),
        });
        let page = sample_page(FileId::new("a.txt"), "hello");
        cache.set_page(page, vec![]);

        let result = cache.get(&FileId::new("a.txt"), dir.path());
        assert!(result.is_err());
    }

    #[test]
    fn miss_when_dependency_changed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        std::fs::write(dir.path().join("dep.txt"), "original").unwrap();

        let mut cache = CacheData::new(CacheSpecifier {
            version: "1".into(),
            config_hash: "c".into(),
            spec_hash: "s".into(),
        });
        let mut page = sample_page(FileId::new("a.txt"), "hello");
        page.dependencies.insert(FileId::new("dep.txt"), blake2b_hex(b"stale"));
        cache.set_page(page, vec![]);

        let result = cache.get(&FileId::new("a.txt"), dir.path());
        assert!(result.is_err());
    }

    #[test]
    fn persist_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let specifier = CacheSpecifier {
            version: "1".into(),
            config_hash: "c".into(),
            spec_hash: "s".into(),
        };
        let mut data = CacheData::new(specifier.clone());
        data.set_page(sample_page(FileId::new("a.txt"), "hello"), vec![]);

        let cache = ParseCache {
            path: dir.path().join(".parsercache"),
        };
        cache.persist(&data).unwrap();

        let reloaded = cache.read(specifier);
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn stale_specifier_discards_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = CacheData::new(CacheSpecifier {
            version: "1".into(),
            config_hash: "c".into(),
            spec_hash: "s".into(),
        });
        data.set_page(sample_page(FileId::new("a.txt"), "hello"), vec![]);

        let cache = ParseCache {
            path: dir.path().join(".parsercache"),
        };
        cache.persist(&data).unwrap();

        let reloaded = cache.read(CacheSpecifier {
            version: "2".into(),
            config_hash: "c".into(),
            spec_hash: "s".into(),
        });
        assert!(reloaded.is_empty());
    }
}
