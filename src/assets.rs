//! Static-asset hashing and dependency graph (spec §2, §3).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use blake2::{Blake2b512, Digest};
use serde::{Deserialize, Serialize};

use crate::fileid::FileId;

/// `{key, fileid, path, upload, checksum, data}`. Loaded lazily;
/// equality and hash are defined on `fileid` only, matching spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticAsset {
    pub key: String,
    pub fileid: FileId,
    pub path: PathBuf,
    pub upload: bool,
    checksum: Option<String>,
    data: Option<Vec<u8>>,
}

impl PartialEq for StaticAsset {
    fn eq(&self, other: &Self) -> bool {
        self.fileid == other.fileid
    }
}
impl Eq for StaticAsset {}

impl std::hash::Hash for StaticAsset {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.fileid.hash(state);
    }
}

impl StaticAsset {
    pub fn new(key: impl Into<String>, fileid: FileId, path: PathBuf, upload: bool) -> Self {
        StaticAsset {
            key: key.into(),
            fileid,
            path,
            upload,
            checksum: None,
            data: None,
        }
    }

    /// Loads file bytes and computes the blake2b checksum, memoizing
    /// both so repeated calls do not re-read the file.
    pub fn load(&mut self) -> std::io::Result<&[u8]> {
        if self.data.is_none() {
            let bytes = std::fs::read(&self.path)?;
            let mut hasher = Blake2b512::new();
            hasher.update(&bytes);
            self.checksum = Some(hex::encode(hasher.finalize()));
            self.data = Some(bytes);
        }
        Ok(self.data.as_deref().unwrap())
    }

    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }
}

/// Memoizes per-(asset fileid, options-hash) expensive operations —
/// the per-project `expensive_operation_cache` referenced in spec §5.
#[derive(Debug, Default)]
pub struct ExpensiveOperationCache {
    entries: HashMap<(FileId, u64), Vec<u8>>,
}

impl ExpensiveOperationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute(
        &mut self,
        fileid: &FileId,
        options_hash: u64,
        compute: impl FnOnce() -> std::io::Result<Vec<u8>>,
    ) -> std::io::Result<&[u8]> {
        let key = (fileid.clone(), options_hash);
        if !self.entries.contains_key(&key) {
            let value = compute()?;
            self.entries.insert(key.clone(), value);
        }
        Ok(self.entries.get(&key).unwrap())
    }
}

pub fn blake2b_hex(data: &[u8]) -> String {
    let mut hasher = Blake2b512::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

pub fn blake2b_file(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(blake2b_hex(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_by_fileid_only() {
        let a = StaticAsset::new("k1", FileId::new("img.png"), PathBuf::from("/a"), true);
        let b = StaticAsset::new("k2", FileId::new("img.png"), PathBuf::from("/b"), false);
        assert_eq!(a, b);
    }

    #[test]
    fn cache_memoizes_compute() {
        let mut cache = ExpensiveOperationCache::new();
        let mut calls = 0;
        {
            let _ = cache
                .get_or_compute(&FileId::new("a"), 1, || {
                    calls += 1;
                    Ok(vec![1, 2, 3])
                })
                .unwrap();
        }
        let _ = cache.get_or_compute(&FileId::new("a"), 1, || {
            calls += 1;
            Ok(vec![9, 9, 9])
        });
        assert_eq!(calls, 1);
    }
}
