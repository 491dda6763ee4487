//! Local + external ref→URL/fileid resolution (spec §4.6).

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::ast::Node;
use crate::fileid::FileId;
use crate::intersphinx::Inventory;

#[derive(Debug, Clone)]
pub struct LocalDefinition {
    pub canonical_name: String,
    pub fileid: FileId,
    pub title_nodes: Vec<Node>,
    pub html5_id: String,
}

#[derive(Debug, Clone)]
pub enum TargetResult {
    Internal {
        fileid: FileId,
        html5_id: String,
        canonical: String,
        title: Vec<Node>,
    },
    External {
        url: String,
        canonical: String,
        title: Vec<Node>,
    },
}

#[derive(Default)]
struct Inner {
    intersphinx_inventories: HashMap<String, Inventory>,
    local_definitions: HashMap<String, Vec<LocalDefinition>>,
}

/// `{intersphinx_inventories, local_definitions}` guarded by one mutex,
/// matching the original implementation's locking granularity.
#[derive(Default)]
pub struct TargetDatabase {
    inner: Mutex<Inner>,
}

fn normalize_key(key: &str) -> String {
    key.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl TargetDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a `LocalDefinition` for each alias. The alias with the
    /// most `.` separators becomes the canonical name used for titles
    /// in cross-file ref serialization.
    pub fn define_local_target(
        &self,
        domain: &str,
        name: &str,
        targets: &[String],
        fileid: FileId,
        title_nodes: Vec<Node>,
        html5_id: String,
    ) {
        if targets.is_empty() {
            return;
        }
        let canonical = targets
            .iter()
            .max_by_key(|t| t.matches('.').count())
            .cloned()
            .unwrap_or_default();

        let mut inner = self.inner.lock();
        for target in targets {
            let normalized = normalize_key(target);
            let key = format!("{domain}:{name}:{normalized}");
            inner.local_definitions.entry(key).or_default().push(LocalDefinition {
                canonical_name: canonical.clone(),
                fileid: fileid.clone(),
                title_nodes: title_nodes.clone(),
                html5_id: html5_id.clone(),
            });
        }
    }

    /// Normalizes `key`, then tries local definitions first, then each
    /// intersphinx inventory in configuration order (with a
    /// case-insensitive fallback logged at debug level — preserved per
    /// spec §9 open question).
    pub fn lookup(&self, key: &str) -> Vec<TargetResult> {
        let normalized = normalize_key(key);
        let inner = self.inner.lock();

        if let Some(defs) = inner.local_definitions.get(&normalized) {
            return defs
                .iter()
                .map(|d| TargetResult::Internal {
                    fileid: d.fileid.clone(),
                    html5_id: d.html5_id.clone(),
                    canonical: d.canonical_name.clone(),
                    title: d.title_nodes.clone(),
                })
                .collect();
        }

        let mut results = Vec::new();
        for inventory in inner.intersphinx_inventories.values() {
            if let Some(def) = inventory.get(&normalized) {
                results.push(external_result(inventory, def));
                continue;
            }
            let lowered = normalized.to_lowercase();
            if lowered != normalized {
                if let Some(def) = inventory.get(&lowered) {
                    tracing::debug!(key = %normalized, "intersphinx lookup used case-insensitive fallback");
                    results.push(external_result(inventory, def));
                }
            }
        }
        results
    }

    /// Atomically swaps the inventory map. Fetching is the external
    /// collaborator's job (spec §1); this accepts already-fetched
    /// inventories keyed by URL and simply installs them, collecting
    /// any `(url, error)` pairs the caller already knows about.
    pub fn reset(&self, fetched: HashMap<String, Inventory>) {
        let mut inner = self.inner.lock();
        inner.intersphinx_inventories = fetched;
        inner.local_definitions.clear();
    }

    /// Deep-copies only the intersphinx inventories, seeding a fresh
    /// postprocessor run's working target database while local
    /// definitions are rebuilt from scratch every pass.
    pub fn copy_clean_slate(&self) -> TargetDatabase {
        let inner = self.inner.lock();
        let copy = Inner {
            intersphinx_inventories: inner.intersphinx_inventories.clone(),
            local_definitions: HashMap::new(),
        };
        TargetDatabase { inner: Mutex::new(copy) }
    }

    /// Builds a reverse intersphinx inventory from local definitions so
    /// this project's targets can be published for another project.
    /// The `(std, doc)` role omits the `#html5_id` anchor, matching the
    /// original implementation's special case.
    pub fn generate_inventory(&self, base_url: &str) -> Inventory {
        let inner = self.inner.lock();
        let mut targets = HashMap::new();
        for (key, defs) in inner.local_definitions.iter() {
            let parts: Vec<&str> = key.splitn(3, ':').collect();
            if parts.len() != 3 {
                continue;
            }
            let (domain, role, name) = (parts[0], parts[1], parts[2]);
            if let Some(def) = defs.first() {
                let uri = if (domain, role) == ("std", "doc") {
                    def.fileid.without_known_suffix()
                } else {
                    format!("{}#{}", def.fileid.without_known_suffix(), def.html5_id)
                };
                targets.insert(
                    key.to_lowercase(),
                    crate::intersphinx::TargetDefinition {
                        name: name.to_string(),
                        role: (domain.to_string(), role.to_string()),
                        priority: 1,
                        uri,
                        display_name: def.canonical_name.clone(),
                    },
                );
            }
        }
        Inventory {
            base_url: base_url.to_string(),
            targets,
        }
    }
}

fn external_result(
    inventory: &Inventory,
    def: &crate::intersphinx::TargetDefinition,
) -> TargetResult {
    let url = format!("{}{}", inventory.base_url, def.uri);
    TargetResult::External {
        url,
        canonical: def.name.clone(),
        title: vec![crate::ast::Node::new(
            crate::ast::Span::new(0),
            crate::ast::NodeData::Text {
                value: def.display_name.clone(),
            },
        )],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_beats_intersphinx() {
        let db = TargetDatabase::new();
        db.define_local_target(
            "std",
            "label",
            &["a".to_string()],
            FileId::new("page.rst"),
            vec![],
            "a".to_string(),
        );
        let mut inv = Inventory::default();
        inv.targets.insert(
            "std:label:a".to_string(),
            crate::intersphinx::TargetDefinition {
                name: "a".into(),
                role: ("std".into(), "label".into()),
                priority: 1,
                uri: "x".into(),
                display_name: "a".into(),
            },
        );
        db.reset(HashMap::from([("base".to_string(), inv)]));
        db.define_local_target(
            "std",
            "label",
            &["a".to_string()],
            FileId::new("page.rst"),
            vec![],
            "a".to_string(),
        );
        let results = db.lookup("std:label:a");
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], TargetResult::Internal { .. }));
    }

    #[test]
    fn canonical_name_has_most_dots() {
        let db = TargetDatabase::new();
        db.define_local_target(
            "std",
            "label",
            &["a".to_string(), "a.b.c".to_string(), "a.b".to_string()],
            FileId::new("page.rst"),
            vec![],
            "a".to_string(),
        );
        let results = db.lookup("std:label:a.b.c");
        match &results[0] {
            TargetResult::Internal { canonical, .. } => assert_eq!(canonical, "a.b.c"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
