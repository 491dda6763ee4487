//! Project root and the external sink interfaces (spec §1, §7):
//! the CLI front-end, storage sink, and LSP driver are out of scope
//! here and represented only as narrow trait boundaries.

use std::path::Path;

use crate::cache::ParseCache;
use crate::config::ProjectConfig;
use crate::diagnostic::Diagnostic;
use crate::fileid::FileId;
use crate::page::Page;
use crate::pagedb::{FlushResult, PageDatabase};
use crate::postprocess::MetadataDocument;

/// Receives per-page results as the core produces them: an update with
/// the page's ancestor slug list plus its `Page`, or a delete. Spec
/// §7: "the core invokes a sink with `(prefix_path_list, fileid, page)`
/// on update and `(fileid)` on delete."
pub trait ResultSink {
    fn on_update(&mut self, prefix_path_list: &[String], fileid: &FileId, page: &Page);
    fn on_delete(&mut self, fileid: &FileId);
    fn on_diagnostics(&mut self, fileid: &FileId, diagnostics: &[Diagnostic]);
}

/// Receives the document-wide metadata object assembled by the
/// postprocessor once per flush.
pub trait MetadataSink {
    fn on_metadata(&mut self, metadata: &MetadataDocument);
}

/// Ties configuration, the page database, and the parse cache together
/// into the one object a driver (CLI, LSP, watch loop) holds.
pub struct Project {
    pub config: ProjectConfig,
    pub pages: PageDatabase,
    pub cache: ParseCache,
}

impl Project {
    pub fn open(config_path: &Path) -> Result<Self, crate::error::CoreError> {
        let config = ProjectConfig::load(config_path)?;
        let targets = std::sync::Arc::new(crate::target::TargetDatabase::new());
        let toc_landing_pages = config.toc_landing_pages.iter().cloned().collect();
        let pages = PageDatabase::new(targets, config.title.clone(), toc_landing_pages);
        let cache = ParseCache::new(&config);
        Ok(Project { config, pages, cache })
    }

    /// Runs a completed flush result out to both sinks: every page in
    /// the result to `result_sink`, and the metadata document to
    /// `metadata_sink`. Deletions are the caller's responsibility to
    /// detect by diffing against the previously published page set,
    /// since a `FlushResult` only carries what currently exists.
    pub fn publish(
        &self,
        result: &FlushResult,
        result_sink: &mut dyn ResultSink,
        metadata_sink: &mut dyn MetadataSink,
    ) {
        for (fileid, page) in &result.pages {
            let prefix_path_list = result
                .metadata
                .parent_paths
                .get(&crate::postprocess::clean_slug(&fileid.as_posix()))
                .cloned()
                .unwrap_or_default();
            result_sink.on_update(&prefix_path_list, fileid, page);
            if let Some(diagnostics) = result.diagnostics.get(fileid) {
                if !diagnostics.is_empty() {
                    result_sink.on_diagnostics(fileid, diagnostics);
                }
            }
        }
        metadata_sink.on_metadata(&result.metadata);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct RecordingSink {
        updates: Vec<FileId>,
        deletes: Vec<FileId>,
    }

    impl ResultSink for RecordingSink {
        fn on_update(&mut self, _prefix_path_list: &[String], fileid: &FileId, _page: &Page) {
            self.updates.push(fileid.clone());
        }
        fn on_delete(&mut self, fileid: &FileId) {
            self.deletes.push(fileid.clone());
        }
        fn on_diagnostics(&mut self, _fileid: &FileId, _diagnostics: &[Diagnostic]) {}
    }

    struct RecordingMetadataSink {
        titles: Vec<String>,
    }

    impl MetadataSink for RecordingMetadataSink {
        fn on_metadata(&mut self, metadata: &MetadataDocument) {
            self.titles.push(metadata.title.clone());
        }
    }

    #[test]
    fn publish_forwards_pages_and_metadata() {
        let ast = crate::ast::Node::new(
            crate::ast::Span::new(0),
            crate::ast::NodeData::Root {
                children: vec![],
                options: crate::ast::Options::new(),
                fileid: FileId::new("a.txt"),
            },
        );
        let page = Page::create(FileId::new("a.txt"), "a.html", String::new(), ast);
        let mut pages = HashMap::new();
        pages.insert(FileId::new("a.txt"), page);

        let result = FlushResult {
            pages,
            metadata: MetadataDocument {
                title: "Proj".to_string(),
                ..Default::default()
            },
            diagnostics: HashMap::new(),
        };

        let mut result_sink = RecordingSink {
            updates: vec![],
            deletes: vec![],
        };
        let mut metadata_sink = RecordingMetadataSink { titles: vec![] };

        let config = ProjectConfig {
            root: std::path::PathBuf::from("."),
            name: "proj".to_string(),
            title: "Proj".to_string(),
            source: "source".to_string(),
            default_domain: None,
            constants: Default::default(),
            substitutions: Default::default(),
            intersphinx: vec![],
            toc_landing_pages: vec![],
            sharedinclude_root: None,
            page_groups: Default::default(),
            associated_products: vec![],
            deprecated_versions: vec![],
            manpages: Default::default(),
            bundle: Default::default(),
        };
        let targets = std::sync::Arc::new(crate::target::TargetDatabase::new());
        let project = Project {
            pages: PageDatabase::new(targets, config.title.clone(), Default::default()),
            cache: ParseCache::new(&config),
            config,
        };

        project.publish(&result, &mut result_sink, &mut metadata_sink);
        assert_eq!(result_sink.updates, vec![FileId::new("a.txt")]);
        assert_eq!(metadata_sink.titles, vec!["Proj".to_string()]);
    }
}
