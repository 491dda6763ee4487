//! The postprocessing stage (spec §4.7): resolves includes, targets,
//! and refs across the whole page set, then assembles the toctree and
//! breadcrumb metadata. Grounded on the original implementation's
//! `postprocess.py`.
//!
//! Python drives this with an event parser: a list of listener
//! callbacks invoked as a single tree-walk visits every node. Per the
//! redesign guidance (spec §9), this is reorganized into a short,
//! explicit pipeline of plain passes over the page map, each one doing
//! its own walk — easier to follow and to test in isolation, at the
//! cost of a few extra traversals of trees that are cheap to walk.

pub mod passes;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::ast::{Node, NodeData};
use crate::diagnostic::Diagnostic;
use crate::fileid::FileId;
use crate::page::Page;
use crate::target::TargetDatabase;

pub use passes::clean_slug;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ToctreeOptions {
    pub drawer: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToctreeNode {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Vec<Node>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub children: Vec<ToctreeNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<ToctreeOptions>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetadataDocument {
    pub title: String,
    pub slug_to_title: HashMap<String, Vec<Node>>,
    pub toctree: ToctreeNode,
    pub toctree_order: Vec<String>,
    pub parent_paths: HashMap<String, Vec<String>>,
}

/// The parts of project configuration the postprocessor needs. Kept
/// narrow rather than taking the whole `ProjectConfig` so this module
/// can be tested without constructing one.
pub struct PostprocessConfig {
    pub title: String,
    pub toc_landing_pages: HashSet<String>,
}

/// `contents` if the project has that page, else `index`, matching
/// the original implementation's root-page fallback.
fn root_slug(slug_fileid: &HashMap<String, FileId>) -> String {
    if slug_fileid.contains_key("contents") {
        "contents".to_string()
    } else {
        "index".to_string()
    }
}

pub struct Postprocessor {
    config: PostprocessConfig,
}

impl Postprocessor {
    pub fn new(config: PostprocessConfig) -> Self {
        Postprocessor { config }
    }

    /// Runs every pass over `pages` in order, returning the assembled
    /// metadata document and any diagnostics raised along the way.
    /// `targets` is cleared of local definitions and reseeded from
    /// `pages` on every run, matching `copy_clean_slate`'s purpose: a
    /// stale definition from a since-deleted page must not survive.
    pub fn run(
        &self,
        pages: &mut HashMap<FileId, Page>,
        targets: &TargetDatabase,
    ) -> (MetadataDocument, HashMap<FileId, Vec<Diagnostic>>) {
        passes::populate_include_nodes(pages);

        let slug_fileid = passes::build_slug_fileid_mapping(pages);
        let slug_to_title = passes::build_slug_title_mapping(pages);

        for (fileid, page) in pages.iter() {
            if let NodeData::Root { children, .. } = &page.ast.data {
                passes::resolve_label_targets(children, fileid, targets);
            }
        }

        let mut diagnostics = passes::handle_refs(pages, targets);

        let (toctree, toctree_order, parent_paths) =
            build_toctree(pages, &slug_fileid, &slug_to_title, &self.config);

        let metadata = MetadataDocument {
            title: self.config.title.clone(),
            slug_to_title,
            toctree,
            toctree_order,
            parent_paths,
        };
        (metadata, diagnostics)
    }
}

fn find_toctree_entries(node: &Node, out: &mut Vec<crate::ast::TocTreeDirectiveEntry>) {
    if let NodeData::TocTreeDirective { entries, .. } = &node.data {
        out.extend(entries.iter().cloned());
    }
    for child in node.children() {
        find_toctree_entries(child, out);
    }
}

/// Recursively assembles the toctree from the root page's `toctree`
/// directives, matching the original implementation's `build_toctree`.
/// Cycles (a page transitively including itself) are broken by the
/// `visited` set rather than erroring, since a toctree is a navigation
/// aid, not a correctness-critical structure.
#[allow(clippy::too_many_arguments)]
fn build_toctree_node(
    slug: &str,
    pages: &HashMap<FileId, Page>,
    slug_fileid: &HashMap<String, FileId>,
    slug_to_title: &HashMap<String, Vec<Node>>,
    toc_landing_pages: &HashSet<String>,
    visited: &mut HashSet<String>,
    order: &mut Vec<String>,
    parent_paths: &mut HashMap<String, Vec<String>>,
    ancestors: &[String],
) -> ToctreeNode {
    order.push(slug.to_string());
    parent_paths.insert(slug.to_string(), ancestors.to_vec());

    let mut children = Vec::new();
    if visited.insert(slug.to_string()) {
        if let Some(fileid) = slug_fileid.get(slug) {
            if let Some(page) = pages.get(fileid) {
                let mut entries = Vec::new();
                find_toctree_entries(&page.ast, &mut entries);

                let mut child_ancestors = ancestors.to_vec();
                child_ancestors.push(slug.to_string());

                for entry in entries {
                    if let Some(url) = entry.url {
                        children.push(ToctreeNode {
                            title: entry.title,
                            slug: None,
                            url: Some(url),
                            children: vec![],
                            options: None,
                        });
                    } else if let Some(child_slug) = entry.slug {
                        let clean = clean_slug(&child_slug);
                        let child = build_toctree_node(
                            &clean,
                            pages,
                            slug_fileid,
                            slug_to_title,
                            toc_landing_pages,
                            visited,
                            order,
                            parent_paths,
                            &child_ancestors,
                        );
                        children.push(child);
                    }
                }
            }
        }
    }

    let options = Some(ToctreeOptions {
        drawer: !toc_landing_pages.contains(slug),
    });

    ToctreeNode {
        title: slug_to_title.get(slug).cloned(),
        slug: Some(slug.to_string()),
        url: None,
        children,
        options,
    }
}

fn build_toctree(
    pages: &HashMap<FileId, Page>,
    slug_fileid: &HashMap<String, FileId>,
    slug_to_title: &HashMap<String, Vec<Node>>,
    config: &PostprocessConfig,
) -> (ToctreeNode, Vec<String>, HashMap<String, Vec<String>>) {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    let mut parent_paths = HashMap::new();

    let mut root = build_toctree_node(
        &root_slug(slug_fileid),
        pages,
        slug_fileid,
        slug_to_title,
        &config.toc_landing_pages,
        &mut visited,
        &mut order,
        &mut parent_paths,
        &[],
    );
    root.title = Some(vec![Node::new(
        crate::ast::Span::new(0),
        NodeData::Text {
            value: config.title.clone(),
        },
    )]);
    root.slug = Some("/".to_string());
    root.options = None;
    parent_paths.insert("/".to_string(), vec![]);

    (root, order, parent_paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Options, Span, TocTreeDirectiveEntry};

    fn page_with_toctree(fileid: FileId, entries: Vec<TocTreeDirectiveEntry>) -> Page {
        let toctree = Node::new(
            Span::new(1),
            NodeData::TocTreeDirective {
                children: vec![],
                domain: String::new(),
                name: "toctree".to_string(),
                argument: vec![],
                options: Options::new(),
                entries,
            },
        );
        let root = Node::new(
            Span::new(0),
            NodeData::Root {
                children: vec![toctree],
                options: Options::new(),
                fileid: fileid.clone(),
            },
        );
        Page::create(fileid, "page.html", String::new(), root)
    }

    fn leaf_page(fileid: FileId) -> Page {
        let root = Node::new(
            Span::new(0),
            NodeData::Root {
                children: vec![],
                options: Options::new(),
                fileid: fileid.clone(),
            },
        );
        Page::create(fileid, "page.html", String::new(), root)
    }

    #[test]
    fn toctree_assembles_nested_slugs_and_urls() {
        let mut pages = HashMap::new();
        pages.insert(
            FileId::new("index.txt"),
            page_with_toctree(
                FileId::new("index.txt"),
                vec![
                    TocTreeDirectiveEntry {
                        title: None,
                        url: None,
                        slug: Some("/page1".to_string()),
                    },
                    TocTreeDirectiveEntry {
                        title: Some(vec![Node::new(Span::new(1), NodeData::Text { value: "Extern".into() })]),
                        url: Some("https://example.com".to_string()),
                        slug: None,
                    },
                ],
            ),
        );
        pages.insert(FileId::new("page1.txt"), leaf_page(FileId::new("page1.txt")));

        let slug_fileid = passes::build_slug_fileid_mapping(&pages);
        let mut slug_to_title = HashMap::new();
        slug_to_title.insert(
            "page1".to_string(),
            vec![Node::new(Span::new(1), NodeData::Text { value: "Page One".into() })],
        );

        let config = PostprocessConfig {
            title: "My Project".to_string(),
            toc_landing_pages: HashSet::from(["page1".to_string()]),
        };

        let (toctree, order, parent_paths) = build_toctree(&pages, &slug_fileid, &slug_to_title, &config);

        assert_eq!(toctree.slug.as_deref(), Some("/"));
        assert_eq!(toctree.children.len(), 2);
        assert_eq!(toctree.children[0].slug.as_deref(), Some("page1"));
        assert_eq!(toctree.children[0].options.as_ref().unwrap().drawer, false);
        assert_eq!(toctree.children[1].url.as_deref(), Some("https://example.com"));
        assert!(order.contains(&"page1".to_string()));
        assert_eq!(parent_paths.get("page1").unwrap(), &vec!["index".to_string()]);
    }
}
