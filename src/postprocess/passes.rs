//! Individual postprocessing passes (spec §4.7), grounded on the
//! original implementation's `postprocess.py`. Rather than threading an
//! event-parser callback list through the whole page set, each pass is
//! an explicit recursive walk over the pages it needs — the "trait
//! objects / interface values" re-architecture the design notes call
//! for collapses naturally into plain functions once the callback
//! indirection is gone.

use std::collections::HashMap;

use crate::ast::{Node, NodeData};
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::fileid::FileId;
use crate::page::Page;
use crate::target::{TargetDatabase, TargetResult};

/// Strips leading/trailing `/` and a known source extension, the
/// stable identifier used for toctree entries and ref targets.
pub fn clean_slug(raw: &str) -> String {
    let trimmed = raw.trim_matches('/');
    for suffix in [".txt", ".rst", ".yaml"] {
        if let Some(stripped) = trimmed.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    trimmed.to_string()
}

fn is_source_page(fileid: &FileId) -> bool {
    matches!(fileid.suffix().as_deref(), Some(".txt") | Some(".rst"))
}

pub fn build_slug_fileid_mapping(pages: &HashMap<FileId, Page>) -> HashMap<String, FileId> {
    pages
        .keys()
        .map(|fileid| (fileid.without_known_suffix(), fileid.clone()))
        .collect()
}

/// Replaces every `include` directive's children with the included
/// page's top-level children. Spliced-in content is visited by the
/// same traversal afterward, so nested includes expand transitively.
pub fn populate_include_nodes(pages: &mut HashMap<FileId, Page>) {
    let content_by_slug: HashMap<String, Vec<Node>> = pages
        .iter()
        .map(|(fileid, page)| {
            let children = match &page.ast.data {
                NodeData::Root { children, .. } => children.clone(),
                _ => Vec::new(),
            };
            (fileid.without_known_suffix(), children)
        })
        .collect();

    for page in pages.values_mut() {
        if !is_source_page(&page.fileid) {
            continue;
        }
        page.ast.for_each_mut(&mut |node: &mut Node| {
            if let NodeData::Directive {
                name,
                argument,
                children,
                ..
            } = &mut node.data
            {
                if name == "include" {
                    if let Some(arg_node) = argument.first() {
                        let slug = clean_slug(&arg_node.get_text());
                        if let Some(content) = content_by_slug.get(&slug) {
                            *children = content.clone();
                        }
                    }
                }
            }
        });
    }
}

/// Records the first heading encountered on each page, keyed by slug.
pub fn build_slug_title_mapping(pages: &HashMap<FileId, Page>) -> HashMap<String, Vec<Node>> {
    let mut mapping = HashMap::new();
    for (fileid, page) in pages {
        if !is_source_page(fileid) {
            continue;
        }
        let slug = fileid.without_known_suffix();
        let mut found = None;
        page.ast.for_each(&mut |node: &Node| {
            if found.is_none() {
                if let NodeData::Heading { children, .. } = &node.data {
                    found = Some(children.clone());
                }
            }
        });
        if let Some(children) = found {
            mapping.insert(slug, children);
        }
    }
    mapping
}

fn is_label_target(data: &NodeData) -> bool {
    matches!(data, NodeData::Target { domain, name, .. } if domain == "std" && name == "label")
}

fn heading_children_of_section(data: &NodeData) -> Option<Vec<Node>> {
    if let NodeData::Section { children } = data {
        if let Some(Node {
            data: NodeData::Heading { children, .. },
            ..
        }) = children.first()
        {
            return Some(children.clone());
        }
    }
    None
}

fn extract_target_ids(children: &[Node]) -> Vec<String> {
    let mut ids = Vec::new();
    for child in children {
        if let NodeData::TargetIdentifier { ids: node_ids } = &child.data {
            ids.extend(node_ids.iter().cloned());
        }
    }
    ids
}

/// Registers every `target` node with the target database: a run of
/// consecutive label targets immediately preceding a `section` picks
/// up that section's heading as its title (spec §8 S4); any other
/// target is registered with an empty title. Merges the original
/// implementation's `add_titles_to_label_targets` and `handle_target`
/// passes, which cooperated through a mutable side channel that has no
/// safe equivalent over an owned tree — this single recursive walk
/// produces the same observable result for the documented case.
pub fn resolve_label_targets(children: &[Node], fileid: &FileId, targets: &TargetDatabase) {
    let mut i = 0;
    while i < children.len() {
        if is_label_target(&children[i].data) {
            let mut j = i + 1;
            while j < children.len() && is_label_target(&children[j].data) {
                j += 1;
            }
            let title = children
                .get(j)
                .and_then(|n| heading_children_of_section(&n.data))
                .unwrap_or_default();

            for k in i..j {
                if let NodeData::Target { domain, name, children: target_children, .. } = &children[k].data {
                    let ids = extract_target_ids(target_children);
                    if !ids.is_empty() {
                        let html5_id = ids[0].clone();
                        targets.define_local_target(domain, name, &ids, fileid.clone(), title.clone(), html5_id);
                    }
                }
            }
            i = j;
            continue;
        }
        resolve_label_targets(children[i].children(), fileid, targets);
        i += 1;
    }
}

/// Descends through single-child chains to find the deepest node whose
/// `children` a resolved ref's title should be injected into. Returns
/// `None` if some node along the chain branches (more than one child),
/// matching `get_title_injection_candidate`. Stops at a leaf (a node
/// type with no `children` slot at all) rather than panicking.
fn title_injection_candidate_mut(node: &mut Node) -> Option<&mut Node> {
    let mut current = node;
    loop {
        if current.is_leaf() {
            return Some(current);
        }
        match current.children().len() {
            0 => return Some(current),
            1 => {
                current = &mut current.children_mut()[0];
            }
            _ => return None,
        }
    }
}

fn handle_ref_role(node: &mut Node, targets: &TargetDatabase, diagnostics: &mut Vec<Diagnostic>) {
    let (domain, name, target, line) = match &node.data {
        NodeData::RefRole {
            domain,
            name,
            target,
            ..
        } => (domain.clone(), name.clone(), target.clone(), node.span.start_line),
        _ => return,
    };

    let key = format!("{domain}:{name}:{target}");
    let results = targets.lookup(&key);
    if results.is_empty() {
        diagnostics.push(Diagnostic::new(DiagnosticKind::TargetNotFound { key }, line));
        return;
    }
    if results.len() > 1 {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::AmbiguousTarget {
                key: key.clone(),
                count: results.len(),
            },
            line,
        ));
    }

    let (title, new_fileid, new_url): (Vec<Node>, Option<(FileId, String)>, Option<String>) =
        match &results[0] {
            TargetResult::Internal {
                fileid,
                html5_id,
                title,
                ..
            } => (title.clone(), Some((fileid.clone(), html5_id.clone())), None),
            TargetResult::External { url, title, .. } => (title.clone(), None, Some(url.clone())),
        };

    let had_no_children = node.children().is_empty();
    let candidate_exists = {
        // Probe without holding the mutable borrow: a non-leaf, non-branching
        // chain always yields Some, so this mirrors the Python check.
        let mut probe = node.clone();
        title_injection_candidate_mut(&mut probe).is_some()
    };

    if had_no_children || candidate_exists {
        if let NodeData::RefRole { fileid, url, .. } = &mut node.data {
            *fileid = new_fileid;
            *url = new_url;
        }
        if let Some(candidate) = title_injection_candidate_mut(node) {
            if !candidate.is_leaf() {
                *candidate.children_mut() = title;
            }
        }
    }
}

/// Resolves every `ref_role` node in `page`'s pages against `targets`,
/// recording `TargetNotFound`/`AmbiguousTarget` diagnostics as needed.
pub fn handle_refs(pages: &mut HashMap<FileId, Page>, targets: &TargetDatabase) -> HashMap<FileId, Vec<Diagnostic>> {
    let mut diagnostics: HashMap<FileId, Vec<Diagnostic>> = HashMap::new();
    for page in pages.values_mut() {
        if !is_source_page(&page.fileid) {
            continue;
        }
        let mut file_diagnostics = Vec::new();
        page.ast.for_each_mut(&mut |node: &mut Node| {
            handle_ref_role(node, targets, &mut file_diagnostics);
        });
        if !file_diagnostics.is_empty() {
            diagnostics.insert(page.fileid.clone(), file_diagnostics);
        }
    }
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Options, Span};

    fn text(s: &str) -> Node {
        Node::new(Span::default(), NodeData::Text { value: s.into() })
    }

    #[test]
    fn clean_slug_strips_slashes_and_suffix() {
        assert_eq!(clean_slug("/page1"), "page1");
        assert_eq!(clean_slug("page1.txt"), "page1");
        assert_eq!(clean_slug("/a/b.rst/"), "a/b");
    }

    #[test]
    fn resolve_label_targets_attaches_following_heading() {
        let fileid = FileId::new("page.txt");
        let targets = TargetDatabase::new();
        let target_node = Node::new(
            Span::new(1),
            NodeData::Target {
                children: vec![Node::new(
                    Span::new(1),
                    NodeData::TargetIdentifier { ids: vec!["a".to_string()] },
                )],
                domain: "std".to_string(),
                name: "label".to_string(),
                refuri: None,
            },
        );
        let section = Node::new(
            Span::new(2),
            NodeData::Section {
                children: vec![Node::new(
                    Span::new(2),
                    NodeData::Heading {
                        children: vec![text("Hello")],
                        id: "hello".to_string(),
                    },
                )],
            },
        );
        resolve_label_targets(&[target_node, section], &fileid, &targets);
        let results = targets.lookup("std:label:a");
        assert_eq!(results.len(), 1);
        match &results[0] {
            crate::target::TargetResult::Internal { title, .. } => {
                assert_eq!(title[0].get_text(), "Hello");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn handle_refs_reports_missing_target() {
        let mut pages = HashMap::new();
        let ref_role = Node::new(
            Span::new(1),
            NodeData::RefRole {
                children: vec![],
                domain: "std".to_string(),
                name: "label".to_string(),
                target: "missing".to_string(),
                flag: None,
                fileid: None,
                url: None,
            },
        );
        let root = Node::new(
            Span::new(1),
            NodeData::Root {
                children: vec![ref_role],
                options: Options::new(),
                fileid: FileId::new("page.txt"),
            },
        );
        let page = Page::create(FileId::new("page.txt"), "page.html", String::new(), root);
        pages.insert(FileId::new("page.txt"), page);

        let targets = TargetDatabase::new();
        let diagnostics = handle_refs(&mut pages, &targets);
        assert_eq!(diagnostics[&FileId::new("page.txt")].len(), 1);
    }
}
